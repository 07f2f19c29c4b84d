//! Cache keys and artifact paths

use crate::series::YearRange;
use std::fmt;

/// Normalized identity of one chart query
///
/// Station order is significant: `(A, B)` and `(B, A)` are distinct keys and
/// produce distinct artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    primary: String,
    secondary: Option<String>,
    start: i32,
    end: i32,
}

impl QueryKey {
    /// An empty secondary name is the same as none
    pub fn new(primary: impl Into<String>, secondary: Option<String>, start: i32, end: i32) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.filter(|s| !s.is_empty()),
            start,
            end,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    /// Secondary name as stored in the cache table
    pub fn secondary_or_empty(&self) -> &str {
        self.secondary.as_deref().unwrap_or("")
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn range(&self) -> YearRange {
        YearRange::new(self.start, self.end)
    }

    pub fn is_compare(&self) -> bool {
        self.secondary.is_some()
    }

    /// Chart title
    pub fn title(&self) -> String {
        match &self.secondary {
            Some(secondary) => format!("Pluviométrie {} - {}", self.primary, secondary),
            None => format!("Pluviométrie {}", self.primary),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}+{}/{}-{}", self.primary, secondary, self.start, self.end),
            None => write!(f, "{}/{}-{}", self.primary, self.start, self.end),
        }
    }
}

/// Artifact location relative to the static document root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactPath(String);

impl ArtifactPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Deterministic path for a key: `{dir}/pluvio_{names}_{start}_{end}.png`
    pub fn for_key(artifact_dir: &str, key: &QueryKey) -> Self {
        let mut name = format!("pluvio_{}", file_safe(key.primary()));
        if let Some(secondary) = key.secondary() {
            name.push('_');
            name.push_str(&file_safe(secondary));
        }

        let dir = artifact_dir.trim_matches('/');
        Self(format!("{}/{}_{}_{}.png", dir, name, key.start(), key.end()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Root-relative URL served by the static fallback
    pub fn url(&self) -> String {
        format!("/{}", self.0.trim_start_matches('/'))
    }
}

impl fmt::Display for ArtifactPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Station names end up in file names; keep them inside the artifact directory
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_secondary_is_single_station() {
        let a = QueryKey::new("Bron", Some(String::new()), 2011, 2018);
        let b = QueryKey::new("Bron", None, 2011, 2018);

        assert_eq!(a, b);
        assert!(!a.is_compare());
        assert_eq!(a.secondary_or_empty(), "");
    }

    #[test]
    fn test_all_fields_participate_in_equality() {
        let base = QueryKey::new("A", Some("B".to_string()), 2012, 2014);

        assert_ne!(base, QueryKey::new("B", Some("A".to_string()), 2012, 2014));
        assert_ne!(base, QueryKey::new("A", Some("B".to_string()), 2013, 2014));
        assert_ne!(base, QueryKey::new("A", Some("B".to_string()), 2012, 2015));
        assert_ne!(base, QueryKey::new("A", None, 2012, 2014));
    }

    #[test]
    fn test_artifact_paths() {
        let single = QueryKey::new("StationX", None, 2012, 2014);
        let path = ArtifactPath::for_key("courbes", &single);
        assert_eq!(path.as_str(), "courbes/pluvio_StationX_2012_2014.png");
        assert_eq!(path.url(), "/courbes/pluvio_StationX_2012_2014.png");

        let compare = QueryKey::new("A", Some("B".to_string()), 2011, 2018);
        assert_eq!(
            ArtifactPath::for_key("/courbes/", &compare).as_str(),
            "courbes/pluvio_A_B_2011_2018.png"
        );
    }

    #[test]
    fn test_artifact_path_strips_separators() {
        let key = QueryKey::new("../../etc", None, 2011, 2018);
        let path = ArtifactPath::for_key("courbes", &key);

        assert_eq!(path.as_str(), "courbes/pluvio_.._.._etc_2011_2018.png");
        assert_eq!(path.as_str().matches('/').count(), 1);
    }

    #[test]
    fn test_title_and_display() {
        let key = QueryKey::new("A", Some("B".to_string()), 2012, 2014);
        assert_eq!(key.title(), "Pluviométrie A - B");
        assert_eq!(key.to_string(), "A+B/2012-2014");
    }
}
