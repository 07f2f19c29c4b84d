//! Chart rendering
//!
//! The cache hands a [`RenderRequest`] to a [`ChartRenderer`] and expects a PNG
//! at `request.output` once `render` returns `Ok`. Rendering is synchronous and
//! CPU bound; callers run it on a blocking thread.
//!
//! - [`BitmapRenderer`]: default renderer drawing with `plotters`

mod bitmap;

pub use bitmap::BitmapRenderer;

use crate::series::{MonthlySample, YearRange};
use std::path::PathBuf;
use thiserror::Error;

/// Major tick spacing on the date axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickGranularity {
    /// A tick every `every` months, starting in January
    Monthly { every: u32 },
    /// A tick every January
    Yearly,
}

impl TickGranularity {
    /// Spacing for a range spanning `end - start` years
    pub fn for_range(range: YearRange) -> Self {
        match range.span() {
            0 => TickGranularity::Monthly { every: 1 },
            1 => TickGranularity::Monthly { every: 2 },
            2 => TickGranularity::Monthly { every: 3 },
            3 => TickGranularity::Monthly { every: 4 },
            s if s <= 5 => TickGranularity::Monthly { every: 6 },
            _ => TickGranularity::Yearly,
        }
    }

    /// Whether a tick falls on this month (1-12)
    pub fn is_tick(&self, month: u32) -> bool {
        match self {
            TickGranularity::Monthly { every } => month.saturating_sub(1) % (*every).max(1) == 0,
            TickGranularity::Yearly => month == 1,
        }
    }
}

/// One named series on a chart
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSeries {
    pub label: String,
    pub samples: Vec<MonthlySample>,
}

impl LabeledSeries {
    pub fn new(label: impl Into<String>, samples: Vec<MonthlySample>) -> Self {
        Self {
            label: label.into(),
            samples,
        }
    }
}

/// Everything a renderer needs to produce one chart
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub title: String,
    pub series: Vec<LabeledSeries>,
    pub range: YearRange,
    pub ticks: TickGranularity,
    /// Where the PNG must be written
    pub output: PathBuf,
}

/// Rendering failures
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Drawing failed: {0}")]
    Draw(String),
}

/// Turns labeled series into an image file
pub trait ChartRenderer: Send + Sync {
    fn render(&self, request: &RenderRequest) -> Result<(), RenderError>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Writes a placeholder file and records every call
    #[derive(Default)]
    pub(crate) struct RecordingRenderer {
        pub calls: AtomicUsize,
        pub delay: Option<Duration>,
        pub fail: bool,
        pub requests: Mutex<Vec<RenderRequest>>,
    }

    impl RecordingRenderer {
        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChartRenderer for RecordingRenderer {
        fn render(&self, request: &RenderRequest) -> Result<(), RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());

            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.fail {
                return Err(RenderError::Draw("backend refused".to_string()));
            }

            std::fs::write(&request.output, b"\x89PNG\r\n\x1a\nfake")?;
            Ok(())
        }
    }
}
