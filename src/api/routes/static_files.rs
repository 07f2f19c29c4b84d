//! Static fallback
//!
//! Paths the dispatcher does not claim are served from the document root.
//! Unknown files get `ServeDir`'s own 404.

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use tower::ServiceExt;

use crate::api::state::AppState;

pub async fn serve(state: &AppState, request: Request) -> Response {
    match state.static_files.clone().oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
