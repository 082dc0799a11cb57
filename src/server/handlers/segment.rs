use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::server::state::AppState;

pub async fn serve_segment(state: AppState, path: &str) -> Response {
    match state.segments.get_segment(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, "audio/x-aac")], bytes).into_response(),
        Err(err) => {
            tracing::warn!(path, %err, "segment request failed");
            err.into_response()
        }
    }
}
