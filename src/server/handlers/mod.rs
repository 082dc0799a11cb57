pub mod key;
pub mod playlist;
pub mod segment;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};

use super::state::AppState;

/// Single dispatch point matching the three route families:
/// `*.m3u8`, `*.aac`, `*/key/1`. Anything else, or any non-GET method, is
/// always a 500 — there is no 404 in this contract.
pub async fn dispatch(State(state): State<AppState>, req: Request) -> Response {
    if req.method() != Method::GET {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let path = req.uri().path().to_string();

    if path.ends_with("/key/1") {
        return key::serve_key();
    }

    if let Some(channel) = path.strip_suffix(".m3u8").and_then(|p| p.rsplit('/').next()) {
        return playlist::serve_playlist(state, channel).await;
    }

    if path.ends_with(".aac") {
        let segment_path = path.trim_start_matches('/');
        return segment::serve_segment(state, segment_path).await;
    }

    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
