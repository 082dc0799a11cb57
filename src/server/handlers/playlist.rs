use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::server::state::AppState;

pub async fn serve_playlist(state: AppState, channel: &str) -> Response {
    match state.playlists.get_playlist(channel).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/x-mpegURL")], body).into_response(),
        Err(err) => {
            tracing::warn!(channel, %err, "playlist request failed");
            err.into_response()
        }
    }
}
