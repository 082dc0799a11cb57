//! Segment fetcher: fetches `.aac` bytes from the CDN, treating a 403
//! as a stale variant URL and refreshing via the playlist resolver before
//! retrying.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::StatusCode;

use crate::error::{Result, SxmError};
use crate::playlist::{PlaylistResolver, DEFAULT_RETRY_BUDGET};
use crate::session::SessionManager;

pub struct SegmentFetcher {
    session: Arc<SessionManager>,
    playlists: Arc<PlaylistResolver>,
    cdn_root: String,
}

impl SegmentFetcher {
    pub fn new(session: Arc<SessionManager>, playlists: Arc<PlaylistResolver>, cdn_root: String) -> Self {
        Self {
            session,
            playlists,
            cdn_root,
        }
    }

    pub async fn get_segment(&self, path: &str) -> Result<Bytes> {
        self.get_segment_with_budget(path, DEFAULT_RETRY_BUDGET).await
    }

    async fn get_segment_with_budget(&self, path: &str, attempts_left: u32) -> Result<Bytes> {
        let url = format!("{}/{path}", self.cdn_root);
        let params = self.session.auth_params()?;
        let response = self.session.http().get(&url).query(&params).send().await?;

        match response.status() {
            StatusCode::OK => Ok(response.bytes().await?),
            StatusCode::FORBIDDEN => {
                if attempts_left == 0 {
                    return Err(SxmError::SegmentRetryExhausted);
                }

                // Second `/`-delimited path component, matching the channel
                // token the rewriter embeds in `base_path`. Only correct
                // when that component really is a channelId — true for
                // every path this proxy itself produced via the playlist
                // rewriter, but not guaranteed for arbitrary input.
                if let Some(channel) = path.splitn(3, '/').nth(1) {
                    tracing::warn!(channel, path, "segment fetch got 403, refreshing playlist");
                    let _ = self.playlists.get_playlist_with_cache(channel, false).await;
                }

                Box::pin(self.get_segment_with_budget(path, attempts_left - 1)).await
            }
            status => Err(SxmError::UpstreamError {
                code: status.as_u16() as i64,
                message: format!("segment fetch returned {status}"),
            }),
        }
    }
}
