use std::sync::Arc;

use crate::playlist::PlaylistResolver;
use crate::segment::SegmentFetcher;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub playlists: Arc<PlaylistResolver>,
    pub segments: Arc<SegmentFetcher>,
}
