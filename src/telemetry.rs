//! Now-playing telemetry sink: a decoupled collaborator invoked after a
//! successful now-playing lookup, generalized to a trait so the core has no
//! hard dependency on a single feed provider. A failing or slow sink must
//! never delay or fail the streaming path — callers fire-and-forget this.

#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub station: String,
    pub title: String,
    pub artist: String,
}

pub trait NowPlayingSink: Send + Sync {
    fn publish(&self, channel_id: &str, info: &NowPlaying);
}

/// Default sink: discards everything. Keeps the telemetry path truly
/// optional without special-casing "no sink configured" at call sites.
pub struct NoopSink;

impl NowPlayingSink for NoopSink {
    fn publish(&self, _channel_id: &str, _info: &NowPlaying) {}
}

/// Best-effort extraction of `station` / `cut.title` / `cut.artists[0].name`
/// out of a `liveChannelData.markerLists` payload. Never panics on an
/// unexpected shape; a miss just means no telemetry for this lookup.
pub fn extract_now_playing(live_channel_data: &serde_json::Value) -> Option<NowPlaying> {
    let marker_lists = live_channel_data.get("markerLists")?.as_array()?;

    let station = marker_lists
        .first()
        .and_then(|l| l.get("markers"))
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("episode"))
        .and_then(|e| e.get("longTitle"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let cut_marker_list = marker_lists.get(3)?;
    let cut = cut_marker_list
        .get("markers")
        .and_then(|m| m.as_array())
        .and_then(|m| m.last())
        .and_then(|m| m.get("cut"))?;

    let title = cut.get("title")?.as_str()?.to_string();
    let artist = cut
        .get("artists")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
        .and_then(|a| a.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    Some(NowPlaying { station, title, artist })
}
