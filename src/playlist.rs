//! Playlist resolver: now-playing lookup, variant URL resolution and
//! caching, and the 403/expired-session retry dance.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::catalog::ChannelCatalog;
use crate::error::{Result, SxmError};
use crate::rewrite::rewrite_playlist;
use crate::session::SessionManager;
use crate::telemetry::{extract_now_playing, NowPlayingSink};

const LIVE_PRIMARY_PLACEHOLDER: &str = "%Live_Primary_HLS%";

/// Initial budget for the now-playing session-expired retry loop, and,
/// separately, for the segment-fetch 403 retry loop. Both start from the
/// same constant; they are independent budgets.
pub const DEFAULT_RETRY_BUDGET: u32 = 5;

#[derive(Deserialize)]
struct ModuleListEnvelope {
    #[serde(rename = "ModuleListResponse")]
    module_list_response: ModuleListResponse,
}

#[derive(Deserialize)]
struct ModuleListResponse {
    #[serde(default)]
    messages: Vec<ResponseMessage>,
    #[serde(default, rename = "moduleList")]
    module_list: Option<ResponseModuleList>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct ResponseModuleList {
    modules: Vec<ResponseModule>,
}

#[derive(Deserialize)]
struct ResponseModule {
    #[serde(rename = "moduleResponse")]
    module_response: serde_json::Value,
}

#[derive(Deserialize)]
struct HlsAudioInfo {
    size: String,
    url: String,
}

pub struct PlaylistResolver {
    session: Arc<SessionManager>,
    catalog: Arc<ChannelCatalog>,
    cache: DashMap<String, String>,
    sink: Arc<dyn NowPlayingSink>,
    cdn_root: String,
}

impl PlaylistResolver {
    pub fn new(
        session: Arc<SessionManager>,
        catalog: Arc<ChannelCatalog>,
        sink: Arc<dyn NowPlayingSink>,
        cdn_root: String,
    ) -> Self {
        Self {
            session,
            catalog,
            cache: DashMap::new(),
            sink,
            cdn_root,
        }
    }

    pub async fn get_playlist(&self, user_key: &str) -> Result<String> {
        self.get_playlist_with_cache(user_key, true).await
    }

    pub async fn get_playlist_with_cache(&self, user_key: &str, use_cache: bool) -> Result<String> {
        let (guid, channel_id) = self
            .catalog
            .resolve(user_key)
            .await?
            .ok_or_else(|| SxmError::UnknownChannel(user_key.to_string()))?;

        let variant_url = self
            .resolve_variant_url(&guid, &channel_id, use_cache)
            .await?;

        let params = self.session.auth_params()?;
        let response = self
            .session
            .http()
            .get(&variant_url)
            .query(&params)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await?;
                Ok(rewrite_playlist(&body, &variant_url))
            }
            StatusCode::FORBIDDEN if use_cache => {
                tracing::warn!(channel = channel_id, "variant playlist returned 403, retrying without cache");
                self.cache.remove(&channel_id);
                Box::pin(self.get_playlist_with_cache(user_key, false)).await
            }
            status => Err(SxmError::UpstreamError {
                code: status.as_u16() as i64,
                message: format!("variant playlist fetch returned {status}"),
            }),
        }
    }

    async fn resolve_variant_url(&self, guid: &str, channel_id: &str, use_cache: bool) -> Result<String> {
        if use_cache {
            if let Some(url) = self.cache.get(channel_id) {
                return Ok(url.clone());
            }
        }

        let variant_url = self
            .fetch_variant_url(guid, channel_id, DEFAULT_RETRY_BUDGET)
            .await?;
        self.cache.insert(channel_id.to_string(), variant_url.clone());
        Ok(variant_url)
    }

    async fn fetch_variant_url(&self, guid: &str, channel_id: &str, attempts_left: u32) -> Result<String> {
        let live_data = self.now_playing(guid, channel_id, attempts_left).await?;

        let hls = live_data
            .get("hlsAudioInfos")
            .and_then(|v| serde_json::from_value::<Vec<HlsAudioInfo>>(v.clone()).ok())
            .and_then(|infos| infos.into_iter().find(|i| i.size == "LARGE"))
            .ok_or_else(|| SxmError::Parse("no LARGE hlsAudioInfos entry".to_string()))?;

        let master_url = hls.url.replace(LIVE_PRIMARY_PLACEHOLDER, &self.cdn_root);
        self.fetch_variant_from_master(&master_url).await
    }

    async fn now_playing(
        &self,
        guid: &str,
        channel_id: &str,
        attempts_left: u32,
    ) -> Result<serde_json::Value> {
        self.session.ensure_authenticated().await?;

        let now = Utc::now();
        let params = [
            ("assetGUID", guid.to_string()),
            ("channelId", channel_id.to_string()),
            ("ccRequestType", "AUDIO_VIDEO".to_string()),
            ("hls_output_mode", "custom".to_string()),
            ("marker_mode", "all_separate_cue_points".to_string()),
            ("result-template", "web".to_string()),
            ("time", now.timestamp_millis().to_string()),
            ("timestamp", now.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        ];

        let url = format!("{}/tune/now-playing-live", self.session.rest_base());
        let response = self.session.http().get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(SxmError::UpstreamError {
                code: response.status().as_u16() as i64,
                message: format!("now-playing-live returned {}", response.status()),
            });
        }

        let parsed: ModuleListEnvelope = response
            .json()
            .await
            .map_err(|e| SxmError::Parse(format!("invalid now-playing-live response: {e}")))?;

        let message = parsed
            .module_list_response
            .messages
            .first()
            .ok_or_else(|| SxmError::Parse("now-playing-live response had no messages".to_string()))?;

        match message.code {
            100 => {
                let live_channel_data = parsed
                    .module_list_response
                    .module_list
                    .ok_or_else(|| SxmError::Parse("now-playing-live response had no moduleList".to_string()))?
                    .modules
                    .into_iter()
                    .next()
                    .ok_or_else(|| SxmError::Parse("now-playing-live response had no modules".to_string()))?
                    .module_response
                    .get("liveChannelData")
                    .cloned()
                    .ok_or_else(|| SxmError::Parse("now-playing-live response had no liveChannelData".to_string()))?;

                if let Some(info) = extract_now_playing(&live_channel_data) {
                    let sink = Arc::clone(&self.sink);
                    let channel_id = channel_id.to_string();
                    tokio::task::spawn_blocking(move || sink.publish(&channel_id, &info));
                }

                Ok(live_channel_data)
            }
            201 | 208 => {
                if attempts_left == 0 {
                    return Err(SxmError::SessionRetryExhausted);
                }
                tracing::info!(code = message.code, "session expired, re-authenticating");
                self.session.reauthenticate().await?;
                Box::pin(self.now_playing(guid, channel_id, attempts_left - 1)).await
            }
            other => Err(SxmError::UpstreamError {
                code: other,
                message: message.message.clone(),
            }),
        }
    }

    async fn fetch_variant_from_master(&self, master_url: &str) -> Result<String> {
        let params = self.session.auth_params()?;
        let response = self
            .session
            .http()
            .get(master_url)
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SxmError::UpstreamError {
                code: response.status().as_u16() as i64,
                message: format!("master playlist fetch returned {}", response.status()),
            });
        }

        let body = response.text().await?;
        let variant_line = body
            .lines()
            .map(str::trim)
            .find(|l| l.ends_with(".m3u8"))
            .ok_or_else(|| SxmError::Parse("master playlist had no .m3u8 line".to_string()))?;

        let base = master_url.rsplit_once('/').map(|(b, _)| b).unwrap_or(master_url);
        Ok(format!("{base}/{variant_line}"))
    }
}
