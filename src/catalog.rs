//! Channel catalog: fetched once, then resolved in memory for the rest
//! of the process lifetime.

use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::{Result, SxmError};
use crate::session::{ModuleEntry, ModuleListBody, ModuleRequestEnvelope, SessionManager};

use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct Channel {
    #[serde(rename = "channelGuid")]
    pub channel_guid: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    pub name: String,
    #[serde(rename = "siriusChannelNumber")]
    pub sirius_channel_number: String,
    #[serde(default, rename = "isFavorite")]
    pub is_favorite: bool,
}

#[derive(serde::Serialize)]
struct ChannelListingRequest {
    #[serde(rename = "moduleArea")]
    module_area: &'static str,
    #[serde(rename = "moduleType")]
    module_type: &'static str,
    #[serde(rename = "moduleRequest")]
    module_request: ChannelListingInner,
}

#[derive(serde::Serialize)]
struct ChannelListingInner {
    #[serde(rename = "consumeRequests")]
    consume_requests: Vec<()>,
    #[serde(rename = "resultTemplate")]
    result_template: &'static str,
    alerts: Vec<()>,
    #[serde(rename = "profileInfos")]
    profile_infos: Vec<()>,
}

#[derive(Deserialize)]
struct ChannelListingEnvelope {
    #[serde(rename = "ModuleListResponse")]
    module_list_response: ChannelListingResponse,
}

#[derive(Deserialize)]
struct ChannelListingResponse {
    status: i64,
    #[serde(rename = "moduleList")]
    module_list: ResponseModuleList,
}

#[derive(Deserialize)]
struct ResponseModuleList {
    modules: Vec<ResponseModule>,
}

#[derive(Deserialize)]
struct ResponseModule {
    #[serde(rename = "moduleResponse")]
    module_response: ModuleResponseBody,
}

#[derive(Deserialize)]
struct ModuleResponseBody {
    #[serde(rename = "contentData")]
    content_data: ContentData,
}

#[derive(Deserialize)]
struct ContentData {
    #[serde(rename = "channelListing")]
    channel_listing: ChannelListing,
}

#[derive(Deserialize)]
struct ChannelListing {
    channels: Vec<Channel>,
}

pub struct ChannelCatalog {
    session: Arc<SessionManager>,
    channels: OnceCell<Vec<Channel>>,
}

impl ChannelCatalog {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            session,
            channels: OnceCell::new(),
        }
    }

    pub async fn channels(&self) -> Result<&[Channel]> {
        self.channels
            .get_or_try_init(|| self.fetch())
            .await
            .map(Vec::as_slice)
    }

    /// Resolution is pure once the catalog is loaded: same input always
    /// yields the same match, in channel-list order.
    pub async fn resolve(&self, name: &str) -> Result<Option<(String, String)>> {
        let needle = name.to_lowercase();
        let channels = self.channels().await?;
        Ok(channels
            .iter()
            .find(|c| {
                c.channel_id.to_lowercase() == needle
                    || c.name.to_lowercase() == needle
                    || c.sirius_channel_number == needle
            })
            .map(|c| (c.channel_guid.clone(), c.channel_id.clone())))
    }

    async fn fetch(&self) -> Result<Vec<Channel>> {
        self.session.ensure_authenticated().await?;

        let body = ModuleRequestEnvelope {
            module_list: ModuleListBody {
                modules: vec![ModuleEntry {
                    module_request: ChannelListingRequest {
                        module_area: "Discovery",
                        module_type: "ChannelListing",
                        module_request: ChannelListingInner {
                            consume_requests: Vec::new(),
                            result_template: "responsive",
                            alerts: Vec::new(),
                            profile_infos: Vec::new(),
                        },
                    },
                }],
            },
        };

        let url = format!("{}/get", self.session.rest_base());
        let response = self.session.http().post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            return Err(SxmError::UpstreamError {
                code: response.status().as_u16() as i64,
                message: "channel listing request failed".to_string(),
            });
        }

        let parsed: ChannelListingEnvelope = response
            .json()
            .await
            .map_err(|e| SxmError::Parse(format!("invalid channel listing response: {e}")))?;

        if parsed.module_list_response.status != 1 {
            return Err(SxmError::UpstreamError {
                code: parsed.module_list_response.status,
                message: "channel listing returned non-success status".to_string(),
            });
        }

        let channels = parsed
            .module_list_response
            .module_list
            .modules
            .into_iter()
            .next()
            .ok_or_else(|| SxmError::Parse("channel listing response had no modules".to_string()))?
            .module_response
            .content_data
            .channel_listing
            .channels;

        tracing::info!(count = channels.len(), "loaded channel catalog");
        Ok(channels)
    }
}
