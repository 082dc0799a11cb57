//! Session manager: login/resume state machine and cookie introspection.
//!
//! The cookie jar is the only source of truth for session status (no
//! parallel boolean tracks it). `ensure_authenticated()` walks
//! fresh -> logged-in -> authenticated as far as it can in one call and is
//! the only entry point other components use; serialization against
//! concurrent callers is a single mutex held across the whole login+resume
//! sequence, so at most one re-authentication is ever in flight.

use percent_encoding::percent_decode_str;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{Result, SxmError};
use crate::http_client::HttpClient;

#[derive(Serialize)]
struct DeviceInfo {
    #[serde(rename = "osVersion")]
    os_version: &'static str,
    platform: &'static str,
    #[serde(rename = "sxmAppVersion")]
    sxm_app_version: &'static str,
    browser: &'static str,
    #[serde(rename = "browserVersion")]
    browser_version: &'static str,
    #[serde(rename = "appRegion")]
    app_region: &'static str,
    #[serde(rename = "deviceModel")]
    device_model: &'static str,
    #[serde(rename = "clientDeviceId")]
    client_device_id: &'static str,
    player: &'static str,
    #[serde(rename = "clientDeviceType")]
    client_device_type: &'static str,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            os_version: "Mac",
            platform: "Web",
            sxm_app_version: "3.1802.10011.0",
            browser: "Safari",
            browser_version: "11.0.3",
            app_region: "US",
            device_model: "K2WebClient",
            client_device_id: "null",
            player: "html5",
            client_device_type: "web",
        }
    }
}

#[derive(Serialize)]
struct StandardAuth<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct ModuleRequestEnvelope<T> {
    #[serde(rename = "moduleList")]
    pub(crate) module_list: ModuleListBody<T>,
}

#[derive(Serialize)]
pub(crate) struct ModuleListBody<T> {
    pub(crate) modules: Vec<ModuleEntry<T>>,
}

#[derive(Serialize)]
pub(crate) struct ModuleEntry<T> {
    #[serde(rename = "moduleRequest")]
    pub(crate) module_request: T,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    #[serde(rename = "resultTemplate")]
    result_template: &'static str,
    #[serde(rename = "deviceInfo")]
    device_info: DeviceInfo,
    #[serde(rename = "standardAuth")]
    standard_auth: StandardAuth<'a>,
}

#[derive(Serialize)]
struct ResumeRequest {
    #[serde(rename = "resultTemplate")]
    result_template: &'static str,
    #[serde(rename = "deviceInfo")]
    device_info: DeviceInfo,
}

#[derive(serde::Deserialize)]
struct ModuleListEnvelope {
    #[serde(rename = "ModuleListResponse")]
    module_list_response: ModuleListResponse,
}

#[derive(serde::Deserialize)]
pub struct ModuleListResponse {
    pub status: i64,
    #[serde(default)]
    pub messages: Vec<ResponseMessage>,
    #[serde(default, rename = "moduleList")]
    pub module_list: Option<ResponseModuleList>,
}

#[derive(serde::Deserialize)]
pub struct ResponseMessage {
    pub code: i64,
    pub message: String,
}

#[derive(serde::Deserialize)]
pub struct ResponseModuleList {
    pub modules: Vec<ResponseModule>,
}

#[derive(serde::Deserialize)]
pub struct ResponseModule {
    #[serde(rename = "moduleResponse")]
    pub module_response: serde_json::Value,
}

pub struct SessionManager {
    http: HttpClient,
    username: String,
    password: String,
    rest_base: String,
    auth_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(username: String, password: String, rest_base: String) -> Self {
        Self {
            http: HttpClient::new(),
            username,
            password,
            rest_base,
            auth_lock: Mutex::new(()),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http.client
    }

    pub fn rest_base(&self) -> &str {
        &self.rest_base
    }

    pub fn is_logged_in(&self) -> bool {
        self.http.has_cookie("SXMAUTHNEW")
    }

    pub fn is_authenticated(&self) -> bool {
        self.http.has_cookie("AWSALB") && self.http.has_cookie("JSESSIONID")
    }

    /// Extracts the SXMAKTOKEN fragment used to authenticate CDN/REST calls.
    /// The raw cookie value looks like `nonce=TOKEN,extra...`; never panics
    /// on an unexpected shape, just reports "no token".
    pub fn sxmak_token(&self) -> Option<String> {
        let raw = self.http.cookie_value("SXMAKTOKEN")?;
        let (_, rest) = raw.split_once('=')?;
        let token = rest.split_once(',').map(|(t, _)| t).unwrap_or(rest);
        Some(token.to_string())
    }

    /// SXMDATA is URL-encoded JSON; `gupId` is one of its fields.
    pub fn gup_id(&self) -> Option<String> {
        let raw = self.http.cookie_value("SXMDATA")?;
        let decoded = percent_decode_str(&raw).decode_utf8().ok()?;
        let value: serde_json::Value = serde_json::from_str(&decoded).ok()?;
        value.get("gupId")?.as_str().map(str::to_string)
    }

    /// The `{token, consumer, gupId}` triple every authenticated upstream
    /// call carries. Returns `AuthFailed` if either cookie-derived field is
    /// currently missing (the jar is the source of truth, not a cached
    /// value).
    pub fn auth_params(&self) -> Result<[(&'static str, String); 3]> {
        let token = self.sxmak_token().ok_or(SxmError::AuthFailed)?;
        let gup_id = self.gup_id().ok_or(SxmError::AuthFailed)?;
        Ok([("token", token), ("consumer", "k2".to_string()), ("gupId", gup_id)])
    }

    /// Drives the login/resume state machine as far toward an authenticated
    /// session as one call can get. Safe to call when already authenticated
    /// (no-op). Serialized: only one caller at a time walks the state
    /// machine, others wait on the same mutex and then re-check the jar.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        self.ensure_authenticated_locked(false).await
    }

    /// Forces a fresh login/resume even if the jar currently reads as
    /// authenticated. Used when an upstream call reports session-expired
    /// (code 201/208) even though the locally-held cookies still look fine.
    /// The clear-and-rebuild happens under `auth_lock`, so a follower that
    /// observed the same stale signal can never wipe cookies a concurrent
    /// leader just finished installing: once the leader releases the lock
    /// having re-authenticated, the follower re-checks `is_authenticated()`
    /// under the same lock and, finding it true, returns without touching
    /// the jar.
    pub async fn reauthenticate(&self) -> Result<()> {
        self.ensure_authenticated_locked(true).await
    }

    async fn ensure_authenticated_locked(&self, force_clear: bool) -> Result<()> {
        let _guard = self.auth_lock.lock().await;

        if self.is_authenticated() {
            return Ok(());
        }

        if force_clear {
            self.http.clear_cookies();
        }

        if !self.is_logged_in() {
            self.login().await?;
        }

        if !self.is_authenticated() {
            self.resume().await?;
        }

        if self.is_authenticated() {
            Ok(())
        } else {
            Err(SxmError::AuthFailed)
        }
    }

    async fn login(&self) -> Result<()> {
        tracing::info!("logging in");
        let body = ModuleRequestEnvelope {
            module_list: ModuleListBody {
                modules: vec![ModuleEntry {
                    module_request: LoginRequest {
                        result_template: "web",
                        device_info: DeviceInfo::default(),
                        standard_auth: StandardAuth {
                            username: &self.username,
                            password: &self.password,
                        },
                    },
                }],
            },
        };

        let response = self.post("modify/authentication", &body).await?;
        if response.module_list_response.status != 1 || !self.is_logged_in() {
            tracing::warn!("login did not establish a logged-in session");
            return Err(SxmError::AuthFailed);
        }

        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        tracing::info!("resuming session");
        let body = ModuleRequestEnvelope {
            module_list: ModuleListBody {
                modules: vec![ModuleEntry {
                    module_request: ResumeRequest {
                        result_template: "web",
                        device_info: DeviceInfo::default(),
                    },
                }],
            },
        };

        let response = self.post("resume?OAtrial=false", &body).await?;
        if response.module_list_response.status != 1 || !self.is_authenticated() {
            tracing::warn!("resume did not establish an authenticated session");
            return Err(SxmError::AuthFailed);
        }

        Ok(())
    }

    async fn post<B: Serialize>(&self, method: &str, body: &B) -> Result<ModuleListEnvelope> {
        let url = format!("{}/{method}", self.rest_base);
        let response = self.http.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(SxmError::UpstreamError {
                code: response.status().as_u16() as i64,
                message: format!("POST {method} returned {}", response.status()),
            });
        }

        response
            .json::<ModuleListEnvelope>()
            .await
            .map_err(|e| SxmError::Parse(format!("invalid {method} response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sxmak_token_extracts_value_before_comma() {
        let http = HttpClient::new();
        {
            let mut store = http.cookies.lock().unwrap();
            let cookie = cookie_store::RawCookie::new("SXMAKTOKEN", "nonce=abc123,rest=ignored");
            let url = url::Url::parse("https://player.siriusxm.com/").unwrap();
            store.insert_raw(&cookie, &url).unwrap();
        }
        let session = SessionManager {
            http,
            username: "u".into(),
            password: "p".into(),
            rest_base: "https://player.siriusxm.com/rest/v2/experience/modules".into(),
            auth_lock: Mutex::new(()),
        };
        assert_eq!(session.sxmak_token(), Some("abc123".to_string()));
    }

    #[test]
    fn sxmak_token_missing_returns_none() {
        let http = HttpClient::new();
        let session = SessionManager {
            http,
            username: "u".into(),
            password: "p".into(),
            rest_base: "https://player.siriusxm.com/rest/v2/experience/modules".into(),
            auth_lock: Mutex::new(()),
        };
        assert_eq!(session.sxmak_token(), None);
    }

    #[test]
    fn gup_id_decodes_percent_encoded_json() {
        let http = HttpClient::new();
        {
            let mut store = http.cookies.lock().unwrap();
            let raw = percent_encoding::utf8_percent_encode(
                r#"{"gupId":"abc-def"}"#,
                percent_encoding::NON_ALPHANUMERIC,
            )
            .to_string();
            let cookie = cookie_store::RawCookie::new("SXMDATA", raw);
            let url = url::Url::parse("https://player.siriusxm.com/").unwrap();
            store.insert_raw(&cookie, &url).unwrap();
        }
        let session = SessionManager {
            http,
            username: "u".into(),
            password: "p".into(),
            rest_base: "https://player.siriusxm.com/rest/v2/experience/modules".into(),
            auth_lock: Mutex::new(()),
        };
        assert_eq!(session.gup_id(), Some("abc-def".to_string()));
    }

    #[test]
    fn gup_id_malformed_json_returns_none_without_panicking() {
        let http = HttpClient::new();
        {
            let mut store = http.cookies.lock().unwrap();
            let cookie = cookie_store::RawCookie::new("SXMDATA", "not-json-at-all");
            let url = url::Url::parse("https://player.siriusxm.com/").unwrap();
            store.insert_raw(&cookie, &url).unwrap();
        }
        let session = SessionManager {
            http,
            username: "u".into(),
            password: "p".into(),
            rest_base: "https://player.siriusxm.com/rest/v2/experience/modules".into(),
            auth_lock: Mutex::new(()),
        };
        assert_eq!(session.gup_id(), None);
    }

    #[test]
    fn fresh_session_is_neither_logged_in_nor_authenticated() {
        let session = SessionManager::new(
            "u".into(),
            "p".into(),
            "https://player.siriusxm.com/rest/v2/experience/modules".into(),
        );
        assert!(!session.is_logged_in());
        assert!(!session.is_authenticated());
    }
}
