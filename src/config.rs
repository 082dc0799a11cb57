//! Process configuration: credentials, listen port, and CLI mode selection.

use clap::Parser;

/// Command-line / environment configuration for the proxy.
///
/// Credentials fall back to `SXM_USERNAME` / `SXM_PASSWORD` so the binary can
/// run unattended (e.g. under a process supervisor) without exposing them on
/// the command line.
#[derive(Debug, Clone, Parser)]
#[command(name = "sxm-proxy", about = "Local HLS proxy for the SiriusXM web player")]
pub struct Config {
    /// Port the HTTP front-end listens on.
    #[arg(short, long, env = "PORT", default_value_t = 9999)]
    pub port: u16,

    /// SiriusXM account username.
    #[arg(long, env = "SXM_USERNAME")]
    pub username: String,

    /// SiriusXM account password.
    #[arg(long, env = "SXM_PASSWORD")]
    pub password: String,

    /// Instead of serving, fetch the channel catalog and print it, then exit.
    #[arg(short = 'l', long = "list")]
    pub list_channels: bool,

    /// SiriusXM REST module base URL. Overridable so tests can point the
    /// whole core at a mock server instead of the live upstream.
    #[arg(
        long,
        hide = true,
        default_value = "https://player.siriusxm.com/rest/v2/experience/modules"
    )]
    pub rest_base: String,

    /// SiriusXM CDN root. Overridable for the same reason as `rest_base`.
    #[arg(long, hide = true, default_value = "https://siriusxm-priprodlive.akamaized.net")]
    pub cdn_root: String,
}

impl Config {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
