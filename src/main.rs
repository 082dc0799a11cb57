use sxm_proxy::{cli, config::Config, server};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::parse_args();

    if config.list_channels {
        cli::list_channels(&config).await;
        return;
    }

    info!("starting SiriusXM HLS proxy");
    if let Err(e) = server::serve(config).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
