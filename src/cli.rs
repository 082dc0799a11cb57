//! List-channels CLI mode: fetches the catalog once and prints it as a
//! three-column table, sorted `isFavorite` desc then channel number asc.

use std::sync::Arc;

use crate::catalog::{Channel, ChannelCatalog};
use crate::config::Config;
use crate::session::SessionManager;

pub async fn list_channels(config: &Config) {
    let session = Arc::new(SessionManager::new(
        config.username.clone(),
        config.password.clone(),
        config.rest_base.clone(),
    ));
    let catalog = ChannelCatalog::new(session);

    match catalog.channels().await {
        Ok(channels) => print_table(channels),
        Err(err) => {
            tracing::error!(%err, "failed to fetch channel list");
            std::process::exit(1);
        }
    }
}

#[allow(clippy::print_stdout)]
fn print_table(channels: &[Channel]) {
    let mut sorted: Vec<&Channel> = channels.iter().collect();
    sorted.sort_by(|a, b| {
        b.is_favorite.cmp(&a.is_favorite).then_with(|| {
            let na = a.sirius_channel_number.parse::<i64>().unwrap_or(i64::MAX);
            let nb = b.sirius_channel_number.parse::<i64>().unwrap_or(i64::MAX);
            na.cmp(&nb).then_with(|| a.sirius_channel_number.cmp(&b.sirius_channel_number))
        })
    });

    let id_w = sorted.iter().map(|c| c.channel_id.len()).max().unwrap_or(2).max(2);
    let num_w = sorted
        .iter()
        .map(|c| c.sirius_channel_number.len())
        .max()
        .unwrap_or(3)
        .max(3);
    let name_w = sorted.iter().map(|c| c.name.len()).max().unwrap_or(4).max(4);

    println!("{:id_w$} | {:num_w$} | {:name_w$}", "ID", "Num", "Name");
    for c in sorted {
        println!(
            "{:id_w$} | {:num_w$} | {:name_w$}",
            c.channel_id, c.sirius_channel_number, c.name
        );
    }
}
