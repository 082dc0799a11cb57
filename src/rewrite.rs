//! Playlist rewriter: makes relative `.aac` segment lines resolve back
//! through this proxy instead of straight to the CDN.

/// Strips the variant URL down to its directory path (no scheme, no CDN
/// host, no filename) so every `.aac` line can be rewritten relative to it.
pub fn base_path(variant_url: &str) -> String {
    let without_scheme = variant_url
        .strip_prefix("https://")
        .or_else(|| variant_url.strip_prefix("http://"))
        .unwrap_or(variant_url);

    let without_host = without_scheme.split_once('/').map(|(_, rest)| rest).unwrap_or("");

    match without_host.rsplit_once('/') {
        Some((dir, _file)) => dir.to_string(),
        None => String::new(),
    }
}

/// For every line ending in `.aac`, prefixes it with `base_path` so the
/// client resolves it against this proxy's own host instead of the CDN.
pub fn rewrite_playlist(body: &str, variant_url: &str) -> String {
    let base = base_path(variant_url);
    body.lines()
        .map(|line| {
            let trimmed = line.trim_end();
            if trimmed.ends_with(".aac") {
                format!("{base}/{trimmed}")
            } else {
                trimmed.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
