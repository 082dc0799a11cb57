use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// The AES key every client needs to decrypt segments. Decryption itself is
/// the player's job (non-goal for this proxy); we only vend the key bytes.
const KEY_B64: &str = "0Nsco7MAgxowGvkUT8aYag==";

pub fn serve_key() -> Response {
    let key = STANDARD
        .decode(KEY_B64)
        .expect("AES key literal is valid base64");
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], key).into_response()
}
