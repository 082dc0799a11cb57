//! End-to-end tests: real bound `TcpListener`, real HTTP client, with
//! `wiremock` standing in for the live SiriusXM REST and CDN endpoints.

use serde_json::json;
use sxm_proxy::config::Config;
use sxm_proxy::server::build_router;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(rest_base: String, cdn_root: String) -> Config {
    Config {
        port: 0,
        username: "listener".to_string(),
        password: "hunter2".to_string(),
        list_channels: false,
        rest_base,
        cdn_root,
    }
}

async fn spawn_server(config: Config) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().unwrap();
    let app = build_router(&config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Mounts login + resume + channel-listing mocks that authenticate `purejazz`
/// and set every cookie the session manager and auth_params() need.
async fn mount_auth(upstream: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rest/v2/experience/modules/modify/authentication"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "SXMAUTHNEW=loggedin; Path=/")
                .set_body_json(json!({"ModuleListResponse": {"status": 1}})),
        )
        .mount(upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v2/experience/modules/resume"))
        .and(query_param("OAtrial", "false"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AWSALB=awsalb1; Path=/")
                .append_header("set-cookie", "JSESSIONID=jsession1; Path=/")
                .append_header("set-cookie", "SXMAKTOKEN=nonce=tok-123,rest=ignored; Path=/")
                .append_header(
                    "set-cookie",
                    format!(
                        "SXMDATA={}; Path=/",
                        percent_encoding::utf8_percent_encode(
                            r#"{"gupId":"gup-abc"}"#,
                            percent_encoding::NON_ALPHANUMERIC
                        )
                    ),
                )
                .set_body_json(json!({"ModuleListResponse": {"status": 1}})),
        )
        .mount(upstream)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v2/experience/modules/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ModuleListResponse": {
                "status": 1,
                "moduleList": {
                    "modules": [{
                        "moduleResponse": {
                            "contentData": {
                                "channelListing": {
                                    "channels": [{
                                        "channelGuid": "guid-1",
                                        "channelId": "purejazz",
                                        "name": "Pure Jazz",
                                        "siriusChannelNumber": "67",
                                        "isFavorite": false,
                                    }]
                                }
                            }
                        }
                    }]
                }
            }
        })))
        .mount(upstream)
        .await;
}

fn now_playing_body(master_url: &str) -> serde_json::Value {
    json!({
        "ModuleListResponse": {
            "messages": [{"code": 100, "message": "OK"}],
            "moduleList": {
                "modules": [{
                    "moduleResponse": {
                        "liveChannelData": {
                            "hlsAudioInfos": [
                                {"size": "SMALL", "url": "%Live_Primary_HLS%/content/purejazz/small.m3u8"},
                                {"size": "LARGE", "url": master_url},
                            ]
                        }
                    }
                }]
            }
        }
    })
}

#[tokio::test]
async fn cold_start_returns_rewritten_playlist() {
    let upstream = MockServer::start().await;
    mount_auth(&upstream).await;

    Mock::given(method("GET"))
        .and(path("/rest/v2/experience/modules/tune/now-playing-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(now_playing_body(
            "%Live_Primary_HLS%/content/purejazz/master.m3u8",
        )))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/master.m3u8"))
        .and(query_param("consumer", "k2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\nvariant-256.m3u8\n"))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/variant-256.m3u8"))
        .and(query_param("consumer", "k2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n#EXTINF:10,\nseg001.aac\n#EXT-X-ENDLIST",
        ))
        .mount(&upstream)
        .await;

    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/purejazz.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/x-mpegURL"
    );
    let body = resp.text().await.unwrap();
    assert!(body.contains("content/purejazz/seg001.aac"));
    assert!(!body.contains("https://"));
}

#[tokio::test]
async fn segment_is_fetched_after_playlist() {
    let upstream = MockServer::start().await;
    mount_auth(&upstream).await;

    Mock::given(method("GET"))
        .and(path("/rest/v2/experience/modules/tune/now-playing-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(now_playing_body(
            "%Live_Primary_HLS%/content/purejazz/master.m3u8",
        )))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\nvariant-256.m3u8\n"))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/variant-256.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("seg001.aac"))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/seg001.aac"))
        .and(query_param("consumer", "k2"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"raw-aac-bytes".to_vec()))
        .mount(&upstream)
        .await;

    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let playlist = client
        .get(format!("http://{addr}/purejazz.m3u8"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let segment_line = playlist.lines().find(|l| l.ends_with(".aac")).unwrap();

    let resp = client
        .get(format!("http://{addr}/{segment_line}"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "audio/x-aac");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"raw-aac-bytes");
}

#[tokio::test]
async fn unknown_channel_returns_500_without_upstream_call() {
    let upstream = MockServer::start().await;
    mount_auth(&upstream).await;
    // Deliberately no now-playing mock: if the proxy called it anyway,
    // wiremock would return a 404 and the playlist request would 500 for a
    // different reason than the one this test wants.

    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/nosuchchannel.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 500);
    assert!(upstream.received_requests().await.unwrap().iter().all(|r| {
        !r.url.path().contains("now-playing-live")
    }));
}

#[tokio::test]
async fn key_endpoint_returns_sixteen_raw_bytes() {
    let upstream = MockServer::start().await;
    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/purejazz/key/1"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers().get("content-type").unwrap(), "text/plain");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(bytes.len(), 16);
}

#[tokio::test]
async fn session_expired_code_triggers_reauth_and_retry() {
    let upstream = MockServer::start().await;
    mount_auth(&upstream).await;

    // First now-playing call reports session-expired (208); second succeeds.
    Mock::given(method("GET"))
        .and(path("/rest/v2/experience/modules/tune/now-playing-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ModuleListResponse": {"messages": [{"code": 208, "message": "session expired"}]}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v2/experience/modules/tune/now-playing-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(now_playing_body(
            "%Live_Primary_HLS%/content/purejazz/master.m3u8",
        )))
        .with_priority(2)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("variant-256.m3u8"))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/variant-256.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("seg001.aac"))
        .mount(&upstream)
        .await;

    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/purejazz.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("seg001.aac"));
}

#[tokio::test]
async fn variant_403_busts_cache_and_retries() {
    let upstream = MockServer::start().await;
    mount_auth(&upstream).await;

    Mock::given(method("GET"))
        .and(path("/rest/v2/experience/modules/tune/now-playing-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(now_playing_body(
            "%Live_Primary_HLS%/content/purejazz/master.m3u8",
        )))
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("variant-256.m3u8"))
        .mount(&upstream)
        .await;

    // First variant fetch is stale (403); after cache-bust, a fresh
    // now-playing + master + variant round-trip succeeds.
    Mock::given(method("GET"))
        .and(path("/content/purejazz/variant-256.m3u8"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&upstream)
        .await;

    Mock::given(method("GET"))
        .and(path("/content/purejazz/variant-256.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string("seg001.aac"))
        .with_priority(2)
        .mount(&upstream)
        .await;

    let rest_base = format!("{}/rest/v2/experience/modules", upstream.uri());
    let config = test_config(rest_base, upstream.uri());
    let addr = spawn_server(config).await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!("http://{addr}/purejazz.m3u8"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.contains("seg001.aac"));
}
