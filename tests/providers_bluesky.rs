// tests/providers_bluesky.rs
use activity_digest::config::BlueskyConfig;
use activity_digest::ingest::providers::BlueskyProvider;
use activity_digest::{EventProvider, Platform, PostType, Window};
use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> Window {
    Window {
        start: Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap(),
        mark: Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap(),
        kind: PostType::Midday,
    }
}

fn json_fixture(name: &str) -> ResponseTemplate {
    let body = std::fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture");
    ResponseTemplate::new(200).set_body_raw(body, "application/json")
}

fn provider(server: &MockServer) -> BlueskyProvider {
    BlueskyProvider::new(&BlueskyConfig {
        handle: "@acme.bsky.social".into(),
        api_base: server.uri(),
        ..BlueskyConfig::default()
    })
    .expect("provider")
}

async fn mount_resolve(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/com.atproto.identity.resolveHandle"))
        .and(query_param("handle", "acme.bsky.social"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"did": "did:plc:acme"})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn stops_paging_once_a_page_reaches_before_window_start() {
    let server = MockServer::start().await;
    mount_resolve(&server).await;

    Mock::given(method("GET"))
        .and(path("/app.bsky.feed.getAuthorFeed"))
        .and(query_param("actor", "did:plc:acme"))
        .and(query_param("filter", "posts_with_replies"))
        .and(query_param_is_missing("cursor"))
        .respond_with(json_fixture("bluesky_page1.json"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app.bsky.feed.getAuthorFeed"))
        .and(query_param("cursor", "c1"))
        .respond_with(json_fixture("bluesky_page2.json"))
        .expect(1)
        .mount(&server)
        .await;
    // Page 2 already reaches before the window, so this must never be asked for.
    Mock::given(method("GET"))
        .and(path("/app.bsky.feed.getAuthorFeed"))
        .and(query_param("cursor", "c2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"feed": []})))
        .expect(0)
        .mount(&server)
        .await;

    let events = provider(&server).fetch_window(&window()).await;

    let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Widget 2.0 beta is out, try the new parser",
            "Repost of @fan.bsky.social: Wrote up my migration to widget",
            "Office hours at 10 UTC",
        ]
    );
    assert!(events.iter().all(|e| e.source == Platform::Bluesky));
    assert!(events.iter().all(|e| e.timestamp >= window().start));
    assert!(events.iter().all(|e| window().contains(e.timestamp)));
    assert_eq!(
        events[1].url.as_deref(),
        Some("https://bsky.app/profile/fan.bsky.social/post/fan1")
    );
}

#[tokio::test]
async fn exhausted_cursor_ends_paging() {
    let server = MockServer::start().await;
    mount_resolve(&server).await;

    Mock::given(method("GET"))
        .and(path("/app.bsky.feed.getAuthorFeed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "feed": [{
                "post": {
                    "uri": "at://did:plc:acme/app.bsky.feed.post/only",
                    "author": {"handle": "acme.bsky.social"},
                    "record": {"text": "only post", "createdAt": "2026-03-10T07:00:00Z"}
                }
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = provider(&server).fetch_window(&window()).await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn failed_handle_resolution_yields_empty_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/com.atproto.identity.resolveHandle"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    assert!(provider(&server).fetch_window(&window()).await.is_empty());
}
