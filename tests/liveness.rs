// tests/liveness.rs
use activity_digest::config::LivenessConfig;
use activity_digest::ingest::liveness::LinkChecker;
use activity_digest::{Event, Platform};
use chrono::{TimeZone, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ev(title: &str, url: Option<String>) -> Event {
    Event {
        source: Platform::Github,
        title: title.into(),
        description: String::new(),
        url,
        timestamp: Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn drops_dead_links_and_keeps_order() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let base = server.uri();
    let checker = LinkChecker::new(&LivenessConfig::default()).unwrap();
    let kept = checker
        .retain_live(vec![
            ev("first", Some(format!("{base}/ok"))),
            ev("dead", Some(format!("{base}/gone"))),
            ev("no link", None),
            ev("down", Some(format!("{base}/broken"))),
            ev("last", Some(format!("{base}/ok"))),
        ])
        .await;

    let titles: Vec<&str> = kept.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "no link", "last"]);
}

#[tokio::test]
async fn slow_link_is_treated_as_dead() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(std::time::Duration::from_secs(3)))
        .mount(&server)
        .await;

    let checker = LinkChecker::new(&LivenessConfig {
        enabled: true,
        timeout_secs: 1,
    })
    .unwrap();
    assert!(!checker.is_reachable(&format!("{}/slow", server.uri())).await);
}

#[tokio::test]
async fn refused_connection_is_dead() {
    let checker = LinkChecker::new(&LivenessConfig::default()).unwrap();
    assert!(!checker.is_reachable("http://127.0.0.1:9/x").await);
}
