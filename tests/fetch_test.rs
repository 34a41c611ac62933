//! Download coordinator integration tests against a mock HTTP server.

mod common;

use std::time::Duration;

use common::{CountingValidator, Workspace};
use loopcast::fetch::{AssetManifest, Downloader};
use loopcast_core::config::FetchConfig;
use loopcast_core::FetchLimit;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetch_config() -> FetchConfig {
    FetchConfig {
        progress_interval_secs: 0,
        ..FetchConfig::default()
    }
}

async fn serve_video(server: &MockServer, name: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

fn manifest(pairs: Vec<(String, String)>) -> AssetManifest {
    pairs.into_iter().collect()
}

#[tokio::test]
async fn one_unreachable_asset_does_not_block_others() {
    let server = MockServer::start().await;
    let mut pairs = Vec::new();
    for i in 0..4 {
        let name = format!("clip{i}.mp4");
        serve_video(&server, &name, format!("video {i}").as_bytes()).await;
        pairs.push((name.clone(), format!("{}/{name}", server.uri())));
    }
    pairs.push(("dead.mp4".into(), "http://127.0.0.1:1/dead.mp4".into()));

    let ws = Workspace::new();
    let downloader = Downloader::new(&ws.video_dir, CountingValidator::new(), &fetch_config());
    let summary = downloader.fetch_all(&manifest(pairs), FetchLimit::All).await;

    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.failed, 1);
    for i in 0..4 {
        let body = std::fs::read(ws.video_dir.join(format!("clip{i}.mp4"))).unwrap();
        assert_eq!(body, format!("video {i}").into_bytes());
    }
    assert!(!ws.video_dir.join("dead.mp4").exists());
}

#[tokio::test]
async fn limit_caps_attempted_assets() {
    let server = MockServer::start().await;
    let mut pairs = Vec::new();
    for i in 0..5 {
        let name = format!("v{i}.mp4");
        serve_video(&server, &name, b"data").await;
        pairs.push((name.clone(), format!("{}/{name}", server.uri())));
    }
    let manifest = manifest(pairs);

    let ws = Workspace::new();
    let downloader = Downloader::new(&ws.video_dir, CountingValidator::new(), &fetch_config());

    let summary = downloader.fetch_all(&manifest, FetchLimit::AtMost(2)).await;
    assert_eq!(summary.attempted, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    // The manifest is name-ordered, so the first two names are fetched.
    assert!(ws.video_dir.join("v0.mp4").exists());
    assert!(ws.video_dir.join("v1.mp4").exists());
    assert!(!ws.video_dir.join("v2.mp4").exists());

    let summary = downloader
        .fetch_all(&manifest, FetchLimit::from_raw(-1).unwrap())
        .await;
    assert_eq!(summary.attempted, 5);
    assert_eq!(summary.succeeded, 5);
}

#[tokio::test]
async fn zero_limit_attempts_nothing() {
    let server = MockServer::start().await;
    serve_video(&server, "a.mp4", b"a").await;
    let manifest = manifest(vec![("a.mp4".into(), format!("{}/a.mp4", server.uri()))]);

    let ws = Workspace::new();
    let downloader = Downloader::new(&ws.video_dir, CountingValidator::new(), &fetch_config());
    let summary = downloader.fetch_all(&manifest, FetchLimit::AtMost(0)).await;

    assert_eq!(summary.attempted, 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrency_never_exceeds_gate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;

    let pairs: Vec<(String, String)> = (0..50)
        .map(|i| {
            let name = format!("f{i:02}.mp4");
            (name.clone(), format!("{}/{name}", server.uri()))
        })
        .collect();

    let ws = Workspace::new();
    let downloader = Downloader::new(&ws.video_dir, CountingValidator::new(), &fetch_config());
    let summary = downloader.fetch_all(&manifest(pairs), FetchLimit::All).await;

    assert_eq!(summary.succeeded, 50);
    assert!(downloader.gate().peak() <= 8, "peak was {}", downloader.gate().peak());
    assert!(downloader.gate().peak() >= 2);
    assert_eq!(downloader.gate().in_flight(), 0);
}

#[tokio::test]
async fn failed_assets_release_their_slot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let pairs: Vec<(String, String)> = (0..20)
        .map(|i| {
            let name = format!("missing{i}.mp4");
            (name.clone(), format!("{}/{name}", server.uri()))
        })
        .collect();

    let ws = Workspace::new();
    let config = FetchConfig {
        concurrency: 2,
        ..fetch_config()
    };
    let downloader = Downloader::new(&ws.video_dir, CountingValidator::new(), &config);
    let summary = downloader.fetch_all(&manifest(pairs), FetchLimit::All).await;

    assert_eq!(summary.failed, 20);
    assert_eq!(downloader.gate().in_flight(), 0);
    // A 404 body is never saved as a video.
    assert_eq!(std::fs::read_dir(&ws.video_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn corrupted_local_copy_is_replaced() {
    let server = MockServer::start().await;
    serve_video(&server, "clip.mp4", b"fresh bytes").await;

    let ws = Workspace::new();
    ws.add_video("clip.mp4", b"stale corrupt bytes");

    let validator = CountingValidator::corrupting(&["clip.mp4"]);
    let downloader = Downloader::new(&ws.video_dir, validator.clone(), &fetch_config());
    let manifest = manifest(vec![(
        "clip.mp4".into(),
        format!("{}/clip.mp4", server.uri()),
    )]);
    let summary = downloader.fetch_all(&manifest, FetchLimit::All).await;

    assert_eq!(summary.succeeded, 1);
    assert_eq!(validator.calls(), 1);
    assert_eq!(
        std::fs::read(ws.video_dir.join("clip.mp4")).unwrap(),
        b"fresh bytes"
    );
}

#[tokio::test]
async fn local_validation_error_fails_only_that_asset() {
    let server = MockServer::start().await;
    serve_video(&server, "good.mp4", b"good remote").await;
    serve_video(&server, "odd.mp4", b"odd remote").await;

    let ws = Workspace::new();
    ws.add_video("good.mp4", b"good local");
    ws.add_video("odd.mp4", b"odd local");

    let validator = CountingValidator::failing(&["odd.mp4"]);
    let downloader = Downloader::new(&ws.video_dir, validator.clone(), &fetch_config());
    let manifest = manifest(vec![
        ("good.mp4".into(), format!("{}/good.mp4", server.uri())),
        ("odd.mp4".into(), format!("{}/odd.mp4", server.uri())),
    ]);
    let summary = downloader.fetch_all(&manifest, FetchLimit::All).await;

    assert_eq!(summary.attempted, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(validator.calls(), 2);
    assert_eq!(
        std::fs::read(ws.video_dir.join("good.mp4")).unwrap(),
        b"good remote"
    );
    // The failed asset is never requested and its local copy is left alone.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/good.mp4");
    assert_eq!(
        std::fs::read(ws.video_dir.join("odd.mp4")).unwrap(),
        b"odd local"
    );
}

#[tokio::test]
async fn new_asset_skips_validator() {
    let server = MockServer::start().await;
    serve_video(&server, "new.mp4", b"new").await;

    let ws = Workspace::new();
    let validator = CountingValidator::new();
    let downloader = Downloader::new(&ws.video_dir, validator.clone(), &fetch_config());
    let manifest = manifest(vec![("new.mp4".into(), format!("{}/new.mp4", server.uri()))]);
    downloader.fetch_all(&manifest, FetchLimit::All).await;

    assert_eq!(validator.calls(), 0);
}
