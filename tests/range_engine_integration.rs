//! Integration tests for the range download engine.
//!
//! These tests drive full sessions against wiremock servers through the real
//! reqwest transport.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use futures_util::future::join_all;
use media_downloader::download::{
    DirectorySaveAs, DirectorySaver, DownloadError, HttpClient, MediaKind, RangeDownloadEngine,
    SessionState, SinkKind,
};
use support::{Event, RangeResponder, RecordingReporter, RecordingSaver, payload};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    reporter: Arc<RecordingReporter>,
    saver: Arc<RecordingSaver>,
    engine: RangeDownloadEngine,
}

fn setup(kind: MediaKind) -> Setup {
    let reporter = Arc::new(RecordingReporter::default());
    let saver = Arc::new(RecordingSaver::default());
    let engine = RangeDownloadEngine::new(
        kind,
        Arc::new(HttpClient::new()),
        saver.clone(),
        reporter.clone(),
    );
    Setup {
        reporter,
        saver,
        engine,
    }
}

#[tokio::test]
async fn test_multipart_download_assembles_parts_in_order() {
    let server = MockServer::start().await;
    let data = payload(100);
    let responder = RangeResponder::new(data.clone(), 40, "video/mp4");
    let requests = responder.counter();
    Mock::given(method("GET"))
        .and(path("/stream/1"))
        .respond_with(responder)
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let outcome = s
        .engine
        .download(&format!("{}/stream/1", server.uri()))
        .await
        .expect("session should run");

    assert!(outcome.is_completed(), "outcome: {outcome:?}");
    assert_eq!(requests.load(Ordering::SeqCst), 3);
    assert_eq!(s.reporter.percents_for(&outcome.id), vec![40, 80, 100]);
    assert_eq!(
        s.reporter.events_for(&outcome.id).last(),
        Some(&Event::Complete)
    );

    let saved = s.saver.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0.bytes.as_ref(), data.as_slice());
    assert_eq!(saved[0].0.mime, "video/mp4");
}

#[tokio::test]
async fn test_requests_carry_open_ended_range_headers() {
    let server = MockServer::start().await;
    let data = payload(20);
    Mock::given(method("GET"))
        .and(header("Range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "audio/mpeg")
                .insert_header("Content-Range", "bytes 0-9/20")
                .set_body_bytes(data[..10].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=10-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "audio/mpeg")
                .insert_header("Content-Range", "bytes 10-19/20")
                .set_body_bytes(data[10..].to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = setup(MediaKind::Audio);
    let outcome = s
        .engine
        .download(&format!("{}/audio/9", server.uri()))
        .await
        .expect("session should run");

    assert!(outcome.is_completed());
    assert!(outcome.file_name.ends_with(".ogg"));
    assert_eq!(s.saver.saved()[0].0.mime, "audio/ogg");
}

#[tokio::test]
async fn test_server_ignoring_range_completes_in_one_request() {
    let server = MockServer::start().await;
    let data = payload(64);
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "video/webm")
                .set_body_bytes(data.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let outcome = s
        .engine
        .download(&format!("{}/clip", server.uri()))
        .await
        .expect("session should run");

    assert!(outcome.is_completed());
    assert_eq!(outcome.total_size, Some(64));
    assert!(outcome.file_name.ends_with(".webm"));
    assert_eq!(s.reporter.percents_for(&outcome.id), vec![100]);
    assert_eq!(s.saver.saved()[0].0.bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_offset_gap_stops_session() {
    let server = MockServer::start().await;
    let data = payload(30);
    Mock::given(method("GET"))
        .and(header("Range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Range", "bytes 0-9/30")
                .set_body_bytes(data[..10].to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=10-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Range", "bytes 20-29/30")
                .set_body_bytes(data[20..].to_vec()),
        )
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let outcome = s
        .engine
        .download(&format!("{}/gappy", server.uri()))
        .await
        .expect("session should run");

    assert_eq!(outcome.state, SessionState::Failed);
    assert!(matches!(
        outcome.error,
        Some(DownloadError::OffsetGap {
            expected: 10,
            actual: 20
        })
    ));
    let received = server.received_requests().await.expect("recording enabled");
    assert_eq!(received.len(), 2);
    assert!(s.saver.saved().is_empty());
    assert_eq!(
        s.reporter.events_for(&outcome.id).last(),
        Some(&Event::Abort)
    );
}

#[tokio::test]
async fn test_html_response_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_raw("<html>please log in</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let outcome = s
        .engine
        .download(&format!("{}/login", server.uri()))
        .await
        .expect("session should run");

    assert_eq!(outcome.state, SessionState::Failed);
    assert!(matches!(
        outcome.error,
        Some(DownloadError::ContentType { ref actual, .. }) if actual == "text/html"
    ));
    assert!(s.reporter.percents_for(&outcome.id).is_empty());
    assert!(s.saver.saved().is_empty());
}

#[tokio::test]
async fn test_empty_body_aborts_without_save() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "video/mp4"))
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let outcome = s
        .engine
        .download(&format!("{}/empty", server.uri()))
        .await
        .expect("session should run");

    assert_eq!(outcome.state, SessionState::Aborted);
    assert!(matches!(outcome.error, Some(DownloadError::NoData)));
    assert!(s.saver.saved().is_empty());
    assert!(!s.reporter.events_for(&outcome.id).contains(&Event::Complete));
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let server = MockServer::start().await;
    let data = payload(90);
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(RangeResponder::new(data.clone(), 30, "video/mp4"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let s = setup(MediaKind::Video);
    let good = format!("{}/good", server.uri());
    let bad = format!("{}/bad", server.uri());
    let outcomes: Vec<_> = join_all([s.engine.download(&good), s.engine.download(&bad)])
        .await
        .into_iter()
        .map(|o| o.expect("session should run"))
        .collect();

    assert!(outcomes[0].is_completed());
    assert!(matches!(
        outcomes[1].error,
        Some(DownloadError::HttpStatus { status: 404, .. })
    ));
    assert_ne!(outcomes[0].id, outcomes[1].id);
    assert_eq!(s.reporter.percents_for(&outcomes[0].id), vec![33, 66, 100]);
    assert!(s.reporter.percents_for(&outcomes[1].id).is_empty());

    let saved = s.saver.saved();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0.bytes.as_ref(), data.as_slice());
}

#[tokio::test]
async fn test_streaming_session_writes_file() {
    let server = MockServer::start().await;
    let data = payload(250);
    Mock::given(method("GET"))
        .respond_with(RangeResponder::new(data.clone(), 100, "video/mp4"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let s = setup(MediaKind::Video);
    let engine = s
        .engine
        .clone()
        .with_save_as(Arc::new(DirectorySaveAs::new(temp_dir.path())));

    let url = format!("{}/media/%7B%22fileName%22%3A%22trip.mp4%22%7D", server.uri());
    let outcome = engine.download(&url).await.expect("session should run");

    assert!(outcome.is_completed(), "outcome: {outcome:?}");
    assert_eq!(outcome.sink, SinkKind::Streaming);
    assert_eq!(outcome.file_name, "trip.mp4");
    let written = std::fs::read(temp_dir.path().join("trip.mp4")).expect("file written");
    assert_eq!(written, data);
    assert!(s.saver.saved().is_empty());
}

#[tokio::test]
async fn test_buffered_session_saves_into_directory() {
    let server = MockServer::start().await;
    let data = payload(120);
    Mock::given(method("GET"))
        .respond_with(RangeResponder::new(data.clone(), 50, "video/mp4"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    // An existing file makes save-as decline, so the session buffers instead.
    std::fs::write(temp_dir.path().join("trip.mp4"), b"older").expect("seed file");

    let saver = Arc::new(DirectorySaver::new(temp_dir.path()));
    let engine = RangeDownloadEngine::video(
        Arc::new(HttpClient::new()),
        saver.clone(),
        Arc::new(RecordingReporter::default()),
    )
    .with_save_as(Arc::new(DirectorySaveAs::new(temp_dir.path())));

    let url = format!("{}/media/%7B%22fileName%22%3A%22trip.mp4%22%7D", server.uri());
    let outcome = engine.download(&url).await.expect("session should run");
    assert_eq!(saver.flush().await, 0);

    assert!(outcome.is_completed());
    assert_eq!(outcome.sink, SinkKind::Buffered);
    assert_eq!(
        std::fs::read(temp_dir.path().join("trip_2.mp4")).expect("unique file"),
        data
    );
    assert_eq!(
        std::fs::read(temp_dir.path().join("trip.mp4")).expect("seed file"),
        b"older"
    );
}

fn streaming_engine(s: &Setup, dir: &TempDir) -> RangeDownloadEngine {
    s.engine
        .clone()
        .with_save_as(Arc::new(DirectorySaveAs::new(dir.path())))
}

fn dir_entries(dir: &TempDir) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read output dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_streaming_empty_body_leaves_no_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "video/mp4"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let s = setup(MediaKind::Video);
    let url = format!("{}/media/%7B%22fileName%22%3A%22p.mp4%22%7D", server.uri());
    let outcome = streaming_engine(&s, &temp_dir)
        .download(&url)
        .await
        .expect("session should run");

    assert_eq!(outcome.sink, SinkKind::Streaming);
    assert_eq!(outcome.state, SessionState::Aborted);
    assert!(matches!(outcome.error, Some(DownloadError::NoData)));
    assert!(outcome.saved_as.is_none());
    assert!(dir_entries(&temp_dir).is_empty());
}

#[tokio::test]
async fn test_streaming_failure_leaves_no_file_and_rerun_streams() {
    let server = MockServer::start().await;
    let data = payload(30);
    Mock::given(method("GET"))
        .and(header("Range", "bytes=0-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Range", "bytes 0-9/30")
                .set_body_bytes(data[..10].to_vec()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=10-"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Range", "bytes=10-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Content-Type", "video/mp4")
                .insert_header("Content-Range", "bytes 10-29/30")
                .set_body_bytes(data[10..].to_vec()),
        )
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let s = setup(MediaKind::Video);
    let engine = streaming_engine(&s, &temp_dir);
    let url = format!("{}/media/%7B%22fileName%22%3A%22p.mp4%22%7D", server.uri());

    let first = engine.download(&url).await.expect("session should run");
    assert_eq!(first.state, SessionState::Failed);
    assert!(matches!(
        first.error,
        Some(DownloadError::HttpStatus { status: 500, .. })
    ));
    assert!(dir_entries(&temp_dir).is_empty());

    let second = engine.download(&url).await.expect("session should run");
    assert!(second.is_completed(), "outcome: {second:?}");
    assert_eq!(second.sink, SinkKind::Streaming);
    assert_eq!(dir_entries(&temp_dir), vec!["p.mp4".to_string()]);
    assert_eq!(
        std::fs::read(temp_dir.path().join("p.mp4")).expect("file written"),
        data
    );
    assert!(s.saver.saved().is_empty());
}

#[tokio::test]
async fn test_streaming_file_uses_served_extension() {
    let server = MockServer::start().await;
    let data = payload(40);
    Mock::given(method("GET"))
        .respond_with(RangeResponder::new(data.clone(), 25, "video/webm"))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let s = setup(MediaKind::Video);
    let url = format!("{}/media/%7B%22fileName%22%3A%22trip.mp4%22%7D", server.uri());
    let outcome = streaming_engine(&s, &temp_dir)
        .download(&url)
        .await
        .expect("session should run");

    assert!(outcome.is_completed(), "outcome: {outcome:?}");
    assert_eq!(outcome.file_name, "trip.webm");
    assert_eq!(
        outcome.saved_as.as_deref(),
        Some(temp_dir.path().join("trip.webm").as_path())
    );
    assert_eq!(dir_entries(&temp_dir), vec!["trip.webm".to_string()]);
    assert_eq!(
        std::fs::read(temp_dir.path().join("trip.webm")).expect("file written"),
        data
    );
}
