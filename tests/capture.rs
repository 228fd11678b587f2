//! Speech capture controller tests

use cosmo_voice::RecognitionError;
use cosmo_voice::voice::{CaptureEventKind, EngineError, SpeechCaptureController};

mod common;

use common::{EngineHandle, FakeEngine};

fn controller() -> (SpeechCaptureController, EngineHandle) {
    let (engine, handle) = FakeEngine::new();
    (SpeechCaptureController::new(Box::new(engine)), handle)
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    engine.final_on_stop("hello");

    let first = capture.stop().await.unwrap();
    assert_eq!(first.unwrap().text(), "hello");
    assert_eq!(engine.stops(), 1);

    assert!(capture.stop().await.unwrap().is_none());
    assert!(capture.stop().await.unwrap().is_none());
    assert_eq!(engine.stops(), 1);
    assert!(!capture.is_listening());
}

#[tokio::test]
async fn test_stop_without_final_returns_none() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    engine.partial("hel");

    assert!(capture.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_pending_error_is_returned_by_stop() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    engine.final_result("half a sentence");
    engine.error("network", "lost connection");

    let err = capture.stop().await.unwrap_err();

    assert_eq!(
        err,
        RecognitionError::Engine {
            code: "network".to_string(),
            message: "lost connection".to_string(),
        }
    );
    assert!(!capture.is_listening());
    assert!(capture.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_events_after_stop_are_dropped() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    capture.stop().await.unwrap();

    engine.final_result("too late");
    engine.error("network", "too late");

    let mut next = tokio_test::task::spawn(capture.next_event());
    tokio_test::assert_pending!(next.poll());
}

#[tokio::test]
async fn test_events_are_tagged_with_capture_id() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    let first_id = capture.capture_id();
    engine.partial("one");
    let event = capture.next_event().await;
    assert_eq!(event.capture_id, first_id);
    assert_eq!(event.kind, CaptureEventKind::Partial("one".to_string()));

    capture.stop().await.unwrap();
    capture.start("en-US").await.unwrap();
    assert!(capture.capture_id() > first_id);

    engine.final_result("two");
    let event = capture.next_event().await;
    assert_eq!(event.capture_id, capture.capture_id());
    assert_eq!(event.kind, CaptureEventKind::Final("two".to_string()));
}

#[tokio::test]
async fn test_start_while_listening_restarts() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    engine.final_result("stale");
    capture.start("en-US").await.unwrap();

    assert_eq!(engine.starts(), 2);
    assert_eq!(engine.stops(), 1);
    // Results from the first capture do not leak into the second
    assert!(capture.stop().await.unwrap().is_none());
}

#[tokio::test]
async fn test_already_started_is_retried_once() {
    let (mut capture, engine) = controller();
    engine.fail_next_start(EngineError::already_started());

    capture.start("en-US").await.unwrap();

    assert!(capture.is_listening());
    assert_eq!(engine.stops(), 1);
    assert_eq!(engine.starts(), 1);
}

#[tokio::test]
async fn test_repeated_already_started_surfaces() {
    let (mut capture, engine) = controller();
    engine.fail_next_start(EngineError::already_started());
    engine.fail_next_start(EngineError::already_started());

    let err = capture.start("en-US").await.unwrap_err();

    assert!(matches!(err, RecognitionError::Engine { .. }));
    assert!(!capture.is_listening());
}

#[tokio::test]
async fn test_other_start_errors_are_not_retried() {
    let (mut capture, engine) = controller();
    engine.fail_next_start(EngineError::new("permissions", "microphone access denied"));

    let err = capture.start("en-US").await.unwrap_err();

    assert_eq!(
        err,
        RecognitionError::Engine {
            code: "permissions".to_string(),
            message: "microphone access denied".to_string(),
        }
    );
    assert_eq!(engine.stops(), 0);
}

#[tokio::test]
async fn test_unavailable_engine() {
    let (mut capture, engine) = controller();
    engine.set_available(false);

    let err = capture.start("en-US").await.unwrap_err();

    assert_eq!(err, RecognitionError::EngineUnavailable);
    assert_eq!(engine.starts(), 0);
}

#[tokio::test]
async fn test_already_started_event_is_ignored() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    engine.error("already_started", "Speech recognition already started!");
    engine.partial("still here");

    let event = capture.next_event().await;
    assert_eq!(event.kind, CaptureEventKind::Partial("still here".to_string()));
}

#[tokio::test]
async fn test_teardown_detaches_engine() {
    let (mut capture, engine) = controller();

    capture.start("en-US").await.unwrap();
    capture.teardown().await;

    assert!(!engine.is_active());
    assert!(!engine.is_subscribed());

    drop(capture);
    assert_eq!(engine.unsubscribes(), 1);
}

#[tokio::test]
async fn test_drop_detaches_engine() {
    let (capture, engine) = controller();
    assert!(engine.is_subscribed());

    drop(capture);
    assert!(!engine.is_subscribed());
}
