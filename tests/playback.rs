//! Playback queue integration tests
//!
//! Drives the scheduler against a mock voice backend and real clip files

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use disquoter::{PlaybackEvent, PlaybackRequest, PlaybackScheduler, VoiceConnectionPool};

mod common;
use common::{MockVoiceBackend, VoiceLog, touch_clips, wait_for_outcomes};

const TIMEOUT: Duration = Duration::from_secs(5);

fn start(
    backend: MockVoiceBackend,
    dir: &Path,
    timeout: Duration,
) -> (PlaybackScheduler, Arc<VoiceLog>, Arc<VoiceConnectionPool>) {
    let log = Arc::clone(&backend.log);
    let pool = Arc::new(VoiceConnectionPool::new(Arc::new(backend)));
    let (scheduler, _worker) =
        PlaybackScheduler::spawn(Arc::clone(&pool), dir.to_path_buf(), timeout);
    (scheduler, log, pool)
}

/// Poll until `cond` holds, giving the worker time to release connections
async fn settle(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held");
}

#[tokio::test]
async fn test_fifo_across_destinations() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav", "c.wav"]);
    let (scheduler, log, _pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-2"));
    scheduler.enqueue(PlaybackRequest::new("c.wav", "vc-1"));

    wait_for_outcomes(&mut events, 3).await;

    assert_eq!(log.played_names(), vec!["a.wav", "b.wav", "c.wav"]);
}

#[tokio::test]
async fn test_only_one_clip_plays_at_a_time() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav", "c.wav"]);
    let (scheduler, _log, _pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    for (clip, dest) in [("a.wav", "vc-1"), ("b.wav", "vc-2"), ("c.wav", "vc-3")] {
        scheduler.enqueue(PlaybackRequest::new(clip, dest));
    }

    let events = wait_for_outcomes(&mut events, 3).await;

    // Every Started is followed by its outcome before the next Started
    let mut in_flight = 0i32;
    for event in &events {
        match event {
            PlaybackEvent::Started(_) => in_flight += 1,
            PlaybackEvent::Finished(_) | PlaybackEvent::Failed { .. } => in_flight -= 1,
        }
        assert!((0..=1).contains(&in_flight), "overlapping playback: {events:?}");
    }
}

#[tokio::test]
async fn test_connection_reused_and_released_once() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav"]);
    let (scheduler, log, pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-1"));

    wait_for_outcomes(&mut events, 2).await;
    settle(|| log.leaves.load(Ordering::SeqCst) == 1).await;

    assert_eq!(log.joins.load(Ordering::SeqCst), 1);
    assert_eq!(log.leaves.load(Ordering::SeqCst), 1);
    assert!(pool.is_empty().await);
    assert_eq!(scheduler.pending(), 0);
}

#[tokio::test]
async fn test_connection_released_between_destinations() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav", "c.wav"]);
    let (scheduler, log, pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-2"));
    scheduler.enqueue(PlaybackRequest::new("c.wav", "vc-1"));

    // While b plays, vc-1 still has c queued so its connection stays up
    let first = wait_for_outcomes(&mut events, 2).await;
    assert!(matches!(first.last(), Some(PlaybackEvent::Finished(r)) if r.asset_name == "b.wav"));
    assert!(pool.contains("vc-1").await);

    wait_for_outcomes(&mut events, 1).await;
    settle(|| log.leaves.load(Ordering::SeqCst) == 2).await;

    assert_eq!(log.joins.load(Ordering::SeqCst), 2);
    assert!(pool.is_empty().await);
}

#[tokio::test]
async fn test_failed_clip_does_not_stop_queue() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "broken.wav", "c.wav"]);
    let backend = MockVoiceBackend {
        failing: ["broken".to_string()].into(),
        ..MockVoiceBackend::default()
    };
    let (scheduler, log, _pool) = start(backend, dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("broken.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("c.wav", "vc-1"));

    let events = wait_for_outcomes(&mut events, 3).await;

    assert_eq!(log.played_names(), vec!["a.wav", "c.wav"]);
    assert!(events.iter().any(|e| matches!(
        e,
        PlaybackEvent::Failed { request, .. } if request.asset_name == "broken.wav"
    )));
}

#[tokio::test]
async fn test_missing_clip_fails_and_releases() {
    let dir = tempfile::tempdir().unwrap();
    let (scheduler, log, pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("gone.wav", "vc-1"));

    let events = wait_for_outcomes(&mut events, 1).await;
    assert!(matches!(events.last(), Some(PlaybackEvent::Failed { .. })));

    settle(|| log.leaves.load(Ordering::SeqCst) == 1).await;
    assert!(pool.is_empty().await);
}

#[tokio::test]
async fn test_unreachable_destination_fails_only_its_clip() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav"]);
    let backend = MockVoiceBackend {
        unreachable: ["vc-dead".to_string()].into(),
        ..MockVoiceBackend::default()
    };
    let (scheduler, log, _pool) = start(backend, dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-dead"));
    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-1"));

    wait_for_outcomes(&mut events, 2).await;
    assert_eq!(log.played_names(), vec!["b.wav"]);
}

#[tokio::test]
async fn test_hanging_clip_times_out() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["stuck.wav", "b.wav"]);
    let backend = MockVoiceBackend {
        hanging: ["stuck".to_string()].into(),
        ..MockVoiceBackend::default()
    };
    let (scheduler, log, _pool) = start(backend, dir.path(), Duration::from_millis(200));
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("stuck.wav", "vc-1"));
    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-1"));

    let events = wait_for_outcomes(&mut events, 2).await;

    assert!(matches!(
        &events[1],
        PlaybackEvent::Failed { request, error }
            if request.asset_name == "stuck.wav" && error.contains("timed out")
    ));
    assert_eq!(log.played_names(), vec!["b.wav"]);
}

#[tokio::test]
async fn test_companion_preferred_for_playback() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "a.pcm"]);
    let (scheduler, log, _pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    wait_for_outcomes(&mut events, 1).await;

    assert_eq!(log.played_names(), vec!["a.pcm"]);
}

#[tokio::test]
async fn test_queue_restarts_after_draining() {
    let dir = tempfile::tempdir().unwrap();
    touch_clips(dir.path(), &["a.wav", "b.wav"]);
    let (scheduler, log, _pool) = start(MockVoiceBackend::default(), dir.path(), TIMEOUT);
    let mut events = scheduler.subscribe();

    scheduler.enqueue(PlaybackRequest::new("a.wav", "vc-1"));
    wait_for_outcomes(&mut events, 1).await;
    settle(|| log.leaves.load(Ordering::SeqCst) == 1).await;

    scheduler.enqueue(PlaybackRequest::new("b.wav", "vc-1"));
    wait_for_outcomes(&mut events, 1).await;

    assert_eq!(log.played_names(), vec!["a.wav", "b.wav"]);
    assert_eq!(log.joins.load(Ordering::SeqCst), 2);
}
