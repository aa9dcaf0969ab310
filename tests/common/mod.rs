//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use disquoter::voice::DestinationId;
use disquoter::{
    ChatPlatform, Error, OutgoingMessage, PlayableSource, PlaybackEvent, Result, VoiceBackend,
    VoiceConnection,
};
use tokio::sync::{Mutex, broadcast};

/// Something the mock platform was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAction {
    Sent(OutgoingMessage),
    Deleted {
        channel_id: String,
        message_id: String,
    },
    Direct {
        user_id: String,
        content: String,
    },
}

/// Chat platform that records every outbound action
///
/// The first `failing_sends` sends return an error and are not recorded.
#[derive(Default)]
pub struct MockPlatform {
    actions: Mutex<Vec<PlatformAction>>,
    pub failing_sends: AtomicUsize,
}

impl MockPlatform {
    pub async fn actions(&self) -> Vec<PlatformAction> {
        self.actions.lock().await.clone()
    }

    pub async fn sent_contents(&self) -> Vec<String> {
        self.actions()
            .await
            .into_iter()
            .filter_map(|a| match a {
                PlatformAction::Sent(m) => Some(m.content),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::Channel("send rejected".to_string()));
        }

        self.actions.lock().await.push(PlatformAction::Sent(message));
        Ok(())
    }

    async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.actions.lock().await.push(PlatformAction::Deleted {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn send_direct(&self, user_id: &str, content: &str) -> Result<()> {
        self.actions.lock().await.push(PlatformAction::Direct {
            user_id: user_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}

/// Shared record of what the mock voice backend did
#[derive(Default)]
pub struct VoiceLog {
    pub joins: AtomicUsize,
    pub leaves: AtomicUsize,
    /// (destination, file name) in play order
    pub played: std::sync::Mutex<Vec<(DestinationId, String)>>,
}

impl VoiceLog {
    pub fn played_names(&self) -> Vec<String> {
        self.played
            .lock()
            .unwrap()
            .iter()
            .map(|(_, name)| name.clone())
            .collect()
    }
}

/// Voice backend that "plays" by sleeping briefly
///
/// Clips named in `failing` return an error; clips in `hanging` never finish;
/// destinations in `unreachable` cannot be joined.
#[derive(Default)]
pub struct MockVoiceBackend {
    pub log: Arc<VoiceLog>,
    pub failing: HashSet<String>,
    pub hanging: HashSet<String>,
    pub unreachable: HashSet<String>,
}

#[async_trait]
impl VoiceBackend for MockVoiceBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn join(&self, destination: &str) -> Result<Arc<dyn VoiceConnection>> {
        if self.unreachable.contains(destination) {
            return Err(Error::Voice(format!("cannot reach {destination}")));
        }
        self.log.joins.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            destination: destination.to_string(),
            log: Arc::clone(&self.log),
            failing: self.failing.clone(),
            hanging: self.hanging.clone(),
        }))
    }
}

struct MockConnection {
    destination: String,
    log: Arc<VoiceLog>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
}

#[async_trait]
impl VoiceConnection for MockConnection {
    async fn play(&self, source: PlayableSource) -> Result<()> {
        let name = source
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.hanging.iter().any(|h| name.starts_with(h.as_str())) {
            std::future::pending::<()>().await;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;

        if self.failing.iter().any(|f| name.starts_with(f.as_str())) {
            return Err(Error::Playback(format!("{name} is broken")));
        }

        self.log
            .played
            .lock()
            .unwrap()
            .push((self.destination.clone(), name));
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        self.log.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Create empty clip files in `dir`
pub fn touch_clips(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"clip").unwrap();
    }
}

/// Collect events until `done` requests have finished or failed
pub async fn wait_for_outcomes(
    rx: &mut broadcast::Receiver<PlaybackEvent>,
    done: usize,
) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    let mut outcomes = 0;

    while outcomes < done {
        let event = tokio::time::timeout(Duration::from_secs(600), rx.recv())
            .await
            .expect("timed out waiting for playback events")
            .expect("event channel closed");

        if matches!(
            event,
            PlaybackEvent::Finished(_) | PlaybackEvent::Failed { .. }
        ) {
            outcomes += 1;
        }
        events.push(event);
    }

    events
}
