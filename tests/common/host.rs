//! In-memory stand-in for the Docker Engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::mpsc;

use backup_warden::discovery::{
    BackupTarget, DiscoveryError, LifecycleAction, LifecycleEvent, LifecycleEventSource,
    LifecycleEventStream, TargetSource, TriggerControl,
};

/// Fake container host backing all three discovery seams.
///
/// Tests mutate the container set directly and emit lifecycle events to
/// every live subscription, the way a real daemon would.
pub struct FakeDockerHost {
    containers: Mutex<Vec<BackupTarget>>,
    event_senders: Mutex<Vec<mpsc::Sender<anyhow::Result<LifecycleEvent>>>>,
    cleared_triggers: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl FakeDockerHost {
    pub fn new() -> Self {
        Self {
            containers: Mutex::new(Vec::new()),
            event_senders: Mutex::new(Vec::new()),
            cleared_triggers: Mutex::new(Vec::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Add a container and emit the create/start event pair.
    pub async fn start_container(&self, target: BackupTarget) {
        let name = target.name.clone();
        self.containers.lock().unwrap().push(target);
        self.emit(LifecycleEvent::new(&name, LifecycleAction::Create))
            .await;
        self.emit(LifecycleEvent::new(&name, LifecycleAction::Start))
            .await;
    }

    /// Remove a container and emit the die/destroy event pair.
    pub async fn remove_container(&self, name: &str) {
        self.containers.lock().unwrap().retain(|c| c.name != name);
        self.emit(LifecycleEvent::new(name, LifecycleAction::Die))
            .await;
        self.emit(LifecycleEvent::new(name, LifecycleAction::Destroy))
            .await;
    }

    /// Add a container without emitting any events.
    pub fn add_container_silently(&self, target: BackupTarget) {
        self.containers.lock().unwrap().push(target);
    }

    /// Set the trigger flag on a stored container.
    pub fn set_trigger(&self, name: &str) {
        let mut containers = self.containers.lock().unwrap();
        if let Some(target) = containers.iter_mut().find(|c| c.name == name) {
            target.trigger_requested = true;
        }
    }

    pub fn trigger_is_set(&self, name: &str) -> bool {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.name == name && c.trigger_requested)
    }

    /// Make every API call fail until flipped back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Names whose trigger flag was cleared, in call order.
    pub fn cleared_triggers(&self) -> Vec<String> {
        self.cleared_triggers.lock().unwrap().clone()
    }

    /// Send an event to every live subscription.
    pub async fn emit(&self, event: LifecycleEvent) {
        let senders = self.event_senders.lock().unwrap().clone();
        for sender in senders {
            let _ = sender.send(Ok(event.clone())).await;
        }
    }

    /// Drop all live subscriptions, ending their streams.
    pub fn drop_subscriptions(&self) {
        self.event_senders.lock().unwrap().clear();
    }

    fn check_available(&self) -> Result<(), DiscoveryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Unavailable(
                "host is down for this test".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl TargetSource for FakeDockerHost {
    async fn list_targets(&self) -> Result<Vec<BackupTarget>, DiscoveryError> {
        self.check_available()?;
        Ok(self.containers.lock().unwrap().clone())
    }
}

#[async_trait]
impl TriggerControl for FakeDockerHost {
    async fn clear_trigger(&self, name: &str) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("host is down for this test");
        }
        let mut containers = self.containers.lock().unwrap();
        let target = containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| anyhow::anyhow!("no such container: {}", name))?;
        target.trigger_requested = false;
        drop(containers);

        self.cleared_triggers.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl LifecycleEventSource for FakeDockerHost {
    async fn subscribe(&self) -> anyhow::Result<LifecycleEventStream> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("host is down for this test");
        }
        let (tx, rx) = mpsc::channel(16);
        self.event_senders.lock().unwrap().push(tx);
        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}
