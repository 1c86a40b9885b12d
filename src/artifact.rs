//! Lock-protected artifacts with change notification
//!
//! An artifact is a remotely-sourced mutable value that can be read and
//! updated across concurrent tasks and that notifies registered listener
//! channels whenever its content changes. Concrete payload types implement
//! [`Artifact`] and compose a [`Notifier`] for the shared timestamp and
//! listener state; [`ArtifactCell`] supplies the single reader-writer lock
//! that guards payload, timestamp, and listener list together.

use crate::clock::Clock;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A mutable payload that can be refreshed from raw remote bytes
///
/// Implementors own the payload shape and its parsing; the locking and
/// notification behavior is identical across all artifact kinds and comes
/// from the composed [`Notifier`].
pub trait Artifact: Send + Sync {
    /// Shared notification state (timestamp and listener list)
    fn notifier(&self) -> &Notifier;

    /// Mutable access to the shared notification state
    fn notifier_mut(&mut self) -> &mut Notifier;

    /// Parse `body` and apply it to the payload
    ///
    /// Runs with the exclusive lock held (guaranteed by `&mut self` through
    /// [`ArtifactCell::apply`]). Implementations must be all-or-nothing: on
    /// error the payload is left as it was. Must not touch the notifier;
    /// timestamp advancement and listener delivery happen in
    /// [`ArtifactCell::notify_updated`], invoked by the caller after the
    /// lock is released.
    fn update(&mut self, body: &[u8]) -> Result<()>;
}

/// Reusable notification state composed into concrete artifact types
///
/// Holds the last-modified timestamp and the registered listener channels.
/// `Notifier` itself carries no lock; the enclosing [`ArtifactCell`] guards
/// it together with the payload.
#[derive(Debug)]
pub struct Notifier {
    modified_at: DateTime<Utc>,
    listeners: Vec<mpsc::Sender<()>>,
}

impl Notifier {
    /// Create an empty notifier with the timestamp at the Unix epoch
    pub fn new() -> Self {
        Self {
            modified_at: DateTime::UNIX_EPOCH,
            listeners: Vec::new(),
        }
    }

    /// Time of the last successful update-and-notify cycle
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    /// Add a listener channel for change notifications
    ///
    /// Fails with [`Error::ClosedChannel`] when the channel's receiver is
    /// already gone; such a channel can never deliver. Registrations are not
    /// deduplicated: registering the same channel twice yields two
    /// independent delivery attempts per notification.
    pub fn register(&mut self, notify: mpsc::Sender<()>) -> Result<()> {
        if notify.is_closed() {
            return Err(Error::ClosedChannel);
        }

        self.listeners.push(notify);
        Ok(())
    }

    /// Number of registered listener channels
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stamp the last-modified time
    pub(crate) fn set_modified_at(&mut self, at: DateTime<Utc>) {
        self.modified_at = at;
    }

    /// Attempt a non-blocking delivery to every registered listener
    ///
    /// A listener whose buffer is full or whose receiver is gone is skipped;
    /// deliveries are never retried or queued.
    pub(crate) fn notify_all(&self) {
        for notify in &self.listeners {
            let _ = notify.try_send(());
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to an artifact
///
/// Wraps the artifact in the single reader-writer lock that guards payload,
/// timestamp, and listener list. Clones share the same underlying artifact;
/// the type-erased form (`ArtifactCell<dyn Artifact>`, the default) is what
/// the poller tracks.
pub struct ArtifactCell<A: Artifact + ?Sized = dyn Artifact> {
    inner: Arc<RwLock<A>>,
}

impl<A: Artifact + ?Sized> Clone for ArtifactCell<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Artifact + 'static> ArtifactCell<A> {
    /// Wrap a concrete artifact
    pub fn new(artifact: A) -> Self {
        Self {
            inner: Arc::new(RwLock::new(artifact)),
        }
    }

    /// Type-erased clone of this handle, sharing the same lock and payload
    pub fn as_dyn(&self) -> ArtifactCell {
        let inner: Arc<RwLock<dyn Artifact>> = self.inner.clone();
        ArtifactCell { inner }
    }
}

impl<A: Artifact + ?Sized> ArtifactCell<A> {
    /// Time of the last successful update-and-notify cycle
    pub async fn modified_at(&self) -> DateTime<Utc> {
        self.inner.read().await.notifier().modified_at()
    }

    /// Register a listener channel for change notifications
    pub async fn register(&self, notify: mpsc::Sender<()>) -> Result<()> {
        self.inner.write().await.notifier_mut().register(notify)
    }

    /// Apply new content under the exclusive lock
    ///
    /// Holds the write lock for the duration of [`Artifact::update`] and
    /// releases it before returning. Never notifies: callers that applied a
    /// successful update follow up with
    /// [`notify_updated`](ArtifactCell::notify_updated).
    pub async fn apply(&self, body: &[u8]) -> Result<()> {
        self.inner.write().await.update(body)
    }

    /// Stamp the modification time from `clock` and fan out to listeners
    ///
    /// The timestamp write happens under the exclusive lock; delivery then
    /// happens under a shared lock with a non-blocking send per listener, so
    /// a slow or absent consumer never stalls this call.
    pub async fn notify_updated(&self, clock: &dyn Clock) {
        let now = clock.now();
        self.inner.write().await.notifier_mut().set_modified_at(now);

        let guard = self.inner.read().await;
        guard.notifier().notify_all();
    }

    /// Shared read access to the artifact
    pub async fn read(&self) -> RwLockReadGuard<'_, A> {
        self.inner.read().await
    }

    /// Exclusive write access to the artifact
    pub async fn write(&self) -> RwLockWriteGuard<'_, A> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Duration;
    use std::collections::HashSet;

    /// Deny-list artifact fed by a JSON list payload
    #[derive(Default)]
    struct Blocklist {
        notifier: Notifier,
        entries: HashSet<String>,
    }

    impl Artifact for Blocklist {
        fn notifier(&self) -> &Notifier {
            &self.notifier
        }

        fn notifier_mut(&mut self) -> &mut Notifier {
            &mut self.notifier
        }

        fn update(&mut self, body: &[u8]) -> Result<()> {
            let entries: Vec<String> = serde_json::from_slice(body)?;
            self.entries.extend(entries);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_update_applies_payload() {
        let cell = ArtifactCell::new(Blocklist::default());
        cell.apply(br#"["foo", "bar"]"#).await.unwrap();

        let guard = cell.read().await;
        assert!(guard.entries.contains("foo"));
        assert!(guard.entries.contains("bar"));
        assert_eq!(guard.entries.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_update_leaves_payload() {
        let cell = ArtifactCell::new(Blocklist::default());
        cell.apply(br#"["foo"]"#).await.unwrap();

        let err = cell.apply(b"not json").await.unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));

        let guard = cell.read().await;
        assert_eq!(guard.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_does_not_notify() {
        let cell = ArtifactCell::new(Blocklist::default());
        let (tx, mut rx) = mpsc::channel(4);
        cell.register(tx).await.unwrap();

        cell.apply(br#"["foo"]"#).await.unwrap();

        assert!(rx.try_recv().is_err(), "update alone must not notify");
        assert_eq!(cell.modified_at().await, DateTime::UNIX_EPOCH);
    }

    #[tokio::test]
    async fn test_register_and_notify_exactly_once() {
        let clock = ManualClock::new(Utc::now());
        let cell = ArtifactCell::new(Blocklist::default());
        let (tx, mut rx) = mpsc::channel(4);

        cell.register(tx).await.unwrap();
        cell.notify_updated(&clock).await;

        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err(), "exactly one notification per call");
    }

    #[tokio::test]
    async fn test_register_closed_channel_fails() {
        let cell = ArtifactCell::new(Blocklist::default());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let err = cell.register(tx).await.unwrap_err();
        assert!(matches!(err, Error::ClosedChannel));
        assert_eq!(cell.read().await.notifier().listener_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_updated_stamps_clock_time() {
        let t0 = Utc::now();
        let clock = ManualClock::new(t0);
        let cell = ArtifactCell::new(Blocklist::default());

        cell.notify_updated(&clock).await;
        assert_eq!(cell.modified_at().await, t0);

        clock.advance(Duration::seconds(10));
        cell.notify_updated(&clock).await;
        assert_eq!(cell.modified_at().await, t0 + Duration::seconds(10));
    }

    #[tokio::test]
    async fn test_modified_at_never_decreases_under_steady_clock() {
        let clock = ManualClock::new(Utc::now());
        let cell = ArtifactCell::new(Blocklist::default());

        cell.notify_updated(&clock).await;
        let first = cell.modified_at().await;
        cell.notify_updated(&clock).await;

        assert!(cell.modified_at().await >= first);
    }

    #[tokio::test]
    async fn test_notify_does_not_block_on_full_buffer() {
        let clock = ManualClock::new(Utc::now());
        let cell = ArtifactCell::new(Blocklist::default());
        let (tx, mut rx) = mpsc::channel(1);
        cell.register(tx).await.unwrap();

        // Nobody is reading; only the first delivery fits the buffer.
        cell.notify_updated(&clock).await;
        cell.notify_updated(&clock).await;
        cell.notify_updated(&clock).await;

        // The overflowing deliveries were skipped, not queued.
        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_registration_delivers_twice() {
        let clock = ManualClock::new(Utc::now());
        let cell = ArtifactCell::new(Blocklist::default());
        let (tx, mut rx) = mpsc::channel(4);

        cell.register(tx.clone()).await.unwrap();
        cell.register(tx).await.unwrap();
        cell.notify_updated(&clock).await;

        rx.try_recv().unwrap();
        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
    }
}
