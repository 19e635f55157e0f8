//! Per-key change subscriptions.
//!
//! Engines publish "this key changed" notifications through a
//! [`ChangeNotifier`]. Every [`WatchSubscription`] owns one task that awaits
//! its callback for each matching notification, strictly in order, so a
//! subscriber never sees two callbacks for the same key running at once.
//!
//! ```text
//! engine write / filesystem event
//!   → ChangeNotifier::notify(key)
//!   → broadcast to subscription tasks
//!   → key filter
//!   → await callback
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{StorageError, StorageResult};

/// Default capacity of the notification channel.
pub const DEFAULT_NOTIFY_CAPACITY: usize = 256;

/// Callback fired when a watched key changes. Carries no payload.
pub type ChangeCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Wrap an async closure as a [`ChangeCallback`].
pub fn change_callback<F, Fut>(f: F) -> ChangeCallback
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// The host component on whose behalf a watch is registered.
///
/// Cancelling the context's shutdown token ends every subscription that was
/// registered with it.
#[derive(Debug, Clone)]
pub struct HostContext {
    name: Arc<str>,
    shutdown: CancellationToken,
}

impl HostContext {
    /// Create a new context with its own shutdown token.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a context whose shutdown follows `parent`.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            shutdown: self.shutdown.child_token(),
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signal shutdown to every watch registered with this context.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether shutdown has been signalled.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.shutdown
    }
}

/// Fan-out point for key-changed notifications.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<Arc<str>>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    /// Create a notifier with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_NOTIFY_CAPACITY)
    }

    /// Create a notifier with the given channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change for `key`. Returns the number of live subscriptions
    /// that received it.
    pub fn notify(&self, key: &str) -> usize {
        match self.sender.send(Arc::from(key)) {
            Ok(count) => {
                trace!(key, receivers = count, "Change notification published");
                count
            },
            Err(_) => 0,
        }
    }

    /// Subscribe `callback` to changes of `key`.
    ///
    /// Notifications published after this call returns are delivered.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Watch`] when called outside a Tokio runtime.
    pub fn subscribe(
        &self,
        key: &str,
        context: &HostContext,
        callback: ChangeCallback,
    ) -> StorageResult<WatchSubscription> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| StorageError::Watch(format!("no async runtime for watcher: {e}")))?;

        let mut receiver = self.sender.subscribe();
        let token = context.token().child_token();
        let task_token = token.clone();
        let watched: Arc<str> = Arc::from(key);
        let owner = context.name.clone();

        let handle = runtime.spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = task_token.cancelled() => break,

                    message = receiver.recv() => match message {
                        Ok(changed) if changed == watched => {
                            trace!(key = %watched, owner = %owner, "Dispatching change callback");
                            callback().await;
                        },
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Our key may be among the dropped notifications.
                            warn!(key = %watched, skipped, "Change watcher lagged");
                            callback().await;
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(key = %watched, owner = %owner, "Change watcher stopped");
        });

        debug!(key, owner = %context.name, "Change watcher registered");
        Ok(WatchSubscription {
            key: key.to_owned(),
            token,
            handle: Some(handle),
        })
    }
}

/// Handle to a registered change watcher.
///
/// Dropping the handle stops the watch. [`dispose`](Self::dispose) also
/// waits for an in-flight callback to finish.
#[must_use = "dropping a subscription stops the watch"]
#[derive(Debug)]
pub struct WatchSubscription {
    key: String,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl WatchSubscription {
    /// The watched key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the watch is still delivering callbacks.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the watch and wait until its task has exited.
    ///
    /// No callback runs after this returns. Must not be awaited from inside
    /// this subscription's own callback.
    pub async fn dispose(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
            && !e.is_cancelled()
        {
            warn!(key = %self.key, error = %e, "Change watcher task failed");
        }
    }
}

impl Drop for WatchSubscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ChangeCallback {
        let counter = Arc::clone(counter);
        change_callback(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_callback_fires_for_matching_key() {
        let notifier = ChangeNotifier::new();
        let context = HostContext::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let _sub = notifier
            .subscribe("users", &context, counting_callback(&counter))
            .unwrap();

        assert_eq!(notifier.notify("users"), 1);
        notifier.notify("other");
        settle().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispose_stops_callbacks() {
        let notifier = ChangeNotifier::new();
        let context = HostContext::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let sub = notifier
            .subscribe("users", &context, counting_callback(&counter))
            .unwrap();
        assert!(sub.is_active());
        sub.dispose().await;

        notifier.notify("users");
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_shutdown_ends_subscription() {
        let notifier = ChangeNotifier::new();
        let context = HostContext::new("test");
        let counter = Arc::new(AtomicUsize::new(0));

        let sub = notifier
            .subscribe("users", &context, counting_callback(&counter))
            .unwrap();
        context.shutdown();
        settle().await;

        assert!(!sub.is_active());
        notifier.notify("users");
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscribe_outside_runtime_fails() {
        let notifier = ChangeNotifier::new();
        let context = HostContext::new("test");
        let result = notifier.subscribe("users", &context, change_callback(|| async {}));
        assert!(matches!(result, Err(StorageError::Watch(_))));
    }

    #[test]
    fn test_child_context_follows_parent() {
        let parent = HostContext::new("host");
        let child = parent.child("users");
        assert_eq!(child.name(), "users");
        parent.shutdown();
        assert!(child.is_shut_down());
    }
}
