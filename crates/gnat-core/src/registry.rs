//! Subscription registry.
//!
//! Maps subscription ids to delivery handlers. The facade adds entries, the read
//! loop looks them up; both sides only ever hold a shard lock for a single map
//! operation, and handlers are invoked after the lookup has returned.

use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// A subscription identifier.
pub type Sid = u64;

/// Delivery callback: `(subject, reply_to, payload)`.
pub type MessageHandler = Arc<dyn Fn(&str, Option<&str>, &Bytes) + Send + Sync>;

/// A registered subscription.
pub struct Subscription {
    sid: Sid,
    subject: String,
    queue: Option<String>,
    handler: MessageHandler,
}

impl Subscription {
    /// Get the subscription id.
    #[must_use]
    pub fn sid(&self) -> Sid {
        self.sid
    }

    /// Get the subscribed subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Get the queue group, if any.
    #[must_use]
    pub fn queue(&self) -> Option<&str> {
        self.queue.as_deref()
    }

    /// Invoke the handler on the caller's task.
    pub fn deliver(&self, subject: &str, reply_to: Option<&str>, payload: &Bytes) {
        trace!(sid = self.sid, subject = %subject, bytes = payload.len(), "Delivering message");
        (self.handler)(subject, reply_to, payload);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("sid", &self.sid)
            .field("subject", &self.subject)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Concurrency-safe map from subscription id to handler.
///
/// Ids start at 1 and are never reused, even after removal.
pub struct SubscriptionRegistry {
    /// Last allocated id.
    last_sid: AtomicU64,
    /// Live subscriptions indexed by id.
    subscriptions: DashMap<Sid, Arc<Subscription>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_sid: AtomicU64::new(0),
            subscriptions: DashMap::new(),
        }
    }

    /// Reserve the next subscription id without registering anything.
    pub fn allocate_sid(&self) -> Sid {
        self.last_sid.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Register a handler under a previously allocated id.
    pub fn insert(
        &self,
        sid: Sid,
        subject: impl Into<String>,
        queue: Option<String>,
        handler: MessageHandler,
    ) {
        let subscription = Subscription {
            sid,
            subject: subject.into(),
            queue,
            handler,
        };
        debug!(sid, subject = %subscription.subject, "Registered subscription");
        self.subscriptions.insert(sid, Arc::new(subscription));
    }

    /// Allocate an id and register a handler under it.
    pub fn add(
        &self,
        subject: impl Into<String>,
        queue: Option<String>,
        handler: MessageHandler,
    ) -> Sid {
        let sid = self.allocate_sid();
        self.insert(sid, subject, queue, handler);
        sid
    }

    /// Look up a subscription.
    ///
    /// The returned `Arc` outlives the shard lock, so the caller can invoke the
    /// handler without blocking other registry users.
    #[must_use]
    pub fn lookup(&self, sid: Sid) -> Option<Arc<Subscription>> {
        self.subscriptions.get(&sid).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove a subscription. Removing an absent id is a no-op.
    pub fn remove(&self, sid: Sid) -> Option<Arc<Subscription>> {
        let removed = self.subscriptions.remove(&sid).map(|(_, sub)| sub);
        if removed.is_some() {
            debug!(sid, "Removed subscription");
        }
        removed
    }

    /// Check whether an id is registered.
    #[must_use]
    pub fn contains(&self, sid: Sid) -> bool {
        self.subscriptions.contains_key(&sid)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Check if there are no live subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Ids of all live subscriptions, in ascending order.
    #[must_use]
    pub fn sids(&self) -> Vec<Sid> {
        let mut sids: Vec<Sid> = self.subscriptions.iter().map(|e| *e.key()).collect();
        sids.sort_unstable();
        sids
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
