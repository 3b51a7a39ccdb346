//! Channel router: pattern subscriptions and dispatch.
//!
//! Subscriptions are held as an ordered copy-on-write list. `route` takes
//! a snapshot of the list and invokes callbacks without holding any lock,
//! so subscribe/unsubscribe never wait on a running callback. A callback
//! removed mid-dispatch may still see the frame already in flight; once
//! `unsubscribe` returns and that batch drains, it is never invoked
//! again.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use regex::Regex;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::frame::Envelope;

/// Handle naming one live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

/// Subscriber callback, invoked once per matching envelope.
pub type Callback = Box<dyn Fn(&Envelope) + Send + Sync>;

/// A channel matcher: exact name or anchored regex.
///
/// A pattern containing any of `( ) | . * +` is compiled as the regex
/// `^(?:pattern)$`; anything else matches as a literal channel name.
/// `TEST.*` therefore matches `TEST`, `TEST_1` and `TEST_Z`, while the
/// pattern `TEST` matches only the channel `TEST`.
#[derive(Debug)]
enum Pattern {
    Literal(String),
    Regex(Regex),
}

fn is_pattern_char(c: char) -> bool {
    matches!(c, '(' | ')' | '|' | '.' | '*' | '+')
}

impl Pattern {
    fn compile(raw: &str) -> Result<Self> {
        if raw.chars().any(is_pattern_char) {
            let regex =
                Regex::new(&format!("^(?:{raw})$")).map_err(|source| Error::InvalidPattern {
                    pattern: raw.to_string(),
                    source,
                })?;
            Ok(Self::Regex(regex))
        } else {
            Ok(Self::Literal(raw.to_string()))
        }
    }

    fn matches(&self, channel: &str) -> bool {
        match self {
            Self::Literal(name) => name == channel,
            Self::Regex(regex) => regex.is_match(channel),
        }
    }
}

struct Entry {
    id: u64,
    pattern: Pattern,
    callback: Callback,
}

/// Ordered subscription table with snapshot dispatch.
pub struct Router {
    entries: RwLock<Arc<Vec<Arc<Entry>>>>,
    next_id: AtomicU64,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback for every channel matching `pattern`.
    ///
    /// Subscriptions fire in registration order.
    pub fn subscribe(
        &self,
        pattern: &str,
        callback: impl Fn(&Envelope) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        let compiled = Pattern::compile(pattern)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            id,
            pattern: compiled,
            callback: Box::new(callback),
        });

        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = (**entries).clone();
        next.push(entry);
        *entries = Arc::new(next);
        debug!(pattern, id, "subscribed");
        Ok(SubscriptionHandle(id))
    }

    /// Remove one subscription. Other subscriptions, on the same pattern
    /// or not, are unaffected.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = (**entries).clone();
        let before = next.len();
        next.retain(|entry| entry.id != handle.0);
        if next.len() == before {
            return Err(Error::UnknownSubscription(handle.0));
        }
        *entries = Arc::new(next);
        debug!(id = handle.0, "unsubscribed");
        Ok(())
    }

    /// Deliver `envelope` to every matching subscription, in
    /// registration order.
    ///
    /// A panicking callback is logged and isolated; remaining matches
    /// still receive the envelope.
    pub fn route(&self, envelope: &Envelope) {
        let snapshot = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(&entries)
        };
        for entry in snapshot.iter() {
            if !entry.pattern.matches(&envelope.channel) {
                continue;
            }
            let result = catch_unwind(AssertUnwindSafe(|| (entry.callback)(envelope)));
            if result.is_err() {
                error!(
                    channel = %envelope.channel,
                    subscription = entry.id,
                    "subscriber callback panicked; continuing dispatch"
                );
            }
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the table has no subscriptions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
