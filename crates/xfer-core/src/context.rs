//! Per-operation context: cancellation plus a hierarchical key/value bag.
//!
//! A `Context` is created for one top-level call and handed to every policy,
//! the transport, and each chunk worker. Children see their ancestors' values
//! and cancellation; cancelling a child never affects its parent.

use crate::fault::Fault;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest single sleep slice while waiting; bounds how late a cancel is seen.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

#[derive(Default)]
struct Node {
    parent: Option<Arc<Node>>,
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    values: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
}

/// Cancellation signal and value bag for one logical operation. Cheap to clone;
/// clones share the same node.
#[derive(Clone, Default)]
pub struct Context {
    node: Arc<Node>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    fn derive(&self, deadline: Option<Instant>, values: HashMap<&'static str, Arc<dyn Any + Send + Sync>>) -> Self {
        Context {
            node: Arc::new(Node {
                parent: Some(Arc::clone(&self.node)),
                cancelled: AtomicBool::new(false),
                deadline,
                values,
            }),
        }
    }

    /// New child that inherits values and cancellation from `self`.
    pub fn child(&self) -> Self {
        self.derive(None, HashMap::new())
    }

    /// Child carrying one extra entry; the parent is not modified.
    pub fn with_value<T: Any + Send + Sync>(&self, key: &'static str, value: T) -> Self {
        let mut values: HashMap<&'static str, Arc<dyn Any + Send + Sync>> = HashMap::new();
        values.insert(key, Arc::new(value));
        self.derive(None, values)
    }

    /// Child that reads as cancelled once `deadline` has passed.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        self.derive(Some(deadline), HashMap::new())
    }

    /// Child that reads as cancelled after `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Looks up `key` starting at this node; the nearest ancestor wins.
    /// Returns `None` if the key is absent or holds a different type.
    pub fn value<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        let mut node: &Node = &self.node;
        loop {
            if let Some(v) = node.values.get(key) {
                return v.downcast_ref::<T>();
            }
            node = node.parent.as_deref()?;
        }
    }

    /// Cancel this context and every descendant.
    pub fn cancel(&self) {
        self.node.cancelled.store(true, Ordering::Release);
    }

    /// True if this context or any ancestor was cancelled or hit its deadline.
    pub fn is_cancelled(&self) -> bool {
        let now = Instant::now();
        let mut node: &Node = &self.node;
        loop {
            if node.cancelled.load(Ordering::Acquire) {
                return true;
            }
            if node.deadline.is_some_and(|d| now >= d) {
                return true;
            }
            match node.parent.as_deref() {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    /// `Err(Fault::Cancelled)` once cancellation is observed.
    pub fn check(&self) -> Result<(), Fault> {
        if self.is_cancelled() {
            Err(Fault::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Blocks the current thread for `duration`, waking early with
    /// `Fault::Cancelled` if the context is cancelled meanwhile.
    pub fn sleep(&self, duration: Duration) -> Result<(), Fault> {
        let until = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= until {
                return Ok(());
            }
            std::thread::sleep((until - now).min(SLEEP_SLICE));
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.is_cancelled())
            .field("keys", &self.node.values.keys().collect::<Vec<_>>())
            .finish()
    }
}
