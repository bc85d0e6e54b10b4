/*
[INPUT]:  Resource owners that need to run cleanup when a UI element goes away
[OUTPUT]: Scope handles with teardown registration and idempotent destruction
[POS]:    Lifetime layer - owner scopes for subscriptions, timers and hooks
[UPDATE]: When teardown ordering or parent/child semantics change
*/

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

type Teardown = Box<dyn FnOnce()>;

/// Identifies one teardown callback registered on a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TeardownKey(u64);

struct ScopeInner {
    name: String,
    destroyed: Cell<bool>,
    next_key: Cell<u64>,
    teardown: RefCell<BTreeMap<u64, Teardown>>,
}

impl ScopeInner {
    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }

        let callbacks = std::mem::take(&mut *self.teardown.borrow_mut());
        debug!(scope = %self.name, callbacks = callbacks.len(), "scope teardown");

        // Newest first, so resources are released in reverse acquisition order.
        for (_, callback) in callbacks.into_iter().rev() {
            callback();
        }
    }
}

impl Drop for ScopeInner {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Lifetime of a UI element.
///
/// Anything that must not outlive the element registers a teardown callback;
/// [`Scope::destroy`] runs them exactly once. Dropping the last handle of a
/// live scope destroys it as well.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                name: name.into(),
                destroyed: Cell::new(false),
                next_key: Cell::new(0),
                teardown: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Create a scope that is destroyed together with `self`.
    ///
    /// Destroying the child first detaches it from the parent.
    pub fn child(&self, name: impl Into<String>) -> Scope {
        let child = Scope::new(format!("{}/{}", self.inner.name, name.into()));

        let weak_child = child.downgrade();
        let key = self.register_on_teardown(move || {
            if let Some(child) = weak_child.upgrade() {
                child.destroy();
            }
        });

        let parent = self.downgrade();
        child.register_on_teardown(move || {
            if let Some(parent) = parent.upgrade() {
                parent.cancel_teardown(key);
            }
        });

        child
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Register `callback` to run when the scope is destroyed.
    ///
    /// On an already destroyed scope the callback runs immediately.
    pub fn register_on_teardown(&self, callback: impl FnOnce() + 'static) -> TeardownKey {
        let key = self.inner.next_key.get();
        self.inner.next_key.set(key + 1);

        if self.is_destroyed() {
            callback();
        } else {
            self.inner
                .teardown
                .borrow_mut()
                .insert(key, Box::new(callback));
        }

        TeardownKey(key)
    }

    /// Forget a teardown callback without running it.
    pub fn cancel_teardown(&self, key: TeardownKey) -> bool {
        self.inner.teardown.borrow_mut().remove(&key.0).is_some()
    }

    /// Run every registered teardown callback. Later calls do nothing.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// Number of callbacks still waiting for teardown.
    pub fn pending_teardowns(&self) -> usize {
        self.inner.teardown.borrow().len()
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("destroyed", &self.is_destroyed())
            .field("pending_teardowns", &self.pending_teardowns())
            .finish()
    }
}

/// Non-owning reference to a [`Scope`].
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }
}

impl fmt::Debug for WeakScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WeakScope")
    }
}
