// Data Profile Manager - Change Notifier
// Copyright (C) 2026 Data Profile Manager Contributors
// SPDX-License-Identifier: MIT

//! Fan-out of the profiles-changed signal to registered observers.
//!
//! Each observer supplies the tokio runtime its callback must run on. The
//! notifier schedules every callback onto its own runtime and never runs
//! observer code inline, so a slow observer cannot stall reconciliation.

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::runtime::Handle;
use tracing::{debug, warn};

/// A registered observer: a callback bound to the runtime it runs on.
#[derive(Clone)]
pub struct ProfileChangedCallback {
    handle: Handle,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl ProfileChangedCallback {
    /// Create a callback that will be invoked on the given runtime.
    pub fn new(handle: Handle, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            handle,
            callback: Arc::new(callback),
        }
    }

    /// Registration identity: two handles to the same callback closure.
    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for ProfileChangedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileChangedCallback").finish_non_exhaustive()
    }
}

/// Observer registry for the profiles-changed event.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    callbacks: RwLock<Vec<ProfileChangedCallback>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_callbacks<R>(&self, reader: impl FnOnce(&Vec<ProfileChangedCallback>) -> R) -> R {
        match self.callbacks.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading callbacks, recovering");
                reader(&poisoned.into_inner())
            }
        }
    }

    fn with_callbacks_mut<R>(
        &self,
        writer: impl FnOnce(&mut Vec<ProfileChangedCallback>) -> R,
    ) -> R {
        match self.callbacks.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing callbacks, recovering");
                writer(&mut poisoned.into_inner())
            }
        }
    }

    /// Register an observer. Registering the same callback twice is a
    /// no-op.
    pub fn register(&self, callback: ProfileChangedCallback) {
        self.with_callbacks_mut(|callbacks| {
            if callbacks.iter().any(|c| c.is_same(&callback)) {
                debug!("Callback already registered, ignoring");
                return;
            }
            callbacks.push(callback);
        });
    }

    /// Unregister a previously registered observer. Unknown callbacks are
    /// ignored.
    pub fn unregister(&self, callback: &ProfileChangedCallback) {
        self.with_callbacks_mut(|callbacks| {
            callbacks.retain(|c| !c.is_same(callback));
        });
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.with_callbacks(|callbacks| callbacks.len())
    }

    /// Schedule every registered callback onto its own runtime. Returns
    /// immediately; observer execution never blocks the caller.
    pub fn notify_changed(&self) {
        let callbacks = self.with_callbacks(|callbacks| callbacks.clone());
        debug!("Notifying {} observers of profile change", callbacks.len());
        for cb in callbacks {
            let f = Arc::clone(&cb.callback);
            cb.handle.spawn(async move { f() });
        }
    }
}
