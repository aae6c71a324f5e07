//! One-shot signals with explicit re-arming.
//!
//! A [`OneShot`] is either `Armed` (waiters pending) or `Resolved` (every
//! waiter taken so far has been woken with the value). [`OneShot::rearm`]
//! moves a resolved signal back to `Armed` with a fresh generation, so a waiter
//! taken after re-arming observes the *next* resolution, never a stale one.
//!
//! ```text
//!            resolve(v)
//!   Armed ───────────────► Resolved
//!     ▲                       │
//!     └───────── rearm() ─────┘
//! ```

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

type Waiter<T> = Shared<oneshot::Receiver<T>>;

enum SignalState<T: Clone> {
    Armed {
        resolver: oneshot::Sender<T>,
        waiter: Waiter<T>,
    },
    Resolved {
        waiter: Waiter<T>,
    },
}

impl<T: Clone> SignalState<T> {
    fn armed() -> Self {
        let (resolver, receiver) = oneshot::channel();
        Self::Armed {
            resolver,
            waiter: receiver.shared(),
        }
    }

    const fn waiter(&self) -> &Waiter<T> {
        match self {
            Self::Armed { waiter, .. } | Self::Resolved { waiter } => waiter,
        }
    }
}

/// A re-armable one-shot signal
pub struct OneShot<T: Clone> {
    state: Mutex<SignalState<T>>,
}

impl<T: Clone> fmt::Debug for OneShot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShot")
            .field("armed", &self.is_armed())
            .finish()
    }
}

impl<T: Clone> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OneShot<T> {
    /// Create an armed signal
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SignalState::armed()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SignalState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check if the signal is waiting for its next resolution
    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(*self.lock(), SignalState::Armed { .. })
    }

    /// Take a waiter bound to the current generation
    #[must_use]
    pub fn wait(&self) -> SignalFuture<T> {
        SignalFuture {
            inner: self.lock().waiter().clone(),
        }
    }

    /// Resolve the current generation.
    ///
    /// Returns false if the signal was already resolved and not re-armed.
    pub fn resolve(&self, value: T) -> bool {
        let mut state = self.lock();
        let waiter = state.waiter().clone();
        match std::mem::replace(&mut *state, SignalState::Resolved { waiter }) {
            SignalState::Armed { resolver, .. } => {
                // Every waiter may already be gone; that is fine.
                let _ = resolver.send(value);
                true
            }
            resolved @ SignalState::Resolved { .. } => {
                *state = resolved;
                false
            }
        }
    }

    /// Start a fresh generation. No-op while armed.
    pub fn rearm(&self) {
        let mut state = self.lock();
        if matches!(*state, SignalState::Resolved { .. }) {
            *state = SignalState::armed();
        }
    }

    /// Resolve the current generation and immediately re-arm
    pub fn resolve_and_rearm(&self, value: T) {
        let mut state = self.lock();
        if let SignalState::Armed { resolver, .. } =
            std::mem::replace(&mut *state, SignalState::armed())
        {
            let _ = resolver.send(value);
        }
    }
}

/// Future returned by [`OneShot::wait`].
///
/// Yields `None` if the signal was dropped before resolving.
#[must_use = "futures do nothing unless awaited"]
pub struct SignalFuture<T: Clone> {
    inner: Waiter<T>,
}

impl<T: Clone> fmt::Debug for SignalFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalFuture").finish_non_exhaustive()
    }
}

impl<T: Clone> Future for SignalFuture<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().inner.poll_unpin(cx).map(Result::ok)
    }
}
