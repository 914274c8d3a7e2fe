//! Carrying the current context into closures, futures and threads.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use pin_project::pin_project;

use super::{ContextStorage, CurrentTraceContext};
use crate::propagation::TraceContext;

impl CurrentTraceContext {
    /// Captures the current context now and re-installs it while `f` runs.
    pub fn wrap<F, R>(&self, f: F) -> impl FnOnce() -> R
    where
        F: FnOnce() -> R,
    {
        let current = self.clone();
        let captured = self.get();
        move || {
            let _scope = current.maybe_scope(captured.as_ref());
            f()
        }
    }

    /// Captures the current context now and re-installs it around every poll.
    pub fn wrap_future<F: Future>(&self, future: F) -> Wrapped<F> {
        Wrapped {
            inner: future,
            current: self.clone(),
            captured: self.get(),
        }
    }

    /// Spawns a thread that runs `f` under the context current at spawn time.
    ///
    /// With [`ContextStorage::Inheritable`] the child's slot is seeded for the
    /// thread's lifetime and no decorators run; otherwise `f` is wrapped.
    pub fn spawn<F, T>(&self, f: F) -> JoinHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        match self.storage {
            ContextStorage::Inheritable => {
                let storage = self.storage;
                let inherited = self.get();
                thread::spawn(move || {
                    storage.replace(inherited);
                    f()
                })
            }
            ContextStorage::ThreadLocal => thread::spawn(self.wrap(f)),
        }
    }
}

/// Future that runs each poll of `inner` under a captured context.
#[pin_project]
#[must_use = "futures do nothing unless polled"]
pub struct Wrapped<F> {
    #[pin]
    inner: F,
    current: CurrentTraceContext,
    captured: Option<TraceContext>,
}

impl<F> Wrapped<F> {
    /// The context installed while polling.
    pub fn captured(&self) -> Option<&TraceContext> {
        self.captured.as_ref()
    }
}

impl<F: Future> Future for Wrapped<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = this.current.maybe_scope(this.captured.as_ref());
        this.inner.poll(cx)
    }
}
