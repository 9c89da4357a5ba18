//! One-shot completion signal
//!
//! A `Completion` resolves at most once. Awaiting it goes through a shared
//! oneshot receiver; callbacks registered with `on_resolve` are always run on
//! a later tick, whether they were registered before or after resolution.

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::{StreamError, StreamResult};
use crate::tick;

struct CompletionState {
    sender: RefCell<Option<oneshot::Sender<()>>>,
    receiver: Shared<oneshot::Receiver<()>>,
    resolved: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Shared handle to a one-shot completion signal
#[derive(Clone)]
pub struct Completion {
    state: Rc<CompletionState>,
}

impl Completion {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            state: Rc::new(CompletionState {
                sender: RefCell::new(Some(sender)),
                receiver: receiver.shared(),
                resolved: Cell::new(false),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.resolved.get()
    }

    /// Resolve the signal. Returns `false` if it was already resolved.
    pub fn resolve(&self) -> bool {
        if self.state.resolved.replace(true) {
            return false;
        }

        if let Some(sender) = self.state.sender.borrow_mut().take() {
            // Nobody awaiting is fine
            let _ = sender.send(());
        }

        let callbacks = std::mem::take(&mut *self.state.callbacks.borrow_mut());
        for callback in callbacks {
            tick::request(callback);
        }
        true
    }

    /// Run `f` on the tick after resolution
    pub fn on_resolve<F>(&self, f: F)
    where
        F: FnOnce() + 'static,
    {
        if self.is_resolved() {
            tick::request(f);
        } else {
            self.state.callbacks.borrow_mut().push(Box::new(f));
        }
    }

    /// A future that resolves with the signal
    pub fn wait(&self) -> Done {
        Done {
            receiver: self.state.receiver.clone(),
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.is_resolved())
            .field("callbacks", &self.state.callbacks.borrow().len())
            .finish()
    }
}

/// Future returned by `Completion::wait` and `Stream::completion`.
///
/// Fails with `StreamError::Cancelled` if every handle to the signal is
/// dropped before it resolves.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Done {
    receiver: Shared<oneshot::Receiver<()>>,
}

impl Future for Done {
    type Output = StreamResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| StreamError::Cancelled))
    }
}
