//! Rate limiting: throttle and choke
//!
//! Both sources keep only the latest pushed value. Throttle releases it on
//! the scheduler's next frame; choke releases it once `duration` has passed
//! without another push.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::error::{StreamError, StreamResult};
use crate::scheduler::{RequestId, Scheduler};

use super::core::{Handle, Stream};
use super::source::{Control, Source, StopRequest};

// ================================
// Throttle
// ================================

struct ThrottleState<T> {
    value: Option<T>,
    queued: Option<RequestId>,
    closed: bool,
}

struct ThrottleSource<T> {
    scheduler: Rc<dyn Scheduler>,
    state: Rc<RefCell<ThrottleState<T>>>,
    handle: Handle<T>,
}

impl<T: 'static> Source<T> for ThrottleSource<T> {
    fn shift(&mut self, _cx: &mut Control) -> Option<T> {
        self.state.borrow_mut().value.take()
    }

    fn push(&mut self, values: Vec<T>, _cx: &mut Control) -> StreamResult<()> {
        let schedule = {
            let mut state = self.state.borrow_mut();
            if state.closed {
                return Err(StreamError::Stopped);
            }
            let Some(last) = values.into_iter().last() else {
                return Ok(());
            };
            state.value = Some(last);
            state.queued.is_none()
        };

        if schedule {
            let state = Rc::downgrade(&self.state);
            let handle = self.handle.clone();
            let id = self.scheduler.request(Box::new(move |_| {
                if let Some(state) = state.upgrade() {
                    state.borrow_mut().queued = None;
                }
                handle.notify();
            }));
            self.state.borrow_mut().queued = Some(id);
        }
        Ok(())
    }

    fn stop(&mut self, request: StopRequest, cx: &mut Control) {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.queued.take() {
            self.scheduler.cancel(id);
        }
        state.closed = true;

        if !request.flush {
            state.value = None;
        }
        cx.stop_after(usize::from(state.value.is_some()));
    }
}

// ================================
// Choke
// ================================

struct ChokeState<T> {
    pending: Option<T>,
    ready: Option<T>,
    deadline: f64,
    request: Option<RequestId>,
}

struct ChokeSource<T> {
    scheduler: Rc<dyn Scheduler>,
    duration: f64,
    state: Rc<RefCell<ChokeState<T>>>,
    handle: Handle<T>,
}

/// Wait for the quiet period to pass, re-requesting while pushes keep
/// moving the deadline
fn request_choke<T: 'static>(
    scheduler: &Rc<dyn Scheduler>,
    state: Weak<RefCell<ChokeState<T>>>,
    handle: Handle<T>,
) -> RequestId {
    let weak_scheduler = Rc::downgrade(scheduler);
    scheduler.request(Box::new(move |time| {
        let Some(shared) = state.upgrade() else { return };
        let released = {
            let mut current = shared.borrow_mut();
            current.request = None;
            if time >= current.deadline {
                current.ready = current.pending.take();
                current.ready.is_some()
            } else {
                false
            }
        };

        if released {
            handle.notify();
        } else if let Some(scheduler) = weak_scheduler.upgrade() {
            let id = request_choke(&scheduler, state, handle);
            shared.borrow_mut().request = Some(id);
        }
    }))
}

impl<T: 'static> Source<T> for ChokeSource<T> {
    fn shift(&mut self, _cx: &mut Control) -> Option<T> {
        self.state.borrow_mut().ready.take()
    }

    fn push(&mut self, values: Vec<T>, _cx: &mut Control) -> StreamResult<()> {
        let Some(last) = values.into_iter().last() else {
            return Ok(());
        };

        let schedule = {
            let mut state = self.state.borrow_mut();
            state.pending = Some(last);
            state.deadline = self.scheduler.now() + self.duration;
            state.request.is_none()
        };

        if schedule {
            let id = request_choke(&self.scheduler, Rc::downgrade(&self.state), self.handle.clone());
            self.state.borrow_mut().request = Some(id);
        }
        Ok(())
    }

    fn stop(&mut self, request: StopRequest, cx: &mut Control) {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.request.take() {
            self.scheduler.cancel(id);
        }

        if request.flush && state.pending.is_some() {
            state.ready = state.pending.take();
        }
        state.pending = None;
        cx.stop_after(usize::from(state.ready.is_some()));
    }
}

impl<T: 'static> Stream<T> {
    /// A pushable stream emitting at most once per scheduler frame.
    ///
    /// Pushes within one frame replace each other; listeners are notified
    /// once, on the frame, and the pull yields the last pushed value.
    /// `stop_flushing` keeps a value still waiting for its frame.
    pub fn throttled(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::new(move |handle| ThrottleSource {
            scheduler,
            state: Rc::new(RefCell::new(ThrottleState {
                value: None,
                queued: None,
                closed: false,
            })),
            handle,
        })
    }

    /// A pushable stream emitting the latest value once no push has arrived
    /// for `duration`
    pub fn choked(duration: Duration, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::new(move |handle| ChokeSource {
            scheduler,
            duration: duration.as_secs_f64(),
            state: Rc::new(RefCell::new(ChokeState {
                pending: None,
                ready: None,
                deadline: f64::NEG_INFINITY,
                request: None,
            })),
            handle,
        })
    }

    /// Pipe this stream through a throttle
    pub fn throttle(&self, scheduler: Rc<dyn Scheduler>) -> Stream<T> {
        let throttled = Stream::throttled(scheduler);
        self.pipe(&throttled);
        throttled
    }

    /// Pipe this stream through a choke
    pub fn choke(&self, duration: Duration, scheduler: Rc<dyn Scheduler>) -> Stream<T> {
        let choked = Stream::choked(duration, scheduler);
        self.pipe(&choked);
        choked
    }
}
