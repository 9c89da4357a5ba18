//! The push/pull stream engine
//!
//! A `Stream<T>` wraps one `Source` in a replaceable slot and adds three
//! things on top of it: pushing, multicast notification and a lifecycle
//! that moves from active to done exactly once.
//!
//! Delivery is always a pull. `push` only stores a value in the source and
//! notifies listeners, which then call `shift`. A stream is a cheap `Rc`
//! handle: cloning it shares the sequence, `tee` forks it.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::rc::{Rc, Weak};

use crate::completion::{Completion, Done};
use crate::error::{StreamError, StreamResult};
use crate::functor::{Functor, Status};
use crate::tick;

use super::source::{BufferSource, Control, Halt, Source, StopRequest};

/// Result of `Stream::pull`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull<T> {
    /// A value was available
    Value(T),
    /// Nothing new right now; the stream is still active
    Idle,
    /// The stream is done and will never yield again
    Done,
}

impl<T> Pull<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Pull::Value(value) => Some(value),
            Pull::Idle | Pull::Done => None,
        }
    }
}

/// Token returned by `Stream::on`, used with `Stream::off`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TapId(u64);

type Factory<T> = Box<dyn FnOnce(Handle<T>) -> Box<dyn Source<T>>>;
type Listener = Rc<RefCell<dyn FnMut() -> ControlFlow<()>>>;
type Teardown = Box<dyn FnOnce()>;

/// Receives a copy of every value pulled from the source. Returns `false`
/// once the receiving side is gone.
pub(crate) type TapFn<T> = Box<dyn Fn(&T) -> bool>;

struct Tap<T> {
    id: TapId,
    send: TapFn<T>,
}

enum Slot<T> {
    /// Source not built yet
    Pending(Factory<T>),
    /// Factory is running
    Activating,
    Live(Box<dyn Source<T>>),
    /// Stop requested: `remaining` more pulls, then completion
    Stopping {
        source: Box<dyn Source<T>>,
        remaining: usize,
    },
    Exhausted,
}

struct Inner<T> {
    status: Cell<Status>,
    slot: RefCell<Slot<T>>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
    teardown: RefCell<Vec<Teardown>>,
    completion: Completion,
    // Values pulled on behalf of a tee, owed to this stream's own consumer
    backlog: RefCell<VecDeque<T>>,
    taps: RefCell<Vec<Tap<T>>>,
}

/// A push/pull stream. See the module docs.
pub struct Stream<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

/// Weak handle used by sources and timers to reach their stream
pub struct Handle<T> {
    inner: Weak<Inner<T>>,
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: 'static> Handle<T> {
    pub fn upgrade(&self) -> Option<Stream<T>> {
        self.inner.upgrade().map(|inner| Stream { inner })
    }

    pub fn notify(&self) {
        if let Some(stream) = self.upgrade() {
            stream.notify();
        }
    }

    pub fn stop_after(&self, n: usize) {
        if let Some(stream) = self.upgrade() {
            stream.stop_after(n);
        }
    }

    pub fn end(&self) {
        if let Some(stream) = self.upgrade() {
            stream.end();
        }
    }

    /// A dropped stream counts as done
    pub fn is_done(&self) -> bool {
        self.upgrade().map_or(true, |stream| stream.is_done())
    }
}

impl<T: 'static> Stream<T> {
    /// Create a stream whose source is built by `factory` on first use.
    ///
    /// Registering listeners does not build the source; the first `shift`,
    /// `push`, `start` or `stop` does.
    pub fn new<F, S>(factory: F) -> Self
    where
        F: FnOnce(Handle<T>) -> S + 'static,
        S: Source<T> + 'static,
    {
        let factory: Factory<T> = Box::new(move |handle| Box::new(factory(handle)));
        Self {
            inner: Rc::new(Inner {
                status: Cell::new(Status::Active),
                slot: RefCell::new(Slot::Pending(factory)),
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
                teardown: RefCell::new(Vec::new()),
                completion: Completion::new(),
                backlog: RefCell::new(VecDeque::new()),
                taps: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a stream around an already built source
    pub fn from_source<S>(source: S) -> Self
    where
        S: Source<T> + 'static,
    {
        Self::new(move |_| source)
    }

    /// A stream that is already done
    pub fn completed() -> Self {
        let stream = Self::from_source(BufferSource::<T>::from_values(Vec::new()));
        stream.end();
        stream
    }

    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    pub fn is_done(&self) -> bool {
        self.status() == Status::Done
    }

    pub fn downgrade(&self) -> Handle<T> {
        Handle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// True when both handles refer to the same stream
    pub fn ptr_eq(&self, other: &Stream<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ================================
    // Pulling
    // ================================

    /// Pull the next value. `None` means either nothing is available yet or
    /// the stream is done; `pull` tells the two apart.
    pub fn shift(&self) -> Option<T> {
        if self.is_done() {
            return None;
        }

        let stashed = self.inner.backlog.borrow_mut().pop_front();
        let value = match stashed {
            Some(value) => Some(value),
            None => {
                let (value, cx) = self.pull_source();
                if let Some(value) = &value {
                    self.distribute(value, None);
                }
                self.apply(cx);
                value
            }
        };

        self.settle();
        value
    }

    pub fn pull(&self) -> Pull<T> {
        match self.shift() {
            Some(value) => Pull::Value(value),
            None if self.is_done() => Pull::Done,
            None => Pull::Idle,
        }
    }

    /// Pull everything available now
    pub fn to_vec(&self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.shift() {
            values.push(value);
        }
        values
    }

    /// Pull everything available now and keep the last value
    pub fn latest(&self) -> Option<T> {
        let mut last = None;
        while let Some(value) = self.shift() {
            last = Some(value);
        }
        last
    }

    /// Drain the values available now, then drain again on every
    /// notification
    pub fn each<F>(&self, f: F) -> &Self
    where
        F: FnMut(T) + 'static,
    {
        let f = Rc::new(RefCell::new(f));
        drain_into(self, &f);

        let weak = Rc::downgrade(&self.inner);
        self.on(move || {
            if let Some(inner) = weak.upgrade() {
                drain_into(&Stream { inner }, &f);
            }
        });
        self
    }

    // ================================
    // Pushing and lifecycle
    // ================================

    pub fn push(&self, value: T) -> StreamResult<()> {
        self.push_all(vec![value])
    }

    pub fn push_all<I>(&self, values: I) -> StreamResult<()>
    where
        I: IntoIterator<Item = T>,
    {
        if self.is_done() {
            return Err(StreamError::Stopped);
        }
        self.activate();

        let mut cx = Control::new();
        let result = {
            let mut slot = self.inner.slot.try_borrow_mut().map_err(|_| reentrant("push"))?;
            match &mut *slot {
                Slot::Live(source) => source.push(values.into_iter().collect(), &mut cx),
                _ => Err(StreamError::Stopped),
            }
        };

        self.apply(cx);
        self.settle();
        result
    }

    pub fn start(&self) -> StreamResult<()> {
        self.start_with(None)
    }

    pub fn start_at(&self, time: f64) -> StreamResult<()> {
        self.start_with(Some(time))
    }

    fn start_with(&self, time: Option<f64>) -> StreamResult<()> {
        if self.is_done() {
            return Err(StreamError::Stopped);
        }
        self.activate();

        let mut cx = Control::new();
        let result = {
            let mut slot = self.inner.slot.try_borrow_mut().map_err(|_| reentrant("start"))?;
            match &mut *slot {
                Slot::Live(source) => source.start(time, &mut cx),
                _ => Err(StreamError::Stopped),
            }
        };

        self.apply(cx);
        self.settle();
        result
    }

    /// Ask the source to stop. Buffered values stay pullable; the stream
    /// completes once they are drained. A no-op on a stream that is done or
    /// already stopping.
    pub fn stop(&self) {
        self.stop_with(StopRequest::default());
    }

    /// Stop, delivering a value the source is holding back
    pub fn stop_flushing(&self) {
        self.stop_with(StopRequest::flushing());
    }

    /// Stop at `time`, for time-driven sources
    pub fn stop_at(&self, time: f64) {
        self.stop_with(StopRequest::at(time));
    }

    pub fn stop_with(&self, request: StopRequest) {
        if self.is_done() {
            return;
        }
        self.activate();

        let mut cx = Control::new();
        {
            let Ok(mut slot) = self.inner.slot.try_borrow_mut() else {
                log::warn!("Stream: re-entrant stop ignored");
                return;
            };
            match &mut *slot {
                Slot::Live(source) => source.stop(request, &mut cx),
                Slot::Stopping { .. } => return,
                _ => cx.end(),
            }
        }

        log::debug!("Stream: stop requested");
        self.apply(cx);
        self.settle();
    }

    /// Allow at most `n` more values, then complete. A pull that finds the
    /// source empty ends the countdown early, since nothing can be pushed
    /// once stopping. Pushes and starts fail from now on.
    pub fn stop_after(&self, n: usize) {
        if self.is_done() {
            return;
        }
        self.activate();
        self.halt(Halt::After(n));
        self.settle();
    }

    /// Complete now, dropping anything the source still holds. Values a
    /// tee already pulled for this stream are delivered first.
    pub fn end(&self) {
        self.halt(Halt::Now);
    }

    /// Run `f` on the tick after this stream completes
    pub fn done<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        self.inner.completion.on_resolve(f);
        self
    }

    /// A future resolving when this stream completes
    pub fn completion(&self) -> Done {
        self.inner.completion.wait()
    }

    /// Run `f` synchronously as the stream completes, before `done`
    /// callbacks
    pub fn on_stop<F>(&self, f: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        if self.is_done() {
            tick::request(f);
        } else {
            self.inner.teardown.borrow_mut().push(Box::new(f));
        }
        self
    }

    // ================================
    // Notification
    // ================================

    /// Call every listener in registration order. A listener returning
    /// `Break` stops the round.
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = match self.inner.listeners.try_borrow() {
            Ok(listeners) => listeners.iter().map(|(_, listener)| Rc::clone(listener)).collect(),
            Err(_) => return,
        };

        for listener in snapshot {
            let Ok(mut listener) = listener.try_borrow_mut() else {
                log::trace!("Stream: skipping re-entered listener");
                continue;
            };
            if listener().is_break() {
                break;
            }
        }
    }

    pub fn on<F>(&self, mut f: F) -> ListenerId
    where
        F: FnMut() + 'static,
    {
        self.on_control(move || {
            f();
            ControlFlow::Continue(())
        })
    }

    /// Register a listener that may end the current notification round
    pub fn on_control<F>(&self, f: F) -> ListenerId
    where
        F: FnMut() -> ControlFlow<()> + 'static,
    {
        let id = ListenerId(self.next_id());
        if !self.is_done() {
            let listener: Listener = Rc::new(RefCell::new(f));
            self.inner.listeners.borrow_mut().push((id, listener));
        }
        id
    }

    pub fn off(&self, id: ListenerId) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|(listener, _)| *listener != id);
    }

    pub fn off_all(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    // ================================
    // Internals
    // ================================

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        id
    }

    /// Build the source if it is still pending
    fn activate(&self) {
        let factory = {
            let Ok(mut slot) = self.inner.slot.try_borrow_mut() else {
                return;
            };
            match std::mem::replace(&mut *slot, Slot::Activating) {
                Slot::Pending(factory) => factory,
                other => {
                    *slot = other;
                    return;
                }
            }
        };

        log::trace!("Stream: activating source");
        let source = factory(self.downgrade());

        let mut slot = self.inner.slot.borrow_mut();
        if matches!(*slot, Slot::Activating) {
            *slot = Slot::Live(source);
        }
    }

    /// Pull from the source without settling, returning the effects the
    /// source requested
    pub(crate) fn pull_source(&self) -> (Option<T>, Control) {
        let mut cx = Control::new();
        if self.is_done() {
            return (None, cx);
        }
        self.activate();

        let Ok(mut slot) = self.inner.slot.try_borrow_mut() else {
            log::trace!("Stream: re-entrant shift yields nothing");
            return (None, cx);
        };
        let value = match &mut *slot {
            Slot::Live(source) => source.shift(&mut cx),
            Slot::Stopping { source, remaining } => {
                if *remaining == 0 {
                    None
                } else {
                    let value = source.shift(&mut cx);
                    // A source with nothing left ends the countdown early
                    *remaining = if value.is_some() { *remaining - 1 } else { 0 };
                    value
                }
            }
            _ => None,
        };
        (value, cx)
    }

    pub(crate) fn apply(&self, cx: Control) {
        let (notify, halt) = cx.into_parts();
        if notify {
            self.notify();
        }
        if let Some(halt) = halt {
            self.halt(halt);
        }
    }

    fn halt(&self, halt: Halt) {
        if self.is_done() {
            return;
        }

        let n = match halt {
            Halt::Now if self.inner.backlog.borrow().is_empty() => return self.complete(),
            Halt::Now => return self.exhaust(),
            Halt::After(n) => n,
        };

        let wrapped = {
            let Ok(mut slot) = self.inner.slot.try_borrow_mut() else {
                log::warn!("Stream: re-entrant stop ignored");
                return;
            };
            match std::mem::replace(&mut *slot, Slot::Exhausted) {
                Slot::Live(source) => {
                    *slot = Slot::Stopping { source, remaining: n };
                    true
                }
                Slot::Stopping { source, remaining } => {
                    *slot = Slot::Stopping {
                        source,
                        remaining: remaining.min(n),
                    };
                    true
                }
                other => {
                    *slot = other;
                    false
                }
            }
        };

        if !wrapped {
            return self.halt(Halt::Now);
        }

        log::debug!("Stream: stopping after {} more values", n);
        if n > 0 {
            // Let consumers collect what is left
            self.notify();
        }
    }

    /// Release the source but stay active until the values already pulled
    /// for this stream's consumer are delivered
    fn exhaust(&self) {
        let Ok(mut slot) = self.inner.slot.try_borrow_mut() else {
            return self.complete();
        };
        let source = std::mem::replace(&mut *slot, Slot::Exhausted);
        drop(slot);

        log::debug!(
            "Stream: source ended, {} values still owed",
            self.inner.backlog.borrow().len()
        );
        drop(source);
        self.notify();
    }

    /// Complete once a stopping stream has nothing left to give
    pub(crate) fn settle(&self) {
        let finished = match self.inner.slot.try_borrow() {
            Ok(slot) => matches!(*slot, Slot::Stopping { remaining: 0, .. } | Slot::Exhausted),
            Err(_) => false,
        };
        if finished && self.inner.backlog.borrow().is_empty() {
            self.complete();
        }
    }

    fn complete(&self) {
        if self.inner.status.replace(Status::Done) == Status::Done {
            return;
        }
        log::debug!("Stream: complete");

        let source = match self.inner.slot.try_borrow_mut() {
            Ok(mut slot) => Some(std::mem::replace(&mut *slot, Slot::Exhausted)),
            Err(_) => None,
        };
        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        let backlog = std::mem::take(&mut *self.inner.backlog.borrow_mut());
        let taps = std::mem::take(&mut *self.inner.taps.borrow_mut());
        let teardown = std::mem::take(&mut *self.inner.teardown.borrow_mut());

        for hook in teardown {
            hook();
        }
        self.inner.completion.resolve();

        // Released last: dropping them may drop other streams
        drop((source, listeners, backlog, taps));
    }

    // ================================
    // Tee support
    // ================================

    /// True when the source cannot produce any more values
    pub(crate) fn source_exhausted(&self) -> bool {
        match self.inner.slot.try_borrow() {
            Ok(slot) => matches!(*slot, Slot::Exhausted | Slot::Stopping { remaining: 0, .. }),
            Err(_) => false,
        }
    }

    pub(crate) fn add_tap(&self, send: TapFn<T>) -> Option<TapId> {
        if self.is_done() {
            return None;
        }
        let id = TapId(self.next_id());
        self.inner.taps.borrow_mut().push(Tap { id, send });
        Some(id)
    }

    pub(crate) fn remove_tap(&self, id: TapId) {
        self.inner.taps.borrow_mut().retain(|tap| tap.id != id);
    }

    /// Copy `value` to every tap except `except`
    fn distribute(&self, value: &T, except: Option<TapId>) {
        let Ok(mut taps) = self.inner.taps.try_borrow_mut() else {
            return;
        };
        taps.retain(|tap| Some(tap.id) == except || (tap.send)(value));
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Pull from the source on behalf of a tee. The value is also kept for
    /// this stream's own consumer and copied to the other taps.
    pub(crate) fn pull_for_tee(&self, tap: TapId) -> Option<T> {
        let (value, cx) = self.pull_source();
        if let Some(value) = &value {
            self.inner.backlog.borrow_mut().push_back(value.clone());
            self.distribute(value, Some(tap));
        }
        self.apply(cx);
        self.settle();
        value
    }
}

fn drain_into<T, F>(stream: &Stream<T>, f: &Rc<RefCell<F>>)
where
    T: 'static,
    F: FnMut(T),
{
    // Already draining further up the call stack; that loop picks up the rest
    let Ok(mut f) = f.try_borrow_mut() else {
        return;
    };
    while let Some(value) = stream.shift() {
        f(value);
    }
}

fn reentrant(operation: &str) -> StreamError {
    StreamError::Custom(format!("re-entrant {} on a stream", operation))
}

impl<T: 'static> FromIterator<T> for Stream<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Stream::from_source(BufferSource::from_values(iter))
    }
}

/// Pull a stream as a lazy functor. The functor is done once the stream is
/// done, and also when the stream is idle.
impl<T: 'static> From<Stream<T>> for Functor<T> {
    fn from(stream: Stream<T>) -> Self {
        Functor::new(move || stream.shift())
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("status", &self.inner.status.get())
            .field("listeners", &self.inner.listeners.borrow().len())
            .field("completion", &self.inner.completion)
            .finish()
    }
}
