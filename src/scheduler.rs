//! Scheduling providers for the timed combinators
//!
//! Throttle, choke and clock streams do not own a clock. They ask a
//! `Scheduler` for a callback on its next frame and read its `now()`. Three
//! providers ship with the crate:
//!
//! - `ManualScheduler`: a virtual clock advanced by hand, for deterministic use
//! - `Timer`: tokio-backed, fires at most once per duration
//! - `StreamTimer`: another stream used as a virtual timer

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::stream::Stream;
use crate::tick;

lazy_static::lazy_static! {
    static ref EPOCH: Instant = Instant::now();
}

/// Monotonic seconds since the first call in this process
pub fn clock_now() -> f64 {
    EPOCH.elapsed().as_secs_f64()
}

/// Token identifying a pending scheduler request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

/// Callback receiving the frame time in seconds
pub type FrameCallback = Box<dyn FnOnce(f64)>;

/// Scheduling provider interface
pub trait Scheduler {
    /// Current time in seconds
    fn now(&self) -> f64;

    /// Call `callback` on the next frame
    fn request(&self, callback: FrameCallback) -> RequestId;

    /// Forget a request. Only meaningful before its callback fires.
    fn cancel(&self, id: RequestId);

    /// Time of the frame currently being processed, if the provider has one
    fn current_time(&self) -> Option<f64> {
        None
    }

    /// Run `f` on the next tick. Providers that drive their own frames make
    /// sure that tick is drained.
    fn defer(&self, f: Box<dyn FnOnce()>) {
        tick::request(f);
    }
}

#[derive(Default)]
struct RequestQueue {
    next_id: u64,
    callbacks: Vec<(RequestId, FrameCallback)>,
}

impl RequestQueue {
    fn push(&mut self, callback: FrameCallback) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.callbacks.push((id, callback));
        id
    }

    /// Returns true when the queue became empty
    fn remove(&mut self, id: RequestId) -> bool {
        self.callbacks.retain(|(request, _)| *request != id);
        self.callbacks.is_empty()
    }

    fn take(&mut self) -> Vec<(RequestId, FrameCallback)> {
        std::mem::take(&mut self.callbacks)
    }
}

// ================================
// ManualScheduler
// ================================

struct ManualState {
    time: f64,
    queue: RequestQueue,
}

/// Virtual clock driven by explicit frames.
///
/// Callbacks requested during a frame wait for the next one. After each
/// frame the tick queue is drained.
pub struct ManualScheduler {
    state: RefCell<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(time: f64) -> Self {
        Self {
            state: RefCell::new(ManualState {
                time,
                queue: RequestQueue::default(),
            }),
        }
    }

    /// Set the clock to `time` without running a frame
    pub fn set_time(&self, time: f64) {
        let mut state = self.state.borrow_mut();
        state.time = state.time.max(time);
    }

    /// Run a frame at `time`, returning how many callbacks fired
    pub fn frame_at(&self, time: f64) -> usize {
        let callbacks = {
            let mut state = self.state.borrow_mut();
            state.time = state.time.max(time);
            state.queue.take()
        };
        let time = self.now();
        let count = callbacks.len();

        log::trace!("ManualScheduler: frame at {} firing {} callbacks", time, count);
        for (_, callback) in callbacks {
            callback(time);
        }
        tick::run();
        count
    }

    /// Run a frame `seconds` after the current time
    pub fn advance(&self, seconds: f64) -> usize {
        let time = self.now() + seconds;
        self.frame_at(time)
    }

    /// Requests waiting for the next frame
    pub fn pending(&self) -> usize {
        self.state.borrow().queue.callbacks.len()
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn now(&self) -> f64 {
        self.state.borrow().time
    }

    fn request(&self, callback: FrameCallback) -> RequestId {
        self.state.borrow_mut().queue.push(callback)
    }

    fn cancel(&self, id: RequestId) {
        self.state.borrow_mut().queue.remove(id);
    }
}

// ================================
// Timer
// ================================

struct TimerState {
    queue: RequestQueue,
    task: Option<tokio::task::JoinHandle<()>>,
    last_frame: f64,
}

/// Fires pending callbacks at most once per `duration`.
///
/// A request made when the previous frame is older than `duration` fires on
/// the next scheduler turn. Frames run on `tokio::task::spawn_local`, so the
/// timer must be used inside a `tokio::task::LocalSet`.
#[derive(Clone)]
pub struct Timer {
    duration: f64,
    state: Rc<RefCell<TimerState>>,
}

impl Timer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: duration.as_secs_f64(),
            state: Rc::new(RefCell::new(TimerState {
                queue: RequestQueue::default(),
                task: None,
                last_frame: f64::NEG_INFINITY,
            })),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration)
    }

    fn frame(state: &Rc<RefCell<TimerState>>) {
        let (callbacks, time) = {
            let mut state = state.borrow_mut();
            state.task = None;
            state.last_frame = clock_now();
            (state.queue.take(), state.last_frame)
        };

        log::trace!("Timer: frame at {} firing {} callbacks", time, callbacks.len());
        for (_, callback) in callbacks {
            callback(time);
        }
        tick::run();
    }
}

impl Scheduler for Timer {
    fn now(&self) -> f64 {
        clock_now()
    }

    fn request(&self, callback: FrameCallback) -> RequestId {
        let mut state = self.state.borrow_mut();
        let id = state.queue.push(callback);

        // Already cued
        if state.task.is_some() {
            return id;
        }

        let delay = (state.last_frame + self.duration - clock_now()).max(0.0);
        let shared = Rc::clone(&self.state);
        state.task = Some(tokio::task::spawn_local(async move {
            if delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            } else {
                tokio::task::yield_now().await;
            }
            Timer::frame(&shared);
        }));
        id
    }

    fn cancel(&self, id: RequestId) {
        let mut state = self.state.borrow_mut();
        if state.queue.remove(id) {
            if let Some(task) = state.task.take() {
                task.abort();
            }
        }
    }

    fn defer(&self, f: Box<dyn FnOnce()>) {
        tick::request(f);
        tokio::task::spawn_local(async {
            tokio::task::yield_now().await;
            tick::run();
        });
    }
}

// ================================
// StreamTimer
// ================================

/// Uses the values of another stream as frames.
///
/// Each value the driving stream yields fires the callbacks requested before
/// it. Callbacks requested while a frame fires wait for the next value.
#[derive(Clone)]
pub struct StreamTimer {
    queue: Rc<RefCell<RequestQueue>>,
}

impl StreamTimer {
    pub fn new<U: 'static>(driver: &Stream<U>) -> Self {
        let queue = Rc::new(RefCell::new(RequestQueue::default()));
        let weak = Rc::downgrade(&queue);

        driver.each(move |_| {
            let Some(queue) = weak.upgrade() else { return };
            let callbacks = queue.borrow_mut().take();
            let time = clock_now();
            for (_, callback) in callbacks {
                callback(time);
            }
        });

        Self { queue }
    }
}

impl Scheduler for StreamTimer {
    fn now(&self) -> f64 {
        clock_now()
    }

    fn request(&self, callback: FrameCallback) -> RequestId {
        self.queue.borrow_mut().push(callback)
    }

    fn cancel(&self, id: RequestId) {
        self.queue.borrow_mut().remove(id);
    }
}
