//! Clock streams: successive time windows driven by a scheduler
//!
//! A clock yields one `Frame` per scheduler frame between its start and
//! stop times. Each frame covers `[t1, t2)`; consecutive frames share their
//! boundary. The frame record is owned by the source and updated in place.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::error::StreamResult;
use crate::scheduler::{RequestId, Scheduler, Timer};
use crate::stream_configuration::ClockConfig;

use super::core::{Handle, Stream};
use super::source::{Control, Source, StopRequest};

/// One clock window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub t1: f64,
    pub t2: f64,
    pub start_time: f64,
    pub stop_time: f64,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            t1: 0.0,
            t2: 0.0,
            start_time: 0.0,
            stop_time: f64::INFINITY,
        }
    }
}

impl Frame {
    pub fn duration(&self) -> f64 {
        self.t2 - self.t1
    }
}

struct ClockState {
    scheduler: Rc<dyn Scheduler>,
    lookahead: f64,
    frame: Frame,
    value: Option<Frame>,
    request: Option<RequestId>,
    started: bool,
    running: bool,
}

struct TimeSource {
    state: Rc<RefCell<ClockState>>,
    handle: Handle<Frame>,
}

fn request_frame(state: &Rc<RefCell<ClockState>>, handle: &Handle<Frame>) {
    let scheduler = Rc::clone(&state.borrow().scheduler);
    let weak = Rc::downgrade(state);
    let handle = handle.clone();
    let id = scheduler.request(Box::new(move |time| on_frame(&weak, &handle, time)));
    state.borrow_mut().request = Some(id);
}

fn on_frame(state: &Weak<RefCell<ClockState>>, handle: &Handle<Frame>, time: f64) {
    let Some(state) = state.upgrade() else { return };

    {
        let mut clock = state.borrow_mut();
        clock.request = None;

        if !clock.running {
            // Stopped before the first frame could run
            if clock.frame.stop_time <= clock.frame.t2 {
                return;
            }
            if time < clock.frame.start_time {
                drop(clock);
                return request_frame(&state, handle);
            }
            clock.running = true;
        }

        clock.frame.t1 = clock.frame.t2;
        clock.frame.t2 = time.min(clock.frame.stop_time).max(clock.frame.t1);
        clock.value = Some(clock.frame);
    }

    handle.notify();

    let last = {
        let mut clock = state.borrow_mut();
        // Only pullable while listeners are being notified
        clock.value = None;
        time >= clock.frame.stop_time
    };

    if last {
        log::debug!("Clock: final frame at {}", time);
        handle.end();
    } else if !handle.is_done() {
        request_frame(&state, handle);
    }
}

impl Source<Frame> for TimeSource {
    fn shift(&mut self, _cx: &mut Control) -> Option<Frame> {
        self.state.borrow_mut().value.take()
    }

    fn start(&mut self, time: Option<f64>, _cx: &mut Control) -> StreamResult<()> {
        let frame_time = {
            let mut clock = self.state.borrow_mut();
            if clock.started {
                log::debug!("Clock: already started");
                return Ok(());
            }
            clock.started = true;

            let now = clock.scheduler.now();
            let start_time = time.unwrap_or(now);
            clock.frame.start_time = start_time;
            clock.frame.t2 = start_time.max(now);

            // Without a frame in progress, guess when the next one lands
            let frame_time = match clock.scheduler.current_time() {
                Some(current) if current > now => current,
                _ => now + clock.lookahead,
            };
            if start_time > frame_time {
                None
            } else {
                Some(frame_time)
            }
        };

        match frame_time {
            None => request_frame(&self.state, &self.handle),
            Some(frame_time) => {
                // First frame on the next tick, so a stop issued right after
                // start still applies to it
                let scheduler = Rc::clone(&self.state.borrow().scheduler);
                let weak = Rc::downgrade(&self.state);
                let handle = self.handle.clone();
                scheduler.defer(Box::new(move || on_frame(&weak, &handle, frame_time)));
            }
        }
        Ok(())
    }

    fn stop(&mut self, request: StopRequest, cx: &mut Control) {
        let mut clock = self.state.borrow_mut();
        if !clock.started {
            return cx.end();
        }

        let stop_time = request.time.unwrap_or_else(|| clock.scheduler.now());
        clock.frame.stop_time = stop_time;

        // Stopping inside the current frame
        if stop_time <= clock.frame.t2 {
            if let Some(id) = clock.request.take() {
                clock.scheduler.cancel(id);
            }
            cx.end();
        }
    }
}

impl Stream<Frame> {
    /// A clock driven by `scheduler`. Call `start` or `start_at` to run it.
    pub fn clock(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::clock_with(scheduler, ClockConfig::default())
    }

    pub fn clock_with(scheduler: Rc<dyn Scheduler>, config: ClockConfig) -> Self {
        Self::new(move |handle| TimeSource {
            state: Rc::new(RefCell::new(ClockState {
                scheduler,
                lookahead: config.frame_lookahead,
                frame: Frame::default(),
                value: None,
                request: None,
                started: false,
                running: false,
            })),
            handle,
        })
    }

    /// A clock with a frame every `duration`, backed by a tokio `Timer`
    pub fn from_duration(duration: Duration) -> Self {
        Self::clock(Rc::new(Timer::new(duration)))
    }
}
