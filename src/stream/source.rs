//! Source strategies and the effect channel they report through
//!
//! A `Stream` owns exactly one `Source`. Sources never call back into their
//! stream while it holds them; instead they record effects on a `Control`
//! which the stream applies once the call returns.

use std::collections::VecDeque;

use crate::error::{StreamError, StreamResult};
use crate::stream_configuration::BufferConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    /// Allow this many more pulls, then complete
    After(usize),
    /// Complete immediately
    Now,
}

/// Effects requested by a source during one call
#[derive(Debug, Default)]
pub struct Control {
    notify: bool,
    halt: Option<Halt>,
}

impl Control {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Tell listeners that a pull may now yield a value
    pub fn notify(&mut self) {
        self.notify = true;
    }

    /// Complete the stream after `n` more pulls. Repeated requests keep the
    /// smallest count.
    pub fn stop_after(&mut self, n: usize) {
        self.halt = match self.halt {
            Some(Halt::Now) => Some(Halt::Now),
            Some(Halt::After(m)) => Some(Halt::After(m.min(n))),
            None => Some(Halt::After(n)),
        };
    }

    /// Complete the stream as soon as the call returns
    pub fn end(&mut self) {
        self.halt = Some(Halt::Now);
    }

    pub(crate) fn into_parts(self) -> (bool, Option<Halt>) {
        (self.notify, self.halt)
    }
}

/// Arguments to `Source::stop`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StopRequest {
    /// Stop time for time-driven sources; `None` means now
    pub time: Option<f64>,
    /// Deliver a pending value before completing
    pub flush: bool,
}

impl StopRequest {
    pub fn at(time: f64) -> Self {
        Self {
            time: Some(time),
            flush: false,
        }
    }

    pub fn flushing() -> Self {
        Self {
            time: None,
            flush: true,
        }
    }
}

/// Backend strategy of a stream.
///
/// Only `shift` is required. A source that does not accept pushes or starts
/// keeps the default methods, which fail with `Unwritable` and
/// `Unstartable`. The default `stop` completes the stream at once.
pub trait Source<T> {
    /// Pull the next value. `None` means nothing is available now; the
    /// source asks for completion through `cx` when it is exhausted.
    fn shift(&mut self, cx: &mut Control) -> Option<T>;

    fn push(&mut self, values: Vec<T>, cx: &mut Control) -> StreamResult<()> {
        let _ = (values, cx);
        Err(StreamError::Unwritable)
    }

    fn start(&mut self, time: Option<f64>, cx: &mut Control) -> StreamResult<()> {
        let _ = (time, cx);
        Err(StreamError::Unstartable)
    }

    fn stop(&mut self, request: StopRequest, cx: &mut Control) {
        let _ = request;
        cx.end();
    }
}

// ================================
// BufferSource
// ================================

/// FIFO queue. Pushes append and notify; stopping lets the queued values
/// drain before completion.
pub struct BufferSource<T> {
    buffer: VecDeque<T>,
    max: Option<usize>,
}

impl<T> BufferSource<T> {
    pub fn new(config: &BufferConfig) -> Self {
        Self {
            buffer: VecDeque::with_capacity(config.initial_capacity),
            max: config.max_capacity,
        }
    }

    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            buffer: values.into_iter().collect(),
            max: None,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl<T> Source<T> for BufferSource<T> {
    fn shift(&mut self, _cx: &mut Control) -> Option<T> {
        self.buffer.pop_front()
    }

    fn push(&mut self, values: Vec<T>, cx: &mut Control) -> StreamResult<()> {
        if let Some(max) = self.max {
            if self.buffer.len() + values.len() > max {
                return Err(StreamError::BackpressureOverflow(max));
            }
        }

        if values.is_empty() {
            return Ok(());
        }
        self.buffer.extend(values);
        cx.notify();
        Ok(())
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        cx.stop_after(self.buffer.len());
    }
}
