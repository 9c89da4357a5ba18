//! Merging and combining several streams

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::error::{StreamError, StreamResult};

use super::core::{Handle, ListenerId, Stream};
use super::source::{Control, Source, StopRequest};

// ================================
// Merge
// ================================

type MergeQueue<T> = Rc<RefCell<VecDeque<T>>>;

struct MergeSource<T> {
    queue: MergeQueue<T>,
    upstreams: Vec<(Stream<T>, ListenerId)>,
}

/// Move everything `upstream` has now into `queue`
fn drain_upstream<T: 'static>(upstream: &Stream<T>, queue: &MergeQueue<T>) -> usize {
    let mut count = 0;
    while let Some(value) = upstream.shift() {
        queue.borrow_mut().push_back(value);
        count += 1;
    }
    count
}

impl<T: 'static> Source<T> for MergeSource<T> {
    fn shift(&mut self, cx: &mut Control) -> Option<T> {
        for (upstream, _) in &self.upstreams {
            drain_upstream(upstream, &self.queue);
        }

        let value = self.queue.borrow_mut().pop_front();
        if self.upstreams.iter().all(|(upstream, _)| upstream.is_done()) {
            cx.stop_after(self.queue.borrow().len());
        }
        value
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        for (upstream, listener) in &self.upstreams {
            upstream.off(*listener);
        }
        cx.stop_after(self.queue.borrow().len());
    }
}

/// Interleave `streams` in arrival order.
///
/// The result is done once every input is done and everything they yielded
/// has been pulled.
pub fn merge<T: 'static>(streams: Vec<Stream<T>>) -> Stream<T> {
    Stream::new(move |handle: Handle<T>| {
        let queue: MergeQueue<T> = Rc::default();
        let upstreams = streams
            .into_iter()
            .map(|upstream| {
                drain_upstream(&upstream, &queue);

                let weak_queue = Rc::downgrade(&queue);
                let weak_upstream = upstream.downgrade();
                let notify = handle.clone();
                let listener = upstream.on(move || {
                    let (Some(queue), Some(upstream)) = (weak_queue.upgrade(), weak_upstream.upgrade()) else {
                        return;
                    };
                    if drain_upstream(&upstream, &queue) > 0 {
                        notify.notify();
                    }
                });

                // Wake consumers so they observe completion
                let notify = handle.clone();
                upstream.done(move || notify.notify());

                (upstream, listener)
            })
            .collect();

        MergeSource { queue, upstreams }
    })
}

impl<T: 'static> Stream<T> {
    /// Merge this stream with `others`
    pub fn merge(&self, others: Vec<Stream<T>>) -> Stream<T> {
        let mut streams = Vec::with_capacity(others.len() + 1);
        streams.push(self.clone());
        streams.extend(others);
        merge(streams)
    }
}

// ================================
// Combine
// ================================

struct CombineState<T> {
    values: Vec<Option<T>>,
    // Upstreams that notified since their value was last read
    stale: Vec<bool>,
    // A refresh read a new value since the last combined read
    hot: bool,
}

struct CombineSource<T, U> {
    upstreams: Vec<(Stream<T>, ListenerId)>,
    state: Rc<RefCell<CombineState<T>>>,
    f: Box<dyn FnMut(&[T]) -> U>,
}

impl<T: Clone + 'static, U> Source<U> for CombineSource<T, U> {
    fn shift(&mut self, cx: &mut Control) -> Option<U> {
        let refresh: Vec<usize> = {
            let state = self.state.borrow();
            (0..self.upstreams.len())
                .filter(|&index| state.stale[index] || state.values[index].is_none())
                .collect()
        };

        // Upstreams may notify while being pulled, so no borrow is held here
        for index in refresh {
            let latest = self.upstreams[index].0.latest();
            let mut state = self.state.borrow_mut();
            // Another consumer may have drained the upstream first
            if latest.is_some() {
                state.values[index] = latest;
                state.hot = true;
            }
            state.stale[index] = false;
        }

        if self.upstreams.iter().all(|(upstream, _)| upstream.is_done()) {
            cx.stop_after(0);
        }

        let current: Vec<T> = {
            let mut state = self.state.borrow_mut();
            // No upstream has emitted since the last combined read
            if !state.hot {
                return None;
            }
            state.hot = false;
            state.values.iter().flatten().cloned().collect()
        };
        (current.len() == self.upstreams.len()).then(|| (self.f)(&current))
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        for (upstream, listener) in &self.upstreams {
            upstream.off(*listener);
        }
        let state = self.state.borrow();
        let pending = state.hot || state.stale.iter().any(|&stale| stale);
        cx.stop_after(usize::from(pending));
    }
}

/// Emit `f` over the latest value of every stream.
///
/// Nothing is emitted until each stream has produced a value. After that,
/// each notification from an upstream allows one new combined value; a pull
/// with no fresh upstream value is idle. Fails for fewer than two streams.
pub fn combine<T, U, F>(f: F, streams: Vec<Stream<T>>) -> StreamResult<Stream<U>>
where
    T: Clone + 'static,
    U: 'static,
    F: FnMut(&[T]) -> U + 'static,
{
    if streams.len() < 2 {
        return Err(StreamError::InvalidArgument(format!(
            "combine needs at least two streams, got {}",
            streams.len()
        )));
    }

    Ok(Stream::new(move |handle: Handle<U>| {
        let count = streams.len();
        let state = Rc::new(RefCell::new(CombineState {
            values: vec![None; count],
            stale: vec![false; count],
            hot: false,
        }));

        let upstreams = streams
            .into_iter()
            .enumerate()
            .map(|(index, upstream)| {
                let listener = upstream.on(hot_listener(Rc::downgrade(&state), index, handle.clone()));
                let notify = handle.clone();
                upstream.done(move || notify.notify());
                (upstream, listener)
            })
            .collect();

        CombineSource {
            upstreams,
            state,
            f: Box::new(f),
        }
    }))
}

fn hot_listener<T, U: 'static>(
    state: Weak<RefCell<CombineState<T>>>,
    index: usize,
    handle: Handle<U>,
) -> impl FnMut() + 'static
where
    T: 'static,
{
    move || {
        if let Some(state) = state.upgrade() {
            let mut state = state.borrow_mut();
            state.stale[index] = true;
        }
        handle.notify();
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Combine this stream with `other` through `f`
    pub fn combine<U, F>(&self, other: &Stream<T>, mut f: F) -> Stream<U>
    where
        U: 'static,
        F: FnMut(&T, &T) -> U + 'static,
    {
        let streams = vec![self.clone(), other.clone()];
        let combined = move |values: &[T]| f(&values[0], &values[1]);
        match combine(combined, streams) {
            Ok(stream) => stream,
            // Two streams always satisfy combine
            Err(_) => Stream::completed(),
        }
    }
}
