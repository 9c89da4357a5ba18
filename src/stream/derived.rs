//! Derived streams, pipes and folding consumers
//!
//! A derived stream listens to its parent and pulls through it, so it stays
//! reactive: a push into the parent wakes the derived stream's consumers.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use crate::error::{StreamError, StreamResult};

use super::core::{Handle, ListenerId, Stream};
use super::source::{Control, Source, StopRequest};

type DeriveFn<T, U> = Box<dyn FnMut(T) -> Option<U>>;

struct DerivedSource<T, U> {
    parent: Stream<T>,
    listener: ListenerId,
    f: DeriveFn<T, U>,
}

impl<T: 'static, U> Source<U> for DerivedSource<T, U> {
    fn shift(&mut self, cx: &mut Control) -> Option<U> {
        while let Some(value) = self.parent.shift() {
            if let Some(mapped) = (self.f)(value) {
                return Some(mapped);
            }
        }
        if self.parent.is_done() {
            cx.end();
        }
        None
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        self.parent.off(self.listener);
        cx.end();
    }
}

impl<T: 'static> Stream<T> {
    fn derive<U: 'static>(&self, f: DeriveFn<T, U>) -> Stream<U> {
        let parent = self.clone();
        let derived = Stream::new(move |handle: Handle<U>| {
            let listener = parent.on(move || handle.notify());
            DerivedSource { parent, listener, f }
        });

        let handle = derived.downgrade();
        self.done(move || handle.end());
        derived
    }

    pub fn map<U, F>(&self, mut f: F) -> Stream<U>
    where
        U: 'static,
        F: FnMut(T) -> U + 'static,
    {
        self.derive(Box::new(move |value| Some(f(value))))
    }

    pub fn filter<F>(&self, mut predicate: F) -> Stream<T>
    where
        F: FnMut(&T) -> bool + 'static,
    {
        self.derive(Box::new(move |value| predicate(&value).then_some(value)))
    }

    pub fn filter_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: FnMut(T) -> Option<U> + 'static,
    {
        self.derive(Box::new(f))
    }

    /// Running accumulation: yields `f(previous, value)` for each value
    pub fn scan<B, F>(&self, seed: B, mut f: F) -> Stream<B>
    where
        B: Clone + 'static,
        F: FnMut(B, T) -> B + 'static,
    {
        let mut acc = Some(seed);
        self.derive(Box::new(move |value| {
            let next = f(acc.take()?, value);
            acc = Some(next.clone());
            Some(next)
        }))
    }

    // ================================
    // Pipes
    // ================================

    /// Push every value of this stream into `target`
    fn forward(&self, target: &Stream<T>) {
        let target = target.downgrade();
        self.each(move |value| {
            let Some(target) = target.upgrade() else { return };
            if let Err(e) = target.push(value) {
                log::debug!("pipe: value dropped: {}", e);
            }
        });
    }

    /// Push every value into `target` and stop `target` when this stream
    /// completes
    pub fn pipe(&self, target: &Stream<T>) -> &Self {
        self.forward(target);
        let target = target.downgrade();
        self.done(move || {
            if let Some(target) = target.upgrade() {
                target.stop();
            }
        })
    }

    // ================================
    // Folding consumers
    // ================================

    /// Resolve with the accumulated value once this stream completes
    pub fn fold<B, F>(&self, seed: B, mut f: F) -> impl Future<Output = StreamResult<B>>
    where
        B: 'static,
        F: FnMut(B, T) -> B + 'static,
    {
        let acc = Rc::new(RefCell::new(Some(seed)));
        let sink = Rc::clone(&acc);
        self.each(move |value| {
            let mut slot = sink.borrow_mut();
            if let Some(current) = slot.take() {
                *slot = Some(f(current, value));
            }
        });

        let done = self.completion();
        async move {
            done.await?;
            let value = acc.borrow_mut().take();
            value.ok_or(StreamError::Cancelled)
        }
    }

    /// Resolve with the values combined by `f`, or `None` for a stream that
    /// yielded nothing
    pub fn reduce<F>(&self, mut f: F) -> impl Future<Output = StreamResult<Option<T>>>
    where
        F: FnMut(T, T) -> T + 'static,
    {
        self.fold(None, move |acc: Option<T>, value| {
            Some(match acc {
                Some(acc) => f(acc, value),
                None => value,
            })
        })
    }
}

impl<T: 'static> Stream<Stream<T>> {
    /// Flatten a stream of streams. Inner values are pushed into the output
    /// as they arrive; the output stops once this stream and every inner
    /// stream are done.
    pub fn join(&self) -> Stream<T> {
        let output = Stream::buffer();
        // The outer stream counts as one
        let live = Rc::new(Cell::new(1usize));

        let finisher = {
            let output = output.downgrade();
            let live = Rc::clone(&live);
            move || {
                let output = output.clone();
                let live = Rc::clone(&live);
                move || {
                    live.set(live.get() - 1);
                    if live.get() == 0 {
                        if let Some(output) = output.upgrade() {
                            output.stop();
                        }
                    }
                }
            }
        };

        let target = output.clone();
        let on_inner = finisher.clone();
        self.each(move |inner: Stream<T>| {
            live.set(live.get() + 1);
            inner.forward(&target);
            let finish = on_inner();
            // Keep the inner stream alive until it completes
            let keep = inner.clone();
            inner.done(move || {
                drop(keep);
                finish();
            });
        });
        self.done(finisher());

        output
    }
}
