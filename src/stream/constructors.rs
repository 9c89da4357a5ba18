//! Stream constructors

use std::cell::RefCell;
use std::fmt::Display;
use std::future::Future;
use std::rc::Rc;

use crate::observe::{PathObserver, Unobserve};
use crate::stream_configuration::BufferConfig;
use crate::tick;

use super::core::{Handle, Stream};
use super::source::{BufferSource, Control, Source, StopRequest};

impl<T: 'static> Stream<T> {
    /// An empty pushable stream
    pub fn buffer() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// A pushable stream with a configured buffer
    pub fn with_config(config: BufferConfig) -> Self {
        Self::new(move |_| BufferSource::new(&config))
    }

    /// A pushable stream pre-filled with `values`
    pub fn of(values: Vec<T>) -> Self {
        values.into_iter().collect()
    }

    /// A pushable stream pre-filled from `iter`, skipping holes
    pub fn from_sparse<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
    {
        iter.into_iter().flatten().collect()
    }

    /// A stream that yields the future's value and stops.
    ///
    /// The future runs on the current `tokio::task::LocalSet`. A failed
    /// future stops the stream without a value.
    pub fn from_future<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + 'static,
        E: Display + 'static,
    {
        let stream = Self::buffer();
        let handle = stream.downgrade();

        tokio::task::spawn_local(async move {
            let result = future.await;
            let Some(stream) = handle.upgrade() else {
                return;
            };
            match result {
                Ok(value) => {
                    if let Err(e) = stream.push(value) {
                        log::debug!("from_future: value dropped: {}", e);
                    }
                }
                Err(e) => log::debug!("from_future: future failed: {}", e),
            }
            stream.stop();
            tick::run();
        });

        stream
    }
}

impl<V: 'static> Stream<Option<V>> {
    /// A stream of the values at `path`, as reported by `observer`.
    ///
    /// Only the latest unread value is kept. A path that does not resolve
    /// yields `None`. Stopping the stream stops observing.
    pub fn observe(path: &str, observer: Rc<dyn PathObserver<V>>) -> Self {
        let path = path.to_string();
        Self::new(move |handle: Handle<Option<V>>| {
            let latest = Rc::new(RefCell::new(None));
            let slot = Rc::downgrade(&latest);
            let unobserve = observer.observe(
                &path,
                Box::new(move |value| {
                    let Some(slot) = slot.upgrade() else { return };
                    *slot.borrow_mut() = Some(value);
                    handle.notify();
                }),
            );
            ObserveSource {
                latest,
                unobserve: Some(unobserve),
            }
        })
    }
}

struct ObserveSource<V> {
    latest: Rc<RefCell<Option<Option<V>>>>,
    unobserve: Option<Unobserve>,
}

impl<V> Source<Option<V>> for ObserveSource<V> {
    fn shift(&mut self, _cx: &mut Control) -> Option<Option<V>> {
        self.latest.borrow_mut().take()
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        if let Some(unobserve) = self.unobserve.take() {
            unobserve();
        }
        cx.stop_after(usize::from(self.latest.borrow().is_some()));
    }
}

// Covers completion through `end` and dropped streams
impl<V> Drop for ObserveSource<V> {
    fn drop(&mut self) {
        if let Some(unobserve) = self.unobserve.take() {
            unobserve();
        }
    }
}
