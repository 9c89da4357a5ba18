//! Forking a stream into independently paced consumers

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::core::{Handle, ListenerId, Stream, TapId};
use super::source::{Control, Source, StopRequest};

type TeeBuffer<T> = Rc<RefCell<VecDeque<T>>>;

struct TeeSource<T> {
    parent: Stream<T>,
    buffer: TeeBuffer<T>,
    tap: Option<TapId>,
    listener: ListenerId,
}

impl<T: Clone + 'static> Source<T> for TeeSource<T> {
    fn shift(&mut self, cx: &mut Control) -> Option<T> {
        let buffered = self.buffer.borrow_mut().pop_front();
        if buffered.is_some() {
            return buffered;
        }

        let value = self.tap.and_then(|tap| self.parent.pull_for_tee(tap));
        if value.is_none() && self.parent.source_exhausted() {
            self.parent.off(self.listener);
            cx.end();
        }
        value
    }

    fn stop(&mut self, _request: StopRequest, cx: &mut Control) {
        // Take what the parent can still give before letting go of it
        if let Some(tap) = self.tap.take() {
            while let Some(value) = self.parent.pull_for_tee(tap) {
                self.buffer.borrow_mut().push_back(value);
            }
            self.parent.remove_tap(tap);
        }
        self.parent.off(self.listener);
        cx.stop_after(self.buffer.borrow().len());
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Fork this stream without replaying.
    ///
    /// The tee sees every value pulled from this stream's source after this
    /// call, whichever side pulled it first; values are buffered for the
    /// side that lags behind. Pushes into this stream reach both. The tee
    /// stops on the tick after this stream completes.
    pub fn tee(&self) -> Stream<T> {
        let buffer: TeeBuffer<T> = Rc::default();
        let receiver = Rc::downgrade(&buffer);
        let Some(tap) = self.add_tap(Box::new(move |value: &T| match receiver.upgrade() {
            Some(buffer) => {
                buffer.borrow_mut().push_back(value.clone());
                true
            }
            None => false,
        })) else {
            return Stream::completed();
        };

        let parent = self.clone();
        let tee = Stream::new(move |handle: Handle<T>| {
            let listener = parent.on(move || handle.notify());
            TeeSource {
                parent,
                buffer,
                tap: Some(tap),
                listener,
            }
        });

        let handle = tee.downgrade();
        self.done(move || {
            if let Some(tee) = handle.upgrade() {
                tee.stop();
            }
        });
        tee
    }
}
