//! Deferred work for the current thread
//!
//! A tick is one drain of this queue. Work requested while the queue is
//! draining runs in the same drain, after everything queued before it, so a
//! single `run()` settles all chained deferrals. Schedulers run a drain after
//! each frame; synchronous callers drain explicitly.

use std::cell::RefCell;
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

thread_local! {
    static QUEUE: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
}

/// Queue `f` to run on the next tick
pub fn request<F>(f: F)
where
    F: FnOnce() + 'static,
{
    QUEUE.with(|queue| queue.borrow_mut().push_back(Box::new(f)));
}

/// Run queued work until the queue is empty, returning how many tasks ran
pub fn run() -> usize {
    let mut count = 0;
    // The borrow is released before each task runs so tasks may queue more.
    while let Some(task) = QUEUE.with(|queue| queue.borrow_mut().pop_front()) {
        task();
        count += 1;
    }
    if count > 0 {
        log::trace!("tick: ran {} deferred tasks", count);
    }
    count
}

/// Number of tasks waiting for the next tick
pub fn pending() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}
