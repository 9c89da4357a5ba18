use lazy_stream::stream::{Control, Source};
use lazy_stream::{tick, BufferConfig, Functor, Pull, Status, Stream, StreamError};
use quickcheck::quickcheck;
use std::cell::{Cell, RefCell};
use std::ops::ControlFlow;
use std::rc::Rc;

fn recorder<T: 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(T) + 'static) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    (log, move |value| sink.borrow_mut().push(value))
}

#[test]
fn test_from_iter_to_vec() {
    let stream: Stream<i32> = (0..4).collect();
    assert_eq!(stream.to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(stream.status(), Status::Active);
}

#[test]
fn test_from_sparse_skips_holes() {
    let stream = Stream::from_sparse(vec![Some(1), None, Some(2)]);
    assert_eq!(stream.to_vec(), vec![1, 2]);
}

#[test]
fn test_push_notifies_then_pull_delivers() {
    let stream = Stream::buffer();
    let notified = Rc::new(Cell::new(0));
    let count = Rc::clone(&notified);
    stream.on(move || count.set(count.get() + 1));

    stream.push(1).unwrap();
    stream.push_all(vec![2, 3]).unwrap();
    assert_eq!(notified.get(), 2);
    assert_eq!(stream.to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_each_drains_then_reacts() {
    let stream = Stream::of(vec![1, 2]);
    let (log, sink) = recorder();
    stream.each(sink);
    assert_eq!(*log.borrow(), vec![1, 2]);

    stream.push(3).unwrap();
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_push_from_inside_each() {
    let stream = Stream::buffer();
    let (log, mut sink) = recorder();
    let handle = stream.downgrade();
    stream.each(move |value: i32| {
        sink(value);
        if value < 3 {
            if let Some(stream) = handle.upgrade() {
                stream.push(value + 1).unwrap();
            }
        }
    });

    stream.push(1).unwrap();
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
}

#[test]
fn test_pull_tells_idle_from_done() {
    let stream = Stream::of(vec![1]);
    assert_eq!(stream.pull(), Pull::Value(1));
    assert_eq!(stream.pull(), Pull::Idle);
    stream.stop();
    assert_eq!(stream.pull(), Pull::Done);
}

#[test]
fn test_stop_drains_buffer_before_completion() {
    let stream = Stream::of(vec![1, 2]);
    stream.stop();
    assert!(!stream.is_done());
    assert_eq!(stream.push(3), Err(StreamError::Stopped));

    assert_eq!(stream.shift(), Some(1));
    assert_eq!(stream.shift(), Some(2));
    assert!(stream.is_done());
    assert_eq!(stream.shift(), None);
}

#[test]
fn test_stop_with_nothing_left_completes_synchronously() {
    let stream: Stream<i32> = Stream::buffer();
    stream.stop();
    assert!(stream.is_done());
    // Idempotent
    stream.stop();
    assert!(stream.is_done());
}

#[test]
fn test_stop_after_allows_exactly_n_pulls() {
    let stream = Stream::of(vec![1, 2, 3, 4]);
    stream.stop_after(2);
    assert_eq!(stream.to_vec(), vec![1, 2]);
    assert!(stream.is_done());
}

#[test]
fn test_stop_after_ends_early_when_source_runs_dry() {
    let stream: Stream<i32> = Stream::buffer();
    stream.push(1).unwrap();
    stream.stop_after(3);
    assert_eq!(stream.shift(), Some(1));
    assert!(!stream.is_done());
    assert_eq!(stream.shift(), None);
    assert!(stream.is_done());
    assert_eq!(stream.push(2), Err(StreamError::Stopped));
}

#[test]
fn test_end_completes_immediately() {
    let stream = Stream::of(vec![1, 2]);
    stream.end();
    assert!(stream.is_done());
    assert_eq!(stream.shift(), None);
    assert_eq!(stream.push(1), Err(StreamError::Stopped));
}

#[test]
fn test_done_callback_runs_on_next_tick() {
    let stream: Stream<i32> = Stream::buffer();
    let fired = Rc::new(Cell::new(false));
    let flag = Rc::clone(&fired);
    stream.done(move || flag.set(true));

    stream.stop();
    assert!(stream.is_done());
    assert!(!fired.get());
    tick::run();
    assert!(fired.get());

    // Registered after completion: still deferred
    let late = Rc::new(Cell::new(false));
    let flag = Rc::clone(&late);
    stream.done(move || flag.set(true));
    assert!(!late.get());
    tick::run();
    assert!(late.get());
}

#[test]
fn test_on_stop_runs_before_done_callbacks() {
    let stream: Stream<i32> = Stream::buffer();
    let order = Rc::new(RefCell::new(Vec::new()));
    let first = Rc::clone(&order);
    let second = Rc::clone(&order);
    stream.done(move || second.borrow_mut().push("done"));
    stream.on_stop(move || first.borrow_mut().push("teardown"));

    stream.stop();
    assert_eq!(*order.borrow(), vec!["teardown"]);
    tick::run();
    assert_eq!(*order.borrow(), vec!["teardown", "done"]);
}

#[test]
fn test_completion_future_resolves() {
    let stream: Stream<i32> = Stream::buffer();
    let completion = stream.completion();
    stream.stop();
    assert_eq!(tokio_test::block_on(completion), Ok(()));
}

#[test]
fn test_completion_cancelled_when_dropped() {
    let stream: Stream<i32> = Stream::buffer();
    let completion = stream.completion();
    drop(stream);
    assert_eq!(tokio_test::block_on(completion), Err(StreamError::Cancelled));
}

#[test]
fn test_source_is_built_lazily() {
    let built = Rc::new(Cell::new(false));
    let flag = Rc::clone(&built);
    let stream: Stream<i32> = Stream::new(move |_| {
        flag.set(true);
        lazy_stream::stream::BufferSource::from_values(vec![1])
    });

    stream.on(|| {});
    assert!(!built.get());
    assert_eq!(stream.shift(), Some(1));
    assert!(built.get());
}

struct Countdown(u32);

impl Source<u32> for Countdown {
    fn shift(&mut self, cx: &mut Control) -> Option<u32> {
        if self.0 == 0 {
            cx.end();
            return None;
        }
        self.0 -= 1;
        Some(self.0)
    }
}

#[test]
fn test_pull_only_source_rejects_push_and_start() {
    let stream = Stream::from_source(Countdown(2));
    assert_eq!(stream.push(9), Err(StreamError::Unwritable));
    assert_eq!(stream.start(), Err(StreamError::Unstartable));
    assert_eq!(stream.to_vec(), vec![1, 0]);
    assert!(stream.is_done());
}

#[test]
fn test_on_control_short_circuits() {
    let stream: Stream<i32> = Stream::buffer();
    let reached = Rc::new(Cell::new(false));
    let flag = Rc::clone(&reached);
    stream.on_control(|| ControlFlow::Break(()));
    stream.on(move || flag.set(true));

    stream.notify();
    assert!(!reached.get());
}

#[test]
fn test_off_removes_listener() {
    let stream: Stream<i32> = Stream::buffer();
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    let id = stream.on(move || counter.set(counter.get() + 1));
    stream.on(|| {});

    stream.push(1).unwrap();
    stream.off(id);
    stream.push(2).unwrap();
    assert_eq!(count.get(), 1);
    assert_eq!(stream.listener_count(), 1);

    stream.off_all();
    assert_eq!(stream.listener_count(), 0);
}

#[test]
fn test_bounded_buffer_rejects_overflow() {
    let stream = Stream::with_config(BufferConfig::new().max_capacity(2));
    stream.push_all(vec![1, 2]).unwrap();
    assert_eq!(stream.push(3), Err(StreamError::BackpressureOverflow(2)));
    assert_eq!(stream.to_vec(), vec![1, 2]);
    stream.push(3).unwrap();
}

#[test]
fn test_latest_and_functor_conversion() {
    let stream = Stream::of(vec![1, 2, 3]);
    assert_eq!(stream.latest(), Some(3));

    let functor: Functor<i32> = Stream::of(vec![4, 5]).into();
    assert_eq!(functor.map(|x| x * 2).to_vec(), vec![8, 10]);
}

quickcheck! {
    fn prop_from_sparse_to_vec(values: Vec<Option<i64>>) -> bool {
        let expected: Vec<i64> = values.iter().flatten().copied().collect();
        Stream::from_sparse(values).to_vec() == expected
    }

    fn prop_done_is_terminal(values: Vec<u8>) -> bool {
        let stream = Stream::of(values.clone());
        stream.stop();
        let drained = stream.to_vec();
        drained == values
            && stream.is_done()
            && stream.push(0) == Err(StreamError::Stopped)
            && stream.shift().is_none()
    }
}
