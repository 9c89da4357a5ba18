use lazy_stream::{ManualScheduler, Scheduler, Stream, StreamError};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

fn scheduler() -> Rc<ManualScheduler> {
    Rc::new(ManualScheduler::new())
}

fn count_notifications<T: 'static>(stream: &Stream<T>) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let counter = Rc::clone(&count);
    stream.on(move || counter.set(counter.get() + 1));
    count
}

#[test]
fn test_throttle_emits_last_value_once_per_frame() {
    let timer = scheduler();
    let stream = Stream::throttled(timer.clone());
    let notified = count_notifications(&stream);

    stream.push(1).unwrap();
    stream.push(2).unwrap();
    stream.push(3).unwrap();
    assert_eq!(notified.get(), 0);
    assert_eq!(timer.pending(), 1);

    timer.advance(0.016);
    assert_eq!(notified.get(), 1);
    assert_eq!(stream.shift(), Some(3));
    assert_eq!(stream.shift(), None);
}

#[test]
fn test_throttle_with_each() {
    let timer = scheduler();
    let stream = Stream::throttled(timer.clone());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    stream.each(move |value: i32| sink.borrow_mut().push(value));

    stream.push_all(vec![1, 2]).unwrap();
    timer.advance(0.016);
    stream.push(3).unwrap();
    stream.push(4).unwrap();
    timer.advance(0.016);
    // Nothing pushed: nothing requested
    assert_eq!(timer.advance(0.016), 0);

    assert_eq!(*seen.borrow(), vec![2, 4]);
}

#[test]
fn test_throttle_stop_drops_pending_value() {
    let timer = scheduler();
    let stream = Stream::throttled(timer.clone());
    stream.push(1).unwrap();
    stream.stop();

    assert!(stream.is_done());
    assert_eq!(timer.pending(), 0);
    assert_eq!(stream.push(2), Err(StreamError::Stopped));
}

#[test]
fn test_throttle_stop_flushing_keeps_pending_value() {
    let timer = scheduler();
    let stream = Stream::throttled(timer.clone());
    stream.push(1).unwrap();
    stream.stop_flushing();

    assert!(!stream.is_done());
    assert_eq!(stream.shift(), Some(1));
    assert!(stream.is_done());
}

#[test]
fn test_throttle_pipe() {
    let timer = scheduler();
    let source = Stream::buffer();
    let throttled = source.throttle(timer.clone());

    source.push_all(vec![1, 2, 3]).unwrap();
    timer.advance(0.016);
    assert_eq!(throttled.to_vec(), vec![3]);
}

#[test]
fn test_choke_waits_for_quiet_period() {
    let timer = scheduler();
    let stream = Stream::choked(Duration::from_millis(100), timer.clone());
    let notified = count_notifications(&stream);

    stream.push(1).unwrap();
    timer.advance(0.05);
    stream.push(2).unwrap();
    timer.advance(0.05);
    // 0.1 s since the first push, 0.05 s since the last
    assert_eq!(notified.get(), 0);
    assert_eq!(stream.shift(), None);

    timer.advance(0.06);
    assert_eq!(notified.get(), 1);
    assert_eq!(stream.shift(), Some(2));
}

#[test]
fn test_choke_stop_cancels_request() {
    let timer = scheduler();
    let stream = Stream::choked(Duration::from_millis(100), timer.clone());
    stream.push(1).unwrap();
    stream.stop();

    assert!(stream.is_done());
    assert_eq!(timer.pending(), 0);
}

#[test]
fn test_manual_scheduler_defers_requests_made_during_frame() {
    let timer = scheduler();
    let fired = Rc::new(RefCell::new(Vec::new()));

    let inner_timer = Rc::clone(&timer);
    let log = Rc::clone(&fired);
    timer.request(Box::new(move |time| {
        log.borrow_mut().push(time);
        let log = Rc::clone(&log);
        inner_timer.request(Box::new(move |time| log.borrow_mut().push(time)));
    }));

    assert_eq!(timer.frame_at(1.0), 1);
    assert_eq!(*fired.borrow(), vec![1.0]);
    assert_eq!(timer.frame_at(2.0), 1);
    assert_eq!(*fired.borrow(), vec![1.0, 2.0]);
}

#[test]
fn test_manual_scheduler_cancel() {
    let timer = scheduler();
    let id = timer.request(Box::new(|_| panic!("cancelled callback fired")));
    timer.cancel(id);
    assert_eq!(timer.advance(1.0), 0);
}
