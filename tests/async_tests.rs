use lazy_stream::{tick, Frame, Scheduler, Stream, StreamTimer, Timer};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;

fn collect<T: 'static>(stream: &Stream<T>) -> Rc<RefCell<Vec<T>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    stream.each(move |value| sink.borrow_mut().push(value));
    log
}

#[tokio::test]
async fn test_timer_fires_requests_in_one_frame() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let timer = Timer::new(Duration::from_millis(10));
            let fired = Rc::new(Cell::new(0));
            for _ in 0..3 {
                let fired = Rc::clone(&fired);
                timer.request(Box::new(move |_| fired.set(fired.get() + 1)));
            }

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(fired.get(), 3);
        })
        .await;
}

#[tokio::test]
async fn test_timer_cancel() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let timer = Timer::new(Duration::from_millis(10));
            let fired = Rc::new(Cell::new(false));
            let flag = Rc::clone(&fired);
            let id = timer.request(Box::new(move |_| flag.set(true)));
            timer.cancel(id);

            tokio::time::sleep(Duration::from_millis(30)).await;
            assert!(!fired.get());
        })
        .await;
}

#[tokio::test]
async fn test_throttle_with_timer() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let stream = Stream::throttled(Rc::new(Timer::new(Duration::from_millis(10))));
            let log = collect(&stream);

            stream.push_all(vec![1, 2, 3]).unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
            assert_eq!(*log.borrow(), vec![3]);
        })
        .await;
}

#[tokio::test]
async fn test_from_future_yields_value_then_completes() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let stream = Stream::from_future(async { Ok::<_, String>(42) });
            let values = stream.fold(Vec::new(), |mut acc, value| {
                acc.push(value);
                acc
            });
            assert_eq!(values.await, Ok(vec![42]));
        })
        .await;
}

#[tokio::test]
async fn test_from_future_failure_completes_empty() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let stream: Stream<i32> = Stream::from_future(async { Err("boom".to_string()) });
            assert_eq!(stream.completion().await, Ok(()));
            assert_eq!(stream.shift(), None);
        })
        .await;
}

#[tokio::test]
async fn test_from_future_runs_done_callbacks() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let source = Stream::from_future(async {
                tokio::task::yield_now().await;
                Ok::<_, String>("ready")
            });
            let target = Stream::buffer();
            source.pipe(&target);
            let log = collect(&target);

            target.completion().await.unwrap();
            assert_eq!(*log.borrow(), vec!["ready"]);
        })
        .await;
}

#[tokio::test]
async fn test_clock_from_duration() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let clock = Stream::from_duration(Duration::from_millis(5));
            let frames: Rc<RefCell<Vec<Frame>>> = collect(&clock);
            clock.start().unwrap();

            tokio::time::sleep(Duration::from_millis(60)).await;
            clock.stop();

            let frames = frames.borrow();
            assert!(frames.len() >= 2, "got {} frames", frames.len());
            assert!(frames.iter().all(|frame| frame.t2 >= frame.t1));
            assert!(frames.windows(2).all(|pair| pair[0].t2 == pair[1].t1));
        })
        .await;
}

#[test]
fn test_stream_timer_uses_driver_values_as_frames() {
    let driver: Stream<()> = Stream::buffer();
    let timer = Rc::new(StreamTimer::new(&driver));
    let throttled = Stream::throttled(timer);
    let log = collect(&throttled);

    throttled.push_all(vec![1, 2]).unwrap();
    assert!(log.borrow().is_empty());

    driver.push(()).unwrap();
    tick::run();
    assert_eq!(*log.borrow(), vec![2]);
}
