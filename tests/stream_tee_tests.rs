use lazy_stream::{tick, Status, Stream};
use quickcheck::quickcheck;

#[test]
fn test_tees_see_every_value() {
    let original = Stream::of(vec![0, 1, 2, 3]);
    let first = original.tee();
    let second = original.tee();

    assert_eq!(original.to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(first.to_vec(), vec![0, 1, 2, 3]);
    assert_eq!(second.to_vec(), vec![0, 1, 2, 3]);

    original.stop();
    assert_eq!(original.status(), Status::Done);
    assert_eq!(first.status(), Status::Active);

    tick::run();
    assert_eq!(first.status(), Status::Done);
    assert_eq!(second.status(), Status::Done);
}

#[test]
fn test_tee_pulled_first_keeps_values_for_original() {
    let original = Stream::of(vec![1, 2, 3]);
    let tee = original.tee();

    assert_eq!(tee.to_vec(), vec![1, 2, 3]);
    assert_eq!(original.to_vec(), vec![1, 2, 3]);
}

fn pushed_then_pulled(stop_first: bool) -> Vec<i32> {
    let original = Stream::of(vec![0, 1]);
    let tee = original.tee();

    assert_eq!(original.shift(), Some(0));
    assert_eq!(original.shift(), Some(1));
    assert_eq!(original.shift(), None);
    original.push_all(vec![2, 3, 4]).unwrap();

    if stop_first {
        original.stop();
    }
    let mut values = tee.to_vec();
    if !stop_first {
        original.stop();
    }
    // Nothing more arrives either way
    assert_eq!(tee.shift(), None);

    values.extend(tee.to_vec());
    values
}

#[test]
fn test_tee_after_push_with_stop_before_pull() {
    assert_eq!(pushed_then_pulled(true), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_tee_after_push_with_stop_after_pull() {
    assert_eq!(pushed_then_pulled(false), vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_tee_completes_when_parent_source_runs_out() {
    let original = Stream::of(vec![1, 2]);
    let tee = original.tee();
    original.stop();

    assert_eq!(tee.to_vec(), vec![1, 2]);
    assert!(tee.is_done());
    // The original still owes its own consumer both values
    assert!(!original.is_done());
    assert_eq!(original.to_vec(), vec![1, 2]);
    assert!(original.is_done());
}

#[test]
fn test_tee_is_notified_of_pushes() {
    let original = Stream::buffer();
    let tee = original.tee();
    let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = std::rc::Rc::clone(&seen);
    tee.each(move |value: i32| sink.borrow_mut().push(value));

    original.push(7).unwrap();
    original.push(8).unwrap();
    assert_eq!(*seen.borrow(), vec![7, 8]);
    assert_eq!(original.to_vec(), vec![7, 8]);
}

#[test]
fn test_tee_of_done_stream_is_done() {
    let original: Stream<i32> = Stream::buffer();
    original.stop();
    assert!(original.tee().is_done());
}

#[test]
fn test_stopping_tee_leaves_original_running() {
    let original = Stream::of(vec![1, 2]);
    let tee = original.tee();
    tee.stop();

    // The tee kept what the original could give at the time
    assert_eq!(tee.to_vec(), vec![1, 2]);
    assert!(tee.is_done());

    original.push(3).unwrap();
    assert_eq!(original.to_vec(), vec![1, 2, 3]);
}

#[test]
fn test_tee_of_mapped_stream_keeps_values_for_both() {
    let source = Stream::of(vec![1, 2]);
    let mapped = source.map(|v| v * 10);
    let tee = mapped.tee();
    source.stop();

    assert_eq!(tee.to_vec(), vec![10, 20]);
    assert!(tee.is_done());
    // The mapped source ended while the tee pulled; its own consumer is still owed both
    assert!(!mapped.is_done());
    assert_eq!(mapped.to_vec(), vec![10, 20]);
    assert!(mapped.is_done());
}

#[test]
fn test_tee_of_tee_keeps_values_for_every_side() {
    let original = Stream::of(vec![1, 2]);
    let first = original.tee();
    let second = first.tee();
    original.stop();

    assert_eq!(second.to_vec(), vec![1, 2]);
    assert_eq!(first.to_vec(), vec![1, 2]);
    assert_eq!(original.to_vec(), vec![1, 2]);
    assert!(first.is_done());
    assert!(original.is_done());
}

#[test]
fn test_end_delivers_values_pulled_by_tee() {
    let original = Stream::of(vec![1, 2, 3]);
    let tee = original.tee();
    assert_eq!(tee.shift(), Some(1));
    assert_eq!(tee.shift(), Some(2));

    original.end();
    assert_eq!(original.to_vec(), vec![1, 2]);
    assert!(original.is_done());
}

quickcheck! {
    fn prop_tees_are_lossless(values: Vec<u16>, through: u8, order: Vec<u8>) -> bool {
        let base = Stream::of(values.clone());
        let original = match through % 3 {
            0 => base.clone(),
            1 => base.map(|v| v),
            _ => base.tee(),
        };
        base.stop();

        let first = original.tee();
        let second = original.tee();
        let streams = [original, first, second];
        let mut seen = vec![Vec::new(), Vec::new(), Vec::new()];

        for pick in order {
            let index = usize::from(pick % 3);
            seen[index].extend(streams[index].shift());
        }
        for (index, stream) in streams.iter().enumerate() {
            seen[index].extend(stream.to_vec());
        }

        seen.iter().all(|values_seen| *values_seen == values)
    }
}
