use lazy_stream::{tick, Functor, ManualScheduler, Stream};
use std::rc::Rc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::LocalSet;

fn main() {
    // Lazy sequences: nothing runs until the values are pulled
    let result = Functor::from_iter(vec![1, 2, 3, 4, 5])
        .filter(|&x| x % 2 == 0) // Keep only even numbers
        .map(|x| x * 2) // Double each number
        .to_vec();
    println!("Functor result: {:?}", result); // Output: Functor result: [4, 8]

    // Push/pull streams with two independent readers
    let events = Stream::buffer();
    let audit = events.tee();
    events.each(|event: &str| println!("handled: {}", event));

    events.push_all(vec!["login", "click", "logout"]).unwrap();
    events.stop();
    println!("audit copy: {:?}", audit.to_vec());
    tick::run();
    println!("audit done: {}", audit.is_done());

    // Throttling against a hand-driven clock
    let frames = Rc::new(ManualScheduler::new());
    let positions = Stream::throttled(frames.clone());
    positions.each(|x: i32| println!("render position {}", x));
    positions.push_all(vec![10, 11, 12]).unwrap();
    frames.advance(0.016); // Output: render position 12

    // Timed sources run on a tokio LocalSet
    let rt = Runtime::new().unwrap();
    let local = LocalSet::new();
    local.block_on(&rt, async {
        let answer = Stream::from_future(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, String>(42)
        });
        let total = answer.fold(0, |acc, x| acc + x).await.unwrap();
        println!("future result: {}", total); // Output: future result: 42
    });
}
