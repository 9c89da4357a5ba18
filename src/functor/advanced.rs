//! Buffering transforms: sort, partition, tee, join, chunk

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

use super::core::{Functor, ShiftFn, Status};

impl<T: 'static> Functor<T> {
    /// Yield values in order of `compare`.
    ///
    /// The first pull drains the parent into an ordered buffer; values equal
    /// under `compare` keep their arrival order.
    pub fn sort_by<F>(mut self, mut compare: F) -> Functor<T>
    where
        F: FnMut(&T, &T) -> Ordering + 'static,
    {
        let mut buffer: VecDeque<T> = VecDeque::new();
        Functor::new(move || {
            while let Some(value) = self.shift() {
                let index = buffer.partition_point(|existing| compare(existing, &value) != Ordering::Greater);
                buffer.insert(index, value);
            }
            buffer.pop_front()
        })
    }

    /// Group values into vectors of `n`. An incomplete trailing group is not
    /// emitted.
    pub fn chunk(mut self, n: usize) -> Functor<Vec<T>> {
        if n == 0 {
            return self.batch();
        }

        let mut buffer = Vec::with_capacity(n);
        Functor::new(move || {
            while buffer.len() < n {
                buffer.push(self.shift()?);
            }
            Some(std::mem::replace(&mut buffer, Vec::with_capacity(n)))
        })
    }

    /// All values as one vector; nothing for an empty parent
    pub fn batch(mut self) -> Functor<Vec<T>> {
        Functor::new(move || {
            let values = self.to_vec();
            (!values.is_empty()).then_some(values)
        })
    }

    /// Map each value to a functor and flatten the results
    pub fn chain<U, F>(self, f: F) -> Functor<U>
    where
        U: 'static,
        F: FnMut(T) -> Functor<U> + 'static,
    {
        self.map(f).join()
    }

    /// Demultiplex values by `key` into per-key child functors.
    ///
    /// The outer functor yields `(key, child)` the first time a key is seen.
    /// Pulling a child routes values of other keys into their children's
    /// buffers; keys first seen that way are yielded by the outer functor
    /// later.
    pub fn partition<K, F>(self, key: F) -> Functor<(K, Functor<T>)>
    where
        K: Eq + Hash + Clone + 'static,
        F: FnMut(&T) -> K + 'static,
    {
        let state = Rc::new(RefCell::new(PartitionState {
            source: self,
            key: Box::new(key),
            parts: HashMap::new(),
            fresh: VecDeque::new(),
        }));

        Functor::new(move || {
            let next = state.borrow_mut().fresh.pop_front();
            if let Some((key, buffer)) = next {
                return Some((key.clone(), part(&state, key, buffer)));
            }

            loop {
                let mut guard = state.borrow_mut();
                let value = guard.source.shift()?;
                let key = (guard.key)(&value);

                if let Some(buffer) = guard.parts.get(&key) {
                    buffer.borrow_mut().push_back(value);
                    continue;
                }

                let buffer = Rc::new(RefCell::new(VecDeque::from([value])));
                guard.parts.insert(key.clone(), Rc::clone(&buffer));
                drop(guard);
                return Some((key.clone(), part(&state, key, buffer)));
            }
        })
    }
}

type PartBuffer<T> = Rc<RefCell<VecDeque<T>>>;

struct PartitionState<K, T: 'static> {
    source: Functor<T>,
    key: Box<dyn FnMut(&T) -> K>,
    parts: HashMap<K, PartBuffer<T>>,
    // Parts created while a child was pulling, not yet handed out
    fresh: VecDeque<(K, PartBuffer<T>)>,
}

fn part<K, T>(state: &Rc<RefCell<PartitionState<K, T>>>, key: K, buffer: PartBuffer<T>) -> Functor<T>
where
    K: Eq + Hash + Clone + 'static,
    T: 'static,
{
    let state = Rc::clone(state);
    Functor::new(move || {
        if let Some(value) = buffer.borrow_mut().pop_front() {
            return Some(value);
        }

        let mut guard = state.borrow_mut();
        loop {
            let value = guard.source.shift()?;
            let other = (guard.key)(&value);

            if other == key {
                return Some(value);
            }

            if let Some(buffer) = guard.parts.get(&other) {
                buffer.borrow_mut().push_back(value);
                continue;
            }

            let buffer = Rc::new(RefCell::new(VecDeque::from([value])));
            guard.parts.insert(other.clone(), Rc::clone(&buffer));
            guard.fresh.push_back((other, buffer));
        }
    })
}

struct TeeHub<T> {
    upstream: ShiftFn<T>,
    exhausted: bool,
}

impl<T: Clone + 'static> Functor<T> {
    /// Fork this functor in two without replaying.
    ///
    /// Both sides share one upstream pull. A value pulled by either side is
    /// buffered for the other until it catches up. This functor's own pull
    /// function is replaced by its side of the fork.
    pub fn tee(&mut self) -> Functor<T> {
        if self.is_done() {
            return Functor::empty();
        }

        let upstream = std::mem::replace(&mut self.shift, Box::new(|| None));
        // The upstream may mark its own status done; that cell now belongs to the hub
        self.status = Rc::new(Cell::new(Status::Active));
        let hub = Rc::new(RefCell::new(TeeHub {
            upstream,
            exhausted: false,
        }));
        let mine: PartBuffer<T> = Rc::default();
        let theirs: PartBuffer<T> = Rc::default();

        self.shift = tee_side(Rc::clone(&hub), Rc::clone(&mine), Rc::clone(&theirs));
        Functor::new(tee_side(hub, theirs, mine))
    }
}

fn tee_side<T: Clone + 'static>(
    hub: Rc<RefCell<TeeHub<T>>>,
    own: PartBuffer<T>,
    other: PartBuffer<T>,
) -> ShiftFn<T> {
    Box::new(move || {
        if let Some(value) = own.borrow_mut().pop_front() {
            return Some(value);
        }

        let mut hub = hub.borrow_mut();
        if hub.exhausted {
            return None;
        }

        match (hub.upstream)() {
            Some(value) => {
                other.borrow_mut().push_back(value.clone());
                Some(value)
            }
            None => {
                hub.exhausted = true;
                None
            }
        }
    })
}

struct SyphonHub<T> {
    upstream: ShiftFn<T>,
    predicate: Box<dyn FnMut(&T) -> bool>,
    exhausted: bool,
}

impl<T: 'static> Functor<T> {
    /// Split off the values matching `predicate`.
    ///
    /// The returned functor yields the matching values and this functor keeps
    /// the rest. Values pulled by one side on the way to its own are buffered
    /// for the other.
    pub fn syphon<F>(&mut self, predicate: F) -> Functor<T>
    where
        F: FnMut(&T) -> bool + 'static,
    {
        if self.is_done() {
            return Functor::empty();
        }

        let upstream = std::mem::replace(&mut self.shift, Box::new(|| None));
        self.status = Rc::new(Cell::new(Status::Active));
        let hub = Rc::new(RefCell::new(SyphonHub {
            upstream,
            predicate: Box::new(predicate),
            exhausted: false,
        }));
        let rejected: PartBuffer<T> = Rc::default();
        let matched: PartBuffer<T> = Rc::default();

        self.shift = syphon_side(Rc::clone(&hub), false, Rc::clone(&rejected), Rc::clone(&matched));
        Functor::new(syphon_side(hub, true, matched, rejected))
    }
}

fn syphon_side<T: 'static>(
    hub: Rc<RefCell<SyphonHub<T>>>,
    wants: bool,
    own: PartBuffer<T>,
    other: PartBuffer<T>,
) -> ShiftFn<T> {
    Box::new(move || {
        if let Some(value) = own.borrow_mut().pop_front() {
            return Some(value);
        }

        let mut hub = hub.borrow_mut();
        while !hub.exhausted {
            let Some(value) = (hub.upstream)() else {
                hub.exhausted = true;
                break;
            };
            if (hub.predicate)(&value) == wants {
                return Some(value);
            }
            other.borrow_mut().push_back(value);
        }
        None
    })
}

impl<T: 'static> Functor<Functor<T>> {
    /// Flatten a functor of functors, draining each inner functor before
    /// pulling the next
    pub fn join(mut self) -> Functor<T> {
        let mut inner: Option<Functor<T>> = None;
        Functor::new(move || loop {
            if let Some(value) = inner.as_mut().and_then(Functor::shift) {
                return Some(value);
            }
            inner = Some(self.shift()?);
        })
    }
}
