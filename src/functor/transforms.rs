//! Lazy transforms: each wraps the parent's pull function in a new one

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::core::{Functor, Status};

impl<T: 'static> Functor<T> {
    /// Apply `f` to every value. Exhaustion passes through without calling `f`.
    pub fn map<U, F>(mut self, mut f: F) -> Functor<U>
    where
        U: 'static,
        F: FnMut(T) -> U + 'static,
    {
        Functor::new(move || self.shift().map(&mut f))
    }

    /// Keep the values satisfying `predicate`
    pub fn filter<F>(mut self, mut predicate: F) -> Functor<T>
    where
        F: FnMut(&T) -> bool + 'static,
    {
        Functor::new(move || self.find(&mut predicate))
    }

    pub fn filter_map<U, F>(mut self, mut f: F) -> Functor<U>
    where
        U: 'static,
        F: FnMut(T) -> Option<U> + 'static,
    {
        Functor::new(move || {
            while let Some(value) = self.shift() {
                if let Some(mapped) = f(value) {
                    return Some(mapped);
                }
            }
            None
        })
    }

    /// Map through a fallible function; failures become `Err` values
    pub fn try_map<U, E, F>(self, f: F) -> Functor<Result<U, E>>
    where
        U: 'static,
        E: 'static,
        F: FnMut(T) -> Result<U, E> + 'static,
    {
        self.map(f)
    }

    /// Yield at most `n` values. The functor is done as soon as the n-th is
    /// pulled.
    pub fn take(mut self, n: usize) -> Functor<T> {
        let status = Rc::new(Cell::new(if n == 0 { Status::Done } else { Status::Active }));
        let own = Rc::clone(&status);
        let mut taken = 0;

        Functor::with_status(
            move || {
                if taken >= n {
                    return None;
                }
                // Only count pulls that produced a value
                let value = self.shift()?;
                taken += 1;
                if taken == n {
                    own.set(Status::Done);
                }
                Some(value)
            },
            status,
        )
    }

    /// Skip the first `n` values
    pub fn rest(mut self, n: usize) -> Functor<T> {
        let mut skip = n;
        Functor::new(move || {
            while skip > 0 {
                skip -= 1;
                self.shift()?;
            }
            self.shift()
        })
    }

    /// Yield `values` before the parent's values
    pub fn unshift(mut self, values: Vec<T>) -> Functor<T> {
        let mut buffer: VecDeque<T> = values.into();
        Functor::new(move || buffer.pop_front().or_else(|| self.shift()))
    }

    /// Yield the first value only
    pub fn first(mut self) -> Functor<T> {
        let mut fired = false;
        Functor::new(move || {
            if fired {
                return None;
            }
            fired = true;
            self.shift()
        })
    }

    /// Yield the parent's last value, pulling it to exhaustion
    pub fn latest(mut self) -> Functor<T> {
        Functor::new(move || {
            let mut last = None;
            while let Some(value) = self.shift() {
                last = Some(value);
            }
            last
        })
    }

    /// Running accumulation, seeded: the first pull yields `seed`, later pulls
    /// yield `f(previous, value)` for each parent value.
    pub fn fold<B, F>(self, seed: B, mut f: F) -> Functor<B>
    where
        B: Clone + 'static,
        F: FnMut(B, T) -> B + 'static,
    {
        let mut acc = seed.clone();
        self.map(move |value| {
            let next = f(acc.clone(), value);
            acc = next.clone();
            next
        })
        .unshift(vec![seed])
    }

    /// Running accumulation without the seed
    pub fn scan<B, F>(mut self, seed: B, mut f: F) -> Functor<B>
    where
        B: Clone + 'static,
        F: FnMut(B, T) -> B + 'static,
    {
        let mut acc = Some(seed);
        Functor::new(move || {
            let value = self.shift()?;
            let next = f(acc.take()?, value);
            acc = Some(next.clone());
            Some(next)
        })
    }

    /// Final value of `fold(seed, f)`; pulls the parent to exhaustion
    pub fn reduce<B, F>(mut self, seed: B, mut f: F) -> B
    where
        F: FnMut(B, T) -> B,
    {
        let mut acc = seed;
        while let Some(value) = self.shift() {
            acc = f(acc, value);
        }
        acc
    }

    /// Call `f` with a reference to each value as it passes
    pub fn tap<F>(mut self, mut f: F) -> Functor<T>
    where
        F: FnMut(&T) + 'static,
    {
        Functor::new(move || {
            let value = self.shift()?;
            f(&value);
            Some(value)
        })
    }

    /// Yield this functor's values, then each of `others` in turn
    pub fn concat(self, others: Vec<Functor<T>>) -> Functor<T> {
        let mut sources: VecDeque<Functor<T>> = VecDeque::with_capacity(others.len() + 1);
        sources.push_back(self);
        sources.extend(others);

        Functor::new(move || {
            while let Some(source) = sources.front_mut() {
                if let Some(value) = source.shift() {
                    return Some(value);
                }
                sources.pop_front();
            }
            None
        })
    }

    /// Group values into vectors, starting a new group at each value that
    /// satisfies `predicate`
    pub fn split<F>(mut self, mut predicate: F) -> Functor<Vec<T>>
    where
        F: FnMut(&T) -> bool + 'static,
    {
        let mut buffer = Vec::new();
        Functor::new(move || loop {
            let Some(value) = self.shift() else {
                return if buffer.is_empty() {
                    None
                } else {
                    Some(std::mem::take(&mut buffer))
                };
            };

            if predicate(&value) && !buffer.is_empty() {
                return Some(std::mem::replace(&mut buffer, vec![value]));
            }
            buffer.push(value);
        })
    }
}

impl<T: Clone + PartialEq + 'static> Functor<T> {
    /// Drop values equal to the one before
    pub fn dedup(mut self) -> Functor<T> {
        let mut last: Option<T> = None;
        Functor::new(move || loop {
            let value = self.shift()?;
            if last.as_ref() != Some(&value) {
                last = Some(value.clone());
                return Some(value);
            }
        })
    }

    /// Drop values seen before anywhere in the sequence
    pub fn unique(mut self) -> Functor<T> {
        let mut seen: Vec<T> = Vec::new();
        Functor::new(move || loop {
            let value = self.shift()?;
            if !seen.contains(&value) {
                seen.push(value.clone());
                return Some(value);
            }
        })
    }
}

impl<T: 'static, E: 'static> Functor<Result<T, E>> {
    /// Recover failed pulls: each `Err(e)` is replaced by `f(e)`.
    /// Later pulls continue from the parent.
    pub fn catch<F>(self, mut f: F) -> Functor<T>
    where
        F: FnMut(E) -> T + 'static,
    {
        self.map(move |result| match result {
            Ok(value) => value,
            Err(error) => f(error),
        })
    }
}

impl<F: 'static> Functor<F> {
    /// Apply each function pulled from this functor to `value`
    pub fn ap<A, B>(self, value: A) -> Functor<B>
    where
        A: Clone + 'static,
        B: 'static,
        F: FnOnce(A) -> B,
    {
        self.map(move |f| f(value.clone()))
    }
}
