//! The lazy pull protocol: `Functor<T>` and its constructors and consumers

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle of a functor or stream. Moves from `Active` to `Done` once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Done,
}

pub(crate) type ShiftFn<T> = Box<dyn FnMut() -> Option<T>>;

/// A single-consumer lazy sequence.
///
/// `shift()` pulls the next value. The first `None` marks the functor done
/// and every later `shift()` returns `None` without touching the producer.
/// Transforms consume the functor and wrap its pull function in a new one.
pub struct Functor<T> {
    pub(crate) shift: ShiftFn<T>,
    pub(crate) status: Rc<Cell<Status>>,
}

impl<T: 'static> Functor<T> {
    /// Create a functor from a pull function
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut() -> Option<T> + 'static,
    {
        Self::with_status(f, Rc::new(Cell::new(Status::Active)))
    }

    /// Pull function sharing a status cell it may mark done itself
    pub(crate) fn with_status<F>(f: F, status: Rc<Cell<Status>>) -> Self
    where
        F: FnMut() -> Option<T> + 'static,
    {
        Self {
            shift: Box::new(f),
            status,
        }
    }

    /// A functor that is already done
    pub fn empty() -> Self {
        Self::with_status(|| None, Rc::new(Cell::new(Status::Done)))
    }

    /// A functor over the given values
    pub fn of(values: Vec<T>) -> Self {
        Self::from_iter(values)
    }

    /// A functor over an iterator. Pulls are forwarded lazily.
    #[allow(clippy::should_implement_trait)]
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: 'static,
    {
        let mut iter = iter.into_iter();
        Self::new(move || iter.next())
    }

    /// A functor over values with holes; holes are skipped
    pub fn from_sparse<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
        I::IntoIter: 'static,
    {
        Self::from_iter(iter.into_iter().flatten())
    }

    /// Pull the next value
    pub fn shift(&mut self) -> Option<T> {
        if self.is_done() {
            return None;
        }

        let value = (self.shift)();
        if value.is_none() {
            self.status.set(Status::Done);
        }
        value
    }

    pub fn status(&self) -> Status {
        self.status.get()
    }

    pub fn is_done(&self) -> bool {
        self.status.get() == Status::Done
    }

    // ================================
    // Consumers
    // ================================

    /// Call `f` with every value until exhaustion
    pub fn each<F>(&mut self, mut f: F) -> &mut Self
    where
        F: FnMut(T),
    {
        while let Some(value) = self.shift() {
            f(value);
        }
        self
    }

    /// Pull every value into a vector
    pub fn to_vec(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        self.each(|value| values.push(value));
        values
    }

    /// Pull until a value satisfies `predicate`
    pub fn find<F>(&mut self, mut predicate: F) -> Option<T>
    where
        F: FnMut(&T) -> bool,
    {
        while let Some(value) = self.shift() {
            if predicate(&value) {
                return Some(value);
            }
        }
        None
    }
}

/// A functor is its own iterator
impl<T: 'static> Iterator for Functor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.shift()
    }
}

impl<T: 'static> std::fmt::Debug for Functor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Functor")
            .field("status", &self.status())
            .finish()
    }
}
