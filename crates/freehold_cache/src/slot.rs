//! Generation slot: the single serialization point of the snapshot-swap
//! discipline.
//!
//! A [`Slot`] holds the currently-published generation of some immutable
//! value. Readers take one reference copy and then work entirely on that
//! generation; writers build a replacement off to the side and publish it
//! with a single assignment. The lock inside is held only for the clone or
//! the assignment, never while a generation is being built or queried.

use std::sync::{Arc, RwLock};

/// Atomically swappable reference to an immutable generation.
#[derive(Debug)]
pub struct Slot<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Slot<T> {
    pub fn new(initial: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Copy out the current generation.
    ///
    /// The returned `Arc` pins that generation for as long as the caller
    /// holds it; a concurrent publish cannot mutate it.
    pub fn load(&self) -> Arc<T> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a new generation, replacing the old one.
    pub fn store(&self, value: T) {
        let mut slot = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Arc::new(value);
    }
}
