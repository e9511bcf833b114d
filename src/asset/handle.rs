use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Generational reference into a [`ResourcePool`](super::ResourcePool).
///
/// A handle stays `Copy` regardless of `T`. Once the slot it points at is
/// released (or the pool is flushed by a device reset) the generation no longer
/// matches and lookups return `None`.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

// Manually implement Clone/Copy without requiring T: Clone
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Reinterprets the slot for a backend's own resource table.
    pub(crate) fn cast<U>(self) -> Handle<U> {
        Handle::new(self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_is_copy() {
        let h1: Handle<String> = Handle::new(5, 1);
        let h2 = h1;
        let h3 = h1;
        assert_eq!(h1.index(), h2.index());
        assert_eq!(h1, h3);
    }

    #[test]
    fn generation_distinguishes_handles() {
        let a: Handle<u8> = Handle::new(2, 0);
        let b: Handle<u8> = Handle::new(2, 1);
        assert_ne!(a, b);
    }
}
