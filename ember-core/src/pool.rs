//! A generational arena - a contiguous growable array type which allows removing
//! from the middle without shifting and therefore without invalidating other indices.
//!
//! When you put an object into the pool you get a handle to that object. A handle
//! stores a generation counter shared with the entry, so a handle whose slot has
//! been reused can be detected as stale instead of silently pointing at a
//! different object.

use std::{
    fmt::{Debug, Display, Formatter},
    hash::{Hash, Hasher},
    marker::PhantomData,
    ops::{Index, IndexMut},
};

const INVALID_GENERATION: u32 = 0;

/// A handle to an object inside a [`Pool`]. Cheap to copy; validity can be
/// checked via [`Pool::is_valid_handle`].
pub struct Handle<T> {
    index: u32,
    generation: u32,
    type_marker: PhantomData<T>,
}

impl<T> Default for Handle<T> {
    #[inline]
    fn default() -> Self {
        Self::NONE
    }
}

impl<T> Copy for Handle<T> {}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Handle<T> {
    #[inline]
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

impl<T> Debug for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl<T> Display for Handle<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.index, self.generation)
    }
}

impl<T> Handle<T> {
    /// A handle that points to nothing.
    pub const NONE: Handle<T> = Handle {
        index: 0,
        generation: INVALID_GENERATION,
        type_marker: PhantomData,
    };

    /// Creates a handle from raw parts. Should only be used to reconstruct
    /// handles obtained from [`Self::index`] and [`Self::generation`].
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Handle {
            index,
            generation,
            type_marker: PhantomData,
        }
    }

    /// Returns `true` if the handle is not [`Self::NONE`]. This does not
    /// guarantee the handle is valid for any particular pool.
    #[inline]
    pub fn is_some(&self) -> bool {
        self.generation != INVALID_GENERATION
    }

    /// Returns `true` if the handle points to nothing.
    #[inline]
    pub fn is_none(&self) -> bool {
        !self.is_some()
    }

    /// Index of the record the handle points to.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the record the handle points to.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct PoolRecord<T> {
    generation: u32,
    payload: Option<T>,
}

/// A contiguous block of records, each either vacant or occupied. See the
/// module docs for details.
#[derive(Debug)]
pub struct Pool<T> {
    records: Vec<PoolRecord<T>>,
    free_stack: Vec<u32>,
}

impl<T> Debug for PoolRecord<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "record(gen {}, {})",
            self.generation,
            if self.payload.is_some() {
                "occupied"
            } else {
                "vacant"
            }
        )
    }
}

impl<T> Default for Pool<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Pool<T> {
    /// Creates an empty pool.
    #[inline]
    pub fn new() -> Self {
        Pool {
            records: Vec::new(),
            free_stack: Vec::new(),
        }
    }

    /// Creates an empty pool with the given capacity.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Pool {
            records: Vec::with_capacity(capacity),
            free_stack: Vec::new(),
        }
    }

    /// Moves an object into the pool and returns a handle to it.
    #[inline]
    pub fn spawn(&mut self, payload: T) -> Handle<T> {
        if let Some(free_index) = self.free_stack.pop() {
            let record = &mut self.records[free_index as usize];
            debug_assert!(record.payload.is_none());
            record.generation += 1;
            record.payload = Some(payload);
            Handle::new(free_index, record.generation)
        } else {
            let index = self.records.len() as u32;
            self.records.push(PoolRecord {
                generation: 1,
                payload: Some(payload),
            });
            Handle::new(index, 1)
        }
    }

    /// Removes the object the handle points to and returns it. Panics if the
    /// handle is invalid.
    #[inline]
    pub fn free(&mut self, handle: Handle<T>) -> T {
        match self.records.get_mut(handle.index as usize) {
            Some(record) if record.generation == handle.generation => {
                match record.payload.take() {
                    Some(payload) => {
                        self.free_stack.push(handle.index);
                        payload
                    }
                    None => panic!("Attempt to double free an object at handle {handle}!"),
                }
            }
            _ => panic!("Attempt to free an object using an invalid handle {handle}!"),
        }
    }

    /// Borrows an object. Panics if the handle is invalid.
    #[inline]
    pub fn borrow(&self, handle: Handle<T>) -> &T {
        self.try_borrow(handle)
            .unwrap_or_else(|| panic!("Invalid handle {handle}!"))
    }

    /// Mutably borrows an object. Panics if the handle is invalid.
    #[inline]
    pub fn borrow_mut(&mut self, handle: Handle<T>) -> &mut T {
        self.try_borrow_mut(handle)
            .unwrap_or_else(|| panic!("Invalid handle {handle}!"))
    }

    /// Borrows an object, returning `None` for stale or dangling handles.
    #[inline]
    pub fn try_borrow(&self, handle: Handle<T>) -> Option<&T> {
        self.records
            .get(handle.index as usize)
            .and_then(|record| {
                if record.generation == handle.generation {
                    record.payload.as_ref()
                } else {
                    None
                }
            })
    }

    /// Mutably borrows an object, returning `None` for stale or dangling handles.
    #[inline]
    pub fn try_borrow_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.records
            .get_mut(handle.index as usize)
            .and_then(|record| {
                if record.generation == handle.generation {
                    record.payload.as_mut()
                } else {
                    None
                }
            })
    }

    /// Checks whether the handle points to a live object in this pool.
    #[inline]
    pub fn is_valid_handle(&self, handle: Handle<T>) -> bool {
        self.records
            .get(handle.index as usize)
            .is_some_and(|record| {
                record.generation == handle.generation && record.payload.is_some()
            })
    }

    /// Returns a handle to the object at the given record index, or
    /// [`Handle::NONE`] if the record is vacant.
    #[inline]
    pub fn handle_from_index(&self, index: u32) -> Handle<T> {
        match self.records.get(index as usize) {
            Some(record) if record.payload.is_some() => Handle::new(index, record.generation),
            _ => Handle::NONE,
        }
    }

    /// Amount of live objects in the pool.
    #[inline]
    pub fn alive_count(&self) -> u32 {
        self.iter().count() as u32
    }

    /// Total amount of records, including vacant ones.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Removes everything from the pool.
    #[inline]
    pub fn clear(&mut self) {
        self.records.clear();
        self.free_stack.clear();
    }

    /// Iterates over live objects.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter().filter_map(|r| r.payload.as_ref())
    }

    /// Mutably iterates over live objects.
    #[inline]
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut().filter_map(|r| r.payload.as_mut())
    }

    /// Iterates over (handle, object) pairs of live objects.
    #[inline]
    pub fn pair_iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.records.iter().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_ref()
                .map(|payload| (Handle::new(i as u32, r.generation), payload))
        })
    }

    /// Mutably iterates over (handle, object) pairs of live objects.
    #[inline]
    pub fn pair_iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.records.iter_mut().enumerate().filter_map(|(i, r)| {
            r.payload
                .as_mut()
                .map(|payload| (Handle::new(i as u32, r.generation), payload))
        })
    }
}

impl<T> Index<Handle<T>> for Pool<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Handle<T>) -> &Self::Output {
        self.borrow(index)
    }
}

impl<T> IndexMut<Handle<T>> for Pool<T> {
    #[inline]
    fn index_mut(&mut self, index: Handle<T>) -> &mut Self::Output {
        self.borrow_mut(index)
    }
}

#[cfg(test)]
mod test {
    use super::{Handle, Pool};

    #[test]
    fn pool_spawn_borrow() {
        let mut pool = Pool::new();
        let foo = pool.spawn("foo");
        let bar = pool.spawn("bar");
        assert_eq!(pool.alive_count(), 2);
        assert_eq!(*pool.borrow(foo), "foo");
        assert_eq!(*pool.borrow(bar), "bar");
        assert_eq!(pool[foo], "foo");
    }

    #[test]
    fn pool_free_invalidates_handle() {
        let mut pool = Pool::new();
        let foo = pool.spawn(123);
        assert!(pool.is_valid_handle(foo));
        assert_eq!(pool.free(foo), 123);
        assert!(!pool.is_valid_handle(foo));
        assert!(pool.try_borrow(foo).is_none());
    }

    #[test]
    fn pool_slot_reuse_bumps_generation() {
        let mut pool = Pool::new();
        let foo = pool.spawn(1);
        pool.free(foo);
        let bar = pool.spawn(2);
        // The slot is reused but the stale handle must not resolve.
        assert_eq!(foo.index(), bar.index());
        assert_ne!(foo.generation(), bar.generation());
        assert!(pool.try_borrow(foo).is_none());
        assert_eq!(*pool.borrow(bar), 2);
    }

    #[test]
    fn pool_handle_none() {
        let pool: Pool<i32> = Pool::new();
        let none = Handle::<i32>::NONE;
        assert!(none.is_none());
        assert!(!pool.is_valid_handle(none));
    }

    #[test]
    fn pool_pair_iter_roundtrip() {
        let mut pool = Pool::new();
        let a = pool.spawn("a");
        let b = pool.spawn("b");
        let pairs: Vec<_> = pool.pair_iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], (a, &"a"));
        assert_eq!(pairs[1], (b, &"b"));
    }

    #[test]
    fn pool_handle_from_index() {
        let mut pool = Pool::new();
        let a = pool.spawn("a");
        assert_eq!(pool.handle_from_index(0), a);
        assert_eq!(pool.handle_from_index(123), Handle::NONE);
    }
}
