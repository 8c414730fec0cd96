//! A pool of reusable scratch objects.
//!
//! Objects are handed out one at a time and come back (reset, not dropped)
//! when the guard goes out of scope, including on early returns and panics.
//! The pool grows on demand when everything is checked out, without bound.
//! The most recently returned object is handed out first.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tracing::trace;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Reset<T> = Box<dyn Fn(&mut T) + Send + Sync>;

pub struct ReusableStorage<T> {
    free: Mutex<Vec<T>>,
    create: Factory<T>,
    reset: Reset<T>,
    created: AtomicUsize,
}

impl<T: Default + 'static> Default for ReusableStorage<T> {
    fn default() -> Self {
        Self::new(T::default, |object| *object = T::default())
    }
}

impl<T> ReusableStorage<T> {
    pub fn new(
        create: impl Fn() -> T + Send + Sync + 'static,
        reset: impl Fn(&mut T) + Send + Sync + 'static,
    ) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            create: Box::new(create),
            reset: Box::new(reset),
            created: AtomicUsize::new(0),
        }
    }

    /// Check out an object until the guard is dropped.
    pub fn get(&self) -> Reused<'_, T> {
        let pooled = self.free.lock().pop();
        let object = match pooled {
            Some(object) => object,
            None => {
                let created = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                trace!(created, "grow reusable storage");
                (self.create)()
            }
        };
        Reused {
            object: Some(object),
            storage: self,
        }
    }

    /// Run a block with a checked-out object.
    pub fn with<R>(&self, block: impl FnOnce(&mut T) -> R) -> R {
        let mut reused = self.get();
        block(&mut reused)
    }

    /// How many objects were ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// How many objects are waiting to be reused.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    fn release(&self, mut object: T) {
        (self.reset)(&mut object);
        self.free.lock().push(object);
    }
}

/// A checked-out object, returned to its pool on drop.
pub struct Reused<'a, T> {
    object: Option<T>,
    storage: &'a ReusableStorage<T>,
}

impl<T> Deref for Reused<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.object {
            Some(object) => object,
            None => unreachable!("reused object is only taken on drop"),
        }
    }
}

impl<T> DerefMut for Reused<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.object {
            Some(object) => object,
            None => unreachable!("reused object is only taken on drop"),
        }
    }
}

impl<T> Drop for Reused<'_, T> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.storage.release(object);
        }
    }
}
