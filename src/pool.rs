//! Bounded recycler for fixed-shape buffers.
//!
//! Mirrors the reference firmware's `Pool<T>`: a free list guarded by a
//! single mutex, an `on_acquire` hook that resets an object before it
//! becomes visible to its caller, and an optional `on_release` hook run
//! when a [`Handle`] is dropped.

use std::sync::{Arc, Mutex};

/// A reset/release hook run on a pooled value.
pub type Hook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

struct Inner<T> {
    free: Mutex<Vec<T>>,
    on_acquire: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
}

/// A pool of reusable `T` values.
pub struct Pool<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Default> Pool<T> {
    /// Create an empty pool with no reset hooks.
    pub fn new() -> Self {
        Self::with_hooks(None, None)
    }

    /// Create a pool with an `on_acquire` and/or `on_release` hook.
    pub fn with_hooks(on_acquire: Option<Hook<T>>, on_release: Option<Hook<T>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                free: Mutex::new(Vec::new()),
                on_acquire,
                on_release,
            }),
        }
    }

    /// Acquire a value, either recycled from the free list or freshly
    /// allocated via `T::default()`. Runs `on_acquire` before handing
    /// the value to the caller.
    pub fn acquire(&self) -> Handle<T> {
        let mut value = {
            let mut free = self.inner.free.lock().unwrap();
            free.pop().unwrap_or_default()
        };
        if let Some(hook) = &self.inner.on_acquire {
            hook(&mut value);
        }
        Handle {
            value: Some(value),
            inner: self.inner.clone(),
        }
    }

    /// Number of objects currently idle in the free list.
    pub fn idle_count(&self) -> usize {
        self.inner.free.lock().unwrap().len()
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A scoped handle to a pooled `T`. Runs the pool's `on_release` hook
/// and returns the value to the free list on drop.
pub struct Handle<T> {
    value: Option<T>,
    inner: Arc<Inner<T>>,
}

impl<T> std::ops::Deref for Handle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.value.as_ref().expect("value taken from live handle")
    }
}

impl<T> std::ops::DerefMut for Handle<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("value taken from live handle")
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(mut value) = self.value.take() {
            if let Some(hook) = &self.inner.on_release {
                hook(&mut value);
            }
            self.inner.free.lock().unwrap().push(value);
        }
    }
}
