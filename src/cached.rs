use std::cell::RefCell;

use crate::error::Result;
use crate::status::Freshness;

/// Lazily fetched platform value. Failures are cached like successes.
#[derive(Debug, Clone)]
pub struct Cached<T> {
    value: RefCell<Option<Result<T>>>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self {
            value: RefCell::new(None),
        }
    }
}

impl<T: Clone> Cached<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result, or runs `compute` when nothing was fetched yet or a
    /// refresh is forced. The fresh result replaces whatever was cached.
    pub fn get_or_compute<F>(&self, freshness: Freshness, compute: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if freshness == Freshness::Cached {
            if let Some(cached) = self.value.borrow().as_ref() {
                return cached.clone();
            }
        }

        let fresh = compute();
        *self.value.borrow_mut() = Some(fresh.clone());
        fresh
    }

    pub fn is_fetched(&self) -> bool {
        self.value.borrow().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HdrError;
    use std::cell::Cell;

    #[test]
    fn computes_once_while_cached() {
        let cache = Cached::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(42)
        };

        assert!(!cache.is_fetched());
        assert_eq!(cache.get_or_compute(Freshness::Cached, compute), Ok(42));
        assert_eq!(cache.get_or_compute(Freshness::Cached, || Ok(0)), Ok(42));
        assert_eq!(calls.get(), 1);
        assert!(cache.is_fetched());
    }

    #[test]
    fn force_refresh_overwrites() {
        let cache = Cached::new();
        cache.get_or_compute(Freshness::Cached, || Ok(1)).unwrap();

        assert_eq!(cache.get_or_compute(Freshness::ForceRefresh, || Ok(2)), Ok(2));
        assert_eq!(cache.get_or_compute(Freshness::Cached, || Ok(3)), Ok(2));
    }

    #[test]
    fn errors_are_cached_too() {
        let cache: Cached<u32> = Cached::new();
        let err = HdrError::DisplayConfig(87);

        assert_eq!(cache.get_or_compute(Freshness::Cached, || Err(err.clone())), Err(err.clone()));
        assert_eq!(cache.get_or_compute(Freshness::Cached, || Ok(1)), Err(err));
    }
}
