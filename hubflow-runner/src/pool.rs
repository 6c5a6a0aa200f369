//! Bounded pool of store handles.
//!
//! Each slot is one `ParquetStore` handle parked in a bounded channel.
//! `acquire` blocks until a slot is free and hands out a `PooledStore`
//! guard; dropping the guard puts the handle back, on every exit path.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use hubflow_core::data::ParquetStore;

use crate::config::{AppConfig, ConfigError};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool size must be at least 1")]
    Empty,

    #[error("no store handle became free within {0:?}")]
    Timeout(Duration),

    #[error("store pool closed")]
    Closed,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Cloneable handle to a fixed set of store slots.
#[derive(Debug, Clone)]
pub struct StorePool {
    tx: Sender<ParquetStore>,
    rx: Receiver<ParquetStore>,
    size: usize,
    root: PathBuf,
}

impl StorePool {
    /// A pool of `size` handles onto the store at `root`.
    pub fn new(root: impl Into<PathBuf>, size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::Empty);
        }
        let root = root.into();
        let (tx, rx) = bounded(size);
        for _ in 0..size {
            tx.send(ParquetStore::new(root.clone()))
                .map_err(|_| PoolError::Closed)?;
        }
        tracing::debug!(root = %root.display(), size, "store pool ready");
        Ok(Self { tx, rx, size, root })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, PoolError> {
        Self::new(config.store_root()?, config.pool_size)
    }

    /// Block until a handle is free.
    pub fn acquire(&self) -> Result<PooledStore, PoolError> {
        let store = self.rx.recv().map_err(|_| PoolError::Closed)?;
        Ok(self.guard(store))
    }

    /// Like `acquire`, giving up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledStore, PoolError> {
        match self.rx.recv_timeout(timeout) {
            Ok(store) => Ok(self.guard(store)),
            Err(RecvTimeoutError::Timeout) => Err(PoolError::Timeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Closed),
        }
    }

    fn guard(&self, store: ParquetStore) -> PooledStore {
        PooledStore {
            store: Some(store),
            home: self.tx.clone(),
        }
    }

    /// Handles currently parked in the pool.
    pub fn available(&self) -> usize {
        self.rx.len()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// A checked-out store handle. Returned to the pool on drop.
#[derive(Debug)]
pub struct PooledStore {
    store: Option<ParquetStore>,
    home: Sender<ParquetStore>,
}

impl Deref for PooledStore {
    type Target = ParquetStore;

    fn deref(&self) -> &ParquetStore {
        // Only `drop` takes the handle out
        match &self.store {
            Some(store) => store,
            None => unreachable!("pooled store used after release"),
        }
    }
}

impl Drop for PooledStore {
    fn drop(&mut self) {
        if let Some(store) = self.store.take() {
            // The channel has room: this slot was taken from it
            let _ = self.home.send(store);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(StorePool::new("/tmp/x", 0), Err(PoolError::Empty)));
    }

    #[test]
    fn guard_returns_slot_on_drop() {
        let pool = StorePool::new("/tmp/hubflow-pool", 2).unwrap();
        assert_eq!(pool.available(), 2);
        {
            let a = pool.acquire().unwrap();
            let _b = pool.acquire().unwrap();
            assert_eq!(pool.available(), 0);
            assert_eq!(a.root(), std::path::Path::new("/tmp/hubflow-pool"));
        }
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn exhausted_pool_times_out() {
        let pool = StorePool::new("/tmp/hubflow-pool", 1).unwrap();
        let _held = pool.acquire().unwrap();
        let err = pool.acquire_timeout(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
    }

    #[test]
    fn slot_released_on_panic() {
        let pool = StorePool::new("/tmp/hubflow-pool", 1).unwrap();
        let worker = pool.clone();
        let joined = thread::spawn(move || {
            let _guard = worker.acquire().unwrap();
            panic!("allocation blew up");
        })
        .join();
        assert!(joined.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn concurrent_users_share_the_pool() {
        let pool = StorePool::new("/tmp/hubflow-pool", 2).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let _guard = pool.acquire().unwrap();
                    thread::sleep(Duration::from_millis(2));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.available(), 2);
    }
}
