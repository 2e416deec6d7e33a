//! Bounded pool of CAS instances.
//!
//! Every CAS in a pool shares one committed [`TypeSystem`]. A checked-out
//! CAS is wrapped in a [`PooledCas`] guard; dropping the guard resets the
//! CAS and returns it to the pool, waking one waiting thread.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use cas_core::{Cas, CasConfig, CasError, IndexDefinition, TypeSystem};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Pool errors.
#[derive(Error, Debug)]
pub enum PoolError {
    /// A CAS could not be created
    #[error(transparent)]
    Cas(#[from] CasError),

    /// A pool must hold at least one CAS
    #[error("CAS pool size must be greater than zero")]
    EmptyPool,

    /// No CAS became available in time
    #[error("No CAS available after waiting {waited:?}")]
    Timeout { waited: Duration },
}

/// Result type for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

struct PoolState {
    free: Vec<Cas>,
    in_use: usize,
}

struct PoolInner {
    state: Mutex<PoolState>,
    available: Condvar,
    size: usize,
    type_system: Arc<TypeSystem>,
}

impl PoolInner {
    fn release(&self, mut cas: Cas) {
        cas.reset();
        let mut state = self.state.lock();
        state.free.push(cas);
        state.in_use -= 1;
        tracing::trace!(
            "Released CAS to pool ({} available, {} in use)",
            state.free.len(),
            state.in_use
        );
        drop(state);
        self.available.notify_one();
    }
}

/// A fixed number of CAS instances handed out to processing threads.
///
/// Cloning the pool is cheap; clones share the same instances.
#[derive(Clone)]
pub struct CasPool {
    inner: Arc<PoolInner>,
}

impl CasPool {
    /// Creates a pool of `size` CAS instances with the built-in indexes.
    ///
    /// # Arguments
    /// * `type_system` - Committed type system shared by every instance
    /// * `size` - Number of instances
    /// * `config` - Heap sizing for each instance
    pub fn new(type_system: Arc<TypeSystem>, size: usize, config: CasConfig) -> Result<Self> {
        Self::with_indexes(type_system, size, config, &[])
    }

    /// Creates a pool whose instances also define `definitions`.
    pub fn with_indexes(
        type_system: Arc<TypeSystem>,
        size: usize,
        config: CasConfig,
        definitions: &[IndexDefinition],
    ) -> Result<Self> {
        if size == 0 {
            return Err(PoolError::EmptyPool);
        }
        let free = (0..size)
            .map(|_| Cas::with_indexes(type_system.clone(), config.clone(), definitions))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!("Created CAS pool with {} instances", size);
        Ok(Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState { free, in_use: 0 }),
                available: Condvar::new(),
                size,
                type_system,
            }),
        })
    }

    /// Takes a CAS, blocking until one is available.
    pub fn get_cas(&self) -> PooledCas {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(cas) = self.checkout(&mut state) {
                return cas;
            }
            self.inner.available.wait(&mut state);
        }
    }

    /// Takes a CAS, waiting at most `timeout`.
    ///
    /// # Returns
    /// `Err(PoolError::Timeout)` if every instance stayed in use.
    pub fn get_cas_timeout(&self, timeout: Duration) -> Result<PooledCas> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(cas) = self.checkout(&mut state) {
                return Ok(cas);
            }
            if self
                .inner
                .available
                .wait_for(&mut state, timeout)
                .timed_out()
            {
                return match self.checkout(&mut state) {
                    Some(cas) => Ok(cas),
                    None => {
                        tracing::warn!("Timed out after {:?} waiting for a CAS", timeout);
                        Err(PoolError::Timeout { waited: timeout })
                    }
                };
            }
        }
    }

    /// Takes a CAS if one is free right now.
    pub fn try_get_cas(&self) -> Option<PooledCas> {
        let mut state = self.inner.state.lock();
        self.checkout(&mut state)
    }

    fn checkout(&self, state: &mut PoolState) -> Option<PooledCas> {
        let cas = state.free.pop()?;
        state.in_use += 1;
        Some(PooledCas {
            cas: Some(cas),
            pool: self.inner.clone(),
        })
    }

    /// Number of instances not checked out.
    pub fn available(&self) -> usize {
        self.inner.state.lock().free.len()
    }

    /// Number of instances checked out.
    pub fn in_use(&self) -> usize {
        self.inner.state.lock().in_use
    }

    /// Total number of instances.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    pub fn type_system(&self) -> &Arc<TypeSystem> {
        &self.inner.type_system
    }
}

/// A CAS checked out of a [`CasPool`].
///
/// Dereferences to [`Cas`]. Dropping it resets the CAS and returns it.
pub struct PooledCas {
    cas: Option<Cas>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledCas {
    type Target = Cas;

    fn deref(&self) -> &Cas {
        // Only taken in drop.
        self.cas.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledCas {
    fn deref_mut(&mut self) -> &mut Cas {
        self.cas.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledCas {
    fn drop(&mut self) {
        if let Some(cas) = self.cas.take() {
            self.pool.release(cas);
        }
    }
}
