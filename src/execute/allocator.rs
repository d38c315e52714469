use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum AllocError {
    QuotaExceeded {
        requested: usize,
        allocated: usize,
        limit: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocError::QuotaExceeded {
                requested,
                allocated,
                limit,
            } => write!(
                f,
                "memory quota exceeded: requested {} bytes with {} of {} bytes in use",
                requested, allocated, limit
            ),
        }
    }
}

/// Tracks bytes held by in-flight column buffers against a fixed quota.
///
/// Clones share the same counter, so one allocator can be handed to every operator of a
/// query, including operators running on other threads.
#[derive(Debug, Clone)]
pub struct Allocator {
    limit: usize,
    bytes: Arc<AtomicUsize>,
}

impl Allocator {
    pub fn new(limit: usize) -> Allocator {
        Allocator {
            limit,
            bytes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unlimited() -> Allocator {
        Allocator::new(usize::max_value())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn allocated(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }

    /// Charges `size` bytes. On failure nothing is charged.
    pub fn account(&self, size: usize) -> Result<(), AllocError> {
        let mut current = self.bytes.load(Ordering::SeqCst);
        loop {
            let next = match current.checked_add(size) {
                Some(n) if n <= self.limit => n,
                _ => {
                    return Err(AllocError::QuotaExceeded {
                        requested: size,
                        allocated: current,
                        limit: self.limit,
                    })
                }
            };
            match self
                .bytes
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn free(&self, size: usize) {
        let mut current = self.bytes.load(Ordering::SeqCst);
        loop {
            let next = current.saturating_sub(size);
            match self
                .bytes
                .compare_exchange(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}
