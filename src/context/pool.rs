use crossbeam::queue::ArrayQueue;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

use super::Context;

/// Default number of idle contexts kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 1024;

/// Lock-free free list of [`Context`] objects.
///
/// `acquire` pops an idle context or allocates a fresh one; dropping the
/// returned [`PooledContext`] wipes the context and pushes it back. When the
/// free list is full the context is simply dropped.
#[derive(Debug)]
pub struct ContextPool {
    idle: ArrayQueue<Box<Context>>,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub discarded: u64,
    pub idle: usize,
    pub capacity: usize,
}

impl ContextPool {
    /// Create a pool holding at most `capacity` idle contexts (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            idle: ArrayQueue::new(capacity.max(1)),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Take a clean context from the pool.
    pub fn acquire(self: &Arc<Self>) -> PooledContext {
        let ctx = match self.idle.pop() {
            Some(ctx) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                ctx
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Box::new(Context::new())
            }
        };
        PooledContext {
            ctx: Some(ctx),
            pool: Arc::clone(self),
        }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        if self.idle.push(ctx).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("context pool full, dropping context");
        }
    }

    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle.len(),
            capacity: self.idle.capacity(),
        }
    }
}

/// A context on loan from a [`ContextPool`]. Returned to the pool on drop,
/// including during unwinding.
pub struct PooledContext {
    ctx: Option<Box<Context>>,
    pool: Arc<ContextPool>,
}

impl Deref for PooledContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only `Drop` takes the box out.
        match self.ctx.as_deref() {
            Some(ctx) => ctx,
            None => unreachable!("pooled context used after release"),
        }
    }
}

impl DerefMut for PooledContext {
    fn deref_mut(&mut self) -> &mut Context {
        match self.ctx.as_deref_mut() {
            Some(ctx) => ctx,
            None => unreachable!("pooled context used after release"),
        }
    }
}

impl Drop for PooledContext {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_acquire_release_reuses() {
        let pool = ContextPool::new(4);
        {
            let mut ctx = pool.acquire();
            ctx.set("k", "v");
        }
        let ctx = pool.acquire();
        assert!(ctx.locals().is_empty());
        drop(ctx);
        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn test_released_context_is_clean() {
        let pool = ContextPool::new(1);
        {
            let mut ctx = pool.acquire();
            ctx.set("user", "alice");
            ctx.string(StatusCode::OK, "hello").unwrap();
        }
        let ctx = pool.acquire();
        assert!(ctx.get("user").is_none());
        assert!(!ctx.response().is_written());
        assert_eq!(ctx.response().size(), 0);
    }

    #[test]
    fn test_full_pool_discards() {
        let pool = ContextPool::new(1);
        let a = pool.acquire();
        let b = pool.acquire();
        drop(a);
        drop(b);
        let stats = pool.stats();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.discarded, 1);
    }

    #[test]
    fn test_release_on_unwind() {
        let pool = ContextPool::new(2);
        let p = Arc::clone(&pool);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut ctx = p.acquire();
            ctx.set("k", 1);
            panic!("boom");
        }));
        assert!(result.is_err());
        assert_eq!(pool.stats().idle, 1);
    }
}
