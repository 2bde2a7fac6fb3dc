//! One-line constructors for the common single-advice cases.
//!
//! Each function configures exactly one kind of advice and returns a ready
//! [`Transformer`]. Attach a wrap-time hook with
//! [`Transformer::with_modify`].
//!
//! ```rust,ignore
//! let log_error = after_throwing(|t| {
//!     tracing::error!("{} threw {}", t.join_point.full_name(), t.error);
//!     Ok(())
//! });
//!
//! let class = ClassBuilder::new("MyClass")
//!     .method("add", add_behavior)
//!     .decorate("add", &log_error)
//!     .build();
//! ```

use std::future::Future;

use aspect_core::{AdviceResult, InvokeResult, JoinPoint};

use crate::advice::{AsyncAdvice, Finally, Returning, SyncAdvice, Throwing};
use crate::engine::{Transformer, wrap};

/// Runs `advice` before every call.
pub fn before<F>(advice: F) -> Transformer
where
    F: Fn(&JoinPoint) -> AdviceResult + Send + Sync + 'static,
{
    wrap(SyncAdvice::new().before(advice))
}

/// Runs `advice` after every call that returned normally.
pub fn after_returning<F>(advice: F) -> Transformer
where
    F: Fn(&Returning) -> AdviceResult + Send + Sync + 'static,
{
    wrap(SyncAdvice::new().after_returning(advice))
}

/// Runs `advice` after every call that failed. The caller still receives the
/// original error.
pub fn after_throwing<F>(advice: F) -> Transformer
where
    F: Fn(&Throwing) -> AdviceResult + Send + Sync + 'static,
{
    wrap(SyncAdvice::new().after_throwing(advice))
}

/// Runs `advice` after every call.
pub fn after_finally<F>(advice: F) -> Transformer
where
    F: Fn(&Finally) -> AdviceResult + Send + Sync + 'static,
{
    wrap(SyncAdvice::new().after_finally(advice))
}

/// Replaces every call with `advice`, which decides whether to
/// [`proceed`](JoinPoint::proceed).
pub fn around<F>(advice: F) -> Transformer
where
    F: Fn(&JoinPoint) -> InvokeResult + Send + Sync + 'static,
{
    wrap(SyncAdvice::new().around(advice))
}

/// Awaits `advice` before every call.
pub fn async_before<F, Fut>(advice: F) -> Transformer
where
    F: Fn(JoinPoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdviceResult> + Send + 'static,
{
    wrap(AsyncAdvice::new().before(advice))
}

/// Awaits `advice` after every call that returned normally.
pub fn async_after_returning<F, Fut>(advice: F) -> Transformer
where
    F: Fn(Returning) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdviceResult> + Send + 'static,
{
    wrap(AsyncAdvice::new().after_returning(advice))
}

/// Awaits `advice` after every call that failed.
pub fn async_after_throwing<F, Fut>(advice: F) -> Transformer
where
    F: Fn(Throwing) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdviceResult> + Send + 'static,
{
    wrap(AsyncAdvice::new().after_throwing(advice))
}

/// Awaits `advice` after every call.
pub fn async_after_finally<F, Fut>(advice: F) -> Transformer
where
    F: Fn(Finally) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AdviceResult> + Send + 'static,
{
    wrap(AsyncAdvice::new().after_finally(advice))
}

/// Replaces every call with the future returned by `advice`.
pub fn async_around<F, Fut>(advice: F) -> Transformer
where
    F: Fn(JoinPoint) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = InvokeResult> + Send + 'static,
{
    wrap(AsyncAdvice::new().around(advice))
}
