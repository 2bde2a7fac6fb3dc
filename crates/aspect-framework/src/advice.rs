//! Advice configuration.
//!
//! An [`AdviceConfig`] bundles the callbacks to run around a member together
//! with an optional wrap-time `modify` hook and the [`EngineOptions`]. It is
//! assembled through one of two builders:
//!
//! - [`SyncAdvice`] – callbacks run to completion on the caller's stack
//! - [`AsyncAdvice`] – callbacks return futures that the engine awaits
//!
//! Any subset of `before`, `after_returning`, `after_throwing` and
//! `after_finally` may be combined. Setting `around` disables all of them for
//! the members the configuration is applied to.
//!
//! ```rust,ignore
//! let config = SyncAdvice::new()
//!     .before(|jp| {
//!         println!("entering {}", jp.full_name());
//!         Ok(())
//!     })
//!     .after_throwing(|t| {
//!         println!("{} threw {}", t.join_point.full_name(), t.error);
//!         Ok(())
//!     })
//!     .build();
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;

use aspect_core::{
    AdviceResult, EngineOptions, InvokeResult, JoinPoint, SharedError, StaticPart,
};

// ============================================================================
// Advice records
// ============================================================================

/// Handed to after-returning advice.
#[derive(Debug, Clone)]
pub struct Returning {
    /// The value the original behavior returned.
    pub return_value: Value,
    /// The join point of the call.
    pub join_point: JoinPoint,
}

/// Handed to after-throwing advice.
#[derive(Debug, Clone)]
pub struct Throwing {
    /// The error, identical to the one rethrown to the caller.
    pub error: SharedError,
    /// The join point of the call.
    pub join_point: JoinPoint,
}

/// Handed to after-finally advice. Exactly one of `return_value` and `error`
/// is set.
#[derive(Debug, Clone)]
pub struct Finally {
    /// Set when the call succeeded.
    pub return_value: Option<Value>,
    /// Set when the call failed.
    pub error: Option<SharedError>,
    /// The join point of the call.
    pub join_point: JoinPoint,
}

// ============================================================================
// Callback types
// ============================================================================

/// Wrap-time hook that may alter the static join-point description.
pub type ModifyFn = Arc<dyn Fn(&mut StaticPart) + Send + Sync>;

/// Synchronous `before` advice.
pub type BeforeFn = Arc<dyn Fn(&JoinPoint) -> AdviceResult + Send + Sync>;
/// Synchronous `after_returning` advice.
pub type AfterReturningFn = Arc<dyn Fn(&Returning) -> AdviceResult + Send + Sync>;
/// Synchronous `after_throwing` advice.
pub type AfterThrowingFn = Arc<dyn Fn(&Throwing) -> AdviceResult + Send + Sync>;
/// Synchronous `after_finally` advice.
pub type AfterFinallyFn = Arc<dyn Fn(&Finally) -> AdviceResult + Send + Sync>;
/// Synchronous `around` advice.
pub type AroundFn = Arc<dyn Fn(&JoinPoint) -> InvokeResult + Send + Sync>;

/// Asynchronous `before` advice.
pub type AsyncBeforeFn = Arc<dyn Fn(JoinPoint) -> BoxFuture<'static, AdviceResult> + Send + Sync>;
/// Asynchronous `after_returning` advice.
pub type AsyncAfterReturningFn =
    Arc<dyn Fn(Returning) -> BoxFuture<'static, AdviceResult> + Send + Sync>;
/// Asynchronous `after_throwing` advice.
pub type AsyncAfterThrowingFn =
    Arc<dyn Fn(Throwing) -> BoxFuture<'static, AdviceResult> + Send + Sync>;
/// Asynchronous `after_finally` advice.
pub type AsyncAfterFinallyFn =
    Arc<dyn Fn(Finally) -> BoxFuture<'static, AdviceResult> + Send + Sync>;
/// Asynchronous `around` advice.
pub type AsyncAroundFn = Arc<dyn Fn(JoinPoint) -> BoxFuture<'static, InvokeResult> + Send + Sync>;

// ============================================================================
// Hook sets
// ============================================================================

/// Synchronous callbacks.
#[derive(Clone, Default)]
pub struct SyncHooks {
    pub(crate) before: Option<BeforeFn>,
    pub(crate) after_returning: Option<AfterReturningFn>,
    pub(crate) after_throwing: Option<AfterThrowingFn>,
    pub(crate) after_finally: Option<AfterFinallyFn>,
    pub(crate) around: Option<AroundFn>,
}

/// Asynchronous callbacks.
#[derive(Clone, Default)]
pub struct AsyncHooks {
    pub(crate) before: Option<AsyncBeforeFn>,
    pub(crate) after_returning: Option<AsyncAfterReturningFn>,
    pub(crate) after_throwing: Option<AsyncAfterThrowingFn>,
    pub(crate) after_finally: Option<AsyncAfterFinallyFn>,
    pub(crate) around: Option<AsyncAroundFn>,
}

impl SyncHooks {
    /// Turns every callback into one that returns an already-completed future,
    /// so synchronous advice can be driven by the asynchronous wrapper.
    ///
    /// `around` is not carried over: it could only call the blocking
    /// `proceed`, and the engine never lifts such a configuration.
    pub(crate) fn lift(&self) -> AsyncHooks {
        AsyncHooks {
            before: self.before.clone().map(|f| {
                Arc::new(move |jp: JoinPoint| future::ready(f(&jp)).boxed()) as AsyncBeforeFn
            }),
            after_returning: self.after_returning.clone().map(|f| {
                Arc::new(move |r: Returning| future::ready(f(&r)).boxed()) as AsyncAfterReturningFn
            }),
            after_throwing: self.after_throwing.clone().map(|f| {
                Arc::new(move |t: Throwing| future::ready(f(&t)).boxed()) as AsyncAfterThrowingFn
            }),
            after_finally: self.after_finally.clone().map(|f| {
                Arc::new(move |fin: Finally| future::ready(f(&fin)).boxed()) as AsyncAfterFinallyFn
            }),
            around: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.before.is_none()
            && self.after_returning.is_none()
            && self.after_throwing.is_none()
            && self.after_finally.is_none()
            && self.around.is_none()
    }
}

impl AsyncHooks {
    fn is_empty(&self) -> bool {
        self.before.is_none()
            && self.after_returning.is_none()
            && self.after_throwing.is_none()
            && self.after_finally.is_none()
            && self.around.is_none()
    }
}

/// The callbacks of a configuration, tagged with their execution discipline.
#[derive(Clone)]
pub enum Hooks {
    /// Synchronous callbacks.
    Sync(Arc<SyncHooks>),
    /// Asynchronous callbacks.
    Async(Arc<AsyncHooks>),
}

// ============================================================================
// AdviceConfig
// ============================================================================

/// An immutable advice configuration.
#[derive(Clone)]
pub struct AdviceConfig {
    pub(crate) hooks: Hooks,
    pub(crate) modify: Option<ModifyFn>,
    pub(crate) options: EngineOptions,
}

impl AdviceConfig {
    /// Starts a synchronous configuration.
    pub fn sync() -> SyncAdvice {
        SyncAdvice::new()
    }

    /// Starts an asynchronous configuration.
    pub fn asynchronous() -> AsyncAdvice {
        AsyncAdvice::new()
    }

    /// Returns `true` if the callbacks are asynchronous.
    pub fn is_asynchronous(&self) -> bool {
        matches!(self.hooks, Hooks::Async(_))
    }

    /// Returns `true` if `around` advice is configured.
    pub fn has_around(&self) -> bool {
        match &self.hooks {
            Hooks::Sync(h) => h.around.is_some(),
            Hooks::Async(h) => h.around.is_some(),
        }
    }

    /// Returns `true` if no callback at all is configured.
    pub fn is_empty(&self) -> bool {
        match &self.hooks {
            Hooks::Sync(h) => h.is_empty(),
            Hooks::Async(h) => h.is_empty(),
        }
    }

    /// Returns the engine options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Replaces the wrap-time `modify` hook.
    pub fn set_modify<F>(&mut self, modify: F)
    where
        F: Fn(&mut StaticPart) + Send + Sync + 'static,
    {
        self.modify = Some(Arc::new(modify));
    }

    /// Replaces the engine options.
    pub fn set_options(&mut self, options: EngineOptions) {
        self.options = options;
    }
}

// ============================================================================
// SyncAdvice
// ============================================================================

/// Builder for a synchronous [`AdviceConfig`].
#[derive(Clone, Default)]
pub struct SyncAdvice {
    hooks: SyncHooks,
    modify: Option<ModifyFn>,
    options: EngineOptions,
}

impl SyncAdvice {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` before the original behavior.
    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&JoinPoint) -> AdviceResult + Send + Sync + 'static,
    {
        self.hooks.before = Some(Arc::new(f));
        self
    }

    /// Runs `f` after the original behavior returned normally.
    pub fn after_returning<F>(mut self, f: F) -> Self
    where
        F: Fn(&Returning) -> AdviceResult + Send + Sync + 'static,
    {
        self.hooks.after_returning = Some(Arc::new(f));
        self
    }

    /// Runs `f` after the call failed.
    pub fn after_throwing<F>(mut self, f: F) -> Self
    where
        F: Fn(&Throwing) -> AdviceResult + Send + Sync + 'static,
    {
        self.hooks.after_throwing = Some(Arc::new(f));
        self
    }

    /// Runs `f` after every call, whatever its outcome.
    pub fn after_finally<F>(mut self, f: F) -> Self
    where
        F: Fn(&Finally) -> AdviceResult + Send + Sync + 'static,
    {
        self.hooks.after_finally = Some(Arc::new(f));
        self
    }

    /// Hands full control of the call to `f`.
    pub fn around<F>(mut self, f: F) -> Self
    where
        F: Fn(&JoinPoint) -> InvokeResult + Send + Sync + 'static,
    {
        self.hooks.around = Some(Arc::new(f));
        self
    }

    /// Runs `f` once per advised member, at wrap time.
    pub fn modify<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut StaticPart) + Send + Sync + 'static,
    {
        self.modify = Some(Arc::new(f));
        self
    }

    /// Sets the engine options.
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> AdviceConfig {
        AdviceConfig {
            hooks: Hooks::Sync(Arc::new(self.hooks)),
            modify: self.modify,
            options: self.options,
        }
    }
}

impl From<SyncAdvice> for AdviceConfig {
    fn from(advice: SyncAdvice) -> Self {
        advice.build()
    }
}

// ============================================================================
// AsyncAdvice
// ============================================================================

/// Builder for an asynchronous [`AdviceConfig`].
#[derive(Clone, Default)]
pub struct AsyncAdvice {
    hooks: AsyncHooks,
    modify: Option<ModifyFn>,
    options: EngineOptions,
}

impl AsyncAdvice {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Awaits `f` before the original behavior.
    pub fn before<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(JoinPoint) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AdviceResult> + Send + 'static,
    {
        self.hooks.before = Some(Arc::new(move |jp: JoinPoint| f(jp).boxed()));
        self
    }

    /// Awaits `f` after the original behavior returned normally.
    pub fn after_returning<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Returning) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AdviceResult> + Send + 'static,
    {
        self.hooks.after_returning = Some(Arc::new(move |r: Returning| f(r).boxed()));
        self
    }

    /// Awaits `f` after the call failed.
    pub fn after_throwing<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Throwing) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AdviceResult> + Send + 'static,
    {
        self.hooks.after_throwing = Some(Arc::new(move |t: Throwing| f(t).boxed()));
        self
    }

    /// Awaits `f` after every call, whatever its outcome.
    pub fn after_finally<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Finally) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AdviceResult> + Send + 'static,
    {
        self.hooks.after_finally = Some(Arc::new(move |fin: Finally| f(fin).boxed()));
        self
    }

    /// Hands full control of the call to `f`.
    pub fn around<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(JoinPoint) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult> + Send + 'static,
    {
        self.hooks.around = Some(Arc::new(move |jp: JoinPoint| f(jp).boxed()));
        self
    }

    /// Runs `f` once per advised member, at wrap time.
    pub fn modify<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut StaticPart) + Send + Sync + 'static,
    {
        self.modify = Some(Arc::new(f));
        self
    }

    /// Sets the engine options.
    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> AdviceConfig {
        AdviceConfig {
            hooks: Hooks::Async(Arc::new(self.hooks)),
            modify: self.modify,
            options: self.options,
        }
    }
}

impl From<AsyncAdvice> for AdviceConfig {
    fn from(advice: AsyncAdvice) -> Self {
        advice.build()
    }
}
