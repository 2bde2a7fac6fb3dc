//! The interception engine.
//!
//! [`wrap`] turns an [`AdviceConfig`] into a [`Transformer`]. Applying the
//! transformer to `(class, name, descriptor)` yields a descriptor whose
//! behaviors run the configured advice around the original ones.
//!
//! # Invocation order
//!
//! ```text
//! around set?  ── yes ──▶ around(jp)                        (nothing else runs)
//!     │
//!     no
//!     ▼
//! before ─▶ proceed ─┬─ Ok  ─▶ after_returning ─┐
//!                    └─ Err ─▶ after_throwing  ─┴─▶ after_finally ─▶ result
//! ```
//!
//! A failing `before` joins the `Err` branch unless
//! [`BeforeFailure::Propagate`] is configured. `after_finally` runs even if
//! `after_returning` or `after_throwing` failed; the caller then receives the
//! advice failure. The synchronous and asynchronous wrappers follow the same
//! order, the latter awaiting every stage.

use std::sync::Arc;

use futures::FutureExt;
use tracing::{Instrument, debug, debug_span, trace, warn};

use aspect_core::{
    BeforeFailure, Behavior, ClassRef, Direction, EngineOptions, InvokeResult, JoinPoint,
    MemberDescriptor, SharedError, Slot, StaticPart,
};

use crate::advice::{AdviceConfig, AsyncHooks, Finally, Hooks, Returning, SyncHooks, Throwing};

// ============================================================================
// Transformer
// ============================================================================

/// Produces advised member descriptors from original ones.
///
/// Cloning is cheap; one transformer may be applied to any number of members.
#[derive(Clone)]
pub struct Transformer {
    config: Arc<AdviceConfig>,
}

/// Creates a transformer from an advice configuration.
///
/// A configuration without any callback yields a transformer that still wraps
/// members but adds no behavior.
pub fn wrap(config: impl Into<AdviceConfig>) -> Transformer {
    Transformer {
        config: Arc::new(config.into()),
    }
}

impl Transformer {
    /// Returns the configuration.
    pub fn config(&self) -> &AdviceConfig {
        &self.config
    }

    /// Attaches a wrap-time `modify` hook.
    pub fn with_modify<F>(self, modify: F) -> Self
    where
        F: Fn(&mut StaticPart) + Send + Sync + 'static,
    {
        let mut config = Arc::unwrap_or_clone(self.config);
        config.set_modify(modify);
        Self {
            config: Arc::new(config),
        }
    }

    /// Replaces the engine options.
    pub fn with_options(self, options: EngineOptions) -> Self {
        let mut config = Arc::unwrap_or_clone(self.config);
        config.set_options(options);
        Self {
            config: Arc::new(config),
        }
    }

    /// Advises `original`, a member named `name` of `clazz`.
    ///
    /// Descriptors that are neither a method nor an accessor are returned
    /// unchanged. Flags not related to behavior are carried over.
    ///
    /// Synchronous `around` advice cannot await an asynchronous original, so
    /// a member with any asynchronous behavior is also returned unchanged
    /// under such a configuration. Use [`AsyncAdvice::around`] there.
    ///
    /// [`AsyncAdvice::around`]: crate::advice::AsyncAdvice::around
    pub fn apply(&self, clazz: &ClassRef, name: &str, original: MemberDescriptor) -> MemberDescriptor {
        let Some(part) = self.prepare(clazz, name, &original) else {
            return original;
        };

        let mut advised = part.descriptors.advised.clone();
        advised.slot = match original.slot {
            Slot::Method(value) => Slot::Method(self.advise(&part, Direction::Call, value)),
            Slot::Accessor { get, set } => Slot::Accessor {
                get: get.map(|get| self.advise(&part, Direction::Get, get)),
                set: set.map(|set| self.advise(&part, Direction::Set, set)),
            },
            data @ Slot::Data(_) => data,
        };
        advised
    }

    /// Advises a lone method body. Flags a `modify` hook sets on the advised
    /// descriptor have nowhere to go and are dropped.
    pub fn apply_method(&self, clazz: &ClassRef, name: &str, original: Behavior) -> Behavior {
        match self.prepare(clazz, name, &MemberDescriptor::method(original.clone())) {
            Some(part) => self.advise(&part, Direction::Call, original),
            None => original,
        }
    }

    /// Builds the static part shared by every behavior of the member, running
    /// `modify` on it. `None` leaves the member unadvised.
    fn prepare(
        &self,
        clazz: &ClassRef,
        name: &str,
        original: &MemberDescriptor,
    ) -> Option<Arc<StaticPart>> {
        let Some(mut part) = StaticPart::new(clazz.clone(), name, original) else {
            debug!(class = %clazz, member = name, "not a method or accessor, leaving unadvised");
            return None;
        };

        if self.has_sync_around() && has_async_behavior(original) {
            warn!(
                class = %clazz,
                member = name,
                "synchronous around advice cannot proceed into an asynchronous member, leaving unadvised"
            );
            return None;
        }

        if let Some(modify) = &self.config.modify {
            modify(&mut part);
        }

        debug!(
            class = %clazz,
            member = %part.name,
            asynchronous = self.config.is_asynchronous(),
            around = self.config.has_around(),
            "advised member"
        );
        Some(Arc::new(part))
    }

    fn has_sync_around(&self) -> bool {
        matches!(&self.config.hooks, Hooks::Sync(hooks) if hooks.around.is_some())
    }

    /// Builds the replacement for one behavior of a member.
    fn advise(&self, part: &Arc<StaticPart>, direction: Direction, original: Behavior) -> Behavior {
        let part = part.clone();
        let options = self.config.options.clone();

        match &self.config.hooks {
            Hooks::Sync(hooks) if !original.is_async() => {
                let hooks = hooks.clone();
                Behavior::sync(move |inv| {
                    let jp = JoinPoint::new(part.clone(), direction, original.clone(), inv);
                    invoke_sync(&hooks, &options, jp)
                })
            }
            Hooks::Sync(hooks) => async_behavior(Arc::new(hooks.lift()), options, part, direction, original),
            Hooks::Async(hooks) => async_behavior(hooks.clone(), options, part, direction, original),
        }
    }
}

fn has_async_behavior(descriptor: &MemberDescriptor) -> bool {
    match &descriptor.slot {
        Slot::Method(value) => value.is_async(),
        Slot::Accessor { get, set } => get.iter().chain(set).any(Behavior::is_async),
        Slot::Data(_) => false,
    }
}

fn async_behavior(
    hooks: Arc<AsyncHooks>,
    options: EngineOptions,
    part: Arc<StaticPart>,
    direction: Direction,
    original: Behavior,
) -> Behavior {
    Behavior::Async(Arc::new(move |inv| {
        let jp = JoinPoint::new(part.clone(), direction, original.clone(), inv);
        invoke_async(hooks.clone(), options.clone(), jp).boxed()
    }))
}

// ============================================================================
// Synchronous wrapper
// ============================================================================

/// Runs one synchronous advised invocation.
pub(crate) fn invoke_sync(hooks: &SyncHooks, options: &EngineOptions, jp: JoinPoint) -> InvokeResult {
    if options.trace_invocations {
        let span = debug_span!("advice", class = %jp.clazz(), member = %jp.full_name());
        return span.in_scope(|| run_sync(hooks, options, jp));
    }
    run_sync(hooks, options, jp)
}

fn run_sync(hooks: &SyncHooks, options: &EngineOptions, jp: JoinPoint) -> InvokeResult {
    if let Some(around) = &hooks.around {
        trace!(member = %jp.full_name(), "around");
        return around(&jp);
    }

    let outcome = match hooks.before.as_ref().map(|before| before(&jp)) {
        Some(Err(error)) if options.before_failure == BeforeFailure::Propagate => {
            debug!(member = %jp.full_name(), %error, "before advice failed");
            return Err(error);
        }
        Some(Err(error)) => Err(error),
        _ => jp.proceed(),
    };

    let mut advice_failure: Option<SharedError> = None;
    match &outcome {
        Ok(return_value) => {
            if let Some(after) = &hooks.after_returning {
                let returning = Returning {
                    return_value: return_value.clone(),
                    join_point: jp.clone(),
                };
                advice_failure = after(&returning).err();
            }
        }
        Err(error) => {
            debug!(member = %jp.full_name(), %error, "invocation failed");
            if let Some(after) = &hooks.after_throwing {
                let throwing = Throwing {
                    error: error.clone(),
                    join_point: jp.clone(),
                };
                advice_failure = after(&throwing).err();
            }
        }
    }

    if let Some(after) = &hooks.after_finally {
        let finally = Finally {
            return_value: outcome.as_ref().ok().cloned(),
            error: outcome.as_ref().err().cloned(),
            join_point: jp,
        };
        after(&finally)?;
    }

    match advice_failure {
        Some(error) => Err(error),
        None => outcome,
    }
}

// ============================================================================
// Asynchronous wrapper
// ============================================================================

/// Runs one asynchronous advised invocation.
pub(crate) async fn invoke_async(
    hooks: Arc<AsyncHooks>,
    options: EngineOptions,
    jp: JoinPoint,
) -> InvokeResult {
    if options.trace_invocations {
        let span = debug_span!("advice", class = %jp.clazz(), member = %jp.full_name());
        return run_async(&hooks, &options, jp).instrument(span).await;
    }
    run_async(&hooks, &options, jp).await
}

async fn run_async(hooks: &AsyncHooks, options: &EngineOptions, jp: JoinPoint) -> InvokeResult {
    if let Some(around) = &hooks.around {
        trace!(member = %jp.full_name(), "around");
        return around(jp).await;
    }

    let before = match &hooks.before {
        Some(before) => before(jp.clone()).await,
        None => Ok(()),
    };
    let outcome = match before {
        Err(error) if options.before_failure == BeforeFailure::Propagate => {
            debug!(member = %jp.full_name(), %error, "before advice failed");
            return Err(error);
        }
        Err(error) => Err(error),
        Ok(()) => jp.proceed_async().await,
    };

    let mut advice_failure: Option<SharedError> = None;
    match &outcome {
        Ok(return_value) => {
            if let Some(after) = &hooks.after_returning {
                let returning = Returning {
                    return_value: return_value.clone(),
                    join_point: jp.clone(),
                };
                advice_failure = after(returning).await.err();
            }
        }
        Err(error) => {
            debug!(member = %jp.full_name(), %error, "invocation failed");
            if let Some(after) = &hooks.after_throwing {
                let throwing = Throwing {
                    error: error.clone(),
                    join_point: jp.clone(),
                };
                advice_failure = after(throwing).await.err();
            }
        }
    }

    if let Some(after) = &hooks.after_finally {
        let finally = Finally {
            return_value: outcome.as_ref().ok().cloned(),
            error: outcome.as_ref().err().cloned(),
            join_point: jp,
        };
        after(finally).await?;
    }

    match advice_failure {
        Some(error) => Err(error),
        None => outcome,
    }
}
