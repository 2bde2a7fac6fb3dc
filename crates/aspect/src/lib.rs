//! # Aspect
//!
//! Before, after and around advice for class members.
//!
//! ## Overview
//!
//! A transformer takes a class, a member name and the member's descriptor,
//! and returns a descriptor whose method, getter or setter runs advice
//! around the original behavior:
//!
//! ```text
//! before ──▶ original ──ok──▶ after_returning ──┐
//!               │                               ├──▶ after_finally
//!               └────err───▶ after_throwing ────┘
//! ```
//!
//! `around` advice replaces the whole sequence and decides itself whether
//! and how to proceed. Every kind has an `async_` counterpart whose wrapper
//! awaits each step.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use aspect::prelude::*;
//!
//! let log_error = after_throwing(|t| {
//!     tracing::error!("{} threw {}", t.join_point.name(), t.error);
//!     Ok(())
//! });
//!
//! let class = ClassBuilder::new("Calculator")
//!     .static_method("add", Behavior::sync(|inv| add(inv.arg(0), inv.arg(1))))
//!     .decorate_static("add", &log_error)
//!     .build();
//!
//! let sum = class.call_static("add", vec![json!(1), json!(2)])?;
//! ```
//!
//! ## Features
//!
//! - `toml-config`: Load `aspect.toml` (default)
//! - `yaml-config`: Load `aspect.yaml`
//! - `json-log`: JSON log output

pub use aspect_core as core;
pub use aspect_framework as framework;
pub use aspect_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use aspect::prelude::*;
/// ```
pub mod prelude {
    // Engine entry points
    pub use aspect_framework::{AsyncAdvice, SyncAdvice, Transformer, wrap};

    // Single-advice constructors
    pub use aspect_framework::{
        after_finally, after_returning, after_throwing, around, async_after_finally,
        async_after_returning, async_after_throwing, async_around, async_before, before,
    };

    // Advice payloads
    pub use aspect_framework::{Finally, Returning, Throwing};

    // Classes and services
    pub use aspect_framework::{AdviceLayer, Class, ClassBuilder, ServiceBuilderExt};

    // Data model
    pub use aspect_core::{
        BeforeFailure, Behavior, ClassRef, EngineOptions, Invocation, JoinPoint, MemberDescriptor,
        Override, Receiver, SharedError, StaticPart, Value, raise,
    };

    // Runtime
    pub use aspect_runtime::{AspectConfig, ConfigLoader, bootstrap};
}
