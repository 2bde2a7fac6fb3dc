//! # Aspect Framework
//!
//! The interception engine and everything built directly on it.
//!
//! This layer provides:
//! - Advice configuration through [`SyncAdvice`] and [`AsyncAdvice`]
//! - The engine: [`wrap`] produces a [`Transformer`] that turns a member
//!   descriptor into an advised one
//! - Single-advice constructors ([`before`], [`after_returning`],
//!   [`after_throwing`], [`after_finally`], [`around`] and their `async_`
//!   counterparts)
//! - A class registry ([`ClassBuilder`], [`Class`]) that applies transformers
//!   to named members and dispatches calls
//! - A tower adapter ([`AdviceLayer`]) for advising services

pub mod advice;
pub mod class;
pub mod constructors;
pub mod engine;
pub mod layer;

pub use advice::{
    AdviceConfig, AsyncAdvice, AsyncHooks, Finally, Hooks, ModifyFn, Returning, SyncAdvice,
    SyncHooks, Throwing,
};
pub use class::{Class, ClassBuilder};
pub use constructors::{
    after_finally, after_returning, after_throwing, around, async_after_finally,
    async_after_returning, async_after_throwing, async_around, async_before, before,
};
pub use engine::{Transformer, wrap};
pub use layer::{AdviceLayer, AdviceService, ServiceBuilderExt, from_service};
