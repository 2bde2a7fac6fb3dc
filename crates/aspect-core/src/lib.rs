//! # Aspect Core
//!
//! The data model of the Aspect advice library.
//!
//! Everything the interception engine consumes or produces lives here:
//!
//! - **Receivers**: the owning class handle ([`ClassRef`]), the receiver of a
//!   call ([`Receiver`]) and the call itself ([`Invocation`])
//! - **Descriptors**: member behaviors ([`Behavior`]) and the descriptor that
//!   holds them ([`MemberDescriptor`])
//! - **Join points**: the wrap-time [`StaticPart`] and the per-call
//!   [`JoinPoint`] carrying `proceed`
//! - **Errors**: [`SharedError`] for invocation failures and [`MemberError`]
//!   for dispatch faults
//!
//! ```text
//! (ClassRef, name, MemberDescriptor) ──transformer──▶ MemberDescriptor
//!                                                          │ call
//!                                                          ▼
//!                                      JoinPoint ──proceed──▶ original Behavior
//! ```

pub mod descriptor;
pub mod error;
pub mod join_point;
pub mod options;
pub mod receiver;

pub use descriptor::{AsyncBody, Behavior, MemberDescriptor, Slot, SyncBody};
pub use error::{AdviceResult, InvokeResult, MemberError, SharedError, raise};
pub use join_point::{Descriptors, Direction, JoinPoint, MemberKind, Override, StaticPart};
pub use options::{BeforeFailure, EngineOptions};
pub use receiver::{ClassRef, Invocation, Receiver};

pub use futures::future::BoxFuture;
pub use serde_json::Value;
