//! Static and per-call join points.
//!
//! - [`StaticPart`] is built once when a member is advised and shared by every
//!   call to it. A `modify` hook may alter it before any call happens.
//!
//! - [`JoinPoint`] is built fresh for each invocation. It carries the receiver,
//!   the arguments, the accessor direction and the `proceed` handle used to run
//!   the original behavior.

use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use tracing::trace;

use crate::descriptor::{Behavior, MemberDescriptor};
use crate::error::InvokeResult;
use crate::receiver::{ClassRef, Invocation, Receiver};

/// Whether a member is a method or an accessor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    /// An ordinary callable.
    Method,
    /// A getter and/or setter.
    Accessor,
}

/// Which behavior of a member a call went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// A method call.
    Call,
    /// A getter read.
    Get,
    /// A setter write.
    Set,
}

/// The original descriptor alongside the one being produced.
#[derive(Debug, Clone)]
pub struct Descriptors {
    /// The descriptor as it was before advice was applied.
    pub original: MemberDescriptor,
    /// The descriptor being produced. A `modify` hook may change its flags;
    /// its behaviors are replaced by the engine afterwards.
    pub advised: MemberDescriptor,
}

// =============================================================================
// StaticPart
// =============================================================================

/// The wrap-time description of an advised member.
#[derive(Debug, Clone)]
pub struct StaticPart {
    /// The owning class.
    pub clazz: ClassRef,
    /// The member name. Per-call full names derive from it.
    pub name: String,
    /// Original and advised descriptors.
    pub descriptors: Descriptors,
    /// Method or accessor.
    pub kind: MemberKind,
    /// Free-form flags a `modify` hook may attach.
    pub attributes: Map<String, Value>,
}

impl StaticPart {
    /// Describes `original` as a member named `name` of `clazz`.
    ///
    /// Returns `None` if the descriptor is neither a method nor an accessor.
    pub fn new(
        clazz: ClassRef,
        name: impl Into<String>,
        original: &MemberDescriptor,
    ) -> Option<Self> {
        let kind = if original.is_method() {
            MemberKind::Method
        } else if original.is_accessor() {
            MemberKind::Accessor
        } else {
            return None;
        };

        Some(Self {
            clazz,
            name: name.into(),
            descriptors: Descriptors {
                original: original.clone(),
                advised: original.clone(),
            },
            kind,
            attributes: Map::new(),
        })
    }

    /// Returns `true` for a method.
    pub fn is_method(&self) -> bool {
        self.kind == MemberKind::Method
    }

    /// Returns `true` for an accessor.
    pub fn is_accessor(&self) -> bool {
        self.kind == MemberKind::Accessor
    }
}

// =============================================================================
// Override
// =============================================================================

/// Substitutions for a `proceed` call. Fields left `None` default to the
/// original receiver and arguments independently.
#[derive(Debug, Clone, Default)]
pub struct Override {
    /// Replacement receiver.
    pub thiz: Option<Receiver>,
    /// Replacement arguments.
    pub args: Option<Vec<Value>>,
}

impl Override {
    /// Overrides the receiver only.
    pub fn thiz(thiz: Receiver) -> Self {
        Self {
            thiz: Some(thiz),
            args: None,
        }
    }

    /// Overrides the arguments only.
    pub fn args(args: Vec<Value>) -> Self {
        Self {
            thiz: None,
            args: Some(args),
        }
    }

    /// Also overrides the arguments.
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }
}

// =============================================================================
// JoinPoint
// =============================================================================

/// The runtime context of one invocation of an advised member.
#[derive(Clone)]
pub struct JoinPoint {
    static_part: Arc<StaticPart>,
    thiz: Receiver,
    args: Vec<Value>,
    direction: Direction,
    full_name: String,
    original: Behavior,
}

impl JoinPoint {
    /// Builds the join point for one call of `original` through `direction`.
    pub fn new(
        static_part: Arc<StaticPart>,
        direction: Direction,
        original: Behavior,
        invocation: Invocation,
    ) -> Self {
        let full_name = match direction {
            Direction::Call => static_part.name.clone(),
            Direction::Get => format!("get {}", static_part.name),
            Direction::Set => format!("set {}", static_part.name),
        };

        Self {
            static_part,
            thiz: invocation.thiz,
            args: invocation.args,
            direction,
            full_name,
            original,
        }
    }

    /// Returns the wrap-time description shared by all calls.
    pub fn static_part(&self) -> &StaticPart {
        &self.static_part
    }

    /// Returns the owning class.
    pub fn clazz(&self) -> &ClassRef {
        &self.static_part.clazz
    }

    /// Returns the member name.
    pub fn name(&self) -> &str {
        &self.static_part.name
    }

    /// Returns the name reported for this call: `name`, `get name` or `set name`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Returns the original and advised descriptors.
    pub fn descriptors(&self) -> &Descriptors {
        &self.static_part.descriptors
    }

    /// Returns an attribute attached by a `modify` hook.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.static_part.attributes.get(key)
    }

    /// Returns the receiver of this call.
    pub fn thiz(&self) -> &Receiver {
        &self.thiz
    }

    /// Returns the arguments of this call.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Returns the direction of this call.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` if the member is a method.
    pub fn is_method(&self) -> bool {
        self.static_part.is_method()
    }

    /// Returns `true` if the member is an accessor.
    pub fn is_accessor(&self) -> bool {
        self.static_part.is_accessor()
    }

    /// Returns `true` if this call went through the getter.
    pub fn is_get(&self) -> bool {
        self.direction == Direction::Get
    }

    /// Returns `true` if this call went through the setter.
    pub fn is_set(&self) -> bool {
        self.direction == Direction::Set
    }

    /// Returns `true` if the call has no receiver or the receiver is the owning class.
    pub fn is_static(&self) -> bool {
        self.thiz.is_static_for(&self.static_part.clazz)
    }

    /// Returns `true` if the original behavior is asynchronous.
    pub fn is_async(&self) -> bool {
        self.original.is_async()
    }

    fn invocation(&self, over: Override) -> Invocation {
        Invocation {
            thiz: over.thiz.unwrap_or_else(|| self.thiz.clone()),
            args: over.args.unwrap_or_else(|| self.args.clone()),
        }
    }

    /// Runs the original behavior with the original receiver and arguments.
    ///
    /// Fails with [`MemberError::RequiresAsync`](crate::MemberError::RequiresAsync)
    /// if the original is asynchronous.
    pub fn proceed(&self) -> InvokeResult {
        self.proceed_with(Override::default())
    }

    /// Runs the original behavior, substituting whatever `over` provides.
    pub fn proceed_with(&self, over: Override) -> InvokeResult {
        trace!(member = %self.full_name, "proceeding");
        self.original.call(&self.full_name, self.invocation(over))
    }

    /// Runs the original behavior asynchronously with the original receiver and arguments.
    pub fn proceed_async(&self) -> BoxFuture<'static, InvokeResult> {
        self.proceed_async_with(Override::default())
    }

    /// Runs the original behavior asynchronously, substituting whatever `over` provides.
    pub fn proceed_async_with(&self, over: Override) -> BoxFuture<'static, InvokeResult> {
        trace!(member = %self.full_name, "proceeding");
        self.original.call_async(self.invocation(over))
    }
}

impl std::fmt::Debug for JoinPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinPoint")
            .field("clazz", &self.static_part.clazz)
            .field("full_name", &self.full_name)
            .field("thiz", &self.thiz)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo() -> Behavior {
        Behavior::sync(|inv| {
            let who = match &inv.thiz {
                Receiver::Class(c) => c.name().to_string(),
                Receiver::Object(_) => "object".to_string(),
                Receiver::Unbound => "nobody".to_string(),
            };
            Ok(json!({ "who": who, "args": inv.args }))
        })
    }

    fn static_part(desc: MemberDescriptor) -> Arc<StaticPart> {
        Arc::new(StaticPart::new(ClassRef::new("Point"), "value", &desc).unwrap())
    }

    #[test]
    fn test_static_part_rejects_data() {
        let part = StaticPart::new(ClassRef::new("Point"), "x", &MemberDescriptor::data(json!(0)));
        assert!(part.is_none());
    }

    #[test]
    fn test_full_name_per_direction() {
        let part = static_part(MemberDescriptor::accessor(Some(echo()), Some(echo())));
        assert!(part.is_accessor());

        let get = JoinPoint::new(part.clone(), Direction::Get, echo(), Invocation::default());
        assert_eq!(get.full_name(), "get value");
        assert!(get.is_get() && !get.is_set());

        let set = JoinPoint::new(part, Direction::Set, echo(), Invocation::default());
        assert_eq!(set.full_name(), "set value");
    }

    #[test]
    fn test_proceed_overrides_independently() {
        let clazz = ClassRef::new("Point");
        let part = Arc::new(
            StaticPart::new(clazz.clone(), "value", &MemberDescriptor::method(echo())).unwrap(),
        );
        let jp = JoinPoint::new(
            part,
            Direction::Call,
            echo(),
            Invocation::new(Receiver::Class(clazz), vec![json!(1)]),
        );
        assert!(jp.is_static());

        assert_eq!(jp.proceed().unwrap(), json!({ "who": "Point", "args": [1] }));
        assert_eq!(
            jp.proceed_with(Override::args(vec![json!(2)])).unwrap(),
            json!({ "who": "Point", "args": [2] })
        );
        assert_eq!(
            jp.proceed_with(Override::thiz(Receiver::Unbound)).unwrap(),
            json!({ "who": "nobody", "args": [1] })
        );
    }

    #[tokio::test]
    async fn test_proceed_async_on_async_original() {
        let original = Behavior::asynchronous(|inv| async move { Ok(inv.arg(0)) });
        let part = static_part(MemberDescriptor::method(original.clone()));
        let jp = JoinPoint::new(
            part,
            Direction::Call,
            original,
            Invocation::new(Receiver::Unbound, vec![json!("late")]),
        );

        assert!(jp.proceed().is_err());
        assert_eq!(jp.proceed_async().await.unwrap(), json!("late"));
    }
}
