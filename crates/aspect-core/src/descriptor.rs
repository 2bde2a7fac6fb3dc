//! Member descriptors: how to call, read or write a class member.
//!
//! A [`MemberDescriptor`] is both the input and the output of a member
//! transformer. Its [`Slot`] holds the behavior(s); the remaining flags are
//! carried through advice untouched.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde_json::Value;

use crate::error::{InvokeResult, MemberError};
use crate::receiver::Invocation;

/// A synchronous member body.
pub type SyncBody = Arc<dyn Fn(Invocation) -> InvokeResult + Send + Sync>;

/// An asynchronous member body.
pub type AsyncBody = Arc<dyn Fn(Invocation) -> BoxFuture<'static, InvokeResult> + Send + Sync>;

// =============================================================================
// Behavior
// =============================================================================

/// The callable part of a member: a method body, a getter or a setter.
#[derive(Clone)]
pub enum Behavior {
    /// Runs to completion on the caller's stack.
    Sync(SyncBody),
    /// Produces a future that must be awaited.
    Async(AsyncBody),
}

impl Behavior {
    /// Creates a synchronous behavior from a closure.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(Invocation) -> InvokeResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Creates an asynchronous behavior from a closure returning a future.
    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult> + Send + 'static,
    {
        Self::Async(Arc::new(move |inv| f(inv).boxed()))
    }

    /// Creates a synchronous behavior that expects an instance of `T` as receiver.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use aspect_core::{Behavior, Invocation, Receiver};
    /// use serde_json::json;
    ///
    /// struct Adder { base: i64 }
    ///
    /// let add = Behavior::on::<Adder, _>(|this, args| {
    ///     Ok(json!(this.base + args[0].as_i64().unwrap_or_default()))
    /// });
    /// let thiz = Receiver::object(Arc::new(Adder { base: 40 }));
    /// let out = add.call("add", Invocation::new(thiz, vec![json!(2)])).unwrap();
    /// assert_eq!(out, json!(42));
    /// ```
    pub fn on<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T, Vec<Value>) -> InvokeResult + Send + Sync + 'static,
    {
        Self::sync(move |inv| {
            let this = inv.thiz.instance::<T>().map_err(MemberError::into_shared)?;
            f(&this, inv.args)
        })
    }

    /// Creates an asynchronous behavior that expects an instance of `T` as receiver.
    pub fn on_async<T, F, Fut>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Arc<T>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = InvokeResult> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::Async(Arc::new(move |inv| {
            match inv.thiz.instance::<T>() {
                Ok(this) => f(this, inv.args).boxed(),
                Err(e) => future::ready(Err(e.into_shared())).boxed(),
            }
        }))
    }

    /// Returns `true` for an asynchronous behavior.
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// Invokes the behavior synchronously.
    ///
    /// Fails with [`MemberError::RequiresAsync`] for an asynchronous behavior;
    /// `name` is only used for that error.
    pub fn call(&self, name: &str, inv: Invocation) -> InvokeResult {
        match self {
            Self::Sync(body) => body(inv),
            Self::Async(_) => Err(MemberError::RequiresAsync(name.to_string()).into_shared()),
        }
    }

    /// Invokes the behavior, lifting a synchronous body into a ready future.
    pub fn call_async(&self, inv: Invocation) -> BoxFuture<'static, InvokeResult> {
        match self {
            Self::Sync(body) => future::ready(body(inv)).boxed(),
            Self::Async(body) => body(inv),
        }
    }
}

impl fmt::Debug for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Behavior::Sync"),
            Self::Async(_) => f.write_str("Behavior::Async"),
        }
    }
}

// =============================================================================
// Slot / MemberDescriptor
// =============================================================================

/// What a member holds.
#[derive(Debug, Clone)]
pub enum Slot {
    /// An ordinary callable.
    Method(Behavior),
    /// A getter, a setter, or both.
    Accessor {
        /// Read behavior.
        get: Option<Behavior>,
        /// Write behavior.
        set: Option<Behavior>,
    },
    /// A plain value; never advised.
    Data(Value),
}

/// Describes how to read, write or invoke a class member.
#[derive(Debug, Clone)]
pub struct MemberDescriptor {
    /// The member's behavior(s) or value.
    pub slot: Slot,
    /// Whether the member shows up during enumeration.
    pub enumerable: bool,
    /// Whether the member may be redefined.
    pub configurable: bool,
    /// Whether a data member may be assigned to.
    pub writable: bool,
}

impl MemberDescriptor {
    fn with_slot(slot: Slot) -> Self {
        Self {
            slot,
            enumerable: false,
            configurable: true,
            writable: true,
        }
    }

    /// A method descriptor.
    pub fn method(behavior: Behavior) -> Self {
        Self::with_slot(Slot::Method(behavior))
    }

    /// A getter-only accessor descriptor.
    pub fn getter(get: Behavior) -> Self {
        Self::accessor(Some(get), None)
    }

    /// A setter-only accessor descriptor.
    pub fn setter(set: Behavior) -> Self {
        Self::accessor(None, Some(set))
    }

    /// An accessor descriptor.
    pub fn accessor(get: Option<Behavior>, set: Option<Behavior>) -> Self {
        Self::with_slot(Slot::Accessor { get, set })
    }

    /// A data descriptor.
    pub fn data(value: Value) -> Self {
        Self::with_slot(Slot::Data(value))
    }

    /// Sets the `enumerable` flag.
    pub fn enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = enumerable;
        self
    }

    /// Sets the `configurable` flag.
    pub fn configurable(mut self, configurable: bool) -> Self {
        self.configurable = configurable;
        self
    }

    /// Sets the `writable` flag.
    pub fn writable(mut self, writable: bool) -> Self {
        self.writable = writable;
        self
    }

    /// Returns the method body, if this is a method.
    pub fn value(&self) -> Option<&Behavior> {
        match &self.slot {
            Slot::Method(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the getter, if any.
    pub fn get(&self) -> Option<&Behavior> {
        match &self.slot {
            Slot::Accessor { get, .. } => get.as_ref(),
            _ => None,
        }
    }

    /// Returns the setter, if any.
    pub fn set(&self) -> Option<&Behavior> {
        match &self.slot {
            Slot::Accessor { set, .. } => set.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` if this descriptor holds a method.
    pub fn is_method(&self) -> bool {
        matches!(self.slot, Slot::Method(_))
    }

    /// Returns `true` if this descriptor holds at least one accessor behavior.
    pub fn is_accessor(&self) -> bool {
        matches!(&self.slot, Slot::Accessor { get, set } if get.is_some() || set.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::Receiver;
    use serde_json::json;

    #[test]
    fn test_classification() {
        let m = MemberDescriptor::method(Behavior::sync(|_| Ok(Value::Null)));
        assert!(m.is_method() && !m.is_accessor());

        let a = MemberDescriptor::getter(Behavior::sync(|_| Ok(Value::Null)));
        assert!(a.is_accessor() && a.get().is_some() && a.set().is_none());

        let empty = MemberDescriptor::accessor(None, None);
        assert!(!empty.is_accessor());

        let d = MemberDescriptor::data(json!(1)).writable(false).enumerable(true);
        assert!(!d.is_method() && !d.is_accessor());
        assert!(!d.writable && d.enumerable && d.configurable);
    }

    #[test]
    fn test_sync_call_on_async_behavior_fails() {
        let b = Behavior::asynchronous(|_| async { Ok(json!(1)) });
        let err = b.call("later", Invocation::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "member 'later' is asynchronous and cannot be invoked synchronously"
        );
    }

    #[tokio::test]
    async fn test_call_async_lifts_sync_behavior() {
        let b = Behavior::sync(|inv| Ok(inv.arg(0)));
        let out = b
            .call_async(Invocation::new(Receiver::Unbound, vec![json!("x")]))
            .await
            .unwrap();
        assert_eq!(out, json!("x"));
    }

    #[tokio::test]
    async fn test_on_async_rejects_wrong_receiver() {
        let b = Behavior::on_async::<String, _, _>(|this, _| async move { Ok(json!(this.as_str())) });
        let err = b.call_async(Invocation::default()).await.unwrap_err();
        assert!(err.to_string().contains("receiver is not an instance"));
    }
}
