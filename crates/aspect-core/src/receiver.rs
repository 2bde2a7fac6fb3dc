//! Owning-class handles, call receivers and invocations.
//!
//! Members are invoked with an explicit [`Receiver`] plus an ordered argument
//! list rather than through implicit dynamic dispatch.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::MemberError;

// =============================================================================
// ClassRef
// =============================================================================

struct ClassInfo {
    name: String,
    type_id: Option<TypeId>,
}

/// A cheap, clonable handle identifying the class that owns a member.
///
/// Two handles are equal only if they were cloned from the same original
/// handle; two classes that merely share a name are distinct.
#[derive(Clone)]
pub struct ClassRef(Arc<ClassInfo>);

impl ClassRef {
    /// Creates a handle for a class known only by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(ClassInfo {
            name: name.into(),
            type_id: None,
        }))
    }

    /// Creates a handle for the class backed by the Rust type `T`.
    pub fn of<T: Any>() -> Self {
        let full = type_name::<T>();
        let short = full.rsplit("::").next().unwrap_or(full);
        Self(Arc::new(ClassInfo {
            name: short.to_string(),
            type_id: Some(TypeId::of::<T>()),
        }))
    }

    /// Returns the class name.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns `true` if this class is backed by the Rust type `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.type_id == Some(TypeId::of::<T>())
    }
}

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ClassRef {}

impl fmt::Debug for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassRef").field(&self.0.name).finish()
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.name)
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// The receiver a member was invoked on (`this`).
#[derive(Clone, Default)]
pub enum Receiver {
    /// No receiver at all.
    #[default]
    Unbound,
    /// A static call dispatched on a class.
    Class(ClassRef),
    /// An instance.
    Object(Arc<dyn Any + Send + Sync>),
}

impl Receiver {
    /// Wraps a shared instance as a receiver.
    pub fn object<T: Any + Send + Sync>(instance: Arc<T>) -> Self {
        Self::Object(instance)
    }

    /// Returns the instance as `Arc<T>` if this receiver is an object of type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Object(obj) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Like [`downcast`](Self::downcast) but fails with
    /// [`MemberError::ReceiverMismatch`].
    pub fn instance<T: Any + Send + Sync>(&self) -> Result<Arc<T>, MemberError> {
        self.downcast::<T>().ok_or(MemberError::ReceiverMismatch {
            expected: type_name::<T>(),
        })
    }

    /// Returns the class if this is a static receiver.
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Self::Class(clazz) => Some(clazz),
            _ => None,
        }
    }

    /// Returns `true` if this receiver denotes a static call on `clazz`,
    /// i.e. it is unbound or is the class itself.
    pub fn is_static_for(&self, clazz: &ClassRef) -> bool {
        match self {
            Self::Unbound => true,
            Self::Class(c) => c == clazz,
            Self::Object(_) => false,
        }
    }

    /// Returns `true` if both receivers refer to the same class or instance.
    pub fn same_as(&self, other: &Receiver) -> bool {
        match (self, other) {
            (Self::Unbound, Self::Unbound) => true,
            (Self::Class(a), Self::Class(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbound => f.write_str("Unbound"),
            Self::Class(clazz) => f.debug_tuple("Class").field(clazz).finish(),
            Self::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<ClassRef> for Receiver {
    fn from(clazz: ClassRef) -> Self {
        Self::Class(clazz)
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for Receiver {
    fn from(instance: Arc<T>) -> Self {
        Self::Object(instance)
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// A single call of a member behavior: the receiver and the ordered arguments.
#[derive(Debug, Clone, Default)]
pub struct Invocation {
    /// The receiver.
    pub thiz: Receiver,
    /// The arguments, in order.
    pub args: Vec<Value>,
}

impl Invocation {
    /// Creates an invocation.
    pub fn new(thiz: Receiver, args: Vec<Value>) -> Self {
        Self { thiz, args }
    }

    /// Returns the argument at `index`, or `Value::Null` if absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point;

    #[test]
    fn test_class_identity() {
        let a = ClassRef::new("Point");
        let b = ClassRef::new("Point");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(ClassRef::of::<Point>().name(), "Point");
        assert!(ClassRef::of::<Point>().is::<Point>());
    }

    #[test]
    fn test_static_receiver() {
        let clazz = ClassRef::new("Point");
        assert!(Receiver::Unbound.is_static_for(&clazz));
        assert!(Receiver::Class(clazz.clone()).is_static_for(&clazz));
        assert!(!Receiver::Class(ClassRef::new("Other")).is_static_for(&clazz));
        assert!(!Receiver::object(Arc::new(Point)).is_static_for(&clazz));
    }

    #[test]
    fn test_downcast() {
        let thiz = Receiver::object(Arc::new(42_u32));
        assert_eq!(thiz.downcast::<u32>().as_deref(), Some(&42));
        assert!(thiz.downcast::<i64>().is_none());
        assert!(matches!(
            thiz.instance::<String>(),
            Err(MemberError::ReceiverMismatch { .. })
        ));
    }
}
