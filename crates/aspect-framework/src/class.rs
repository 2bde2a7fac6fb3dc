//! A registry of class members that advice can be applied to.
//!
//! [`ClassBuilder`] collects instance and static members, applies
//! [`Transformer`]s to them and produces a [`Class`]. The class dispatches
//! calls, reads and writes by member name with an explicit receiver.
//!
//! ```rust,ignore
//! let counter = ClassBuilder::of::<Counter>()
//!     .method("increment", Behavior::on::<Counter, _>(|this, args| { .. }))
//!     .getter("value", Behavior::on::<Counter, _>(|this, _| { .. }))
//!     .decorate("increment", &before(|jp| { .. }))
//!     .build();
//!
//! counter.call(instance.clone(), "increment", vec![json!(2)])?;
//! ```

use std::any::Any;
use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use aspect_core::{
    Behavior, ClassRef, Invocation, InvokeResult, MemberDescriptor, MemberError, Receiver, Slot,
};

use crate::engine::Transformer;

type Members = BTreeMap<String, MemberDescriptor>;

/// Instance members or static members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Table {
    Instance,
    Static,
}

// ============================================================================
// ClassBuilder
// ============================================================================

/// Defines the members of a [`Class`].
#[derive(Debug)]
pub struct ClassBuilder {
    clazz: ClassRef,
    members: Members,
    statics: Members,
}

impl ClassBuilder {
    /// Starts a class known only by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_class(ClassRef::new(name))
    }

    /// Starts the class backed by the Rust type `T`.
    pub fn of<T: Any>() -> Self {
        Self::with_class(ClassRef::of::<T>())
    }

    /// Starts a class for an existing handle.
    pub fn with_class(clazz: ClassRef) -> Self {
        Self {
            clazz,
            members: Members::new(),
            statics: Members::new(),
        }
    }

    /// Returns the class handle.
    pub fn clazz(&self) -> &ClassRef {
        &self.clazz
    }

    /// Defines an instance member, replacing any previous one of that name.
    pub fn member(mut self, name: impl Into<String>, descriptor: MemberDescriptor) -> Self {
        self.members.insert(name.into(), descriptor);
        self
    }

    /// Defines an instance method.
    pub fn method(self, name: impl Into<String>, behavior: Behavior) -> Self {
        self.member(name, MemberDescriptor::method(behavior))
    }

    /// Defines an instance getter, keeping a setter of the same name.
    pub fn getter(mut self, name: impl Into<String>, get: Behavior) -> Self {
        merge_accessor(&mut self.members, name.into(), Some(get), None);
        self
    }

    /// Defines an instance setter, keeping a getter of the same name.
    pub fn setter(mut self, name: impl Into<String>, set: Behavior) -> Self {
        merge_accessor(&mut self.members, name.into(), None, Some(set));
        self
    }

    /// Defines an instance data member.
    pub fn data(self, name: impl Into<String>, value: Value) -> Self {
        self.member(name, MemberDescriptor::data(value).enumerable(true))
    }

    /// Defines a static member, replacing any previous one of that name.
    pub fn static_member(mut self, name: impl Into<String>, descriptor: MemberDescriptor) -> Self {
        self.statics.insert(name.into(), descriptor);
        self
    }

    /// Defines a static method.
    pub fn static_method(self, name: impl Into<String>, behavior: Behavior) -> Self {
        self.static_member(name, MemberDescriptor::method(behavior))
    }

    /// Defines a static getter, keeping a setter of the same name.
    pub fn static_getter(mut self, name: impl Into<String>, get: Behavior) -> Self {
        merge_accessor(&mut self.statics, name.into(), Some(get), None);
        self
    }

    /// Defines a static setter, keeping a getter of the same name.
    pub fn static_setter(mut self, name: impl Into<String>, set: Behavior) -> Self {
        merge_accessor(&mut self.statics, name.into(), None, Some(set));
        self
    }

    /// Defines a static data member.
    pub fn static_data(self, name: impl Into<String>, value: Value) -> Self {
        self.static_member(name, MemberDescriptor::data(value).enumerable(true))
    }

    /// Advises the instance member `name`.
    ///
    /// May be repeated; the last transformer applied runs outermost.
    pub fn decorate(mut self, name: &str, transformer: &Transformer) -> Self {
        decorate_in(&self.clazz, &mut self.members, name, transformer);
        self
    }

    /// Advises the static member `name`.
    pub fn decorate_static(mut self, name: &str, transformer: &Transformer) -> Self {
        decorate_in(&self.clazz, &mut self.statics, name, transformer);
        self
    }

    /// Finishes the class.
    pub fn build(self) -> Class {
        debug!(
            class = %self.clazz,
            members = self.members.len(),
            statics = self.statics.len(),
            "class built"
        );
        Class {
            clazz: self.clazz,
            members: RwLock::new(self.members),
            statics: RwLock::new(self.statics),
        }
    }
}

fn merge_accessor(members: &mut Members, name: String, get: Option<Behavior>, set: Option<Behavior>) {
    if let Some(MemberDescriptor {
        slot: Slot::Accessor { get: old_get, set: old_set },
        ..
    }) = members.get_mut(&name)
    {
        if get.is_some() {
            *old_get = get;
        }
        if set.is_some() {
            *old_set = set;
        }
        return;
    }
    members.insert(name, MemberDescriptor::accessor(get, set));
}

fn decorate_in(clazz: &ClassRef, members: &mut Members, name: &str, transformer: &Transformer) {
    match members.remove(name) {
        Some(original) => {
            let advised = transformer.apply(clazz, name, original);
            members.insert(name.to_string(), advised);
        }
        None => warn!(class = %clazz, member = name, "cannot decorate an undefined member"),
    }
}

// ============================================================================
// Class
// ============================================================================

/// What a lookup resolved to.
enum Target {
    Run(Behavior),
    Read(Value),
    Written,
}

/// A class whose members are dispatched by name.
///
/// Data members live in the class and are shared by every receiver; instance
/// state belongs to the receiver object itself.
#[derive(Debug)]
pub struct Class {
    clazz: ClassRef,
    members: RwLock<Members>,
    statics: RwLock<Members>,
}

impl Class {
    /// Returns the class handle.
    pub fn clazz(&self) -> &ClassRef {
        &self.clazz
    }

    /// Returns a copy of the instance member descriptor `name`.
    pub fn descriptor(&self, name: &str) -> Option<MemberDescriptor> {
        self.members.read().get(name).cloned()
    }

    /// Returns a copy of the static member descriptor `name`.
    pub fn static_descriptor(&self, name: &str) -> Option<MemberDescriptor> {
        self.statics.read().get(name).cloned()
    }

    /// Returns the names of the enumerable instance members.
    pub fn names(&self) -> Vec<String> {
        enumerable(&self.members.read())
    }

    /// Returns the names of the enumerable static members.
    pub fn static_names(&self) -> Vec<String> {
        enumerable(&self.statics.read())
    }

    /// Defines or replaces an instance member.
    ///
    /// Fails with [`MemberError::ReadOnly`] if an existing member of that name
    /// is not configurable.
    pub fn define_property(&self, name: &str, descriptor: MemberDescriptor) -> Result<(), MemberError> {
        define_in(&mut self.members.write(), name, descriptor)
    }

    /// Defines or replaces a static member.
    pub fn define_static_property(
        &self,
        name: &str,
        descriptor: MemberDescriptor,
    ) -> Result<(), MemberError> {
        define_in(&mut self.statics.write(), name, descriptor)
    }

    /// Advises an already defined instance member.
    pub fn apply(&self, name: &str, transformer: &Transformer) -> Result<(), MemberError> {
        self.apply_in(Table::Instance, name, transformer)
    }

    /// Advises an already defined static member.
    pub fn apply_static(&self, name: &str, transformer: &Transformer) -> Result<(), MemberError> {
        self.apply_in(Table::Static, name, transformer)
    }

    /// Calls the instance method `name` on `thiz`.
    pub fn call(&self, thiz: impl Into<Receiver>, name: &str, args: Vec<Value>) -> InvokeResult {
        self.dispatch(Table::Instance, thiz.into(), name, Access::Call(args))
    }

    /// Reads the instance member `name` of `thiz`.
    pub fn get(&self, thiz: impl Into<Receiver>, name: &str) -> InvokeResult {
        self.dispatch(Table::Instance, thiz.into(), name, Access::Get)
    }

    /// Writes `value` to the instance member `name` of `thiz`.
    pub fn set(&self, thiz: impl Into<Receiver>, name: &str, value: Value) -> InvokeResult {
        self.dispatch(Table::Instance, thiz.into(), name, Access::Set(value))
    }

    /// Calls the static method `name`.
    pub fn call_static(&self, name: &str, args: Vec<Value>) -> InvokeResult {
        self.dispatch(Table::Static, self.receiver(), name, Access::Call(args))
    }

    /// Reads the static member `name`.
    pub fn get_static(&self, name: &str) -> InvokeResult {
        self.dispatch(Table::Static, self.receiver(), name, Access::Get)
    }

    /// Writes `value` to the static member `name`.
    pub fn set_static(&self, name: &str, value: Value) -> InvokeResult {
        self.dispatch(Table::Static, self.receiver(), name, Access::Set(value))
    }

    /// Calls the instance method `name` on `thiz`, awaiting an asynchronous body.
    pub async fn call_async(
        &self,
        thiz: impl Into<Receiver>,
        name: &str,
        args: Vec<Value>,
    ) -> InvokeResult {
        self.dispatch_async(Table::Instance, thiz.into(), name, Access::Call(args))
            .await
    }

    /// Reads the instance member `name` of `thiz`, awaiting an asynchronous getter.
    pub async fn get_async(&self, thiz: impl Into<Receiver>, name: &str) -> InvokeResult {
        self.dispatch_async(Table::Instance, thiz.into(), name, Access::Get)
            .await
    }

    /// Writes to the instance member `name` of `thiz`, awaiting an asynchronous setter.
    pub async fn set_async(
        &self,
        thiz: impl Into<Receiver>,
        name: &str,
        value: Value,
    ) -> InvokeResult {
        self.dispatch_async(Table::Instance, thiz.into(), name, Access::Set(value))
            .await
    }

    /// Calls the static method `name`, awaiting an asynchronous body.
    pub async fn call_static_async(&self, name: &str, args: Vec<Value>) -> InvokeResult {
        self.dispatch_async(Table::Static, self.receiver(), name, Access::Call(args))
            .await
    }

    /// Reads the static member `name`, awaiting an asynchronous getter.
    pub async fn get_static_async(&self, name: &str) -> InvokeResult {
        self.dispatch_async(Table::Static, self.receiver(), name, Access::Get)
            .await
    }

    /// Writes to the static member `name`, awaiting an asynchronous setter.
    pub async fn set_static_async(&self, name: &str, value: Value) -> InvokeResult {
        self.dispatch_async(Table::Static, self.receiver(), name, Access::Set(value))
            .await
    }

    fn receiver(&self) -> Receiver {
        Receiver::Class(self.clazz.clone())
    }

    fn table(&self, table: Table) -> &RwLock<Members> {
        match table {
            Table::Instance => &self.members,
            Table::Static => &self.statics,
        }
    }

    fn apply_in(&self, table: Table, name: &str, transformer: &Transformer) -> Result<(), MemberError> {
        let mut members = self.table(table).write();
        let original = members.remove(name).ok_or_else(|| self.undefined(name))?;
        let advised = transformer.apply(&self.clazz, name, original);
        members.insert(name.to_string(), advised);
        Ok(())
    }

    fn undefined(&self, name: &str) -> MemberError {
        MemberError::Undefined {
            class: self.clazz.name().to_string(),
            member: name.to_string(),
        }
    }

    /// Finds what to run for `access`. Data writes are applied here, under the
    /// write lock; behaviors are cloned out so no lock is held while they run.
    fn resolve(&self, table: Table, name: &str, access: &Access) -> Result<Target, MemberError> {
        if let Access::Set(value) = access {
            let mut members = self.table(table).write();
            let descriptor = members.get_mut(name).ok_or_else(|| self.undefined(name))?;
            let writable = descriptor.writable;
            return match &mut descriptor.slot {
                Slot::Accessor { set: Some(set), .. } => Ok(Target::Run(set.clone())),
                Slot::Data(_) if !writable => Err(MemberError::ReadOnly(name.to_string())),
                Slot::Data(stored) => {
                    *stored = value.clone();
                    Ok(Target::Written)
                }
                _ => Err(MemberError::NoSetter(name.to_string())),
            };
        }

        let members = self.table(table).read();
        let descriptor = members.get(name).ok_or_else(|| self.undefined(name))?;
        match (access, &descriptor.slot) {
            (Access::Call(_), Slot::Method(body)) => Ok(Target::Run(body.clone())),
            (Access::Call(_), _) => Err(MemberError::NotCallable(name.to_string())),
            (_, Slot::Accessor { get: Some(get), .. }) => Ok(Target::Run(get.clone())),
            (_, Slot::Data(value)) => Ok(Target::Read(value.clone())),
            _ => Err(MemberError::NoGetter(name.to_string())),
        }
    }

    fn dispatch(&self, table: Table, thiz: Receiver, name: &str, access: Access) -> InvokeResult {
        match self.resolve(table, name, &access).map_err(MemberError::into_shared)? {
            Target::Run(behavior) => behavior.call(&access.label(name), access.invocation(thiz)),
            Target::Read(value) => Ok(value),
            Target::Written => Ok(Value::Null),
        }
    }

    async fn dispatch_async(
        &self,
        table: Table,
        thiz: Receiver,
        name: &str,
        access: Access,
    ) -> InvokeResult {
        match self.resolve(table, name, &access).map_err(MemberError::into_shared)? {
            Target::Run(behavior) => behavior.call_async(access.invocation(thiz)).await,
            Target::Read(value) => Ok(value),
            Target::Written => Ok(Value::Null),
        }
    }
}

/// The kind of access being dispatched.
enum Access {
    Call(Vec<Value>),
    Get,
    Set(Value),
}

impl Access {
    fn label(&self, name: &str) -> String {
        match self {
            Self::Call(_) => name.to_string(),
            Self::Get => format!("get {name}"),
            Self::Set(_) => format!("set {name}"),
        }
    }

    fn invocation(self, thiz: Receiver) -> Invocation {
        let args = match self {
            Self::Call(args) => args,
            Self::Get => Vec::new(),
            Self::Set(value) => vec![value],
        };
        Invocation::new(thiz, args)
    }
}

fn enumerable(members: &Members) -> Vec<String> {
    members
        .iter()
        .filter(|(_, d)| d.enumerable)
        .map(|(name, _)| name.clone())
        .collect()
}

fn define_in(members: &mut Members, name: &str, descriptor: MemberDescriptor) -> Result<(), MemberError> {
    if members.get(name).is_some_and(|existing| !existing.configurable) {
        return Err(MemberError::ReadOnly(name.to_string()));
    }
    members.insert(name.to_string(), descriptor);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::advice::SyncAdvice;
    use crate::engine::wrap;

    struct Point {
        x: AtomicI64,
    }

    fn point_class() -> Class {
        ClassBuilder::of::<Point>()
            .method(
                "shift",
                Behavior::on::<Point, _>(|this, args| {
                    let by = args.first().and_then(Value::as_i64).unwrap_or(1);
                    Ok(json!(this.x.fetch_add(by, Ordering::SeqCst) + by))
                }),
            )
            .getter(
                "x",
                Behavior::on::<Point, _>(|this, _| Ok(json!(this.x.load(Ordering::SeqCst)))),
            )
            .setter(
                "x",
                Behavior::on::<Point, _>(|this, args| {
                    this.x.store(args[0].as_i64().unwrap_or_default(), Ordering::SeqCst);
                    Ok(Value::Null)
                }),
            )
            .data("dimensions", json!(2))
            .static_method("origin", Behavior::sync(|_| Ok(json!(0))))
            .static_member(
                "unit",
                MemberDescriptor::data(json!(1)).writable(false).configurable(false),
            )
            .build()
    }

    #[test]
    fn test_dispatch() {
        let class = point_class();
        let p = Arc::new(Point { x: AtomicI64::new(1) });

        assert_eq!(class.call(p.clone(), "shift", vec![json!(2)]).unwrap(), json!(3));
        class.set(p.clone(), "x", json!(10)).unwrap();
        assert_eq!(class.get(p.clone(), "x").unwrap(), json!(10));
        assert_eq!(class.get(p.clone(), "dimensions").unwrap(), json!(2));
        assert_eq!(class.call_static("origin", vec![]).unwrap(), json!(0));
        assert_eq!(class.names(), vec!["dimensions".to_string()]);
    }

    #[test]
    fn test_getter_and_setter_merge() {
        let class = point_class();
        let d = class.descriptor("x").unwrap();
        assert!(d.get().is_some() && d.set().is_some());
    }

    #[test]
    fn test_dispatch_faults() {
        let class = point_class();
        let p = Arc::new(Point { x: AtomicI64::new(0) });

        let err = class.call(p.clone(), "x", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "member 'x' is not callable");

        let err = class.get(p.clone(), "nope").unwrap_err();
        assert_eq!(err.to_string(), "member 'nope' is not defined on class 'Point'");

        let err = class.set_static("unit", json!(5)).unwrap_err();
        assert_eq!(err.to_string(), "member 'unit' is read-only");

        let err = class
            .call(Arc::new("not a point".to_string()), "shift", vec![])
            .unwrap_err();
        assert!(err.to_string().contains("receiver is not an instance"));

        assert!(matches!(
            class.define_static_property("unit", MemberDescriptor::data(json!(2))),
            Err(MemberError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_apply_after_build() {
        let class = point_class();
        let calls = Arc::new(AtomicI64::new(0));
        let c = calls.clone();
        let transformer = wrap(SyncAdvice::new().before(move |jp| {
            assert!(jp.is_static());
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        class.apply_static("origin", &transformer).unwrap();
        class.call_static("origin", vec![]).unwrap();
        class.call_static("origin", vec![]).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(matches!(
            class.apply_static("missing", &transformer),
            Err(MemberError::Undefined { .. })
        ));
    }

    #[tokio::test]
    async fn test_async_dispatch() {
        let class = ClassBuilder::new("Clock")
            .static_method(
                "tick",
                Behavior::asynchronous(|inv| async move {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(inv.arg(0))
                }),
            )
            .build();

        assert!(class.call_static("tick", vec![json!(1)]).is_err());
        assert_eq!(
            class.call_static_async("tick", vec![json!(1)]).await.unwrap(),
            json!(1)
        );
    }
}
