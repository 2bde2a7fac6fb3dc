//! Tower integration.
//!
//! [`AdviceLayer`] advises any `tower` service that takes an [`Invocation`]
//! and produces a [`Value`]. The inner service is treated as the original
//! behavior of a method member; every request then runs through the
//! asynchronous invocation wrapper.
//!
//! ```rust,ignore
//! let svc = ServiceBuilder::new()
//!     .advise(after_throwing(log_error), ClassRef::new("Api"), "fetch")
//!     .service_fn(fetch);
//!
//! let value = svc.oneshot(Invocation::new(Receiver::Unbound, args)).await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tower::util::ServiceExt;
use tower::{Layer, Service, ServiceBuilder};
use tower_layer::Stack;

use aspect_core::{Behavior, ClassRef, Invocation, SharedError};

use crate::engine::Transformer;

/// A tower [`Layer`] that runs advice around the inner service.
#[derive(Clone)]
pub struct AdviceLayer {
    transformer: Transformer,
    clazz: ClassRef,
    name: String,
}

impl AdviceLayer {
    /// Creates a layer that reports calls as member `name` of `clazz`.
    pub fn new(transformer: Transformer, clazz: ClassRef, name: impl Into<String>) -> Self {
        Self {
            transformer,
            clazz,
            name: name.into(),
        }
    }
}

impl<S> Layer<S> for AdviceLayer
where
    S: Service<Invocation, Response = Value, Error = SharedError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Service = AdviceService;

    fn layer(&self, inner: S) -> AdviceService {
        let behavior = self
            .transformer
            .apply_method(&self.clazz, &self.name, from_service(inner));
        AdviceService { behavior }
    }
}

/// Turns a service into an asynchronous behavior. Each call drives a clone of
/// the service to readiness before calling it. The service only needs to be
/// `Send`; the prototype is kept behind a lock and only touched to clone it.
pub fn from_service<S>(service: S) -> Behavior
where
    S: Service<Invocation, Response = Value, Error = SharedError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    let service = Mutex::new(service);
    Behavior::Async(Arc::new(move |inv| {
        service.lock().clone().oneshot(inv).boxed()
    }))
}

/// The [`Service`] produced by [`AdviceLayer`].
#[derive(Clone)]
pub struct AdviceService {
    behavior: Behavior,
}

impl Service<Invocation> for AdviceService {
    type Response = Value;
    type Error = SharedError;
    type Future = BoxFuture<'static, Result<Value, SharedError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, inv: Invocation) -> Self::Future {
        self.behavior.call_async(inv)
    }
}

/// Extension for adding advice to a [`ServiceBuilder`].
pub trait ServiceBuilderExt<L> {
    /// Adds an [`AdviceLayer`] to the stack.
    fn advise(
        self,
        transformer: Transformer,
        clazz: ClassRef,
        name: impl Into<String>,
    ) -> ServiceBuilder<Stack<AdviceLayer, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn advise(
        self,
        transformer: Transformer,
        clazz: ClassRef,
        name: impl Into<String>,
    ) -> ServiceBuilder<Stack<AdviceLayer, L>> {
        self.layer(AdviceLayer::new(transformer, clazz, name))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use std::cell::Cell;

    use aspect_core::{Override, Receiver, raise};
    use futures::future::{Ready, ready};
    use serde_json::json;
    use tower::service_fn;

    use super::*;
    use crate::constructors::{after_returning, after_throwing, around, async_around, before};

    async fn double(inv: Invocation) -> Result<Value, SharedError> {
        match inv.arg(0).as_i64() {
            Some(n) => Ok(json!(n * 2)),
            None => Err(raise("not a number")),
        }
    }

    /// Counts calls per clone; `Cell` keeps it `Send` but not `Sync`.
    #[derive(Clone, Default)]
    struct Tally {
        calls: Cell<u64>,
    }

    impl Service<Invocation> for Tally {
        type Response = Value;
        type Error = SharedError;
        type Future = Ready<Result<Value, SharedError>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), SharedError>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, inv: Invocation) -> Self::Future {
            self.calls.set(self.calls.get() + 1);
            ready(Ok(json!([inv.arg(0), self.calls.get()])))
        }
    }

    fn request(arg: Value) -> Invocation {
        Invocation::new(Receiver::Unbound, vec![arg])
    }

    #[test]
    fn test_layer_runs_advice() {
        let names = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let n = names.clone();
        let svc = ServiceBuilder::new()
            .advise(
                before(move |jp| {
                    n.lock().push(jp.full_name().to_string());
                    Ok(())
                }),
                ClassRef::new("Math"),
                "double",
            )
            .service(service_fn(double));

        let out = tokio_test::block_on(svc.oneshot(request(json!(21)))).unwrap();
        assert_eq!(out, json!(42));
        assert_eq!(*names.lock(), vec!["double"]);
    }

    #[test]
    fn test_layer_preserves_error() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let layer = AdviceLayer::new(
            after_throwing(move |t| {
                assert_eq!(t.error.to_string(), "not a number");
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            ClassRef::new("Math"),
            "double",
        );
        let svc = layer.layer(service_fn(double));

        let err = tokio_test::block_on(svc.oneshot(request(json!("x")))).unwrap_err();
        assert_eq!(err.to_string(), "not a number");
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_layer_around_overrides_args() {
        let layer = AdviceLayer::new(
            async_around(|jp| async move {
                jp.proceed_async_with(Override::args(vec![json!(5)]))
                    .await
            }),
            ClassRef::new("Math"),
            "double",
        );
        let svc = layer.layer(service_fn(double));

        let out = tokio_test::block_on(svc.oneshot(request(json!(1)))).unwrap();
        assert_eq!(out, json!(10));
    }

    #[test]
    fn test_layer_accepts_service_that_is_not_sync() {
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        let svc = ServiceBuilder::new()
            .advise(
                after_returning(move |r| {
                    assert_eq!(r.join_point.full_name(), "tally");
                    s.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                ClassRef::new("Counter"),
                "tally",
            )
            .service(Tally::default());

        for _ in 0..2 {
            let out = tokio_test::block_on(svc.clone().oneshot(request(json!("x")))).unwrap();
            assert_eq!(out, json!(["x", 1]));
        }
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_around_leaves_service_unadvised() {
        let arounds = Arc::new(AtomicUsize::new(0));
        let a = arounds.clone();
        let svc = AdviceLayer::new(
            around(move |jp| {
                a.fetch_add(1, Ordering::SeqCst);
                jp.proceed()
            }),
            ClassRef::new("Math"),
            "double",
        )
        .layer(service_fn(double));

        let out = tokio_test::block_on(svc.oneshot(request(json!(4)))).unwrap();
        assert_eq!(out, json!(8));
        assert_eq!(arounds.load(Ordering::SeqCst), 0);
    }
}
