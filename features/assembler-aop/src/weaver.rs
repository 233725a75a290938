use std::{
    collections::VecDeque,
    fmt,
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

use assembler_config::Configuration;
use futures::{future::BoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    advice::{AdviceKind, AdviceMethod, AppliedAdvice, AroundFn, MethodBinding, ObserveFn},
    aspect::AspectRegistry,
    errors::{DynError, InterceptedError},
    join_point::{Caller, CallerStack, JoinPoint},
};

type MethodBody = Box<dyn FnOnce(Vec<Value>) -> BoxFuture<'static, Result<Value, DynError>> + Send>;

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Interception handle owned by a component instance.
///
/// A component routes the methods it wants interceptable through
/// [`Interceptor::invoke`]. Until the instance is woven the body is called
/// directly; once woven each call runs the advice chain selected for it.
///
/// ```rust
/// use assembler_aop::{AspectRegistry, Interceptor};
/// use serde_json::json;
///
/// let interceptor = Interceptor::new("Calculator", AspectRegistry::new());
/// let result = futures::executor::block_on(interceptor.invoke(
///     "double",
///     vec![json!(21)],
///     |args| async move { Ok(json!(args[0].as_i64().unwrap_or_default() * 2)) },
/// ));
/// assert_eq!(result.unwrap(), json!(42));
/// ```
#[derive(Clone)]
pub struct Interceptor(Arc<InterceptorInner>);

struct InterceptorInner {
    target: String,
    identity: Caller,
    aspects: AspectRegistry,
    weaving: OnceLock<Weaving>,
}

/// What an instance was woven with
struct Weaving {
    candidates: Vec<&'static str>,
    bindings: Vec<MethodBinding>,
}

impl fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptor")
            .field("identity", &self.0.identity)
            .field("woven", &self.is_woven())
            .finish()
    }
}

impl Interceptor {
    /// Creates an unwoven interceptor for an instance of class `target`
    pub fn new(target: impl Into<String>, aspects: AspectRegistry) -> Self {
        let target = target.into();
        let id = NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed);
        Self(Arc::new(InterceptorInner {
            identity: Caller::new(target.clone(), id.to_string()),
            target,
            aspects,
            weaving: OnceLock::new(),
        }))
    }

    pub fn target(&self) -> &str {
        &self.0.target
    }

    /// Identity of the owning instance, used as caller when nothing else is known
    pub fn identity(&self) -> &Caller {
        &self.0.identity
    }

    pub fn is_woven(&self) -> bool {
        self.0.weaving.get().is_some()
    }

    pub fn callers(&self) -> &CallerStack {
        self.0.aspects.callers()
    }

    /// Calls `body` with `args`, through the advice chain if the instance is woven.
    ///
    /// A call failing inside the advice chain returns an [`InterceptedError`]
    /// carrying the join point. While the body runs, this instance is the current caller of any
    /// nested intercepted call.
    pub async fn invoke<F, Fut>(
        &self,
        method: &str,
        args: Vec<Value>,
        body: F,
    ) -> Result<Value, DynError>
    where
        F: FnOnce(Vec<Value>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, DynError>> + Send + 'static,
    {
        let callers = self.callers();
        let Some(weaving) = self.0.weaving.get() else {
            let _caller = callers.enter(self.0.identity.clone());
            return body(args).await;
        };

        let join_point = JoinPoint {
            target: self.0.target.clone(),
            method: method.to_string(),
            args,
            caller: Some(
                callers
                    .current()
                    .unwrap_or_else(|| self.0.identity.clone()),
            ),
            ..JoinPoint::default()
        };
        let advices =
            self.0
                .aspects
                .applicable(&join_point, &weaving.candidates, &weaving.bindings);

        let _caller = callers.enter(self.0.identity.clone());
        if advices.is_empty() {
            return body(join_point.args).await;
        }

        run_chain(join_point, advices, Box::new(move |args| body(args).boxed())).await
    }

    fn arm(&self, weaving: Weaving) -> bool {
        self.0.weaving.set(weaving).is_ok()
    }
}

/// Decides whether freshly built instances need interception and arms them
#[derive(Clone, Debug, Default)]
pub struct Weaver {
    aspects: AspectRegistry,
}

impl Weaver {
    pub fn new(aspects: AspectRegistry) -> Self {
        Self { aspects }
    }

    pub fn aspects(&self) -> &AspectRegistry {
        &self.aspects
    }

    /// Weaves one instance of `class`.
    ///
    /// Instances no registered pointcut can select and with no explicit method
    /// binding are left untouched. Returns whether the instance was armed.
    pub fn weave(
        &self,
        class: &str,
        interceptor: Option<&Interceptor>,
        bindings: &[MethodBinding],
    ) -> bool {
        let candidates = self.aspects.candidates_for(class);
        if candidates.is_empty() && bindings.is_empty() {
            return false;
        }

        let Some(interceptor) = interceptor else {
            tracing::debug!(
                "{class} could be advised by {} aspects but has no interceptor",
                candidates.len()
            );
            return false;
        };

        tracing::debug!(
            "Weaving {class} with {} candidate aspects and {} method bindings",
            candidates.len(),
            bindings.len()
        );
        interceptor.arm(Weaving {
            candidates,
            bindings: bindings.to_vec(),
        })
    }
}

/// Continuation handed to `around` advices.
///
/// Calling [`Proceed::proceed`] runs the next `around` advice, or the intercepted
/// method once none remain. Dropping it without proceeding skips the method.
pub struct Proceed {
    join_point: JoinPoint,
    arounds: VecDeque<(AroundFn, Option<Configuration>)>,
    body: MethodBody,
    reached: Arc<AtomicBool>,
}

impl Proceed {
    pub fn join_point(&self) -> &JoinPoint {
        &self.join_point
    }

    /// Arguments the remaining advices and the method will receive
    pub fn args_mut(&mut self) -> &mut Vec<Value> {
        &mut self.join_point.args
    }

    pub async fn proceed(mut self) -> Result<Value, DynError> {
        match self.arounds.pop_front() {
            Some((around, config)) => {
                let join_point = JoinPoint {
                    config,
                    ..self.join_point.clone()
                };
                around(join_point, self).await
            }
            None => {
                self.reached.store(true, Ordering::SeqCst);
                (self.body)(self.join_point.args).await
            }
        }
    }
}

async fn run_chain(
    mut join_point: JoinPoint,
    advices: Vec<AppliedAdvice>,
    body: MethodBody,
) -> Result<Value, DynError> {
    let mut befores: Vec<(ObserveFn, Option<Configuration>)> = Vec::new();
    let mut afters: Vec<(ObserveFn, Option<Configuration>)> = Vec::new();
    let mut arounds: VecDeque<(AroundFn, Option<Configuration>)> = VecDeque::new();

    for AppliedAdvice { advice, config } in advices {
        match (&advice.method, advice.kind()) {
            (AdviceMethod::Around(around), _) => arounds.push_back((around.clone(), config)),
            (AdviceMethod::Observe(after), AdviceKind::After) => {
                afters.push((after.clone(), config))
            }
            (AdviceMethod::Observe(before), _) => befores.push((before.clone(), config)),
        }
    }

    for (before, config) in befores {
        join_point.config = config;
        if let Err(error) = before(join_point.clone()).await {
            return Err(fail(join_point, error));
        }
    }
    join_point.config = None;

    let reached = Arc::new(AtomicBool::new(arounds.is_empty()));
    let result = if arounds.is_empty() {
        body(join_point.args.clone()).await
    } else {
        Proceed {
            join_point: join_point.clone(),
            arounds,
            body,
            reached: reached.clone(),
        }
        .proceed()
        .await
    };

    let value = match result {
        Ok(value) => value,
        Err(error) => return Err(fail(join_point, error)),
    };

    // An around advice answered without proceeding
    if !reached.load(Ordering::SeqCst) {
        return Ok(value);
    }

    join_point.result = Some(value.clone());
    for (after, config) in afters {
        join_point.config = config;
        if let Err(error) = after(join_point.clone()).await {
            return Err(fail(join_point, error));
        }
    }

    Ok(value)
}

/// Attaches `error` to the join point and wraps both into an [`InterceptedError`]
fn fail(mut join_point: JoinPoint, error: DynError) -> DynError {
    join_point.error = Some(error.to_string());
    tracing::debug!(
        "Intercepted call {}.{} failed: {}",
        join_point.target,
        join_point.method,
        error
    );
    Box::new(InterceptedError {
        join_point,
        source: error,
    })
}
