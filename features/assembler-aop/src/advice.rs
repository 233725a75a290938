use std::{fmt, future::Future, sync::Arc};

use assembler_config::Configuration;
use futures::{future::BoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    aspect::{aspect_key, Aspect},
    errors::DynError,
    join_point::JoinPoint,
    pointcut::Pointcut,
    weaver::Proceed,
};

/// When an advice runs relative to the intercepted method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdviceKind {
    Before,
    After,
    Around,
}
impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::Around => "around",
        })
    }
}

/// Declared metadata of one advice of an [`Aspect`].
///
/// The advice body is looked up by `method` through [`Aspect::advice_method`]
/// when the aspect is registered.
#[derive(Debug, Clone)]
pub struct AdviceDefinition {
    pub kind: AdviceKind,
    /// `None` for advices only applied through explicit method bindings
    pub pointcut: Option<String>,
    pub method: String,
    /// Higher runs first
    pub priority: i32,
    /// Lets a method binding select a subset of the aspect's advices
    pub role: Option<String>,
    pub enabled: bool,
}

impl AdviceDefinition {
    /// An advice which only applies through explicit method bindings
    pub fn new(kind: AdviceKind, method: impl Into<String>) -> Self {
        Self {
            kind,
            pointcut: None,
            method: method.into(),
            priority: 0,
            role: None,
            enabled: true,
        }
    }

    pub fn before(pointcut: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(AdviceKind::Before, method).pointcut(pointcut)
    }

    pub fn after(pointcut: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(AdviceKind::After, method).pointcut(pointcut)
    }

    pub fn around(pointcut: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(AdviceKind::Around, method).pointcut(pointcut)
    }

    pub fn pointcut(mut self, pointcut: impl Into<String>) -> Self {
        self.pointcut = Some(pointcut.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

pub type ObserveFn =
    Arc<dyn Fn(JoinPoint) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync>;
pub type AroundFn =
    Arc<dyn Fn(JoinPoint, Proceed) -> BoxFuture<'static, Result<Value, DynError>> + Send + Sync>;

/// Body of an advice, bound to its aspect instance
#[derive(Clone)]
pub enum AdviceMethod {
    /// Used by `before` and `after` advices
    Observe(ObserveFn),
    /// Used by `around` advices, receives the continuation
    Around(AroundFn),
}

impl AdviceMethod {
    pub fn observe<F, Fut>(f: F) -> Self
    where
        F: Fn(JoinPoint) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        AdviceMethod::Observe(Arc::new(move |join_point| f(join_point).boxed()))
    }

    pub fn around<F, Fut>(f: F) -> Self
    where
        F: Fn(JoinPoint, Proceed) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, DynError>> + Send + 'static,
    {
        AdviceMethod::Around(Arc::new(move |join_point, proceed| {
            f(join_point, proceed).boxed()
        }))
    }

    pub(crate) fn fits(&self, kind: AdviceKind) -> bool {
        matches!(
            (self, kind),
            (AdviceMethod::Observe(_), AdviceKind::Before | AdviceKind::After)
                | (AdviceMethod::Around(_), AdviceKind::Around)
        )
    }
}

/// An advice extracted from a registered aspect, bound to its instance
pub struct Advice {
    pub(crate) definition: AdviceDefinition,
    pub(crate) pointcut: Option<Pointcut>,
    pub(crate) aspect: &'static str,
    pub(crate) method: AdviceMethod,
}

impl Advice {
    pub fn kind(&self) -> AdviceKind {
        self.definition.kind
    }

    pub fn priority(&self) -> i32 {
        self.definition.priority
    }

    pub fn role(&self) -> Option<&str> {
        self.definition.role.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.definition.enabled
    }

    /// Key of the aspect owning this advice
    pub fn aspect(&self) -> &'static str {
        self.aspect
    }

    pub fn method_name(&self) -> &str {
        &self.definition.method
    }

    /// Whether the pointcut selects the join point. Advices without pointcut never match.
    pub fn matches(&self, class: &str, method: &str) -> bool {
        self.pointcut
            .as_ref()
            .is_some_and(|pointcut| pointcut.matches(class, method))
    }

    pub(crate) fn could_match_class(&self, class: &str) -> bool {
        self.pointcut
            .as_ref()
            .is_some_and(|pointcut| pointcut.matches_class(class))
    }
}

impl fmt::Debug for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advice")
            .field("aspect", &self.aspect)
            .field("definition", &self.definition)
            .finish()
    }
}

/// An advice selected for one invocation
#[derive(Clone)]
pub struct AppliedAdvice {
    pub advice: Arc<Advice>,
    /// Configuration of the method binding which selected it, if any
    pub config: Option<Configuration>,
}

/// Explicitly binds an aspect's advices to one method, bypassing pointcut matching
#[derive(Debug, Clone)]
pub struct MethodBinding {
    pub method: String,
    pub aspect: &'static str,
    pub role: Option<String>,
    pub config: Option<Configuration>,
}

impl MethodBinding {
    pub fn new<A: Aspect>(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            aspect: aspect_key::<A>(),
            role: None,
            config: None,
        }
    }

    /// Only apply advices declared with this role
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_config(mut self, config: Configuration) -> Self {
        self.config = Some(config);
        self
    }

    pub(crate) fn selects(&self, advice: &Advice) -> bool {
        match &self.role {
            Some(role) => advice.role() == Some(role.as_str()),
            None => true,
        }
    }
}
