use std::sync::Arc;

use crate::{advice::AdviceKind, join_point::JoinPoint};

/// Boxed error returned by advices and intercepted methods
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Errors while parsing a pointcut expression
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PointcutError {
    /// The expression does not follow `execution(<Class>.<method>)`
    #[error("Malformed pointcut '{0}', expected 'execution(<Class>.<method>)'")]
    Malformed(String),
    /// The expression follows the grammar but could not be compiled
    #[error("Pointcut '{expression}' could not be compiled: {message}")]
    Invalid { expression: String, message: String },
}

/// Errors while registering an aspect
#[derive(thiserror::Error, Debug, Clone)]
pub enum AspectError {
    #[error(transparent)]
    Pointcut(#[from] PointcutError),
    /// An advice definition names a method the aspect does not provide
    #[error("Aspect '{aspect}' declares the advice method '{method}' but does not provide it")]
    MissingAdviceMethod { aspect: &'static str, method: String },
    /// An advice definition names a method of the wrong shape, e.g. an observer used as `around`
    #[error("Advice method '{method}' of aspect '{aspect}' cannot be used as a '{kind}' advice")]
    KindMismatch {
        aspect: &'static str,
        method: String,
        kind: AdviceKind,
    },
    /// The aspect instance could not be resolved
    #[error("Aspect '{aspect}' could not be resolved - error: {error}")]
    ResolveFailed {
        aspect: &'static str,
        error: Arc<DynError>,
    },
}

/// An advised call failed, in the method itself or in one of its advices
#[derive(thiserror::Error, Debug)]
#[error("Intercepted call {}.{} failed", .join_point.target, .join_point.method)]
pub struct InterceptedError {
    /// The failed call, with its error attached
    pub join_point: JoinPoint,
    #[source]
    pub source: DynError,
}
