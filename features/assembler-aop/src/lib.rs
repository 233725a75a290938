//! Aspect weaving for the assembler runtime.
//!
//! Consists of the following parts:
//! 1. Pointcut - parses `execution(<Class>.<method>)` expressions into predicates
//! 2. Advice - `before`/`after`/`around` interception rules declared by an [`Aspect`]
//! 3. AspectRegistry - shares aspect instances and answers which advices apply to a call
//! 4. Weaver/Interceptor - arms instances and runs the advice chain on each call

pub mod advice;
pub mod aspect;
pub mod errors;
pub mod join_point;
pub mod pointcut;
pub mod weaver;

pub use advice::{AdviceDefinition, AdviceKind, AdviceMethod, AppliedAdvice, MethodBinding};
pub use aspect::{aspect_key, Aspect, AspectRegistry};
pub use errors::{AspectError, DynError, InterceptedError, PointcutError};
pub use join_point::{Caller, CallerGuard, CallerStack, JoinPoint};
pub use pointcut::Pointcut;
pub use weaver::{Interceptor, Proceed, Weaver};
