use std::sync::Arc;

use assembler_aop::AspectError;
use assembler_config::ConfigError;
use thiserror::Error;

use crate::{
    assemblage::Hook,
    types::{DynError, TypeInfo},
};

/// Errors while registering the declared component tree
#[derive(Error, Debug, Clone)]
pub enum RegisterError {
    /// The identifier is already registered in this context
    #[error("A component has been registered twice: '{0}'")]
    Duplicate(TypeInfo),
    /// The object name is already bound in this context
    #[error("An object has been bound twice: '{0}'")]
    DuplicateObject(String),
    /// The component's own declaration tree leads back to it
    #[error("A circular dependency exists between '{from}' and '{to}' through {chain:?}")]
    CircularDependency {
        from: TypeInfo,
        to: TypeInfo,
        chain: Vec<TypeInfo>,
    },
    #[error(transparent)]
    Aspect(#[from] AspectError),
    #[error(transparent)]
    Global(#[from] ConfigError),
    /// An `on_register` hook failed
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Errors when trying to require a certain type
#[derive(Error, Debug, Clone)]
pub enum RequireError {
    /// The required type is not known
    #[error("'{0}' is not registered")]
    NotRegistered(&'static str),
    /// No object is bound under the required name
    #[error("No object is bound under '{0}'")]
    ObjectNotRegistered(String),
    /// The required type is already being constructed further up the chain
    #[error("'{to}' is required while it is being constructed, through {chain:?}")]
    CircularDependency { to: TypeInfo, chain: Vec<TypeInfo> },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    /// The component's `construct` failed
    #[error("Constructing '{component}' failed - error: {error}")]
    ConstructionFailed {
        component: &'static str,
        error: Arc<DynError>,
    },
    /// A hook of a component built on demand failed
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// The context has been disposed
    #[error("The context has been disposed")]
    Disposed,
}

/// Errors while resolving a constructor dependency
#[derive(Error, Debug)]
pub enum InjectError {
    /// Could not require the type
    #[error(transparent)]
    RequireError(#[from] RequireError),
    /// The configuration could not be read as the requested type
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
    /// Generic error during Injection
    #[error("Error during injection: {0}")]
    Other(DynError),
}

impl InjectError {
    /// Whether the error means the dependency is simply absent
    pub fn is_not_registered(&self) -> bool {
        matches!(
            self,
            InjectError::RequireError(
                RequireError::NotRegistered(_) | RequireError::ObjectNotRegistered(_)
            )
        )
    }
}

/// A lifecycle hook returned an error
#[derive(Error, Debug, Clone)]
#[error("{hook} of '{component}' failed - error: {error}")]
pub struct LifecycleError {
    pub component: &'static str,
    pub hook: Hook,
    pub error: Arc<DynError>,
}

impl LifecycleError {
    pub(crate) fn new(component: &'static str, hook: Hook, error: DynError) -> Self {
        Self {
            component,
            hook,
            error: Arc::new(error),
        }
    }
}

/// Errors while assembling an application from its entry component
#[derive(Error, Debug, Clone)]
pub enum AssembleError {
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error(transparent)]
    Require(#[from] RequireError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
