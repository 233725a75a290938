use std::{fmt, future::Future};

use assembler_aop::Interceptor;
use assembler_config::Configuration;

use crate::{
    context::AssemblerContext,
    definition::Definition,
    handle::BuildHandle,
    types::{DynError, Injected},
};

/// A component the assembler can build.
///
/// `definition` declares how the component is shared and what it depends on,
/// `construct` builds it from a [`BuildHandle`]. The lifecycle hooks default to
/// no-ops:
///
/// - `on_register` once when the component is registered in a context
/// - `on_init` for each built instance, dependencies before their dependents
/// - `on_inited` once every instance of the build is initialized, dependents first
/// - `on_dispose` when the context is disposed, dependents first
///
/// Each hook finishes before the next one starts.
pub trait Assemblage: Injected + Sized {
    fn definition() -> Definition {
        Definition::new()
    }

    /// Constructs a new instance of the component
    ///
    /// Returns the constructed instance, or an error if either Dependencies are not satisfied or the Instantiation failed
    fn construct(
        handle: &mut BuildHandle,
    ) -> impl Future<Output = Result<Self, DynError>> + Send + '_;

    /// Interceptor routing this instance's calls through applicable advices
    fn interceptor(&self) -> Option<&Interceptor> {
        None
    }

    fn on_register(
        context: &AssemblerContext,
        configuration: &Configuration,
    ) -> impl Future<Output = Result<(), DynError>> + Send {
        let _ = (context, configuration);
        async { Ok(()) }
    }

    fn on_init(
        &self,
        context: &AssemblerContext,
        configuration: &Configuration,
    ) -> impl Future<Output = Result<(), DynError>> + Send {
        let _ = (context, configuration);
        async { Ok(()) }
    }

    fn on_inited(
        &self,
        context: &AssemblerContext,
        configuration: &Configuration,
    ) -> impl Future<Output = Result<(), DynError>> + Send {
        let _ = (context, configuration);
        async { Ok(()) }
    }

    fn on_dispose(
        &self,
        context: &AssemblerContext,
        configuration: &Configuration,
    ) -> impl Future<Output = Result<(), DynError>> + Send {
        let _ = (context, configuration);
        async { Ok(()) }
    }
}

/// Lifecycle hook of an [`Assemblage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Register,
    Init,
    Inited,
    Dispose,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hook::Register => "on_register",
            Hook::Init => "on_init",
            Hook::Inited => "on_inited",
            Hook::Dispose => "on_dispose",
        })
    }
}
