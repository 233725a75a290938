use std::{fmt, ops::Deref, sync::Arc};

use assembler_aop::AspectRegistry;
use assembler_config::{Configuration, Globals};

use crate::{
    assemblage::Assemblage,
    context::AssemblerContext,
    errors::{AssembleError, LifecycleError},
    scheduler,
};

/// Builds applications from their entry component.
///
/// Every build gets its own [`AssemblerContext`]. Aspects and globals are shared
/// between builds of the same assembler, by default through the process-wide
/// [`AspectRegistry::global`] and [`Globals::shared`].
#[derive(Clone, Debug)]
pub struct Assembler {
    aspects: AspectRegistry,
    globals: Globals,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Assembler {
            aspects: AspectRegistry::global(),
            globals: Globals::shared(),
        }
    }

    pub fn with_aspects(mut self, aspects: AspectRegistry) -> Self {
        self.aspects = aspects;
        self
    }

    pub fn with_globals(mut self, globals: Globals) -> Self {
        self.globals = globals;
        self
    }

    pub async fn build<C: Assemblage>(&self) -> Result<Assembled<C>, AssembleError> {
        self.build_with(None).await
    }

    /// Builds `C`, passing it `configuration` over its declared one
    pub async fn build_with<C: Assemblage>(
        &self,
        configuration: Option<Configuration>,
    ) -> Result<Assembled<C>, AssembleError> {
        let context = AssemblerContext::new(self.aspects.clone(), self.globals.clone());
        let instance = scheduler::assemble::<C>(&context, configuration).await?;
        Ok(Assembled { instance, context })
    }
}

/// Builds `C` with the default [`Assembler`]
pub async fn assemble<C: Assemblage>(
    configuration: Option<Configuration>,
) -> Result<Assembled<C>, AssembleError> {
    Assembler::new().build_with(configuration).await
}

/// An assembled entry component together with its context
pub struct Assembled<C> {
    instance: Arc<C>,
    context: AssemblerContext,
}

impl<C> Assembled<C> {
    pub fn instance(&self) -> &Arc<C> {
        &self.instance
    }

    pub fn context(&self) -> &AssemblerContext {
        &self.context
    }

    pub async fn dispose(self) -> Result<(), LifecycleError> {
        self.context.dispose().await
    }
}

impl<C> Deref for Assembled<C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl<C> fmt::Debug for Assembled<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assembled")
            .field("entry", &std::any::type_name::<C>())
            .field("context", &self.context)
            .finish()
    }
}
