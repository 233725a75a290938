use std::sync::Arc;

use assembler_config::Configuration;

use crate::{
    assemblage::{Assemblage, Hook},
    context::AssemblerContext,
    definition::Injection,
    errors::{AssembleError, LifecycleError, RequireError},
    types::TypeInfo,
};

/// Lifecycle phase of a context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Declarations are being registered
    #[default]
    Registering,
    /// The entry component is being built
    Constructing,
    /// `on_init` and `on_inited` hooks are running
    Initializing,
    Ready,
    Disposing,
    Disposed,
}

/// Which singletons were built, and which still wait for initialization
#[derive(Debug, Default)]
pub(crate) struct Schedule {
    pub(crate) phase: Phase,
    init_queue: Vec<TypeInfo>,
    constructed: Vec<TypeInfo>,
}

impl Schedule {
    pub(crate) fn schedule(&mut self, identifier: TypeInfo) -> bool {
        self.constructed.push(identifier);
        if self.phase < Phase::Initializing {
            self.init_queue.push(identifier);
            return true;
        }
        false
    }

    /// Takes the queued singletons in initialization order, `entry` last
    fn take_init_queue(&mut self, entry: TypeInfo) -> Vec<TypeInfo> {
        let mut queue = std::mem::take(&mut self.init_queue);
        if let Some(position) = queue.iter().position(|queued| *queued == entry) {
            let entry = queue.remove(position);
            queue.push(entry);
        }
        queue
    }
}

/// Registers, builds and initializes the entry component `C` in `context`
pub(crate) async fn assemble<C: Assemblage>(
    context: &AssemblerContext,
    configuration: Option<Configuration>,
) -> Result<Arc<C>, AssembleError> {
    let entry = Injection::of::<C>().forced_singleton();
    let identifier = entry.identifier();
    tracing::debug!("Assembling {}", identifier);

    context.register(entry).await?;
    tracing::debug!("Registered {} components", context.len());

    context.schedule_state().phase = Phase::Constructing;
    let instance = context.require_instance(identifier, configuration).await?;

    initialize(context, identifier).await?;

    let assembled = instance
        .downcast::<C>()
        .map_err(|actual_type| RequireError::DowncastFailed {
            required_type: identifier.type_name,
            actual_type,
        })?;
    tracing::debug!("Assembled {}", identifier);
    Ok(assembled)
}

/// Runs `on_init` over the queued singletons in construction order, then
/// `on_inited` in the reverse order
async fn initialize(context: &AssemblerContext, entry: TypeInfo) -> Result<(), LifecycleError> {
    let queue = {
        let mut schedule = context.schedule_state();
        schedule.phase = Phase::Initializing;
        schedule.take_init_queue(entry)
    };
    tracing::debug!("Initializing {} singletons", queue.len());

    for identifier in &queue {
        if let Some(injectable) = context.injectable(identifier) {
            injectable.initialize(Hook::Init, context).await?;
        }
    }

    for identifier in queue.iter().rev() {
        if let Some(injectable) = context.injectable(identifier) {
            injectable.initialize(Hook::Inited, context).await?;
        }
    }

    context.schedule_state().phase = Phase::Ready;
    Ok(())
}

pub(crate) async fn dispose(context: &AssemblerContext) -> Result<(), LifecycleError> {
    let constructed = {
        let mut schedule = context.schedule_state();
        if schedule.phase >= Phase::Disposing {
            tracing::trace!("Context is already disposed");
            return Ok(());
        }
        schedule.phase = Phase::Disposing;
        std::mem::take(&mut schedule.constructed)
    };
    tracing::debug!("Disposing {} singletons", constructed.len());

    let mut first_error = None;
    for identifier in constructed.iter().rev() {
        let Some(injectable) = context.injectable(identifier) else {
            continue;
        };

        if let Err(error) = injectable.dispose(context).await {
            tracing::error!("{error}");
            first_error.get_or_insert(error);
        }
    }

    context.clear();
    context.schedule_state().phase = Phase::Disposed;

    match first_error {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
