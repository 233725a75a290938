//! Assembler DI builds applications from declarative component definitions.
//!
//! A component implements [`Assemblage`]: its [`Definition`] declares what it
//! injects, which objects it binds, its tags, events and globals and which aspects
//! it engages. Assembling an entry component:
//! 1. registers the whole declaration tree, depth first
//! 2. builds the entry, which builds its dependencies on demand
//! 3. runs `on_init` over the built singletons, dependencies first, then `on_inited`
//!    in reverse
//!
//! Disposing the context runs `on_dispose`, dependents first.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use assembler_aop::AspectRegistry;
//! use assembler_config::Globals;
//! use assembler_di::{Assemblage, Assembler, BuildHandle, Definition, DynError, Injection};
//!
//! struct Database;
//! impl Assemblage for Database {
//!     async fn construct(_: &mut BuildHandle) -> Result<Self, DynError> {
//!         Ok(Database)
//!     }
//! }
//!
//! struct App {
//!     database: Arc<Database>,
//! }
//! impl Assemblage for App {
//!     fn definition() -> Definition {
//!         Definition::new().inject(Injection::of::<Database>())
//!     }
//!
//!     async fn construct(handle: &mut BuildHandle) -> Result<Self, DynError> {
//!         Ok(App {
//!             database: handle.resolve().await?,
//!         })
//!     }
//! }
//!
//! let assembler = Assembler::new()
//!     .with_aspects(AspectRegistry::new())
//!     .with_globals(Globals::new());
//! let app = futures::executor::block_on(assembler.build::<App>()).unwrap();
//! let database = futures::executor::block_on(app.context().require::<Database>()).unwrap();
//! assert!(Arc::ptr_eq(&app.database, &database));
//! ```

pub mod assemblage;
pub mod builder;
pub mod context;
pub mod definition;
pub mod dependency_graph;
pub mod errors;
pub mod events;
pub mod handle;
pub mod injectable;
mod registry;
pub mod resolver;
pub mod scheduler;
pub mod types;

pub use assemblage::{Assemblage, Hook};
pub use builder::{assemble, Assembled, Assembler};
pub use context::AssemblerContext;
pub use definition::{Definition, Engagement, Injection, Use};
pub use dependency_graph::DependencyGraph;
pub use errors::{AssembleError, InjectError, LifecycleError, RegisterError, RequireError};
pub use events::{Listener, ListenerId};
pub use handle::{BuildHandle, Disposer};
pub use injectable::Injectable;
pub use resolver::Resolver;
pub use scheduler::Phase;
pub use types::{DynError, Injected, Instance, TypeInfo};
