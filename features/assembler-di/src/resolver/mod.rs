use futures::future::BoxFuture;

use crate::{errors::InjectError, handle::BuildHandle};

pub mod arc;
pub mod context;

/// Allows custom behaviour on injection.
///
/// Returns a boxed future so resolvers of `dyn Trait` identifiers can be awaited
/// inside `Send` construction futures.
pub trait Resolver: Sized + Send {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>>;
}
