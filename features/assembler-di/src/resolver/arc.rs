use std::sync::Arc;

use futures::{future::BoxFuture, FutureExt};

use crate::{
    errors::InjectError, handle::BuildHandle, resolver::Resolver, types::Injected,
};

impl<T: Injected + ?Sized> Resolver for Arc<T> {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        async move { handle.require::<T>().await }.boxed()
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        async move {
            match Resolvable::resolve(handle).await {
                Ok(resolved) => Ok(Some(resolved)),
                // If the required type is not registered Option does not fail
                Err(e) if e.is_not_registered() => Ok(None),
                Err(e) => Err(e),
            }
        }
        .boxed()
    }
}
