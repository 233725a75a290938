use assembler_aop::Interceptor;
use assembler_config::{Config, Configuration};
use futures::{
    future::{self, BoxFuture},
    FutureExt,
};
use serde::de::DeserializeOwned;

use crate::{
    context::AssemblerContext,
    errors::InjectError,
    handle::{BuildHandle, Disposer},
    resolver::Resolver,
    types::Injected,
};

impl<T: DeserializeOwned + Injected> Resolver for Config<T> {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        future::ready(handle.config::<T>()).boxed()
    }
}

impl Resolver for Configuration {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        future::ok(handle.configuration().clone()).boxed()
    }
}

impl Resolver for AssemblerContext {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        future::ok(handle.context()).boxed()
    }
}

impl Resolver for Disposer {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        future::ok(handle.disposer()).boxed()
    }
}

impl Resolver for Interceptor {
    fn resolve(handle: &mut BuildHandle) -> BoxFuture<'_, Result<Self, InjectError>> {
        future::ok(handle.interceptor()).boxed()
    }
}
