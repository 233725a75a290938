use std::{
    any::{Any, TypeId},
    sync::Arc,
};

pub use assembler_aop::DynError;

/// We assume that we might be running on a multithreaded async runtime
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injected: Send + Sync + 'static {}
impl<T: Send + Sync + 'static + ?Sized> Injected for T {}

/// Shared, type erased instance of a component or object.
///
/// Holds an `Arc<T>` where `T` is the identifier the instance was registered
/// under, which may be a `dyn Trait`.
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub(crate) fn new<T: Injected + ?Sized>(instance: Arc<T>) -> Self {
        Instance {
            info: TypeInfo::of::<T>(),
            instance: Arc::new(instance),
        }
    }

    pub fn downcast<T: Injected + ?Sized>(&self) -> Result<Arc<T>, &'static str> {
        match self.instance.downcast_ref::<Arc<T>>() {
            Some(downcasted) => Ok(downcasted.clone()),
            None => Err(self.info.type_name),
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// Type name without module path and generic arguments, e.g. `UserService`
    pub fn short_name(&self) -> &'static str {
        let base = self
            .type_name
            .split('<')
            .next()
            .unwrap_or(self.type_name);
        base.rsplit("::").next().unwrap_or(base)
    }
}
