use std::{any::TypeId, collections::HashMap, sync::Arc};

use crate::{errors::RegisterError, injectable::DynInjectable, types::TypeInfo};

/// Injectables of one context, keyed by identifier, in registration order
#[derive(Default)]
pub(crate) struct Registry {
    entries: HashMap<TypeId, Arc<dyn DynInjectable>>,
    order: Vec<TypeId>,
}

impl Registry {
    pub(crate) fn insert(&mut self, injectable: Arc<dyn DynInjectable>) -> Result<(), RegisterError> {
        let identifier = injectable.identifier();
        if self.entries.contains_key(&identifier.type_id) {
            return Err(RegisterError::Duplicate(identifier));
        }

        self.entries.insert(identifier.type_id, injectable);
        self.order.push(identifier.type_id);
        Ok(())
    }

    pub(crate) fn get(&self, identifier: &TypeInfo) -> Option<Arc<dyn DynInjectable>> {
        self.entries.get(&identifier.type_id).cloned()
    }

    pub(crate) fn contains(&self, type_id: &TypeId) -> bool {
        self.entries.contains_key(type_id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<dyn DynInjectable>> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}
