use std::{any::TypeId, collections::BTreeMap, fmt};

use crate::{errors::RegisterError, types::TypeInfo};

/// Graph of everything registered in a context.
/// Records declared dependencies and enables visualization of the assembled application
#[derive(Clone, Default)]
pub struct DependencyGraph {
    map: BTreeMap<TypeId, DependencyGraphEntry>,
    order: Vec<TypeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        info: TypeInfo,
        concrete: TypeInfo,
        dependencies: Vec<TypeInfo>,
    ) -> Result<(), RegisterError> {
        if let Some(existing) = self.map.get(&info.type_id) {
            return Err(RegisterError::Duplicate(existing.info));
        }

        self.map.insert(
            info.type_id,
            DependencyGraphEntry {
                info,
                concrete,
                dependencies,
            },
        );
        self.order.push(info.type_id);
        Ok(())
    }

    pub fn contains(&self, info: &TypeInfo) -> bool {
        self.map.contains_key(&info.type_id)
    }

    /// Declared dependencies of a registered type, in declaration order
    pub fn dependencies_of(&self, info: &TypeInfo) -> Option<&[TypeInfo]> {
        self.map
            .get(&info.type_id)
            .map(|entry| entry.dependencies.as_slice())
    }

    /// Registered types declaring `info` as a dependency
    pub fn dependents_of(&self, info: &TypeInfo) -> Vec<TypeInfo> {
        self.entries()
            .filter(|entry| entry.dependencies.contains(info))
            .map(|entry| entry.info)
            .collect()
    }

    /// Registered types in completion order, dependencies before their dependents
    pub fn registration_order(&self) -> Vec<TypeInfo> {
        self.entries().map(|entry| entry.info).collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    fn entries(&self) -> impl Iterator<Item = &DependencyGraphEntry> {
        self.order.iter().filter_map(|id| self.map.get(id))
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.entries() {
            write!(f, "{}", entry.info.short_name())?;
            if entry.concrete != entry.info {
                write!(f, " ({})", entry.concrete.short_name())?;
            }

            let dependencies: Vec<_> = entry
                .dependencies
                .iter()
                .map(|dependency| dependency.short_name())
                .collect();
            if dependencies.is_empty() {
                writeln!(f)?;
            } else {
                writeln!(f, " -> {}", dependencies.join(", "))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in self.entries() {
            map.entry(&entry.info.type_name, &entry.dependencies);
        }
        map.finish()
    }
}

#[derive(Clone)]
struct DependencyGraphEntry {
    info: TypeInfo,
    concrete: TypeInfo,
    dependencies: Vec<TypeInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parent;
    struct Child;

    #[test]
    fn rejects_duplicates() {
        let mut graph = DependencyGraph::new();
        let child = TypeInfo::of::<Child>();
        graph.add(child, child, vec![]).unwrap();

        let error = graph.add(child, child, vec![]).unwrap_err();
        assert!(matches!(error, RegisterError::Duplicate(info) if info == child));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn displays_dependencies_in_registration_order() {
        let mut graph = DependencyGraph::new();
        let (parent, child) = (TypeInfo::of::<Parent>(), TypeInfo::of::<Child>());
        graph.add(child, child, vec![]).unwrap();
        graph.add(parent, parent, vec![child]).unwrap();

        assert_eq!(graph.to_string(), "Child\nParent -> Child\n");
        assert_eq!(graph.dependents_of(&child), vec![parent]);
        assert_eq!(graph.registration_order(), vec![child, parent]);
    }
}
