use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use assembler_config::Configuration;
use serde_json::Value;

/// Runtime record of one intercepted method invocation.
///
/// Built fresh for every call that reaches an armed [`Interceptor`](crate::weaver::Interceptor)
/// and handed to each advice by value.
#[derive(Debug, Clone, Default)]
pub struct JoinPoint {
    /// Class name of the intercepted instance
    pub target: String,
    /// Name of the intercepted method
    pub method: String,
    pub args: Vec<Value>,
    /// Set once the method returned, visible to `after` advices
    pub result: Option<Value>,
    /// Set when the method or an advice failed
    pub error: Option<String>,
    pub caller: Option<Caller>,
    /// Configuration of the explicit method binding that selected the running advice
    pub config: Option<Configuration>,
}

/// Identity of whoever issued an intercepted call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caller {
    pub class: String,
    pub id: String,
}
impl Caller {
    pub fn new(class: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
        }
    }
}
impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class, self.id)
    }
}

/// Reentrant stack of callers.
///
/// Code running outside of any intercepted instance can push its own identity
/// around a call; the innermost entry is the current caller. Each guard removes
/// only its own entry, so calls that interleave on one executor leave each
/// other's callers in place.
///
/// ```rust
/// use assembler_aop::join_point::{Caller, CallerStack};
///
/// let stack = CallerStack::default();
/// {
///     let _outer = stack.enter(Caller::new("Widget", "save-button"));
///     assert_eq!(stack.current().unwrap().id, "save-button");
/// }
/// assert!(stack.current().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallerStack(Arc<Mutex<CallerEntries>>);

#[derive(Debug, Default)]
struct CallerEntries {
    entries: Vec<(u64, Caller)>,
    next_token: u64,
}

impl CallerStack {
    fn lock(&self) -> MutexGuard<'_, CallerEntries> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes a caller, which is removed again once the guard is dropped
    pub fn enter(&self, caller: Caller) -> CallerGuard {
        let mut stack = self.lock();
        stack.next_token += 1;
        let token = stack.next_token;
        stack.entries.push((token, caller));
        CallerGuard {
            stack: self.clone(),
            token,
        }
    }

    pub fn current(&self) -> Option<Caller> {
        self.lock().entries.last().map(|(_, caller)| caller.clone())
    }

    pub fn depth(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }
}

/// Removes its caller from the stack on drop
#[must_use = "the caller is popped as soon as the guard is dropped"]
pub struct CallerGuard {
    stack: CallerStack,
    token: u64,
}
impl Drop for CallerGuard {
    fn drop(&mut self) {
        let mut stack = self.stack.lock();
        if let Some(position) = stack.entries.iter().rposition(|(token, _)| *token == self.token) {
            stack.entries.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn innermost_caller_wins() {
        let stack = CallerStack::default();
        let _outer = stack.enter(Caller::new("Page", "1"));
        {
            let _inner = stack.enter(Caller::new("Button", "2"));
            assert_eq!(stack.current(), Some(Caller::new("Button", "2")));
            assert_eq!(stack.depth(), 2);
        }
        assert_eq!(stack.current(), Some(Caller::new("Page", "1")));
    }

    #[test]
    fn dropping_a_guard_removes_only_its_own_entry() {
        let stack = CallerStack::default();
        let outer = stack.enter(Caller::new("Page", "1"));
        let inner = stack.enter(Caller::new("Button", "2"));
        drop(outer);
        assert_eq!(stack.current(), Some(Caller::new("Button", "2")));
        drop(inner);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn cleared_entries_are_not_removed_twice() {
        let stack = CallerStack::default();
        let stale = stack.enter(Caller::new("Page", "1"));
        stack.clear();
        let fresh = stack.enter(Caller::new("Page", "2"));
        drop(stale);
        assert_eq!(stack.current(), Some(Caller::new("Page", "2")));
        drop(fresh);
        assert!(stack.current().is_none());
    }

    #[test]
    fn displays_class_and_id() {
        assert_eq!(Caller::new("Page", "home").to_string(), "Page#home");
    }
}
