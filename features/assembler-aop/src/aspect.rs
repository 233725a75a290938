use std::{
    any::{type_name, Any},
    fmt,
    future::Future,
    sync::{Arc, Mutex, OnceLock, PoisonError},
};

use crate::{
    advice::{Advice, AdviceDefinition, AdviceMethod, AppliedAdvice, MethodBinding},
    errors::{AspectError, DynError},
    join_point::{CallerStack, JoinPoint},
    pointcut::Pointcut,
};

/// A cross-cutting component whose methods intercept other components' calls.
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use assembler_aop::{AdviceDefinition, AdviceMethod, Aspect};
///
/// #[derive(Default)]
/// struct CallLog(Mutex<Vec<String>>);
///
/// impl Aspect for CallLog {
///     fn advices() -> Vec<AdviceDefinition> {
///         vec![AdviceDefinition::before("execution(*.*)", "record").priority(10)]
///     }
///
///     fn advice_method(self: Arc<Self>, method: &str) -> Option<AdviceMethod> {
///         match method {
///             "record" => Some(AdviceMethod::observe(move |join_point| {
///                 let this = self.clone();
///                 async move {
///                     this.0.lock().unwrap().push(join_point.method);
///                     Ok(())
///                 }
///             })),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Aspect: Send + Sync + 'static {
    /// Declared advices, in declaration order
    fn advices() -> Vec<AdviceDefinition>
    where
        Self: Sized;

    /// Binds the advice method named `method` to this instance
    fn advice_method(self: Arc<Self>, method: &str) -> Option<AdviceMethod>;
}

/// Key under which an aspect type is registered
pub fn aspect_key<A: Aspect>() -> &'static str {
    type_name::<A>()
}

static GLOBAL: OnceLock<AspectRegistry> = OnceLock::new();

struct AspectEntry {
    key: &'static str,
    instance: Arc<dyn Any + Send + Sync>,
    advices: Vec<Arc<Advice>>,
}

/// Registry of aspect instances and their advices.
///
/// Shared between every resolution context holding a clone of it, so one aspect
/// instance observes calls from several object graphs. The first registration of
/// an aspect type wins; later ones are no-ops until [`AspectRegistry::reset`].
#[derive(Clone, Default)]
pub struct AspectRegistry(Arc<AspectRegistryInner>);

#[derive(Default)]
struct AspectRegistryInner {
    aspects: Mutex<Vec<Arc<AspectEntry>>>,
    callers: CallerStack,
}

impl fmt::Debug for AspectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aspects = self.snapshot();
        let mut list = f.debug_list();
        for entry in &aspects {
            list.entry(&(entry.key, entry.advices.len()));
        }
        list.finish()
    }
}

impl AspectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> AspectRegistry {
        GLOBAL.get_or_init(AspectRegistry::new).clone()
    }

    /// Stack of callers shared by every interceptor using this registry
    pub fn callers(&self) -> &CallerStack {
        &self.0.callers
    }

    pub fn contains<A: Aspect>(&self) -> bool {
        self.contains_key(aspect_key::<A>())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().iter().any(|entry| entry.key == key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the registered instance of an aspect
    pub fn instance<A: Aspect>(&self) -> Option<Arc<A>> {
        let key = aspect_key::<A>();
        let instance = self
            .lock()
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.instance.clone())?;
        instance.downcast::<A>().ok()
    }

    /// Whether `instance` is the registered instance of one of the aspects.
    ///
    /// Such instances belong to the registry, not to the context that built them.
    pub fn owns<T: Send + Sync + 'static>(&self, instance: &Arc<T>) -> bool {
        let address = Arc::as_ptr(instance).cast::<()>();
        self.lock()
            .iter()
            .any(|entry| Arc::as_ptr(&entry.instance).cast::<()>() == address)
    }

    /// Registers an aspect, resolving its instance with `resolve`.
    ///
    /// Returns `false` if the aspect was already registered, in which case `resolve`
    /// is not called.
    pub async fn register_aspect<A, F, Fut>(&self, resolve: F) -> Result<bool, AspectError>
    where
        A: Aspect,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<A>, DynError>>,
    {
        let key = aspect_key::<A>();
        if self.contains_key(key) {
            tracing::trace!("Aspect {key} is already registered");
            return Ok(false);
        }

        let instance = resolve()
            .await
            .map_err(|error| AspectError::ResolveFailed {
                aspect: key,
                error: Arc::new(error),
            })?;
        let advices = extract_advices(key, &instance)?;

        let mut aspects = self.lock();
        if aspects.iter().any(|entry| entry.key == key) {
            return Ok(false);
        }

        tracing::debug!("Registered aspect {key} with {} advices", advices.len());
        aspects.push(Arc::new(AspectEntry {
            key,
            instance,
            advices,
        }));
        Ok(true)
    }

    /// Keys of the aspects whose pointcuts could select a method of `class`
    pub fn candidates_for(&self, class: &str) -> Vec<&'static str> {
        self.lock()
            .iter()
            .filter(|entry| {
                entry
                    .advices
                    .iter()
                    .any(|advice| advice.is_enabled() && advice.could_match_class(class))
            })
            .map(|entry| entry.key)
            .collect()
    }

    /// Advices applying to a join point, ordered by descending priority.
    ///
    /// Pointcut matches from `candidates` come first, then advices of aspects
    /// explicitly bound to the method; ties keep that discovery order. An advice
    /// selected both ways is applied once.
    pub fn applicable(
        &self,
        join_point: &JoinPoint,
        candidates: &[&'static str],
        bindings: &[MethodBinding],
    ) -> Vec<AppliedAdvice> {
        let aspects = self.snapshot();
        let find = |key: &str| aspects.iter().find(|entry| entry.key == key);

        let mut applied: Vec<AppliedAdvice> = Vec::new();
        for entry in candidates.iter().filter_map(|key| find(*key)) {
            for advice in &entry.advices {
                if advice.is_enabled() && advice.matches(&join_point.target, &join_point.method) {
                    applied.push(AppliedAdvice {
                        advice: advice.clone(),
                        config: None,
                    });
                }
            }
        }

        for binding in bindings.iter().filter(|b| b.method == join_point.method) {
            let Some(entry) = find(binding.aspect) else {
                tracing::warn!(
                    "{}.{} is bound to aspect {}, which is not registered - skipping",
                    join_point.target,
                    join_point.method,
                    binding.aspect
                );
                continue;
            };

            for advice in &entry.advices {
                let already_applied = applied
                    .iter()
                    .any(|existing| Arc::ptr_eq(&existing.advice, advice));
                if advice.is_enabled() && binding.selects(advice) && !already_applied {
                    applied.push(AppliedAdvice {
                        advice: advice.clone(),
                        config: binding.config.clone(),
                    });
                }
            }
        }

        // Stable - equal priorities keep discovery order
        applied.sort_by(|a, b| b.advice.priority().cmp(&a.advice.priority()));

        tracing::trace!(
            "{} advices apply to {}.{}",
            applied.len(),
            join_point.target,
            join_point.method
        );
        applied
    }

    /// Drops every registered aspect and clears the caller stack.
    ///
    /// Contexts never dispose aspect instances; this is where they are released.
    pub fn reset(&self) {
        self.lock().clear();
        self.0.callers.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<AspectEntry>>> {
        self.0.aspects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<Arc<AspectEntry>> {
        self.lock().clone()
    }
}

fn extract_advices<A: Aspect>(
    key: &'static str,
    instance: &Arc<A>,
) -> Result<Vec<Arc<Advice>>, AspectError> {
    A::advices()
        .into_iter()
        .map(|definition| {
            let pointcut = definition
                .pointcut
                .as_deref()
                .map(Pointcut::parse)
                .transpose()?;

            let method = instance
                .clone()
                .advice_method(&definition.method)
                .ok_or_else(|| AspectError::MissingAdviceMethod {
                    aspect: key,
                    method: definition.method.clone(),
                })?;

            if !method.fits(definition.kind) {
                return Err(AspectError::KindMismatch {
                    aspect: key,
                    method: definition.method.clone(),
                    kind: definition.kind,
                });
            }

            Ok(Arc::new(Advice {
                definition,
                pointcut,
                aspect: key,
                method,
            }))
        })
        .collect()
}
