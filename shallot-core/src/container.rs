// Type-keyed dependency container with parent delegation

use crate::logging::{debug, trace};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    type_id: TypeId,
    tag: Option<&'static str>,
}

impl Key {
    fn of<T: ?Sized + 'static>(tag: Option<&'static str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            tag,
        }
    }
}

struct Binding {
    /// Always an `Arc<T>` for the `T` the key was built from.
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// The injector.
///
/// Values are stored as `Arc<T>` keyed by `T` (and an optional tag). A lookup
/// that misses locally is delegated to the parent, so a container forked for
/// a request sees everything bound on the application container while its own
/// bindings shadow the parent's for as long as it lives.
///
/// The parent is borrowed, which ties a forked container to the lifetime of
/// the one it was forked from.
///
/// ```
/// use shallot_core::Container;
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// let mut app = Container::new();
/// app.bind(42u32);
/// app.bind_as::<dyn Greeter>(Arc::new(English));
///
/// let mut request = Container::fork(&app);
/// request.bind(7u32);
///
/// assert_eq!(*request.resolve::<u32>().unwrap(), 7);
/// assert_eq!(*app.resolve::<u32>().unwrap(), 42);
/// assert_eq!(request.resolve::<dyn Greeter>().unwrap().greet(), "hello");
/// ```
pub struct Container<'p> {
    bindings: HashMap<Key, Binding>,
    parent: Option<&'p Container<'p>>,
}

impl Container<'static> {
    /// Create a root container.
    pub fn new() -> Self {
        debug!("Creating root container");
        Self {
            bindings: HashMap::new(),
            parent: None,
        }
    }
}

impl<'p> Container<'p> {
    /// Create an empty container whose misses are delegated to `parent`.
    pub fn fork(parent: &'p Container<'p>) -> Self {
        trace!(parent_bindings = parent.len(), "Forking container");
        Self {
            bindings: HashMap::new(),
            parent: Some(parent),
        }
    }

    pub fn parent(&self) -> Option<&'p Container<'p>> {
        self.parent
    }

    /// Bind a value under its concrete type. Rebinding replaces.
    pub fn bind<T: Send + Sync + 'static>(&mut self, value: T) {
        self.insert::<T>(None, Arc::new(value));
    }

    /// Bind a shared value under an explicitly chosen type, typically a trait
    /// object: `bind_as::<dyn Render>(Arc::new(Html))`.
    pub fn bind_as<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.insert::<T>(None, value);
    }

    /// Bind a value under its concrete type and a tag, so several values of
    /// one type can coexist.
    pub fn bind_tagged<T: Send + Sync + 'static>(&mut self, tag: &'static str, value: T) {
        self.insert::<T>(Some(tag), Arc::new(value));
    }

    pub fn bind_tagged_as<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        tag: &'static str,
        value: Arc<T>,
    ) {
        self.insert::<T>(Some(tag), value);
    }

    fn insert<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        tag: Option<&'static str>,
        value: Arc<T>,
    ) {
        let type_name = std::any::type_name::<T>();
        let replaced = self
            .bindings
            .insert(
                Key::of::<T>(tag),
                Binding {
                    value: Box::new(value),
                    type_name,
                },
            )
            .is_some();

        debug!(binding = type_name, tag = ?tag, replaced, "Value bound in container");
    }

    /// Look `T` up locally, then along the parent chain.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.lookup::<T>(None)
    }

    pub fn resolve_tagged<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: &'static str,
    ) -> Option<Arc<T>> {
        self.lookup::<T>(Some(tag))
    }

    fn lookup<T: ?Sized + Send + Sync + 'static>(
        &self,
        tag: Option<&'static str>,
    ) -> Option<Arc<T>> {
        let key = Key::of::<T>(tag);
        let mut depth = 0usize;
        let mut current = Some(self);

        while let Some(container) = current {
            if let Some(binding) = container.bindings.get(&key) {
                trace!(binding = binding.type_name, depth, "Resolved from container");
                return binding.value.downcast_ref::<Arc<T>>().cloned();
            }
            current = container.parent;
            depth += 1;
        }

        trace!(binding = std::any::type_name::<T>(), tag = ?tag, "Not bound in container chain");
        None
    }

    /// Whether `T` resolves anywhere along the chain.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let key = Key::of::<T>(None);
        let mut current = Some(self);
        while let Some(container) = current {
            if container.bindings.contains_key(&key) {
                return true;
            }
            current = container.parent;
        }
        false
    }

    /// Whether `T` is bound on this container itself.
    pub fn contains_local<T: ?Sized + 'static>(&self) -> bool {
        self.bindings.contains_key(&Key::of::<T>(None))
    }

    /// Remove a local binding. A parent binding for the same type becomes
    /// visible again; the parent itself is never touched.
    pub fn unbind<T: ?Sized + Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        let binding = self.bindings.remove(&Key::of::<T>(None))?;
        debug!(binding = binding.type_name, "Value unbound from container");
        binding.value.downcast::<Arc<T>>().ok().map(|value| *value)
    }

    /// Number of local bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Container<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.bindings.values().map(|b| b.type_name).collect();
        names.sort_unstable();
        f.debug_struct("Container")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
