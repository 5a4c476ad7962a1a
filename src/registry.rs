//! Schema registry - maps resource type keys to schema instances.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::RegistryError;
use crate::resource::Resource;
use crate::schema::Schema;

/// Closure building a schema on first use.
pub type SchemaFactory = Arc<dyn Fn(&SchemaRegistry) -> Arc<dyn Schema> + Send + Sync>;

/// Schema constructor, the counterpart of registering a schema type.
pub type SchemaConstructor = fn(&SchemaRegistry) -> Arc<dyn Schema>;

/// Schema types that can be built from the registry that owns them.
pub trait FromRegistry: Schema + Sized + 'static {
    fn from_registry(registry: &SchemaRegistry) -> Self;
}

/// Where a registered schema comes from.
#[derive(Clone)]
pub enum SchemaSource {
    /// Already built.
    Instance(Arc<dyn Schema>),
    /// Built by a closure on first use.
    Factory(SchemaFactory),
    /// Built by a constructor on first use.
    Constructor(SchemaConstructor),
}

impl SchemaSource {
    pub fn instance<S: Schema + 'static>(schema: S) -> Self {
        SchemaSource::Instance(Arc::new(schema))
    }

    pub fn factory<F>(f: F) -> Self
    where
        F: Fn(&SchemaRegistry) -> Arc<dyn Schema> + Send + Sync + 'static,
    {
        SchemaSource::Factory(Arc::new(f))
    }

    /// Build `S` through [`FromRegistry`] on first use.
    pub fn of<S: FromRegistry>() -> Self {
        SchemaSource::Constructor(construct::<S>)
    }
}

fn construct<S: FromRegistry>(registry: &SchemaRegistry) -> Arc<dyn Schema> {
    Arc::new(S::from_registry(registry))
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Instance(schema) => {
                write!(f, "Instance({:?})", schema.resource_type())
            }
            SchemaSource::Factory(_) => f.write_str("Factory(..)"),
            SchemaSource::Constructor(_) => f.write_str("Constructor(..)"),
        }
    }
}

/// Registry of schemas keyed by [`Resource::resource_type`].
///
/// Registration takes `&mut self` and happens at configuration time. Lookups
/// take `&self`; schemas are built lazily on first lookup and cached for the
/// registry's lifetime. Cache population is guarded by a lock, and
/// [`SchemaRegistry::warm`] builds everything up front.
pub struct SchemaRegistry {
    sources: IndexMap<String, SchemaSource>,
    cache: RwLock<HashMap<String, Arc<dyn Schema>>>,
    wire_types: RwLock<HashMap<String, String>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            sources: IndexMap::new(),
            cache: RwLock::new(HashMap::new()),
            wire_types: RwLock::new(HashMap::new()),
        }
    }

    /// Register a schema source for a type key.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::EmptyType` for an empty key,
    /// `RegistryError::AlreadyRegistered` for a duplicate key, or
    /// `RegistryError::EmptyWireType` if an instance reports an empty type.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        source: SchemaSource,
    ) -> Result<(), RegistryError> {
        let key = key.into();
        if key.is_empty() {
            return Err(RegistryError::EmptyType);
        }
        if self.sources.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered { key });
        }

        if let SchemaSource::Instance(schema) = &source {
            let wire_type = schema.resource_type();
            if wire_type.is_empty() {
                return Err(RegistryError::EmptyWireType { key });
            }
            self.wire_types
                .get_mut()
                .entry(wire_type.to_string())
                .or_insert_with(|| key.clone());
            self.cache.get_mut().insert(key.clone(), schema.clone());
        }

        debug!(key = %key, source = ?source, "registered schema");
        self.sources.insert(key, source);
        Ok(())
    }

    /// Register an already-built schema.
    pub fn register_schema<S: Schema + 'static>(
        &mut self,
        key: impl Into<String>,
        schema: S,
    ) -> Result<(), RegistryError> {
        self.register(key, SchemaSource::instance(schema))
    }

    /// Returns true if a schema can describe `resource`.
    pub fn has_schema(&self, resource: &dyn Resource) -> bool {
        self.key_for(resource).is_some()
    }

    /// Schema for `resource`.
    ///
    /// The resource's own type key wins; otherwise the first registration
    /// (in registration order) the resource accepts through
    /// [`Resource::is_kind`] is used.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownType` if nothing matches.
    pub fn get_schema(&self, resource: &dyn Resource) -> Result<Arc<dyn Schema>, RegistryError> {
        let key = self
            .key_for(resource)
            .ok_or_else(|| RegistryError::UnknownType {
                key: resource.resource_type().to_string(),
            })?;
        self.get_schema_by_type(key)
    }

    /// Schema registered under `key`, built on first use.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownType` if `key` was never registered, or
    /// `RegistryError::EmptyWireType` if the built schema has an empty type.
    pub fn get_schema_by_type(&self, key: &str) -> Result<Arc<dyn Schema>, RegistryError> {
        if let Some(schema) = self.cache.read().get(key) {
            trace!(key, "schema cache hit");
            return Ok(schema.clone());
        }

        let source = self
            .sources
            .get(key)
            .ok_or_else(|| RegistryError::UnknownType {
                key: key.to_string(),
            })?;

        // Built outside the lock: factories may look up other schemas.
        let built = match source {
            SchemaSource::Instance(schema) => schema.clone(),
            SchemaSource::Factory(factory) => factory(self),
            SchemaSource::Constructor(constructor) => constructor(self),
        };

        let wire_type = built.resource_type().to_string();
        if wire_type.is_empty() {
            return Err(RegistryError::EmptyWireType {
                key: key.to_string(),
            });
        }

        // First writer wins if two threads raced to build the same schema.
        let schema = self
            .cache
            .write()
            .entry(key.to_string())
            .or_insert(built)
            .clone();
        self.wire_types
            .write()
            .entry(wire_type.clone())
            .or_insert_with(|| key.to_string());

        debug!(key, wire_type = %wire_type, "instantiated schema");
        Ok(schema)
    }

    /// Schema whose wire type is `wire_type`.
    ///
    /// Schemas not yet built cannot be found by wire type, so on a miss every
    /// pending schema is built once before retrying.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownWireType` if no schema reports it.
    pub fn get_schema_by_wire_type(
        &self,
        wire_type: &str,
    ) -> Result<Arc<dyn Schema>, RegistryError> {
        if let Some(schema) = self.lookup_wire_type(wire_type)? {
            return Ok(schema);
        }

        self.warm()?;

        self.lookup_wire_type(wire_type)?
            .ok_or_else(|| RegistryError::UnknownWireType {
                wire_type: wire_type.to_string(),
            })
    }

    /// Build every registered schema that is not cached yet.
    ///
    /// Call before sharing the registry between threads to keep all cache
    /// writes out of the hot path.
    pub fn warm(&self) -> Result<(), RegistryError> {
        let pending: Vec<&String> = {
            let cache = self.cache.read();
            self.sources
                .keys()
                .filter(|key| !cache.contains_key(key.as_str()))
                .collect()
        };

        for key in pending {
            self.get_schema_by_type(key)?;
        }
        Ok(())
    }

    /// Number of registered type keys.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Registered type keys in registration order.
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    fn key_for(&self, resource: &dyn Resource) -> Option<&str> {
        let own = resource.resource_type();
        if let Some((key, _)) = self.sources.get_key_value(own) {
            return Some(key.as_str());
        }
        self.sources
            .keys()
            .find(|key| resource.is_kind(key))
            .map(String::as_str)
    }

    fn lookup_wire_type(&self, wire_type: &str) -> Result<Option<Arc<dyn Schema>>, RegistryError> {
        let key = self.wire_types.read().get(wire_type).cloned();
        key.map(|key| self.get_schema_by_type(&key)).transpose()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("sources", &self.sources)
            .field("cached", &self.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldSet;
    use serde_json::{Map, Value};
    use std::any::Any;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Named(&'static str);

    impl Resource for Named {
        fn resource_type(&self) -> &str {
            self.0
        }

        fn is_kind(&self, key: &str) -> bool {
            key == self.0 || (self.0 == "Editor" && key == "Person")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct WireSchema(&'static str);

    impl Schema for WireSchema {
        fn resource_type(&self) -> &str {
            self.0
        }

        fn id(&self, _resource: &dyn Resource) -> Option<String> {
            Some("1".into())
        }

        fn attributes(&self, _resource: &dyn Resource, _fields: &FieldSet) -> Map<String, Value> {
            Map::new()
        }
    }

    struct PeopleSchema;

    impl FromRegistry for PeopleSchema {
        fn from_registry(_registry: &SchemaRegistry) -> Self {
            PeopleSchema
        }
    }

    impl Schema for PeopleSchema {
        fn resource_type(&self) -> &str {
            "people"
        }

        fn id(&self, _resource: &dyn Resource) -> Option<String> {
            None
        }

        fn attributes(&self, _resource: &dyn Resource, _fields: &FieldSet) -> Map<String, Value> {
            Map::new()
        }
    }

    #[test]
    fn register_rejects_empty_key() {
        let mut registry = SchemaRegistry::new();
        let result = registry.register_schema("", WireSchema("people"));
        assert!(matches!(result, Err(RegistryError::EmptyType)));
    }

    #[test]
    fn register_rejects_duplicate_key() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema("Author", WireSchema("people")).unwrap();
        let result = registry.register("Author", SchemaSource::of::<PeopleSchema>());
        assert!(matches!(
            result,
            Err(RegistryError::AlreadyRegistered { key }) if key == "Author"
        ));
    }

    #[test]
    fn register_rejects_empty_wire_type_instance() {
        let mut registry = SchemaRegistry::new();
        let result = registry.register_schema("Author", WireSchema(""));
        assert!(matches!(result, Err(RegistryError::EmptyWireType { .. })));
    }

    #[test]
    fn factory_runs_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut registry = SchemaRegistry::new();
        registry
            .register(
                "Comment",
                SchemaSource::factory(|_| {
                    CALLS.fetch_add(1, Ordering::SeqCst);
                    Arc::new(WireSchema("comments")) as Arc<dyn Schema>
                }),
            )
            .unwrap();

        let first = registry.get_schema_by_type("Comment").unwrap();
        let second = registry.get_schema(&Named("Comment")).unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.resource_type(), "comments");
    }

    #[test]
    fn constructor_source() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("Author", SchemaSource::of::<PeopleSchema>())
            .unwrap();
        assert_eq!(
            registry.get_schema_by_type("Author").unwrap().resource_type(),
            "people"
        );
    }

    #[test]
    fn unknown_type_errors() {
        let registry = SchemaRegistry::new();
        let result = registry.get_schema_by_type("Ghost");
        assert!(matches!(
            result,
            Err(RegistryError::UnknownType { key }) if key == "Ghost"
        ));
        assert!(!registry.has_schema(&Named("Ghost")));
    }

    #[test]
    fn kind_fallback_in_registration_order() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema("Person", WireSchema("people")).unwrap();

        assert!(registry.has_schema(&Named("Editor")));
        let schema = registry.get_schema(&Named("Editor")).unwrap();
        assert_eq!(schema.resource_type(), "people");
    }

    #[test]
    fn wire_type_lookup_builds_pending_schemas() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("Author", SchemaSource::of::<PeopleSchema>())
            .unwrap();
        registry
            .register(
                "Comment",
                SchemaSource::factory(|_| Arc::new(WireSchema("comments")) as Arc<dyn Schema>),
            )
            .unwrap();

        let schema = registry.get_schema_by_wire_type("comments").unwrap();
        assert_eq!(schema.resource_type(), "comments");

        let result = registry.get_schema_by_wire_type("tags");
        assert!(matches!(
            result,
            Err(RegistryError::UnknownWireType { wire_type }) if wire_type == "tags"
        ));
    }

    #[test]
    fn instance_is_found_by_wire_type_immediately() {
        let mut registry = SchemaRegistry::new();
        registry.register_schema("Site", WireSchema("sites")).unwrap();
        assert!(registry.lookup_wire_type("sites").unwrap().is_some());
    }

    #[test]
    fn lazy_schema_with_empty_wire_type_errors() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("Blank", SchemaSource::factory(|_| Arc::new(WireSchema("")) as Arc<dyn Schema>))
            .unwrap();
        assert!(matches!(
            registry.get_schema_by_type("Blank"),
            Err(RegistryError::EmptyWireType { .. })
        ));
        assert!(registry.warm().is_err());
    }

    #[test]
    fn registry_is_shareable_across_threads() {
        let mut registry = SchemaRegistry::new();
        registry
            .register("Author", SchemaSource::of::<PeopleSchema>())
            .unwrap();
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    registry
                        .get_schema_by_type("Author")
                        .unwrap()
                        .resource_type()
                        .to_string()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "people");
        }
    }
}
