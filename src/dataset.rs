//! Datasets - resource graphs and their schemas described in JSON.
//!
//! A dataset file declares one schema per wire type and a flat list of
//! records. Relationships reference other records by `{type, id}`; references
//! to records that are not in the file render as bare identifiers.
//!
//! ```json
//! {
//!   "schemas": {
//!     "people": {
//!       "attributes": ["firstName", "lastName"],
//!       "relationships": { "comments": { "showRelated": true } }
//!     },
//!     "comments": { "relationships": { "author": {} } }
//!   },
//!   "resources": [
//!     { "type": "people", "id": "9",
//!       "attributes": { "firstName": "Dan", "lastName": "Gebhardt" },
//!       "relationships": { "comments": [{ "type": "comments", "id": "5" }] } },
//!     { "type": "comments", "id": "5",
//!       "attributes": { "body": "First!" },
//!       "relationships": { "author": { "type": "people", "id": "9" } } }
//!   ]
//! }
//! ```

use std::any::Any;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DatasetError;
use crate::registry::{SchemaRegistry, SchemaSource};
use crate::resource::{Resource, ResourceRef};
use crate::schema::{Linkage, Related, Relationship, RelationshipContext, Relationships, Schema};
use crate::types::{FieldSet, Link, Links, ResourceIdentifier};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatasetFile {
    #[serde(default)]
    schemas: IndexMap<String, SchemaConfig>,
    #[serde(default)]
    resources: Vec<RecordData>,
}

/// Declarative description of one wire type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SchemaConfig {
    /// Attributes to expose, in this order. All record attributes when absent.
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
    #[serde(default)]
    pub relationships: IndexMap<String, RelationshipConfig>,
    #[serde(default)]
    pub default_include: Vec<String>,
    /// Template for the resource URL; `{type}` and `{id}` are substituted.
    #[serde(default)]
    pub self_url: Option<String>,
    /// Resource links as templates, like `self_url`.
    #[serde(default)]
    pub links: IndexMap<String, String>,
    #[serde(default)]
    pub relationships_meta: Option<Value>,
    #[serde(default)]
    pub inclusion_meta: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelationshipConfig {
    #[serde(default)]
    pub show_self: bool,
    #[serde(default)]
    pub show_related: bool,
    #[serde(default = "default_show_data")]
    pub show_data: bool,
    #[serde(default)]
    pub meta: Option<Value>,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            show_self: false,
            show_related: false,
            show_data: true,
            meta: None,
        }
    }
}

fn default_show_data() -> bool {
    true
}

/// One record of a dataset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordData {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub relationships: IndexMap<String, Option<RecordLinkage>>,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// Relationship value of a record: one reference or a list of them.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordLinkage {
    Many(Vec<RecordRef>),
    One(RecordRef),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    #[serde(default)]
    pub meta: Option<Value>,
}

/// A dataset record as a resource. Its type key is its wire type.
#[derive(Debug, Clone)]
pub struct Record {
    data: Arc<RecordData>,
}

impl Record {
    pub fn kind(&self) -> &str {
        &self.data.kind
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.data.attributes
    }
}

impl Resource for Record {
    fn resource_type(&self) -> &str {
        &self.data.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Default)]
struct RecordStore {
    records: IndexMap<(String, String), Arc<RecordData>>,
}

impl RecordStore {
    fn get(&self, kind: &str, id: &str) -> Option<Arc<RecordData>> {
        self.records
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    fn related(&self, reference: &RecordRef) -> Related {
        match self.get(&reference.kind, &reference.id) {
            Some(data) => Related::Resource(Rc::new(Record { data })),
            None => Related::Identifier(identifier(reference)),
        }
    }

    fn linkage(&self, linkage: Option<&RecordLinkage>) -> Linkage {
        match linkage {
            None => Linkage::Null,
            Some(RecordLinkage::One(reference)) => match self.related(reference) {
                Related::Resource(resource) => Linkage::Resource(resource),
                Related::Identifier(identifier) => Linkage::Identifier(identifier),
            },
            Some(RecordLinkage::Many(references)) => Linkage::Collection(
                references
                    .iter()
                    .map(|reference| self.related(reference))
                    .collect(),
            ),
        }
    }
}

fn identifier(reference: &RecordRef) -> ResourceIdentifier {
    let identifier = ResourceIdentifier::new(reference.kind.as_str(), reference.id.as_str());
    match &reference.meta {
        Some(meta) => identifier.with_meta(meta.clone()),
        None => identifier,
    }
}

/// Schema of one dataset wire type.
pub struct RecordSchema {
    wire_type: String,
    config: SchemaConfig,
    store: Arc<RecordStore>,
}

impl RecordSchema {
    fn expand(&self, template: &str, record: &Record) -> String {
        template
            .replace("{type}", &self.wire_type)
            .replace("{id}", record.id())
    }
}

impl Schema for RecordSchema {
    fn resource_type(&self) -> &str {
        &self.wire_type
    }

    fn id(&self, resource: &dyn Resource) -> Option<String> {
        resource
            .downcast_ref::<Record>()
            .map(|record| record.id().to_string())
    }

    fn attributes(&self, resource: &dyn Resource, fields: &FieldSet) -> Map<String, Value> {
        let Some(record) = resource.downcast_ref::<Record>() else {
            return Map::new();
        };
        match &self.config.attributes {
            None => record.attributes().clone(),
            Some(names) => names
                .iter()
                .filter(|name| fields.allows(name))
                .filter_map(|name| {
                    record
                        .attributes()
                        .get(name)
                        .map(|value| (name.clone(), value.clone()))
                })
                .collect(),
        }
    }

    fn relationships(
        &self,
        resource: &dyn Resource,
        _context: &RelationshipContext<'_>,
    ) -> Relationships {
        let mut relationships = Relationships::new();
        let Some(record) = resource.downcast_ref::<Record>() else {
            return relationships;
        };

        for (name, config) in &self.config.relationships {
            let relationship = match record.data.relationships.get(name) {
                Some(linkage) => {
                    let linkage = linkage.clone();
                    let store = self.store.clone();
                    Relationship::lazy(move || store.linkage(linkage.as_ref()))
                        .show_data(config.show_data)
                }
                None => Relationship::without_data(),
            };
            let relationship = relationship
                .show_self(config.show_self)
                .show_related(config.show_related);
            let relationship = match &config.meta {
                Some(meta) => relationship.with_meta(meta.clone()),
                None => relationship,
            };
            relationships.insert(name.clone(), relationship);
        }
        relationships
    }

    fn default_include_paths(&self) -> Vec<String> {
        self.config.default_include.clone()
    }

    fn self_url(&self, resource: &dyn Resource) -> String {
        let Some(record) = resource.downcast_ref::<Record>() else {
            return format!("/{}", self.wire_type);
        };
        match &self.config.self_url {
            Some(template) => self.expand(template, record),
            None => format!("/{}/{}", self.wire_type, record.id()),
        }
    }

    fn links(&self, resource: &dyn Resource) -> Links {
        let Some(record) = resource.downcast_ref::<Record>() else {
            return Links::new();
        };
        self.config
            .links
            .iter()
            .map(|(name, template)| (name.clone(), Link::new(self.expand(template, record))))
            .collect()
    }

    fn primary_meta(&self, resource: &dyn Resource) -> Option<Value> {
        resource
            .downcast_ref::<Record>()
            .and_then(|record| record.data.meta.clone())
    }

    fn inclusion_meta(&self, resource: &dyn Resource) -> Option<Value> {
        self.config
            .inclusion_meta
            .clone()
            .or_else(|| self.primary_meta(resource))
    }

    fn relationships_meta(&self, _resource: &dyn Resource) -> Option<Value> {
        self.config.relationships_meta.clone()
    }
}

/// A loaded dataset: its records and a registry with one schema per type.
pub struct Dataset {
    registry: SchemaRegistry,
    store: Arc<RecordStore>,
}

impl Dataset {
    /// Load a dataset from a file path.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::FileNotFound` if the file doesn't exist,
    /// `DatasetError::InvalidJson` if it isn't valid JSON, or
    /// `DatasetError::InvalidDataset` if its content is inconsistent.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Load a dataset from a JSON string.
    ///
    /// # Errors
    ///
    /// Same as [`Dataset::load`], minus IO errors.
    pub fn parse(content: &str) -> Result<Self, DatasetError> {
        let value: Value =
            serde_json::from_str(content).map_err(|source| DatasetError::InvalidJson { source })?;
        Self::from_value(value)
    }

    /// Build a dataset from parsed JSON.
    ///
    /// # Errors
    ///
    /// Returns `DatasetError::InvalidDataset` for unknown members, records of
    /// a type without schema, duplicate records, or relationships the
    /// record's schema does not declare.
    pub fn from_value(value: Value) -> Result<Self, DatasetError> {
        let file: DatasetFile =
            serde_json::from_value(value).map_err(|e| DatasetError::InvalidDataset {
                message: e.to_string(),
            })?;

        let mut store = RecordStore::default();
        for record in file.resources {
            let Some(schema) = file.schemas.get(&record.kind) else {
                return Err(invalid(format!(
                    "resource '{}' has type '{}' with no schema",
                    record.id, record.kind
                )));
            };
            if let Some(name) = record
                .relationships
                .keys()
                .find(|name| !schema.relationships.contains_key(*name))
            {
                return Err(invalid(format!(
                    "resource '{}' of type '{}' has undeclared relationship '{}'",
                    record.id, record.kind, name
                )));
            }

            let key = (record.kind.clone(), record.id.clone());
            if store.records.contains_key(&key) {
                return Err(invalid(format!(
                    "duplicate resource '{}' of type '{}'",
                    record.id, record.kind
                )));
            }
            store.records.insert(key, Arc::new(record));
        }

        let store = Arc::new(store);
        let mut registry = SchemaRegistry::new();
        for (wire_type, config) in file.schemas {
            let schema = RecordSchema {
                wire_type: wire_type.clone(),
                config,
                store: store.clone(),
            };
            registry.register(wire_type, SchemaSource::instance(schema))?;
        }

        debug!(
            schemas = registry.len(),
            records = store.records.len(),
            "loaded dataset"
        );
        Ok(Self { registry, store })
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Records of a wire type, in file order.
    pub fn records_of(&self, wire_type: &str) -> Vec<ResourceRef> {
        self.store
            .records
            .values()
            .filter(|data| data.kind == wire_type)
            .map(|data| Rc::new(Record { data: data.clone() }) as ResourceRef)
            .collect()
    }

    /// Every record, in file order.
    pub fn records(&self) -> Vec<ResourceRef> {
        self.store
            .records
            .values()
            .map(|data| Rc::new(Record { data: data.clone() }) as ResourceRef)
            .collect()
    }

    pub fn find(&self, wire_type: &str, id: &str) -> Option<ResourceRef> {
        self.store
            .get(wire_type, id)
            .map(|data| Rc::new(Record { data }) as ResourceRef)
    }

    /// Declared wire types, in file order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.registry.registered_types()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.store.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.records.is_empty()
    }
}

fn invalid(message: String) -> DatasetError {
    DatasetError::InvalidDataset { message }
}
