//! Document assembly - collects resources, relationships and errors and
//! renders them as a JSON:API document.
//!
//! Resources are added in two phases. `add_to_data`/`add_to_included` stage a
//! slot right away so relationships of other resources can point at it, and
//! `set_resource_completed` finalizes the slot once its own relationships are
//! known. Links and meta are fetched from the schema only at completion.

use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ErrorObject;
use crate::relationship::{ParsedIdentifier, ParsedResource};
use crate::types::{links_to_value, FieldSet, Links};

/// Handle to a staged resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Primary,
    Included,
}

/// Shape of the primary `data` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataShape {
    /// No primary data was staged; `data` is omitted.
    #[default]
    Absent,
    /// `data` is a single object, or `null` if nothing was added.
    Single,
    /// `data` is an array, possibly empty.
    Collection,
}

struct ResourceSlot {
    resource: Rc<ParsedResource>,
    role: Role,
    attributes: Map<String, Value>,
    relationships: Map<String, Value>,
    rendered: Option<Value>,
}

enum DataEntry {
    Resource(SlotId),
    Identifier(Value),
}

/// Rendering options of one relationship member.
#[derive(Debug, Clone, Default)]
pub struct RelationshipView {
    /// Rendered `links` member.
    pub links: Option<Value>,
    /// Rendered `meta` member.
    pub meta: Option<Value>,
    /// Whether the `data` member is rendered.
    pub show_data: bool,
}

/// Accumulates one document.
#[derive(Default)]
pub struct DocumentBuilder {
    url_prefix: String,
    slots: Vec<ResourceSlot>,
    data: Vec<DataEntry>,
    shape: DataShape,
    included: IndexMap<(String, String), SlotId>,
    has_included: bool,
    links: Links,
    meta: Option<Value>,
    jsonapi: Option<Value>,
    errors: Vec<ErrorObject>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose links are prefixed with `url_prefix`.
    pub fn with_url_prefix(url_prefix: impl Into<String>) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            ..Self::default()
        }
    }

    /// Record whether primary data is a single resource or a collection.
    pub fn set_data_shape(&mut self, shape: DataShape) {
        self.shape = shape;
    }

    /// Render `data` as `null`.
    pub fn set_null_data(&mut self) {
        self.data.clear();
        self.shape = DataShape::Single;
    }

    /// Render `data` as `[]`.
    pub fn set_empty_data(&mut self) {
        self.data.clear();
        self.shape = DataShape::Collection;
    }

    /// Stage a resource in primary data.
    ///
    /// Unlike `included`, primary data keeps duplicates.
    pub fn add_to_data(&mut self, resource: Rc<ParsedResource>, fields: &FieldSet) -> SlotId {
        let slot = self.push_slot(resource, Role::Primary, fields);
        self.data.push(DataEntry::Resource(slot));
        slot
    }

    /// Add a resource identifier to primary data.
    pub fn add_identifier_to_data(&mut self, identifier: &ParsedIdentifier) {
        self.data.push(DataEntry::Identifier(identifier.to_value()));
    }

    /// Stage a resource in `included`.
    ///
    /// Returns the existing slot if the `(type, id)` pair is already staged.
    pub fn add_to_included(&mut self, resource: Rc<ParsedResource>, fields: &FieldSet) -> SlotId {
        self.has_included = true;
        let key = resource.key();
        if let Some(slot) = self.included.get(&key) {
            return *slot;
        }
        let slot = self.push_slot(resource, Role::Included, fields);
        self.included.insert(key, slot);
        slot
    }

    /// Returns true if `(type, id)` is staged in `included`.
    pub fn is_included(&self, resource_type: &str, id: &str) -> bool {
        self.included
            .contains_key(&(resource_type.to_string(), id.to_string()))
    }

    /// Emit `included` even if nothing ends up in it.
    pub fn mark_included(&mut self) {
        self.has_included = true;
    }

    /// Relationship whose `data` is a single identifier.
    pub fn add_relationship_to_one(
        &mut self,
        parent: SlotId,
        name: &str,
        view: RelationshipView,
        target: &ParsedIdentifier,
    ) {
        self.attach(parent, name, view, target.to_value());
    }

    /// Relationship whose `data` is an array of identifiers.
    pub fn add_relationship_to_many(
        &mut self,
        parent: SlotId,
        name: &str,
        view: RelationshipView,
        targets: &[ParsedIdentifier],
    ) {
        let data = Value::Array(targets.iter().map(ParsedIdentifier::to_value).collect());
        self.attach(parent, name, view, data);
    }

    /// Relationship whose `data` is `[]`.
    pub fn add_empty_relationship(&mut self, parent: SlotId, name: &str, view: RelationshipView) {
        self.attach(parent, name, view, Value::Array(Vec::new()));
    }

    /// Relationship whose `data` is `null`.
    pub fn add_null_relationship(&mut self, parent: SlotId, name: &str, view: RelationshipView) {
        self.attach(parent, name, view, Value::Null);
    }

    /// Relationship rendered without a `data` member.
    pub fn add_relationship_without_data(
        &mut self,
        parent: SlotId,
        name: &str,
        view: RelationshipView,
    ) {
        let view = RelationshipView {
            show_data: false,
            ..view
        };
        self.attach(parent, name, view, Value::Null);
    }

    /// Finalize a staged resource. Later calls for the same slot are no-ops.
    pub fn set_resource_completed(&mut self, slot: SlotId) {
        let url_prefix = self.url_prefix.clone();
        let Some(entry) = self.slots.get_mut(slot.0) else {
            return;
        };
        if entry.rendered.is_some() {
            return;
        }

        let resource = entry.resource.clone();
        let schema = resource.schema();
        let raw = resource.resource();

        let mut object = Map::new();
        object.insert(
            "type".to_string(),
            Value::String(resource.resource_type().to_string()),
        );
        object.insert("id".to_string(), Value::String(resource.id().to_string()));

        if !entry.attributes.is_empty() {
            object.insert(
                "attributes".to_string(),
                Value::Object(std::mem::take(&mut entry.attributes)),
            );
        }

        let mut relationships = std::mem::take(&mut entry.relationships);
        if let Some(meta) = schema.relationships_meta(raw) {
            relationships.insert("meta".to_string(), meta);
        }
        if !relationships.is_empty() {
            object.insert("relationships".to_string(), Value::Object(relationships));
        }

        if let Some(links) = links_to_value(&schema.links(raw), &url_prefix) {
            object.insert("links".to_string(), links);
        }

        let meta = match entry.role {
            Role::Primary => schema.primary_meta(raw),
            Role::Included => schema.inclusion_meta(raw),
        };
        if let Some(meta) = meta {
            object.insert("meta".to_string(), meta);
        }

        trace!(
            wire_type = resource.resource_type(),
            id = resource.id(),
            "resource completed"
        );
        entry.rendered = Some(Value::Object(object));
    }

    /// Top-level `meta`.
    pub fn set_meta(&mut self, meta: Value) {
        self.meta = Some(meta);
    }

    /// Top-level `links`.
    pub fn set_links(&mut self, links: Links) {
        self.links = links;
    }

    /// Top-level `jsonapi` object.
    pub fn set_jsonapi(&mut self, version: Option<&str>, meta: Option<Value>) {
        let mut object = Map::new();
        if let Some(version) = version {
            object.insert("version".to_string(), Value::String(version.to_string()));
        }
        if let Some(meta) = meta {
            object.insert("meta".to_string(), meta);
        }
        self.jsonapi = Some(Value::Object(object));
    }

    /// Add an error. Once any error is present, staged data, included
    /// resources and top-level links are no longer rendered.
    pub fn add_error(&mut self, error: ErrorObject) {
        self.errors.push(error);
    }

    pub fn add_errors<I>(&mut self, errors: I)
    where
        I: IntoIterator<Item = ErrorObject>,
    {
        self.errors.extend(errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render the document.
    pub fn render(mut self) -> Value {
        let mut document = Map::new();

        if let Some(jsonapi) = self.jsonapi.take() {
            document.insert("jsonapi".to_string(), jsonapi);
        }
        if let Some(meta) = self.meta.take() {
            document.insert("meta".to_string(), meta);
        }

        if !self.errors.is_empty() {
            let errors = self.errors.iter().map(ErrorObject::to_value).collect();
            document.insert("errors".to_string(), Value::Array(errors));
            return Value::Object(document);
        }

        if let Some(links) = links_to_value(&self.links, &self.url_prefix) {
            document.insert("links".to_string(), links);
        }

        for index in 0..self.slots.len() {
            self.set_resource_completed(SlotId(index));
        }

        let data: Vec<Value> = std::mem::take(&mut self.data)
            .into_iter()
            .map(|entry| match entry {
                DataEntry::Resource(slot) => self.take_rendered(slot),
                DataEntry::Identifier(value) => value,
            })
            .collect();

        match self.shape {
            DataShape::Absent => {}
            DataShape::Single => {
                let single = data.into_iter().next().unwrap_or(Value::Null);
                document.insert("data".to_string(), single);
            }
            DataShape::Collection => {
                document.insert("data".to_string(), Value::Array(data));
            }
        }

        if self.has_included {
            let included = std::mem::take(&mut self.included)
                .into_values()
                .map(|slot| self.take_rendered(slot))
                .collect();
            document.insert("included".to_string(), Value::Array(included));
        }

        Value::Object(document)
    }

    fn push_slot(&mut self, resource: Rc<ParsedResource>, role: Role, fields: &FieldSet) -> SlotId {
        let attributes = resource.attributes(fields);
        let slot = SlotId(self.slots.len());
        self.slots.push(ResourceSlot {
            resource,
            role,
            attributes,
            relationships: Map::new(),
            rendered: None,
        });
        slot
    }

    fn attach(&mut self, parent: SlotId, name: &str, view: RelationshipView, data: Value) {
        let Some(entry) = self.slots.get_mut(parent.0) else {
            return;
        };

        let mut member = Map::new();
        if let Some(links) = view.links {
            member.insert("links".to_string(), links);
        }
        if view.show_data {
            member.insert("data".to_string(), data);
        }
        if let Some(meta) = view.meta {
            member.insert("meta".to_string(), meta);
        }

        // A relationship object needs at least one of links, data or meta.
        if !member.is_empty() {
            entry
                .relationships
                .insert(name.to_string(), Value::Object(member));
        }
    }

    fn take_rendered(&self, slot: SlotId) -> Value {
        self.slots
            .get(slot.0)
            .and_then(|entry| entry.rendered.clone())
            .unwrap_or(Value::Null)
    }
}
