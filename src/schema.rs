//! The schema capability: how one resource type is exposed on the wire.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::resource::{Resource, ResourceRef};
use crate::types::{Deferred, FieldSet, IncludePaths, Link, Links, Position, ResourceIdentifier, Thunk};

/// Describes one resource type: its wire type, id, attributes,
/// relationships, links and meta.
///
/// Implementations must be stateless per call; a registry shares one
/// instance across every encode.
pub trait Schema: Send + Sync {
    /// The JSON:API `type` member. Must not be empty.
    fn resource_type(&self) -> &str;

    /// The JSON:API `id` member.
    fn id(&self, resource: &dyn Resource) -> Option<String>;

    /// Attributes of the resource.
    ///
    /// `fields` is the requested field set for this type. Implementations may
    /// use it to skip expensive values; the encoder filters the result again.
    fn attributes(&self, resource: &dyn Resource, fields: &FieldSet) -> Map<String, Value>;

    /// Relationship descriptors in declaration order.
    fn relationships(
        &self,
        _resource: &dyn Resource,
        _context: &RelationshipContext<'_>,
    ) -> Relationships {
        Relationships::new()
    }

    /// Include paths, relative to this resource, expanded even when the
    /// request does not name them.
    fn default_include_paths(&self) -> Vec<String> {
        Vec::new()
    }

    /// Base URL of the resource, used for relationship `self`/`related` links.
    fn self_url(&self, resource: &dyn Resource) -> String {
        format!(
            "/{}/{}",
            self.resource_type(),
            self.id(resource).unwrap_or_default()
        )
    }

    /// Resource-level links.
    fn links(&self, _resource: &dyn Resource) -> Links {
        Links::new()
    }

    /// Meta of the resource when it appears in primary data.
    fn primary_meta(&self, _resource: &dyn Resource) -> Option<Value> {
        None
    }

    /// Meta of the resource when it appears in `included`.
    fn inclusion_meta(&self, _resource: &dyn Resource) -> Option<Value> {
        None
    }

    /// Meta of the resource identifier used in relationship linkage.
    fn linkage_meta(&self, _resource: &dyn Resource) -> Option<Value> {
        None
    }

    /// Meta placed inside the resource's `relationships` object.
    fn relationships_meta(&self, _resource: &dyn Resource) -> Option<Value> {
        None
    }
}

/// Relationship descriptors keyed by name, in declaration order.
pub type Relationships = IndexMap<String, Relationship>;

/// What a schema knows while building relationships for one resource.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipContext<'a> {
    position: &'a Position,
    is_primary: bool,
    include: &'a IncludePaths,
}

impl<'a> RelationshipContext<'a> {
    pub fn new(position: &'a Position, is_primary: bool, include: &'a IncludePaths) -> Self {
        Self {
            position,
            is_primary,
            include,
        }
    }

    pub fn position(&self) -> &Position {
        self.position
    }

    /// True when the resource is part of primary data.
    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    /// True when relationship `name` will be expanded into `included`.
    pub fn is_included(&self, name: &str) -> bool {
        self.include.contains(name)
    }

    /// Include paths requested below this resource.
    pub fn include_paths(&self) -> &IncludePaths {
        self.include
    }
}

/// Raw relationship value supplied by a schema.
pub enum Linkage {
    Null,
    Resource(ResourceRef),
    Identifier(ResourceIdentifier),
    /// To-many relationship. Elements are classified independently, so one
    /// relationship may mix resources of several types and bare identifiers.
    Collection(Vec<Related>),
    /// Computed only when the relationship is inspected.
    Deferred(Thunk<Linkage>),
}

/// One element of a to-many relationship.
pub enum Related {
    Resource(ResourceRef),
    Identifier(ResourceIdentifier),
}

impl Linkage {
    pub fn deferred<F>(f: F) -> Self
    where
        F: FnOnce() -> Linkage + 'static,
    {
        Linkage::Deferred(Box::new(f))
    }

    /// To-many linkage from resources.
    pub fn many<I>(resources: I) -> Self
    where
        I: IntoIterator<Item = ResourceRef>,
    {
        Linkage::Collection(resources.into_iter().map(Related::Resource).collect())
    }

    /// Run deferred thunks until a concrete value remains.
    pub fn resolve(self) -> Linkage {
        let mut linkage = self;
        while let Linkage::Deferred(thunk) = linkage {
            linkage = thunk();
        }
        linkage
    }
}

impl From<ResourceRef> for Linkage {
    fn from(resource: ResourceRef) -> Self {
        Linkage::Resource(resource)
    }
}

impl From<Option<ResourceRef>> for Linkage {
    fn from(resource: Option<ResourceRef>) -> Self {
        resource.map_or(Linkage::Null, Linkage::Resource)
    }
}

impl From<ResourceIdentifier> for Linkage {
    fn from(identifier: ResourceIdentifier) -> Self {
        Linkage::Identifier(identifier)
    }
}

impl From<Vec<ResourceRef>> for Linkage {
    fn from(resources: Vec<ResourceRef>) -> Self {
        Linkage::many(resources)
    }
}

impl From<Vec<Related>> for Linkage {
    fn from(elements: Vec<Related>) -> Self {
        Linkage::Collection(elements)
    }
}

/// A relationship as declared by a schema for one resource.
pub struct Relationship {
    pub(crate) data: Option<Linkage>,
    pub(crate) links: Links,
    pub(crate) meta: Option<Deferred<Value>>,
    pub(crate) show_self: bool,
    pub(crate) show_related: bool,
    pub(crate) show_data: bool,
}

impl Relationship {
    /// Relationship whose `data` member is rendered from `data`.
    pub fn new(data: impl Into<Linkage>) -> Self {
        Self {
            data: Some(data.into()),
            links: Links::new(),
            meta: None,
            show_self: false,
            show_related: false,
            show_data: true,
        }
    }

    /// Relationship without data, rendered through links and meta only.
    pub fn without_data() -> Self {
        Self {
            data: None,
            show_data: false,
            ..Self::new(Linkage::Null)
        }
    }

    /// Relationship whose data is computed only when it is inspected.
    pub fn lazy<F>(f: F) -> Self
    where
        F: FnOnce() -> Linkage + 'static,
    {
        Self::new(Linkage::deferred(f))
    }

    pub fn with_link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(Deferred::Ready(meta));
        self
    }

    pub fn with_lazy_meta<F>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Value + 'static,
    {
        self.meta = Some(Deferred::lazy(f));
        self
    }

    /// Render a `self` link (`{self_url}/relationships/{name}`).
    pub fn show_self(mut self, show: bool) -> Self {
        self.show_self = show;
        self
    }

    /// Render a `related` link (`{self_url}/{name}`).
    pub fn show_related(mut self, show: bool) -> Self {
        self.show_related = show;
        self
    }

    /// Render the `data` member. When false and the relationship is not
    /// included, its data is never evaluated.
    pub fn show_data(mut self, show: bool) -> Self {
        self.show_data = show;
        self
    }
}
