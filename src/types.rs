//! Core types shared by the registry, walker and document builder.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Separator between relationship names in an include path.
pub const PATH_SEPARATOR: char = '.';

/// Allow-list of fields rendered for one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldSet {
    /// Every attribute and relationship is rendered.
    #[default]
    All,
    /// Only the named members are rendered. An empty set hides everything.
    Only(BTreeSet<String>),
}

static ALL_FIELDS: FieldSet = FieldSet::All;

impl FieldSet {
    /// Build a restricted field set from member names.
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldSet::Only(fields.into_iter().map(Into::into).collect())
    }

    /// Returns true if the named member passes the filter.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            FieldSet::All => true,
            FieldSet::Only(fields) => fields.contains(name),
        }
    }

    /// Keep only the allowed entries of an attribute map.
    pub fn filter(&self, attributes: Map<String, Value>) -> Map<String, Value> {
        match self {
            FieldSet::All => attributes,
            FieldSet::Only(_) => attributes
                .into_iter()
                .filter(|(name, _)| self.allows(name))
                .collect(),
        }
    }
}

/// Include paths arranged as a tree of relationship names.
///
/// `comments.author` and `comments.site` share the `comments` node, so every
/// intermediate relationship on a requested path is part of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncludePaths {
    children: IndexMap<String, IncludePaths>,
}

impl IncludePaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from dot-separated paths. Empty segments are skipped.
    pub fn parse<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for path in paths {
            tree.insert(path.as_ref());
        }
        tree
    }

    /// Add one dot-separated path.
    pub fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split(PATH_SEPARATOR).filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    /// Merge another tree into this one.
    pub fn merge(&mut self, other: &IncludePaths) {
        for (name, subtree) in &other.children {
            self.children.entry(name.clone()).or_default().merge(subtree);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Returns true if the relationship `name` is requested at this level.
    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// The subtree requested below relationship `name`.
    pub fn child(&self, name: &str) -> Option<&IncludePaths> {
        self.children.get(name)
    }

    /// The part of this tree not already present in `covered`.
    pub fn difference(&self, covered: &IncludePaths) -> IncludePaths {
        let mut remaining = IncludePaths::new();
        for (name, subtree) in &self.children {
            let rest = match covered.children.get(name) {
                Some(done) => {
                    let rest = subtree.difference(done);
                    if rest.is_empty() {
                        continue;
                    }
                    rest
                }
                None => subtree.clone(),
            };
            remaining.children.insert(name.clone(), rest);
        }
        remaining
    }

    /// Relationship names requested at this level, in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Flatten back into dot paths, one per node.
    pub fn to_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_paths("", &mut paths);
        paths
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (name, subtree) in &self.children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}{PATH_SEPARATOR}{name}")
            };
            out.push(path.clone());
            subtree.collect_paths(&path, out);
        }
    }
}

/// Already-parsed request parameters that drive an encode.
#[derive(Debug, Clone, Default)]
pub struct EncodingParameters {
    /// Relationship paths to expand into `included`.
    pub include_paths: IncludePaths,
    /// Per wire type field filters. Types without an entry render everything.
    pub field_sets: HashMap<String, FieldSet>,
}

impl EncodingParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an include path (e.g. `comments.author`).
    pub fn include(mut self, path: &str) -> Self {
        self.include_paths.insert(path);
        self
    }

    /// Restrict the fields rendered for `wire_type`.
    pub fn fields<I, S>(mut self, wire_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_sets
            .insert(wire_type.into(), FieldSet::only(fields));
        self
    }

    /// Field set for a wire type, `FieldSet::All` when none was requested.
    pub fn field_set(&self, wire_type: &str) -> &FieldSet {
        self.field_sets.get(wire_type).unwrap_or(&ALL_FIELDS)
    }
}

/// Bare `{type, id}` reference to a resource, optionally with meta.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceIdentifier {
    pub resource_type: String,
    pub id: String,
    pub meta: Option<Value>,
}

impl ResourceIdentifier {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// A JSON:API link, rendered as a string or as `{href, meta}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    href: String,
    meta: Option<Value>,
    absolute: bool,
}

impl Link {
    /// Link relative to the encoder's URL prefix.
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            meta: None,
            absolute: false,
        }
    }

    /// Link rendered verbatim, never prefixed.
    pub fn absolute(href: impl Into<String>) -> Self {
        Self {
            absolute: true,
            ..Self::new(href)
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    /// Render the link, prepending `url_prefix` to relative hrefs.
    pub fn to_value(&self, url_prefix: &str) -> Value {
        let href = if self.absolute {
            self.href.clone()
        } else {
            format!("{url_prefix}{}", self.href)
        };

        match &self.meta {
            None => Value::String(href),
            Some(meta) => {
                let mut object = Map::new();
                object.insert("href".to_string(), Value::String(href));
                object.insert("meta".to_string(), meta.clone());
                Value::Object(object)
            }
        }
    }
}

/// Named links in declaration order.
pub type Links = IndexMap<String, Link>;

/// Render a links map. Returns `None` for an empty map.
pub fn links_to_value(links: &Links, url_prefix: &str) -> Option<Value> {
    if links.is_empty() {
        return None;
    }
    let object: Map<String, Value> = links
        .iter()
        .map(|(name, link)| (name.clone(), link.to_value(url_prefix)))
        .collect();
    Some(Value::Object(object))
}

/// Zero-argument closure producing a value on demand.
pub type Thunk<T> = Box<dyn FnOnce() -> T>;

/// A value that is either ready or computed by a thunk.
///
/// The thunk is consumed by [`Deferred::resolve`], so it runs at most once.
pub enum Deferred<T> {
    Ready(T),
    Lazy(Thunk<T>),
}

impl<T> Deferred<T> {
    pub fn lazy<F>(f: F) -> Self
    where
        F: FnOnce() -> T + 'static,
    {
        Deferred::Lazy(Box::new(f))
    }

    pub fn resolve(self) -> T {
        match self {
            Deferred::Ready(value) => value,
            Deferred::Lazy(thunk) => thunk(),
        }
    }
}

impl<T> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Deferred::Ready(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Deferred::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Location of a traversal step relative to the primary data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    level: usize,
    path: String,
    parent_type: Option<String>,
    relationship_name: Option<String>,
}

impl Position {
    /// Position of primary data.
    pub fn root() -> Self {
        Self::default()
    }

    /// Position reached by following `name` on a resource of `parent_type`.
    pub fn child(&self, parent_type: &str, name: &str) -> Self {
        Self {
            level: self.level + 1,
            path: self.compound(name),
            parent_type: Some(parent_type.to_string()),
            relationship_name: Some(name.to_string()),
        }
    }

    /// Path of relationship `name` below this position.
    pub fn compound(&self, name: &str) -> String {
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}{PATH_SEPARATOR}{name}", self.path)
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_type(&self) -> Option<&str> {
        self.parent_type.as_deref()
    }

    pub fn relationship_name(&self) -> Option<&str> {
        self.relationship_name.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.level == 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str("(primary data)")
        } else {
            f.write_str(&self.path)
        }
    }
}

/// Encoder configuration.
#[derive(Debug, Clone, Default)]
pub struct EncoderOptions {
    /// Prepended to every relative link.
    pub url_prefix: String,
    /// When set, the document carries `{"jsonapi": {"version": ...}}`.
    pub jsonapi_version: Option<String>,
    /// Meta placed inside the `jsonapi` object.
    pub jsonapi_meta: Option<Value>,
}

impl EncoderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    pub fn jsonapi_version(mut self, version: impl Into<String>) -> Self {
        self.jsonapi_version = Some(version.into());
        self
    }

    pub fn jsonapi_meta(mut self, meta: Value) -> Self {
        self.jsonapi_meta = Some(meta);
        self
    }
}
