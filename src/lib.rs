//! JSON:API Document Encoder
//!
//! Schema-driven encoding of an in-memory object graph into a JSON:API
//! document: primary data, a deduplicated `included` section resolved along
//! requested include paths, sparse field sets, links and meta.
//!
//! Each application type implements [`Resource`]; a [`Schema`] registered in
//! a [`SchemaRegistry`] describes how it looks on the wire.
//!
//! # Example
//!
//! ```
//! use std::any::Any;
//! use std::rc::Rc;
//!
//! use jsonapi_encoder::{
//!     Encoder, EncodingParameters, FieldSet, Relationship, RelationshipContext, Relationships,
//!     Resource, ResourceRef, Schema, SchemaRegistry,
//! };
//! use serde_json::{json, Map, Value};
//!
//! struct Author {
//!     id: u32,
//!     name: String,
//! }
//!
//! struct Post {
//!     id: u32,
//!     title: String,
//!     author: Rc<Author>,
//! }
//!
//! impl Resource for Author {
//!     fn resource_type(&self) -> &str { "Author" }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! impl Resource for Post {
//!     fn resource_type(&self) -> &str { "Post" }
//!     fn as_any(&self) -> &dyn Any { self }
//! }
//!
//! struct AuthorSchema;
//!
//! impl Schema for AuthorSchema {
//!     fn resource_type(&self) -> &str { "people" }
//!
//!     fn id(&self, resource: &dyn Resource) -> Option<String> {
//!         resource.downcast_ref::<Author>().map(|a| a.id.to_string())
//!     }
//!
//!     fn attributes(&self, resource: &dyn Resource, _fields: &FieldSet) -> Map<String, Value> {
//!         let mut attributes = Map::new();
//!         if let Some(author) = resource.downcast_ref::<Author>() {
//!             attributes.insert("name".into(), json!(author.name));
//!         }
//!         attributes
//!     }
//! }
//!
//! struct PostSchema;
//!
//! impl Schema for PostSchema {
//!     fn resource_type(&self) -> &str { "posts" }
//!
//!     fn id(&self, resource: &dyn Resource) -> Option<String> {
//!         resource.downcast_ref::<Post>().map(|p| p.id.to_string())
//!     }
//!
//!     fn attributes(&self, resource: &dyn Resource, _fields: &FieldSet) -> Map<String, Value> {
//!         let mut attributes = Map::new();
//!         if let Some(post) = resource.downcast_ref::<Post>() {
//!             attributes.insert("title".into(), json!(post.title));
//!         }
//!         attributes
//!     }
//!
//!     fn relationships(
//!         &self,
//!         resource: &dyn Resource,
//!         _context: &RelationshipContext<'_>,
//!     ) -> Relationships {
//!         let mut relationships = Relationships::new();
//!         if let Some(post) = resource.downcast_ref::<Post>() {
//!             let author: ResourceRef = post.author.clone();
//!             relationships.insert("author".into(), Relationship::new(author));
//!         }
//!         relationships
//!     }
//! }
//!
//! let mut registry = SchemaRegistry::new();
//! registry.register_schema("Author", AuthorSchema).unwrap();
//! registry.register_schema("Post", PostSchema).unwrap();
//!
//! let author = Rc::new(Author { id: 9, name: "Dan".into() });
//! let post: ResourceRef = Rc::new(Post { id: 1, title: "JSON:API".into(), author });
//!
//! let document = Encoder::new(&registry)
//!     .with_parameters(EncodingParameters::new().include("author"))
//!     .encode_data(post)
//!     .unwrap();
//!
//! assert_eq!(
//!     document,
//!     json!({
//!         "data": {
//!             "type": "posts",
//!             "id": "1",
//!             "attributes": { "title": "JSON:API" },
//!             "relationships": {
//!                 "author": { "data": { "type": "people", "id": "9" } }
//!             }
//!         },
//!         "included": [
//!             { "type": "people", "id": "9", "attributes": { "name": "Dan" } }
//!         ]
//!     })
//! );
//! ```
//!
//! # Include Paths and Field Sets
//!
//! | Parameter | Effect |
//! |-----------|--------|
//! | `include("comments.author")` | Expands `comments` and each comment's `author` into `included` |
//! | `fields("people", ["name"])` | Renders only `name` for every `people` resource |
//! | (none) | Relationships render linkage only, all fields render |
//!
//! A resource is fully rendered at most once per document. Relationships that
//! lead back to an already rendered resource carry linkage only, which keeps
//! cyclic graphs finite.

mod dataset;
mod document;
mod encoder;
mod error;
mod registry;
mod relationship;
mod resource;
mod schema;
mod types;
mod walker;

pub use dataset::{
    Dataset, Record, RecordData, RecordLinkage, RecordRef, RecordSchema, RelationshipConfig,
    SchemaConfig,
};
pub use document::{DataShape, DocumentBuilder, RelationshipView, SlotId};
pub use encoder::Encoder;
pub use error::{
    DatasetError, EncodeError, ErrorLinks, ErrorObject, ErrorSource, RegistryError,
};
pub use registry::{FromRegistry, SchemaConstructor, SchemaFactory, SchemaRegistry, SchemaSource};
pub use relationship::{ParsedElement, ParsedIdentifier, ParsedResource, RelationshipData};
pub use resource::{Resource, ResourceRef};
pub use schema::{Linkage, Related, Relationship, RelationshipContext, Relationships, Schema};
pub use types::{
    links_to_value, Deferred, EncoderOptions, EncodingParameters, FieldSet, IncludePaths, Link,
    Links, Position, ResourceIdentifier, Thunk, PATH_SEPARATOR,
};
pub use walker::{GraphWalker, PrimaryData};
