//! Graph walking - depth-first traversal of the resource graph along the
//! requested include paths.
//!
//! Every resource is rendered (attributes, relationships, links, meta) at
//! most once per document. Later encounters of the same `(type, id)` emit
//! linkage and only walk the include paths not yet walked from that resource,
//! which bounds the walk on cyclic graphs.

use std::collections::HashMap;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::document::{DataShape, DocumentBuilder, RelationshipView, SlotId};
use crate::error::EncodeError;
use crate::registry::SchemaRegistry;
use crate::relationship::{ParsedElement, ParsedIdentifier, ParsedResource, RelationshipData};
use crate::resource::ResourceRef;
use crate::schema::{Relationship, RelationshipContext};
use crate::types::{links_to_value, EncodingParameters, IncludePaths, Link, Links, Position};

/// Primary data handed to the encoder.
pub enum PrimaryData {
    /// `data: null`
    Null,
    /// `data: {...}`
    One(ResourceRef),
    /// `data: [...]`
    Many(Vec<ResourceRef>),
}

impl From<ResourceRef> for PrimaryData {
    fn from(resource: ResourceRef) -> Self {
        PrimaryData::One(resource)
    }
}

impl From<Option<ResourceRef>> for PrimaryData {
    fn from(resource: Option<ResourceRef>) -> Self {
        resource.map_or(PrimaryData::Null, PrimaryData::One)
    }
}

impl From<Vec<ResourceRef>> for PrimaryData {
    fn from(resources: Vec<ResourceRef>) -> Self {
        PrimaryData::Many(resources)
    }
}

impl PrimaryData {
    fn shape(&self) -> DataShape {
        match self {
            PrimaryData::Null | PrimaryData::One(_) => DataShape::Single,
            PrimaryData::Many(_) => DataShape::Collection,
        }
    }

    fn into_resources(self) -> Vec<ResourceRef> {
        match self {
            PrimaryData::Null => Vec::new(),
            PrimaryData::One(resource) => vec![resource],
            PrimaryData::Many(resources) => resources,
        }
    }

    fn into_parsed(
        self,
        registry: &SchemaRegistry,
    ) -> Result<Vec<Rc<ParsedResource>>, EncodeError> {
        self.into_resources()
            .into_iter()
            .map(|resource| {
                if !registry.has_schema(resource.as_ref()) {
                    return Err(EncodeError::NoSchema {
                        type_name: resource.resource_type().to_string(),
                        path: String::new(),
                    });
                }
                let schema = registry.get_schema(resource.as_ref())?;
                Ok(Rc::new(ParsedResource::new(schema, resource, Position::root())?))
            })
            .collect()
    }
}

/// Per-encode traversal state.
pub struct GraphWalker<'a> {
    registry: &'a SchemaRegistry,
    parameters: &'a EncodingParameters,
    url_prefix: &'a str,
    /// Include paths already walked from each `(type, id)`.
    walked: HashMap<(String, String), IncludePaths>,
}

impl<'a> GraphWalker<'a> {
    pub fn new(
        registry: &'a SchemaRegistry,
        parameters: &'a EncodingParameters,
        url_prefix: &'a str,
    ) -> Self {
        Self {
            registry,
            parameters,
            url_prefix,
            walked: HashMap::new(),
        }
    }

    /// Walk primary data and everything reachable along include paths.
    ///
    /// # Errors
    ///
    /// Fails on the first resource without a schema, resource without id, or
    /// include path naming an unknown relationship.
    pub fn walk(
        &mut self,
        data: PrimaryData,
        builder: &mut DocumentBuilder,
    ) -> Result<(), EncodeError> {
        let parameters = self.parameters;
        builder.set_data_shape(data.shape());

        let roots = data.into_parsed(self.registry)?;

        // Relationships pointing back at primary data get linkage only.
        for root in &roots {
            self.walked.entry(root.key()).or_default();
        }

        for root in roots {
            let fields = parameters.field_set(root.resource_type());
            let slot = builder.add_to_data(root.clone(), fields);
            self.expand(&root, Some(slot), &parameters.include_paths, builder)?;
        }
        Ok(())
    }

    /// Add primary data as resource identifiers, without walking.
    ///
    /// # Errors
    ///
    /// Fails on a resource without a schema or without id.
    pub fn walk_identifiers(
        &mut self,
        data: PrimaryData,
        builder: &mut DocumentBuilder,
    ) -> Result<(), EncodeError> {
        builder.set_data_shape(data.shape());
        for root in data.into_parsed(self.registry)? {
            builder.add_identifier_to_data(&root.identifier());
        }
        Ok(())
    }

    /// Walk the relationships of `parsed`. With a slot the resource is
    /// rendered into it; without one it was rendered before and only include
    /// paths not yet walked from it are followed.
    fn expand(
        &mut self,
        parsed: &Rc<ParsedResource>,
        slot: Option<SlotId>,
        requested: &IncludePaths,
        builder: &mut DocumentBuilder,
    ) -> Result<(), EncodeError> {
        let schema = parsed.schema().clone();
        let position = parsed.position().clone();
        let wire_type = parsed.resource_type().to_string();

        let mut include = requested.clone();
        include.merge(&IncludePaths::parse(schema.default_include_paths()));

        let walked = self.walked.entry(parsed.key()).or_default();
        let remaining = include.difference(walked);
        walked.merge(&include);

        if slot.is_none() && remaining.is_empty() {
            trace!(wire_type = %wire_type, id = parsed.id(), "already visited, linkage only");
            return Ok(());
        }

        trace!(wire_type = %wire_type, id = parsed.id(), path = position.path(), "expanding resource");

        let context = RelationshipContext::new(&position, position.is_root(), &include);
        let relationships = schema.relationships(parsed.resource(), &context);

        if let Some(missing) = remaining.names().find(|name| !relationships.contains_key(*name)) {
            return Err(EncodeError::UnknownPath {
                path: position.compound(missing),
            });
        }

        let parameters = self.parameters;
        let fields = parameters.field_set(&wire_type);

        for (name, relationship) in relationships {
            let subtree = include.child(&name);
            let target = match slot {
                Some(slot) => fields.allows(&name).then_some(slot),
                None if remaining.contains(&name) => None,
                None => continue,
            };

            // Neither rendered nor walked: its data is never evaluated.
            if target.is_none() && subtree.is_none() {
                continue;
            }

            let child_position = position.child(&wire_type, &name);
            self.add_relationship(
                parsed,
                target,
                &name,
                relationship,
                child_position,
                subtree,
                builder,
            )?;
        }

        if let Some(slot) = slot {
            builder.set_resource_completed(slot);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_relationship(
        &mut self,
        parent: &Rc<ParsedResource>,
        target: Option<SlotId>,
        name: &str,
        relationship: Relationship,
        position: Position,
        subtree: Option<&IncludePaths>,
        builder: &mut DocumentBuilder,
    ) -> Result<(), EncodeError> {
        let Relationship {
            data,
            links,
            meta,
            show_self,
            show_related,
            show_data,
        } = relationship;

        let url_prefix = self.url_prefix;
        let view = || RelationshipView {
            links: relationship_links(parent, name, &links, show_self, show_related, url_prefix),
            meta: meta.map(|meta| meta.resolve()),
            show_data,
        };

        let data = match data {
            Some(data) if show_data || subtree.is_some() => data,
            _ => {
                if let Some(slot) = target {
                    builder.add_relationship_without_data(slot, name, view());
                }
                return Ok(());
            }
        };

        let data = RelationshipData::from_linkage(data, self.registry, position)?;

        if subtree.is_some() {
            trace!(path = data.position().path(), "including relationship");
            builder.mark_included();
        }

        if data.is_null() {
            if let Some(slot) = target {
                builder.add_null_relationship(slot, name, view());
            }
        } else if data.is_identifier() {
            let identifier = data.identifier()?;
            if let Some(slot) = target {
                builder.add_relationship_to_one(slot, name, view(), &identifier);
            }
        } else if data.is_resource() {
            let child = data.resource()?;
            let linkage = self.visit(&child, subtree, builder)?;
            if let Some(slot) = target {
                builder.add_relationship_to_one(slot, name, view(), &linkage);
            }
        } else {
            let mut linkage = Vec::new();
            for element in data.elements()? {
                match element {
                    ParsedElement::Resource(child) => {
                        linkage.push(self.visit(child, subtree, builder)?);
                    }
                    ParsedElement::Identifier(identifier) => {
                        linkage.push(identifier.as_ref().clone());
                    }
                }
            }
            if let Some(slot) = target {
                if linkage.is_empty() {
                    builder.add_empty_relationship(slot, name, view());
                } else {
                    builder.add_relationship_to_many(slot, name, view(), &linkage);
                }
            }
        }

        Ok(())
    }

    /// Include `child` if its relationship is on an include path. A child
    /// seen before is only walked further along paths not yet walked from it.
    /// Returns the identifier for the parent's linkage.
    fn visit(
        &mut self,
        child: &Rc<ParsedResource>,
        subtree: Option<&IncludePaths>,
        builder: &mut DocumentBuilder,
    ) -> Result<ParsedIdentifier, EncodeError> {
        if let Some(subtree) = subtree {
            let slot = if self.walked.contains_key(&child.key()) {
                None
            } else {
                let parameters = self.parameters;
                let fields = parameters.field_set(child.resource_type());
                Some(builder.add_to_included(child.clone(), fields))
            };
            self.expand(child, slot, subtree, builder)?;
        }
        Ok(child.identifier())
    }
}

/// `links` member of a relationship: `self`/`related` when requested, then
/// the relationship's own links.
fn relationship_links(
    parent: &ParsedResource,
    name: &str,
    links: &Links,
    show_self: bool,
    show_related: bool,
    url_prefix: &str,
) -> Option<Value> {
    if !show_self && !show_related && links.is_empty() {
        return None;
    }

    let base = parent.schema().self_url(parent.resource());
    let mut object = Map::new();
    if show_self {
        object.insert(
            "self".to_string(),
            Link::new(format!("{base}/relationships/{name}")).to_value(url_prefix),
        );
    }
    if show_related {
        object.insert(
            "related".to_string(),
            Link::new(format!("{base}/{name}")).to_value(url_prefix),
        );
    }
    if let Some(Value::Object(custom)) = links_to_value(links, url_prefix) {
        object.extend(custom);
    }
    Some(Value::Object(object))
}
