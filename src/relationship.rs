//! Relationship data - the classified, lazily parsed value of one relationship.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::EncodeError;
use crate::registry::SchemaRegistry;
use crate::resource::{Resource, ResourceRef};
use crate::schema::{Linkage, Related, Schema};
use crate::types::{FieldSet, Position, ResourceIdentifier};

/// A resource paired with its schema and the position it was reached at.
///
/// The id is computed when the resource is parsed; attributes on first use.
pub struct ParsedResource {
    schema: Arc<dyn Schema>,
    resource: ResourceRef,
    position: Position,
    id: String,
    /// Filtered attributes per field set seen so far.
    attributes: RefCell<Vec<(FieldSet, Map<String, Value>)>>,
}

impl ParsedResource {
    /// # Errors
    ///
    /// Returns `EncodeError::MissingId` if the schema reports no id.
    pub fn new(
        schema: Arc<dyn Schema>,
        resource: ResourceRef,
        position: Position,
    ) -> Result<Self, EncodeError> {
        let id = schema
            .id(resource.as_ref())
            .ok_or_else(|| EncodeError::MissingId {
                wire_type: schema.resource_type().to_string(),
                path: position.path().to_string(),
            })?;

        Ok(Self {
            schema,
            resource,
            position,
            id,
            attributes: RefCell::new(Vec::new()),
        })
    }

    pub fn resource_type(&self) -> &str {
        self.schema.resource_type()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `(type, id)` pair identifying the resource in a document.
    pub fn key(&self) -> (String, String) {
        (self.resource_type().to_string(), self.id.clone())
    }

    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    pub fn resource(&self) -> &dyn Resource {
        self.resource.as_ref()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Attributes filtered by `fields`, cached per field set.
    pub fn attributes(&self, fields: &FieldSet) -> Map<String, Value> {
        if let Some((_, cached)) = self.attributes.borrow().iter().find(|(f, _)| f == fields) {
            return cached.clone();
        }
        let attributes = fields.filter(self.schema.attributes(self.resource.as_ref(), fields));
        self.attributes
            .borrow_mut()
            .push((fields.clone(), attributes.clone()));
        attributes
    }

    /// Identifier used when this resource appears in linkage.
    pub fn identifier(&self) -> ParsedIdentifier {
        ParsedIdentifier {
            resource_type: self.resource_type().to_string(),
            id: self.id.clone(),
            meta: self.schema.linkage_meta(self.resource.as_ref()),
            position: self.position.clone(),
        }
    }
}

/// A bare `{type, id}` reference reached during traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedIdentifier {
    resource_type: String,
    id: String,
    meta: Option<Value>,
    position: Position,
}

impl ParsedIdentifier {
    pub fn new(identifier: ResourceIdentifier, position: Position) -> Self {
        Self {
            resource_type: identifier.resource_type,
            id: identifier.id,
            meta: identifier.meta,
            position,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn meta(&self) -> Option<&Value> {
        self.meta.as_ref()
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Render as a resource identifier object.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("type".to_string(), Value::String(self.resource_type.clone()));
        object.insert("id".to_string(), Value::String(self.id.clone()));
        if let Some(meta) = &self.meta {
            object.insert("meta".to_string(), meta.clone());
        }
        Value::Object(object)
    }
}

/// A parsed element of a to-many relationship.
#[derive(Clone)]
pub enum ParsedElement {
    Resource(Rc<ParsedResource>),
    Identifier(Rc<ParsedIdentifier>),
}

impl ParsedElement {
    /// Identifier used in the parent's linkage.
    pub fn linkage(&self) -> ParsedIdentifier {
        match self {
            ParsedElement::Resource(resource) => resource.identifier(),
            ParsedElement::Identifier(identifier) => identifier.as_ref().clone(),
        }
    }
}

/// A resource whose schema is known but which has not been parsed yet.
struct PendingResource {
    schema: Arc<dyn Schema>,
    resource: ResourceRef,
    parsed: OnceCell<Rc<ParsedResource>>,
}

impl PendingResource {
    fn parse(&self, position: &Position) -> Result<Rc<ParsedResource>, EncodeError> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed.clone());
        }
        let parsed = Rc::new(ParsedResource::new(
            self.schema.clone(),
            self.resource.clone(),
            position.clone(),
        )?);
        Ok(self.parsed.get_or_init(|| parsed).clone())
    }
}

enum PendingElement {
    Resource(PendingResource),
    Identifier(Rc<ParsedIdentifier>),
}

enum DataKind {
    Null,
    Identifier(Rc<ParsedIdentifier>),
    Resource(PendingResource),
    Collection {
        elements: Vec<PendingElement>,
        parsed: OnceCell<Vec<ParsedElement>>,
    },
}

/// Classified data of one relationship.
///
/// Elements are parsed on first access and memoized, so repeated access
/// returns the same parsed values without calling into schemas again.
pub struct RelationshipData {
    kind: DataKind,
    position: Position,
}

impl RelationshipData {
    /// Classify a raw relationship value. Deferred values are resolved here.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::NoSchema` for a resource the registry cannot
    /// describe.
    pub fn from_linkage(
        linkage: Linkage,
        registry: &SchemaRegistry,
        position: Position,
    ) -> Result<Self, EncodeError> {
        let kind = match linkage {
            Linkage::Null => DataKind::Null,
            Linkage::Identifier(identifier) => DataKind::Identifier(Rc::new(
                ParsedIdentifier::new(identifier, position.clone()),
            )),
            Linkage::Resource(resource) => {
                DataKind::Resource(pending_resource(resource, registry, &position)?)
            }
            Linkage::Collection(items) => {
                let elements = items
                    .into_iter()
                    .map(|item| classify_element(item, registry, &position))
                    .collect::<Result<Vec<_>, _>>()?;
                DataKind::Collection {
                    elements,
                    parsed: OnceCell::new(),
                }
            }
            Linkage::Deferred(thunk) => return Self::from_linkage(thunk(), registry, position),
        };

        Ok(Self { kind, position })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, DataKind::Null)
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, DataKind::Identifier(_))
    }

    pub fn is_resource(&self) -> bool {
        matches!(self.kind, DataKind::Resource(_))
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind, DataKind::Collection { .. })
    }

    /// The single related resource.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::InvariantViolation` unless the data is a resource.
    pub fn resource(&self) -> Result<Rc<ParsedResource>, EncodeError> {
        match &self.kind {
            DataKind::Resource(pending) => pending.parse(&self.position),
            _ => Err(self.violation("a resource")),
        }
    }

    /// The single related identifier.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::InvariantViolation` unless the data is an
    /// identifier.
    pub fn identifier(&self) -> Result<Rc<ParsedIdentifier>, EncodeError> {
        match &self.kind {
            DataKind::Identifier(identifier) => Ok(identifier.clone()),
            _ => Err(self.violation("an identifier")),
        }
    }

    /// Every element of a collection, in declared order.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::InvariantViolation` unless the data is a
    /// collection.
    pub fn elements(&self) -> Result<&[ParsedElement], EncodeError> {
        let DataKind::Collection { elements, parsed } = &self.kind else {
            return Err(self.violation("a collection"));
        };

        if let Some(parsed) = parsed.get() {
            return Ok(parsed.as_slice());
        }

        let built = elements
            .iter()
            .map(|element| match element {
                PendingElement::Resource(pending) => {
                    pending.parse(&self.position).map(ParsedElement::Resource)
                }
                PendingElement::Identifier(identifier) => {
                    Ok(ParsedElement::Identifier(identifier.clone()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(parsed.get_or_init(|| built).as_slice())
    }

    /// Resource elements of a collection.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::InvariantViolation` unless the data is a
    /// collection.
    pub fn resources(&self) -> Result<Vec<Rc<ParsedResource>>, EncodeError> {
        Ok(self
            .elements()?
            .iter()
            .filter_map(|element| match element {
                ParsedElement::Resource(resource) => Some(resource.clone()),
                ParsedElement::Identifier(_) => None,
            })
            .collect())
    }

    /// Identifier elements of a collection.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::InvariantViolation` unless the data is a
    /// collection.
    pub fn identifiers(&self) -> Result<Vec<Rc<ParsedIdentifier>>, EncodeError> {
        Ok(self
            .elements()?
            .iter()
            .filter_map(|element| match element {
                ParsedElement::Identifier(identifier) => Some(identifier.clone()),
                ParsedElement::Resource(_) => None,
            })
            .collect())
    }

    fn kind_name(&self) -> &'static str {
        match self.kind {
            DataKind::Null => "null",
            DataKind::Identifier(_) => "an identifier",
            DataKind::Resource(_) => "a resource",
            DataKind::Collection { .. } => "a collection",
        }
    }

    fn violation(&self, expected: &'static str) -> EncodeError {
        EncodeError::InvariantViolation {
            expected,
            actual: self.kind_name(),
        }
    }
}

fn pending_resource(
    resource: ResourceRef,
    registry: &SchemaRegistry,
    position: &Position,
) -> Result<PendingResource, EncodeError> {
    if !registry.has_schema(resource.as_ref()) {
        return Err(EncodeError::NoSchema {
            type_name: resource.resource_type().to_string(),
            path: position.path().to_string(),
        });
    }
    let schema = registry.get_schema(resource.as_ref())?;
    Ok(PendingResource {
        schema,
        resource,
        parsed: OnceCell::new(),
    })
}

fn classify_element(
    item: Related,
    registry: &SchemaRegistry,
    position: &Position,
) -> Result<PendingElement, EncodeError> {
    match item {
        Related::Resource(resource) => Ok(PendingElement::Resource(pending_resource(
            resource, registry, position,
        )?)),
        Related::Identifier(identifier) => Ok(PendingElement::Identifier(Rc::new(
            ParsedIdentifier::new(identifier, position.clone()),
        ))),
    }
}
