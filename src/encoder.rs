//! Encoder facade.
//!
//! An `Encoder` borrows a configured [`SchemaRegistry`] and turns primary
//! data, errors or meta into a complete document. Each call builds its own
//! walker and document, so one encoder can be reused for many encodes.

use serde_json::Value;
use tracing::debug;

use crate::document::{DataShape, DocumentBuilder};
use crate::error::{EncodeError, ErrorObject};
use crate::registry::SchemaRegistry;
use crate::types::{EncoderOptions, EncodingParameters, Link, Links};
use crate::walker::{GraphWalker, PrimaryData};

/// Encodes documents against one registry.
///
/// # Example
///
/// ```
/// use jsonapi_encoder::{Encoder, PrimaryData, SchemaRegistry};
/// use serde_json::json;
///
/// let registry = SchemaRegistry::new();
/// let document = Encoder::new(&registry)
///     .with_jsonapi_version("1.1")
///     .encode_data(PrimaryData::Many(Vec::new()))
///     .unwrap();
///
/// assert_eq!(document, json!({"jsonapi": {"version": "1.1"}, "data": []}));
/// ```
pub struct Encoder<'a> {
    registry: &'a SchemaRegistry,
    options: EncoderOptions,
    parameters: EncodingParameters,
    links: Links,
    meta: Option<Value>,
}

impl<'a> Encoder<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            options: EncoderOptions::default(),
            parameters: EncodingParameters::default(),
            links: Links::new(),
            meta: None,
        }
    }

    pub fn with_options(mut self, options: EncoderOptions) -> Self {
        self.options = options;
        self
    }

    /// Include paths and sparse field sets of the request.
    pub fn with_parameters(mut self, parameters: EncodingParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Top-level links.
    pub fn with_links(mut self, links: Links) -> Self {
        self.links = links;
        self
    }

    /// Add one top-level link.
    pub fn with_link(mut self, name: impl Into<String>, link: Link) -> Self {
        self.links.insert(name.into(), link);
        self
    }

    /// Top-level meta.
    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn with_jsonapi_version(mut self, version: impl Into<String>) -> Self {
        self.options.jsonapi_version = Some(version.into());
        self
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn parameters(&self) -> &EncodingParameters {
        &self.parameters
    }

    /// Encode primary data along with everything reachable through the
    /// effective include paths.
    ///
    /// # Errors
    ///
    /// Fails without producing a document if a resource has no schema or no
    /// id, or an include path names an unknown relationship.
    pub fn encode_data(&self, data: impl Into<PrimaryData>) -> Result<Value, EncodeError> {
        let mut builder = self.builder();
        let mut walker = GraphWalker::new(self.registry, &self.parameters, &self.options.url_prefix);
        walker.walk(data.into(), &mut builder)?;
        debug!(
            include = ?self.parameters.include_paths.to_paths(),
            "encoded data document"
        );
        Ok(builder.render())
    }

    /// Encode primary data as resource identifiers only.
    ///
    /// # Errors
    ///
    /// Fails if a resource has no schema or no id.
    pub fn encode_identifiers(&self, data: impl Into<PrimaryData>) -> Result<Value, EncodeError> {
        let mut builder = self.builder();
        let mut walker = GraphWalker::new(self.registry, &self.parameters, &self.options.url_prefix);
        walker.walk_identifiers(data.into(), &mut builder)?;
        debug!("encoded identifier document");
        Ok(builder.render())
    }

    /// Encode a single error.
    pub fn encode_error(&self, error: ErrorObject) -> Value {
        self.encode_errors(vec![error])
    }

    /// Encode an error document. Top-level links are not rendered.
    pub fn encode_errors<I>(&self, errors: I) -> Value
    where
        I: IntoIterator<Item = ErrorObject>,
    {
        let mut builder = self.builder();
        builder.add_errors(errors);
        debug!("encoded error document");
        builder.render()
    }

    /// Encode a meta-only document. Meta given here replaces `with_meta`.
    pub fn encode_meta(&self, meta: Value) -> Value {
        let mut builder = self.builder();
        builder.set_data_shape(DataShape::Absent);
        builder.set_meta(meta);
        builder.render()
    }

    fn builder(&self) -> DocumentBuilder {
        let mut builder = DocumentBuilder::with_url_prefix(self.options.url_prefix.as_str());
        if self.options.jsonapi_version.is_some() || self.options.jsonapi_meta.is_some() {
            builder.set_jsonapi(
                self.options.jsonapi_version.as_deref(),
                self.options.jsonapi_meta.clone(),
            );
        }
        if let Some(meta) = &self.meta {
            builder.set_meta(meta.clone());
        }
        builder.set_links(self.links.clone());
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn meta_only_document() {
        let registry = SchemaRegistry::new();
        let document = Encoder::new(&registry).encode_meta(json!({"total": 0}));
        assert_eq!(document, json!({"meta": {"total": 0}}));
    }

    #[test]
    fn null_and_empty_primary_data() {
        let registry = SchemaRegistry::new();
        let encoder = Encoder::new(&registry);

        assert_eq!(encoder.encode_data(PrimaryData::Null).unwrap(), json!({"data": null}));
        assert_eq!(
            encoder.encode_data(PrimaryData::Many(Vec::new())).unwrap(),
            json!({"data": []})
        );
    }

    #[test]
    fn errors_drop_top_level_links() {
        let registry = SchemaRegistry::new();
        let document = Encoder::new(&registry)
            .with_link("self", Link::new("/articles"))
            .with_meta(json!({"request": "abc"}))
            .with_jsonapi_version("1.1")
            .encode_error(ErrorObject::new().status("404").title("Not Found"));

        assert_eq!(
            document,
            json!({
                "jsonapi": {"version": "1.1"},
                "meta": {"request": "abc"},
                "errors": [{"status": "404", "title": "Not Found"}]
            })
        );
    }

    #[test]
    fn top_level_links_use_url_prefix() {
        let registry = SchemaRegistry::new();
        let document = Encoder::new(&registry)
            .with_options(EncoderOptions::new().url_prefix("http://example.com"))
            .with_link("self", Link::new("/articles"))
            .with_link("next", Link::absolute("http://other.test/page/2"))
            .encode_data(PrimaryData::Many(Vec::new()))
            .unwrap();

        assert_eq!(
            document["links"],
            json!({
                "self": "http://example.com/articles",
                "next": "http://other.test/page/2"
            })
        );
    }

    #[test]
    fn jsonapi_meta_without_version() {
        let registry = SchemaRegistry::new();
        let document = Encoder::new(&registry)
            .with_options(EncoderOptions::new().jsonapi_meta(json!({"build": 7})))
            .encode_meta(json!({}));
        assert_eq!(document["jsonapi"], json!({"meta": {"build": 7}}));
    }
}
