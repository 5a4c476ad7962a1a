//! The object-graph side of the encoder: anything a schema can describe.

use std::any::Any;
use std::rc::Rc;

/// An application object that can be encoded as a JSON:API resource.
///
/// `resource_type` is the key schemas are registered under. It names the
/// concrete type and is unrelated to the wire `type` a schema emits.
pub trait Resource: Any {
    /// Concrete type key used for schema lookup.
    fn resource_type(&self) -> &str;

    /// Returns true if this resource may be described by the schema
    /// registered under `key`.
    ///
    /// Types that stand in for a shared base (e.g. several structs served by
    /// one schema) override this to accept the base key.
    fn is_kind(&self, key: &str) -> bool {
        key == self.resource_type()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a resource.
pub type ResourceRef = Rc<dyn Resource>;

impl dyn Resource {
    /// Downcast to the concrete resource type.
    pub fn downcast_ref<T: Resource>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Article;

    impl Resource for Article {
        fn resource_type(&self) -> &str {
            "Article"
        }

        fn is_kind(&self, key: &str) -> bool {
            key == "Article" || key == "Publication"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Photo;

    impl Resource for Photo {
        fn resource_type(&self) -> &str {
            "Photo"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn downcast_to_concrete_type() {
        let resource: ResourceRef = Rc::new(Article);
        assert!(resource.downcast_ref::<Article>().is_some());
        assert!(resource.downcast_ref::<Photo>().is_none());
    }

    #[test]
    fn kind_defaults_to_resource_type() {
        assert!(Photo.is_kind("Photo"));
        assert!(!Photo.is_kind("Publication"));
        assert!(Article.is_kind("Publication"));
    }
}
