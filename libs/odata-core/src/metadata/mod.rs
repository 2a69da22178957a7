//! Entity data model consulted by the parsers and the query targets.
//!
//! A [`Model`] is assembled once through [`ModelBuilder`], validated, and then shared
//! read-only (it is `Send + Sync`; wrap it in an `Arc` to share across threads).

mod entity_type;
mod model;
mod navigation;
mod primitive;

pub use entity_type::EntityType;
pub use model::{EntitySet, Model, ModelBuilder};
pub use navigation::{NavigationProperty, ReferentialConstraint};
pub use primitive::PrimitiveType;

/// A declared (structural) property of an entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Property {
    name: String,
    primitive_type: PrimitiveType,
    nullable: bool,
    filterable: bool,
    searchable: bool,
    alternative_key: bool,
    source_name: Option<String>,
}

impl Property {
    /// A nullable, filterable, non-searchable property.
    pub fn new(name: impl Into<String>, primitive_type: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            primitive_type,
            nullable: true,
            filterable: true,
            searchable: false,
            alternative_key: false,
            source_name: None,
        }
    }

    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    #[must_use]
    pub fn with_searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    /// Mark the property as an alternative key; alternative keys are never null.
    #[must_use]
    pub fn as_alternative_key(mut self) -> Self {
        self.alternative_key = true;
        self.nullable = false;
        self
    }

    /// Storage column name when it differs from the property name.
    #[must_use]
    pub fn with_source_name(mut self, source_name: impl Into<String>) -> Self {
        self.source_name = Some(source_name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive_type
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    #[must_use]
    pub fn is_filterable(&self) -> bool {
        self.filterable
    }

    #[must_use]
    pub fn is_searchable(&self) -> bool {
        self.searchable
    }

    #[must_use]
    pub fn is_alternative_key(&self) -> bool {
        self.alternative_key
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.name)
    }
}
