use indexmap::IndexMap;

use super::{NavigationProperty, Property};
use crate::error::MetadataError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityType {
    identifier: String,
    key: Option<String>,
    properties: IndexMap<String, Property>,
    navigation: IndexMap<String, NavigationProperty>,
}

impl EntityType {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            key: None,
            properties: IndexMap::new(),
            navigation: IndexMap::new(),
        }
    }

    /// Declare the key property. Keys are never nullable.
    ///
    /// # Errors
    /// Returns `MetadataError::DuplicateProperty` if the name is already taken.
    pub fn with_key(mut self, property: Property) -> Result<Self, MetadataError> {
        let property = property.with_nullable(false);
        self.key = Some(property.name().to_owned());
        self.with_property(property)
    }

    /// # Errors
    /// Returns `MetadataError::DuplicateProperty` if the name is already taken.
    pub fn with_property(mut self, property: Property) -> Result<Self, MetadataError> {
        self.ensure_free(property.name())?;
        self.properties.insert(property.name().to_owned(), property);
        Ok(self)
    }

    /// # Errors
    /// Returns `MetadataError::MissingKey` when the type has no key yet, or
    /// `MetadataError::DuplicateProperty` if the name is already taken.
    pub fn with_navigation(mut self, navigation: NavigationProperty) -> Result<Self, MetadataError> {
        if self.key.is_none() {
            return Err(MetadataError::MissingKey(self.identifier.clone()));
        }
        self.ensure_free(navigation.name())?;
        self.navigation.insert(navigation.name().to_owned(), navigation);
        Ok(self)
    }

    fn ensure_free(&self, name: &str) -> Result<(), MetadataError> {
        if self.properties.contains_key(name) || self.navigation.contains_key(name) {
            return Err(MetadataError::DuplicateProperty {
                entity_type: self.identifier.clone(),
                property: name.to_owned(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn key(&self) -> Option<&Property> {
        self.properties.get(self.key.as_deref()?)
    }

    /// Declared property by exact (case-sensitive) name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn navigation_property(&self, name: &str) -> Option<&NavigationProperty> {
        self.navigation.get(name)
    }

    /// Declared properties in declaration order.
    pub fn declared_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn navigation_properties(&self) -> impl Iterator<Item = &NavigationProperty> {
        self.navigation.values()
    }

    pub fn searchable_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values().filter(|p| p.is_searchable())
    }

    pub fn alternative_keys(&self) -> impl Iterator<Item = &Property> {
        self.properties.values().filter(|p| p.is_alternative_key())
    }
}
