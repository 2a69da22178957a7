use indexmap::IndexMap;

use super::{EntityType, NavigationProperty};
use crate::error::MetadataError;

/// Binds an entity type to a named, queryable collection backed by a storage source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitySet {
    name: String,
    entity_type: String,
    source_name: Option<String>,
}

impl EntitySet {
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            source_name: None,
        }
    }

    /// Storage name (table) when it differs from the set name.
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
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        self.source_name.as_deref().unwrap_or(&self.name)
    }
}

/// Immutable registry of entity types and entity sets.
#[derive(Clone, Debug, Default)]
pub struct Model {
    entity_types: IndexMap<String, EntityType>,
    entity_sets: IndexMap<String, EntitySet>,
}

impl Model {
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    #[must_use]
    pub fn entity_type(&self, identifier: &str) -> Option<&EntityType> {
        self.entity_types.get(identifier)
    }

    #[must_use]
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.get(name)
    }

    /// First entity set declared over the given type.
    #[must_use]
    pub fn entity_set_for_type(&self, identifier: &str) -> Option<&EntitySet> {
        self.entity_sets
            .values()
            .find(|set| set.entity_type() == identifier)
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entity_types.values()
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.entity_sets.values()
    }
}

#[derive(Debug, Default)]
#[must_use]
pub struct ModelBuilder {
    entity_types: IndexMap<String, EntityType>,
    entity_sets: IndexMap<String, EntitySet>,
}

impl ModelBuilder {
    /// # Errors
    /// Returns `MetadataError::DuplicateEntityType` if the identifier is taken.
    pub fn entity_type(mut self, entity_type: EntityType) -> Result<Self, MetadataError> {
        let id = entity_type.identifier().to_owned();
        if self.entity_types.contains_key(&id) {
            return Err(MetadataError::DuplicateEntityType(id));
        }
        self.entity_types.insert(id, entity_type);
        Ok(self)
    }

    /// # Errors
    /// Returns `MetadataError::DuplicateEntitySet` if the name is taken.
    pub fn entity_set(mut self, entity_set: EntitySet) -> Result<Self, MetadataError> {
        let name = entity_set.name().to_owned();
        if self.entity_sets.contains_key(&name) {
            return Err(MetadataError::DuplicateEntitySet(name));
        }
        self.entity_sets.insert(name, entity_set);
        Ok(self)
    }

    /// Validate cross references and freeze the model.
    ///
    /// # Errors
    /// Returns the first unresolved entity type, constraint property or partner.
    pub fn build(self) -> Result<Model, MetadataError> {
        let model = Model {
            entity_types: self.entity_types,
            entity_sets: self.entity_sets,
        };
        for set in model.entity_sets() {
            if model.entity_type(set.entity_type()).is_none() {
                return Err(MetadataError::UnknownEntityType(set.entity_type().to_owned()));
            }
        }
        for entity_type in model.entity_types() {
            for navigation in entity_type.navigation_properties() {
                validate_navigation(&model, entity_type, navigation)?;
            }
        }
        tracing::debug!(
            entity_types = model.entity_types.len(),
            entity_sets = model.entity_sets.len(),
            "metadata model built"
        );
        Ok(model)
    }
}

fn validate_navigation(
    model: &Model,
    source: &EntityType,
    navigation: &NavigationProperty,
) -> Result<(), MetadataError> {
    let target = navigation
        .target_type(model)
        .ok_or_else(|| MetadataError::UnknownEntityType(navigation.target().to_owned()))?;

    for constraint in navigation.constraints() {
        for (owner, property) in [
            (source, &constraint.property),
            (target, &constraint.referenced_property),
        ] {
            if owner.property(property).is_none() {
                return Err(MetadataError::UnknownConstraintProperty {
                    navigation: navigation.name().to_owned(),
                    entity_type: owner.identifier().to_owned(),
                    property: property.clone(),
                });
            }
        }
    }

    if let Some(partner_name) = navigation.partner_name() {
        let points_back = navigation
            .partner(model)
            .is_some_and(|partner| partner.target() == source.identifier());
        if !points_back {
            return Err(MetadataError::InvalidPartner {
                navigation: navigation.name().to_owned(),
                partner: partner_name.to_owned(),
                entity_type: source.identifier().to_owned(),
            });
        }
    }
    Ok(())
}
