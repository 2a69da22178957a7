use super::{EntityType, Model};

/// Pairs a property on the source type with the property it references on the target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferentialConstraint {
    pub property: String,
    pub referenced_property: String,
}

/// Relationship from one entity type to another.
///
/// The partner is stored by name and resolved against the model on demand, so two
/// navigation properties can refer to each other without shared ownership.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NavigationProperty {
    name: String,
    target: String,
    collection: bool,
    expandable: bool,
    partner: Option<String>,
    constraints: Vec<ReferentialConstraint>,
}

impl NavigationProperty {
    /// A single-valued, expandable navigation to the entity type `target`.
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            collection: false,
            expandable: true,
            partner: None,
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_collection(mut self, collection: bool) -> Self {
        self.collection = collection;
        self
    }

    #[must_use]
    pub fn with_expandable(mut self, expandable: bool) -> Self {
        self.expandable = expandable;
        self
    }

    #[must_use]
    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }

    #[must_use]
    pub fn with_constraint(
        mut self,
        property: impl Into<String>,
        referenced_property: impl Into<String>,
    ) -> Self {
        self.constraints.push(ReferentialConstraint {
            property: property.into(),
            referenced_property: referenced_property.into(),
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the target entity type.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    #[must_use]
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    #[must_use]
    pub fn is_expandable(&self) -> bool {
        self.expandable
    }

    #[must_use]
    pub fn partner_name(&self) -> Option<&str> {
        self.partner.as_deref()
    }

    #[must_use]
    pub fn constraints(&self) -> &[ReferentialConstraint] {
        &self.constraints
    }

    #[must_use]
    pub fn target_type<'m>(&self, model: &'m Model) -> Option<&'m EntityType> {
        model.entity_type(&self.target)
    }

    /// The navigation property on the target type that leads back here.
    #[must_use]
    pub fn partner<'m>(&self, model: &'m Model) -> Option<&'m NavigationProperty> {
        self.target_type(model)?
            .navigation_property(self.partner.as_deref()?)
    }
}
