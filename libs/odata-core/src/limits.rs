//! Input validation and safety limits for OData query options
//!
//! This module enforces sane caps to prevent abuse and resource exhaustion:
//! - Maximum `$top` value
//! - Maximum number of `$orderby` items
//! - Maximum filter expression length
//! - Maximum `$expand` nesting depth
//! - Page size used when an entity set is read in windows

use figment::Figment;
use serde::Deserialize;

use crate::Error;

/// Configuration key holding the limits section.
pub const CONFIG_SECTION: &str = "odata";

/// Default configuration for OData input limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ODataLimits {
    /// Maximum value for $top (default: 1000)
    pub max_top: u64,
    /// Maximum number of items in $orderby (default: 5)
    pub max_orderby_fields: usize,
    /// Maximum length of $filter and $search expressions in bytes (default: 2000)
    pub max_filter_length: usize,
    /// Maximum nesting of $expand (default: 3)
    pub max_expand_depth: usize,
    /// Rows fetched per backend round trip (default: 200)
    pub max_page_size: u64,
}

impl Default for ODataLimits {
    fn default() -> Self {
        Self {
            max_top: 1000,
            max_orderby_fields: 5,
            max_filter_length: 2000,
            max_expand_depth: 3,
            max_page_size: 200,
        }
    }
}

impl ODataLimits {
    /// Create limits with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the `odata` section from a figment, falling back to defaults when it is absent.
    ///
    /// # Errors
    /// Returns the figment error when the section exists but does not deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self, figment::Error> {
        if figment.find_value(CONFIG_SECTION).is_err() {
            tracing::debug!(section = CONFIG_SECTION, "no odata limits configured, using defaults");
            return Ok(Self::default());
        }
        figment.extract_inner(CONFIG_SECTION)
    }

    /// Set maximum $top value
    #[must_use]
    pub fn with_max_top(mut self, max_top: u64) -> Self {
        self.max_top = max_top;
        self
    }

    /// Set maximum number of $orderby items
    #[must_use]
    pub fn with_max_orderby_fields(mut self, max: usize) -> Self {
        self.max_orderby_fields = max;
        self
    }

    /// Set maximum $filter length
    #[must_use]
    pub fn with_max_filter_length(mut self, max: usize) -> Self {
        self.max_filter_length = max;
        self
    }

    #[must_use]
    pub fn with_max_expand_depth(mut self, max: usize) -> Self {
        self.max_expand_depth = max;
        self
    }

    #[must_use]
    pub fn with_max_page_size(mut self, size: u64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Validate a $top value against limits
    ///
    /// # Errors
    /// Returns `Error::InvalidLimit` when `top` exceeds `max_top`.
    pub fn validate_top(&self, top: u64) -> Result<(), Error> {
        if top > self.max_top {
            return Err(Error::InvalidLimit(top));
        }
        Ok(())
    }

    /// Validate a $filter expression length
    ///
    /// # Errors
    /// Returns `Error::InvalidFilter` when the text is longer than `max_filter_length`.
    pub fn validate_filter(&self, filter: &str) -> Result<(), Error> {
        if filter.len() > self.max_filter_length {
            return Err(Error::InvalidFilter(format!(
                "expression exceeds maximum length of {} characters",
                self.max_filter_length
            )));
        }
        Ok(())
    }

    /// Validate number of $orderby items
    ///
    /// # Errors
    /// Returns `Error::InvalidOrderBy` when there are more than `max_orderby_fields` items.
    pub fn validate_orderby_count(&self, count: usize) -> Result<(), Error> {
        if count > self.max_orderby_fields {
            return Err(Error::InvalidOrderBy(format!(
                "too many orderby items (max: {})",
                self.max_orderby_fields
            )));
        }
        Ok(())
    }

    /// # Errors
    /// Returns `Error::InvalidQueryOption` when `$expand` nests deeper than allowed.
    pub fn validate_expand_depth(&self, depth: usize) -> Result<(), Error> {
        if depth > self.max_expand_depth {
            return Err(Error::InvalidQueryOption {
                option: "$expand".to_owned(),
                message: format!("nesting exceeds maximum depth of {}", self.max_expand_depth),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use figment::providers::Serialized;
    use serde_json::json;

    #[test]
    fn test_default_limits() {
        let limits = ODataLimits::default();
        assert_eq!(limits.max_top, 1000);
        assert_eq!(limits.max_orderby_fields, 5);
        assert_eq!(limits.max_filter_length, 2000);
        assert_eq!(limits.max_expand_depth, 3);
        assert_eq!(limits.max_page_size, 200);
    }

    #[test]
    fn test_validate_top() {
        let limits = ODataLimits::default();
        assert!(limits.validate_top(500).is_ok());
        assert!(limits.validate_top(1000).is_ok());
        assert_eq!(limits.validate_top(1001), Err(Error::InvalidLimit(1001)));
    }

    #[test]
    fn test_validate_filter_too_long() {
        let limits = ODataLimits::default();
        assert!(limits.validate_filter("name eq 'John'").is_ok());
        let long_filter = "x".repeat(2001);
        assert!(matches!(
            limits.validate_filter(&long_filter),
            Err(Error::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_validate_orderby_count() {
        let limits = ODataLimits::default();
        assert!(limits.validate_orderby_count(5).is_ok());
        assert!(limits.validate_orderby_count(6).is_err());
    }

    #[test]
    fn test_validate_expand_depth() {
        let limits = ODataLimits::new().with_max_expand_depth(1);
        assert!(limits.validate_expand_depth(1).is_ok());
        assert!(matches!(
            limits.validate_expand_depth(2),
            Err(Error::InvalidQueryOption { .. })
        ));
    }

    #[test]
    fn test_custom_limits() {
        let limits = ODataLimits::new()
            .with_max_top(100)
            .with_max_orderby_fields(3)
            .with_max_filter_length(500)
            .with_max_page_size(25);

        assert_eq!(limits.max_top, 100);
        assert_eq!(limits.max_orderby_fields, 3);
        assert_eq!(limits.max_filter_length, 500);
        assert_eq!(limits.max_page_size, 25);
    }

    #[test]
    fn test_from_figment_partial_section() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "odata": { "max_top": 50, "max_page_size": 10 }
        })));
        let limits = ODataLimits::from_figment(&figment).unwrap();
        assert_eq!(limits.max_top, 50);
        assert_eq!(limits.max_page_size, 10);
        assert_eq!(limits.max_orderby_fields, 5);
    }

    #[test]
    fn test_from_figment_missing_section() {
        let figment = Figment::new().merge(Serialized::defaults(json!({ "database": {} })));
        let limits = ODataLimits::from_figment(&figment).unwrap();
        assert_eq!(limits, ODataLimits::default());
    }

    #[test]
    fn test_from_figment_bad_type() {
        let figment = Figment::new().merge(Serialized::defaults(json!({
            "odata": { "max_top": "lots" }
        })));
        assert!(ODataLimits::from_figment(&figment).is_err());
    }
}
