use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ast::Value;
use crate::Error;

/// EDM primitive types supported by declared properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    Date,
    DateTimeOffset,
    TimeOfDay,
}

const IDENTIFIERS: &[(PrimitiveType, &str)] = &[
    (PrimitiveType::Boolean, "Edm.Boolean"),
    (PrimitiveType::Byte, "Edm.Byte"),
    (PrimitiveType::SByte, "Edm.SByte"),
    (PrimitiveType::Int16, "Edm.Int16"),
    (PrimitiveType::Int32, "Edm.Int32"),
    (PrimitiveType::Int64, "Edm.Int64"),
    (PrimitiveType::Single, "Edm.Single"),
    (PrimitiveType::Double, "Edm.Double"),
    (PrimitiveType::Decimal, "Edm.Decimal"),
    (PrimitiveType::String, "Edm.String"),
    (PrimitiveType::Guid, "Edm.Guid"),
    (PrimitiveType::Date, "Edm.Date"),
    (PrimitiveType::DateTimeOffset, "Edm.DateTimeOffset"),
    (PrimitiveType::TimeOfDay, "Edm.TimeOfDay"),
];

impl PrimitiveType {
    /// Qualified EDM name, e.g. `Edm.Int32`.
    #[must_use]
    pub fn identifier(self) -> &'static str {
        IDENTIFIERS
            .iter()
            .find(|(t, _)| *t == self)
            .map_or("Edm.Untyped", |(_, id)| id)
    }

    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        IDENTIFIERS
            .iter()
            .find(|(_, id)| *id == identifier)
            .map(|(t, _)| *t)
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte
                | Self::SByte
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Single
                | Self::Double
                | Self::Decimal
        )
    }

    #[must_use]
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::SByte | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Convert a stored JSON value into a typed value.
    ///
    /// # Errors
    /// Returns `Error::TypeMismatch` when the JSON shape does not fit this type.
    pub fn read_json(self, json: &serde_json::Value) -> Result<Value, Error> {
        use serde_json::Value as J;

        let mismatch = || {
            Error::TypeMismatch(format!(
                "cannot read {} from JSON value {json}",
                self.identifier()
            ))
        };

        match (self, json) {
            (_, J::Null) => Ok(Value::Null),
            (Self::Boolean, J::Bool(b)) => Ok(Value::Bool(*b)),
            (t, J::Number(n)) if t.is_numeric() => BigDecimal::from_str(&n.to_string())
                .map(Value::Number)
                .map_err(|_| mismatch()),
            (Self::Decimal, J::String(s)) => BigDecimal::from_str(s)
                .map(Value::Number)
                .map_err(|_| mismatch()),
            (Self::String, J::String(s)) => Ok(Value::String(s.clone())),
            (Self::Guid, J::String(s)) => Uuid::parse_str(s).map(Value::Uuid).map_err(|_| mismatch()),
            (Self::Date, J::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| mismatch()),
            (Self::DateTimeOffset, J::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| mismatch()),
            (Self::TimeOfDay, J::String(s)) => NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                .map(Value::Time)
                .map_err(|_| mismatch()),
            _ => Err(mismatch()),
        }
    }
}
