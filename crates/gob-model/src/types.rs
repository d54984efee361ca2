//! Catalog, collection and attribute descriptions

use crate::error::{ModelError, ModelResult};
use crate::{BEGIN_VALIDITY, END_VALIDITY, SEQNR};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value held by a secure (encrypted) attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecureKind {
    String,
    Decimal,
    Date,
    DateTime,
}

/// Attribute type as declared in the model (`GOB.String`, `GOB.Reference`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeType {
    String,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Geometry,
    /// Structured value stored as JSON, optionally with nested attributes
    Json,
    /// Single-valued reference to another collection
    Reference,
    /// Many-valued reference to another collection
    ManyReference,
    /// Encrypted value
    Secure(SecureKind),
}

impl AttributeType {
    /// True for single and many-valued references
    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference | Self::ManyReference)
    }

    /// True for many-valued references
    pub fn is_many(&self) -> bool {
        matches!(self, Self::ManyReference)
    }

    /// True when the stored value is JSON text
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json | Self::Secure(_))
    }
}

impl FromStr for AttributeType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = match s {
            "GOB.String" | "GOB.Character" => Self::String,
            "GOB.Integer" | "GOB.PKInteger" => Self::Integer,
            "GOB.Decimal" => Self::Decimal,
            "GOB.Boolean" => Self::Boolean,
            "GOB.Date" => Self::Date,
            "GOB.DateTime" => Self::DateTime,
            "GOB.JSON" | "GOB.IncompleteDate" => Self::Json,
            "GOB.Reference" => Self::Reference,
            "GOB.ManyReference" | "GOB.VeryManyReference" => Self::ManyReference,
            "GOB.SecureString" => Self::Secure(SecureKind::String),
            "GOB.SecureDecimal" => Self::Secure(SecureKind::Decimal),
            "GOB.SecureDate" | "GOB.SecureIncompleteDate" => Self::Secure(SecureKind::Date),
            "GOB.SecureDateTime" => Self::Secure(SecureKind::DateTime),
            geo if geo.starts_with("GOB.Geo.") => Self::Geometry,
            other => return Err(ModelError::UnknownType(other.to_string())),
        };
        Ok(t)
    }
}

/// Target of a reference attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceTarget {
    pub catalog: String,
    pub collection: String,
}

impl FromStr for ReferenceTarget {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((catalog, collection)) if !catalog.is_empty() && !collection.is_empty() => {
                Ok(Self {
                    catalog: catalog.to_string(),
                    collection: collection.to_string(),
                })
            }
            _ => Err(ModelError::InvalidReference(s.to_string())),
        }
    }
}

impl fmt::Display for ReferenceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.catalog, self.collection)
    }
}

/// A single attribute of a collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: String,
    pub attribute_type: AttributeType,
    /// Target collection for references
    pub reference: Option<ReferenceTarget>,
    /// Nested attributes of a structured (JSON) attribute
    pub nested: Vec<Attribute>,
}

impl Attribute {
    /// Create a plain attribute
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            reference: None,
            nested: Vec::new(),
        }
    }

    /// Create a reference attribute
    pub fn reference(name: impl Into<String>, target: ReferenceTarget, many: bool) -> Self {
        let attribute_type = if many {
            AttributeType::ManyReference
        } else {
            AttributeType::Reference
        };
        Self {
            name: name.into(),
            attribute_type,
            reference: Some(target),
            nested: Vec::new(),
        }
    }

    /// Create a structured attribute with nested attributes
    pub fn structured(name: impl Into<String>, nested: Vec<Attribute>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Json,
            reference: None,
            nested,
        }
    }
}

/// A collection (table-like entity) within a catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    pub catalog: String,
    pub name: String,
    pub abbreviation: String,
    pub has_states: bool,
    pub attributes: Vec<Attribute>,
}

impl Collection {
    /// Create a collection; versioned collections get their state attributes
    /// appended when the model does not declare them.
    pub fn new(
        catalog: impl Into<String>,
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        has_states: bool,
        mut attributes: Vec<Attribute>,
    ) -> Self {
        if has_states {
            for (state_attr, attr_type) in [
                (SEQNR, AttributeType::Integer),
                (BEGIN_VALIDITY, AttributeType::DateTime),
                (END_VALIDITY, AttributeType::DateTime),
            ] {
                if !attributes.iter().any(|a| a.name == state_attr) {
                    attributes.push(Attribute::new(state_attr, attr_type));
                }
            }
        }
        Self {
            catalog: catalog.into(),
            name: name.into(),
            abbreviation: abbreviation.into(),
            has_states,
            attributes,
        }
    }

    /// Look up an attribute by model (snake_case) name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Attribute names in declaration order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Reference attributes in declaration order
    pub fn references(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attribute_type.is_reference())
    }

    /// Backing table name
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.catalog, self.name)
    }
}

/// A catalog (dataset) grouping collections
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub name: String,
    pub abbreviation: String,
    pub collections: Vec<Collection>,
}

impl Catalog {
    pub fn new(
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        collections: Vec<Collection>,
    ) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
            collections,
        }
    }
}

// ============================================================================
// Model file representation
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct RawCatalog {
    pub abbreviation: String,
    pub collections: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCollection {
    pub abbreviation: String,
    #[serde(default)]
    pub has_states: bool,
    #[serde(default)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAttribute {
    #[serde(rename = "type")]
    pub attribute_type: String,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub attributes: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Convert an ordered JSON attribute map into attributes, recursing into
/// nested attributes of structured types.
pub(crate) fn attributes_from_raw(
    raw: serde_json::Map<String, serde_json::Value>,
) -> ModelResult<Vec<Attribute>> {
    let mut attributes = Vec::with_capacity(raw.len());
    for (name, value) in raw {
        let spec: RawAttribute = serde_json::from_value(value)?;
        let attribute_type: AttributeType = spec.attribute_type.parse()?;
        let reference = match (&attribute_type, spec.reference) {
            (t, Some(target)) if t.is_reference() => Some(target.parse()?),
            (t, None) if t.is_reference() => {
                return Err(ModelError::InvalidReference(format!("{name}: missing ref")))
            }
            _ => None,
        };
        let nested = match spec.attributes {
            Some(nested) => attributes_from_raw(nested)?,
            None => Vec::new(),
        };
        attributes.push(Attribute {
            name,
            attribute_type,
            reference,
            nested,
        });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("GOB.String", AttributeType::String)]
    #[test_case("GOB.Geo.Polygon", AttributeType::Geometry)]
    #[test_case("GOB.VeryManyReference", AttributeType::ManyReference)]
    #[test_case("GOB.SecureDateTime", AttributeType::Secure(SecureKind::DateTime))]
    fn test_attribute_type_from_str(input: &str, expected: AttributeType) {
        assert_eq!(input.parse::<AttributeType>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_type() {
        let result = "GOB.Nonsense".parse::<AttributeType>();
        assert!(matches!(result, Err(ModelError::UnknownType(_))));
    }

    #[test]
    fn test_reference_target_parse() {
        let target: ReferenceTarget = "gebieden:buurten".parse().unwrap();
        assert_eq!(target.catalog, "gebieden");
        assert_eq!(target.collection, "buurten");
        assert_eq!(target.to_string(), "gebieden:buurten");

        assert!("gebieden".parse::<ReferenceTarget>().is_err());
        assert!(":buurten".parse::<ReferenceTarget>().is_err());
    }

    #[test]
    fn test_versioned_collection_gets_state_attributes() {
        let collection = Collection::new(
            "gebieden",
            "buurten",
            "BRT",
            true,
            vec![Attribute::new("naam", AttributeType::String)],
        );
        let names: Vec<_> = collection.attribute_names().collect();
        assert_eq!(
            names,
            vec!["naam", "volgnummer", "begin_geldigheid", "eind_geldigheid"]
        );
    }

    #[test]
    fn test_plain_collection_has_no_state_attributes() {
        let collection = Collection::new(
            "meetbouten",
            "meetbouten",
            "MBT",
            false,
            vec![Attribute::new("identificatie", AttributeType::String)],
        );
        assert!(collection.attribute(SEQNR).is_none());
        assert_eq!(collection.table_name(), "meetbouten_meetbouten");
    }
}
