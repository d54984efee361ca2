//! Immutable metadata snapshot
//!
//! Built once from the model file; every lookup afterwards is read-only, so a
//! single `Arc<Registry>` is shared by all requests.

use crate::case::to_camel;
use crate::error::{ModelError, ModelResult};
use crate::types::{attributes_from_raw, Attribute, Catalog, Collection, RawCatalog, RawCollection};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// A relation seen from the referenced side
///
/// For attribute `ligt_in_buurt` of `meetbouten:meetbouten` pointing to
/// `gebieden:buurten`, the buurten collection gets the inverse relation
/// `inv_ligt_in_buurt_meetbouten_meetbouten`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseRelation {
    /// Relation name as used in queries (snake_case)
    pub name: String,
    pub src_catalog: String,
    pub src_collection: String,
    /// Reference attribute on the source collection
    pub attribute: String,
    /// Whether the source attribute is many-valued
    pub many: bool,
}

/// A named relation resolved against a collection
#[derive(Debug, Clone, Copy)]
pub enum RelationRef<'a> {
    /// Reference attribute owned by the collection
    Forward {
        attribute: &'a Attribute,
        target: &'a Collection,
    },
    /// Reference attribute of another collection pointing here
    Inverse {
        relation: &'a InverseRelation,
        source: &'a Collection,
    },
}

/// Metadata registry snapshot
#[derive(Debug, Default)]
pub struct Registry {
    catalogs: Vec<Catalog>,
    /// (catalog, collection) -> (catalog index, collection index)
    index: HashMap<(String, String), (usize, usize)>,
    /// camelCase root field name -> (catalog, collection)
    roots: HashMap<String, (String, String)>,
    /// (catalog, collection) -> inverse relations pointing at it
    inverse: HashMap<(String, String), Vec<InverseRelation>>,
}

impl Registry {
    /// Build a registry from catalogs, validating every reference target
    pub fn new(catalogs: Vec<Catalog>) -> ModelResult<Self> {
        let mut registry = Self {
            catalogs,
            ..Default::default()
        };
        registry.build_indices()?;

        info!(
            catalogs = registry.catalogs.len(),
            collections = registry.index.len(),
            "Metadata registry loaded"
        );
        Ok(registry)
    }

    /// Load a registry from a JSON model file
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "Reading model file");
        Self::from_json_str(&contents)
    }

    /// Load a registry from model JSON
    ///
    /// ```json
    /// {"meetbouten": {"abbreviation": "MBN", "collections": {
    ///     "meetbouten": {"abbreviation": "MBT", "has_states": false,
    ///                    "attributes": {"identificatie": {"type": "GOB.String"}}}}}}
    /// ```
    pub fn from_json_str(json: &str) -> ModelResult<Self> {
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;

        let mut catalogs = Vec::with_capacity(raw.len());
        for (catalog_name, value) in raw {
            let raw_catalog: RawCatalog = serde_json::from_value(value)?;
            let mut collections = Vec::with_capacity(raw_catalog.collections.len());
            for (collection_name, value) in raw_catalog.collections {
                let raw_collection: RawCollection = serde_json::from_value(value)?;
                collections.push(Collection::new(
                    catalog_name.clone(),
                    collection_name,
                    raw_collection.abbreviation,
                    raw_collection.has_states,
                    attributes_from_raw(raw_collection.attributes)?,
                ));
            }
            catalogs.push(Catalog::new(
                catalog_name,
                raw_catalog.abbreviation,
                collections,
            ));
        }

        Self::new(catalogs)
    }

    fn build_indices(&mut self) -> ModelResult<()> {
        for (ci, catalog) in self.catalogs.iter().enumerate() {
            for (i, collection) in catalog.collections.iter().enumerate() {
                let key = (catalog.name.clone(), collection.name.clone());
                self.index.insert(key.clone(), (ci, i));
                self.roots.insert(
                    to_camel(&format!("{}_{}", catalog.name, collection.name)),
                    key,
                );
            }
        }

        let mut inverse: HashMap<(String, String), Vec<InverseRelation>> = HashMap::new();
        for catalog in &self.catalogs {
            for collection in &catalog.collections {
                for attribute in collection.references() {
                    // Reference attributes always carry a target (checked while parsing)
                    let Some(target) = &attribute.reference else {
                        continue;
                    };
                    let key = (target.catalog.clone(), target.collection.clone());
                    if !self.index.contains_key(&key) {
                        return Err(ModelError::UnknownReference {
                            catalog: catalog.name.clone(),
                            collection: collection.name.clone(),
                            attribute: attribute.name.clone(),
                            target: target.to_string(),
                        });
                    }
                    inverse.entry(key).or_default().push(InverseRelation {
                        name: format!(
                            "inv_{}_{}_{}",
                            attribute.name, catalog.name, collection.name
                        ),
                        src_catalog: catalog.name.clone(),
                        src_collection: collection.name.clone(),
                        attribute: attribute.name.clone(),
                        many: attribute.attribute_type.is_many(),
                    });
                }
            }
        }
        self.inverse = inverse;
        Ok(())
    }

    /// All catalogs in model order
    pub fn catalogs(&self) -> &[Catalog] {
        &self.catalogs
    }

    /// All collections of all catalogs
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.catalogs.iter().flat_map(|c| c.collections.iter())
    }

    /// Look up a catalog by name
    pub fn catalog(&self, name: &str) -> Option<&Catalog> {
        self.catalogs.iter().find(|c| c.name == name)
    }

    /// Look up a collection
    pub fn collection(&self, catalog: &str, name: &str) -> Option<&Collection> {
        self.index
            .get(&(catalog.to_string(), name.to_string()))
            .map(|&(ci, i)| &self.catalogs[ci].collections[i])
    }

    /// Look up a collection, failing when it is unknown
    pub fn get_collection(&self, catalog: &str, name: &str) -> ModelResult<&Collection> {
        self.collection(catalog, name)
            .ok_or_else(|| ModelError::UnknownCollection {
                catalog: catalog.to_string(),
                collection: name.to_string(),
            })
    }

    /// Backing table of a collection
    pub fn get_table_name(&self, catalog: &str, name: &str) -> ModelResult<String> {
        self.get_collection(catalog, name).map(Collection::table_name)
    }

    /// Backing table of a collection, `None` when unknown
    pub fn table_name(&self, catalog: &str, name: &str) -> Option<String> {
        self.collection(catalog, name).map(Collection::table_name)
    }

    /// Resolve a query root field (`meetboutenMeetbouten`) to its collection
    pub fn resolve_root(&self, field: &str) -> Option<&Collection> {
        self.roots
            .get(field)
            .and_then(|(catalog, collection)| self.collection(catalog, collection))
    }

    /// Inverse relations pointing at a collection
    pub fn inverse_relations(&self, catalog: &str, collection: &str) -> &[InverseRelation] {
        self.inverse
            .get(&(catalog.to_string(), collection.to_string()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve a relation name (snake_case) on a collection
    ///
    /// Owned reference attributes win over inverse relations.
    pub fn relation(&self, catalog: &str, collection: &str, name: &str) -> Option<RelationRef<'_>> {
        let owner = self.collection(catalog, collection)?;
        if let Some(attribute) = owner.attribute(name) {
            let target = attribute.reference.as_ref()?;
            let target = self.collection(&target.catalog, &target.collection)?;
            return Some(RelationRef::Forward { attribute, target });
        }

        let relation = self
            .inverse_relations(catalog, collection)
            .iter()
            .find(|r| r.name == name)?;
        let source = self.collection(&relation.src_catalog, &relation.src_collection)?;
        Some(RelationRef::Inverse { relation, source })
    }

    /// Name of the relation materialization table for a reference attribute
    ///
    /// `rel_<src cat abbr>_<src col abbr>_<dst cat abbr>_<dst col abbr>_<attribute>`
    pub fn relation_table_name(
        &self,
        catalog: &str,
        collection: &str,
        attribute: &str,
    ) -> Option<String> {
        let src_catalog = self.catalog(catalog)?;
        let src = self.collection(catalog, collection)?;
        let target = src.attribute(attribute)?.reference.as_ref()?;
        let dst_catalog = self.catalog(&target.catalog)?;
        let dst = self.collection(&target.catalog, &target.collection)?;

        Some(
            format!(
                "rel_{}_{}_{}_{}_{}",
                src_catalog.abbreviation,
                src.abbreviation,
                dst_catalog.abbreviation,
                dst.abbreviation,
                attribute
            )
            .to_lowercase(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeType;

    const MODEL: &str = r#"{
        "meetbouten": {
            "abbreviation": "MBN",
            "collections": {
                "meetbouten": {
                    "abbreviation": "MBT",
                    "attributes": {
                        "identificatie": {"type": "GOB.String"},
                        "ligt_in_buurt": {"type": "GOB.Reference", "ref": "gebieden:buurten"},
                        "geometrie": {"type": "GOB.Geo.Point"}
                    }
                }
            }
        },
        "gebieden": {
            "abbreviation": "GBD",
            "collections": {
                "buurten": {
                    "abbreviation": "BRT",
                    "has_states": true,
                    "attributes": {
                        "naam": {"type": "GOB.String"},
                        "ligt_in_wijken": {"type": "GOB.ManyReference", "ref": "gebieden:wijken"}
                    }
                },
                "wijken": {
                    "abbreviation": "WIJK",
                    "attributes": {"naam": {"type": "GOB.String"}}
                }
            }
        }
    }"#;

    #[test]
    fn test_load_keeps_attribute_order() {
        let registry = Registry::from_json_str(MODEL).unwrap();
        let collection = registry.get_collection("meetbouten", "meetbouten").unwrap();
        let names: Vec<_> = collection.attribute_names().collect();
        assert_eq!(names, vec!["identificatie", "ligt_in_buurt", "geometrie"]);
        assert_eq!(
            collection.attribute("geometrie").unwrap().attribute_type,
            AttributeType::Geometry
        );
    }

    #[test]
    fn test_unknown_collection() {
        let registry = Registry::from_json_str(MODEL).unwrap();
        let result = registry.get_collection("meetbouten", "nope");
        assert!(matches!(result, Err(ModelError::UnknownCollection { .. })));
    }

    #[test]
    fn test_resolve_root() {
        let registry = Registry::from_json_str(MODEL).unwrap();
        let collection = registry.resolve_root("gebiedenBuurten").unwrap();
        assert_eq!(collection.catalog, "gebieden");
        assert_eq!(collection.name, "buurten");
        assert!(registry.resolve_root("gebiedenStraten").is_none());
    }

    #[test]
    fn test_inverse_relations_derived() {
        let registry = Registry::from_json_str(MODEL).unwrap();
        let inverse = registry.inverse_relations("gebieden", "buurten");
        assert_eq!(inverse.len(), 1);
        assert_eq!(inverse[0].name, "inv_ligt_in_buurt_meetbouten_meetbouten");
        assert!(!inverse[0].many);

        let inverse = registry.inverse_relations("gebieden", "wijken");
        assert_eq!(inverse[0].name, "inv_ligt_in_wijken_gebieden_buurten");
        assert!(inverse[0].many);
    }

    #[test]
    fn test_relation_resolution() {
        let registry = Registry::from_json_str(MODEL).unwrap();

        match registry.relation("meetbouten", "meetbouten", "ligt_in_buurt") {
            Some(RelationRef::Forward { attribute, target }) => {
                assert_eq!(attribute.name, "ligt_in_buurt");
                assert_eq!(target.name, "buurten");
            }
            other => panic!("expected forward relation, got {:?}", other),
        }

        match registry.relation("gebieden", "buurten", "inv_ligt_in_buurt_meetbouten_meetbouten") {
            Some(RelationRef::Inverse { relation, source }) => {
                assert_eq!(relation.attribute, "ligt_in_buurt");
                assert_eq!(source.name, "meetbouten");
            }
            other => panic!("expected inverse relation, got {:?}", other),
        }

        // Scalars are not relations
        assert!(registry
            .relation("meetbouten", "meetbouten", "identificatie")
            .is_none());
    }

    #[test]
    fn test_relation_table_name() {
        let registry = Registry::from_json_str(MODEL).unwrap();
        assert_eq!(
            registry
                .relation_table_name("meetbouten", "meetbouten", "ligt_in_buurt")
                .as_deref(),
            Some("rel_mbn_mbt_gbd_brt_ligt_in_buurt")
        );
        assert!(registry
            .relation_table_name("meetbouten", "meetbouten", "identificatie")
            .is_none());
    }

    #[test]
    fn test_dangling_model_reference_rejected() {
        let model = r#"{"a": {"abbreviation": "A", "collections": {
            "b": {"abbreviation": "B", "attributes": {
                "ref": {"type": "GOB.Reference", "ref": "x:y"}}}}}}"#;
        let result = Registry::from_json_str(model);
        assert!(matches!(result, Err(ModelError::UnknownReference { .. })));
    }
}
