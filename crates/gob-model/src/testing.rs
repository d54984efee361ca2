//! Shared model fixture for tests across the workspace

use crate::Registry;

/// Small model covering every relation shape
///
/// * `catalog:collectiona` – plain collection with a single reference to
///   `collectionb`, a many reference to `collectionb`, a single reference to
///   the versioned `collectionc` and a geometry.
/// * `catalog:collectionb` – plain collection with a many reference to the
///   versioned `collectionc`.
/// * `catalog:collectionc` – versioned collection.
/// * `secure:personen` – collection with encrypted attributes, also nested in
///   a structured attribute.
pub const SAMPLE_MODEL: &str = r#"{
    "catalog": {
        "abbreviation": "CAT",
        "collections": {
            "collectiona": {
                "abbreviation": "CLA",
                "has_states": false,
                "attributes": {
                    "identificatie": {"type": "GOB.String"},
                    "naam": {"type": "GOB.String"},
                    "aantal": {"type": "GOB.Integer"},
                    "geometrie": {"type": "GOB.Geo.Point"},
                    "referentie": {"type": "GOB.Reference", "ref": "catalog:collectionb"},
                    "referenties": {"type": "GOB.ManyReference", "ref": "catalog:collectionb"},
                    "versie_ref": {"type": "GOB.Reference", "ref": "catalog:collectionc"}
                }
            },
            "collectionb": {
                "abbreviation": "CLB",
                "has_states": false,
                "attributes": {
                    "identificatie": {"type": "GOB.String"},
                    "naam": {"type": "GOB.String"},
                    "ligt_in": {"type": "GOB.ManyReference", "ref": "catalog:collectionc"}
                }
            },
            "collectionc": {
                "abbreviation": "CLC",
                "has_states": true,
                "attributes": {
                    "identificatie": {"type": "GOB.String"},
                    "naam": {"type": "GOB.String"}
                }
            }
        }
    },
    "secure": {
        "abbreviation": "SEC",
        "collections": {
            "personen": {
                "abbreviation": "PRS",
                "has_states": false,
                "attributes": {
                    "identificatie": {"type": "GOB.String"},
                    "naam": {"type": "GOB.String"},
                    "bsn": {"type": "GOB.SecureString"},
                    "details": {
                        "type": "GOB.JSON",
                        "attributes": {
                            "geboortedatum": {"type": "GOB.SecureDate"},
                            "plaats": {"type": "GOB.String"}
                        }
                    }
                }
            }
        }
    }
}"#;

/// Registry built from [`SAMPLE_MODEL`]
pub fn sample_registry() -> Registry {
    Registry::from_json_str(SAMPLE_MODEL).expect("sample model is valid")
}
