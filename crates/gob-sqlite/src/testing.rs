//! Seeded database fixture shared by tests across the workspace

use crate::config::SqliteConfig;
use crate::load::load_records;
use crate::store::SqliteStore;
use gob_model::testing::sample_registry;
use std::path::Path;

/// Records for the sample model
///
/// * `collectiona`: `A1` references `B1`, `B2` and a dangling `BX`, and
///   state 2 of `C1`; `A2` has a dangling single reference and no many
///   references; `A3` is soft-deleted.
/// * `collectionb`: `B1` lies in `C1` (state 1), `B2` lies nowhere.
/// * `collectionc`: two states of `C1`.
/// * `personen`: `P1` with a level 5 secure `bsn` of `123`.
pub const SAMPLE_RECORDS: &str = r#"
{"kind": "entity", "catalog": "catalog", "collection": "collectionc", "values": {"_id": "C1", "volgnummer": 1, "naam": "c1", "begin_geldigheid": "2020-01-01", "eind_geldigheid": "2021-01-01"}}
{"kind": "entity", "catalog": "catalog", "collection": "collectionc", "values": {"_id": "C1", "volgnummer": 2, "naam": "c1v2", "begin_geldigheid": "2021-01-01"}}
{"kind": "entity", "catalog": "catalog", "collection": "collectionb", "values": {"_id": "B1", "identificatie": "B1", "naam": "b1", "ligt_in": [{"id": "C1", "volgnummer": 1, "bronwaarde": "C1"}]}}
{"kind": "entity", "catalog": "catalog", "collection": "collectionb", "values": {"_id": "B2", "identificatie": "B2", "naam": "b2"}}
{"kind": "entity", "catalog": "catalog", "collection": "collectiona", "values": {"_id": "A1", "identificatie": "A1", "naam": "a1", "aantal": 1, "geometrie": "POINT (1 2)", "referentie": {"id": "B1", "bronwaarde": "B1"}, "referenties": [{"id": "B1", "bronwaarde": "B1"}, {"id": "B2", "bronwaarde": "B2"}, {"id": "BX", "bronwaarde": "BX"}], "versie_ref": {"id": "C1", "volgnummer": 2, "bronwaarde": "C1"}}}
{"kind": "entity", "catalog": "catalog", "collection": "collectiona", "values": {"_id": "A2", "identificatie": "A2", "naam": "a2", "aantal": 2, "referentie": {"id": "missing", "bronwaarde": "M", "broninfo": {"regel": 7}}}}
{"kind": "entity", "catalog": "catalog", "collection": "collectiona", "values": {"_id": "A3", "identificatie": "A3", "naam": "a3", "_date_deleted": "2020-01-01T00:00:00"}}
{"kind": "relation", "catalog": "catalog", "collection": "collectiona", "attribute": "referentie", "values": {"src_id": "A1", "dst_id": "B1", "bronwaarde": "B1", "begin_geldigheid": "2020-06-01"}}
{"kind": "relation", "catalog": "catalog", "collection": "collectiona", "attribute": "versie_ref", "values": {"src_id": "A1", "dst_id": "C1", "dst_volgnummer": 2, "bronwaarde": "C1", "begin_geldigheid": "2021-02-01"}}
{"kind": "relation", "catalog": "catalog", "collection": "collectionb", "attribute": "ligt_in", "values": {"src_id": "B1", "dst_id": "C1", "dst_volgnummer": 1, "bronwaarde": "C1"}}
{"kind": "entity", "catalog": "secure", "collection": "personen", "values": {"_id": "P1", "identificatie": "P1", "naam": "Jansen", "bsn": {"i": "dev", "l": 5, "v": "MTIz"}, "details": {"geboortedatum": {"i": "dev", "l": 5, "v": "MTk3MC0wMS0wMQ=="}, "plaats": "Amsterdam"}}}
"#;

/// Create a database at `path` with the sample schema and records
pub fn sample_store(path: &Path) -> SqliteStore {
    let registry = sample_registry();
    let store =
        SqliteStore::create(SqliteConfig::new(path), &registry).expect("sample schema applies");
    let mut conn = store.connect_rw().expect("writable connection");
    load_records(&mut conn, &registry, SAMPLE_RECORDS.as_bytes()).expect("sample records load");
    store
}
