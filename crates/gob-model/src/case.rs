//! Wire name conversion
//!
//! The query language and the ndjson output use camelCase, the model and the
//! database use snake_case.

use convert_case::{Case, Casing};

/// Convert a wire name (`ligtInBuurt`) to its model name (`ligt_in_buurt`)
pub fn to_snake(name: &str) -> String {
    name.to_case(Case::Snake)
}

/// Convert a model name (`ligt_in_buurt`) to its wire name (`ligtInBuurt`)
pub fn to_camel(name: &str) -> String {
    name.to_case(Case::Camel)
}
