//! SeaORM entities for the generation-tagged snapshot schema.
//!
//! Every table except `active_version` carries a `version` column; a row
//! belongs to exactly one generation and is unique per natural key within it.

pub mod active_version;
pub mod issue;
pub mod issue_comment;
pub mod organization;
pub mod prelude;
pub mod pull_request;
pub mod pull_request_comment;
pub mod pull_request_review;
pub mod pull_request_review_comment;
pub mod repository;
pub mod user;

/// JSON array column value from a list of names.
pub(crate) fn json_list(items: &[String]) -> serde_json::Value {
    serde_json::Value::from(items.to_vec())
}

/// Names back out of a JSON array column; anything else reads as empty.
pub(crate) fn list_from_json(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
