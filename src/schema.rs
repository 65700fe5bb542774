//! Index mappings for the paper collection.

use serde_json::{json, Value};

use crate::config::IndexSchema;

/// Accepts bare dates as well as full timestamps.
pub const CREATED_DATE_FORMAT: &str =
    "yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ss'Z'||strict_date_optional_time";

/// The `mappings` object for `schema`. Both variants carry exactly the six
/// document fields; they differ only in how `abstract` is indexed.
pub fn mappings(schema: IndexSchema) -> Value {
    let abstract_type = match schema {
        IndexSchema::Basic => "text",
        IndexSchema::Semantic => "semantic_text",
    };
    json!({
        "properties": {
            "arxiv_id": { "type": "keyword" },
            "title": { "type": "text" },
            "authors": { "type": "keyword" },
            "abstract": { "type": abstract_type },
            "categories": { "type": "keyword" },
            "created": { "type": "date", "format": CREATED_DATE_FORMAT },
        }
    })
}
