//! Builders for the Protosure reporting queries.
//!
//! The reporting endpoint speaks an aggregation-pipeline dialect: a `$match`
//! stage followed by a `$count` stage whose result rows carry a single
//! `count` field.

use serde_json::{json, Map, Value};

use crate::client::CrmError;

fn match_stage(clause: Value) -> Value {
    json!({ "$match": clause })
}

fn count_stage() -> Value {
    json!({ "$count": "count" })
}

/// Count of quotes whose address widget holds the given ZIP.
pub fn zip_count_query(address_widget_id: &str, zip: &str) -> Value {
    let mut clause = Map::new();
    clause.insert(format!("formData.{address_widget_id}.zip"), Value::String(zip.to_string()));

    json!({ "aggregate": [match_stage(Value::Object(clause)), count_stage()] })
}

/// Count of quotes matching both name widgets exactly.
pub fn name_count_query(
    first_name_widget_id: &str,
    first_name: &str,
    last_name_widget_id: &str,
    last_name: &str,
) -> Value {
    let mut first_clause = Map::new();
    first_clause
        .insert(format!("formData.{first_name_widget_id}"), Value::String(first_name.to_string()));
    let mut last_clause = Map::new();
    last_clause
        .insert(format!("formData.{last_name_widget_id}"), Value::String(last_name.to_string()));

    let clause = json!({ "$and": [Value::Object(first_clause), Value::Object(last_clause)] });
    json!({ "aggregate": [match_stage(clause), count_stage()] })
}

/// Extract the count from a reporting response body. An empty result set
/// means nothing matched; a present first row must carry a `count` field.
pub fn count_from_rows(rows: &Value) -> Result<u64, CrmError> {
    let rows = rows
        .as_array()
        .ok_or_else(|| CrmError::MalformedResponse("expected a result array".to_string()))?;

    match rows.first() {
        None => Ok(0),
        Some(row) => row.get("count").and_then(Value::as_u64).ok_or_else(|| {
            CrmError::MalformedResponse("first result row has no `count` field".to_string())
        }),
    }
}
