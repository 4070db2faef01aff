use serde_json::{Map, Value};

/// Raw FtM entity record as parsed from one NDJSON line.
///
/// The property set varies by schema and is open-ended, so records stay as
/// untyped JSON and extraction goes through the accessors below.
pub type RawEntity = Value;

/// Coerce a JSON value to a string. Strings pass through, null becomes
/// empty, anything else uses its JSON rendering.
pub fn coerce_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Top-level field of the entity record, coerced to string, empty if absent.
pub fn field_str(entity: &RawEntity, key: &str) -> String {
    entity.get(key).map(coerce_str).unwrap_or_default()
}

/// The `datasets` array comma-joined. A different delimiter from property
/// lists on purpose: dataset names may contain pipes.
pub fn join_datasets(entity: &RawEntity) -> String {
    entity
        .get("datasets")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|v| !v.is_null())
                .map(coerce_str)
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default()
}

/// The `properties` mapping, if present and an object.
pub fn properties(entity: &RawEntity) -> Option<&Map<String, Value>> {
    entity.get("properties").and_then(Value::as_object)
}

fn property_values<'a>(
    props: Option<&'a Map<String, Value>>,
    key: &str,
) -> impl Iterator<Item = String> + 'a {
    props
        .and_then(|p| p.get(key))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|v| !v.is_null())
        .map(coerce_str)
}

/// First value of a property array, or empty. FtM stores even single
/// values as arrays.
pub fn first_value(props: Option<&Map<String, Value>>, key: &str) -> String {
    property_values(props, key).next().unwrap_or_default()
}

/// All values of a property array pipe-joined, source order preserved.
pub fn join_values(props: Option<&Map<String, Value>>, key: &str) -> String {
    property_values(props, key).collect::<Vec<_>>().join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coercion_handles_non_string_values() {
        assert_eq!(coerce_str(&json!("abc")), "abc");
        assert_eq!(coerce_str(&json!(null)), "");
        assert_eq!(coerce_str(&json!(42)), "42");
        assert_eq!(coerce_str(&json!(true)), "true");
    }

    #[test]
    fn missing_fields_are_empty_strings() {
        let entity = json!({"id": "e1"});
        assert_eq!(field_str(&entity, "id"), "e1");
        assert_eq!(field_str(&entity, "caption"), "");
        assert_eq!(join_datasets(&entity), "");
        assert_eq!(first_value(properties(&entity), "birthDate"), "");
        assert_eq!(join_values(properties(&entity), "name"), "");
    }

    #[test]
    fn join_order_is_preserved_without_dedup() {
        let entity = json!({
            "properties": {"name": ["B", "A", "B"]}
        });
        assert_eq!(join_values(properties(&entity), "name"), "B|A|B");
    }

    #[test]
    fn null_values_are_skipped_in_joins() {
        let entity = json!({
            "datasets": ["us_ofac_sdn", null, "eu_fsf"],
            "properties": {"country": ["RU", null]}
        });
        assert_eq!(join_datasets(&entity), "us_ofac_sdn,eu_fsf");
        assert_eq!(join_values(properties(&entity), "country"), "RU");
    }
}
