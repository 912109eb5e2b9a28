//! JSON-schema preparation for forced tool use.
//!
//! The Messages API wants a plain, self-contained object schema: no `$ref`
//! indirection, no `$schema` marker, and every property required.

use schemars::{schema_for, JsonSchema};

/// Generate a tool-input schema for `T`: inlined definitions, every property
/// required, `additionalProperties: false` on all objects.
pub fn tool_input_schema<T: JsonSchema>() -> serde_json::Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_default();

    let definitions = value
        .as_object()
        .and_then(|map| map.get("definitions"))
        .cloned();
    if let Some(defs) = &definitions {
        inline_refs(&mut value, defs);
    }
    close_object_schemas(&mut value);

    if let serde_json::Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
    }

    value
}

fn close_object_schemas(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }
            for (_, v) in map.iter_mut() {
                close_object_schemas(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                close_object_schemas(item);
            }
        }
        _ => {}
    }
}

fn inline_refs(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(name) {
                        let mut resolved = def.clone();
                        inline_refs(&mut resolved, definitions);
                        *value = resolved;
                        return;
                    }
                }
            }

            // A doc-commented ref field arrives as {"description": ...,
            // "allOf": [{"$ref": ...}]} — draft-7 forbids keywords beside
            // $ref, so schemars hoists the ref. Collapse the wrapper so the
            // resolved object sits directly on the property.
            if let Some(serde_json::Value::Array(all_of)) = map.get("allOf").cloned() {
                if all_of.len() == 1 {
                    *value = all_of.into_iter().next().unwrap();
                    inline_refs(value, definitions);
                    return;
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct Inner {
        #[allow(dead_code)]
        label: String,
    }

    #[derive(Deserialize, JsonSchema)]
    struct Outer {
        #[allow(dead_code)]
        name: String,
        #[allow(dead_code)]
        maybe: Option<f64>,
        #[allow(dead_code)]
        items: Vec<Inner>,
    }

    #[test]
    fn schema_is_self_contained() {
        let schema = tool_input_schema::<Outer>();
        let rendered = serde_json::to_string(&schema).unwrap();
        assert!(!rendered.contains("$ref"));
        assert!(!rendered.contains("$schema"));
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
    }

    #[test]
    fn all_properties_are_required() {
        let schema = tool_input_schema::<Outer>();
        let required: Vec<String> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(required.contains(&"name".to_string()));
        assert!(required.contains(&"maybe".to_string()));
        assert!(required.contains(&"items".to_string()));
    }

    #[derive(Deserialize, JsonSchema)]
    struct Documented {
        /// A doc comment forces the ref into an allOf wrapper
        #[allow(dead_code)]
        detail: Inner,
    }

    #[test]
    fn doc_commented_ref_fields_are_collapsed_inline() {
        let schema = tool_input_schema::<Documented>();
        let rendered = serde_json::to_string(&schema).unwrap();
        assert!(!rendered.contains("allOf"));
        assert!(!rendered.contains("$ref"));

        // The resolved object sits directly on the property, fully closed
        let detail = &schema["properties"]["detail"];
        assert_eq!(detail["type"], serde_json::json!("object"));
        assert_eq!(detail["additionalProperties"], serde_json::json!(false));
        assert_eq!(detail["required"], serde_json::json!(["label"]));
    }
}
