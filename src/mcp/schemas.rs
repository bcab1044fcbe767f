//! JSON schema builders for MCP tools.

use serde_json::{Map, Value, json};

/// Build the schema describing the `summarize-document` tool input.
pub(crate) fn summarize_input_schema() -> Map<String, Value> {
    let properties = document_properties();
    let mut schema = finalize_object_schema(properties, &["path"]);
    schema.insert(
        "examples".into(),
        Value::Array(vec![
            json!({ "path": "/tmp/report.pdf" }),
            json!({ "path": "/tmp/report.pdf", "start_page": 1, "end_page": -1, "temperature": 0.2 }),
        ]),
    );
    schema
}

/// Build the schema describing the `query-document` tool input.
pub(crate) fn query_input_schema() -> Map<String, Value> {
    let mut properties = document_properties();
    properties.insert(
        "query".into(),
        string_schema("Question to answer from the document"),
    );
    let mut schema = finalize_object_schema(properties, &["path", "query"]);
    schema.insert(
        "examples".into(),
        Value::Array(vec![json!({
            "path": "/tmp/report.pdf",
            "query": "What data sources does the report use?",
            "start_page": 0,
            "end_page": 10
        })]),
    );
    schema
}

/// Schema representing an empty object (used for parameterless tools).
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    finalize_object_schema(Map::new(), &[])
}

/// Properties shared by both document tools: source path, page range, and model overrides.
fn document_properties() -> Map<String, Value> {
    let mut properties = Map::new();
    properties.insert(
        "path".into(),
        string_schema("Local path of the PDF to analyze"),
    );

    let mut start_schema = Map::new();
    start_schema.insert("type".into(), Value::String("integer".into()));
    start_schema.insert(
        "description".into(),
        Value::String(
            "0-based first page (inclusive); negative values count from the end".into(),
        ),
    );
    properties.insert("start_page".into(), Value::Object(start_schema));

    let mut end_schema = Map::new();
    end_schema.insert("type".into(), Value::String("integer".into()));
    end_schema.insert(
        "description".into(),
        Value::String(
            "0-based page after the last selected one (exclusive); -1 drops the last page".into(),
        ),
    );
    properties.insert("end_page".into(), Value::Object(end_schema));

    properties.insert(
        "model_name".into(),
        string_schema("Optional override for the chat model"),
    );

    let mut temperature_schema = Map::new();
    temperature_schema.insert("type".into(), Value::String("number".into()));
    temperature_schema.insert(
        "description".into(),
        Value::String("Sampling temperature".into()),
    );
    temperature_schema.insert("minimum".into(), json!(0.0));
    temperature_schema.insert("maximum".into(), json!(1.0));
    properties.insert("temperature".into(), Value::Object(temperature_schema));

    let mut provider_schema = Map::new();
    provider_schema.insert("type".into(), Value::String("string".into()));
    provider_schema.insert(
        "enum".into(),
        Value::Array(
            ["openai", "ollama"]
                .into_iter()
                .map(|v| Value::String(v.into()))
                .collect(),
        ),
    );
    provider_schema.insert(
        "description".into(),
        Value::String("Endpoint protocol; defaults to MODEL_PROVIDER".into()),
    );
    properties.insert("provider".into(), Value::Object(provider_schema));

    properties.insert(
        "base_url".into(),
        string_schema("Optional override for the chat-completion endpoint"),
    );
    properties.insert(
        "api_key".into(),
        string_schema("Credential for hosted endpoints; defaults to API_KEY"),
    );

    properties
}

fn string_schema(description: &str) -> Value {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("string".into()));
    schema.insert("description".into(), Value::String(description.into()));
    Value::Object(schema)
}

fn finalize_object_schema(properties: Map<String, Value>, required: &[&str]) -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert(
            "required".into(),
            Value::Array(
                required
                    .iter()
                    .map(|&key| Value::String(key.into()))
                    .collect(),
            ),
        );
    }
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}
