// SPDX-License-Identifier: MIT OR Apache-2.0

use sbc_config::config_schema;
use serde_json::json;

fn validator() -> jsonschema::Validator {
    jsonschema::validator_for(&config_schema()).expect("compile schema")
}

#[test]
fn config_schema_is_generated() {
    let schema = config_schema();
    assert_eq!(
        schema.get("$schema").and_then(|v| v.as_str()),
        Some("https://json-schema.org/draft/2020-12/schema"),
    );
    let props = schema
        .get("properties")
        .expect("schema should have properties");
    assert!(props.get("log_level").is_some());
    assert!(props.get("compression").is_some());
}

#[test]
fn full_config_validates_against_schema() {
    let instance = json!({
        "log_level": "debug",
        "compression": {
            "algorithm": "zstd",
            "minimum_size": 2048,
            "level": 3,
            "accept": ["gzip", "zstd"]
        }
    });
    assert!(validator().is_valid(&instance));
}

#[test]
fn empty_config_validates_against_schema() {
    assert!(validator().is_valid(&json!({})));
}

#[test]
fn unknown_algorithm_fails_schema_validation() {
    let instance = json!({ "compression": { "algorithm": "brotli" } });
    assert!(!validator().is_valid(&instance));
}

#[test]
fn negative_threshold_fails_schema_validation() {
    let instance = json!({ "compression": { "minimum_size": -1 } });
    assert!(!validator().is_valid(&instance));
}

#[test]
fn unknown_keys_fail_schema_validation() {
    let instance = json!({ "compression": { "threshold": 10 } });
    assert!(!validator().is_valid(&instance));
}
