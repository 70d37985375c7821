//! End-to-end tests for the public sanitizing API.
//!
//! These cover the behaviour a reporting client relies on when it calls
//! `process(payload)` right before transmitting the payload.

use sanitize_data::{process, Mapping, SanitizeConfig, Sanitizer, Sequence, Value, MASK};
use serde_json::json;

fn sanitize(input: serde_json::Value) -> serde_json::Value {
    process(&Value::from(input)).to_json()
}

#[test]
fn test_card_number_is_masked() {
    assert_eq!(
        sanitize(json!({"card": "1234567890123456"})),
        json!({"card": "********"})
    );
}

#[test]
fn test_authorization_header_is_masked() {
    assert_eq!(
        sanitize(json!({"Authorization": "Bearer xyz"})),
        json!({"Authorization": "********"})
    );
}

#[test]
fn test_plain_note_is_unchanged() {
    assert_eq!(
        sanitize(json!({"note": "hello world"})),
        json!({"note": "hello world"})
    );
}

#[test]
fn test_serialized_object_is_masked_and_reencoded() {
    let sanitized = sanitize(json!({"payload": r#"{"password":"abc"}"#}));
    let payload = sanitized["payload"].as_str().unwrap();
    assert_eq!(payload, r#"{"password":"********"}"#);

    let reparsed: serde_json::Value = serde_json::from_str(payload).unwrap();
    assert_eq!(reparsed, json!({"password": MASK}));
}

#[test]
fn test_empty_string_is_never_masked() {
    assert_eq!(
        sanitize(json!({"password": "", "note": ""})),
        json!({"password": "", "note": ""})
    );
}

#[test]
fn test_every_sensitive_field_name_is_masked() {
    let sanitized = sanitize(json!({
        "authorization": "a",
        "user_password": "b",
        "PASSWD": "c",
        "clientSecret": "d",
        "username": "e"
    }));
    assert_eq!(
        sanitized,
        json!({
            "authorization": MASK,
            "user_password": MASK,
            "PASSWD": MASK,
            "clientSecret": MASK,
            "username": "e"
        })
    );
}

#[test]
fn test_realistic_error_report() {
    let report = json!({
        "message": "payment failed",
        "request": {
            "url": "/checkout",
            "headers": {"Authorization": "Basic Zm9vOmJhcg==", "Accept": "text/html"},
            "data": {"card_number": "4111111111111111", "amount": 1200, "remember": true},
            "body": r#"{"user":{"name":"bob","passwd":"pw"},"items":[1,2]}"#
        },
        "extra": {"retries": [1, 2, 3], "last_error": null}
    });

    let sanitized = sanitize(report);

    assert_eq!(sanitized["message"], "payment failed");
    assert_eq!(sanitized["request"]["headers"]["Authorization"], MASK);
    assert_eq!(sanitized["request"]["headers"]["Accept"], "text/html");
    assert_eq!(sanitized["request"]["data"]["card_number"], MASK);
    assert_eq!(sanitized["request"]["data"]["amount"], 1200);
    assert_eq!(sanitized["request"]["data"]["remember"], true);
    assert_eq!(
        sanitized["request"]["body"],
        r#"{"items":[1,2],"user":{"name":"bob","passwd":"********"}}"#
    );
    assert_eq!(
        sanitized["extra"],
        json!({"retries": [1, 2, 3], "last_error": null})
    );
}

#[test]
fn test_top_level_values() {
    assert_eq!(sanitize(json!("1234567890123456")), json!(MASK));
    assert_eq!(sanitize(json!("hello")), json!("hello"));
    assert_eq!(sanitize(json!(42)), json!(42));
    assert_eq!(sanitize(json!(null)), json!(null));
    assert_eq!(
        sanitize(json!(["a", "1234567890123456"])),
        json!(["a", MASK])
    );
}

#[test]
fn test_input_is_not_mutated() {
    let headers = Mapping::new();
    headers.insert("Authorization", "Bearer xyz");
    let list = Sequence::new();
    list.push("1234567890123456");
    let payload = Mapping::new();
    payload.insert("headers", headers.clone());
    payload.insert("list", list.clone());

    let _ = process(&Value::from(payload.clone()));

    assert_eq!(
        headers.get("Authorization").unwrap().as_str(),
        Some("Bearer xyz")
    );
    assert_eq!(list.get(0).unwrap().as_str(), Some("1234567890123456"));
    assert_eq!(payload.len(), 2);
}

#[test]
fn test_configured_sanitizer() {
    let config = SanitizeConfig::default()
        .with_field("api_key")
        .with_mask("[FILTERED]");
    let sanitizer = Sanitizer::from_config(&config).unwrap();

    let sanitized = sanitizer.process_json(&json!({
        "api_key": "k",
        "password": "p",
        "card": "1234567890123456",
        "name": "n"
    }));
    assert_eq!(
        sanitized,
        json!({
            "api_key": "[FILTERED]",
            "password": "[FILTERED]",
            "card": "[FILTERED]",
            "name": "n"
        })
    );
}

#[test]
fn test_serializable_structs() {
    #[derive(serde::Serialize)]
    struct Credentials<'a> {
        username: &'a str,
        password: &'a str,
        backup_codes: Vec<&'a str>,
    }

    let value = Value::from_serialize(&Credentials {
        username: "alice",
        password: "hunter2",
        backup_codes: vec!["1111222233334444", "short"],
    })
    .unwrap();

    assert_eq!(
        process(&value).to_json(),
        json!({
            "username": "alice",
            "password": MASK,
            "backup_codes": [MASK, "short"]
        })
    );
}
