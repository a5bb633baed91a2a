#![allow(missing_docs)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonapi::{Attribute, CodecError, CodecRegistry, JsonApi, JsonApiError, JsonApiModel};
use serde_json::{Value, json};

#[derive(Default, PartialEq, Debug, Clone, Copy)]
struct Cents(i64);

impl Attribute for Cents {}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
struct Invoice {
    #[jsonapi(primary = "invoices")]
    id: u32,
    #[jsonapi(attr = "total")]
    total: Cents,
    #[jsonapi(attr = "refund")]
    refund: Option<Cents>,
    #[jsonapi(attr = "lines")]
    lines: Vec<Cents>,
}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
struct Toggle {
    #[jsonapi(primary = "toggles")]
    id: u32,
    #[jsonapi(attr = "on")]
    on: bool,
}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
struct Event {
    #[jsonapi(primary = "events")]
    id: u32,
    #[jsonapi(attr = "created")]
    created: DateTime<Utc>,
    #[jsonapi(attr = "published", iso8601)]
    published: DateTime<Utc>,
    #[jsonapi(attr = "updated", rfc3339)]
    updated: DateTime<Utc>,
    #[jsonapi(attr = "archived", rfc3339)]
    archived: Option<DateTime<Utc>>,
}

#[derive(JsonApiModel, Default, PartialEq, Debug, Clone)]
struct Settings {
    #[jsonapi(primary = "settings")]
    id: String,
    #[jsonapi(attr = "limits")]
    limits: BTreeMap<String, u16>,
    #[jsonapi(attr = "labels")]
    labels: HashMap<String, String>,
    #[jsonapi(attr = "extra")]
    extra: Value,
    #[jsonapi(attr = "weights")]
    weights: Vec<f32>,
}

fn cents_registry() -> Arc<CodecRegistry> {
    let registry = CodecRegistry::new();
    registry.register::<Cents, _, _>(
        |cents| Ok(Value::String(format!("{}.{:02}", cents.0 / 100, cents.0 % 100))),
        |value| {
            let text = value
                .as_str()
                .ok_or_else(|| CodecError::mismatch("a decimal string", value))?;
            let (units, fraction) = text
                .split_once('.')
                .ok_or_else(|| CodecError::custom(format!("{text:?} has no decimal point")))?;
            let units: i64 = units.parse().map_err(CodecError::custom)?;
            let fraction: i64 = fraction.parse().map_err(CodecError::custom)?;
            Ok(Cents(units * 100 + fraction))
        },
    );
    Arc::new(registry)
}

fn at(seconds: i64, nanos: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, nanos).expect("timestamp in range")
}

// --- REGISTRY ---

#[test]
fn test_registry_bookkeeping() {
    let registry = CodecRegistry::new();
    assert!(registry.is_empty());

    registry.register::<Cents, _, _>(|_| Ok(Value::Null), |_| Ok(Cents(0)));
    assert!(registry.contains::<Cents>());
    assert!(!registry.contains::<Option<Cents>>());
    assert_eq!(registry.len(), 1);

    assert!(registry.unregister::<Cents>());
    assert!(!registry.unregister::<Cents>());
    assert!(registry.is_empty());
}

/// Registered codecs also apply inside `Option` and `Vec`.
#[test]
fn test_custom_type_round_trip() -> jsonapi::Result<()> {
    let options = JsonApi::builder().registry(cents_registry());
    let invoice = Invoice {
        id: 1,
        total: Cents(1_250),
        refund: Some(Cents(99)),
        lines: vec![Cents(1_000), Cents(250)],
    };

    let bytes = options.marshal_one(&invoice)?;
    let json: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(
        json["data"]["attributes"],
        json!({ "total": "12.50", "refund": "0.99", "lines": ["10.00", "2.50"] })
    );

    let decoded: Invoice = options.unmarshal_one(&bytes)?;
    assert_eq!(decoded, invoice);
    Ok(())
}

#[test]
fn test_unregistered_custom_type() {
    let invoice = Invoice {
        id: 1,
        ..Invoice::default()
    };

    let result = JsonApi::marshal_one(&invoice);

    assert!(matches!(
        result,
        Err(JsonApiError::Codec { model: "Invoice", field: "total", .. })
    ));
}

#[test]
fn test_codec_failure_is_reported() {
    let options = JsonApi::builder().registry(cents_registry());
    let bytes = serde_json::to_vec(&json!({
        "data": { "type": "invoices", "id": "1", "attributes": { "total": "twelve" } }
    }))
    .expect("document serializes");

    let result = options.unmarshal_one::<Invoice>(&bytes);

    assert!(matches!(
        result,
        Err(JsonApiError::Codec { field: "total", .. })
    ));
}

/// A registered codec replaces the built-in encoding of the same type.
#[test]
fn test_registered_codec_overrides_builtin() -> jsonapi::Result<()> {
    let registry = CodecRegistry::new();
    registry.register::<bool, _, _>(
        |on| Ok(Value::from(if *on { "yes" } else { "no" })),
        |value| match value.as_str() {
            Some("yes") => Ok(true),
            Some("no") => Ok(false),
            _ => Err(CodecError::mismatch("yes or no", value)),
        },
    );
    let options = JsonApi::builder().registry(Arc::new(registry));
    let toggle = Toggle { id: 3, on: true };

    let bytes = options.marshal_one(&toggle)?;
    let json: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(json["data"]["attributes"]["on"], "yes");
    assert_eq!(options.unmarshal_one::<Toggle>(&bytes)?, toggle);

    let builtin: Value = serde_json::from_slice(&JsonApi::marshal_one(&toggle)?)?;
    assert_eq!(builtin["data"]["attributes"]["on"], true);
    Ok(())
}

#[test]
fn test_non_finite_float_is_rejected() {
    let settings = Settings {
        id: "s".into(),
        weights: vec![1.0, f32::NAN],
        ..Settings::default()
    };

    assert!(matches!(
        JsonApi::marshal_one(&settings),
        Err(JsonApiError::Codec { field: "weights", .. })
    ));
}

#[test]
fn test_collections_round_trip() -> jsonapi::Result<()> {
    let settings = Settings {
        id: "s1".into(),
        limits: BTreeMap::from([("daily".to_string(), 10), ("hourly".to_string(), 2)]),
        labels: HashMap::from([("env".to_string(), "prod".to_string())]),
        extra: json!({ "nested": [1, "two", null] }),
        weights: vec![0.5, 0.25],
    };

    let bytes = JsonApi::marshal_one(&settings)?;
    let decoded: Settings = JsonApi::unmarshal_one(&bytes)?;

    assert_eq!(decoded, settings);
    Ok(())
}

// --- TIME ENCODINGS ---

#[test]
fn test_time_encodings() -> jsonapi::Result<()> {
    let event = Event {
        id: 1,
        created: at(1_700_000_000, 0),
        published: at(1_700_000_000, 0),
        updated: at(1_700_000_000, 123_000_000),
        archived: None,
    };

    let bytes = JsonApi::marshal_one(&event)?;
    let json: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(
        json["data"]["attributes"],
        json!({
            "created": 1_700_000_000,
            "published": "2023-11-14T22:13:20Z",
            "updated": "2023-11-14T22:13:20.123Z",
            "archived": null
        })
    );

    let decoded: Event = JsonApi::unmarshal_one(&bytes)?;
    assert_eq!(decoded, event);
    Ok(())
}

#[test]
fn test_rfc3339_accepts_offsets() -> jsonapi::Result<()> {
    let bytes = serde_json::to_vec(&json!({
        "data": {
            "type": "events",
            "id": "1",
            "attributes": {
                "updated": "2023-11-15T00:13:20+02:00",
                "archived": "2023-11-14T22:13:20Z"
            }
        }
    }))?;

    let event: Event = JsonApi::unmarshal_one(&bytes)?;

    assert_eq!(event.updated, at(1_700_000_000, 0));
    assert_eq!(event.archived, Some(at(1_700_000_000, 0)));
    Ok(())
}

#[test]
fn test_zero_time_inside_option_is_omitted() -> jsonapi::Result<()> {
    let event = Event {
        id: 1,
        archived: Some(DateTime::<Utc>::default()),
        ..Event::default()
    };

    let json: Value = serde_json::from_slice(&JsonApi::marshal_one(&event)?)?;

    assert!(json["data"].get("attributes").is_none());
    Ok(())
}

#[test]
fn test_unix_time_accepts_fractional_seconds() -> jsonapi::Result<()> {
    let bytes = serde_json::to_vec(&json!({
        "data": { "type": "events", "id": "1", "attributes": { "created": 1_700_000_000.5 } }
    }))?;

    let event: Event = JsonApi::unmarshal_one(&bytes)?;

    assert_eq!(event.created, at(1_700_000_000, 500_000_000));
    Ok(())
}

#[test]
fn test_invalid_time_values() {
    for (key, value) in [
        ("created", json!("2023-11-14")),
        ("created", json!(true)),
        ("created", json!(1e300)),
        ("published", json!(1_700_000_000)),
        ("published", json!("14/11/2023")),
        ("updated", json!("yesterday")),
    ] {
        let bytes = serde_json::to_vec(&json!({
            "data": { "type": "events", "id": "1", "attributes": { key: value } }
        }))
        .expect("document serializes");

        let result = JsonApi::unmarshal_one::<Event>(&bytes);

        assert!(
            matches!(result, Err(JsonApiError::InvalidTime { key: ref k, .. }) if k == key),
            "{key}: {result:?}"
        );
    }
}
