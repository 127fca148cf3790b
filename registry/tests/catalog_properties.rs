//! Properties every domain catalog must satisfy in every interface.

use std::collections::BTreeSet;

use registry::catalog::naming::Interface;
use registry::contract::{ParamType, is_failure_envelope};
use registry::core::error::{ErrorKind, ToolError};
use registry::domains::{Domain, TRANSFER_TOOL};
use registry::test_support::{
    airline_store, catalog, clock, finance_store, fixture, smart_home_store, wiki_store,
};
use serde_json::{Map, Value, json};

fn placeholder(ty: ParamType) -> Value {
    match ty {
        ParamType::String | ParamType::Any => json!("1"),
        ParamType::Integer => json!(1),
        ParamType::Number => json!(1.0),
        ParamType::Boolean => json!(true),
        ParamType::Object => json!({}),
        ParamType::Array => json!([]),
    }
}

/// The failure text of a call, if it failed either way.
fn failure_message(outcome: &Result<String, ToolError>) -> Option<String> {
    match outcome {
        Ok(body) if is_failure_envelope(body) => {
            let envelope: Value = serde_json::from_str(body).expect("envelope JSON");
            envelope["error"].as_str().map(str::to_string)
        }
        Ok(_) => None,
        Err(err) => Some(err.message.clone()),
    }
}

#[test]
fn every_interface_exposes_the_same_operations_under_distinct_names() {
    for domain in Domain::ALL {
        let canonical = catalog(domain, 1);
        let canonical_names: BTreeSet<&str> = canonical.names().collect();
        assert_eq!(canonical_names.len(), canonical.len(), "{domain}");
        assert!(canonical.contains(TRANSFER_TOOL), "{domain}");

        for interface in Interface::ALL.into_iter().skip(1) {
            let variant = catalog(domain, interface.number());
            assert_eq!(variant.len(), canonical.len(), "{domain} interface {interface}");
            assert!(variant.contains(TRANSFER_TOOL), "{domain} interface {interface}");
            for name in variant.names() {
                if name == TRANSFER_TOOL {
                    continue;
                }
                assert!(
                    !canonical_names.contains(name),
                    "{domain} interface {interface} reuses {name}"
                );
            }
        }
    }
}

#[test]
fn descriptors_describe_every_parameter() {
    for domain in Domain::ALL {
        let catalog = catalog(domain, 3);
        for tool in catalog.tools() {
            let descriptor = tool.descriptor();
            assert_eq!(descriptor["type"], "function");
            let function = &descriptor["function"];
            assert_eq!(function["name"], tool.name());
            assert!(
                !function["description"].as_str().unwrap_or_default().is_empty(),
                "{} has no description",
                tool.name()
            );

            let parameters = &function["parameters"];
            assert_eq!(parameters["type"], "object");
            let properties = parameters["properties"].as_object().expect("properties");
            let operation = tool.operation();
            assert_eq!(properties.len(), operation.params.len(), "{}", tool.name());
            for param in &operation.params {
                let property = &properties[&param.name];
                let ty = property["type"].as_str().unwrap_or_default();
                assert!(
                    ["string", "integer", "number", "boolean", "object", "array"].contains(&ty),
                    "{}.{} has type {}",
                    tool.name(),
                    param.name,
                    property["type"]
                );
                assert!(property["description"].is_string());
                if let Some(allowed) = &param.allowed {
                    assert_eq!(property["enum"], json!(allowed), "{}.{}", tool.name(), param.name);
                }
            }

            let required: BTreeSet<&str> = parameters["required"]
                .as_array()
                .expect("required")
                .iter()
                .filter_map(Value::as_str)
                .collect();
            let expected: BTreeSet<&str> = operation
                .params
                .iter()
                .filter(|param| param.required)
                .map(|param| param.name.as_str())
                .collect();
            assert_eq!(required, expected, "{}", tool.name());
        }
    }
}

#[test]
fn documented_parameters_pass_argument_validation() {
    for domain in Domain::ALL {
        let catalog = catalog(domain, 1);
        let clock = clock(domain);
        for tool in catalog.tools() {
            let params = &tool.operation().params;
            let required: Map<String, Value> = params
                .iter()
                .filter(|param| param.required)
                .map(|param| (param.name.clone(), placeholder(param.ty)))
                .collect();
            let everything: Map<String, Value> = params
                .iter()
                .map(|param| (param.name.clone(), placeholder(param.ty)))
                .collect();

            for kwargs in [required, everything] {
                let mut store = fixture(domain);
                let outcome = tool.invoke(&mut store, &clock, &Value::Object(kwargs));
                if let Some(message) = failure_message(&outcome) {
                    assert!(
                        !message.starts_with("Invalid arguments for"),
                        "{domain}/{}: {message}",
                        tool.name()
                    );
                }
            }
        }
    }
}

#[test]
fn unknown_kwargs_are_rejected_without_side_effects() {
    for domain in Domain::ALL {
        let catalog = catalog(domain, 2);
        let clock = clock(domain);
        for tool in catalog.tools() {
            let mut store = fixture(domain);
            let before = store.fingerprint();
            let outcome = tool.invoke(&mut store, &clock, &json!({ "bogus_flag": 1 }));
            let message = failure_message(&outcome)
                .unwrap_or_else(|| panic!("{domain}/{} accepted an unknown kwarg", tool.name()));
            assert!(message.contains("Invalid arguments for"), "{message}");
            if let Err(err) = &outcome {
                assert_eq!(err.kind, ErrorKind::InvalidArgument);
            }
            assert_eq!(store.fingerprint(), before, "{domain}/{}", tool.name());
        }
    }
}

#[test]
fn sequential_ids_follow_the_collection_maximum() {
    let catalog = catalog(Domain::SmartHome, 1);
    let clock = clock(Domain::SmartHome);
    let mut store = smart_home_store();

    for (name, expected) in [("Garage", 3), ("Office", 4)] {
        let body = catalog
            .invoke("create_room", &mut store, &clock, &json!({ "name": name }))
            .expect("create room");
        let room: Value = serde_json::from_str(&body).expect("json");
        assert_eq!(room["id"], expected);
        assert!(store.get("rooms", &expected.to_string()).is_some());
    }
}

#[test]
fn prefixed_ids_keep_their_padding() {
    let catalog = catalog(Domain::Airline, 1);
    let clock = clock(Domain::Airline);
    let mut store = airline_store();
    let args = json!({ "user_id": "1", "flight_id": "FL0001", "passengers": 1 });

    let first: Value = serde_json::from_str(
        &catalog
            .invoke("book_reservation", &mut store, &clock, &args)
            .expect("first booking"),
    )
    .expect("json");
    let second: Value = serde_json::from_str(
        &catalog
            .invoke("book_reservation", &mut store, &clock, &args)
            .expect("second booking"),
    )
    .expect("json");
    assert_eq!(first["reservation_id"], "RES00001");
    assert_eq!(second["reservation_id"], "RES00002");
    assert_eq!(second["total_price"], 120.5);
    assert_eq!(
        store.get("flights", "FL0001").expect("flight")["available_seats"],
        1
    );
}

#[test]
fn failed_booking_leaves_store_untouched() {
    let catalog = catalog(Domain::Airline, 1);
    let clock = clock(Domain::Airline);
    let mut store = airline_store();
    let before = store.clone();

    let err = catalog
        .invoke(
            "book_reservation",
            &mut store,
            &clock,
            &json!({ "user_id": "1", "flight_id": "FL0002", "passengers": 1 }),
        )
        .expect_err("sold out");
    assert_eq!(err.kind, ErrorKind::PreconditionFailed);
    assert_eq!(store, before);

    let err = catalog
        .invoke(
            "book_reservation",
            &mut store,
            &clock,
            &json!({ "user_id": "1", "flight_id": "FL0001", "passengers": 1, "cabin": "first" }),
        )
        .expect_err("unknown cabin");
    assert_eq!(err.kind, ErrorKind::InvalidEnum);
    assert_eq!(err.message, "Invalid cabin. Must be one of [basic_economy, economy, business]");
    assert_eq!(store, before);
}

#[test]
fn same_calls_on_same_fixture_are_deterministic() {
    let catalog = catalog(Domain::Finance, 4);
    let clock = clock(Domain::Finance);
    let calls = [
        (
            "setup_account",
            json!({ "user_id": "U1", "account_type": "credit", "initial_deposit": 10.005 }),
        ),
        (
            "amend_account_status",
            json!({ "account_id": "ACC2", "new_status": "frozen" }),
        ),
        (
            "amend_account_status",
            json!({ "account_id": "ACC1", "new_status": "closed" }),
        ),
    ];

    let run = || {
        let mut store = finance_store();
        let bodies: Vec<String> = calls
            .iter()
            .map(|(name, args)| catalog.invoke(name, &mut store, &clock, args).expect(name))
            .collect();
        (bodies, store.fingerprint())
    };
    let (first_bodies, first_fingerprint) = run();
    let (second_bodies, second_fingerprint) = run();
    assert_eq!(first_bodies, second_bodies);
    assert_eq!(first_fingerprint, second_fingerprint);
}

#[test]
fn repeating_an_update_changes_nothing() {
    let catalog = catalog(Domain::SmartHome, 1);
    let clock = clock(Domain::SmartHome);
    let mut store = smart_home_store();
    let args = json!({ "device_id": "1", "power": "on", "brightness": 40 });

    let first = catalog
        .invoke("update_device_state", &mut store, &clock, &args)
        .expect("first update");
    let after_first = store.fingerprint();
    let second = catalog
        .invoke("update_device_state", &mut store, &clock, &args)
        .expect("second update");
    assert_eq!(first, second);
    assert_eq!(store.fingerprint(), after_first);
}

#[test]
fn created_record_reads_back_unchanged() {
    let catalog = catalog(Domain::SmartHome, 5);
    let clock = clock(Domain::SmartHome);
    let mut store = smart_home_store();

    let created: Value = serde_json::from_str(
        &catalog
            .invoke(
                "initiate_device",
                &mut store,
                &clock,
                &json!({ "name": "Front door", "device_type": "lock", "room_id": "2" }),
            )
            .expect("create"),
    )
    .expect("json");
    assert_eq!(created["id"], 3);
    assert_eq!(created["power"], "off");
    assert_eq!(created["created_at"], "2025-01-01T00:00:00Z");

    let fetched: Value = serde_json::from_str(
        &catalog
            .invoke("obtain_device", &mut store, &clock, &json!({ "device_id": "3" }))
            .expect("get"),
    )
    .expect("json");
    assert_eq!(fetched, created);
}

#[test]
fn link_then_unlink_restores_labels() {
    let catalog = catalog(Domain::EnterpriseWiki, 1);
    let clock = clock(Domain::EnterpriseWiki);
    let mut store = wiki_store();
    catalog
        .invoke("create_label", &mut store, &clock, &json!({ "name": "runbook" }))
        .expect("label");
    let before = store.clone();
    let pair = json!({ "page_id": "1", "label_id": "1" });

    catalog
        .invoke("add_label_to_page", &mut store, &clock, &pair)
        .expect("link");
    let err = catalog
        .invoke("add_label_to_page", &mut store, &clock, &pair)
        .expect_err("already linked");
    assert_eq!(err.kind, ErrorKind::DuplicateKey);

    let labels: Value = serde_json::from_str(
        &catalog
            .invoke("list_page_labels", &mut store, &clock, &json!({ "page_id": "1" }))
            .expect("list"),
    )
    .expect("json");
    assert_eq!(labels.as_array().map(Vec::len), Some(1));

    catalog
        .invoke("remove_label_from_page", &mut store, &clock, &pair)
        .expect("unlink");
    assert_eq!(store, before);

    let err = catalog
        .invoke("remove_label_from_page", &mut store, &clock, &pair)
        .expect_err("nothing to unlink");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn deletes_respect_dependents_and_report_missing_records() {
    let catalog = catalog(Domain::SmartHome, 1);
    let clock = clock(Domain::SmartHome);
    let mut store = smart_home_store();
    let before = store.clone();

    let err = catalog
        .invoke("delete_room", &mut store, &clock, &json!({ "room_id": "1" }))
        .expect_err("room has devices");
    assert_eq!(err.kind, ErrorKind::PreconditionFailed);
    assert_eq!(store, before);

    let body = catalog
        .invoke("delete_room", &mut store, &clock, &json!({ "room_id": "2" }))
        .expect("empty room");
    assert!(!is_failure_envelope(&body));
    assert!(store.get("rooms", "2").is_none());

    let err = catalog
        .invoke("delete_room", &mut store, &clock, &json!({ "room_id": "2" }))
        .expect_err("second delete");
    assert_eq!(err.kind, ErrorKind::NotFound);
    assert_eq!(err.message, "Room 2 not found");
}

#[test]
fn unknown_ids_are_not_found_in_every_domain() {
    let cases = [
        (
            Domain::Ecommerce,
            "cancel_order",
            json!({ "sales_order_id": "SO9999", "reason": "x" }),
            "Sales order SO9999 not found",
        ),
        (
            Domain::Finance,
            "get_account",
            json!({ "account_id": "ACC9" }),
            "Account ACC9 not found",
        ),
        (
            Domain::SmartHome,
            "get_device",
            json!({ "device_id": "99" }),
            "Device 99 not found",
        ),
    ];
    for (domain, name, args, message) in cases {
        let catalog = catalog(domain, 1);
        let mut store = fixture(domain);
        let err = catalog
            .invoke(name, &mut store, &clock(domain), &args)
            .expect_err(name);
        assert_eq!(err.kind, ErrorKind::NotFound, "{name}");
        assert_eq!(err.message, message);
    }
}
