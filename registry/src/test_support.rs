//! Test-only builders for fixture stores, tasks and on-disk domains.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};

use crate::catalog::Catalog;
use crate::catalog::naming::Interface;
use crate::core::clock::Clock;
use crate::core::store::{Collection, Store};
use crate::domains::Domain;
use crate::io::config::EnvConfig;
use crate::io::paths::DomainPaths;
use crate::task::{Action, Split, Tag, Task};

/// Build a store from `{collection: {key: record}}`. Non-object records are skipped.
pub fn store(value: Value) -> Store {
    let mut store = Store::new();
    let Value::Object(collections) = value else {
        return store;
    };
    for (name, records) in collections {
        let Value::Object(records) = records else {
            continue;
        };
        let collection: Collection = records
            .into_iter()
            .filter_map(|(key, record)| match record {
                Value::Object(record) => Some((key, record)),
                _ => None,
            })
            .collect();
        store.insert_collection(name, collection);
    }
    store
}

/// The domain's deterministic clock.
pub fn clock(domain: Domain) -> Clock {
    Clock::fixed(domain.default_timestamp()).expect("domain timestamp parses")
}

/// The domain's catalog in interface `number`.
pub fn catalog(domain: Domain, number: u8) -> Catalog {
    let interface = Interface::new(number).expect("interface in range");
    domain.catalog(interface).expect("catalog builds")
}

/// A small, internally consistent fixture for `domain`.
pub fn fixture(domain: Domain) -> Store {
    match domain {
        Domain::Airline => airline_store(),
        Domain::Ecommerce => ecommerce_store(),
        Domain::Finance => finance_store(),
        Domain::HrPayroll => hr_store(),
        Domain::IncidentManagement => incident_store(),
        Domain::EnterpriseWiki => wiki_store(),
        Domain::FundFinance => fund_store(),
        Domain::SmartHome => smart_home_store(),
    }
}

pub fn airline_store() -> Store {
    store(json!({
        "users": {
            "1": { "id": 1, "name": "Mia Li", "email": "mia@example.com", "membership": "gold" }
        },
        "flights": {
            "FL0001": {
                "flight_id": "FL0001",
                "flight_number": "HAT001",
                "origin": "SFO",
                "destination": "JFK",
                "date": "2025-02-01",
                "departure_time": "08:00",
                "price": 120.5,
                "available_seats": 3,
                "status": "available"
            },
            "FL0002": {
                "flight_id": "FL0002",
                "flight_number": "HAT002",
                "origin": "JFK",
                "destination": "SFO",
                "date": "2025-02-05",
                "departure_time": "17:30",
                "price": 98.0,
                "available_seats": 0,
                "status": "available"
            }
        },
        "reservations": {}
    }))
}

pub fn ecommerce_store() -> Store {
    store(json!({
        "customers": {
            "1": { "id": 1, "name": "Ada Park", "email": "ada@example.com", "status": "active" }
        },
        "suppliers": {
            "SUP001": { "supplier_id": "SUP001", "name": "Acme Parts", "status": "active" }
        },
        "products": {
            "PRD0001": {
                "product_id": "PRD0001",
                "name": "Desk Lamp",
                "sku": "LAMP-1",
                "category": "lighting",
                "price": 25.0,
                "stock_quantity": 8,
                "supplier_id": "SUP001",
                "status": "active"
            }
        },
        "warehouses": {
            "WH001": { "warehouse_id": "WH001", "name": "East", "location": "Newark", "capacity": 500 }
        },
        "sales_orders": {
            "SO0455": {
                "sales_order_id": "SO0455",
                "customer_id": "1",
                "items": [{ "product_id": "PRD0001", "quantity": 2, "unit_price": 25.0 }],
                "status": "Pending",
                "total_amount": 50.0,
                "cancel_reason": null
            }
        }
    }))
}

pub fn finance_store() -> Store {
    store(json!({
        "users": {
            "U1": {
                "user_id": "U1",
                "first_name": "Jon",
                "last_name": "Reyes",
                "email": "jon@example.com"
            }
        },
        "accounts": {
            "ACC1": {
                "account_id": "ACC1",
                "user_id": "U1",
                "account_type": "savings",
                "currency": "USD",
                "status": "open",
                "balances": { "available": 1200.0, "book": 1200.0, "closing": null }
            }
        }
    }))
}

pub fn hr_store() -> Store {
    store(json!({
        "departments": {
            "1": { "id": 1, "name": "Engineering", "budget": 500000.0, "status": "active" }
        },
        "positions": {
            "1": {
                "id": 1,
                "title": "Backend Engineer",
                "department_id": "1",
                "level": "mid",
                "employment_type": "full_time",
                "status": "filled"
            }
        },
        "employees": {
            "1": {
                "id": 1,
                "first_name": "Sam",
                "last_name": "Ortiz",
                "email": "sam@example.com",
                "department_id": "1",
                "position_id": "1",
                "manager_id": null,
                "hire_date": "2021-03-01",
                "salary": 120000.0,
                "employment_type": "full_time",
                "status": "active"
            }
        },
        "payroll_records": {}
    }))
}

pub fn incident_store() -> Store {
    store(json!({
        "users": {
            "1": { "id": 1, "name": "Kai Wong", "email": "kai@example.com", "role": "agent" },
            "2": { "id": 2, "name": "Lee Fox", "email": "lee@example.com", "role": "end_user" }
        },
        "categories": {
            "1": { "id": 1, "name": "Hardware" }
        },
        "subcategories": {},
        "sla_policies": {},
        "incidents": {
            "INC_5005": {
                "incident_id": "INC_5005",
                "title": "VPN drops every hour",
                "priority": "high",
                "category_id": "1",
                "subcategory_id": null,
                "reported_by": "2",
                "assigned_to": "1",
                "status": "open"
            }
        },
        "incident_slas": {}
    }))
}

pub fn wiki_store() -> Store {
    store(json!({
        "users": {
            "1": { "id": 1, "display_name": "Ada", "email": "ada@example.com" }
        },
        "spaces": {
            "1": { "id": 1, "space_key": "ENG", "name": "Engineering", "owner_id": "1", "status": "current" }
        },
        "pages": {
            "1": {
                "id": 1,
                "space_id": "1",
                "title": "Home",
                "content": "Welcome",
                "content_format": "md",
                "created_by": "1",
                "status": "current",
                "version": 1
            }
        },
        "labels": {},
        "page_labels": {},
        "page_versions": {}
    }))
}

pub fn fund_store() -> Store {
    store(json!({
        "investors": {
            "1": { "id": 1, "name": "Northwind", "email": "ops@northwind.example", "status": "active" }
        },
        "funds": {
            "1": { "id": 1, "name": "Growth I", "fund_type": "equity", "status": "open" }
        },
        "commitments": {
            "1": {
                "id": 1,
                "fund_id": "1",
                "investor_id": "1",
                "amount": 5000.0,
                "commitment_date": "2025-08-01",
                "status": "approved"
            }
        }
    }))
}

pub fn smart_home_store() -> Store {
    store(json!({
        "rooms": {
            "1": { "id": 1, "name": "Kitchen", "floor": 1 },
            "2": { "id": 2, "name": "Attic", "floor": 3 }
        },
        "devices": {
            "1": { "id": 1, "name": "Pendant", "device_type": "light", "room_id": "1", "power": "off" },
            "2": { "id": 2, "name": "Nest", "device_type": "thermostat", "room_id": "1", "power": "on" }
        },
        "scenes": {},
        "scene_devices": {}
    }))
}

pub fn action(name: &str, kwargs: Value) -> Action {
    Action::new(name, kwargs)
}

/// A task with a fixed instruction and the given script.
pub fn task(actions: Vec<Action>, outputs: &[&str]) -> Task {
    Task {
        annotator: Tag::Number(0),
        user_id: Tag::Text("tester".to_string()),
        instruction: "Please help me with my request.".to_string(),
        actions,
        outputs: outputs.iter().map(|output| output.to_string()).collect(),
    }
}

/// Config rooted at `data_root` for `domain`, everything else defaulted.
pub fn env_config(data_root: &Path, domain: Domain) -> EnvConfig {
    EnvConfig {
        data_root: data_root.to_path_buf(),
        domain,
        ..EnvConfig::default()
    }
}

/// Lay out `store` and `tasks` as the `test` split of `domain` under `data_root`.
pub fn write_domain(data_root: &Path, domain: Domain, store: &Store, tasks: &[Task]) -> Result<()> {
    let paths = DomainPaths::new(data_root, domain);
    let data_dir = paths.data_dir();
    fs::create_dir_all(&data_dir).with_context(|| format!("create {}", data_dir.display()))?;
    for name in store.names() {
        let records: Map<String, Value> = store
            .collection(name)
            .map(|collection| {
                collection
                    .ordered()
                    .into_iter()
                    .map(|(key, record)| (key.to_string(), Value::Object(record.clone())))
                    .collect()
            })
            .unwrap_or_default();
        let path = data_dir.join(format!("{name}.json"));
        let contents = serde_json::to_string_pretty(&records).context("serialize collection")?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    }

    let tasks_path = paths.tasks_file(Split::Test);
    if let Some(parent) = tasks_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let contents = serde_json::to_string_pretty(tasks).context("serialize tasks")?;
    fs::write(&tasks_path, contents).with_context(|| format!("write {}", tasks_path.display()))?;
    Ok(())
}

/// A temporary data root holding `domain` with its sample fixture and `tasks`.
pub fn temp_domain(domain: Domain, tasks: &[Task]) -> (tempfile::TempDir, EnvConfig) {
    let temp = tempfile::tempdir().expect("tempdir");
    write_domain(temp.path(), domain, &fixture(domain), tasks).expect("write domain");
    let config = env_config(temp.path(), domain);
    (temp, config)
}
