//! Smart home: rooms, devices and scenes.

use serde_json::{Map, Value};

use crate::catalog::entity::{Active, Dependent, EntitySpec, Field, Literal, Owned};
use crate::catalog::shapes::{self, LinkSpec, SearchSpec, fetch, id_param};
use crate::contract::{Effect, Operation, ParamSpec, ParamType};
use crate::core::error::{ToolError, ToolResult};
use crate::core::ids::IdScheme;
use crate::core::record::text;

const DEVICE_TYPES: &[&str] = &["light", "thermostat", "lock", "camera", "speaker", "plug", "sensor"];

static ROOM: EntitySpec = EntitySpec {
    collection: "rooms",
    label: "Room",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "room_id",
    fields: &[
        Field::text("name", "Room name").required(),
        Field::integer("floor", "Floor number").default(Literal::Int(1)),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[Dependent {
        collection: "devices",
        field: "room_id",
        label: "devices",
        active: Active::Any,
    }],
    owned: &[],
};

static DEVICE: EntitySpec = EntitySpec {
    collection: "devices",
    label: "Device",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "device_id",
    fields: &[
        Field::text("name", "Device name").required(),
        Field::one_of("device_type", "Kind of device", DEVICE_TYPES)
            .required()
            .create_only(),
        Field::reference("room_id", "Room the device is in", "rooms", "Room").required(),
        Field::one_of("power", "Power state", &["on", "off"]).default(Literal::Str("off")),
        Field::integer("brightness", "Light level, 0-100").system(Literal::Null),
        Field::number("target_temperature", "Thermostat set point in Celsius").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[Owned {
        collection: "scene_devices",
        field: "device_id",
    }],
};

static SCENE: EntitySpec = EntitySpec {
    collection: "scenes",
    label: "Scene",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "scene_id",
    fields: &[
        Field::text("name", "Scene name").required(),
        Field::text("description", "What the scene does"),
    ],
    unique: &["name"],
    timestamps: true,
    dependents: &[],
    owned: &[Owned {
        collection: "scene_devices",
        field: "scene_id",
    }],
};

static SCENE_DEVICE: EntitySpec = EntitySpec {
    collection: "scene_devices",
    label: "Scene device",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "scene_device_id",
    fields: &[
        Field::reference("scene_id", "Scene", "scenes", "Scene").required(),
        Field::reference("device_id", "Device", "devices", "Device").required(),
        Field::object("target_state", "State the scene applies to the device"),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

const SCENE_DEVICES: LinkSpec = LinkSpec {
    junction: &SCENE_DEVICE,
    left: "scene_id",
    right: "device_id",
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::create(&ROOM, "create_room", "Add a room. Room names are unique."),
        shapes::search(
            &ROOM,
            "list_rooms",
            "List rooms, optionally on one floor.",
            SearchSpec::equals(&["floor"]),
        ),
        shapes::delete(&ROOM, "delete_room", "Delete a room that has no devices.", &[]),
        shapes::create(&DEVICE, "create_device", "Install a device in a room."),
        shapes::get(&DEVICE, "get_device", "Get a device by id."),
        shapes::search(
            &DEVICE,
            "search_devices",
            "Search devices by room, type, power state or name.",
            SearchSpec::equals(&["room_id", "device_type", "power"])
                .contains(&[("name_contains", &["name"])]),
        ),
        update_device_state(),
        shapes::create(&SCENE, "create_scene", "Create a scene. Scene names are unique."),
        shapes::search(
            &SCENE,
            "list_scenes",
            "List scenes, optionally filtered by name.",
            SearchSpec::equals(&[]).contains(&[("name_contains", &["name"])]),
        ),
        shapes::link(SCENE_DEVICES, "add_device_to_scene", "Include a device in a scene."),
        shapes::unlink(SCENE_DEVICES, "remove_device_from_scene", "Drop a device from a scene."),
    ]
}

fn update_device_state() -> Operation {
    Operation::new(
        "update_device_state",
        "Change a device's power, brightness or target temperature. Brightness applies to lights (0-100); target temperature applies to thermostats (5-35).",
        Effect::Write,
        |ctx, args| {
            let id = args.id("device_id")?;
            let device = fetch(ctx.store, &DEVICE, &id)?;
            let device_type = text(&device, "device_type").unwrap_or_default();
            let mut patch = Map::new();
            if let Some(power) = args.opt_str("power")? {
                patch.insert("power".to_string(), Value::from(power));
            }
            if let Some(brightness) = args.opt_i64("brightness")? {
                require_kind(device_type, "light", "brightness")?;
                if !(0..=100).contains(&brightness) {
                    return Err(ToolError::invalid_argument(
                        "brightness must be between 0 and 100",
                    ));
                }
                patch.insert("brightness".to_string(), Value::from(brightness));
            }
            if let Some(temperature) = args.opt_f64("target_temperature")? {
                require_kind(device_type, "thermostat", "target_temperature")?;
                if !(5.0..=35.0).contains(&temperature) {
                    return Err(ToolError::invalid_argument(
                        "target_temperature must be between 5 and 35",
                    ));
                }
                patch.insert("target_temperature".to_string(), Value::from(temperature));
            }
            if patch.is_empty() {
                return Err(ToolError::invalid_argument("No fields provided to update"));
            }
            let record = shapes::apply_patch(ctx, &DEVICE, &id, patch)?;
            Ok(Value::Object(record))
        },
    )
    .param(id_param(&DEVICE))
    .param(ParamSpec::optional("power", ParamType::String, "Power state").one_of(&["on", "off"]))
    .param(ParamSpec::optional(
        "brightness",
        ParamType::Integer,
        "Light level, 0-100",
    ))
    .param(ParamSpec::optional(
        "target_temperature",
        ParamType::Number,
        "Thermostat set point in Celsius",
    ))
}

fn require_kind(device_type: &str, expected: &str, setting: &str) -> ToolResult<()> {
    if device_type == expected {
        return Ok(());
    }
    Err(ToolError::invalid_argument(format!(
        "{setting} is not supported by {device_type} devices"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::naming::Interface;
    use crate::core::clock::Clock;
    use crate::core::error::ErrorKind;
    use crate::core::record::from_value;
    use crate::core::store::Store;
    use serde_json::json;

    fn fixture() -> Store {
        let mut store = Store::new();
        store.insert("rooms", "1", from_value(json!({ "id": 1, "name": "Kitchen", "floor": 1 })));
        store.insert(
            "devices",
            "1",
            from_value(json!({ "id": 1, "name": "Pendant", "device_type": "light", "room_id": "1", "power": "off" })),
        );
        store
    }

    #[test]
    fn brightness_is_range_checked() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-01-01T00:00:00Z").expect("clock");
        let mut store = fixture();

        let err = catalog
            .invoke(
                "update_device_state",
                &mut store,
                &clock,
                &json!({ "device_id": "1", "brightness": 140 }),
            )
            .expect_err("out of range");
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        catalog
            .invoke(
                "update_device_state",
                &mut store,
                &clock,
                &json!({ "device_id": "1", "power": "on", "brightness": 60 }),
            )
            .expect("update");
        let device = store.get("devices", "1").expect("device");
        assert_eq!(device["power"], "on");
        assert_eq!(device["brightness"], 60);
    }

    #[test]
    fn occupied_room_cannot_be_deleted() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-01-01T00:00:00Z").expect("clock");
        let mut store = fixture();

        let err = catalog
            .invoke("delete_room", &mut store, &clock, &json!({ "room_id": "1" }))
            .expect_err("room has devices");
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);
        assert_eq!(
            err.message,
            "Cannot delete room 1: 1 active devices still reference it"
        );
    }
}
