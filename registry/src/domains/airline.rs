//! Airline: flights, passengers and reservations.

use serde_json::{Value, json};

use crate::catalog::entity::{EntitySpec, Field, Literal, Rule};
use crate::catalog::shapes::{self, ParentRef, SearchSpec, build_record, create_params, fetch, insert_new, touch};
use crate::contract::{Effect, Operation};
use crate::core::clock::Clock;
use crate::core::error::{ToolError, ToolResult};
use crate::core::ids::IdScheme;
use crate::core::record::{money, number, set, status};
use crate::core::store::{Record, Store, scalar_text};
use crate::core::transitions::{FLIGHT, RESERVATION};

const CABINS: &[&str] = &["basic_economy", "economy", "business"];

static USER: EntitySpec = EntitySpec {
    collection: "users",
    label: "User",
    ids: IdScheme::Sequential,
    id_field: "id",
    id_param: "user_id",
    fields: &[
        Field::text("name", "Full name").required(),
        Field::text("email", "Email address").required(),
        Field::one_of("membership", "Loyalty tier", &["regular", "silver", "gold"])
            .default(Literal::Str("regular")),
    ],
    unique: &["email"],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static FLIGHT_SPEC: EntitySpec = EntitySpec {
    collection: "flights",
    label: "Flight",
    ids: IdScheme::Prefixed {
        prefix: "FL",
        width: 4,
    },
    id_field: "flight_id",
    id_param: "flight_id",
    fields: &[
        Field::text("flight_number", "Carrier flight number, e.g. HAT001").required(),
        Field::text("origin", "Origin airport code").required(),
        Field::text("destination", "Destination airport code").required(),
        Field::date("date", "Departure date (YYYY-MM-DD)").required(),
        Field::text("departure_time", "Scheduled departure time (HH:MM)"),
        Field::number("price", "Fare per passenger").required().rule(Rule::Positive),
        Field::integer("available_seats", "Seats left for sale")
            .required()
            .rule(Rule::NonNegative),
        Field::one_of("status", "Flight status", &["available", "delayed", "cancelled", "landed"])
            .system(Literal::Str("available")),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

static RESERVATION_SPEC: EntitySpec = EntitySpec {
    collection: "reservations",
    label: "Reservation",
    ids: IdScheme::Prefixed {
        prefix: "RES",
        width: 5,
    },
    id_field: "reservation_id",
    id_param: "reservation_id",
    fields: &[
        Field::reference("user_id", "Booking user", "users", "User")
            .required()
            .create_only(),
        Field::reference("flight_id", "Booked flight", "flights", "Flight")
            .required()
            .create_only(),
        Field::integer("passengers", "Number of travellers")
            .required()
            .rule(Rule::Positive)
            .create_only(),
        Field::one_of("cabin", "Cabin class", CABINS)
            .default(Literal::Str("economy"))
            .create_only(),
        Field::number("total_price", "Fare times passengers").system(Literal::Num(0.0)),
        Field::one_of("status", "Reservation status", &["confirmed", "cancelled"])
            .system(Literal::Str("confirmed")),
        Field::text("cancelled_at", "Cancellation timestamp").system(Literal::Null),
    ],
    unique: &[],
    timestamps: true,
    dependents: &[],
    owned: &[],
};

const OF_USER: ParentRef = ParentRef {
    param: "user_id",
    description: "User identifier",
    collection: "users",
    label: "User",
    field: "user_id",
};

pub fn operations() -> Vec<Operation> {
    vec![
        shapes::get(&USER, "get_user_details", "Get a user's profile by id."),
        shapes::search(
            &FLIGHT_SPEC,
            "search_flights",
            "Search flights by route, date or status, ordered by departure date.",
            SearchSpec::equals(&["origin", "destination", "date", "status", "flight_number"])
                .sort("date", false),
        ),
        shapes::create(&FLIGHT_SPEC, "create_flight", "Schedule a new flight."),
        shapes::update_status(
            &FLIGHT_SPEC,
            "update_flight_status",
            "Change a flight's operational status.",
            FLIGHT,
            "status",
        ),
        book_reservation(),
        shapes::get(
            &RESERVATION_SPEC,
            "get_reservation_details",
            "Get a reservation by id.",
        ),
        shapes::list_children(
            &RESERVATION_SPEC,
            "list_reservations",
            "List a user's reservations, newest first.",
            OF_USER,
            Some(("created_at", true)),
        ),
        cancel_reservation(),
    ]
}

fn book_reservation() -> Operation {
    Operation::new(
        "book_reservation",
        "Book seats on a flight. The flight must be open for sale with enough seats; the total is the fare times the passenger count.",
        Effect::Write,
        |ctx, args| {
            let mut record = build_record(ctx.store, ctx.clock, &RESERVATION_SPEC, args)?;
            let flight_id = args.id("flight_id")?;
            let passengers = args.i64("passengers")?;
            let flight = fetch(ctx.store, &FLIGHT_SPEC, &flight_id)?;
            if status(&flight) != "available" && status(&flight) != "delayed" {
                return Err(ToolError::precondition(format!(
                    "Flight {flight_id} is not open for booking: status is '{}'",
                    status(&flight)
                )));
            }
            let seats = seat_count(&flight);
            if seats < passengers {
                return Err(ToolError::precondition(format!(
                    "Flight {flight_id} has only {seats} seats available"
                )));
            }
            let price = number(&flight, "price").unwrap_or(0.0);
            set(&mut record, "total_price", money(price * passengers as f64));
            adjust_seats(ctx.store, ctx.clock, &flight_id, -passengers)?;
            let (_, record) = insert_new(ctx, &RESERVATION_SPEC, record)?;
            Ok(Value::Object(record))
        },
    )
    .params(create_params(&RESERVATION_SPEC))
}

fn cancel_reservation() -> Operation {
    Operation::new(
        "cancel_reservation",
        "Cancel a confirmed reservation and release its seats.",
        Effect::Write,
        |ctx, args| {
            let id = args.id("reservation_id")?;
            let reservation = fetch(ctx.store, &RESERVATION_SPEC, &id)?;
            RESERVATION.check(status(&reservation), "cancelled")?;
            let flight_id = reservation
                .get("flight_id")
                .map(scalar_text)
                .unwrap_or_default();
            let passengers = number(&reservation, "passengers").unwrap_or(0.0) as i64;
            if ctx.store.get(FLIGHT_SPEC.collection, &flight_id).is_some() {
                adjust_seats(ctx.store, ctx.clock, &flight_id, passengers)?;
            }
            shapes::transition(ctx, &RESERVATION_SPEC, RESERVATION, &id, "cancelled")?;
            let clock = ctx.clock;
            let now = clock.now();
            let record = ctx
                .store
                .get_mut(RESERVATION_SPEC.collection, &id)
                .ok_or_else(|| RESERVATION_SPEC.not_found(&id))?;
            set(record, "cancelled_at", now);
            Ok(Value::Object(record.clone()))
        },
    )
    .param(shapes::id_param(&RESERVATION_SPEC))
}

fn seat_count(flight: &Record) -> i64 {
    number(flight, "available_seats").unwrap_or(0.0) as i64
}

fn adjust_seats(store: &mut Store, clock: &Clock, flight_id: &str, delta: i64) -> ToolResult<()> {
    let flight = store
        .get_mut(FLIGHT_SPEC.collection, flight_id)
        .ok_or_else(|| FLIGHT_SPEC.not_found(flight_id))?;
    let seats = seat_count(flight) + delta;
    if seats < 0 {
        return Err(ToolError::precondition(format!(
            "Flight {flight_id} cannot go below zero available seats"
        )));
    }
    set(flight, "available_seats", json!(seats));
    touch(flight, clock);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::catalog::naming::Interface;
    use crate::core::error::ErrorKind;
    use crate::core::record::from_value;

    fn fixture() -> Store {
        let mut store = Store::new();
        store.insert("users", "1", from_value(json!({ "id": 1, "name": "Mia", "email": "mia@example.com" })));
        store.insert(
            "flights",
            "FL0001",
            from_value(json!({
                "flight_id": "FL0001",
                "flight_number": "HAT001",
                "origin": "SFO",
                "destination": "JFK",
                "date": "2025-02-01",
                "price": 120.5,
                "available_seats": 3,
                "status": "available"
            })),
        );
        store
    }

    #[test]
    fn booking_takes_seats_and_cancelling_returns_them() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-01-01T00:00:00Z").expect("clock");
        let mut store = fixture();

        let booked = catalog
            .invoke(
                "book_reservation",
                &mut store,
                &clock,
                &json!({ "user_id": "1", "flight_id": "FL0001", "passengers": 2 }),
            )
            .expect("book");
        let booked: Value = serde_json::from_str(&booked).expect("json");
        assert_eq!(booked["reservation_id"], "RES00001");
        assert_eq!(booked["total_price"], 241.0);
        assert_eq!(store.get("flights", "FL0001").expect("flight")["available_seats"], 1);

        let err = catalog
            .invoke(
                "book_reservation",
                &mut store,
                &clock,
                &json!({ "user_id": "1", "flight_id": "FL0001", "passengers": 2 }),
            )
            .expect_err("overbooked");
        assert_eq!(err.kind, ErrorKind::PreconditionFailed);

        catalog
            .invoke("cancel_reservation", &mut store, &clock, &json!({ "reservation_id": "RES00001" }))
            .expect("cancel");
        assert_eq!(store.get("flights", "FL0001").expect("flight")["available_seats"], 3);

        let err = catalog
            .invoke("cancel_reservation", &mut store, &clock, &json!({ "reservation_id": "RES00001" }))
            .expect_err("already cancelled");
        assert_eq!(err.kind, ErrorKind::AlreadyApplied);
    }

    #[test]
    fn fractional_seat_counts_are_read_as_numbers() {
        let catalog = Catalog::build(operations(), Interface::default()).expect("catalog");
        let clock = Clock::fixed("2025-01-01T00:00:00Z").expect("clock");
        let mut store = fixture();
        store
            .get_mut("flights", "FL0001")
            .expect("flight")
            .insert("available_seats".to_string(), json!(3.0));

        catalog
            .invoke(
                "book_reservation",
                &mut store,
                &clock,
                &json!({ "user_id": "1", "flight_id": "FL0001", "passengers": 2 }),
            )
            .expect("book");
        assert_eq!(store.get("flights", "FL0001").expect("flight")["available_seats"], 1);
    }
}
