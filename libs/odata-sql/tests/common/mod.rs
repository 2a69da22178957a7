#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use odata_core::metadata::{EntitySet, EntityType, Model, NavigationProperty, PrimitiveType, Property};
use odata_core::{EntitySource, InMemoryEntitySet, ODataLimits, ODataQuery};
use serde_json::{Value as Json, json};

/// Airports and their departing flights. Flights live in `flight_legs` and store
/// `duration` in a `minutes` column.
pub fn model() -> Model {
    let airport = EntityType::new("Airport")
        .with_key(Property::new("id", PrimitiveType::Int32))
        .unwrap()
        .with_property(Property::new("name", PrimitiveType::String).with_searchable(true))
        .unwrap()
        .with_property(
            Property::new("code", PrimitiveType::String)
                .with_searchable(true)
                .as_alternative_key(),
        )
        .unwrap()
        .with_property(Property::new("rating", PrimitiveType::Double))
        .unwrap()
        .with_property(Property::new("review", PrimitiveType::Int32))
        .unwrap()
        .with_property(Property::new("opened", PrimitiveType::Date))
        .unwrap()
        .with_navigation(
            NavigationProperty::new("flights", "Flight")
                .with_collection(true)
                .with_partner("origin_airport")
                .with_constraint("code", "origin"),
        )
        .unwrap();

    let flight = EntityType::new("Flight")
        .with_key(Property::new("id", PrimitiveType::Int32))
        .unwrap()
        .with_property(Property::new("origin", PrimitiveType::String))
        .unwrap()
        .with_property(Property::new("destination", PrimitiveType::String))
        .unwrap()
        .with_property(Property::new("duration", PrimitiveType::Int32).with_source_name("minutes"))
        .unwrap()
        .with_navigation(
            NavigationProperty::new("origin_airport", "Airport")
                .with_partner("flights")
                .with_constraint("origin", "code"),
        )
        .unwrap();

    Model::builder()
        .entity_type(airport)
        .unwrap()
        .entity_type(flight)
        .unwrap()
        .entity_set(EntitySet::new("airports", "Airport"))
        .unwrap()
        .entity_set(EntitySet::new("flights", "Flight").with_source_name("flight_legs"))
        .unwrap()
        .build()
        .unwrap()
}

pub const SCHEMA: &[&str] = &[
    "CREATE TABLE airports (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        code TEXT NOT NULL,
        rating REAL,
        review INTEGER,
        opened TEXT
    )",
    "CREATE TABLE flight_legs (
        id INTEGER PRIMARY KEY,
        origin TEXT NOT NULL,
        destination TEXT NOT NULL,
        minutes INTEGER NOT NULL
    )",
    "INSERT INTO airports (id, name, code, rating, review, opened) VALUES
        (1, 'Heathrow', 'LHR', 4.5, 1, '1946-03-25'),
        (2, 'Gatwick', 'LGW', 3.0, NULL, '1958-06-09'),
        (3, 'Kennedy', 'JFK', NULL, 5, '1948-07-01'),
        (4, 'O''Hare', 'ORD', 4.0, 3, NULL),
        (5, 'Changi', 'SIN', 5.0, 0, '1981-07-01')",
    "INSERT INTO flight_legs (id, origin, destination, minutes) VALUES
        (1, 'LHR', 'JFK', 420),
        (2, 'LHR', 'CDG', 75),
        (3, 'LGW', 'CDG', 80),
        (4, 'JFK', 'LHR', 400)",
];

fn airport_rows() -> Vec<Json> {
    vec![
        json!({ "id": 1, "name": "Heathrow", "code": "LHR", "rating": 4.5, "review": 1, "opened": "1946-03-25" }),
        json!({ "id": 2, "name": "Gatwick", "code": "LGW", "rating": 3.0, "review": null, "opened": "1958-06-09" }),
        json!({ "id": 3, "name": "Kennedy", "code": "JFK", "rating": null, "review": 5, "opened": "1948-07-01" }),
        json!({ "id": 4, "name": "O'Hare", "code": "ORD", "rating": 4.0, "review": 3, "opened": null }),
        json!({ "id": 5, "name": "Changi", "code": "SIN", "rating": 5.0, "review": 0, "opened": "1981-07-01" }),
    ]
}

fn flight_rows() -> Vec<Json> {
    vec![
        json!({ "id": 1, "origin": "LHR", "destination": "JFK", "duration": 420 }),
        json!({ "id": 2, "origin": "LHR", "destination": "CDG", "duration": 75 }),
        json!({ "id": 3, "origin": "LGW", "destination": "CDG", "duration": 80 }),
        json!({ "id": 4, "origin": "JFK", "destination": "LHR", "duration": 400 }),
    ]
}

/// Airports with their `flights` embedded, the same data as the SQL tables.
pub fn airports() -> Vec<Json> {
    let flights = flight_rows();
    airport_rows()
        .into_iter()
        .map(|mut airport| {
            let departing: Vec<Json> = flights
                .iter()
                .filter(|f| f["origin"] == airport["code"])
                .cloned()
                .collect();
            airport["flights"] = Json::Array(departing);
            airport
        })
        .collect()
}

/// Flights with their `origin_airport` embedded.
pub fn flights() -> Vec<Json> {
    let airports = airport_rows();
    flight_rows()
        .into_iter()
        .map(|mut flight| {
            let origin = airports
                .iter()
                .find(|a| a["code"] == flight["origin"])
                .cloned()
                .unwrap_or(Json::Null);
            flight["origin_airport"] = origin;
            flight
        })
        .collect()
}

pub fn entity_type<'m>(model: &'m Model, set: &str) -> &'m EntityType {
    let entity_set = model.entity_set(set).unwrap();
    model.entity_type(entity_set.entity_type()).unwrap()
}

pub fn query(model: &Model, set: &str, options: &[(&str, &str)]) -> ODataQuery {
    ODataQuery::parse(
        model,
        entity_type(model, set),
        options.iter().copied(),
        &ODataLimits::default(),
    )
    .unwrap()
}

/// Ids the in-memory evaluator returns for `options`.
pub fn loopback_ids(set: &str, options: &[(&str, &str)]) -> Vec<i64> {
    let model = model();
    let query = query(&model, set, options);
    let records = if set == "airports" { airports() } else { flights() };
    let mut source = InMemoryEntitySet::new(entity_type(&model, set), records, &query).unwrap();
    source
        .fetch(query.skip.unwrap_or(0), query.top.unwrap_or(u64::MAX))
        .unwrap()
        .iter()
        .map(|record| record["id"].as_i64().unwrap())
        .collect()
}
