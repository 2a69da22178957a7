#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use odata_core::metadata::{EntitySet, EntityType, Model, NavigationProperty, PrimitiveType, Property};
use odata_core::{EntitySource, InMemoryEntitySet, ODataLimits, ODataQuery};
use serde_json::{json, Value as Json};

/// Airports with a collection of departing flights; flights point back to their origin.
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
        .with_property(Property::new("secret", PrimitiveType::String).with_filterable(false))
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
        .with_property(Property::new("duration", PrimitiveType::Int32))
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
        .entity_set(EntitySet::new("flights", "Flight"))
        .unwrap()
        .build()
        .unwrap()
}

pub fn airport_type(model: &Model) -> &EntityType {
    model.entity_type("Airport").unwrap()
}

pub fn airports() -> Vec<Json> {
    vec![
        json!({
            "id": 1, "name": "Heathrow", "code": "LHR", "rating": 4.5, "review": 1,
            "opened": "1946-03-25", "secret": "a",
            "flights": [
                { "id": 1, "origin": "LHR", "destination": "JFK", "duration": 420 },
                { "id": 2, "origin": "LHR", "destination": "CDG", "duration": 75 }
            ]
        }),
        json!({
            "id": 2, "name": "Gatwick", "code": "LGW", "rating": 3.0, "review": null,
            "opened": "1958-06-09", "secret": "b",
            "flights": [
                { "id": 3, "origin": "LGW", "destination": "CDG", "duration": 80 }
            ]
        }),
        json!({
            "id": 3, "name": "Kennedy", "code": "JFK", "rating": null, "review": 5,
            "opened": "1948-07-01", "secret": "c",
            "flights": [
                { "id": 4, "origin": "JFK", "destination": "LHR", "duration": 400 }
            ]
        }),
        json!({
            "id": 4, "name": "O'Hare", "code": "ORD", "rating": 4.0, "review": 3,
            "opened": null, "secret": "d",
            "flights": []
        }),
        json!({
            "id": 5, "name": "Changi", "code": "SIN", "rating": 5.0, "review": 0,
            "opened": "1981-07-01", "secret": "e",
            "flights": []
        }),
    ]
}

/// Parse `options` against the airport type and return the matching ids in order.
pub fn query_ids(options: &[(&str, &str)]) -> Vec<i64> {
    let model = model();
    let query = ODataQuery::parse(&model, airport_type(&model), options.iter().copied(), &ODataLimits::default()).unwrap();
    let mut set = InMemoryEntitySet::new(airport_type(&model), airports(), &query).unwrap();
    set.fetch(0, u64::MAX)
        .unwrap()
        .iter()
        .map(|record| record["id"].as_i64().unwrap())
        .collect()
}

pub fn filter_ids(filter: &str) -> Vec<i64> {
    query_ids(&[("$filter", filter)])
}
