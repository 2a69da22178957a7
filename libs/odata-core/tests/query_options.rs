#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Assembling `ODataQuery` from raw system query options.

mod common;

use common::{airport_type, model};
use figment::{providers::Serialized, Figment};
use odata_core::{Error, ODataLimits, ODataQuery, SortDir};

fn parse(options: &[(&str, &str)]) -> Result<ODataQuery, Error> {
    parse_with(options, &ODataLimits::default())
}

fn parse_with(options: &[(&str, &str)], limits: &ODataLimits) -> Result<ODataQuery, Error> {
    let model = model();
    ODataQuery::parse(&model, airport_type(&model), options.iter().copied(), limits)
}

#[test]
fn all_options_together() {
    let query = parse(&[
        ("$filter", "rating gt 3"),
        ("$search", "lhr OR jfk"),
        ("$orderby", "name desc"),
        ("$top", "10"),
        ("$skip", "5"),
        ("$count", "true"),
        ("$select", "id,name"),
        ("$expand", "flights"),
        ("debug", "1"),
    ])
    .unwrap();
    assert_eq!(query.filter().unwrap().to_string(), "rating gt 3");
    assert!(query.search().is_some());
    assert_eq!(query.order.keys().next().unwrap().dir, SortDir::Desc);
    assert_eq!((query.top, query.skip), (Some(10), Some(5)));
    assert!(query.count);
    assert_eq!(query.selected_fields(), Some(&["id".to_owned(), "name".to_owned()][..]));
    assert_eq!(query.expand.len(), 1);
    assert_eq!(query.expand[0].target, "Flight");
}

#[test]
fn select_star_means_everything() {
    assert_eq!(parse(&[("$select", "*")]).unwrap().select, None);
    assert!(matches!(parse(&[("$select", "id,,name")]), Err(Error::Parser(_))));
    assert!(matches!(parse(&[("$select", "id,missing")]), Err(Error::Parser(_))));
}

#[test]
fn expand_with_nested_options() {
    let query = parse(&[(
        "$expand",
        "flights($filter=destination eq 'CDG';$orderby=duration desc;$top=1;$select=id,duration)",
    )])
    .unwrap();
    let item = &query.expand[0];
    assert_eq!(item.navigation, "flights");
    assert_eq!(item.query.filter().unwrap().to_string(), "destination eq 'CDG'");
    assert_eq!(item.query.top, Some(1));
    assert_eq!(item.query.order.to_string(), "duration desc");
    assert_eq!(item.query.selected_fields().unwrap().len(), 2);
}

#[test]
fn nested_filters_resolve_against_the_navigation_target() {
    let err = parse(&[("$expand", "flights($filter=name eq 'x')")]).unwrap_err();
    assert!(matches!(err, Error::Parser(e) if e.message.contains("'Flight'")));
}

#[test]
fn expand_depth_is_limited() {
    let limits = ODataLimits::default().with_max_expand_depth(1);
    assert!(parse_with(&[("$expand", "flights")], &limits).is_ok());
    assert!(matches!(
        parse_with(&[("$expand", "flights($expand=origin_airport)")], &limits),
        Err(Error::InvalidQueryOption { .. })
    ));
    assert!(parse(&[("$expand", "flights($expand=origin_airport($expand=flights))")]).is_ok());
}

#[test]
fn expand_rejects_unknown_navigation() {
    assert!(matches!(parse(&[("$expand", "runways")]), Err(Error::Parser(_))));
    assert!(matches!(parse(&[("$expand", "flights($top)")]), Err(Error::Parser(_))));
}

#[test]
fn limits_are_enforced() {
    assert_eq!(parse(&[("$top", "1001")]).unwrap_err(), Error::InvalidLimit(1001));
    assert!(matches!(
        parse(&[("$orderby", "id,name,code,rating,review,opened")]),
        Err(Error::InvalidOrderBy(_))
    ));
    let limits = ODataLimits::default().with_max_filter_length(8);
    assert!(matches!(
        parse_with(&[("$filter", "rating gt 3")], &limits),
        Err(Error::InvalidFilter(_))
    ));
}

#[test]
fn malformed_options() {
    assert!(matches!(parse(&[("$top", "-1")]), Err(Error::InvalidQueryOption { .. })));
    assert!(matches!(parse(&[("$count", "yes")]), Err(Error::InvalidQueryOption { .. })));
    assert!(matches!(parse(&[("$apply", "x")]), Err(Error::InvalidQueryOption { .. })));
    assert!(matches!(
        parse(&[("$top", "1"), ("$top", "2")]),
        Err(Error::InvalidQueryOption { option, .. }) if option == "$top"
    ));
}

#[test]
fn limits_come_from_configuration() {
    let figment = Figment::new().merge(Serialized::defaults(serde_json::json!({
        "odata": { "max_top": 5 }
    })));
    let limits = ODataLimits::from_figment(&figment).unwrap();
    assert!(parse_with(&[("$top", "5")], &limits).is_ok());
    assert_eq!(parse_with(&[("$top", "6")], &limits).unwrap_err(), Error::InvalidLimit(6));
}
