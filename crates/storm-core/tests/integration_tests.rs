use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use storm_core::{
    validation, Application, Group, Query, ServiceDef, ServiceRef, Trigger, UserApplication,
};

fn group(identifier: &str, services: Vec<(&str, u16)>) -> Group {
    Group {
        identifier: identifier.to_string(),
        query: None,
        include: vec![],
        exclude: vec![],
        services: services
            .into_iter()
            .map(|(name, port)| ServiceDef {
                name: name.to_string(),
                protocol: "tcp".to_string(),
                port,
            })
            .collect(),
    }
}

#[test]
fn test_user_application_round_trip() {
    let user = UserApplication {
        identifier: "shop".to_string(),
        components: vec![
            "frontend".to_string(),
            "backend".to_string(),
            "db".to_string(),
        ],
        links: BTreeMap::from([
            ("frontend".to_string(), "backend[api]".to_string()),
            ("backend".to_string(), "db[postgres]".to_string()),
        ]),
        expose: vec!["frontend[http]".to_string(), "frontend[https]".to_string()],
    };

    let api = user.to_api_model().unwrap();
    assert_eq!(api.links.len(), 2);
    assert_eq!(api.expose.len(), 2);
    assert_eq!(api.to_user_model(), user);
}

#[test]
fn test_user_application_rejects_malformed_references() {
    let user = UserApplication {
        identifier: "shop".to_string(),
        components: vec!["frontend".to_string()],
        links: BTreeMap::new(),
        expose: vec!["frontend-http".to_string()],
    };
    assert!(user.to_api_model().is_err());
}

#[test]
fn test_application_validation_against_groups() {
    let groups = HashMap::from([
        ("frontend".to_string(), group("frontend", vec![("http", 80)])),
        ("db".to_string(), group("db", vec![("postgres", 5432)])),
    ]);

    let app = Application {
        identifier: "shop".to_string(),
        components: vec!["frontend".to_string(), "db".to_string()],
        links: vec![storm_core::Link {
            src: "frontend".to_string(),
            dest: ServiceRef::new("db", "postgres"),
        }],
        expose: vec![ServiceRef::new("frontend", "http")],
    };
    assert!(validation::validate_application(&app, &groups).is_ok());

    let dangling = Application {
        links: vec![storm_core::Link {
            src: "frontend".to_string(),
            dest: ServiceRef::new("db", "mysql"),
        }],
        ..app
    };
    assert!(validation::validate_application(&dangling, &groups).is_err());
}

#[test]
fn test_query_survives_wire_round_trip() {
    let query = Query::and(vec![
        Query::field_eq("status", "UP"),
        Query::or(vec![
            Query::field_in("cloud_id", ["n-1", "n-2"]),
            Query::field_regex("name", "^web-"),
        ]),
    ]);

    let wire = serde_json::to_string(&query).unwrap();
    let back: Query = serde_json::from_str(&wire).unwrap();
    assert_eq!(back, query);
}

#[test]
fn test_group_query_round_trips_through_the_document() {
    let mut g = group("web", vec![("http", 80)]);
    g.query = Some(Query::field_eq("engine.type", "docker"));

    let wire = serde_json::to_value(&g).unwrap();
    assert_eq!(wire["query"], serde_json::json!({"engine.type": "docker"}));

    let back: Group = serde_json::from_value(wire).unwrap();
    assert_eq!(back, g);
}

proptest! {
    #[test]
    fn prop_service_ref_survives_its_text_form(
        component in "[a-z][a-z0-9-]{0,12}",
        service in "[a-z][a-z0-9]{0,8}",
    ) {
        let reference = ServiceRef::new(&component, &service);
        let parsed = ServiceRef::parse(&reference.to_string()).unwrap();
        prop_assert_eq!(parsed, reference);
    }
}

#[test]
fn test_trigger_wire_shape() {
    let trigger: Trigger = serde_json::from_value(serde_json::json!({
        "uuid": "2f61e7b2",
        "name": "recipe",
        "arguments": {"recipe": "consul-server", "params": {"DATACENTER": "p1"}},
        "status": "pending"
    }))
    .unwrap();

    assert_eq!(trigger.argument("recipe"), Some("consul-server"));
    assert!(!trigger.is_terminal());
    assert!(trigger.error_reason().is_none());
}
