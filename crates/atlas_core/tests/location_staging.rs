mod common;

use atlas_core::{
    Level, LocationError, LocationErrorKind, LocationService, NodeKey, StagedId,
};
use common::ScriptedGateway;

fn setup() -> LocationService<ScriptedGateway> {
    LocationService::new(ScriptedGateway::new())
}

fn stage_complete_country(service: &LocationService<ScriptedGateway>, name: &str) -> StagedId {
    let country = service.stage_country(name).unwrap();
    let city = service.stage_city(country.into(), "Capital").unwrap();
    service
        .stage_delegation(country.into(), city.into(), "Centre")
        .unwrap();
    country
}

#[test]
fn stage_country_trims_name_and_touches_no_gateway() {
    let service = setup();

    let country = service.stage_country("  Wonderland  ").unwrap();

    let view = service.view(country.into()).unwrap();
    assert_eq!(view.name, "Wonderland");
    assert_eq!(view.level, Level::Country);
    assert!(service.gateway().calls().is_empty());
    assert!(service.countries().is_empty());
}

#[test]
fn stage_rejects_blank_names_at_every_level() {
    let service = setup();

    let err = service.stage_country("   ").unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::Validation);
    assert!(service.staging().is_empty());

    let country = service.stage_country("A").unwrap();
    let err = service.stage_city(country.into(), "\t").unwrap_err();
    assert!(matches!(err, LocationError::Validation(_)));

    let city = service.stage_city(country.into(), "B").unwrap();
    let err = service
        .stage_delegation(country.into(), city.into(), "")
        .unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::Validation);
    assert_eq!(err.to_string(), "delegation name must not be blank");
}

#[test]
fn country_without_cities_is_incomplete() {
    let service = setup();
    let country = service.stage_country("A").unwrap();

    assert!(!service.is_complete(country).unwrap());

    let city = service.stage_city(country.into(), "B").unwrap();
    assert!(!service.is_complete(country).unwrap());

    service
        .stage_delegation(country.into(), city.into(), "C")
        .unwrap();
    assert!(service.is_complete(country).unwrap());

    service.stage_city(country.into(), "D").unwrap();
    assert!(!service.is_complete(country).unwrap());
}

#[test]
fn second_country_is_rejected_while_first_is_incomplete() {
    let service = setup();
    let first = service.stage_country("A").unwrap();
    let before = service.staging();

    let err = service.stage_country("Second").unwrap_err();
    match err {
        LocationError::SingletonViolation { blocking, name } => {
            assert_eq!(blocking, first);
            assert_eq!(name, "A");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.staging(), before);
    assert_eq!(service.incomplete_root(), Some((first, "A".to_string())));
}

#[test]
fn completing_first_country_unblocks_the_next_one() {
    let service = setup();
    let first = stage_complete_country(&service, "First");
    assert_eq!(service.incomplete_root(), None);

    let second = service.stage_country("Second").unwrap();

    let staging = service.staging();
    let names: Vec<_> = staging
        .new_countries
        .iter()
        .map(|country| country.name.as_str())
        .collect();
    assert_eq!(names, vec!["First", "Second"]);
    assert_eq!(staging.new_countries[0].key, NodeKey::Staged(first));
    assert_eq!(service.incomplete_root().map(|(id, _)| id), Some(second));
}

fn incomplete_new_countries(service: &LocationService<ScriptedGateway>) -> Vec<String> {
    service
        .staging()
        .new_countries
        .into_iter()
        .filter(|country| !atlas_core::is_complete(country))
        .map(|country| country.name)
        .collect()
}

#[test]
fn adding_city_to_complete_country_is_rejected_while_another_is_incomplete() {
    let service = setup();
    let complete = stage_complete_country(&service, "A");
    let pending = service.stage_country("B").unwrap();
    let before = service.staging();

    let err = service.stage_city(complete.into(), "A2").unwrap_err();

    match err {
        LocationError::SingletonViolation { blocking, name } => {
            assert_eq!(blocking, pending);
            assert_eq!(name, "B");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.staging(), before);
    assert_eq!(incomplete_new_countries(&service), vec!["B"]);
}

#[test]
fn incomplete_country_can_still_receive_cities() {
    let service = setup();
    stage_complete_country(&service, "A");
    let pending = service.stage_country("B").unwrap();

    let city = service.stage_city(pending.into(), "B1").unwrap();
    service
        .stage_delegation(pending.into(), city.into(), "B1 Office")
        .unwrap();

    assert!(incomplete_new_countries(&service).is_empty());
    let second_city = service.stage_city(pending.into(), "B2").unwrap();
    assert_eq!(incomplete_new_countries(&service), vec!["B"]);
    service.unstage(second_city).unwrap();
    assert!(incomplete_new_countries(&service).is_empty());
}

#[test]
fn unstaging_inside_complete_country_never_leaves_two_incomplete() {
    let service = setup();
    let complete = service.stage_country("A").unwrap();
    let north = service.stage_city(complete.into(), "North").unwrap();
    let north_office = service
        .stage_delegation(complete.into(), north.into(), "North Office")
        .unwrap();
    let south = service.stage_city(complete.into(), "South").unwrap();
    let south_first = service
        .stage_delegation(complete.into(), south.into(), "South One")
        .unwrap();
    service
        .stage_delegation(complete.into(), south.into(), "South Two")
        .unwrap();
    service.stage_country("B").unwrap();

    service.unstage(south_first).unwrap();
    assert_eq!(incomplete_new_countries(&service), vec!["B"]);

    let report = service.unstage(north_office).unwrap();
    assert_eq!(report.collapsed_ancestors.len(), 1);
    assert_eq!(report.collapsed_ancestors[0].name, "North");
    assert_eq!(incomplete_new_countries(&service), vec!["B"]);
    assert!(service.is_complete(complete).unwrap());

    service.unstage(south).unwrap();
    assert!(service.view(complete.into()).is_none());
    assert_eq!(incomplete_new_countries(&service), vec!["B"]);
}

#[test]
fn stage_delegation_requires_city_of_the_given_country() {
    let service = setup();
    let first = stage_complete_country(&service, "First");
    let second = service.stage_country("Second").unwrap();
    let foreign_city = service.view(first.into()).unwrap().children[0].key;

    let err = service
        .stage_delegation(second.into(), foreign_city, "Lost")
        .unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::InvalidTarget);

    let err = service
        .stage_delegation(second.into(), second.into(), "Wrong level")
        .unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::InvalidTarget);

    let err = service
        .stage_city(NodeKey::Staged(StagedId::generate()), "Ghost")
        .unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::NotFound);
}

#[test]
fn unstage_collapses_staged_ancestors_left_empty() {
    let service = setup();
    let country = service.stage_country("A").unwrap();
    let city = service.stage_city(country.into(), "B").unwrap();
    let delegation = service
        .stage_delegation(country.into(), city.into(), "C")
        .unwrap();

    let report = service.unstage(delegation).unwrap();

    assert_eq!(report.removed.name, "C");
    assert!(report.discarded_descendants.is_empty());
    let collapsed: Vec<_> = report
        .collapsed_ancestors
        .iter()
        .map(|item| (item.level, item.name.as_str()))
        .collect();
    assert_eq!(collapsed, vec![(Level::City, "B"), (Level::Country, "A")]);
    assert!(service.staging().is_empty());
    assert_eq!(service.incomplete_root(), None);
}

#[test]
fn unstage_keeps_ancestors_with_remaining_children() {
    let service = setup();
    let country = service.stage_country("A").unwrap();
    let city = service.stage_city(country.into(), "B").unwrap();
    let keep = service
        .stage_delegation(country.into(), city.into(), "Keep")
        .unwrap();
    let drop = service
        .stage_delegation(country.into(), city.into(), "Drop")
        .unwrap();

    let report = service.unstage(drop).unwrap();

    assert!(report.collapsed_ancestors.is_empty());
    let view = service.view(country.into()).unwrap();
    assert_eq!(view.children[0].children.len(), 1);
    assert_eq!(view.children[0].children[0].key, NodeKey::Staged(keep));
}

#[test]
fn unstage_country_discards_whole_subtree() {
    let service = setup();
    let country = stage_complete_country(&service, "A");

    let report = service.unstage(country).unwrap();

    assert_eq!(report.removed.level, Level::Country);
    let levels: Vec<_> = report
        .discarded_descendants
        .iter()
        .map(|item| item.level)
        .collect();
    assert_eq!(levels, vec![Level::Delegation, Level::City]);
    assert!(service.staging().is_empty());

    let err = service.unstage(country).unwrap_err();
    assert_eq!(err.kind(), LocationErrorKind::NotFound);
}

#[test]
fn additions_under_persisted_country_do_not_trigger_singleton_guard() {
    let service = setup();
    let committed = stage_complete_country(&service, "Persisted");
    let persisted = service.commit(committed).unwrap();

    let city = service.stage_city(persisted.id.into(), "Empty city").unwrap();
    assert!(service.incomplete_root().is_none());
    service.stage_country("Fresh").unwrap();

    let staging = service.staging();
    assert_eq!(staging.additions.len(), 1);
    assert_eq!(staging.additions[0].parent, persisted.id);
    assert_eq!(staging.additions[0].node.key, NodeKey::Staged(city));
}

#[test]
fn reset_discards_staged_work_and_keeps_entity_store() {
    let service = setup();
    let committed = stage_complete_country(&service, "Persisted");
    let persisted = service.commit(committed).unwrap();
    service.stage_city(persisted.id.into(), "Pending").unwrap();
    service.stage_country("Draft").unwrap();

    let removed = service.reset();

    assert_eq!(removed.len(), 2);
    assert!(service.staging().is_empty());
    assert_eq!(service.countries(), vec![persisted]);
    assert!(service.stage_country("Next").is_ok());
}

#[test]
fn staging_snapshot_serializes_with_tagged_keys() {
    let service = setup();
    let country = service.stage_country("A").unwrap();

    let json = serde_json::to_value(service.staging()).unwrap();

    assert_eq!(json["new_countries"][0]["name"], "A");
    assert_eq!(json["new_countries"][0]["level"], "country");
    assert_eq!(json["new_countries"][0]["key"]["state"], "staged");
    assert_eq!(
        json["new_countries"][0]["key"]["id"],
        country.as_uuid().to_string()
    );
    assert_eq!(json["additions"].as_array().map(Vec::len), Some(0));
}
