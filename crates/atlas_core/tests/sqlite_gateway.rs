use atlas_core::db::open_db_in_memory;
use atlas_core::{
    GatewayError, Level, LocationErrorKind, LocationGateway, LocationService, NodeKey,
    SqliteLocationGateway,
};
use rusqlite::Connection;
use uuid::Uuid;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

#[test]
fn try_new_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteLocationGateway::try_new(&conn).err().unwrap();

    assert!(matches!(
        err,
        GatewayError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn fetch_hierarchy_keeps_creation_order() {
    let conn = setup();
    let gateway = SqliteLocationGateway::try_new(&conn).unwrap();

    let zeta = gateway.create_country("Zeta").unwrap();
    let alpha = gateway.create_country("Alpha").unwrap();
    let second = gateway.create_city(zeta, "Second").unwrap();
    let first = gateway.create_city(zeta, "First").unwrap();
    gateway.create_delegation(second, "B").unwrap();
    gateway.create_delegation(second, "A").unwrap();
    gateway.create_delegation(first, "Only").unwrap();

    let countries = gateway.fetch_hierarchy().unwrap();

    let names: Vec<_> = countries.iter().map(|country| country.name.as_str()).collect();
    assert_eq!(names, vec!["Zeta", "Alpha"]);
    assert_eq!(countries[0].id, zeta);
    assert_eq!(countries[1].id, alpha);
    assert!(countries[1].cities.is_empty());
    let cities: Vec<_> = countries[0]
        .cities
        .iter()
        .map(|city| city.name.as_str())
        .collect();
    assert_eq!(cities, vec!["Second", "First"]);
    let delegations: Vec<_> = countries[0].cities[0]
        .delegations
        .iter()
        .map(|delegation| delegation.name.as_str())
        .collect();
    assert_eq!(delegations, vec!["B", "A"]);
}

#[test]
fn create_under_missing_parent_is_not_found() {
    let conn = setup();
    let gateway = SqliteLocationGateway::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    let err = gateway.create_city(missing, "Nowhere").unwrap_err();
    assert!(matches!(
        err,
        GatewayError::NotFound {
            level: Level::Country,
            id,
        } if id == missing
    ));

    let err = gateway.create_delegation(missing, "Nowhere").unwrap_err();
    assert!(matches!(
        err,
        GatewayError::NotFound {
            level: Level::City,
            ..
        }
    ));
}

#[test]
fn rename_and_delete_unknown_rows_are_not_found() {
    let conn = setup();
    let gateway = SqliteLocationGateway::try_new(&conn).unwrap();

    assert!(matches!(
        gateway.rename_city(Uuid::new_v4(), "Name").unwrap_err(),
        GatewayError::NotFound { .. }
    ));
    assert!(matches!(
        gateway.delete_delegation(Uuid::new_v4()).unwrap_err(),
        GatewayError::NotFound { .. }
    ));
}

#[test]
fn parent_rows_cannot_be_deleted_while_children_remain() {
    let conn = setup();
    let gateway = SqliteLocationGateway::try_new(&conn).unwrap();
    let country = gateway.create_country("Land").unwrap();
    let city = gateway.create_city(country, "Capital").unwrap();
    let delegation = gateway.create_delegation(city, "Office").unwrap();

    assert!(matches!(
        gateway.delete_city(city).unwrap_err(),
        GatewayError::Db(_)
    ));
    assert!(gateway.delete_country(country).is_err());

    gateway.delete_delegation(delegation).unwrap();
    gateway.delete_city(city).unwrap();
    gateway.delete_country(country).unwrap();
    assert!(gateway.fetch_hierarchy().unwrap().is_empty());
}

#[test]
fn refresh_picks_up_external_rows_and_drops_orphaned_staging() {
    let conn = setup();
    let service = LocationService::load(SqliteLocationGateway::try_new(&conn).unwrap()).unwrap();
    let external = SqliteLocationGateway::try_new(&conn).unwrap();

    let country = external.create_country("Land").unwrap();
    let city = external.create_city(country, "Capital").unwrap();
    external.create_delegation(city, "Office").unwrap();
    assert!(service.countries().is_empty());

    service.refresh().unwrap();
    assert_eq!(service.countries().len(), 1);

    let staged_root = service.stage_country("Draft").unwrap();
    let staged_city = service.stage_city(country.into(), "Harbour").unwrap();

    conn.execute_batch("DELETE FROM delegations; DELETE FROM cities; DELETE FROM countries;")
        .unwrap();
    let discarded = service.refresh().unwrap();

    assert_eq!(discarded.len(), 1);
    assert_eq!(discarded[0].key, NodeKey::Staged(staged_city));
    assert!(service.countries().is_empty());
    let staging = service.staging();
    assert_eq!(staging.new_countries.len(), 1);
    assert_eq!(staging.new_countries[0].key, NodeKey::Staged(staged_root));
    assert!(staging.additions.is_empty());
}

#[test]
fn refresh_failure_is_a_gateway_error() {
    let conn = setup();
    let service = LocationService::load(SqliteLocationGateway::try_new(&conn).unwrap()).unwrap();

    conn.execute_batch("DROP TABLE delegations;").unwrap();
    let err = service.refresh().unwrap_err();

    assert_eq!(err.kind(), LocationErrorKind::Gateway);
}
