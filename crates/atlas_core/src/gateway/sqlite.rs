//! SQLite-backed persistence gateway.
//!
//! # Responsibility
//! - Persist countries, cities and delegations in dedicated tables.
//! - Keep SQL details and ordering behavior inside the gateway boundary.
//!
//! # Invariants
//! - Sibling listing is deterministic: `sort_order ASC, id ASC`.
//! - Parent rows cannot be deleted while child rows reference them
//!   (`ON DELETE RESTRICT`).
//! - Create calls verify the parent row exists before inserting.

use crate::db::migrations::latest_version;
use crate::gateway::{GatewayError, GatewayResult, LocationGateway};
use crate::model::location::{City, Country, Delegation, Level, LocationId};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use uuid::Uuid;

/// SQLite-backed location gateway.
pub struct SqliteLocationGateway<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLocationGateway<'conn> {
    /// Creates gateway from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> GatewayResult<Self> {
        ensure_location_connection_ready(conn)?;
        Ok(Self { conn })
    }

    fn insert_row(
        &self,
        level: Level,
        parent_id: Option<LocationId>,
        name: &str,
    ) -> GatewayResult<LocationId> {
        if let (Some(parent_level), Some(parent_id)) = (level.parent(), parent_id) {
            if !row_exists(self.conn, parent_level, parent_id)? {
                return Err(GatewayError::NotFound {
                    level: parent_level,
                    id: parent_id,
                });
            }
        }

        let id = Uuid::new_v4();
        let sort_order = next_sort_order(self.conn, level, parent_id)?;
        match parent_column(level) {
            None => {
                self.conn.execute(
                    "INSERT INTO countries (id, name, sort_order) VALUES (?1, ?2, ?3);",
                    params![id.to_string(), name, sort_order],
                )?;
            }
            Some(column) => {
                self.conn.execute(
                    &format!(
                        "INSERT INTO {table} (id, {column}, name, sort_order)
                         VALUES (?1, ?2, ?3, ?4);",
                        table = table_name(level)
                    ),
                    params![
                        id.to_string(),
                        parent_id.map(|value| value.to_string()),
                        name,
                        sort_order,
                    ],
                )?;
            }
        }
        debug!(
            "event=gateway_call module=gateway status=ok op=create level={} id={}",
            level, id
        );
        Ok(id)
    }

    fn rename_row(&self, level: Level, id: LocationId, name: &str) -> GatewayResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET name = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                table = table_name(level)
            ),
            params![id.to_string(), name],
        )?;
        if changed == 0 {
            return Err(GatewayError::NotFound { level, id });
        }
        debug!(
            "event=gateway_call module=gateway status=ok op=rename level={} id={}",
            level, id
        );
        Ok(())
    }

    fn delete_row(&self, level: Level, id: LocationId) -> GatewayResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {table} WHERE id = ?1;", table = table_name(level)),
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(GatewayError::NotFound { level, id });
        }
        debug!(
            "event=gateway_call module=gateway status=ok op=delete level={} id={}",
            level, id
        );
        Ok(())
    }
}

impl LocationGateway for SqliteLocationGateway<'_> {
    fn create_country(&self, name: &str) -> GatewayResult<LocationId> {
        self.insert_row(Level::Country, None, name)
    }

    fn create_city(&self, country_id: LocationId, name: &str) -> GatewayResult<LocationId> {
        self.insert_row(Level::City, Some(country_id), name)
    }

    fn create_delegation(&self, city_id: LocationId, name: &str) -> GatewayResult<LocationId> {
        self.insert_row(Level::Delegation, Some(city_id), name)
    }

    fn rename_country(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        self.rename_row(Level::Country, id, name)
    }

    fn rename_city(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        self.rename_row(Level::City, id, name)
    }

    fn rename_delegation(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        self.rename_row(Level::Delegation, id, name)
    }

    fn delete_country(&self, id: LocationId) -> GatewayResult<()> {
        self.delete_row(Level::Country, id)
    }

    fn delete_city(&self, id: LocationId) -> GatewayResult<()> {
        self.delete_row(Level::City, id)
    }

    fn delete_delegation(&self, id: LocationId) -> GatewayResult<()> {
        self.delete_row(Level::Delegation, id)
    }

    fn fetch_hierarchy(&self) -> GatewayResult<Vec<Country>> {
        let mut delegations_by_city: HashMap<LocationId, Vec<Delegation>> = HashMap::new();
        for (id, city_id, name) in load_rows(self.conn, Level::Delegation)? {
            let Some(city_id) = city_id else {
                return Err(GatewayError::InvalidData(format!(
                    "delegation {id} has no city"
                )));
            };
            delegations_by_city
                .entry(city_id)
                .or_default()
                .push(Delegation { id, name });
        }

        let mut cities_by_country: HashMap<LocationId, Vec<City>> = HashMap::new();
        for (id, country_id, name) in load_rows(self.conn, Level::City)? {
            let Some(country_id) = country_id else {
                return Err(GatewayError::InvalidData(format!("city {id} has no country")));
            };
            cities_by_country.entry(country_id).or_default().push(City {
                id,
                name,
                delegations: delegations_by_city.remove(&id).unwrap_or_default(),
            });
        }

        let countries = load_rows(self.conn, Level::Country)?
            .into_iter()
            .map(|(id, _, name)| Country {
                id,
                name,
                cities: cities_by_country.remove(&id).unwrap_or_default(),
            })
            .collect::<Vec<_>>();

        if let Some(city_id) = delegations_by_city.keys().next() {
            return Err(GatewayError::InvalidData(format!(
                "delegation rows reference unknown city {city_id}"
            )));
        }
        if let Some(country_id) = cities_by_country.keys().next() {
            return Err(GatewayError::InvalidData(format!(
                "city rows reference unknown country {country_id}"
            )));
        }

        debug!(
            "event=gateway_call module=gateway status=ok op=fetch_hierarchy countries={}",
            countries.len()
        );
        Ok(countries)
    }
}

fn table_name(level: Level) -> &'static str {
    match level {
        Level::Country => "countries",
        Level::City => "cities",
        Level::Delegation => "delegations",
    }
}

fn parent_column(level: Level) -> Option<&'static str> {
    match level {
        Level::Country => None,
        Level::City => Some("country_id"),
        Level::Delegation => Some("city_id"),
    }
}

fn row_exists(conn: &Connection, level: Level, id: LocationId) -> GatewayResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!("SELECT 1 FROM {table} WHERE id = ?1;", table = table_name(level)),
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn next_sort_order(
    conn: &Connection,
    level: Level,
    parent_id: Option<LocationId>,
) -> GatewayResult<i64> {
    let next = match (parent_column(level), parent_id) {
        (Some(column), Some(parent_id)) => conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(sort_order), -1) + 1
                 FROM {table}
                 WHERE {column} = ?1;",
                table = table_name(level)
            ),
            [parent_id.to_string()],
            |row| row.get(0),
        )?,
        _ => conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {table};",
                table = table_name(level)
            ),
            [],
            |row| row.get(0),
        )?,
    };
    Ok(next)
}

/// Loads `(id, parent_id, name)` rows of one level in sibling order.
fn load_rows(
    conn: &Connection,
    level: Level,
) -> GatewayResult<Vec<(LocationId, Option<LocationId>, String)>> {
    let sql = match parent_column(level) {
        Some(column) => format!(
            "SELECT id, {column}, name
             FROM {table}
             ORDER BY {column} ASC, sort_order ASC, id ASC;",
            table = table_name(level)
        ),
        None => format!(
            "SELECT id, NULL, name
             FROM {table}
             ORDER BY sort_order ASC, id ASC;",
            table = table_name(level)
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        let parent_text: Option<String> = row.get(1)?;
        let name: String = row.get(2)?;
        let id = parse_uuid(&id_text, table_name(level))?;
        let parent = parent_text
            .map(|value| parse_uuid(&value, table_name(level)))
            .transpose()?;
        items.push((id, parent, name));
    }
    Ok(items)
}

fn parse_uuid(value: &str, table: &'static str) -> GatewayResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| GatewayError::InvalidData(format!("invalid uuid `{value}` in {table}")))
}

fn ensure_location_connection_ready(conn: &Connection) -> GatewayResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(GatewayError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["countries", "cities", "delegations"] {
        if !table_exists(conn, table)? {
            return Err(GatewayError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> GatewayResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
