#![allow(dead_code)]

use atlas_core::{
    City, Country, Delegation, GatewayError, GatewayResult, Level, LocationGateway, LocationId,
};
use std::sync::{Arc, Barrier, Mutex, MutexGuard};
use uuid::Uuid;

/// In-memory gateway that records every call and can fail or pause on demand.
#[derive(Default)]
pub struct ScriptedGateway {
    state: Mutex<ScriptState>,
    pause: Mutex<Option<(String, Arc<Barrier>)>>,
}

#[derive(Default)]
struct ScriptState {
    countries: Vec<Country>,
    calls: Vec<String>,
    failures: Vec<(String, usize)>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `nth` (1-based) upcoming call of `op` with `Unavailable`.
    pub fn fail_on(&self, op: &str, nth: usize) {
        self.lock().failures.push((op.to_string(), nth));
    }

    /// Pauses the next call of `op` between two waits on the returned
    /// barrier: the first wait meets the call, the second releases it.
    pub fn pause_on(&self, op: &str) -> Arc<Barrier> {
        let barrier = Arc::new(Barrier::new(2));
        *self.pause.lock().unwrap() = Some((op.to_string(), Arc::clone(&barrier)));
        barrier
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn calls_of(&self, op: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.split(' ').next() == Some(op))
            .count()
    }

    pub fn stored(&self) -> Vec<Country> {
        self.lock().countries.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap()
    }

    fn enter(&self, op: &str, detail: &str) -> GatewayResult<MutexGuard<'_, ScriptState>> {
        let paused = {
            let mut pause = self.pause.lock().unwrap();
            let matches = pause
                .as_ref()
                .is_some_and(|(target, _)| target.as_str() == op);
            if matches {
                pause.take().map(|(_, barrier)| barrier)
            } else {
                None
            }
        };
        if let Some(barrier) = paused {
            barrier.wait();
            barrier.wait();
        }

        let mut state = self.lock();
        state.calls.push(format!("{op} {detail}"));
        let mut fail = false;
        for (target, remaining) in state.failures.iter_mut() {
            if target.as_str() == op && *remaining > 0 {
                *remaining -= 1;
                fail |= *remaining == 0;
            }
        }
        if fail {
            return Err(GatewayError::Unavailable(format!("injected failure on {op}")));
        }
        Ok(state)
    }
}

impl ScriptState {
    fn country_mut(&mut self, id: LocationId) -> GatewayResult<&mut Country> {
        self.countries
            .iter_mut()
            .find(|country| country.id == id)
            .ok_or(GatewayError::NotFound {
                level: Level::Country,
                id,
            })
    }

    fn city_mut(&mut self, id: LocationId) -> GatewayResult<&mut City> {
        self.countries
            .iter_mut()
            .flat_map(|country| country.cities.iter_mut())
            .find(|city| city.id == id)
            .ok_or(GatewayError::NotFound {
                level: Level::City,
                id,
            })
    }

    fn delegation_mut(&mut self, id: LocationId) -> GatewayResult<&mut Delegation> {
        self.countries
            .iter_mut()
            .flat_map(|country| country.cities.iter_mut())
            .flat_map(|city| city.delegations.iter_mut())
            .find(|delegation| delegation.id == id)
            .ok_or(GatewayError::NotFound {
                level: Level::Delegation,
                id,
            })
    }
}

impl LocationGateway for ScriptedGateway {
    fn create_country(&self, name: &str) -> GatewayResult<LocationId> {
        let mut state = self.enter("create_country", name)?;
        let id = Uuid::new_v4();
        state.countries.push(Country {
            id,
            name: name.to_string(),
            cities: Vec::new(),
        });
        Ok(id)
    }

    fn create_city(&self, country_id: LocationId, name: &str) -> GatewayResult<LocationId> {
        let mut state = self.enter("create_city", name)?;
        let id = Uuid::new_v4();
        state.country_mut(country_id)?.cities.push(City {
            id,
            name: name.to_string(),
            delegations: Vec::new(),
        });
        Ok(id)
    }

    fn create_delegation(&self, city_id: LocationId, name: &str) -> GatewayResult<LocationId> {
        let mut state = self.enter("create_delegation", name)?;
        let id = Uuid::new_v4();
        state.city_mut(city_id)?.delegations.push(Delegation {
            id,
            name: name.to_string(),
        });
        Ok(id)
    }

    fn rename_country(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        let mut state = self.enter("rename_country", name)?;
        state.country_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn rename_city(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        let mut state = self.enter("rename_city", name)?;
        state.city_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn rename_delegation(&self, id: LocationId, name: &str) -> GatewayResult<()> {
        let mut state = self.enter("rename_delegation", name)?;
        state.delegation_mut(id)?.name = name.to_string();
        Ok(())
    }

    fn delete_country(&self, id: LocationId) -> GatewayResult<()> {
        let mut state = self.enter("delete_country", &id.to_string())?;
        if !state.country_mut(id)?.cities.is_empty() {
            return Err(GatewayError::Unavailable("country still has cities".to_string()));
        }
        state.countries.retain(|country| country.id != id);
        Ok(())
    }

    fn delete_city(&self, id: LocationId) -> GatewayResult<()> {
        let mut state = self.enter("delete_city", &id.to_string())?;
        if !state.city_mut(id)?.delegations.is_empty() {
            return Err(GatewayError::Unavailable("city still has delegations".to_string()));
        }
        for country in state.countries.iter_mut() {
            country.cities.retain(|city| city.id != id);
        }
        Ok(())
    }

    fn delete_delegation(&self, id: LocationId) -> GatewayResult<()> {
        let mut state = self.enter("delete_delegation", &id.to_string())?;
        state.delegation_mut(id)?;
        for city in state
            .countries
            .iter_mut()
            .flat_map(|country| country.cities.iter_mut())
        {
            city.delegations.retain(|delegation| delegation.id != id);
        }
        Ok(())
    }

    fn fetch_hierarchy(&self) -> GatewayResult<Vec<Country>> {
        let state = self.enter("fetch_hierarchy", "")?;
        Ok(state.countries.clone())
    }
}

/// Names of `country`'s cities in order.
pub fn city_names(country: &Country) -> Vec<&str> {
    country.cities.iter().map(|city| city.name.as_str()).collect()
}

/// Names of `city`'s delegations in order.
pub fn delegation_names(city: &City) -> Vec<&str> {
    city.delegations
        .iter()
        .map(|delegation| delegation.name.as_str())
        .collect()
}
