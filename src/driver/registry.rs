use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use lazy_static::lazy_static;

use crate::connection_string::canonical_driver_name;
use crate::error::SqlBridgeError;

use super::Driver;

/// Creates a fresh, unopened driver instance.
pub type DriverFactory = Arc<dyn Fn() -> Box<dyn Driver> + Send + Sync>;

lazy_static! {
    static ref DRIVERS: RwLock<HashMap<String, DriverFactory>> = RwLock::new(builtin_drivers());
}

fn builtin_drivers() -> HashMap<String, DriverFactory> {
    #[allow(unused_mut)]
    let mut drivers: HashMap<String, DriverFactory> = HashMap::new();
    #[cfg(feature = "sqlite")]
    drivers.insert(
        "sqlite3".to_string(),
        Arc::new(|| Box::new(crate::sqlite::SqliteDriver::new()) as Box<dyn Driver>),
    );
    #[cfg(feature = "postgres")]
    drivers.insert(
        "postgresql".to_string(),
        Arc::new(|| Box::new(crate::postgres::PostgresDriver::new()) as Box<dyn Driver>),
    );
    drivers
}

/// Register (or replace) the driver used for connection strings starting with `name://`.
pub fn register_driver<F>(name: &str, factory: F)
where
    F: Fn() -> Box<dyn Driver> + Send + Sync + 'static,
{
    let mut drivers = DRIVERS.write().unwrap_or_else(PoisonError::into_inner);
    drivers.insert(canonical_driver_name(name), Arc::new(factory));
}

/// Look up the factory for a driver name (aliases and case are normalised).
///
/// # Errors
/// Returns `SqlBridgeError::UnsupportedDriver` if no driver is registered under the name.
pub fn driver_factory(name: &str) -> Result<DriverFactory, SqlBridgeError> {
    let drivers = DRIVERS.read().unwrap_or_else(PoisonError::into_inner);
    drivers
        .get(&canonical_driver_name(name))
        .cloned()
        .ok_or_else(|| SqlBridgeError::UnsupportedDriver(name.to_string()))
}

#[must_use]
pub fn registered_drivers() -> Vec<String> {
    let drivers = DRIVERS.read().unwrap_or_else(PoisonError::into_inner);
    let mut names: Vec<String> = drivers.keys().cloned().collect();
    names.sort();
    names
}
