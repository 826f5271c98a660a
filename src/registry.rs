//! Named database registry.
//!
//! Applications usually open their databases once at startup and address
//! them by name afterward. The registry owns those handles and tracks a
//! "current" database that unbound statement builders run against. The
//! free functions operate on a process-wide registry; `Registry` itself
//! can be instantiated separately for tests or embedded use.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use tracing::warn;

use crate::database::Database;
use crate::error::DbError;

#[derive(Default)]
pub struct Registry {
    databases: RwLock<HashMap<String, Arc<Database>>>,
    current: RwLock<Option<Arc<Database>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Registry::default()
    }

    /// Adds a database under its name and makes it current.
    ///
    /// # Panics
    /// Panics when the name is already registered; reconfiguring a live
    /// database under the same name is always a bug.
    pub fn register(&self, database: Database) -> Arc<Database> {
        let database = Arc::new(database);
        let name = database.name().to_string();
        let mut map = self
            .databases
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(&name) {
            drop(map);
            panic!("database '{name}' is already registered");
        }
        map.insert(name, Arc::clone(&database));
        drop(map);
        self.set_current(Arc::clone(&database));
        database
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// The current database, if one has been registered.
    #[must_use]
    pub fn try_current(&self) -> Option<Arc<Database>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current database.
    ///
    /// # Panics
    /// Panics when no database has been registered yet.
    #[must_use]
    pub fn current(&self) -> Arc<Database> {
        self.try_current()
            .expect("database registry is not initialized")
    }

    pub fn set_current(&self, database: Arc<Database>) {
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(database);
    }

    /// Switches the current database by name. Unknown names leave the
    /// current database unchanged and return `false`.
    pub fn use_database(&self, name: &str) -> bool {
        match self.get(name) {
            Some(database) => {
                self.set_current(database);
                true
            }
            None => {
                warn!(database = %name, "database is not registered");
                false
            }
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.databases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// The process-wide registry behind the free functions.
#[must_use]
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// Opens a database from a configuration map and registers it globally.
///
/// # Errors
/// Returns `DbError::Config` for invalid configuration and
/// `DbError::Connection` when the pool cannot be built.
///
/// # Panics
/// Panics when the name is already registered.
pub async fn open(
    name: impl Into<String>,
    config: &HashMap<String, String>,
) -> Result<Arc<Database>, DbError> {
    let database = Database::open(name, config).await?;
    Ok(GLOBAL.register(database))
}

/// Registers an already-open database globally and makes it current.
///
/// # Panics
/// Panics when the name is already registered.
pub fn register(database: Database) -> Arc<Database> {
    GLOBAL.register(database)
}

#[must_use]
pub fn get(name: &str) -> Option<Arc<Database>> {
    GLOBAL.get(name)
}

/// The globally current database.
///
/// # Panics
/// Panics when no database has been registered yet.
#[must_use]
pub fn current() -> Arc<Database> {
    GLOBAL.current()
}

#[must_use]
pub fn try_current() -> Option<Arc<Database>> {
    GLOBAL.try_current()
}

/// Switches the globally current database by name.
pub fn use_database(name: &str) -> bool {
    GLOBAL.use_database(name)
}

#[must_use]
pub fn database_count() -> usize {
    GLOBAL.count()
}
