mod catalog;
mod db;
mod directory;
mod roster;
mod util;

pub mod fixtures;

use std::sync::Arc;

pub use catalog::*;
pub use db::*;
pub use directory::*;
pub use roster::*;
pub use util::random_string;

/// The campus registry, facilitating accounts, the class catalog, and
/// enrollment. This is the whole core, the presentation layer on top only
/// translates requests into these services.
pub struct Registry<Db> {
    database: Arc<Db>,

    pub directory: Directory<Db>,
    pub catalog: Catalog<Db>,
    pub roster: Roster<Db>,
}

impl<Db> Registry<Db>
where
    Db: Database,
{
    pub fn new(database: Db) -> Self {
        let database = Arc::new(database);

        Self {
            directory: Directory::new(&database),
            catalog: Catalog::new(&database),
            roster: Roster::new(&database),
            database,
        }
    }

    pub fn database(&self) -> &Arc<Db> {
        &self.database
    }
}
