use std::sync::Arc;

use campus_registry::{Registry, SqliteDatabase};

use crate::auth::SessionStore;

#[derive(Clone)]
pub struct ServerContext {
    pub registry: Arc<Registry<SqliteDatabase>>,
    pub sessions: Arc<SessionStore>,
}

impl ServerContext {
    pub fn new(registry: Registry<SqliteDatabase>) -> Self {
        Self {
            registry: Arc::new(registry),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
