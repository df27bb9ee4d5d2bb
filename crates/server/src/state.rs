use std::sync::Arc;

use northwind_core::config::{AppConfig, XmlFlavor};
use northwind_db::{CustomerRepository, DbPool};

use crate::docs::{DocsError, PublishedDocs};

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub customers: Arc<dyn CustomerRepository>,
    pub docs: Arc<PublishedDocs>,
    pub db_pool: Option<DbPool>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        customers: Arc<dyn CustomerRepository>,
    ) -> Result<Self, DocsError> {
        let docs = PublishedDocs::build(&config)?;
        Ok(Self { config: Arc::new(config), customers, docs: Arc::new(docs), db_pool: None })
    }

    /// Pool probed by `/health`. Without one the database check reports `ready`.
    pub fn with_db_pool(mut self, db_pool: DbPool) -> Self {
        self.db_pool = Some(db_pool);
        self
    }

    pub fn preferred_xml(&self) -> XmlFlavor {
        self.config.formatters.preferred_xml
    }
}
