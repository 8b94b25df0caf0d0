use anyhow::Result;
use tracing::debug;

use crate::applications::{ApplicationManager, ListingMode};
use crate::config::Config;
use crate::identity::{IdentityProvider, MockIdentityProvider, Session};
use crate::reviews::ReviewEngine;
use crate::store::{LocalStore, SqliteStore};

/// Every component, wired to one shared store.
pub struct App {
    pub session: Session,
    pub applications: ApplicationManager,
    pub reviews: ReviewEngine,
}

impl App {
    pub async fn open(config: &Config) -> Result<Self> {
        let store = LocalStore::new(SqliteStore::open(&config.data_path)?);
        let provider = MockIdentityProvider::new(config.auth_latency);
        let app = Self::assemble(store, Box::new(provider), config.listing_mode).await;

        let mut changes = app.session.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                match &*changes.borrow_and_update() {
                    Some(identity) => debug!(user = %identity.id, "session changed"),
                    None => debug!("session cleared"),
                }
            }
        });

        Ok(app)
    }

    pub async fn assemble(
        store: LocalStore,
        provider: Box<dyn IdentityProvider>,
        mode: ListingMode,
    ) -> Self {
        let session = Session::restore(provider, store.clone()).await;
        Self {
            session,
            applications: ApplicationManager::new(store.clone(), mode),
            reviews: ReviewEngine::new(store),
        }
    }
}
