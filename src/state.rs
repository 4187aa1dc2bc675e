use crate::config::ServerConfig;
use crate::error::ServerResult;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection, Database, IndexModel};
use std::sync::{Arc, RwLock};

/// Shared application state
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Driver client (owns the connection pool)
    pub client: Client,

    /// Database handle requests operate on
    pub db: Database,

    /// Name of the collection requests are routed to. Rename and drop swap
    /// it at runtime.
    active: RwLock<String>,
}

impl ServerState {
    /// Create new server state around a lazily-connecting driver client.
    pub async fn connect(config: ServerConfig) -> ServerResult<Self> {
        let client = Client::with_uri_str(&config.mongodb_uri).await?;
        let db = client.database(&config.database);
        let active = RwLock::new(config.collection.clone());

        Ok(Self {
            config: Arc::new(config),
            client,
            db,
            active,
        })
    }

    /// Verify the deployment is reachable and create the startup index on
    /// `name` for faster lookups on the demo data set.
    pub async fn prepare(&self) -> ServerResult<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;

        let index = IndexModel::builder().keys(doc! { "name": 1 }).build();
        self.collection().create_index(index).await?;

        Ok(())
    }

    /// Handle to the currently active collection.
    pub fn collection(&self) -> Collection<Document> {
        let name = self.active.read().unwrap_or_else(|e| e.into_inner());
        self.db.collection(&name)
    }

    /// Name of the currently active collection.
    pub fn collection_name(&self) -> String {
        self.active
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Point subsequent requests at `name` (after a rename or drop).
    pub fn set_collection(&self, name: &str) {
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        *active = name.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn active_collection_follows_set_collection() {
        let state = ServerState::connect(ServerConfig::default())
            .await
            .expect("client construction is offline");

        assert_eq!(state.collection_name(), "items");
        state.set_collection("archive");
        assert_eq!(state.collection_name(), "archive");
        assert_eq!(state.collection().name(), "archive");
    }
}
