use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::api::ApiError;
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self {
            store,
            started_at: Utc::now(),
        }
    }

    /// Run a query against the store on the blocking pool.
    pub async fn read<T, F>(&self, query: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Store) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || query(&store.blocking_lock())).await?
    }
}
