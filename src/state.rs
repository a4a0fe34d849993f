use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::AuthProvider;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: Arc<dyn AuthProvider>,
}
