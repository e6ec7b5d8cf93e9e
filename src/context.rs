use crate::auth::AuthManager;
use crate::config::Config;
use crate::db::DbPool;
use crate::pncp::PncpClient;
use std::sync::Arc;

/// Application context containing shared dependencies
/// This reduces parameter passing and makes it easier to add new dependencies
#[derive(Clone)]
pub struct AppContext {
    pub db_pool: Arc<DbPool>,
    pub auth_manager: Arc<AuthManager>,
    pub pncp: Arc<PncpClient>,
    pub config: Arc<Config>,
}

impl AppContext {
    /// Creates a new application context
    pub fn new(
        db_pool: Arc<DbPool>,
        auth_manager: Arc<AuthManager>,
        pncp: Arc<PncpClient>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db_pool,
            auth_manager,
            pncp,
            config,
        }
    }
}
