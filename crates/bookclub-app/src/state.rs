use std::{sync::Arc, time::Duration};

use bookclub_dal::Pool;
use bookclub_types::access::AdminPolicy;

#[derive(Clone)]
pub struct AppState {
    state: Arc<AppStateInner>,
}

impl AppState {
    pub fn new(app_config: AppConfig, pool: Pool) -> Self {
        let admins = AdminPolicy::new(app_config.admin_emails.iter());
        AppState {
            state: Arc::new(AppStateInner {
                app_config,
                admins,
                pool,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.state.app_config
    }

    pub fn pool(&self) -> &Pool {
        &self.state.pool
    }

    pub(crate) fn admins(&self) -> &AdminPolicy {
        &self.state.admins
    }
}

struct AppStateInner {
    pool: Pool,
    app_config: AppConfig,
    admins: AdminPolicy,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub admin_emails: Vec<String>,
    pub session_expiry: Duration,
    pub secure_cookie: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_emails: vec!["admin@example.com".to_string()],
            session_expiry: Duration::from_secs(24 * 3600),
            secure_cookie: false,
        }
    }
}
