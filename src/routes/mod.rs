pub mod health;
pub mod tasks;

use std::sync::Arc;

use axum::Router;

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::services::queue::{BrokerPool, JobQueue};

pub fn create_router(
    db: Arc<DatabaseManager>,
    broker: Arc<BrokerPool>,
    queue: Arc<JobQueue>,
    config: Config,
) -> Router {
    Router::new()
        .merge(health::router(db.clone(), broker))
        .merge(tasks::router(db, queue, config))
}
