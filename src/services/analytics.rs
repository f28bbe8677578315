//! Best-effort query analytics.
//!
//! Search and recall handlers append to the query log after responding;
//! a logging failure must never affect the request.

use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::db::{self, DbPool};

/// Log rows older than this are pruned.
pub const LOG_RETENTION_DAYS: i64 = 30;

#[derive(Clone)]
pub struct AnalyticsService {
    db: DbPool,
}

impl AnalyticsService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Append a query log entry, swallowing failures.
    pub async fn log_query(
        &self,
        agent_id: Option<Uuid>,
        endpoint: &str,
        query_text: Option<&str>,
        latency_ms: i32,
        status_code: u16,
    ) {
        let metadata = json!({ "method": "POST", "status_code": status_code });
        if let Err(e) = db::insert_query_log(
            &self.db,
            agent_id,
            endpoint,
            query_text,
            latency_ms,
            metadata,
        )
        .await
        {
            debug!(error = %e, endpoint, "Query log append failed");
        }
    }

    /// Prune old log rows. Returns the number removed.
    pub async fn prune(&self) -> u64 {
        match db::prune_query_logs(&self.db, LOG_RETENTION_DAYS).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "Pruned query log");
                }
                removed
            }
            Err(e) => {
                debug!(error = %e, "Query log prune failed");
                0
            }
        }
    }
}
