//! Database layer for HexMem.
//!
//! Provides the Postgres connection pool, the migration ledger and
//! query modules for all domain entities.

mod agents;
mod analytics;
mod edges;
mod items;
mod keys;
mod policies;
mod sessions;

pub use agents::*;
pub use analytics::*;
pub use edges::*;
pub use items::*;
pub use keys::*;
pub use policies::*;
pub use sessions::*;

use sqlx::postgres::PgPoolOptions;
use sqlx::Row;
use std::time::Duration;
use tracing::info;

use crate::Result;

/// Type alias for the Postgres connection pool.
pub type DbPool = sqlx::PgPool;

/// Embedded migrations, applied in lexicographic filename order.
const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_extensions.sql", include_str!("../../migrations/0001_extensions.sql")),
    ("0002_agents.sql", include_str!("../../migrations/0002_agents.sql")),
    ("0003_sessions.sql", include_str!("../../migrations/0003_sessions.sql")),
    ("0004_memory_items.sql", include_str!("../../migrations/0004_memory_items.sql")),
    ("0005_edges.sql", include_str!("../../migrations/0005_edges.sql")),
    ("0006_decay_policies.sql", include_str!("../../migrations/0006_decay_policies.sql")),
    ("0007_query_log.sql", include_str!("../../migrations/0007_query_log.sql")),
];

/// Initialize the database connection pool.
pub async fn init_pool(url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(30))
        .connect(url)
        .await?;

    info!("Database pool initialized");

    Ok(pool)
}

/// Apply pending migrations.
///
/// Each unapplied file runs inside a single transaction together with
/// its ledger insert, so a partial prior application is safe: on boot
/// only migrations not yet recorded are applied, and a failure rolls
/// back its transaction and aborts startup.
pub async fn migrate(pool: &DbPool) -> Result<()> {
    // Serialize concurrent migrators (multiple processes booting against
    // the same database) on a session-level advisory lock.
    let mut conn = pool.acquire().await?;
    sqlx::query("SELECT pg_advisory_lock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await?;

    let result = apply_migrations(pool, &mut conn).await;

    let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
        .bind(MIGRATION_LOCK_KEY)
        .execute(&mut *conn)
        .await;

    result
}

const MIGRATION_LOCK_KEY: i64 = 0x6865786d656d;

async fn apply_migrations(
    pool: &DbPool,
    conn: &mut sqlx::pool::PoolConnection<sqlx::Postgres>,
) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            name TEXT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(&mut **conn)
    .await?;

    let applied: Vec<String> = sqlx::query("SELECT name FROM _migrations")
        .fetch_all(&mut **conn)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    let mut names: Vec<&(&str, &str)> = MIGRATIONS.iter().collect();
    names.sort_by_key(|(name, _)| *name);

    for (name, sql) in names {
        if applied.iter().any(|a| a == name) {
            continue;
        }

        let mut tx = pool.begin().await?;
        sqlx::raw_sql(sql).execute(&mut *tx).await?;
        sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(migration = %name, "Applied migration");
    }

    Ok(())
}

/// Health check for the database connection.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_sorted_and_unique() {
        let mut names: Vec<&str> = MIGRATIONS.iter().map(|(n, _)| *n).collect();
        let original = names.clone();
        names.sort();
        names.dedup();
        assert_eq!(names, original, "migration filenames must be sorted and unique");
    }

    #[test]
    fn test_migrations_nonempty() {
        for (name, sql) in MIGRATIONS {
            assert!(!sql.trim().is_empty(), "empty migration {}", name);
        }
    }
}
