//! Database Migrations
//!
//! Migration utilities using refinery for tokio-postgres. Migration files
//! live in the top-level `migrations/` directory and are embedded at
//! compile time.

use anyhow::{Context, Result};
use deadpool_postgres::Pool;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations
pub async fn run_migrations(pool: &Pool) -> Result<()> {
    tracing::info!("🔄 Running database migrations...");

    let mut conn = pool
        .get()
        .await
        .context("Failed to get connection for migrations")?;
    let client = &mut **conn;

    let report = embedded::migrations::runner()
        .run_async(client)
        .await
        .context("Failed to run database migrations")?;

    for migration in report.applied_migrations() {
        tracing::info!("Applied migration: {}", migration);
    }

    tracing::info!("✅ Database migrations completed successfully");
    Ok(())
}

/// Check if the schema has been applied yet
pub async fn needs_migration(pool: &Pool) -> Result<bool> {
    let client = pool.get().await?;

    let result = client
        .query_one(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'users'",
            &[],
        )
        .await?;

    let count: i64 = result.get(0);
    Ok(count == 0)
}
