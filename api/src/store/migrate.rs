//! Schema migrations.
//!
//! Migrations are embedded in the binary, applied in name order, each in its
//! own transaction, and recorded by name in the `migrations` table. A name
//! that is already recorded is skipped, so running the set again is a no-op.

use jiff::Timestamp;
use sqlx::SqlitePool;

use super::{StoreError, millis};

#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

/// Every migration, in the order they must be applied.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "20240809205925_initial",
        sql: include_str!("../../migrations/20240809205925_initial.sql"),
    },
    Migration {
        name: "20240902181500_payments",
        sql: include_str!("../../migrations/20240902181500_payments.sql"),
    },
];

/// Apply all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<(), StoreError> {
    apply(pool, MIGRATIONS).await
}

/// Apply the pending subset of `migrations`, sorted by name.
pub async fn apply(
    pool: &SqlitePool,
    migrations: &[Migration],
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL UNIQUE,
            applied_at  INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    let mut ordered = migrations.to_vec();
    ordered.sort_by_key(|m| m.name);

    for migration in ordered {
        let mut tx = pool.begin().await?;

        // Claim the name first: this takes the write lock, and a concurrent
        // process that got there first makes this a no-op.
        let claimed = sqlx::query(
            r#"
            INSERT INTO migrations (name, applied_at)
            VALUES (?1, ?2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(migration.name)
        .bind(millis(Timestamp::now()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if claimed == 0 {
            tracing::debug!(name = migration.name, "skipping migration");
            tx.rollback().await?;
            continue;
        }

        if let Err(e) = sqlx::raw_sql(migration.sql).execute(&mut *tx).await {
            tracing::error!(name = migration.name, "migration failed");
            tx.rollback().await?;
            return Err(e.into());
        }

        tx.commit().await?;
        tracing::info!(name = migration.name, "applied migration");
    }

    Ok(())
}

/// Names of applied migrations, in name order.
pub async fn applied(pool: &SqlitePool) -> Result<Vec<String>, StoreError> {
    Ok(
        sqlx::query_scalar("SELECT name FROM migrations ORDER BY name")
            .fetch_all(pool)
            .await?,
    )
}
