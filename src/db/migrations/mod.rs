use anyhow::Result;
use log::info;
use sqlx::PgPool;

/// Embedded migrations, applied in order on startup. Each statement is
/// idempotent (IF NOT EXISTS / guarded DO blocks) so re-running is safe.
const MIGRATIONS: &[(&str, &str)] = &[
    ("01_create_types", include_str!("sql/01_create_types.sql")),
    ("02_create_events", include_str!("sql/02_create_events.sql")),
    ("03_create_assignments", include_str!("sql/03_create_assignments.sql")),
    ("04_create_dedup_events", include_str!("sql/04_create_dedup_events.sql")),
    (
        "05_create_outbox_assignments",
        include_str!("sql/05_create_outbox_assignments.sql"),
    ),
    ("06_add_indexes", include_str!("sql/06_add_indexes.sql")),
];

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        sqlx::raw_sql(sql).execute(pool).await?;
        info!("Applied migration: {}", name);
    }

    Ok(())
}
