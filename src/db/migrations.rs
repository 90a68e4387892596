use std::collections::HashSet;
use std::path::Path;

use deadpool_postgres::Pool;

use super::error::DbError;

/// Apply every `*.sql` file in `dir` not yet recorded in `_migrations`, in
/// file name order, each in its own transaction.
pub async fn run(pool: &Pool, dir: &Path) -> Result<(), DbError> {
    let client = pool.get().await?;

    client
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                id SERIAL PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
            &[],
        )
        .await?;

    let rows = client.query("SELECT name FROM _migrations", &[]).await?;
    let applied: HashSet<String> = rows.iter().map(|row| row.get(0)).collect();

    if !dir.exists() {
        tracing::info!("No migrations directory at {}, skipping migrations", dir.display());
        return Ok(());
    }

    let mut pending: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x == "sql"))
        .filter_map(|p| {
            let name = p.file_name()?.to_string_lossy().to_string();
            (!applied.contains(&name)).then_some((name, p))
        })
        .collect();
    pending.sort();

    drop(client);

    for (name, path) in pending {
        let sql = std::fs::read_to_string(&path)?;

        let mut client = pool.get().await?;
        let tx = client.transaction().await?;

        tx.batch_execute(&sql).await.map_err(|e| {
            DbError::MigrationError(format!("Failed to run migration {}: {}", name, e))
        })?;
        tx.execute("INSERT INTO _migrations (name) VALUES ($1)", &[&name])
            .await?;
        tx.commit().await?;

        tracing::info!("Applied migration: {}", name);
    }

    tracing::info!("All migrations up to date");
    Ok(())
}
