use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] =
        &["Customers", "City", "CompanyName", "PostalCode", "Region"];

    #[tokio::test]
    async fn migrations_create_customers_table_and_indexes() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for name in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ? AND type IN ('table', 'index')",
            )
            .bind(name)
            .fetch_one(&pool)
            .await
            .expect("check schema object")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "schema object `{name}` should exist after migrations");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run should be a no-op");
    }

    #[tokio::test]
    async fn migrations_tolerate_existing_northwind_table() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        sqlx::query(
            "CREATE TABLE \"Customers\" (\"CustomerID\" TEXT NOT NULL PRIMARY KEY, \"CompanyName\" TEXT NOT NULL,
             \"ContactName\" TEXT, \"ContactTitle\" TEXT, \"Address\" TEXT, \"City\" TEXT, \"Region\" TEXT,
             \"PostalCode\" TEXT, \"Country\" TEXT, \"Phone\" TEXT, \"Fax\" TEXT)",
        )
        .execute(&pool)
        .await
        .expect("pre-existing table");

        run_pending(&pool).await.expect("migrations should not clash with existing schema");
    }
}
