use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Identifiers inserted by [`NorthwindSeed::SQL`], in key order.
pub const SEED_CUSTOMER_IDS: &[&str] = &["ALFKI", "ANATR", "ANTON", "AROUT", "BERGS"];

/// Sample rows from the classic Northwind `Customers` table for local development.
///
/// Loading is idempotent: rows that already exist are left untouched.
pub struct NorthwindSeed;

impl NorthwindSeed {
    pub const SQL: &str = include_str!("../../../config/fixtures/northwind_customers.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let before = Self::count_present(pool).await?;

        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let after = Self::count_present(pool).await?;
        Ok(SeedResult {
            inserted: after.saturating_sub(before),
            customer_ids: SEED_CUSTOMER_IDS.to_vec(),
        })
    }

    /// Checks that every seed customer is present.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_CUSTOMER_IDS.len());
        for id in SEED_CUSTOMER_IDS {
            let exists: i64 =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM Customers WHERE CustomerID = ?1)")
                    .bind(id)
                    .fetch_one(pool)
                    .await?;
            checks.push((*id, exists == 1));
        }

        let all_present = checks.iter().all(|(_, exists)| *exists);
        Ok(VerificationResult { all_present, checks })
    }

    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let quoted = SEED_CUSTOMER_IDS
            .iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");
        sqlx::query(&format!("DELETE FROM Customers WHERE CustomerID IN ({quoted})"))
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn count_present(pool: &DbPool) -> Result<usize, RepositoryError> {
        Ok(Self::verify(pool).await?.checks.iter().filter(|(_, exists)| *exists).count())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub inserted: usize,
    pub customer_ids: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
