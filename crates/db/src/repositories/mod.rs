use async_trait::async_trait;
use thiserror::Error;

use northwind_core::domain::customer::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, CustomerProfile, NewCustomer,
};

pub mod customer;
pub mod memory;

pub use customer::SqlCustomerRepository;
pub use memory::InMemoryCustomerRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// CRUD façade over the `Customers` table. Each call is a single statement.
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, RepositoryError>;

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;

    /// Inserts the customer, assigning an identifier when none was supplied.
    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError>;

    /// Replaces every attribute. `None` when `id` does not exist.
    async fn update(
        &self,
        id: &CustomerId,
        profile: CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError>;

    /// Writes only the attributes present in `patch`. `None` when `id` does not exist.
    async fn patch(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, RepositoryError>;

    /// `false` when `id` does not exist.
    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError>;
}
