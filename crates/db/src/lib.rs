pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use fixtures::{NorthwindSeed, SeedResult, VerificationResult, SEED_CUSTOMER_IDS};
pub use repositories::{
    CustomerRepository, InMemoryCustomerRepository, RepositoryError, SqlCustomerRepository,
};
