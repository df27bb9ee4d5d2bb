pub mod config;
pub mod domain;
pub mod errors;

pub use domain::customer::{
    Customer, CustomerFilter, CustomerId, CustomerInput, CustomerPatch, CustomerProfile,
    NewCustomer,
};
pub use errors::{ApplicationError, DomainError, ValidationErrors};
