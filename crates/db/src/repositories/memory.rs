use std::collections::BTreeMap;

use tokio::sync::RwLock;

use northwind_core::domain::customer::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, CustomerProfile, NewCustomer,
};

use super::{CustomerRepository, RepositoryError};

/// Ordered map keyed by customer id, so `list` matches the SQL ordering.
#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<BTreeMap<String, Customer>>,
}

impl InMemoryCustomerRepository {
    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let customers =
            customers.into_iter().map(|customer| (customer.id.0.clone(), customer)).collect();
        Self { customers: RwLock::new(customers) }
    }
}

fn country_matches(customer: &Customer, country: &str) -> bool {
    customer.profile.country.as_deref().is_some_and(|value| value.eq_ignore_ascii_case(country))
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers
            .values()
            .filter(|customer| match &filter.country {
                Some(country) => country_matches(customer, country),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let mut customers = self.customers.write().await;
        let id = customer.id.unwrap_or_else(CustomerId::generate);
        if customers.contains_key(&id.0) {
            return Err(RepositoryError::Constraint(format!(
                "UNIQUE constraint failed: Customers.CustomerID ({id})"
            )));
        }

        let created = Customer { id, profile: customer.profile };
        customers.insert(created.id.0.clone(), created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: &CustomerId,
        profile: CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut customers = self.customers.write().await;
        Ok(customers.get_mut(&id.0).map(|existing| {
            existing.profile = profile;
            existing.clone()
        }))
    }

    async fn patch(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, RepositoryError> {
        let mut customers = self.customers.write().await;
        Ok(customers.get_mut(&id.0).map(|existing| {
            patch.apply_to(&mut existing.profile);
            existing.clone()
        }))
    }

    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError> {
        let mut customers = self.customers.write().await;
        Ok(customers.remove(&id.0).is_some())
    }
}

#[cfg(test)]
mod tests {
    use northwind_core::domain::customer::{
        Customer, CustomerFilter, CustomerId, CustomerPatch, CustomerProfile, NewCustomer,
    };

    use super::InMemoryCustomerRepository;
    use crate::repositories::{CustomerRepository, RepositoryError};

    fn customer(id: &str, country: &str) -> Customer {
        Customer {
            id: CustomerId(id.to_string()),
            profile: CustomerProfile {
                company_name: format!("{id} Ltd"),
                country: Some(country.to_string()),
                ..CustomerProfile::default()
            },
        }
    }

    #[tokio::test]
    async fn list_is_ordered_and_filterable() {
        let repo = InMemoryCustomerRepository::with_customers([
            customer("BERGS", "Sweden"),
            customer("ALFKI", "Germany"),
            customer("AROUT", "UK"),
        ]);

        let ids: Vec<String> = repo
            .list(&CustomerFilter::default())
            .await
            .expect("list")
            .into_iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec!["ALFKI", "AROUT", "BERGS"]);

        let uk = repo.list(&CustomerFilter { country: Some("uk".to_string()) }).await.expect("list");
        assert_eq!(uk.len(), 1);
        assert_eq!(uk[0].id.as_str(), "AROUT");
    }

    #[tokio::test]
    async fn create_rejects_duplicate_identifier() {
        let repo = InMemoryCustomerRepository::with_customers([customer("ALFKI", "Germany")]);

        let error = repo
            .create(NewCustomer {
                id: Some(CustomerId("ALFKI".to_string())),
                profile: CustomerProfile::default(),
            })
            .await
            .expect_err("duplicate");

        assert!(matches!(error, RepositoryError::Constraint(_)));
    }

    #[tokio::test]
    async fn patch_update_and_delete_report_missing_rows() {
        let repo = InMemoryCustomerRepository::default();
        let missing = CustomerId("NOPE".to_string());

        assert!(repo.update(&missing, CustomerProfile::default()).await.expect("update").is_none());
        assert!(repo.patch(&missing, CustomerPatch::default()).await.expect("patch").is_none());
        assert!(!repo.delete(&missing).await.expect("delete"));
    }

    #[tokio::test]
    async fn patch_merges_into_existing_profile() {
        let repo = InMemoryCustomerRepository::with_customers([customer("ALFKI", "Germany")]);

        let patched = repo
            .patch(
                &CustomerId("ALFKI".to_string()),
                CustomerPatch { city: Some("Berlin".to_string()), ..CustomerPatch::default() },
            )
            .await
            .expect("patch")
            .expect("exists");

        assert_eq!(patched.profile.city.as_deref(), Some("Berlin"));
        assert_eq!(patched.profile.country.as_deref(), Some("Germany"));
    }
}
