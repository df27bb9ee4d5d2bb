use sqlx::Row;

use northwind_core::domain::customer::{
    Customer, CustomerFilter, CustomerId, CustomerPatch, CustomerProfile, NewCustomer,
};

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

const SELECT_CUSTOMER: &str = "SELECT CustomerID, CompanyName, ContactName, ContactTitle, Address,
        City, Region, PostalCode, Country, Phone, Fax
 FROM Customers";

const RETURNING_CUSTOMER: &str = "RETURNING CustomerID, CompanyName, ContactName, ContactTitle,
        Address, City, Region, PostalCode, Country, Phone, Fax";

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode<'r, T>(row: &'r sqlx::sqlite::SqliteRow, column: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let id: String = decode(row, "CustomerID")?;

    Ok(Customer {
        id: CustomerId(id),
        profile: CustomerProfile {
            company_name: decode(row, "CompanyName")?,
            contact_name: decode(row, "ContactName")?,
            contact_title: decode(row, "ContactTitle")?,
            address: decode(row, "Address")?,
            city: decode(row, "City")?,
            region: decode(row, "Region")?,
            postal_code: decode(row, "PostalCode")?,
            country: decode(row, "Country")?,
            phone: decode(row, "Phone")?,
            fax: decode(row, "Fax")?,
        },
    })
}

/// Unique and foreign-key violations are reported separately from transport failures.
fn map_write_error(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            RepositoryError::Constraint(db.message().to_string())
        }
        _ => RepositoryError::Database(error),
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn list(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(country) = &filter.country {
            sqlx::query(&format!(
                "{SELECT_CUSTOMER} WHERE Country = ? COLLATE NOCASE ORDER BY CustomerID"
            ))
            .bind(country)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!("{SELECT_CUSTOMER} ORDER BY CustomerID"))
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_customer).collect::<Result<Vec<_>, _>>()
    }

    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_CUSTOMER} WHERE CustomerID = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_customer(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, customer: NewCustomer) -> Result<Customer, RepositoryError> {
        let id = customer.id.unwrap_or_else(CustomerId::generate);
        let p = &customer.profile;

        let row = sqlx::query(&format!(
            "INSERT INTO Customers (CustomerID, CompanyName, ContactName, ContactTitle, Address,
                                    City, Region, PostalCode, Country, Phone, Fax)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             {RETURNING_CUSTOMER}"
        ))
        .bind(&id.0)
        .bind(&p.company_name)
        .bind(&p.contact_name)
        .bind(&p.contact_title)
        .bind(&p.address)
        .bind(&p.city)
        .bind(&p.region)
        .bind(&p.postal_code)
        .bind(&p.country)
        .bind(&p.phone)
        .bind(&p.fax)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;

        row_to_customer(&row)
    }

    async fn update(
        &self,
        id: &CustomerId,
        profile: CustomerProfile,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE Customers SET
                 CompanyName = ?, ContactName = ?, ContactTitle = ?, Address = ?, City = ?,
                 Region = ?, PostalCode = ?, Country = ?, Phone = ?, Fax = ?
             WHERE CustomerID = ?
             {RETURNING_CUSTOMER}"
        ))
        .bind(&profile.company_name)
        .bind(&profile.contact_name)
        .bind(&profile.contact_title)
        .bind(&profile.address)
        .bind(&profile.city)
        .bind(&profile.region)
        .bind(&profile.postal_code)
        .bind(&profile.country)
        .bind(&profile.phone)
        .bind(&profile.fax)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        match row {
            Some(ref r) => Ok(Some(row_to_customer(r)?)),
            None => Ok(None),
        }
    }

    async fn patch(
        &self,
        id: &CustomerId,
        patch: CustomerPatch,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(&format!(
            "UPDATE Customers SET
                 CompanyName = COALESCE(?, CompanyName),
                 ContactName = COALESCE(?, ContactName),
                 ContactTitle = COALESCE(?, ContactTitle),
                 Address = COALESCE(?, Address),
                 City = COALESCE(?, City),
                 Region = COALESCE(?, Region),
                 PostalCode = COALESCE(?, PostalCode),
                 Country = COALESCE(?, Country),
                 Phone = COALESCE(?, Phone),
                 Fax = COALESCE(?, Fax)
             WHERE CustomerID = ?
             {RETURNING_CUSTOMER}"
        ))
        .bind(&patch.company_name)
        .bind(&patch.contact_name)
        .bind(&patch.contact_title)
        .bind(&patch.address)
        .bind(&patch.city)
        .bind(&patch.region)
        .bind(&patch.postal_code)
        .bind(&patch.country)
        .bind(&patch.phone)
        .bind(&patch.fax)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;

        match row {
            Some(ref r) => Ok(Some(row_to_customer(r)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM Customers WHERE CustomerID = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }
}
