use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::{DomainError, ValidationErrors};

pub const CUSTOMER_ID_MAX_LEN: usize = 5;

/// Wire names in declaration order, as stored in the Northwind `Customers` table.
pub const CUSTOMER_FIELDS: [&str; 11] = [
    "CustomerID",
    "CompanyName",
    "ContactName",
    "ContactTitle",
    "Address",
    "City",
    "Region",
    "PostalCode",
    "Country",
    "Phone",
    "Fax",
];

const FIELD_LIMITS: [(&str, usize); 10] = [
    ("CompanyName", 40),
    ("ContactName", 30),
    ("ContactTitle", 30),
    ("Address", 60),
    ("City", 15),
    ("Region", 15),
    ("PostalCode", 10),
    ("Country", 15),
    ("Phone", 24),
    ("Fax", 24),
];

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn parse(raw: &str) -> Result<Self, String> {
        if raw.is_empty() {
            return Err("must not be empty".to_string());
        }
        if raw.chars().count() > CUSTOMER_ID_MAX_LEN {
            return Err(format!("must be at most {CUSTOMER_ID_MAX_LEN} characters"));
        }
        if !raw.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err("must contain only letters and digits".to_string());
        }
        Ok(Self(raw.to_string()))
    }

    /// Fresh identifier for customers created without one.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
        Self(simple[..CUSTOMER_ID_MAX_LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scalar attributes of a customer, everything but the key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CustomerProfile {
    #[serde(rename = "CompanyName")]
    pub company_name: String,
    #[serde(rename = "ContactName")]
    pub contact_name: Option<String>,
    #[serde(rename = "ContactTitle")]
    pub contact_title: Option<String>,
    #[serde(rename = "Address")]
    pub address: Option<String>,
    #[serde(rename = "City")]
    pub city: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "PostalCode")]
    pub postal_code: Option<String>,
    #[serde(rename = "Country")]
    pub country: Option<String>,
    #[serde(rename = "Phone")]
    pub phone: Option<String>,
    #[serde(rename = "Fax")]
    pub fax: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    #[serde(rename = "CustomerID")]
    #[schema(value_type = String, example = "ALFKI")]
    pub id: CustomerId,
    #[serde(flatten)]
    pub profile: CustomerProfile,
}

impl Customer {
    /// Field values keyed by wire name, in declaration order.
    pub fn wire_fields(&self) -> [(&'static str, Option<&str>); 11] {
        let p = &self.profile;
        [
            ("CustomerID", Some(self.id.as_str())),
            ("CompanyName", Some(p.company_name.as_str())),
            ("ContactName", p.contact_name.as_deref()),
            ("ContactTitle", p.contact_title.as_deref()),
            ("Address", p.address.as_deref()),
            ("City", p.city.as_deref()),
            ("Region", p.region.as_deref()),
            ("PostalCode", p.postal_code.as_deref()),
            ("Country", p.country.as_deref()),
            ("Phone", p.phone.as_deref()),
            ("Fax", p.fax.as_deref()),
        ]
    }
}

/// A validated create request; the repository assigns `id` when absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCustomer {
    pub id: Option<CustomerId>,
    pub profile: CustomerProfile,
}

/// Partial update: only `Some` fields are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerPatch {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_title: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, profile: &mut CustomerProfile) {
        if let Some(company_name) = &self.company_name {
            profile.company_name = company_name.clone();
        }
        let pairs = [
            (&self.contact_name, &mut profile.contact_name),
            (&self.contact_title, &mut profile.contact_title),
            (&self.address, &mut profile.address),
            (&self.city, &mut profile.city),
            (&self.region, &mut profile.region),
            (&self.postal_code, &mut profile.postal_code),
            (&self.country, &mut profile.country),
            (&self.phone, &mut profile.phone),
            (&self.fax, &mut profile.fax),
        ];
        for (patch, target) in pairs {
            if let Some(value) = patch {
                *target = Some(value.clone());
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    pub country: Option<String>,
}

/// Request body as received on the wire, before validation.
///
/// Every field is optional so that missing values surface as field-level
/// validation errors instead of a parse failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, ToSchema)]
pub struct CustomerInput {
    #[serde(rename = "CustomerID", alias = "customerID", alias = "customerId")]
    pub customer_id: Option<String>,
    #[serde(rename = "CompanyName", alias = "companyName")]
    pub company_name: Option<String>,
    #[serde(rename = "ContactName", alias = "contactName")]
    pub contact_name: Option<String>,
    #[serde(rename = "ContactTitle", alias = "contactTitle")]
    pub contact_title: Option<String>,
    #[serde(rename = "Address", alias = "address")]
    pub address: Option<String>,
    #[serde(rename = "City", alias = "city")]
    pub city: Option<String>,
    #[serde(rename = "Region", alias = "region")]
    pub region: Option<String>,
    #[serde(rename = "PostalCode", alias = "postalCode")]
    pub postal_code: Option<String>,
    #[serde(rename = "Country", alias = "country")]
    pub country: Option<String>,
    #[serde(rename = "Phone", alias = "phone")]
    pub phone: Option<String>,
    #[serde(rename = "Fax", alias = "fax")]
    pub fax: Option<String>,
}

impl CustomerInput {
    /// Sets a field by wire name. Returns `false` for names that are not customer fields.
    pub fn set_wire_field(&mut self, name: &str, value: Option<String>) -> bool {
        let slot = match name {
            "CustomerID" => &mut self.customer_id,
            "CompanyName" => &mut self.company_name,
            "ContactName" => &mut self.contact_name,
            "ContactTitle" => &mut self.contact_title,
            "Address" => &mut self.address,
            "City" => &mut self.city,
            "Region" => &mut self.region,
            "PostalCode" => &mut self.postal_code,
            "Country" => &mut self.country,
            "Phone" => &mut self.phone,
            "Fax" => &mut self.fax,
            _ => return false,
        };
        *slot = value;
        true
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "CustomerID" => self.customer_id.as_deref(),
            "CompanyName" => self.company_name.as_deref(),
            "ContactName" => self.contact_name.as_deref(),
            "ContactTitle" => self.contact_title.as_deref(),
            "Address" => self.address.as_deref(),
            "City" => self.city.as_deref(),
            "Region" => self.region.as_deref(),
            "PostalCode" => self.postal_code.as_deref(),
            "Country" => self.country.as_deref(),
            "Phone" => self.phone.as_deref(),
            "Fax" => self.fax.as_deref(),
            _ => None,
        }
    }

    pub fn into_new_customer(self) -> Result<NewCustomer, DomainError> {
        let mut errors = ValidationErrors::default();
        let id = match self.customer_id.as_deref() {
            Some(raw) => match CustomerId::parse(raw) {
                Ok(id) => Some(id),
                Err(message) => {
                    errors.add("CustomerID", message);
                    None
                }
            },
            None => None,
        };
        self.check_fields(&mut errors, true);
        errors.into_result()?;

        Ok(NewCustomer { id, profile: self.into_profile() })
    }

    /// Full replacement of the customer at `path_id`. A body id, when present, must match.
    pub fn into_replacement(self, path_id: &CustomerId) -> Result<CustomerProfile, DomainError> {
        self.check_identifier(path_id)?;
        let mut errors = ValidationErrors::default();
        self.check_fields(&mut errors, true);
        errors.into_result()?;

        Ok(self.into_profile())
    }

    pub fn into_patch(self, path_id: &CustomerId) -> Result<CustomerPatch, DomainError> {
        self.check_identifier(path_id)?;
        let mut errors = ValidationErrors::default();
        self.check_fields(&mut errors, false);
        errors.into_result()?;

        Ok(CustomerPatch {
            company_name: self.company_name,
            contact_name: self.contact_name,
            contact_title: self.contact_title,
            address: self.address,
            city: self.city,
            region: self.region,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
            fax: self.fax,
        })
    }

    fn check_identifier(&self, path_id: &CustomerId) -> Result<(), DomainError> {
        match self.customer_id.as_deref() {
            Some(body_id) if body_id != path_id.as_str() => Err(DomainError::IdentifierMismatch {
                path: path_id.to_string(),
                body: body_id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn check_fields(&self, errors: &mut ValidationErrors, company_required: bool) {
        match self.company_name.as_deref() {
            Some(name) if name.trim().is_empty() => errors.add("CompanyName", "must not be blank"),
            None if company_required => errors.add("CompanyName", "is required"),
            _ => {}
        }

        for (name, max) in FIELD_LIMITS {
            if let Some(value) = self.field(name) {
                if value.chars().count() > max {
                    errors.add(name, format!("must be at most {max} characters"));
                }
            }
        }
    }

    fn into_profile(self) -> CustomerProfile {
        CustomerProfile {
            company_name: self.company_name.unwrap_or_default(),
            contact_name: self.contact_name,
            contact_title: self.contact_title,
            address: self.address,
            city: self.city,
            region: self.region,
            postal_code: self.postal_code,
            country: self.country,
            phone: self.phone,
            fax: self.fax,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::customer::{CustomerId, CustomerInput, CustomerProfile, CUSTOMER_FIELDS};
    use crate::errors::DomainError;

    fn alfreds() -> CustomerInput {
        CustomerInput {
            customer_id: Some("ALFKI".to_string()),
            company_name: Some("Alfreds Futterkiste".to_string()),
            city: Some("Berlin".to_string()),
            ..CustomerInput::default()
        }
    }

    #[test]
    fn customer_id_rejects_long_and_non_alphanumeric_values() {
        assert!(CustomerId::parse("ALFKI").is_ok());
        assert!(CustomerId::parse("").is_err());
        assert!(CustomerId::parse("ALFKIX").is_err());
        assert!(CustomerId::parse("AL KI").is_err());
    }

    #[test]
    fn generated_ids_are_valid_customer_ids() {
        for _ in 0..32 {
            let id = CustomerId::generate();
            assert!(CustomerId::parse(id.as_str()).is_ok(), "generated `{id}` should parse");
        }
    }

    #[test]
    fn new_customer_keeps_supplied_id_and_fields() {
        let customer = alfreds().into_new_customer().expect("valid input");

        assert_eq!(customer.id, Some(CustomerId("ALFKI".to_string())));
        assert_eq!(customer.profile.company_name, "Alfreds Futterkiste");
        assert_eq!(customer.profile.city.as_deref(), Some("Berlin"));
    }

    #[test]
    fn validation_enumerates_every_offending_field() {
        let input = CustomerInput {
            customer_id: Some("TOO-LONG".to_string()),
            city: Some("x".repeat(16)),
            ..CustomerInput::default()
        };

        let error = input.into_new_customer().expect_err("input should be rejected");
        let DomainError::Validation(errors) = &error else {
            panic!("expected validation error, got {error:?}");
        };
        let fields: Vec<&str> = errors.fields().collect();
        assert_eq!(fields, vec!["City", "CompanyName", "CustomerID"]);
    }

    #[test]
    fn replacement_rejects_mismatched_body_id() {
        let error = alfreds()
            .into_replacement(&CustomerId("ANATR".to_string()))
            .expect_err("mismatched ids should fail");

        assert!(matches!(error, DomainError::IdentifierMismatch { .. }));
    }

    #[test]
    fn patch_allows_missing_company_name_but_not_blank() {
        let id = CustomerId("ALFKI".to_string());
        let patch = CustomerInput { city: Some("Hamburg".to_string()), ..CustomerInput::default() }
            .into_patch(&id)
            .expect("partial input is valid");
        assert_eq!(patch.city.as_deref(), Some("Hamburg"));

        let blank = CustomerInput { company_name: Some("  ".to_string()), ..CustomerInput::default() }
            .into_patch(&id);
        assert!(matches!(blank, Err(DomainError::Validation(_))));
    }

    #[test]
    fn patch_apply_only_touches_present_fields() {
        let mut profile = CustomerProfile {
            company_name: "Alfreds Futterkiste".to_string(),
            city: Some("Berlin".to_string()),
            phone: Some("030-0074321".to_string()),
            ..CustomerProfile::default()
        };
        let patch = CustomerInput { city: Some("Hamburg".to_string()), ..CustomerInput::default() }
            .into_patch(&CustomerId("ALFKI".to_string()))
            .expect("valid patch");

        patch.apply_to(&mut profile);

        assert_eq!(profile.city.as_deref(), Some("Hamburg"));
        assert_eq!(profile.phone.as_deref(), Some("030-0074321"));
        assert_eq!(profile.company_name, "Alfreds Futterkiste");
    }

    #[test]
    fn json_accepts_pascal_and_camel_case_names() {
        let pascal: CustomerInput =
            serde_json::from_str(r#"{"CustomerID":"ALFKI","CompanyName":"Alfreds Futterkiste"}"#)
                .expect("pascal case");
        let camel: CustomerInput =
            serde_json::from_str(r#"{"customerId":"ALFKI","companyName":"Alfreds Futterkiste"}"#)
                .expect("camel case");

        assert_eq!(pascal, camel);
    }

    #[test]
    fn set_wire_field_covers_every_declared_field() {
        let mut input = CustomerInput::default();
        for name in CUSTOMER_FIELDS {
            assert!(input.set_wire_field(name, Some("v".to_string())), "{name} should be settable");
        }
        assert!(!input.set_wire_field("Orders", None));
    }
}
