//! Employee data model and upstream wire envelopes
//!
//! The upstream prefixes every employee field except `id` with `employee_`.
//! The same field names are used on the inbound surface so responses can be
//! passed through unchanged.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Age range accepted when creating an employee
pub const AGE_RANGE: std::ops::RangeInclusive<i32> = 16..=75;

/// Immutable employee record
///
/// Construction goes through [`EmployeeBuilder`], which rejects a negative
/// salary. Deserialization runs the same check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEmployee")]
pub struct Employee {
    id: Uuid,
    #[serde(rename = "employee_name")]
    name: String,
    #[serde(rename = "employee_salary")]
    salary: Option<i64>,
    #[serde(rename = "employee_age")]
    age: Option<i32>,
    #[serde(rename = "employee_title")]
    title: Option<String>,
    #[serde(rename = "employee_email")]
    email: Option<String>,
}

/// Unvalidated wire shape of [`Employee`]
#[derive(Deserialize)]
struct RawEmployee {
    id: Uuid,
    employee_name: String,
    #[serde(default)]
    employee_salary: Option<i64>,
    #[serde(default)]
    employee_age: Option<i32>,
    #[serde(default)]
    employee_title: Option<String>,
    #[serde(default)]
    employee_email: Option<String>,
}

impl TryFrom<RawEmployee> for Employee {
    type Error = Error;

    fn try_from(raw: RawEmployee) -> Result<Self> {
        Employee::builder(raw.id, raw.employee_name)
            .salary(raw.employee_salary)
            .age(raw.employee_age)
            .title(raw.employee_title)
            .email(raw.employee_email)
            .build()
    }
}

impl Employee {
    /// Start building an employee with the required identity fields
    pub fn builder(id: Uuid, name: impl Into<String>) -> EmployeeBuilder {
        EmployeeBuilder {
            id,
            name: name.into(),
            salary: None,
            age: None,
            title: None,
            email: None,
        }
    }

    /// Copy this employee into a builder for a modified value
    #[must_use]
    pub fn to_builder(&self) -> EmployeeBuilder {
        EmployeeBuilder {
            id: self.id,
            name: self.name.clone(),
            salary: self.salary,
            age: self.age,
            title: self.title.clone(),
            email: self.email.clone(),
        }
    }

    /// Unique identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Full name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Salary, never negative
    pub fn salary(&self) -> Option<i64> {
        self.salary
    }

    /// Age in years
    pub fn age(&self) -> Option<i32> {
        self.age
    }

    /// Job title
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Email address (assigned by the upstream)
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}

/// Builder for [`Employee`]
#[derive(Debug, Clone)]
pub struct EmployeeBuilder {
    id: Uuid,
    name: String,
    salary: Option<i64>,
    age: Option<i32>,
    title: Option<String>,
    email: Option<String>,
}

impl EmployeeBuilder {
    /// Set the salary
    #[must_use]
    pub fn salary(mut self, salary: Option<i64>) -> Self {
        self.salary = salary;
        self
    }

    /// Set the age
    #[must_use]
    pub fn age(mut self, age: Option<i32>) -> Self {
        self.age = age;
        self
    }

    /// Set the title
    #[must_use]
    pub fn title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Set the email
    #[must_use]
    pub fn email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    /// Validate and build the employee
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the salary is negative.
    pub fn build(self) -> Result<Employee> {
        if self.salary.is_some_and(|s| s < 0) {
            return Err(Error::Validation("Salary cannot be negative".to_string()));
        }
        Ok(Employee {
            id: self.id,
            name: self.name,
            salary: self.salary,
            age: self.age,
            title: self.title,
            email: self.email,
        })
    }
}

/// Request body for creating an employee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEmployeeInput {
    /// Full name
    pub name: String,
    /// Salary
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub salary: i64,
    /// Age in years
    #[serde(deserialize_with = "number_or_numeric_string")]
    pub age: i32,
    /// Job title
    pub title: String,
}

/// Form clients post numbers as strings (`"salary": "120000"`)
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    Text(String),
}

fn number_or_numeric_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + FromStr,
    T::Err: fmt::Display,
{
    match NumberOrString::<T>::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| serde::de::Error::custom(format!("invalid number {text:?}: {e}"))),
    }
}

impl CreateEmployeeInput {
    /// Fail fast on input the upstream would reject anyway
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("Name must not be blank".to_string()));
        }
        if self.salary < 0 {
            return Err(Error::Validation("Salary cannot be negative".to_string()));
        }
        if !AGE_RANGE.contains(&self.age) {
            return Err(Error::Validation(format!(
                "Age must be between {} and {}",
                AGE_RANGE.start(),
                AGE_RANGE.end()
            )));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Validation("Title must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Request body for the upstream delete call (identified by name)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteEmployeeInput {
    /// Name of the employee to delete
    pub name: String,
}

/// `{ "data": ... }` envelope the upstream wraps every response in
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Payload
    pub data: T,
    /// Upstream status text, informational only
    #[serde(default)]
    pub status: Option<String>,
}
