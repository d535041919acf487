//! Employee gateway: the composition root
//!
//! Every upstream call is built the same way: the raw HTTP call (logged by
//! the interceptor inside [`UpstreamClient`]) is wrapped in
//! [`RetryExecutor::execute`], and list reads additionally go through
//! [`EmployeeCache`]. Writes invalidate the cache after the retried call
//! succeeds and before they return.
//!
//! Failure handling is chosen per operation: list queries apply
//! [`FailurePolicy::DegradeToEmpty`], identified and mutating operations
//! propagate every error.

use std::cmp::Reverse;

use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{CacheStatsSnapshot, EmployeeCache, EmployeeList};
use crate::config::Config;
use crate::failsafe::RetryExecutor;
use crate::model::{CreateEmployeeInput, DeleteEmployeeInput, Employee};
use crate::transport::UpstreamClient;
use crate::{Error, Result};

/// Number of names returned by [`EmployeeGateway::top_ten_earner_names`]
const TOP_EARNERS: usize = 10;

/// What an operation does with a terminal upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Answer with an empty result
    DegradeToEmpty,
    /// Hand the error to the caller
    Propagate,
}

impl FailurePolicy {
    fn apply<T: Default>(self, operation: &str, result: Result<T>) -> Result<T> {
        match (self, result) {
            (Self::DegradeToEmpty, Err(e)) if e.is_terminal() => {
                warn!(operation, error = %e, "Upstream failed terminally, returning empty result");
                Ok(T::default())
            }
            (_, result) => result,
        }
    }
}

/// Resilient front for the upstream employee API
pub struct EmployeeGateway {
    client: UpstreamClient,
    retry: RetryExecutor,
    cache: EmployeeCache,
}

impl EmployeeGateway {
    /// Build the gateway from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let client = UpstreamClient::new(&config.upstream, &config.observability)?;
        info!(
            upstream = %client.base_url(),
            max_attempts = config.retry.max_attempts,
            retry_enabled = config.retry.enabled,
            cache_enabled = config.cache.enabled,
            "Employee gateway ready"
        );
        Ok(Self::from_parts(
            client,
            RetryExecutor::new(&config.retry),
            EmployeeCache::new(&config.cache),
        ))
    }

    /// Assemble from already-built components
    #[must_use]
    pub fn from_parts(client: UpstreamClient, retry: RetryExecutor, cache: EmployeeCache) -> Self {
        Self {
            client,
            retry,
            cache,
        }
    }

    /// All employees
    pub async fn list_employees(&self) -> Result<Vec<Employee>> {
        let all = self.all_employees(FailurePolicy::DegradeToEmpty).await?;
        Ok(all.to_vec())
    }

    /// Employees whose name contains `fragment`, ignoring case
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<Employee>> {
        let needle = fragment.to_lowercase();
        let all = self.all_employees(FailurePolicy::DegradeToEmpty).await?;
        Ok(all
            .iter()
            .filter(|e| e.name().to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    /// Single employee by id
    ///
    /// A malformed id is rejected before any network call.
    pub async fn get_by_id(&self, id: &str) -> Result<Employee> {
        let id = parse_id(id)?;
        self.fetch_by_id(id).await
    }

    /// Highest salary, `0` when there are no employees
    pub async fn highest_salary(&self) -> Result<i64> {
        let all = self.all_employees(FailurePolicy::DegradeToEmpty).await?;
        Ok(all.iter().filter_map(Employee::salary).max().unwrap_or(0))
    }

    /// Names of the ten best-paid employees, highest salary first
    pub async fn top_ten_earner_names(&self) -> Result<Vec<String>> {
        let all = self.all_employees(FailurePolicy::DegradeToEmpty).await?;
        let mut ranked: Vec<&Employee> = all.iter().collect();
        // None sorts below every Some, so missing salaries end up last
        ranked.sort_by_key(|e| Reverse(e.salary()));
        Ok(ranked
            .into_iter()
            .take(TOP_EARNERS)
            .map(|e| e.name().to_string())
            .collect())
    }

    /// Create an employee
    ///
    /// Input is validated locally first. The cache is invalidated once the
    /// upstream confirms the write.
    pub async fn create(&self, input: &CreateEmployeeInput) -> Result<Employee> {
        input.validate()?;

        let created: Employee = self
            .retry
            .execute("create_employee", || self.client.post("", input))
            .await?;

        self.cache.invalidate();
        info!(id = %created.id(), name = %created.name(), "Employee created");
        Ok(created)
    }

    /// Delete an employee by id, returning the deleted employee's name
    ///
    /// The upstream deletes by name, so the id is resolved first.
    pub async fn delete_by_id(&self, id: &str) -> Result<String> {
        let id = parse_id(id)?;
        let employee = self.fetch_by_id(id).await?;

        let body = DeleteEmployeeInput {
            name: employee.name().to_string(),
        };
        let deleted: bool = self
            .retry
            .execute("delete_employee", || self.client.delete("", &body))
            .await?;

        if !deleted {
            return Err(Error::NotFound(format!(
                "Employee {id} ({}) was not deleted by upstream",
                body.name
            )));
        }

        self.cache.invalidate();
        info!(%id, name = %body.name, "Employee deleted");
        Ok(body.name)
    }

    /// Drop the cached list; the next read reloads it
    pub fn evict_cache(&self) {
        self.cache.invalidate();
    }

    /// Cache statistics
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats()
    }

    async fn all_employees(&self, policy: FailurePolicy) -> Result<EmployeeList> {
        let result = self
            .cache
            .get_or_load(|| {
                self.retry
                    .execute("list_employees", || self.client.get::<Vec<Employee>>(""))
            })
            .await;
        policy.apply("list_employees", result)
    }

    async fn fetch_by_id(&self, id: Uuid) -> Result<Employee> {
        let path = format!("/{id}");
        self.retry
            .execute("get_employee", || self.client.get(&path))
            .await
    }
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim())
        .map_err(|_| Error::Validation(format!("Invalid employee id '{id}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, ObservabilityConfig, RetryConfig, UpstreamConfig};
    use pretty_assertions::assert_eq;

    fn offline_gateway() -> EmployeeGateway {
        // nothing listens here; tests below must fail before any request
        let upstream = UpstreamConfig {
            base_url: "http://127.0.0.1:9/api/v1/employee".to_string(),
            ..UpstreamConfig::default()
        };
        EmployeeGateway::from_parts(
            UpstreamClient::new(&upstream, &ObservabilityConfig::default()).unwrap(),
            RetryExecutor::new(&RetryConfig::default()),
            EmployeeCache::new(&CacheConfig::default()),
        )
    }

    #[test]
    fn test_degrade_only_swallows_terminal_errors() {
        let not_found: Result<Vec<u8>> = Err(Error::TerminalUpstream {
            status: 404,
            target: "GET /".to_string(),
        });
        assert_eq!(FailurePolicy::DegradeToEmpty.apply("list", not_found), Ok(vec![]));

        let exhausted: Result<Vec<u8>> = Err(Error::RetryableUpstream {
            status: 503,
            target: "GET /".to_string(),
            retry_after: None,
        });
        assert!(FailurePolicy::DegradeToEmpty.apply("list", exhausted).is_err());
    }

    #[test]
    fn test_propagate_keeps_error() {
        let not_found: Result<Vec<u8>> = Err(Error::TerminalUpstream {
            status: 404,
            target: "GET /x".to_string(),
        });
        assert_eq!(
            FailurePolicy::Propagate.apply("get", not_found.clone()),
            not_found
        );
    }

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()), Ok(id));
        assert!(matches!(parse_id("42"), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_create_rejected_before_network() {
        let gateway = offline_gateway();
        let input = CreateEmployeeInput {
            name: "Jill".to_string(),
            salary: -1,
            age: 30,
            title: "Engineer".to_string(),
        };
        assert_eq!(
            gateway.create(&input).await,
            Err(Error::Validation("Salary cannot be negative".to_string()))
        );
        assert_eq!(gateway.cache_stats().invalidations, 0);
    }

    #[tokio::test]
    async fn test_malformed_id_rejected_before_network() {
        let gateway = offline_gateway();
        assert!(matches!(
            gateway.get_by_id("not-a-uuid").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            gateway.delete_by_id("not-a-uuid").await,
            Err(Error::Validation(_))
        ));
    }
}
