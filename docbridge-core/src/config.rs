//! Client configuration.
//!
//! Configuration is read once at client construction. It names the store, the
//! database, and the static `collection -> document type name` mapping used to
//! seed the [`TypeRegistry`](crate::registry::TypeRegistry).
//!
//! ```json
//! {
//!     "connection_string": "mongodb://localhost:27017",
//!     "database_name": "app",
//!     "collections": { "users": "User" },
//!     "retry": { "max_retries": 3, "base_delay_ms": 1000 }
//! }
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    retry::{RetryPolicy, RetrySettings},
};

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ClientConfig {
    pub connection_string: String,
    pub database_name: String,
    /// Collection name to document type name.
    #[serde(default)]
    pub collections: BTreeMap<String, String>,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl ClientConfig {
    pub fn new(connection_string: impl Into<String>, database_name: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.collections.insert(collection.into(), type_name.into());
        self
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(input: &str) -> DocumentStoreResult<Self> {
        let config: ClientConfig = serde_json::from_str(input)
            .map_err(|e| DocumentStoreError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks that the connection string and database name are present.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(DocumentStoreError::Configuration(
                "connection string must not be empty".into(),
            ));
        }
        if self.database_name.trim().is_empty() {
            return Err(DocumentStoreError::Configuration(
                "database name must not be empty".into(),
            ));
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parses_full_configuration() {
        let config = ClientConfig::from_json_str(
            r#"{
                "connection_string": "mongodb://localhost:27017",
                "database_name": "app",
                "collections": { "users": "User" },
                "retry": { "max_retries": 1, "base_delay_ms": 10 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.collections.get("users").map(String::as_str), Some("User"));
        assert_eq!(config.retry_policy().max_retries, 1);
        assert_eq!(config.retry_policy().delay_for(1), Duration::from_millis(20));
    }

    #[test]
    fn collections_and_retry_are_optional() {
        let config = ClientConfig::from_json_str(
            r#"{ "connection_string": "mongodb://db", "database_name": "app" }"#,
        )
        .unwrap();

        assert!(config.collections.is_empty());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn empty_values_are_configuration_errors() {
        assert!(matches!(
            ClientConfig::new("", "app").validate(),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            ClientConfig::new("mongodb://db", "  ").validate(),
            Err(DocumentStoreError::Configuration(_))
        ));
        assert!(matches!(
            ClientConfig::from_json_str(r#"{ "database_name": "app" }"#),
            Err(DocumentStoreError::Configuration(_))
        ));
    }
}
