//! Declarative stack configuration
//!
//! The YAML document the CLI consumes: collection identity, cloud
//! environment, network exposure, API metadata, and the two compute
//! endpoints. All defaults match the platform ceilings the original
//! deployment used (2048 MB memory and storage, 15-minute timeout).

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::api::HttpMethod;
use crate::collection::{CloudEnv, CollectionSpec};
use crate::policy::NetworkAccess;
use crate::{
    Result, DEFAULT_EPHEMERAL_STORAGE_MB, DEFAULT_MEMORY_MB, DEFAULT_TIMEOUT_SECS,
};

// =============================================================================
// Stack Configuration
// =============================================================================

/// Top-level stack configuration
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackConfig {
    /// The search collection to provision
    pub collection: CollectionSpec,

    /// Cloud environment coordinates
    pub environment: CloudEnv,

    /// Network exposure for the collection and dashboard
    #[serde(default)]
    pub network: NetworkConfig,

    /// HTTP API metadata
    #[serde(default)]
    pub api: ApiConfig,

    /// The read entry point (query traffic)
    pub search: EndpointConfig,

    /// The write entry point (ingest traffic)
    pub ingest: EndpointConfig,
}

impl StackConfig {
    /// Parse a configuration document from YAML
    pub fn from_yaml(document: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration before compilation
    pub fn validate(&self) -> Result<()> {
        self.collection.validate()?;
        self.environment.validate()?;
        self.search.validate("search")?;
        self.ingest.validate("ingest")?;
        Ok(())
    }
}

/// Network exposure configuration
///
/// Public is the default: the hosted dashboard is only reachable under
/// public exposure. Private deployments flip this and lose the dashboard.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// Exposure mode for the collection and dashboard endpoints
    #[serde(default)]
    pub access: NetworkAccess,
}

/// HTTP API metadata
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// API display name (defaults to `{collection} search service`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// API description, forwarded to the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Endpoint Configuration
// =============================================================================

/// Runtime configuration for one deployable compute unit
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionConfig {
    /// Bundle location of the deployable artifact
    pub artifact: String,

    /// Qualified entry-point name inside the artifact
    pub handler: String,

    /// Memory allocation, in mebibytes
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,

    /// Ephemeral storage allocation, in mebibytes
    #[serde(default = "default_ephemeral_storage_mb")]
    pub ephemeral_storage_mb: u32,

    /// Timeout ceiling, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u32,

    /// Additional environment variables
    ///
    /// The collection name and host are always injected on top of these.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

fn default_memory_mb() -> u32 {
    DEFAULT_MEMORY_MB
}

fn default_ephemeral_storage_mb() -> u32 {
    DEFAULT_EPHEMERAL_STORAGE_MB
}

fn default_timeout_secs() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

/// One compute endpoint: a function plus its route
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Function runtime configuration
    #[serde(flatten)]
    pub function: FunctionConfig,

    /// Route override (defaults to `/{collection}/search` GET and
    /// `/{collection}/ingest` POST for the respective endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteConfig>,
}

impl EndpointConfig {
    /// Validates the endpoint configuration
    pub fn validate(&self, label: &str) -> Result<()> {
        if self.function.artifact.is_empty() {
            return Err(crate::Error::validation(format!(
                "{label} endpoint has no artifact location"
            )));
        }
        if self.function.handler.is_empty() {
            return Err(crate::Error::validation(format!(
                "{label} endpoint has no handler entry point"
            )));
        }
        Ok(())
    }
}

/// Explicit route for an endpoint
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Slash-separated route path
    pub path: String,

    /// HTTP method
    pub method: HttpMethod,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::CollectionKind;

    const MINIMAL: &str = r#"
collection:
  name: employee
  type: SEARCH
  description: Search collection
environment:
  region: us-east-1
  account: "111111111111"
search:
  artifact: artifacts/search-service.zip
  handler: com.example.search.SearchHandler::handleRequest
ingest:
  artifact: artifacts/search-service.zip
  handler: com.example.search.IngestHandler::handleRequest
"#;

    // =========================================================================
    // Story: Minimal Config Fills Platform Defaults
    // =========================================================================

    #[test]
    fn story_minimal_config_parses_with_defaults() {
        let config = StackConfig::from_yaml(MINIMAL).unwrap();

        assert_eq!(config.collection.name, "employee");
        assert_eq!(config.collection.kind, CollectionKind::Search);
        assert_eq!(config.environment.partition, "aws");
        assert_eq!(config.network.access, NetworkAccess::Public);
        assert_eq!(config.search.function.memory_mb, DEFAULT_MEMORY_MB);
        assert_eq!(
            config.search.function.ephemeral_storage_mb,
            DEFAULT_EPHEMERAL_STORAGE_MB
        );
        assert_eq!(config.ingest.function.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.search.route.is_none());
    }

    // =========================================================================
    // Story: Overrides Stick
    // =========================================================================

    #[test]
    fn story_route_and_network_overrides() {
        let yaml = format!(
            "{MINIMAL}network:\n  access: private\napi:\n  name: Employee Search\n"
        );
        let mut config = StackConfig::from_yaml(&yaml).unwrap();
        config.search.route = Some(RouteConfig {
            path: "/people/query".to_string(),
            method: HttpMethod::Get,
        });

        assert_eq!(config.network.access, NetworkAccess::Private);
        assert_eq!(config.api.name.as_deref(), Some("Employee Search"));
        assert_eq!(config.search.route.unwrap().path, "/people/query");
    }

    #[test]
    fn story_variables_flow_through() {
        let yaml = MINIMAL.replace(
            "  handler: com.example.search.SearchHandler::handleRequest",
            "  handler: com.example.search.SearchHandler::handleRequest\n  variables:\n    LOG_LEVEL: debug",
        );
        let config = StackConfig::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.search.function.variables.get("LOG_LEVEL"),
            Some(&"debug".to_string())
        );
    }

    // =========================================================================
    // Story: Validation Catches Bad Documents
    // =========================================================================

    #[test]
    fn story_bad_collection_name_rejected() {
        let yaml = MINIMAL.replace("name: employee", "name: Employee");
        let err = StackConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn story_missing_artifact_rejected() {
        let yaml = MINIMAL.replace("artifact: artifacts/search-service.zip", "artifact: \"\"");
        let err = StackConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("artifact"));
    }

    #[test]
    fn story_malformed_yaml_is_a_serialization_error() {
        let err = StackConfig::from_yaml("collection: [not, a, mapping").unwrap_err();
        assert!(err.to_string().contains("serialization error"));
    }
}
