//! Two-phase collection descriptor
//!
//! The collection's derived identifiers (id, host, ARN) cannot exist until the
//! reconciliation engine hands back a resource reference. Instead of a record
//! with blank fields that get filled in later, the descriptor is split into
//! two types:
//!
//! - [`CollectionSpec`]: the unresolved declaration (name, kind, description)
//! - [`ResolvedCollection`]: produced only by [`CollectionSpec::resolve`],
//!   which consumes the spec
//!
//! Downstream components that need the collection address take a
//! `&ResolvedCollection`, so "bound before resolved" does not type-check.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, DEFAULT_PARTITION, SERVICE_DOMAIN, SERVICE_NAMESPACE};

// =============================================================================
// Collection Kind
// =============================================================================

/// Collection type understood by the search service
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum CollectionKind {
    /// Full-text search collection (default)
    #[default]
    Search,
    /// Time-series collection for log/metric analytics
    #[serde(rename = "TIMESERIES")]
    TimeSeries,
    /// Vector search collection for embedding workloads
    #[serde(rename = "VECTORSEARCH")]
    VectorSearch,
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Search => write!(f, "SEARCH"),
            Self::TimeSeries => write!(f, "TIMESERIES"),
            Self::VectorSearch => write!(f, "VECTORSEARCH"),
        }
    }
}

// =============================================================================
// Cloud Environment
// =============================================================================

/// Cloud environment the stack deploys into
///
/// Carries the coordinates needed to derive identifiers for resources that
/// do not exist yet: ARNs are `arn:{partition}:{service}:{region}:{account}:...`.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CloudEnv {
    /// Cloud partition (e.g. "aws")
    #[serde(default = "default_partition")]
    pub partition: String,

    /// Deployment region (e.g. "us-east-1")
    pub region: String,

    /// Twelve-digit account identifier
    pub account: String,
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

impl CloudEnv {
    /// Create a cloud environment in the default partition
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            partition: default_partition(),
            region: region.into(),
            account: account.into(),
        }
    }

    /// Validates the environment coordinates
    pub fn validate(&self) -> Result<()> {
        if self.partition.is_empty() {
            return Err(Error::validation("partition must not be empty"));
        }
        if self.region.is_empty() {
            return Err(Error::validation("region must not be empty"));
        }
        if self.account.len() != 12 || !self.account.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::validation(format!(
                "account must be a 12-digit identifier, got '{}'",
                self.account
            )));
        }
        Ok(())
    }

    /// ARN of an IAM role in this environment
    pub fn role_arn(&self, role_name: &str) -> String {
        format!(
            "arn:{}:iam::{}:role/{}",
            self.partition, self.account, role_name
        )
    }
}

// =============================================================================
// Unresolved Spec
// =============================================================================

/// Declared collection, before the reconciliation engine assigns a reference
///
/// Identifier fields (`id`, `host`, `arn`) do not exist on this type; they
/// appear only on [`ResolvedCollection`].
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name (lowercase alphanumeric and hyphens, 3-32 chars)
    pub name: String,

    /// Collection type
    #[serde(rename = "type", default)]
    pub kind: CollectionKind,

    /// Human-readable description, forwarded to the engine
    #[serde(default)]
    pub description: String,
}

impl CollectionSpec {
    /// Create a new collection spec
    pub fn new(
        name: impl Into<String>,
        kind: CollectionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
        }
    }

    /// Validates the collection name against the platform's naming rules
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.len() < 3 || name.len() > 32 {
            return Err(Error::validation(format!(
                "collection name must be 3-32 characters, got '{name}'"
            )));
        }
        if !name.as_bytes()[0].is_ascii_lowercase() {
            return Err(Error::validation(format!(
                "collection name must start with a lowercase letter, got '{name}'"
            )));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(Error::validation(format!(
                "collection name '{name}' contains invalid characters \
                 (expected lowercase alphanumeric and hyphens)"
            )));
        }
        Ok(())
    }

    /// Resolve the spec into a collection with derived identifiers
    ///
    /// `collection_ref` is the engine-assigned resource reference. The spec is
    /// consumed: there is no way to resolve the same descriptor twice, and no
    /// way to observe a partially-assigned identifier set. Resolution is pure;
    /// the same inputs always derive the same identifiers.
    pub fn resolve(self, collection_ref: &str, env: &CloudEnv) -> Result<ResolvedCollection> {
        self.validate()?;
        env.validate()?;
        if collection_ref.trim().is_empty() {
            return Err(Error::validation(
                "collection reference must not be blank; resolve only once the \
                 underlying resource reference is known",
            ));
        }

        let id = collection_ref.to_string();
        let host = format!("{id}.{}.{SERVICE_DOMAIN}", env.region);
        let arn = format!(
            "arn:{}:{SERVICE_NAMESPACE}:{}:{}:collection/{id}",
            env.partition, env.region, env.account
        );

        Ok(ResolvedCollection {
            name: self.name,
            kind: self.kind,
            description: self.description,
            id,
            host,
            arn,
        })
    }
}

// =============================================================================
// Resolved Collection
// =============================================================================

/// Collection with engine-assigned identifiers
///
/// All fields are immutable once constructed; the only constructor is
/// [`CollectionSpec::resolve`]. Readers never observe a partial assignment
/// because the three derived fields are built in one expression.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ResolvedCollection {
    /// Collection name
    pub name: String,
    /// Collection type
    #[serde(rename = "type")]
    pub kind: CollectionKind,
    /// Human-readable description
    pub description: String,
    /// Engine-assigned identifier (equal to the resource reference)
    pub id: String,
    /// Data-plane endpoint host: `{id}.{region}.aoss.amazonaws.com`
    pub host: String,
    /// Collection ARN: `arn:{partition}:aoss:{region}:{account}:collection/{id}`
    pub arn: String,
}
