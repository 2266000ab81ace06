//! Authorization policy documents for the search collection
//!
//! This module defines the three policy categories the reconciliation engine
//! evaluates before and around collection creation:
//!
//! - **Encryption policy**: grants the service-owned encryption key, scoped to
//!   the collection; must settle before the collection exists
//! - **Network policy**: exposes the collection and dashboard endpoints; must
//!   settle before the collection exists
//! - **Data-access policy**: grants one principal scoped index/collection
//!   permissions derived from its role class
//!
//! The documents are structured value objects serialized through serde only.
//! Field names and nesting match the engine's grammar exactly (`Rules`,
//! `ResourceType`, `Resource`, `Permission`, `Principal`, `AWSOwnedKey`,
//! `AllowFromPublic`); the engine evaluates these documents outside this
//! system, so the encoding must be bit-exact.
//!
//! For policy generation, use [`PolicyCompiler`].

use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::collection::CollectionSpec;
use crate::compute::{Action, ActionClass, RoleIdentity};
use crate::{Error, Result};

// =============================================================================
// Wire Grammar
// =============================================================================

/// Policy category, as named by the engine
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum PolicyKind {
    /// Encryption-at-rest policy (resource-scoped, no principal)
    Encryption,
    /// Network exposure policy (resource-scoped, no principal)
    Network,
    /// Data-access policy (identity-scoped, exactly one principal)
    Data,
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encryption => write!(f, "encryption"),
            Self::Network => write!(f, "network"),
            Self::Data => write!(f, "data"),
        }
    }
}

/// Resource type a policy rule applies to
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyResourceType {
    /// The collection itself
    Collection,
    /// The hosted dashboard endpoint
    Dashboard,
    /// Indexes within a collection
    Index,
}

/// One rule object inside a policy document
///
/// `Permission` is present only in data-access rules; encryption and network
/// rules are resource-scoped and carry none.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicyRule {
    /// Resource type this rule applies to
    #[serde(rename = "ResourceType")]
    pub resource_type: PolicyResourceType,

    /// Resource patterns, in the engine's `{type}/{name}` notation
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,

    /// Granted permissions (data-access rules only)
    #[serde(rename = "Permission", default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<Vec<String>>,
}

/// Encryption policy document: a single rule object plus the key-ownership flag
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct EncryptionPolicyDoc {
    /// Rules scoping the policy to the collection
    #[serde(rename = "Rules")]
    pub rules: Vec<PolicyRule>,

    /// Use the service-owned encryption key
    #[serde(rename = "AWSOwnedKey")]
    pub aws_owned_key: bool,
}

/// One statement of a network policy document
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct NetworkStatement {
    /// Rules scoping the statement to collection and dashboard endpoints
    #[serde(rename = "Rules")]
    pub rules: Vec<PolicyRule>,

    /// Whether the scoped endpoints are reachable from the public network
    #[serde(rename = "AllowFromPublic")]
    pub allow_from_public: bool,
}

/// Network policy document: an ordered sequence of statements
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct NetworkPolicyDoc(pub Vec<NetworkStatement>);

/// One statement of a data-access policy document
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct DataStatement {
    /// Human-readable grant description
    #[serde(rename = "Description", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Rules listing every resource pattern the principal touches
    ///
    /// Omitting a pattern silently denies access rather than erroring, so the
    /// compiler always emits both the index and collection rules.
    #[serde(rename = "Rules")]
    pub rules: Vec<PolicyRule>,

    /// The principal(s) granted access
    #[serde(rename = "Principal")]
    pub principal: Vec<String>,
}

/// Data-access policy document: an ordered sequence of statements
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct DataAccessPolicyDoc(pub Vec<DataStatement>);

// =============================================================================
// Named Policy Envelopes
// =============================================================================

/// Security policy document body (encryption or network)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum SecurityDocument {
    /// Encryption policy body (a single object)
    Encryption(EncryptionPolicyDoc),
    /// Network policy body (an array of statements)
    Network(NetworkPolicyDoc),
}

/// Named security policy (encryption or network) handed to the engine
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SecurityPolicy {
    /// Policy name, unique per kind
    pub name: String,
    /// Policy category
    #[serde(rename = "type")]
    pub kind: PolicyKind,
    /// The policy document body
    pub policy: SecurityDocument,
}

/// Named data-access policy handed to the engine
///
/// Each document must be invoked once per distinct principal: the engine
/// treats a re-used name as a document replacement, not an addition, so a
/// shared name across principals would silently drop the earlier grant.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Policy name, unique across all data-access documents
    pub name: String,
    /// Policy category (always `data`)
    #[serde(rename = "type")]
    pub kind: PolicyKind,
    /// The policy document body
    pub policy: DataAccessPolicyDoc,
}

impl SecurityPolicy {
    /// Canonical JSON encoding of the document body
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.policy)?)
    }
}

impl AccessPolicy {
    /// Canonical JSON encoding of the document body
    pub fn canonical_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.policy)?)
    }
}

// =============================================================================
// Permission Derivation
// =============================================================================

/// Index-rule permissions for read-class roles
const INDEX_READ_PERMISSIONS: &[&str] = &["aoss:ReadDocument", "aoss:DescribeIndex"];

/// Index-rule permissions for write-class roles
const INDEX_WRITE_PERMISSIONS: &[&str] =
    &["aoss:WriteDocument", "aoss:CreateIndex", "aoss:UpdateIndex"];

/// Collection-rule permissions for read-class roles
const COLLECTION_READ_PERMISSIONS: &[&str] = &["aoss:DescribeCollectionItems"];

/// Collection-rule permissions for write-class roles
const COLLECTION_WRITE_PERMISSIONS: &[&str] =
    &["aoss:CreateCollectionItems", "aoss:UpdateCollectionItems"];

fn permissions_for(class: ActionClass, read: &[&str], write: &[&str]) -> Vec<String> {
    let names = match class {
        ActionClass::Read => read,
        ActionClass::Write => write,
    };
    names.iter().map(|p| p.to_string()).collect()
}

// =============================================================================
// Network Access Mode
// =============================================================================

/// Network exposure mode for the collection and dashboard endpoints
///
/// The hosted dashboard is only reachable under public exposure, so `Public`
/// is the default; deployments that front the collection privately set
/// `Private` and lose dashboard visibility.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAccess {
    /// Reachable from the public network (default; required for dashboards)
    #[default]
    Public,
    /// Reachable only from configured private endpoints
    Private,
}

impl NetworkAccess {
    /// The `AllowFromPublic` flag value for this mode
    pub fn allow_from_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

// =============================================================================
// Policy Compiler
// =============================================================================

/// Compiler for the collection's authorization policy documents
///
/// Encryption and network policies are resource-scoped and carry no
/// principal. Data-access policies name exactly one principal each; the
/// caller provides a distinct document name per principal.
pub struct PolicyCompiler<'a> {
    collection: &'a CollectionSpec,
}

impl<'a> PolicyCompiler<'a> {
    /// Create a policy compiler for the given collection
    ///
    /// Policies scope by collection *name*, which is known before the
    /// resource exists, so the compiler takes the unresolved descriptor.
    pub fn new(collection: &'a CollectionSpec) -> Self {
        Self { collection }
    }

    /// Resource pattern for the collection: `collection/{name}`
    fn collection_resource(&self) -> String {
        format!("collection/{}", self.collection.name)
    }

    /// Resource pattern for all indexes in the collection: `index/{name}/*`
    fn index_resource(&self) -> String {
        format!("index/{}/*", self.collection.name)
    }

    /// Compile the encryption policy
    ///
    /// Fixed shape: one collection-scoped rule plus the service-owned key
    /// flag. Named `encryption-{collection}`.
    pub fn encryption_policy(&self) -> SecurityPolicy {
        SecurityPolicy {
            name: format!("encryption-{}", self.collection.name),
            kind: PolicyKind::Encryption,
            policy: SecurityDocument::Encryption(EncryptionPolicyDoc {
                rules: vec![PolicyRule {
                    resource_type: PolicyResourceType::Collection,
                    resource: vec![self.collection_resource()],
                    permission: None,
                }],
                aws_owned_key: true,
            }),
        }
    }

    /// Compile the network policy
    ///
    /// Scopes both the collection endpoint and its dashboard. Dashboard rules
    /// use the `collection/{name}` pattern; dashboards are addressed per
    /// collection in the engine's grammar. Named `network-{collection}`.
    pub fn network_policy(&self, access: NetworkAccess) -> SecurityPolicy {
        SecurityPolicy {
            name: format!("network-{}", self.collection.name),
            kind: PolicyKind::Network,
            policy: SecurityDocument::Network(NetworkPolicyDoc(vec![NetworkStatement {
                rules: vec![
                    PolicyRule {
                        resource_type: PolicyResourceType::Collection,
                        resource: vec![self.collection_resource()],
                        permission: None,
                    },
                    PolicyRule {
                        resource_type: PolicyResourceType::Dashboard,
                        resource: vec![self.collection_resource()],
                        permission: None,
                    },
                ],
                allow_from_public: access.allow_from_public(),
            }])),
        }
    }

    /// Compile a data-access policy for one principal
    ///
    /// Emits exactly two rules - `index/{collection}/*` and
    /// `collection/{collection}` - with permissions derived from the action
    /// set's class. The action set must be non-empty and single-class; mixed
    /// grants are rejected so a read role can never carry write permissions.
    pub fn data_access_policy(
        &self,
        policy_name: impl Into<String>,
        principal: &RoleIdentity,
        actions: &BTreeSet<Action>,
    ) -> Result<AccessPolicy> {
        let class = Action::uniform_class(actions)?;

        let description = match class {
            ActionClass::Read => format!("Access for {} to query the collection", principal.name),
            ActionClass::Write => format!("Access for {} to push to the collection", principal.name),
        };

        Ok(AccessPolicy {
            name: policy_name.into(),
            kind: PolicyKind::Data,
            policy: DataAccessPolicyDoc(vec![DataStatement {
                description: Some(description),
                rules: vec![
                    PolicyRule {
                        resource_type: PolicyResourceType::Index,
                        resource: vec![self.index_resource()],
                        permission: Some(permissions_for(
                            class,
                            INDEX_READ_PERMISSIONS,
                            INDEX_WRITE_PERMISSIONS,
                        )),
                    },
                    PolicyRule {
                        resource_type: PolicyResourceType::Collection,
                        resource: vec![self.collection_resource()],
                        permission: Some(permissions_for(
                            class,
                            COLLECTION_READ_PERMISSIONS,
                            COLLECTION_WRITE_PERMISSIONS,
                        )),
                    },
                ],
                principal: vec![principal.arn.clone()],
            }]),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
