//! Serverless compute bindings
//!
//! A binding associates one deployable artifact with its runtime
//! configuration (memory, ephemeral storage, timeout, environment) and with a
//! least-privilege action grant for its role. The system never executes the
//! artifact; it only declares the artifact's resource requirements and
//! supplies its environment.
//!
//! Binding requires a [`ResolvedCollection`]: the collection address is
//! captured into the environment at bind time, so a binding against an
//! unresolved descriptor does not type-check. This is the load-bearing
//! ordering constraint of the whole pipeline - without it, a too-early
//! binding would capture an empty host and the compute unit would ship with
//! a broken address.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::collection::{CloudEnv, ResolvedCollection};
use crate::config::FunctionConfig;
use crate::{Error, Result};

/// Environment key carrying the collection name into the compute unit
pub const ENV_COLLECTION_NAME: &str = "COLLECTION_NAME";

/// Environment key carrying the collection endpoint host into the compute unit
pub const ENV_COLLECTION_HOST: &str = "COLLECTION_HOST";

/// Ceiling on binding timeouts, in seconds (the platform's 15-minute cap)
pub const MAX_TIMEOUT_SECS: u32 = 900;

// =============================================================================
// Actions
// =============================================================================

/// Remote action a binding may perform against the search endpoint
///
/// Wire names follow the platform's HTTP-method action grammar. Each action
/// belongs to exactly one [`ActionClass`], which is what least-privilege
/// grants are computed from.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum Action {
    /// HTTP GET against the data plane (read)
    #[serde(rename = "es:ESHttpGet")]
    HttpGet,
    /// HTTP HEAD against the data plane (read)
    #[serde(rename = "es:ESHttpHead")]
    HttpHead,
    /// HTTP POST against the data plane (write)
    #[serde(rename = "es:ESHttpPost")]
    HttpPost,
    /// HTTP PUT against the data plane (write)
    #[serde(rename = "es:ESHttpPut")]
    HttpPut,
    /// HTTP DELETE against the data plane (write)
    #[serde(rename = "es:ESHttpDelete")]
    HttpDelete,
}

/// Privilege class of an action set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionClass {
    /// GET-class actions only
    Read,
    /// POST/PUT-class actions only
    Write,
}

impl Action {
    /// The platform's wire name for this action
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::HttpGet => "es:ESHttpGet",
            Self::HttpHead => "es:ESHttpHead",
            Self::HttpPost => "es:ESHttpPost",
            Self::HttpPut => "es:ESHttpPut",
            Self::HttpDelete => "es:ESHttpDelete",
        }
    }

    /// Privilege class of this action
    pub fn class(self) -> ActionClass {
        match self {
            Self::HttpGet | Self::HttpHead => ActionClass::Read,
            Self::HttpPost | Self::HttpPut | Self::HttpDelete => ActionClass::Write,
        }
    }

    /// Default grant for a read role
    pub fn read_defaults() -> BTreeSet<Action> {
        BTreeSet::from([Self::HttpGet])
    }

    /// Default grant for a write role
    pub fn write_defaults() -> BTreeSet<Action> {
        BTreeSet::from([Self::HttpPost, Self::HttpPut])
    }

    /// The single class of a non-empty, homogeneous action set
    ///
    /// A set that mixes read and write actions would defeat per-role
    /// least-privilege, so it is rejected rather than widened.
    pub fn uniform_class(actions: &BTreeSet<Action>) -> Result<ActionClass> {
        let mut iter = actions.iter();
        let Some(first) = iter.next() else {
            return Err(Error::validation(
                "grant must contain at least one action",
            ));
        };
        let class = first.class();
        if iter.any(|a| a.class() != class) {
            return Err(Error::validation(format!(
                "grant mixes read and write actions: {:?}",
                actions
                    .iter()
                    .map(|a| a.wire_name())
                    .collect::<Vec<_>>()
            )));
        }
        Ok(class)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// =============================================================================
// Role Identity
// =============================================================================

/// Execution role identity for one binding
///
/// Data-access policies name this identity as their principal; the IAM
/// statement below is attached to it.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleIdentity {
    /// Role name
    pub name: String,
    /// Role ARN
    pub arn: String,
}

impl RoleIdentity {
    /// Derive the role identity for a binding in the given environment
    pub fn for_binding(binding_name: &str, env: &CloudEnv) -> Self {
        let name = format!("{binding_name}-role");
        let arn = env.role_arn(&name);
        Self { name, arn }
    }
}

// =============================================================================
// IAM Statement
// =============================================================================

/// Action-layer grant attached to a binding's role
///
/// Resources are wildcard at this layer; the data-access policy narrows the
/// effective permission to the collection's resource patterns. The engine
/// evaluates the intersection, so a role with this statement but no
/// data-access document has no resource access at all (fails closed).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct IamStatement {
    /// Statement effect (always `Allow`)
    #[serde(rename = "Effect")]
    pub effect: String,

    /// Granted action wire names
    #[serde(rename = "Action")]
    pub action: Vec<String>,

    /// Resource scope (wildcard at the action layer)
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
}

impl IamStatement {
    /// Build an allow statement over the given actions, wildcard-scoped
    pub fn allow(actions: &BTreeSet<Action>) -> Self {
        Self {
            effect: "Allow".to_string(),
            action: actions.iter().map(|a| a.wire_name().to_string()).collect(),
            resource: vec!["*".to_string()],
        }
    }
}

// =============================================================================
// Function Binding
// =============================================================================

/// A deployable compute unit bound to the collection
///
/// Constructed only through [`FunctionBinding::bind`], which requires a
/// resolved collection and validates the grant.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionBinding {
    /// Binding name (unique within the stack)
    pub name: String,
    /// Bundle location of the deployable artifact
    pub artifact: String,
    /// Qualified entry-point name inside the artifact
    pub handler: String,
    /// Memory allocation, in mebibytes
    pub memory_mb: u32,
    /// Ephemeral storage allocation, in mebibytes
    pub ephemeral_storage_mb: u32,
    /// Timeout ceiling, in seconds
    pub timeout_secs: u32,
    /// Environment supplied to the compute unit
    ///
    /// Always contains `COLLECTION_NAME` and `COLLECTION_HOST` so the unit
    /// can address the collection without hardcoding.
    pub env: BTreeMap<String, String>,
    /// Execution role for this binding
    pub role: RoleIdentity,
    /// Granted actions (single-class, minimal per binding)
    pub actions: BTreeSet<Action>,
    /// Action-layer IAM statement attached to the role
    pub statement: IamStatement,
}

impl FunctionBinding {
    /// Bind a compute unit to the resolved collection
    ///
    /// Copies the collection's name and host into the unit's environment on
    /// top of any configured variables, derives the role's IAM statement from
    /// the action set, and validates the runtime configuration. The
    /// `collection` parameter being the resolved type is what enforces the
    /// resolve-before-bind ordering.
    pub fn bind(
        name: impl Into<String>,
        config: &FunctionConfig,
        collection: &ResolvedCollection,
        role: RoleIdentity,
        actions: BTreeSet<Action>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("binding name must not be empty"));
        }
        if config.handler.is_empty() {
            return Err(Error::validation(format!(
                "binding '{name}' has no handler entry point"
            )));
        }
        if config.memory_mb == 0 {
            return Err(Error::validation(format!(
                "binding '{name}' must allocate memory"
            )));
        }
        if config.timeout_secs == 0 || config.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(Error::validation(format!(
                "binding '{name}' timeout must be within 1-{MAX_TIMEOUT_SECS} seconds, \
                 got {}",
                config.timeout_secs
            )));
        }
        // Rejects empty and mixed-class grants before the statement is built.
        Action::uniform_class(&actions)?;

        let mut env = config.variables.clone();
        env.insert(ENV_COLLECTION_NAME.to_string(), collection.name.clone());
        env.insert(ENV_COLLECTION_HOST.to_string(), collection.host.clone());

        let statement = IamStatement::allow(&actions);

        Ok(Self {
            name,
            artifact: config.artifact.clone(),
            handler: config.handler.clone(),
            memory_mb: config.memory_mb,
            ephemeral_storage_mb: config.ephemeral_storage_mb,
            timeout_secs: config.timeout_secs,
            env,
            role,
            actions,
            statement,
        })
    }

    /// Privilege class of this binding's grant
    pub fn class(&self) -> ActionClass {
        // Grant was validated at bind time, so the set is non-empty and
        // homogeneous.
        self.actions
            .iter()
            .next()
            .map(|a| a.class())
            .unwrap_or(ActionClass::Read)
    }
}

// =============================================================================
// Tests
// =============================================================================
