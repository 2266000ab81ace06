//! One-pass stack compiler
//!
//! Assembles the whole deployment in the strict pipeline order:
//! descriptor resolution, policy generation, ordering edges, compute
//! bindings, routes, outputs. The pass is non-reentrant and performs no I/O;
//! its product is a [`Manifest`] the reconciliation engine converges on.
//!
//! The compiler delegates to the specialized builders:
//! - [`PolicyCompiler`](crate::policy::PolicyCompiler) for authorization documents
//! - [`FunctionBinding`](crate::compute::FunctionBinding) for compute bindings
//! - [`ResourceGraph`](crate::graph::ResourceGraph) for ordering validation

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::api::{HttpMethod, RouteEntry, RoutePath, RouteTable};
use crate::collection::ResolvedCollection;
use crate::compute::{Action, FunctionBinding, RoleIdentity};
use crate::config::{EndpointConfig, StackConfig};
use crate::graph::{ResourceGraph, ResourceKind, ResourceRef};
use crate::policy::{AccessPolicy, PolicyCompiler, SecurityPolicy};
use crate::{Error, Result};

// =============================================================================
// Outputs
// =============================================================================

/// Named outputs exposed after deployment for downstream consumers
///
/// Only constructible from a [`ResolvedCollection`], so blanks can never be
/// emitted. Output key spellings (including the capitalized `CollectionId`)
/// are part of the external contract and must not change.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StackOutputs {
    /// Collection name
    #[serde(rename = "collectionName")]
    pub collection_name: String,
    /// Engine-assigned collection identifier
    #[serde(rename = "CollectionId")]
    pub collection_id: String,
    /// Collection endpoint host
    #[serde(rename = "collectionHost")]
    pub collection_host: String,
    /// Collection ARN
    #[serde(rename = "collectionArn")]
    pub collection_arn: String,
}

impl From<&ResolvedCollection> for StackOutputs {
    fn from(collection: &ResolvedCollection) -> Self {
        Self {
            collection_name: collection.name.clone(),
            collection_id: collection.id.clone(),
            collection_host: collection.host.clone(),
            collection_arn: collection.arn.clone(),
        }
    }
}

/// HTTP API metadata in the manifest
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ApiDescriptor {
    /// API display name
    pub name: String,
    /// API description
    pub description: String,
}

// =============================================================================
// Compiled Stack
// =============================================================================

/// Fully compiled deployment
///
/// Everything the reconciliation engine needs, in settled form: the resolved
/// collection, validated policies, bindings, routes, and the ordering graph.
#[derive(Clone, Debug)]
pub struct CompiledStack {
    /// The resolved collection
    pub collection: ResolvedCollection,
    /// Encryption and network policies
    pub security_policies: Vec<SecurityPolicy>,
    /// Data-access policies, one per binding principal
    pub access_policies: Vec<AccessPolicy>,
    /// Compute bindings
    pub functions: Vec<FunctionBinding>,
    /// HTTP API metadata
    pub api: ApiDescriptor,
    /// HTTP surface
    pub routes: RouteTable,
    /// Ordering graph (already validated)
    pub graph: ResourceGraph,
    /// Named outputs
    pub outputs: StackOutputs,
}

impl CompiledStack {
    /// Total number of declared resources
    pub fn resource_count(&self) -> usize {
        self.graph.len()
    }

    /// Snapshot the stack as a serializable manifest
    pub fn manifest(&self) -> Result<Manifest> {
        let creation_order = self
            .graph
            .creation_order()?
            .iter()
            .map(ToString::to_string)
            .collect();

        Ok(Manifest {
            collection: self.collection.clone(),
            security_policies: self.security_policies.clone(),
            access_policies: self.access_policies.clone(),
            functions: self.functions.clone(),
            api: self.api.clone(),
            routes: self.routes.routes().to_vec(),
            creation_order,
            outputs: self.outputs.clone(),
        })
    }
}

/// Desired-state description handed to the reconciliation engine
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// The resolved collection
    pub collection: ResolvedCollection,
    /// Encryption and network policies
    pub security_policies: Vec<SecurityPolicy>,
    /// Data-access policies
    pub access_policies: Vec<AccessPolicy>,
    /// Compute bindings
    pub functions: Vec<FunctionBinding>,
    /// HTTP API metadata
    pub api: ApiDescriptor,
    /// HTTP surface
    pub routes: Vec<RouteEntry>,
    /// Resource names in a valid creation order
    pub creation_order: Vec<String>,
    /// Named outputs
    pub outputs: StackOutputs,
}

impl Manifest {
    /// Canonical JSON encoding of the manifest
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// YAML encoding of the manifest
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

// =============================================================================
// Stack Compiler
// =============================================================================

/// Compiler for the whole deployment
///
/// One call, one pass: `compile` runs the pipeline and returns either a
/// fully validated stack or the first build-time error. Nothing is emitted
/// on failure.
pub struct StackCompiler;

impl StackCompiler {
    /// Compile a stack configuration against an engine-assigned collection
    /// reference
    ///
    /// `collection_ref` is the reference the engine hands back for the
    /// collection (a symbolic reference on first deployment). Compilation is
    /// pure: the same config and reference always produce the same stack.
    pub fn compile(config: &StackConfig, collection_ref: &str) -> Result<CompiledStack> {
        config.validate()?;

        // Phase 1: resolve the collection descriptor.
        let collection = config
            .collection
            .clone()
            .resolve(collection_ref, &config.environment)?;
        debug!(name = %collection.name, host = %collection.host, "resolved collection");

        // Phase 2: security policies. These scope by name, which is known
        // before the collection exists.
        let policies = PolicyCompiler::new(&config.collection);
        let encryption = policies.encryption_policy();
        let network = policies.network_policy(config.network.access);
        debug!(encryption = %encryption.name, network = %network.name, "compiled security policies");

        // Phase 3: ordering edges. The engine must settle both security
        // policies before it attempts the collection.
        let collection_ref_node = ResourceRef::new(ResourceKind::Collection, &collection.name);
        let encryption_node = ResourceRef::new(ResourceKind::SecurityPolicy, &encryption.name);
        let network_node = ResourceRef::new(ResourceKind::SecurityPolicy, &network.name);

        let mut graph = ResourceGraph::new();
        graph.add_node(collection_ref_node.clone());
        graph.add_node(encryption_node.clone());
        graph.add_node(network_node.clone());
        graph.depends_on(collection_ref_node.clone(), encryption_node.clone());
        graph.depends_on(collection_ref_node.clone(), network_node.clone());

        // Phase 4: compute bindings against the resolved collection.
        let search = Self::bind_endpoint(
            format!("{}-search", collection.name),
            &config.search,
            &collection,
            config,
            Action::read_defaults(),
        )?;
        let ingest = Self::bind_endpoint(
            format!("{}-ingest", collection.name),
            &config.ingest,
            &collection,
            config,
            Action::write_defaults(),
        )?;

        if !search.actions.is_disjoint(&ingest.actions) {
            return Err(Error::validation(
                "read-role and write-role grants must not overlap",
            ));
        }

        // Phase 5: one data-access policy per binding principal. Names derive
        // from the binding, so two principals can never share a document (the
        // engine would treat a shared name as a replacement, dropping the
        // earlier grant).
        let mut access_policies = Vec::with_capacity(2);
        for binding in [&search, &ingest] {
            let policy = policies.data_access_policy(
                format!("{}-data-policy", binding.name),
                &binding.role,
                &binding.actions,
            )?;

            let function_node = ResourceRef::new(ResourceKind::Function, &binding.name);
            let policy_node = ResourceRef::new(ResourceKind::AccessPolicy, &policy.name);
            graph.add_node(function_node.clone());
            graph.add_node(policy_node.clone());
            // The binding's environment embeds the resolved host, and the
            // policy names the binding's role as principal.
            graph.depends_on(function_node.clone(), collection_ref_node.clone());
            graph.depends_on(policy_node, function_node);

            access_policies.push(policy);
        }

        // Phase 6: routes.
        let mut routes = RouteTable::new();
        let (search_path, search_method) =
            Self::endpoint_route(&config.search, &collection.name, "search", HttpMethod::Get)?;
        routes.route(search_path, search_method, &search.name)?;
        let (ingest_path, ingest_method) =
            Self::endpoint_route(&config.ingest, &collection.name, "ingest", HttpMethod::Post)?;
        routes.route(ingest_path, ingest_method, &ingest.name)?;

        let api = ApiDescriptor {
            name: config
                .api
                .name
                .clone()
                .unwrap_or_else(|| format!("{} search service", collection.name)),
            description: config
                .api
                .description
                .clone()
                .unwrap_or_else(|| format!("Serves {} search requests", collection.name)),
        };

        let api_node = ResourceRef::new(ResourceKind::RestApi, &api.name);
        graph.add_node(api_node.clone());
        for binding in [&search, &ingest] {
            graph.depends_on(
                api_node.clone(),
                ResourceRef::new(ResourceKind::Function, &binding.name),
            );
        }

        // Phase 7: the build-time gate. Required edges first, then the full
        // acyclicity/reference pass.
        Self::validate_required_edges(&graph, &collection_ref_node, &[
            &encryption_node,
            &network_node,
        ])?;
        graph.validate()?;

        let outputs = StackOutputs::from(&collection);

        let stack = CompiledStack {
            collection,
            security_policies: vec![encryption, network],
            access_policies,
            functions: vec![search, ingest],
            api,
            routes,
            graph,
            outputs,
        };
        info!(
            collection = %stack.collection.name,
            resources = stack.resource_count(),
            routes = stack.routes.len(),
            "compiled stack"
        );
        Ok(stack)
    }

    fn bind_endpoint(
        name: String,
        endpoint: &EndpointConfig,
        collection: &ResolvedCollection,
        config: &StackConfig,
        actions: BTreeSet<Action>,
    ) -> Result<FunctionBinding> {
        let role = RoleIdentity::for_binding(&name, &config.environment);
        FunctionBinding::bind(name, &endpoint.function, collection, role, actions)
    }

    fn endpoint_route(
        endpoint: &EndpointConfig,
        collection_name: &str,
        default_leaf: &str,
        default_method: HttpMethod,
    ) -> Result<(RoutePath, HttpMethod)> {
        match &endpoint.route {
            Some(route) => Ok((RoutePath::parse(&route.path)?, route.method)),
            None => Ok((
                RoutePath::parse(&format!("/{collection_name}/{default_leaf}"))?,
                default_method,
            )),
        }
    }

    /// Check that every required ordering edge is present
    ///
    /// A missing edge would let the engine attempt the collection before its
    /// prerequisite policies settle, so absence is a graph error, not a
    /// warning.
    fn validate_required_edges(
        graph: &ResourceGraph,
        collection: &ResourceRef,
        prerequisites: &[&ResourceRef],
    ) -> Result<()> {
        for prerequisite in prerequisites {
            if !graph.has_edge(collection, prerequisite) {
                return Err(Error::graph(format!(
                    "missing required ordering edge '{collection}' -> '{prerequisite}'"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceKind;
    use crate::policy::PolicyKind;

    fn config() -> StackConfig {
        StackConfig::from_yaml(
            r#"
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
"#,
        )
        .unwrap()
    }

    fn compiled() -> CompiledStack {
        StackCompiler::compile(&config(), "abc123").unwrap()
    }

    // =========================================================================
    // Story: The Pipeline Produces a Valid Stack
    // =========================================================================

    #[test]
    fn story_compile_produces_all_resources() {
        let stack = compiled();

        assert_eq!(stack.security_policies.len(), 2);
        assert_eq!(stack.access_policies.len(), 2);
        assert_eq!(stack.functions.len(), 2);
        assert_eq!(stack.routes.len(), 2);
        // 2 security policies + collection + 2 functions + 2 access policies
        // + api = 8
        assert_eq!(stack.resource_count(), 8);
    }

    #[test]
    fn story_required_edges_present() {
        let stack = compiled();
        let collection = ResourceRef::new(ResourceKind::Collection, "employee");

        assert!(stack.graph.has_edge(
            &collection,
            &ResourceRef::new(ResourceKind::SecurityPolicy, "encryption-employee"),
        ));
        assert!(stack.graph.has_edge(
            &collection,
            &ResourceRef::new(ResourceKind::SecurityPolicy, "network-employee"),
        ));
        stack.graph.validate().unwrap();
    }

    #[test]
    fn story_policies_settle_before_collection_before_functions() {
        let stack = compiled();
        let order = stack.graph.creation_order().unwrap();
        let position = |kind: ResourceKind, name: &str| {
            order
                .iter()
                .position(|r| r.kind == kind && r.name == name)
                .unwrap()
        };

        let collection = position(ResourceKind::Collection, "employee");
        assert!(position(ResourceKind::SecurityPolicy, "encryption-employee") < collection);
        assert!(position(ResourceKind::SecurityPolicy, "network-employee") < collection);
        assert!(collection < position(ResourceKind::Function, "employee-search"));
        assert!(collection < position(ResourceKind::Function, "employee-ingest"));
    }

    #[test]
    fn story_compilation_is_deterministic() {
        let a = StackCompiler::compile(&config(), "abc123").unwrap();
        let b = StackCompiler::compile(&config(), "abc123").unwrap();
        assert_eq!(a.manifest().unwrap(), b.manifest().unwrap());
    }

    // =========================================================================
    // Story: Outputs Reflect Post-Resolution State
    // =========================================================================

    #[test]
    fn story_outputs_carry_derived_identifiers() {
        let stack = compiled();

        assert_eq!(stack.outputs.collection_name, "employee");
        assert_eq!(stack.outputs.collection_id, "abc123");
        assert_eq!(
            stack.outputs.collection_host,
            "abc123.us-east-1.aoss.amazonaws.com"
        );
        assert_eq!(
            stack.outputs.collection_arn,
            "arn:aws:aoss:us-east-1:111111111111:collection/abc123"
        );
    }

    #[test]
    fn story_output_key_spellings_are_contractual() {
        let json = serde_json::to_string(&compiled().outputs).unwrap();
        assert_eq!(
            json,
            r#"{"collectionName":"employee","CollectionId":"abc123","collectionHost":"abc123.us-east-1.aoss.amazonaws.com","collectionArn":"arn:aws:aoss:us-east-1:111111111111:collection/abc123"}"#
        );
    }

    // =========================================================================
    // Story: Least Privilege Across Roles
    // =========================================================================

    #[test]
    fn story_role_grants_are_disjoint() {
        let stack = compiled();
        let search = &stack.functions[0];
        let ingest = &stack.functions[1];
        assert!(search.actions.is_disjoint(&ingest.actions));
    }

    #[test]
    fn story_each_principal_gets_its_own_data_policy() {
        let stack = compiled();

        let names: Vec<&str> = stack
            .access_policies
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["employee-search-data-policy", "employee-ingest-data-policy"]
        );

        for (policy, function) in stack.access_policies.iter().zip(&stack.functions) {
            assert_eq!(policy.kind, PolicyKind::Data);
            assert_eq!(policy.policy.0[0].principal, vec![function.role.arn.clone()]);
        }
    }

    // =========================================================================
    // Story: Default HTTP Surface
    // =========================================================================

    #[test]
    fn story_default_routes() {
        let stack = compiled();
        let routes = stack.routes.routes();

        assert_eq!(routes[0].path.to_string(), "/employee/search");
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].function, "employee-search");
        assert_eq!(routes[1].path.to_string(), "/employee/ingest");
        assert_eq!(routes[1].method, HttpMethod::Post);
        assert_eq!(routes[1].function, "employee-ingest");
    }

    #[test]
    fn story_overlapping_route_overrides_rejected() {
        let mut cfg = config();
        cfg.ingest.route = Some(crate::config::RouteConfig {
            path: "/employee/search".to_string(),
            method: HttpMethod::Get,
        });

        let err = StackCompiler::compile(&cfg, "abc123").unwrap_err();
        assert!(err.to_string().contains("duplicate route"));
    }

    // =========================================================================
    // Story: Missing Required Edge Detection
    // =========================================================================

    #[test]
    fn story_missing_required_edge_is_a_graph_error() {
        let collection = ResourceRef::new(ResourceKind::Collection, "employee");
        let policy = ResourceRef::new(ResourceKind::SecurityPolicy, "encryption-employee");

        let mut graph = ResourceGraph::new();
        graph.add_node(collection.clone());
        graph.add_node(policy.clone());
        // Edge deliberately omitted.

        let err =
            StackCompiler::validate_required_edges(&graph, &collection, &[&policy]).unwrap_err();
        assert!(err.to_string().contains("missing required ordering edge"));
    }

    // =========================================================================
    // Story: Manifest Snapshot
    // =========================================================================

    #[test]
    fn story_manifest_serializes_creation_order() {
        let manifest = compiled().manifest().unwrap();

        assert_eq!(manifest.creation_order.len(), 8);
        let collection_pos = manifest
            .creation_order
            .iter()
            .position(|r| r == "collection/employee")
            .unwrap();
        for policy in ["encryption-employee", "network-employee"] {
            let pos = manifest
                .creation_order
                .iter()
                .position(|r| r == &format!("security-policy/{policy}"))
                .unwrap();
            assert!(pos < collection_pos);
        }

        let json = manifest.to_json().unwrap();
        assert!(json.contains("\"securityPolicies\""));
        assert!(json.contains("\"AWSOwnedKey\""));
        let yaml = manifest.to_yaml().unwrap();
        assert!(yaml.contains("collectionHost"));
    }
}
