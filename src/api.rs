//! HTTP route table
//!
//! The externally reachable surface of the stack: each route maps a
//! `(path, method)` pair to one function binding. Registration is
//! append-only and rejects duplicates - two bindings claiming the same pair
//! would make request dispatch ambiguous, so the build fails instead of
//! applying last-write-wins.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// =============================================================================
// Methods and Paths
// =============================================================================

/// HTTP method of a route
#[derive(
    Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
#[serde(rename_all = "UPPERCASE")]
#[non_exhaustive]
pub enum HttpMethod {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP HEAD
    Head,
    /// HTTP PATCH
    Patch,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Head => write!(f, "HEAD"),
            Self::Patch => write!(f, "PATCH"),
        }
    }
}

/// Slash-separated route path, stored as its segments
#[derive(Clone, Debug, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(into = "String")]
pub struct RoutePath {
    segments: Vec<String>,
}

impl RoutePath {
    /// Parse a path like `/employee/search` into segments
    ///
    /// A leading slash is optional; empty paths and empty segments are
    /// rejected.
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Err(Error::route("route path must not be empty"));
        }
        let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(Error::route(format!(
                "route path '{path}' contains an empty segment"
            )));
        }
        Ok(Self { segments })
    }

    /// The path segments, in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl std::fmt::Display for RoutePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl From<RoutePath> for String {
    fn from(path: RoutePath) -> Self {
        path.to_string()
    }
}

impl std::str::FromStr for RoutePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// =============================================================================
// Route Table
// =============================================================================

/// One registered route
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RouteEntry {
    /// Route path
    pub path: RoutePath,
    /// HTTP method
    pub method: HttpMethod,
    /// Name of the function binding serving this route
    pub function: String,
}

/// Registry of the stack's HTTP surface
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    /// Create an empty route table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route to a function binding
    ///
    /// Duplicate `(path, method)` registration is a build-time error.
    pub fn route(
        &mut self,
        path: RoutePath,
        method: HttpMethod,
        function: impl Into<String>,
    ) -> Result<()> {
        if self
            .routes
            .iter()
            .any(|r| r.path == path && r.method == method)
        {
            return Err(Error::route(format!("duplicate route {method} {path}")));
        }
        self.routes.push(RouteEntry {
            path,
            method,
            function: function.into(),
        });
        Ok(())
    }

    /// Registered routes, in registration order
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Number of registered routes
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether no routes are registered
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Story: Route Registration and Lookup
    // =========================================================================

    #[test]
    fn story_routes_register_in_order() {
        let mut table = RouteTable::new();
        table
            .route(
                RoutePath::parse("/employee/ingest").unwrap(),
                HttpMethod::Post,
                "ingest-fn",
            )
            .unwrap();
        table
            .route(
                RoutePath::parse("/employee/search").unwrap(),
                HttpMethod::Get,
                "search-fn",
            )
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.routes()[0].function, "ingest-fn");
        assert_eq!(table.routes()[1].method, HttpMethod::Get);
    }

    // =========================================================================
    // Story: No Overlapping (Path, Method) Pairs
    // =========================================================================

    #[test]
    fn story_duplicate_route_rejected() {
        let mut table = RouteTable::new();
        let path = RoutePath::parse("/employee/search").unwrap();
        table.route(path.clone(), HttpMethod::Get, "search-fn").unwrap();

        let err = table
            .route(path, HttpMethod::Get, "other-fn")
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("duplicate route GET /employee/search"));
    }

    #[test]
    fn story_same_path_different_method_allowed() {
        let mut table = RouteTable::new();
        let path = RoutePath::parse("/employee/search").unwrap();
        table.route(path.clone(), HttpMethod::Get, "search-fn").unwrap();
        table.route(path, HttpMethod::Post, "ingest-fn").unwrap();
        assert_eq!(table.len(), 2);
    }

    // =========================================================================
    // Story: Path Parsing
    // =========================================================================

    #[test]
    fn story_paths_parse_into_segments() {
        let path = RoutePath::parse("/employee/search").unwrap();
        assert_eq!(path.segments(), ["employee", "search"]);
        assert_eq!(path.to_string(), "/employee/search");

        // Leading slash is optional
        let bare = RoutePath::parse("employee/search").unwrap();
        assert_eq!(bare, path);
    }

    #[test]
    fn story_malformed_paths_rejected() {
        assert!(RoutePath::parse("").unwrap_err().to_string().contains("empty"));
        assert!(RoutePath::parse("/").unwrap_err().to_string().contains("empty"));
        assert!(RoutePath::parse("/employee//search")
            .unwrap_err()
            .to_string()
            .contains("empty segment"));
    }

    #[test]
    fn story_method_wire_names() {
        assert_eq!(serde_json::to_string(&HttpMethod::Get).unwrap(), "\"GET\"");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }
}
