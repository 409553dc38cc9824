//! Route lookup.
//!
//! # Responsibilities
//! - Store the routes of one listener
//! - Look up the route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Exact, case-sensitive path equality; the query string is not part of it
//! - First declared route wins when paths repeat

use std::collections::HashSet;

use crate::config::RouteConfig;

/// Frozen route table of one listener.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteConfig>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteConfig>) -> Self {
        let mut seen = HashSet::new();
        for route in &routes {
            if !seen.insert(route.path.as_str()) {
                tracing::warn!(path = %route.path, "Duplicate route path, only the first one is used");
            }
        }
        Self { routes }
    }

    /// Route configured for exactly `path`.
    pub fn lookup(&self, path: &str) -> Option<&RouteConfig> {
        self.routes.iter().find(|route| route.path == path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
