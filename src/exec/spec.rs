//! Per-request execution parameters.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::RouteConfig;

/// Attachment name used when the client does not pass `?filename=`.
pub const DEFAULT_FILE_NAME: &str = "converted";

/// Everything needed to run one request's command.
///
/// Built from the matched route plus the query string, then owned by the
/// request until it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSpec {
    /// Interpreter invoked as `<shell> -c <command>`; `None` means direct exec.
    pub shell: Option<String>,
    /// Program path, or script text when `shell` is set.
    pub command: String,
    /// Argument vector for direct exec. Ignored with `shell`.
    pub params: Vec<String>,
    /// Account name to run as; empty keeps the current effective user.
    pub user: String,
    /// Group name to run as; empty keeps the current effective group.
    pub group: String,
    pub chroot: Option<PathBuf>,
    /// Form field names whose content is forwarded to the command.
    pub accepted_fields: HashSet<String>,
    pub content_type: Option<String>,
    pub file_name: String,
}

impl ExecutionSpec {
    /// Build the spec for a request on `route` with the given raw query.
    pub fn from_route(route: &RouteConfig, raw_query: Option<&str>) -> Self {
        let command = &route.command;
        let file_name = match raw_query.and_then(|q| query_param(q, "filename")) {
            Some(name) if !name.is_empty() => {
                tracing::info!(file_name = %name, "Provided filename");
                name
            }
            _ => {
                tracing::info!(file_name = DEFAULT_FILE_NAME, "No filename given, using default");
                DEFAULT_FILE_NAME.to_string()
            }
        };

        Self {
            shell: non_empty(&command.shell),
            command: command.command.trim().to_string(),
            params: command.params.clone(),
            user: command.user.clone(),
            group: command.group.clone(),
            chroot: non_empty(&command.chroot).map(PathBuf::from),
            accepted_fields: route.fields.iter().cloned().collect(),
            content_type: route.content_type.as_deref().and_then(non_empty),
            file_name,
        }
    }

    /// Whether a part named `field` is forwarded to the command.
    pub fn accepts(&self, field: &str) -> bool {
        self.accepted_fields.contains(field)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// First value of `key` in a form-urlencoded query string.
fn query_param(raw_query: &str, key: &str) -> Option<String> {
    url::form_urlencoded::parse(raw_query.as_bytes())
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
