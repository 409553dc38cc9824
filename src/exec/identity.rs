//! Identity resolution for spawned commands.
//!
//! # Responsibilities
//! - Map configured user/group names to numeric ids
//! - Fall back to the effective ids of this process for empty names
//!
//! # Design Decisions
//! - Resolved on every request, never cached: the account database is the
//!   source of truth and may change while the gateway runs
//! - User and group are resolved independently; a group is not derived
//!   from the user's primary group

use std::fmt;

use nix::unistd::{getegid, geteuid, Group, User};

use crate::exec::error::ExecError;

/// Numeric credentials a command runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub uid: u32,
    pub gid: u32,
}

impl ResolvedIdentity {
    /// Effective identity of the gateway process itself.
    pub fn current() -> Self {
        Self {
            uid: geteuid().as_raw(),
            gid: getegid().as_raw(),
        }
    }
}

impl fmt::Display for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "uid={} gid={}", self.uid, self.gid)
    }
}

/// Resolve `(username, groupname)` into numeric ids.
///
/// Empty names keep the effective uid/gid of the current process.
pub fn resolve(username: &str, groupname: &str) -> Result<ResolvedIdentity, ExecError> {
    let current = ResolvedIdentity::current();
    tracing::debug!(uid = current.uid, gid = current.gid, "Current effective identity");

    let uid = if username.is_empty() {
        current.uid
    } else {
        lookup_user(username)?
    };

    let gid = if groupname.is_empty() {
        current.gid
    } else {
        lookup_group(groupname)?
    };

    let identity = ResolvedIdentity { uid, gid };
    warn_on_root_group(&identity);
    Ok(identity)
}

/// An unprivileged user paired with group 0 usually means `group` was left
/// empty while the gateway runs as root.
fn warn_on_root_group(identity: &ResolvedIdentity) {
    if identity.uid != 0 && identity.gid == 0 {
        tracing::warn!(
            uid = identity.uid,
            gid = identity.gid,
            "Command keeps group 0 while running as an unprivileged user, set a group"
        );
    }
}

fn lookup_user(name: &str) -> Result<u32, ExecError> {
    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(ExecError::IdentityLookup(format!("cannot find user \"{}\"", name))),
        Err(e) => Err(ExecError::IdentityLookup(format!(
            "cannot look up user \"{}\": {}",
            name, e
        ))),
    }
}

fn lookup_group(name: &str) -> Result<u32, ExecError> {
    match Group::from_name(name) {
        Ok(Some(group)) => Ok(group.gid.as_raw()),
        Ok(None) => Err(ExecError::IdentityLookup(format!("cannot find group \"{}\"", name))),
        Err(e) => Err(ExecError::IdentityLookup(format!(
            "cannot look up group \"{}\": {}",
            name, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::logging::CapturedLogs;

    #[test]
    fn empty_names_use_effective_ids() {
        let identity = resolve("", "").unwrap();
        assert_eq!(identity, ResolvedIdentity::current());
    }

    #[test]
    fn own_account_name_matches_empty() {
        let user = User::from_uid(geteuid()).unwrap().expect("current user has a passwd entry");
        let group = Group::from_gid(getegid()).unwrap().expect("current group has a group entry");

        let by_name = resolve(&user.name, &group.name).unwrap();
        let by_default = resolve("", "").unwrap();
        assert_eq!(by_name, by_default);
    }

    #[test]
    fn user_and_group_resolve_independently() {
        let group = Group::from_gid(getegid()).unwrap().expect("current group has a group entry");
        let identity = resolve("", &group.name).unwrap();
        assert_eq!(identity.uid, geteuid().as_raw());
        assert_eq!(identity.gid, group.gid.as_raw());
    }

    #[test]
    fn unknown_user_is_lookup_error() {
        let err = resolve("doesnotexist", "").unwrap_err();
        assert!(matches!(err, ExecError::IdentityLookup(_)));
        assert!(err.to_string().contains("doesnotexist"));
    }

    #[test]
    fn unknown_group_is_lookup_error() {
        let err = resolve("", "nosuchgroup-webexec").unwrap_err();
        assert!(matches!(err, ExecError::IdentityLookup(_)));
    }

    #[test]
    fn unprivileged_user_with_root_group_is_flagged() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            warn_on_root_group(&ResolvedIdentity { uid: 0, gid: 0 });
            warn_on_root_group(&ResolvedIdentity { uid: 65534, gid: 65534 });
        });
        assert!(logs.contents().is_empty());

        tracing::subscriber::with_default(logs.subscriber(), || {
            warn_on_root_group(&ResolvedIdentity { uid: 65534, gid: 0 });
        });
        let logged = logs.contents();
        assert!(logged.contains("WARN"));
        assert!(logged.contains("uid=65534"));
    }
}
