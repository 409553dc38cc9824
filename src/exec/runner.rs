//! Command runner.
//!
//! # Responsibilities
//! - Build the invocation (direct exec or `<shell> -c <script>`)
//! - Wire stdin/stdout to the pipe bridge, leave stderr inherited
//! - Apply credentials and chroot in one pre-exec step
//! - Run to completion and close both command-side pipe ends on every path
//!
//! # Design Decisions
//! - Identity and process failures are logged, never returned: the
//!   response then simply ends empty or short
//! - The parent's copies of the child's stdio are dropped right after spawn,
//!   otherwise a command exiting early would not break the input pipe and
//!   the output pipe would never reach EOF

use std::ffi::CString;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use nix::unistd::{chdir, chroot, geteuid, setgid, setgroups, setuid, Gid, Uid};
use tokio::process::Command;

use crate::exec::error::ExecError;
use crate::exec::identity::ResolvedIdentity;
use crate::exec::pipe::CommandEnds;
use crate::exec::spec::ExecutionSpec;

/// Credentials and filesystem root applied to a child before exec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnConfig {
    pub uid: u32,
    pub gid: u32,
    pub chroot: Option<PathBuf>,
}

impl SpawnConfig {
    pub fn new(identity: ResolvedIdentity, chroot: Option<PathBuf>) -> Self {
        Self {
            uid: identity.uid,
            gid: identity.gid,
            chroot,
        }
    }

    /// Install the pre-exec hook on `cmd`.
    ///
    /// Order inside the child: chroot, chdir("/"), setgroups (root only),
    /// setgid, setuid. Chroot must run while still privileged.
    pub fn apply(&self, cmd: &mut Command) -> std::io::Result<()> {
        let root = match &self.chroot {
            Some(path) => Some(CString::new(path.as_os_str().as_bytes()).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
            })?),
            None => None,
        };
        let uid = Uid::from_raw(self.uid);
        let gid = Gid::from_raw(self.gid);
        let drop_groups = geteuid().is_root();

        // SAFETY: the hook only issues raw syscalls on values prepared above;
        // it does not allocate or touch locks between fork and exec.
        unsafe {
            cmd.pre_exec(move || {
                if let Some(root) = &root {
                    chroot(root.as_c_str())?;
                    chdir("/")?;
                }
                if drop_groups {
                    setgroups(&[])?;
                }
                setgid(gid)?;
                setuid(uid)?;
                Ok(())
            });
        }
        Ok(())
    }
}

/// Resolve the configured identity and run its command against `ends`.
pub async fn run_with_lookup(spec: &ExecutionSpec, ends: CommandEnds) {
    let identity = crate::exec::identity::resolve(&spec.user, &spec.group);
    run(spec, identity, ends).await;
}

/// Run the command, or skip it when `identity` failed to resolve.
///
/// Returns once the process has exited (or was never started). Both
/// command-side pipe ends are closed by then.
pub async fn run(
    spec: &ExecutionSpec,
    identity: Result<ResolvedIdentity, ExecError>,
    ends: CommandEnds,
) {
    let CommandEnds {
        input_reader,
        output_writer,
    } = ends;

    match identity {
        Err(e) => {
            tracing::error!(error = %e, "Cannot get effective UID and GID, will not start the command");
            drop(input_reader);
            drop(output_writer);
        }
        Ok(identity) => match execute(spec, identity, input_reader, output_writer).await {
            Ok(status) => tracing::info!(%status, "Command finished"),
            Err(e) => tracing::error!(error = %e, "Cannot run command"),
        },
    }
}

async fn execute(
    spec: &ExecutionSpec,
    identity: ResolvedIdentity,
    stdin: OwnedFd,
    stdout: OwnedFd,
) -> Result<ExitStatus, ExecError> {
    let mut cmd = build_command(spec);
    cmd.stdin(Stdio::from(stdin)).stdout(Stdio::from(stdout));

    let spawn_config = SpawnConfig::new(identity, spec.chroot.clone());
    spawn_config
        .apply(&mut cmd)
        .map_err(|source| launch_error(spec, source))?;

    tracing::info!(
        uid = spawn_config.uid,
        gid = spawn_config.gid,
        chroot = ?spawn_config.chroot,
        "Starting command"
    );

    let spawned = cmd.spawn();
    // Releases the parent's copies of the child's stdin/stdout.
    drop(cmd);
    let mut child = spawned.map_err(|source| launch_error(spec, source))?;

    let status = child.wait().await.map_err(|e| ExecError::ProcessRun {
        command: spec.command.clone(),
        reason: e.to_string(),
    })?;

    if status.success() {
        Ok(status)
    } else {
        Err(ExecError::ProcessRun {
            command: spec.command.clone(),
            reason: status.to_string(),
        })
    }
}

/// Build the invocation without stdio or credentials.
pub fn build_command(spec: &ExecutionSpec) -> Command {
    match &spec.shell {
        Some(shell) => {
            tracing::info!(shell = %shell, script = %spec.command, "Initializing command using shell");
            if !spec.params.is_empty() {
                tracing::warn!(
                    params = ?spec.params,
                    "Ignoring explicit command parameters because shell execution is in use"
                );
            }
            let mut cmd = Command::new(shell);
            cmd.arg("-c").arg(&spec.command);
            cmd
        }
        None => {
            tracing::info!(command = %spec.command, params = ?spec.params, "Initializing command without shell");
            let mut cmd = Command::new(&spec.command);
            cmd.args(&spec.params);
            cmd
        }
    }
}

fn launch_error(spec: &ExecutionSpec, source: std::io::Error) -> ExecError {
    ExecError::ProcessLaunch {
        command: spec.command.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::pipe::PipeBridge;
    use std::collections::HashSet;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn spec(command: &str, params: &[&str]) -> ExecutionSpec {
        ExecutionSpec {
            shell: None,
            command: command.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            user: String::new(),
            group: String::new(),
            chroot: None,
            accepted_fields: HashSet::new(),
            content_type: None,
            file_name: "converted".into(),
        }
    }

    /// Run `spec` against `input` and return everything it wrote to stdout.
    async fn run_to_output(
        spec: ExecutionSpec,
        identity: Result<ResolvedIdentity, ExecError>,
        input: &'static [u8],
    ) -> Vec<u8> {
        let PipeBridge {
            mut input_writer,
            command,
            mut output_reader,
        } = PipeBridge::new().unwrap();

        let runner = tokio::spawn(async move { run(&spec, identity, command).await });
        let writer = tokio::spawn(async move {
            // The command may never read; a broken pipe is fine here.
            let _ = input_writer.write_all(input).await;
        });

        let mut out = Vec::new();
        output_reader.read_to_end(&mut out).await.unwrap();
        runner.await.unwrap();
        writer.await.unwrap();
        out
    }

    #[tokio::test]
    async fn direct_exec_relays_stdin() {
        let out = run_to_output(spec("cat", &[]), Ok(ResolvedIdentity::current()), b"hello").await;
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn params_are_passed_as_argv() {
        let out = run_to_output(
            spec("echo", &["-n", "a b", "c"]),
            Ok(ResolvedIdentity::current()),
            b"",
        )
        .await;
        assert_eq!(out, b"a b c");
    }

    #[tokio::test]
    async fn shell_mode_ignores_params() {
        let mut s = spec("tr a-z A-Z", &["ignored"]);
        s.shell = Some("/bin/sh".into());
        let out = run_to_output(s, Ok(ResolvedIdentity::current()), b"shout").await;
        assert_eq!(out, b"SHOUT");
    }

    #[tokio::test]
    async fn identity_failure_skips_launch_and_closes_ends() {
        let err = ExecError::IdentityLookup("cannot find user \"doesnotexist\"".into());
        let out = run_to_output(spec("echo", &["should not run"]), Err(err), b"data").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_yields_empty_output() {
        let out = run_to_output(
            spec("/nonexistent/webexec-missing-binary", &[]),
            Ok(ResolvedIdentity::current()),
            b"data",
        )
        .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn chroot_failure_yields_empty_output() {
        let mut s = spec("cat", &[]);
        s.chroot = Some(PathBuf::from("/nonexistent/webexec-jail"));
        let out = run_to_output(s, Ok(ResolvedIdentity::current()), b"data").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn failing_command_keeps_partial_output() {
        let mut s = spec("printf partial; exit 3", &[]);
        s.shell = Some("/bin/sh".into());
        let out = run_to_output(s, Ok(ResolvedIdentity::current()), b"").await;
        assert_eq!(out, b"partial");
    }

    #[test]
    fn spawn_config_rejects_nul_in_chroot() {
        let config = SpawnConfig {
            uid: 0,
            gid: 0,
            chroot: Some(PathBuf::from("/srv/\0jail")),
        };
        let mut cmd = Command::new("true");
        let err = config.apply(&mut cmd).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    fn running_as_root() -> bool {
        if !geteuid().is_root() {
            eprintln!("skipping: credential changes need root");
            return false;
        }
        true
    }

    #[tokio::test]
    async fn command_runs_with_resolved_credentials() {
        if !running_as_root() {
            return;
        }
        let nobody = nix::unistd::User::from_name("nobody")
            .unwrap()
            .expect("nobody account exists");
        let identity = ResolvedIdentity {
            uid: nobody.uid.as_raw(),
            gid: nobody.gid.as_raw(),
        };

        let mut s = spec("id -u; id -g; id -G", &[]);
        s.shell = Some("/bin/sh".into());
        let out = run_to_output(s, Ok(identity), b"").await;

        // `id -G` lists only the primary group once supplementary groups are cleared.
        let expected = format!("{uid}\n{gid}\n{gid}\n", uid = identity.uid, gid = identity.gid);
        assert_eq!(String::from_utf8_lossy(&out), expected);
    }

    #[tokio::test]
    async fn chroot_hides_host_filesystem() {
        if !running_as_root() {
            return;
        }
        let mut s = spec("echo visible", &[]);
        s.shell = Some("/bin/sh".into());

        let out = run_to_output(s.clone(), Ok(ResolvedIdentity::current()), b"").await;
        assert_eq!(out, b"visible\n");

        // The jail has no /bin/sh, so exec fails once the root has changed.
        let jail = tempfile::tempdir().unwrap();
        s.chroot = Some(jail.path().to_path_buf());
        let out = run_to_output(s, Ok(ResolvedIdentity::current()), b"").await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn chroot_to_root_keeps_running() {
        if !running_as_root() {
            return;
        }
        let mut s = spec("cat", &[]);
        s.chroot = Some(PathBuf::from("/"));
        let out = run_to_output(s, Ok(ResolvedIdentity::current()), b"jailed").await;
        assert_eq!(out, b"jailed");
    }
}
