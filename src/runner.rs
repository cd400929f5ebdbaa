//! Container invocation
//!
//! A `Runner` holds the fixed part of a container invocation (mounts,
//! environment, entrypoint) and turns "run this command against this
//! image" into a `ContainerSpec`. It can either run a throwaway container
//! or snapshot the container's filesystem into a new image.

use crate::error::{DockenvError, DockenvResult};
use crate::orchestration::{ContainerRuntime, ContainerSpec, Mount, MountMode};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// User created inside host-user containers
pub const CONTAINER_USER: &str = "user";

/// Home directory of `CONTAINER_USER`
pub const CONTAINER_HOME: &str = "/home/user";

/// Where the host-user entrypoint script is mounted
const ENTRYPOINT_PATH: &str = "/entrypoint";

/// Where a forwarded SSH agent socket is mounted
const SSH_AUTH_SOCK_PATH: &str = "/run/ssh_auth_sock";

/// Settings for containers that act as the invoking host user
#[derive(Debug, Clone, Default)]
pub struct HostUserOptions {
    /// Script that creates the mapped user and drops privileges
    pub entrypoint_script: Option<PathBuf>,
    /// Host directory to use as the container home; anonymous volume if unset
    pub home_volume: Option<PathBuf>,
    /// Let the mapped user escalate with sudo
    pub allow_sudo: bool,
    /// Forward `SSH_AUTH_SOCK` into the container
    pub forward_ssh_agent: bool,
}

/// Fixed container configuration applied to every invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Runner {
    mounts: Vec<Mount>,
    env: Vec<(String, String)>,
    entrypoint: Option<String>,
    forward_ssh_agent: bool,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner whose containers map the invoking user's uid/gid
    pub fn host_user(options: &HostUserOptions) -> Self {
        let (uid, gid) = host_ids();
        let shell = std::env::var("SHELL").unwrap_or_default();
        let term = std::env::var("TERM").unwrap_or_default();

        let mut runner = Self::new()
            .with_env(
                "PATH",
                format!(
                    "{}/bin:/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin",
                    CONTAINER_HOME
                ),
            )
            .with_env("HOME", CONTAINER_HOME)
            .with_env("SHELL", shell)
            .with_env("TERM", term)
            .with_env("TARGET_USER", CONTAINER_USER)
            .with_env("TARGET_UID", uid.to_string())
            .with_env("TARGET_GID", gid.to_string());

        if let Some(ref script) = options.entrypoint_script {
            runner.mounts.push(Mount::bind(
                script.clone(),
                ENTRYPOINT_PATH,
                MountMode::ReadOnly,
            ));
            runner.entrypoint = Some(ENTRYPOINT_PATH.to_string());
        }

        runner.mounts.push(match options.home_volume {
            Some(ref home) => Mount::bind(home.clone(), CONTAINER_HOME, MountMode::ReadWrite),
            None => Mount::anonymous(CONTAINER_HOME),
        });

        if options.allow_sudo {
            runner = runner.with_env("ALLOW_SUDO", "1");
        }

        runner.forward_ssh_agent = options.forward_ssh_agent;
        runner
    }

    pub fn with_entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Copy of this runner with extra mounts; `self` is left untouched
    pub fn with_mounts(&self, mounts: impl IntoIterator<Item = Mount>) -> Self {
        let mut runner = self.clone();
        runner.mounts.extend(mounts);
        runner
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn entrypoint(&self) -> Option<&str> {
        self.entrypoint.as_deref()
    }

    /// Describe one container invocation
    pub fn spec(
        &self,
        image: &str,
        command: &[String],
        workdir: Option<&str>,
        auto_remove: bool,
    ) -> ContainerSpec {
        let mut mounts = self.mounts.clone();
        let mut env = self.env.clone();

        if self.forward_ssh_agent {
            if let Some(sock) = std::env::var_os("SSH_AUTH_SOCK").map(PathBuf::from) {
                if sock.exists() {
                    mounts.push(Mount::bind(sock, SSH_AUTH_SOCK_PATH, MountMode::ReadWrite));
                    env.push(("SSH_AUTH_SOCK".to_string(), SSH_AUTH_SOCK_PATH.to_string()));
                }
            }
        }

        ContainerSpec {
            image: image.to_string(),
            command: command.to_vec(),
            mounts,
            env,
            workdir: Some(workdir.unwrap_or("/").to_string()),
            entrypoint: self.entrypoint.clone(),
            tty: stdin_is_tty(),
            auto_remove,
        }
    }

    /// Run `command` in a throwaway container; a non-zero exit is an error
    pub async fn run(
        &self,
        runtime: &dyn ContainerRuntime,
        image: &str,
        command: &[String],
        workdir: Option<&str>,
    ) -> DockenvResult<()> {
        let spec = self.spec(image, command, workdir, true);
        let outcome = runtime.run(&spec).await?;

        if outcome.success() {
            Ok(())
        } else {
            Err(DockenvError::ContainerCommand {
                command: command.join(" "),
                code: outcome.exit_code,
            })
        }
    }

    /// Run `command` and commit the resulting container to a new image.
    ///
    /// The container is always removed before returning. Failing to remove
    /// it after a successful commit only logs; failing to remove it after a
    /// failed commit is reported as a leak.
    pub async fn snapshot(
        &self,
        runtime: &dyn ContainerRuntime,
        image: &str,
        command: &[String],
        workdir: Option<&str>,
    ) -> DockenvResult<String> {
        let spec = self.spec(image, command, workdir, false);
        let outcome = runtime.run(&spec).await?;
        let command_str = command.join(" ");

        let container_id = match outcome.container_id {
            Some(ref id) => id.clone(),
            None if !outcome.success() => {
                return Err(DockenvError::ContainerCommand {
                    command: command_str,
                    code: outcome.exit_code,
                })
            }
            None => return Err(DockenvError::ContainerIdMissing(command_str)),
        };

        if !outcome.success() {
            if let Err(e) = runtime.remove_container(&container_id).await {
                warn!("Failed to remove container {}: {}", container_id, e);
            }
            return Err(DockenvError::ContainerCommand {
                command: command_str,
                code: outcome.exit_code,
            });
        }

        match runtime.commit(&container_id).await {
            Ok(new_image) => {
                if let Err(e) = runtime.remove_container(&container_id).await {
                    warn!("Failed to remove container {} after commit: {}", container_id, e);
                }
                info!("Committed {} -> {}", command_str, new_image);
                Ok(new_image)
            }
            Err(commit_err) => match runtime.remove_container(&container_id).await {
                Ok(()) => {
                    debug!("Removed container {} after failed commit", container_id);
                    Err(commit_err)
                }
                Err(rm_err) => Err(DockenvError::ContainerLeak {
                    container_id,
                    commit_error: commit_err.to_string(),
                    reason: rm_err.to_string(),
                }),
            },
        }
    }
}

/// Whether to attach a terminal; never fails
fn stdin_is_tty() -> bool {
    std::io::stdin().is_terminal()
}

#[cfg(unix)]
fn host_ids() -> (u32, u32) {
    // SAFETY: getuid/getgid take no arguments and cannot fail
    unsafe { (libc::getuid(), libc::getgid()) }
}

#[cfg(not(unix))]
fn host_ids() -> (u32, u32) {
    (1000, 1000)
}

/// Mount `dir` at the same path inside the container
pub fn same_path_mount(dir: &Path, mode: MountMode) -> Mount {
    Mount::bind(dir.to_path_buf(), dir.to_string_lossy().into_owned(), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRuntime;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn env_value<'a>(spec: &'a ContainerSpec, key: &str) -> Option<&'a str> {
        spec.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn with_mounts_leaves_original_untouched() {
        let base = Runner::new().with_entrypoint("/bin/sh");
        let extended = base.with_mounts([Mount::anonymous("/data")]);

        assert!(base.mounts().is_empty());
        assert_eq!(extended.mounts().len(), 1);
        assert_eq!(extended.entrypoint(), Some("/bin/sh"));
    }

    #[test]
    fn host_user_configuration() {
        let runner = Runner::host_user(&HostUserOptions {
            entrypoint_script: Some(PathBuf::from("/opt/dockenv/hostuser.sh")),
            home_volume: None,
            allow_sudo: true,
            forward_ssh_agent: false,
        });
        let spec = runner.spec("base:1", &cmd(&["bash"]), None, true);

        assert_eq!(spec.entrypoint.as_deref(), Some(ENTRYPOINT_PATH));
        assert_eq!(env_value(&spec, "HOME"), Some(CONTAINER_HOME));
        assert_eq!(env_value(&spec, "TARGET_USER"), Some(CONTAINER_USER));
        assert_eq!(env_value(&spec, "ALLOW_SUDO"), Some("1"));
        assert!(env_value(&spec, "TARGET_UID").is_some());
        assert!(spec
            .mounts
            .contains(&Mount::bind("/opt/dockenv/hostuser.sh", ENTRYPOINT_PATH, MountMode::ReadOnly)));
        assert!(spec.mounts.contains(&Mount::anonymous(CONTAINER_HOME)));
        assert_eq!(spec.workdir.as_deref(), Some("/"));
    }

    #[test]
    fn host_user_without_sudo_and_with_home() {
        let runner = Runner::host_user(&HostUserOptions {
            home_volume: Some(PathBuf::from("/srv/home")),
            ..Default::default()
        });
        let spec = runner.spec("base:1", &cmd(&["bash"]), Some("/src"), true);

        assert_eq!(env_value(&spec, "ALLOW_SUDO"), None);
        assert_eq!(spec.entrypoint, None);
        assert!(spec
            .mounts
            .contains(&Mount::bind("/srv/home", CONTAINER_HOME, MountMode::ReadWrite)));
        assert_eq!(spec.workdir.as_deref(), Some("/src"));
    }

    #[tokio::test]
    async fn run_auto_removes_and_propagates_failure() {
        let runtime = FakeRuntime::new().failing_arg("boom");
        let runner = Runner::new();

        runner
            .run(&runtime, "base:1", &cmd(&["true"]), None)
            .await
            .unwrap();
        let err = runner
            .run(&runtime, "base:1", &cmd(&["boom"]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DockenvError::ContainerCommand { code: 1, .. }));
        assert!(runtime.runs().iter().all(|spec| spec.auto_remove));
        assert_eq!(runtime.commit_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_commits_and_removes_container() {
        let runtime = FakeRuntime::new();
        let image = Runner::new()
            .snapshot(&runtime, "base:1", &cmd(&["./install.sh"]), None)
            .await
            .unwrap();

        assert_eq!(image, "img1");
        assert!(!runtime.runs()[0].auto_remove);
        assert_eq!(runtime.removed_containers(), vec!["ctr1"]);
    }

    #[tokio::test]
    async fn snapshot_failed_command_removes_container_without_commit() {
        let runtime = FakeRuntime::new().failing_arg("./install.sh");
        let err = Runner::new()
            .snapshot(&runtime, "base:1", &cmd(&["./install.sh"]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DockenvError::ContainerCommand { .. }));
        assert_eq!(runtime.commit_count(), 0);
        assert_eq!(runtime.removed_containers(), vec!["ctr1"]);
    }

    #[tokio::test]
    async fn snapshot_tolerates_removal_failure_after_commit() {
        let runtime = FakeRuntime::new().failing_container_removal();
        let image = Runner::new()
            .snapshot(&runtime, "base:1", &cmd(&["true"]), None)
            .await
            .unwrap();
        assert_eq!(image, "img1");
    }

    #[tokio::test]
    async fn snapshot_reports_commit_failure() {
        let runtime = FakeRuntime::new().failing_commit();
        let err = Runner::new()
            .snapshot(&runtime, "base:1", &cmd(&["true"]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, DockenvError::ImageCommit { .. }));
        assert_eq!(runtime.removed_containers(), vec!["ctr1"]);
    }

    #[tokio::test]
    async fn snapshot_reports_leak_when_commit_and_removal_fail() {
        let runtime = FakeRuntime::new()
            .failing_commit()
            .failing_container_removal();
        let err = Runner::new()
            .snapshot(&runtime, "base:1", &cmd(&["true"]), None)
            .await
            .unwrap_err();

        match err {
            DockenvError::ContainerLeak { container_id, .. } => assert_eq!(container_id, "ctr1"),
            other => panic!("expected ContainerLeak, got {other:?}"),
        }
    }

    #[test]
    fn same_path_mount_keeps_path() {
        let mount = same_path_mount(Path::new("/work/src"), MountMode::ReadWrite);
        assert_eq!(mount.volume_arg(), "/work/src:/work/src:rw");
    }
}
