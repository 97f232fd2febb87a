//! Preview server build, supervision, and shutdown.
//!
//! The crawl needs a rendering oracle: an HTTP server serving the frontend
//! exactly as production would. In managed mode that means running the
//! frontend's build command to completion, spawning its preview server in
//! its own process group, and polling until it answers HTTP. In external
//! mode a server someone else runs is verified reachable and otherwise left
//! alone.
//!
//! Shutdown is an explicit [`PreviewHandle::shutdown`] call owned by the
//! orchestrator, not an ambient exit hook: the handle is the only thing
//! that knows whether a child exists and how to take its whole process
//! group down.

use std::process::Stdio;
use std::time::Duration;

use reqwest::Client;
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::config::PreviewConfig;
use crate::error::{Error, Result};

/// Delay between readiness polls.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Per-request timeout while polling for readiness.
const POLL_TIMEOUT: Duration = Duration::from_secs(2);

/// How long an external server gets to prove it is reachable.
const EXTERNAL_READY_DEADLINE: Duration = Duration::from_secs(10);

/// Grace period between SIGTERM and SIGKILL on shutdown.
#[cfg(unix)]
const TERM_GRACE: Duration = Duration::from_secs(5);

/// A running preview server the crawler can fetch from.
///
/// [`shutdown`](Self::shutdown) is the orderly path: SIGTERM to the group,
/// a grace period, then SIGKILL. Dropping the handle (or a cancelled
/// `start`) without it still takes the whole process group down through a
/// drop guard, so an interrupted run never orphans the server; `npm
/// run`-style commands wrap the real server in children the direct-child
/// `kill_on_drop` alone would miss.
pub struct PreviewHandle {
    base_url: String,
    child: Option<Child>,
    #[cfg(unix)]
    guard: Option<GroupKillGuard>,
}

/// Last-resort teardown for the spawned process group.
///
/// Fires on drop so a cancelled start, a panic, or a signal-raced exit
/// still kills the group; an orderly shutdown disarms it first.
#[cfg(unix)]
struct GroupKillGuard {
    pgid: nix::unistd::Pid,
    armed: bool,
}

#[cfg(unix)]
impl GroupKillGuard {
    #[allow(clippy::cast_possible_wrap)]
    fn new(pid: u32) -> Self {
        Self {
            pgid: nix::unistd::Pid::from_raw(pid as i32),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

#[cfg(unix)]
impl Drop for GroupKillGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = nix::sys::signal::killpg(self.pgid, nix::sys::signal::Signal::SIGKILL);
        }
    }
}

impl PreviewHandle {
    /// Build (if managed) and start the preview server, returning once it
    /// answers HTTP.
    ///
    /// # Errors
    ///
    /// - [`Error::PreviewBuild`] when the build command exits non-zero
    /// - [`Error::PreviewUnready`] when the server exits early or the
    ///   readiness deadline elapses; any spawned child is killed first
    pub async fn start(config: &PreviewConfig) -> Result<Self> {
        match config {
            PreviewConfig::External { base_url } => {
                let base_url = base_url.trim_end_matches('/').to_string();
                wait_until_ready(&base_url, EXTERNAL_READY_DEADLINE, None).await?;
                debug!(%base_url, "attached to external preview server");
                Ok(Self {
                    base_url,
                    child: None,
                    #[cfg(unix)]
                    guard: None,
                })
            },
            PreviewConfig::Managed {
                build_command,
                serve_command,
                host,
                port,
                ready_deadline,
            } => {
                run_build(build_command).await?;

                let base_url = format!("http://{host}:{port}");
                info!(command = %serve_command, %base_url, "starting preview server");
                let mut child = spawn_server(serve_command)?;
                #[cfg(unix)]
                let guard = child.id().map(GroupKillGuard::new);

                if let Err(err) =
                    wait_until_ready(&base_url, *ready_deadline, Some(&mut child)).await
                {
                    kill_tree(&mut child).await;
                    #[cfg(unix)]
                    if let Some(guard) = guard {
                        guard.disarm();
                    }
                    return Err(err);
                }
                Ok(Self {
                    base_url,
                    child: Some(child),
                    #[cfg(unix)]
                    guard,
                })
            },
        }
    }

    /// Base URL the crawler resolves sitemap paths against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop a managed server and its process group; no-op for external.
    ///
    /// Sends SIGTERM to the group, waits a grace period, then SIGKILLs
    /// whatever is left.
    pub async fn shutdown(mut self) {
        if let Some(mut child) = self.child.take() {
            info!("stopping preview server");
            kill_tree(&mut child).await;
        }
        #[cfg(unix)]
        if let Some(guard) = self.guard.take() {
            guard.disarm();
        }
    }
}

/// Run the frontend build command to completion.
async fn run_build(build_command: &str) -> Result<()> {
    info!(command = %build_command, "building frontend");
    let output = shell_command(build_command)
        .stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| Error::PreviewBuild(format!("failed to run '{build_command}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(10).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        return Err(Error::PreviewBuild(format!(
            "'{build_command}' exited with {}: {}",
            output.status,
            tail.join("\n")
        )));
    }
    Ok(())
}

fn spawn_server(serve_command: &str) -> Result<Child> {
    let mut command = shell_command(serve_command);
    command
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    command
        .spawn()
        .map_err(|e| Error::PreviewUnready(format!("failed to spawn '{serve_command}': {e}")))
}

fn shell_command(command_line: &str) -> Command {
    #[cfg(unix)]
    {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line);
        command
    }
    #[cfg(not(unix))]
    {
        let mut command = Command::new("cmd");
        command.arg("/C").arg(command_line);
        command
    }
}

/// Poll `base_url` until it answers, the child exits, or the deadline
/// elapses. Ready means a 2xx or 3xx from the root route; an error status
/// would make the crawl render error pages, so it keeps polling.
async fn wait_until_ready(
    base_url: &str,
    deadline: Duration,
    mut child: Option<&mut Child>,
) -> Result<()> {
    // Redirects are not followed so a 3xx from the root is visible as-is.
    let client = Client::builder()
        .timeout(POLL_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(Error::Network)?;
    let started = Instant::now();

    loop {
        if let Some(child) = child.as_deref_mut() {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(Error::PreviewUnready(format!(
                    "server exited with {status} before answering HTTP"
                )));
            }
        }

        match client.get(base_url).send().await {
            Ok(response) if response.status().is_success() || response.status().is_redirection() => {
                debug!(elapsed = ?started.elapsed(), "preview server is answering");
                return Ok(());
            },
            Ok(response) => {
                debug!(status = %response.status(), "preview answering but not healthy yet");
            },
            Err(e) => debug!(error = %e, "preview not answering yet"),
        }

        if started.elapsed() >= deadline {
            return Err(Error::PreviewUnready(format!(
                "'{base_url}' did not answer within {}s",
                deadline.as_secs()
            )));
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Terminate a managed child and everything it spawned.
#[cfg(unix)]
async fn kill_tree(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;
    use tokio::time::timeout;

    let Some(pid) = child.id() else {
        return;
    };
    #[allow(clippy::cast_possible_wrap)]
    let pgid = Pid::from_raw(pid as i32);

    if let Err(e) = killpg(pgid, Signal::SIGTERM) {
        warn!(error = %e, "SIGTERM to preview process group failed");
    }
    if timeout(TERM_GRACE, child.wait()).await.is_err() {
        warn!("preview server ignored SIGTERM; sending SIGKILL");
        let _ = killpg(pgid, Signal::SIGKILL);
        let _ = child.wait().await;
    }
}

#[cfg(not(unix))]
async fn kill_tree(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to kill preview server");
    }
    let _ = child.wait().await;
}
