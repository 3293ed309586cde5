//! Client for the workbench scripting server.
//!
//! The workbench, when started in server mode, runs an embedded interpreter
//! that listens on a TCP port for plaintext statements. This module owns
//! everything needed to reach it:
//!
//! - [`protocol`]: end marker, success token, query helpers
//! - [`transport`]: one connection per call
//! - [`health`]: readiness polling after launch
//! - [`launcher`]: finding and spawning the executable
//!
//! [`WorkbenchClient`] ties them together behind the operations callers
//! actually use.

pub mod error;
pub mod health;
pub mod launcher;
pub mod protocol;
pub mod transport;

pub use error::{BridgeError, BridgeResult};
pub use health::{HealthPolicy, HealthState};
pub use protocol::Reply;
pub use transport::TcpTransport;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Child;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::client::launcher::{LaunchOptions, VersionCode};
use crate::client::protocol::{parse_query_reply, query_command, EXIT_COMMAND};
use crate::config::Config;

/// Where to find the workbench executable.
#[derive(Debug, Clone, Default)]
pub struct InstallSelector {
    /// Explicit installation root.
    pub root: Option<PathBuf>,
    /// Release used to pick an `AWP_ROOT` variable.
    pub version: Option<VersionCode>,
}

/// Client for one workbench scripting server.
#[derive(Debug)]
pub struct WorkbenchClient {
    /// Transport to the scripting port.
    transport: TcpTransport,
    /// Launch without a window.
    non_graphical: bool,
    /// Installation lookup for [`WorkbenchClient::launch_in_server_mode`].
    install: InstallSelector,
    /// Readiness polling policy.
    health: HealthPolicy,
    /// Wait between spawning and the first probe.
    startup_delay: Duration,
    /// Wait after `Exit` before killing a launched process.
    exit_grace: Duration,
    /// Process started by this client, if any.
    child: Option<Child>,
    /// Pid of the process started by this client.
    pid: Option<u32>,
}

impl WorkbenchClient {
    /// Creates a client for `host:port` with default timings.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            transport: TcpTransport::new(host, port),
            non_graphical: true,
            install: InstallSelector::default(),
            health: HealthPolicy::default(),
            startup_delay: Duration::from_secs(2),
            exit_grace: Duration::from_secs(10),
            child: None,
            pid: None,
        }
    }

    /// Creates a client from a loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidVersion`] if the configured release
    /// cannot be parsed.
    pub fn from_config(config: &Config) -> BridgeResult<Self> {
        let version = config
            .launch
            .version
            .as_deref()
            .map(VersionCode::parse)
            .transpose()?;

        let transport = TcpTransport::new(config.server.host.clone(), config.server.port)
            .with_connect_timeout(config.server.connect_timeout())
            .with_reply_timeout(config.server.reply_timeout());

        Ok(Self {
            transport,
            non_graphical: config.launch.non_graphical,
            install: InstallSelector {
                root: config.launch.install_root.clone(),
                version,
            },
            health: HealthPolicy::from(&config.launch),
            startup_delay: Duration::from_millis(config.launch.startup_delay_ms),
            exit_grace: Duration::from_millis(config.launch.exit_grace_ms),
            child: None,
            pid: None,
        })
    }

    /// Replaces the transport, e.g. to move to another port.
    #[must_use]
    pub fn with_transport(mut self, transport: TcpTransport) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the readiness polling policy.
    #[must_use]
    pub fn with_health_policy(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    /// Sets the wait after `Exit` before a launched process is killed.
    #[must_use]
    pub fn with_exit_grace(mut self, exit_grace: Duration) -> Self {
        self.exit_grace = exit_grace;
        self
    }

    /// Sets the wait between spawning the workbench and the first probe.
    #[must_use]
    pub fn with_startup_delay(mut self, startup_delay: Duration) -> Self {
        self.startup_delay = startup_delay;
        self
    }

    /// Sets how the executable is located.
    #[must_use]
    pub fn with_install(mut self, install: InstallSelector) -> Self {
        self.install = install;
        self
    }

    /// Transport used by this client.
    #[must_use]
    pub const fn transport(&self) -> &TcpTransport {
        &self.transport
    }

    /// Pid of the workbench process launched by this client.
    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Starts the workbench in server mode and waits until it answers.
    ///
    /// Returns the pid of the new process.
    ///
    /// # Errors
    ///
    /// Returns an error if no installation is found, the executable cannot
    /// be spawned, or the server does not become ready within the health
    /// timeout (the process is killed in that case).
    pub async fn launch_in_server_mode(&mut self) -> BridgeResult<u32> {
        let root = launcher::find_install_root(
            self.install.root.as_deref(),
            self.install.version.as_ref(),
        )?;
        let executable = launcher::executable_path(&root);
        let options = LaunchOptions {
            host: self.transport.host().to_string(),
            port: self.transport.port(),
            non_graphical: self.non_graphical,
        };

        let mut child = launcher::spawn(&executable, &options)?;
        sleep(self.startup_delay).await;

        if !self.wait_for_healthy_connection().await {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop unresponsive workbench");
            }
            return Err(BridgeError::LaunchFailed {
                address: self.transport.address(),
            });
        }

        let pid = launched_pid(&child, self.transport.address())?;
        debug!(address = %self.transport.address(), pid, "Workbench server started");
        self.pid = Some(pid);
        self.child = Some(child);
        Ok(pid)
    }

    /// Polls the server until it answers the probe or the policy times out.
    pub async fn wait_for_healthy_connection(&self) -> bool {
        health::wait_until_ready(&self.transport, &self.health)
            .await
            .is_ready()
    }

    /// Sends one statement and returns the classified reply.
    ///
    /// A failed reply is logged but is not an error; only connection and
    /// socket failures are.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or the exchange
    /// fails.
    pub async fn send_statement(&self, statement: &str) -> BridgeResult<Reply> {
        let raw = self.transport.exchange(statement).await.map_err(|e| {
            error!(error = %e, statement, "Error while executing statement");
            e
        })?;

        let reply = Reply::classify(&raw);
        if reply.is_ok() {
            debug!("Successful transmission");
        } else {
            debug!(statement, "Error transmitting command");
            error!(reply = %reply, statement, "Transmission failed, check server reply for details");
        }
        Ok(reply)
    }

    /// Reads a variable from the remote interpreter.
    ///
    /// Returns `None` if the server does not know the variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached.
    pub async fn get_variable_value(&self, name: &str) -> BridgeResult<Option<String>> {
        info!(address = %self.transport.address(), "Querying workbench variable");
        let raw = self
            .transport
            .exchange(&query_command(name))
            .await
            .map_err(|e| {
                error!(error = %e, variable = name, "Error connecting to server, try again later");
                e
            })?;
        info!(reply = %raw, "Reply from server");
        Ok(parse_query_reply(name, &raw))
    }

    /// Sends a script file line by line on one connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the server cannot be
    /// reached, or the server does not reply with the success token.
    pub async fn send_script_file(&self, path: &Path) -> BridgeResult<()> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| BridgeError::script_read(path, e))?;

        debug!(
            address = %self.transport.address(),
            script = %path.display(),
            "Connected to server, sending file"
        );
        let raw = self
            .transport
            .exchange_parts(contents.split_inclusive('\n'))
            .await?;
        debug!(reply = %raw, "Reply from server");

        match Reply::classify(&raw) {
            Reply::Ok => {
                debug!("Successful transmission");
                Ok(())
            }
            Reply::Failed(reply) => Err(BridgeError::transmission_failed(reply)),
        }
    }

    /// Asks the workbench to exit.
    ///
    /// If this client launched the process, it gets the grace period to
    /// exit on its own and is killed afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the exit command cannot be delivered.
    pub async fn close_workbench(&mut self) -> BridgeResult<()> {
        debug!(address = %self.transport.address(), "Sending Exit to workbench");
        if let Err(e) = self.transport.send_only(EXIT_COMMAND).await {
            self.kill_launched().await;
            return Err(e);
        }
        info!("Sent Exit to workbench");

        sleep(self.exit_grace).await;

        if let Some(mut child) = self.child.take() {
            match child.try_wait() {
                Ok(Some(status)) => debug!(%status, "Workbench exited"),
                Ok(None) => {
                    warn!(pid = ?self.pid, "Workbench still running after exit grace, killing it");
                    if let Err(e) = child.kill().await {
                        warn!(error = %e, "Failed to kill workbench");
                    }
                }
                Err(e) => warn!(error = %e, "Could not query workbench process"),
            }
        }
        self.pid = None;
        Ok(())
    }

    /// Kills the process this client launched, if any.
    async fn kill_launched(&mut self) {
        if let Some(mut child) = self.child.take() {
            warn!(pid = ?self.pid, "Exit could not be delivered, killing workbench");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill workbench");
            }
        }
        self.pid = None;
    }
}

/// Pid of a freshly launched workbench. A child that was already reaped has
/// none, which means the launch did not leave a server behind.
fn launched_pid(child: &Child, address: String) -> BridgeResult<u32> {
    child.id().ok_or_else(|| {
        error!(address = %address, "Workbench process exited right after launch");
        BridgeError::LaunchFailed { address }
    })
}
