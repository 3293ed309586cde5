//! wb-bridge: command-line client for a workbench scripting server
//!
//! Launches the workbench in server mode, checks that it answers, and sends
//! statements, script files and property changes to it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use wb_bridge::client::launcher::find_free_port;
use wb_bridge::client::{BridgeResult, TcpTransport, WorkbenchClient};
use wb_bridge::config::{self, Config};
use wb_bridge::property::{ParameterMirror, RemoteEditor, DEFAULT_EDITOR_VAR};

/// Command-line client for a workbench scripting server.
///
/// Statements are sent as plain text terminated by `<EOF>`; the server
/// answers `<OK>` when it ran them without error.
#[derive(Parser, Debug)]
#[command(name = "wb-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override the configured scripting port
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the workbench in server mode and wait until it answers
    Launch,
    /// Check whether the scripting server answers
    Probe,
    /// Send one statement
    Send {
        /// Statement to run, e.g. `Refresh()`
        statement: String,
    },
    /// Send a script file line by line
    SendFile {
        /// Script to send
        path: PathBuf,
    },
    /// Read a variable from the remote interpreter
    Query {
        /// Variable name
        name: String,
    },
    /// Ask the workbench to exit
    Close,
    /// Change one parameter of a component in the design tool
    SetParameter {
        /// Component owning the parameter
        component: String,
        /// Parameter name
        name: String,
        /// New value, e.g. `12mm`
        value: String,
        /// Name of the editor object in the remote interpreter
        #[arg(long, default_value = DEFAULT_EDITOR_VAR)]
        editor: String,
    },
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN,
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Picks the scripting port: the CLI override, a free port from the
/// configured range when launching, or the configured port.
fn select_port(cfg: &Config, override_port: Option<u16>, launching: bool) -> BridgeResult<u16> {
    if let Some(port) = override_port {
        return Ok(port);
    }
    if launching {
        if let Some([start, stop]) = cfg.launch.port_range {
            if let Some(port) = find_free_port(start, stop)? {
                info!(port, "Using free port from configured range");
                return Ok(port);
            }
        }
    }
    Ok(cfg.server.port)
}

fn build_client(cfg: &Config, port: u16) -> BridgeResult<WorkbenchClient> {
    let transport = TcpTransport::new(cfg.server.host.clone(), port)
        .with_connect_timeout(cfg.server.connect_timeout())
        .with_reply_timeout(cfg.server.reply_timeout());
    Ok(WorkbenchClient::from_config(cfg)?.with_transport(transport))
}

async fn run(cfg: &Config, args: Args) -> BridgeResult<bool> {
    let launching = matches!(args.command, Command::Launch);
    let port = select_port(cfg, args.port, launching)?;
    let mut client = build_client(cfg, port)?;

    match args.command {
        Command::Launch => {
            let pid = client.launch_in_server_mode().await?;
            println!("{pid} {port}");
            Ok(true)
        }
        Command::Probe => {
            let ready = client.wait_for_healthy_connection().await;
            println!("{}", if ready { "ready" } else { "unreachable" });
            Ok(ready)
        }
        Command::Send { statement } => {
            let reply = client.send_statement(&statement).await?;
            println!("{reply}");
            Ok(reply.is_ok())
        }
        Command::SendFile { path } => {
            client.send_script_file(&path).await?;
            Ok(true)
        }
        Command::Query { name } => match client.get_variable_value(&name).await? {
            Some(value) => {
                println!("{value}");
                Ok(true)
            }
            None => {
                error!(variable = %name, "Variable not known to the server");
                Ok(false)
            }
        },
        Command::Close => {
            client.close_workbench().await?;
            Ok(true)
        }
        Command::SetParameter {
            component,
            name,
            value,
            editor,
        } => {
            let editor = RemoteEditor::with_var(&client, &editor);
            let mut params =
                ParameterMirror::new(editor, component, std::iter::empty::<(String, String)>());
            Ok(params.set(&name, value).await)
        }
    }
}

/// Entry point for the wb-bridge client.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nExpected config at: {}", default_path.display());
                    eprintln!("Create one based on config/example-config.json");
                }
            }
            return ExitCode::FAILURE;
        }
    };

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    // Display GPL license notice (required by GPLv3 Section 5d)
    eprintln!(
        "wb-bridge {}  Copyright (C) 2026  The Embedded Society",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("This program comes with ABSOLUTELY NO WARRANTY.");
    eprintln!("This is free software, licensed under GPL-3.0-or-later.");
    eprintln!();

    info!(version = env!("CARGO_PKG_VERSION"), command = ?args.command, "Starting wb-bridge");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cfg, args)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn log_level_selection() {
        assert_eq!(get_log_level(0, true, "trace"), Level::ERROR);
        assert_eq!(get_log_level(0, false, "DEBUG"), Level::DEBUG);
        assert_eq!(get_log_level(0, false, "bogus"), Level::WARN);
        assert_eq!(get_log_level(2, false, "warn"), Level::DEBUG);
    }

    #[test]
    fn port_override_wins() {
        let cfg = Config::default();
        assert_eq!(select_port(&cfg, Some(9000), true).unwrap(), 9000);
        assert_eq!(select_port(&cfg, None, false).unwrap(), 8001);
    }

    #[test]
    fn parses_set_parameter() {
        let args = Args::try_parse_from([
            "wb-bridge",
            "set-parameter",
            "Antenna1",
            "length",
            "12mm",
        ])
        .unwrap();
        match args.command {
            Command::SetParameter {
                component, editor, ..
            } => {
                assert_eq!(component, "Antenna1");
                assert_eq!(editor, "oEditor");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
