//! Locating and starting the workbench executable.
//!
//! Installations advertise themselves through `AWP_ROOT<code>` environment
//! variables, where `<code>` is the three-digit release code (`AWP_ROOT222`
//! for 2022 R2). The executable lives under `Framework/bin/<platform>`.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;

use regex::Regex;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::client::error::{BridgeError, BridgeResult};

/// Prefix of the environment variables pointing at installations.
pub const INSTALL_ENV_PREFIX: &str = "AWP_ROOT";

/// Ports below this are treated as taken when searching for a free one.
pub const FIRST_USABLE_PORT: u16 = 1030;

#[cfg(windows)]
const PLATFORM_DIR: &str = "Win64";
#[cfg(not(windows))]
const PLATFORM_DIR: &str = "Linux64";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "RunWB2.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "runwb2";

/// Three-digit release code derived from a release string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCode(String);

impl VersionCode {
    /// Parses a release such as `"2022.2"` into its code (`"222"`).
    ///
    /// Releases before 2020 used a different numbering: R1 and R2 moved the
    /// major number up by one, R3 became release 5.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::InvalidVersion`] if the string is not
    /// `YYYY.R`.
    pub fn parse(release: &str) -> BridgeResult<Self> {
        let invalid = || BridgeError::InvalidVersion {
            version: release.to_string(),
        };

        let (year, rel) = release.trim().split_once('.').ok_or_else(invalid)?;
        if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let mut major: u32 = year[2..].parse().map_err(|_| invalid())?;
        let mut minor: u32 = rel.parse().map_err(|_| invalid())?;

        if major < 20 {
            if minor < 3 {
                major += 1;
            } else {
                minor += 2;
            }
        }

        Ok(Self(format!("{major}{minor}")))
    }

    /// The code itself, e.g. `"222"`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the environment variable for this release.
    #[must_use]
    pub fn env_var(&self) -> String {
        format!("{INSTALL_ENV_PREFIX}{}", self.0)
    }
}

fn install_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // literal pattern, checked by tests
        Regex::new(r"^AWP_ROOT(\d+)$").unwrap()
    })
}

/// Picks an installation root from a set of environment variables.
///
/// With a version, only that release's variable is considered. Without
/// one, the highest release present wins.
///
/// # Errors
///
/// Returns [`BridgeError::InstallNotFound`] if no matching variable exists.
pub fn select_install_root<I>(vars: I, version: Option<&VersionCode>) -> BridgeResult<PathBuf>
where
    I: IntoIterator<Item = (String, String)>,
{
    let pattern = install_var_pattern();
    let mut best: Option<(u32, String)> = None;

    for (name, value) in vars {
        if let Some(wanted) = version {
            if name == wanted.env_var() {
                return Ok(PathBuf::from(value));
            }
            continue;
        }
        let Some(code) = pattern
            .captures(&name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        if best.as_ref().map_or(true, |(b, _)| code > *b) {
            best = Some((code, value));
        }
    }

    best.map(|(_, value)| PathBuf::from(value)).ok_or_else(|| {
        BridgeError::install_not_found(version.map_or_else(
            || format!("no {INSTALL_ENV_PREFIX}<nnn> variable is set"),
            |v| format!("{} is not set", v.env_var()),
        ))
    })
}

/// Resolves the installation root from config or the process environment.
///
/// # Errors
///
/// Returns an error if no installation can be found.
pub fn find_install_root(
    explicit: Option<&Path>,
    version: Option<&VersionCode>,
) -> BridgeResult<PathBuf> {
    if let Some(root) = explicit {
        return Ok(root.to_path_buf());
    }
    select_install_root(std::env::vars(), version)
}

/// Path of the workbench executable inside an installation root.
#[must_use]
pub fn executable_path(install_root: &Path) -> PathBuf {
    install_root
        .join("Framework")
        .join("bin")
        .join(PLATFORM_DIR)
        .join(EXECUTABLE_NAME)
}

/// Command-line options for server mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Host the scripting server binds.
    pub host: String,
    /// Port the scripting server listens on.
    pub port: u16,
    /// Run without a window, in batch mode.
    pub non_graphical: bool,
}

impl LaunchOptions {
    /// Arguments passed to the executable.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-P".to_string(),
            self.port.to_string(),
            "-H".to_string(),
            self.host.clone(),
        ];
        if self.non_graphical {
            args.push("-nowindow".to_string());
            args.push("-B".to_string());
        }
        args
    }
}

/// Spawns the workbench in server mode.
///
/// # Errors
///
/// Returns [`BridgeError::Launch`] if the process cannot be started.
pub fn spawn(executable: &Path, options: &LaunchOptions) -> BridgeResult<Child> {
    debug!(
        executable = %executable.display(),
        host = %options.host,
        port = options.port,
        "Starting workbench with a listening server"
    );
    Command::new(executable)
        .args(options.args())
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| BridgeError::Launch {
            executable: executable.to_path_buf(),
            source,
        })
}

/// Finds a port in `start..=stop` that can currently be bound locally.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidPortRange`] if `start >= stop`.
pub fn find_free_port(start: u16, stop: u16) -> BridgeResult<Option<u16>> {
    if start >= stop {
        return Err(BridgeError::InvalidPortRange { start, stop });
    }
    Ok((start.max(FIRST_USABLE_PORT)..=stop).find(|&port| port_is_free(port)))
}

fn port_is_free(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn version_codes() {
        assert_eq!(VersionCode::parse("2022.2").unwrap().as_str(), "222");
        assert_eq!(VersionCode::parse("2023.1").unwrap().as_str(), "231");
        assert_eq!(VersionCode::parse("2019.1").unwrap().as_str(), "201");
        assert_eq!(VersionCode::parse("2019.3").unwrap().as_str(), "195");
        assert_eq!(VersionCode::parse("2022.2").unwrap().env_var(), "AWP_ROOT222");
    }

    #[test]
    fn bad_versions() {
        assert!(VersionCode::parse("22.2").is_err());
        assert!(VersionCode::parse("2022").is_err());
        assert!(VersionCode::parse("2022.R2").is_err());
    }

    #[test]
    fn picks_requested_release() {
        let version = VersionCode::parse("2021.2").unwrap();
        let env = vars(&[("AWP_ROOT222", "/opt/v222"), ("AWP_ROOT212", "/opt/v212")]);
        assert_eq!(
            select_install_root(env, Some(&version)).unwrap(),
            PathBuf::from("/opt/v212")
        );
    }

    #[test]
    fn picks_newest_without_version() {
        let env = vars(&[
            ("AWP_ROOT212", "/opt/v212"),
            ("PATH", "/usr/bin"),
            ("AWP_ROOT231", "/opt/v231"),
            ("AWP_ROOT_EXTRA", "/nope"),
        ]);
        assert_eq!(
            select_install_root(env, None).unwrap(),
            PathBuf::from("/opt/v231")
        );
    }

    #[test]
    fn missing_release_is_reported() {
        let version = VersionCode::parse("2024.1").unwrap();
        let err = select_install_root(vars(&[("AWP_ROOT222", "/x")]), Some(&version)).unwrap_err();
        assert!(err.to_string().contains("AWP_ROOT241"));
    }

    #[test]
    fn explicit_root_wins() {
        let root = find_install_root(Some(Path::new("/custom")), None).unwrap();
        assert_eq!(root, PathBuf::from("/custom"));
    }

    #[test]
    fn executable_lives_under_framework() {
        let exe = executable_path(Path::new("/opt/v222"));
        assert!(exe.starts_with("/opt/v222/Framework/bin"));
        assert_eq!(exe.file_name().unwrap(), EXECUTABLE_NAME);
    }

    #[test]
    fn launch_arguments() {
        let mut options = LaunchOptions {
            host: "localhost".to_string(),
            port: 40001,
            non_graphical: false,
        };
        assert_eq!(options.args(), ["-P", "40001", "-H", "localhost"]);

        options.non_graphical = true;
        assert_eq!(
            options.args(),
            ["-P", "40001", "-H", "localhost", "-nowindow", "-B"]
        );
    }

    #[test]
    fn free_port_range_checks() {
        assert!(find_free_port(50000, 40000).is_err());
        assert!(find_free_port(40000, 40000).is_err());

        let port = find_free_port(40001, 50000).unwrap();
        assert!(port.is_some_and(|p| (40001..=50000).contains(&p)));
    }

    #[test]
    fn reserved_ports_are_skipped() {
        if let Some(port) = find_free_port(1, 2000).unwrap() {
            assert!(port >= FIRST_USABLE_PORT);
        }
    }

    #[tokio::test]
    async fn spawn_missing_executable_fails() {
        let options = LaunchOptions {
            host: "localhost".to_string(),
            port: 40001,
            non_graphical: true,
        };
        let err = spawn(Path::new("/definitely/not/runwb2"), &options).unwrap_err();
        assert!(matches!(err, BridgeError::Launch { .. }));
    }
}
