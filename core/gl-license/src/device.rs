//! Device fingerprinting for license binding.
//!
//! Produces the `HWID-xxxxxxxx-xxxxxxxx-xxxxxxxx-xxxxxxxx` identifier a
//! client machine presents when it activates. The engine treats device
//! identifiers as opaque; this module is only the reference producer.

use std::env;

use chrono::{DateTime, Utc};
use gl_types::DeviceId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const UNKNOWN: &str = "unknown";

/// Descriptive facts about the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub os_name: String,
    pub os_version: String,
    pub hostname: String,
    pub arch: String,
}

impl DeviceInfo {
    /// Reads the facts for the machine this process runs on.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            os_version: os_version().unwrap_or_else(|| UNKNOWN.to_string()),
            hostname: local_hostname(),
            arch: env::consts::ARCH.to_string(),
        }
    }

    /// Label stored as a binding's `device_name`, e.g. `rig (linux 24.04, x86_64)`.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{} ({} {}, {})", self.hostname, self.os_name, self.os_version, self.arch)
    }
}

/// A device identifier derived from hardware data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    id: DeviceId,
    generated_at: DateTime<Utc>,
}

impl DeviceFingerprint {
    /// Fingerprints this machine.
    ///
    /// Different salts give unrelated identifiers for the same machine.
    #[must_use]
    pub fn generate(salt: &str) -> Self {
        Self::from_components(&hardware_components(), salt)
    }

    /// Fingerprints an explicit component list.
    #[must_use]
    pub fn from_components(components: &[String], salt: &str) -> Self {
        let digest = Sha256::new()
            .chain_update(components.join("|"))
            .chain_update(salt)
            .finalize();
        let hex = hex::encode(&digest[..16]);
        let groups: Vec<&str> = (0..4).map(|i| &hex[i * 8..(i + 1) * 8]).collect();

        Self {
            id: DeviceId::hardware(&groups),
            generated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    #[must_use]
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// True if fingerprinting this machine again gives the same identifier.
    #[must_use]
    pub fn matches_current(&self, salt: &str) -> bool {
        Self::generate(salt).id == self.id
    }
}

/// OS, architecture, hostname and, where the platform has one, its machine id.
fn hardware_components() -> Vec<String> {
    let mut components = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        local_hostname(),
    ];
    components.extend(machine_id());
    components
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[cfg(any(target_os = "macos", windows))]
fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program).args(args).output().ok()?;
    String::from_utf8(output.stdout).ok()
}

#[cfg(target_os = "linux")]
fn os_version() -> Option<String> {
    let release = std::fs::read_to_string("/etc/os-release").ok()?;
    release
        .lines()
        .find_map(|line| line.strip_prefix("VERSION_ID="))
        .map(|value| value.trim_matches('"').to_string())
}

#[cfg(target_os = "macos")]
fn os_version() -> Option<String> {
    command_stdout("sw_vers", &["-productVersion"]).map(|s| s.trim().to_string())
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn os_version() -> Option<String> {
    None
}

#[cfg(target_os = "linux")]
fn machine_id() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(target_os = "macos")]
fn machine_id() -> Option<String> {
    let registry = command_stdout("ioreg", &["-rd1", "-c", "IOPlatformExpertDevice"])?;
    registry
        .lines()
        .find(|line| line.contains("IOPlatformUUID"))
        .and_then(|line| line.split('"').nth(3))
        .map(str::to_string)
}

#[cfg(windows)]
fn machine_id() -> Option<String> {
    let output = command_stdout(
        "reg",
        &[
            "query",
            r"HKLM\SOFTWARE\Microsoft\Cryptography",
            "/v",
            "MachineGuid",
        ],
    )?;
    output
        .lines()
        .find(|line| line.contains("MachineGuid"))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

#[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
fn machine_id() -> Option<String> {
    None
}
