//! Sandbox configuration data model.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkPolicy {
    None,
    Local,
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum FilePolicy {
    ReadOnly,
    WorkingDirectoryOnly,
    Custom { read: Vec<String>, write: Vec<String> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    pub network_policy: NetworkPolicy,
    pub file_policy: FilePolicy,
    pub allow_subprocesses: bool,
    /// Seconds. Must satisfy `0 < timeout <= 24h`.
    pub timeout_secs: u64,
}

pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            network_policy: NetworkPolicy::None,
            file_policy: FilePolicy::WorkingDirectoryOnly,
            allow_subprocesses: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SandboxConfig {
    /// "Effectively disabled" iff the policies match the `.none` preset.
    pub fn is_disabled(&self) -> bool {
        matches!(self.network_policy, NetworkPolicy::None)
            && matches!(self.file_policy, FilePolicy::WorkingDirectoryOnly)
            && !self.allow_subprocesses
    }

    pub fn validated_timeout_secs(&self) -> Result<u64, String> {
        if self.timeout_secs == 0 {
            return Err("sandbox timeout must be greater than zero".to_string());
        }
        if self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(format!(
                "sandbox timeout {}s exceeds the 24h cap",
                self.timeout_secs
            ));
        }
        Ok(self.timeout_secs)
    }
}
