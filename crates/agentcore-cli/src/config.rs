//! CLI configuration: flags with an environment-variable fallback chain,
//! plus an optional TOML permission-configuration file that is parsed with a
//! fall-back to a sane default on any error.

use agentcore_types::{DefaultAction, PermissionConfiguration, PermissionRule};
use std::path::{Path, PathBuf};

/// Named permission tiers, the coarse-grained security preset a host
/// picks before layering finer per-rule overrides on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityPreset {
    /// Only read-only tools are ever allowed; everything else is denied
    /// outright, never prompted.
    Readonly,
    /// The default: unmatched calls are asked about interactively.
    #[default]
    Standard,
    /// Unmatched calls are allowed without a prompt.
    Trusted,
}

impl SecurityPreset {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "readonly" | "read-only" => Some(Self::Readonly),
            "standard" => Some(Self::Standard),
            "trusted" => Some(Self::Trusted),
            _ => None,
        }
    }

    /// The permission configuration this preset implies absent an explicit
    /// file override.
    pub fn permission_configuration(self) -> PermissionConfiguration {
        match self {
            SecurityPreset::Readonly => PermissionConfiguration {
                allow: vec![PermissionRule::tool_only("read_file")],
                deny: Vec::new(),
                final_deny: Vec::new(),
                overrides: Vec::new(),
                default_action: DefaultAction::Deny,
                enable_session_memory: false,
            },
            SecurityPreset::Standard => PermissionConfiguration::default(),
            SecurityPreset::Trusted => PermissionConfiguration {
                allow: vec![PermissionRule::tool_only("*")],
                deny: Vec::new(),
                final_deny: Vec::new(),
                overrides: Vec::new(),
                default_action: DefaultAction::Allow,
                enable_session_memory: true,
            },
        }
    }
}

pub struct Config {
    pub model: String,
    pub workspace: PathBuf,
    pub security_preset: SecurityPreset,
    pub permission_configuration: PermissionConfiguration,
}

impl Config {
    pub fn load(
        model: Option<String>,
        workspace: Option<String>,
        security_preset: Option<String>,
        permission_config_path: Option<String>,
    ) -> Self {
        let model = model
            .or_else(|| std::env::var("AGENTCORE_MODEL").ok())
            .unwrap_or_else(|| "echo".to_string());

        let workspace = workspace
            .or_else(|| std::env::var("AGENTCORE_WORKSPACE").ok())
            .unwrap_or_else(|| ".".to_string());

        let preset_name = security_preset.or_else(|| std::env::var("AGENTCORE_SECURITY_PRESET").ok());
        let security_preset = match preset_name {
            Some(name) => SecurityPreset::parse(&name).unwrap_or_else(|| {
                tracing::warn!(preset = %name, "unknown security preset; defaulting to standard");
                SecurityPreset::Standard
            }),
            None => SecurityPreset::Standard,
        };

        let config_path = permission_config_path.or_else(|| std::env::var("AGENTCORE_PERMISSION_CONFIG").ok());
        let permission_configuration = match config_path {
            Some(path) => load_permission_configuration(Path::new(&path), security_preset),
            None => security_preset.permission_configuration(),
        };

        Self { model, workspace: PathBuf::from(workspace), security_preset, permission_configuration }
    }
}

fn load_permission_configuration(path: &Path, preset: SecurityPreset) -> PermissionConfiguration {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded permission configuration");
                config
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse permission config; using preset default");
                preset.permission_configuration()
            }
        },
        Err(_) => {
            tracing::info!(path = %path.display(), "no permission config file found; using preset default");
            preset.permission_configuration()
        }
    }
}
