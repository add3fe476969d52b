//! OS-sandbox profile generation. Platform-optional and data-only:
//! this produces the profile *description*, it does not invoke an OS
//! sandboxing facility itself.

use agentcore_types::{FilePolicy, NetworkPolicy, SandboxConfig};

/// Escapes backslashes and double quotes before a path is interpolated into
/// the generated profile string, preventing profile injection.
pub fn escape_subpath(path: &str) -> String {
    path.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Builds an SBPL-like sandbox profile describing the effective policy.
/// Deterministic and string-based so it can be snapshot-compared in tests
/// and round-tripped through a reference parser in the host environment.
pub fn generate_profile(config: &SandboxConfig, working_directory: &str) -> String {
    let mut lines = vec!["(version 1)".to_string(), "(deny default)".to_string()];

    lines.push("(allow process-exec)".to_string());
    if config.allow_subprocesses {
        lines.push("(allow process-fork)".to_string());
    }

    let escaped_cwd = escape_subpath(working_directory);
    match &config.file_policy {
        FilePolicy::ReadOnly => {
            lines.push("(allow file-read*)".to_string());
        }
        FilePolicy::WorkingDirectoryOnly => {
            lines.push("(allow file-read*)".to_string());
            lines.push(format!(
                r#"(allow file-write* (subpath "{escaped_cwd}"))"#
            ));
            lines.push(r#"(allow file-write* (subpath "/tmp"))"#.to_string());
        }
        FilePolicy::Custom { read, write } => {
            for path in read {
                lines.push(format!(r#"(allow file-read* (subpath "{}"))"#, escape_subpath(path)));
            }
            for path in write {
                lines.push(format!(r#"(allow file-write* (subpath "{}"))"#, escape_subpath(path)));
            }
        }
    }

    match config.network_policy {
        NetworkPolicy::None => lines.push("(deny network*)".to_string()),
        NetworkPolicy::Local => lines.push(r#"(allow network* (local ip "localhost:*"))"#.to_string()),
        NetworkPolicy::Full => lines.push("(allow network*)".to_string()),
    }

    lines.push("(allow sysctl-read)".to_string());
    lines.push("(allow mach-lookup)".to_string());
    lines.push("(allow signal (target self))".to_string());
    lines.push("(allow process-info*)".to_string());

    lines.join("\n")
}

/// Recovers the original, unescaped subpath from an escaped profile
/// fragment — used to assert round-trip fidelity.
pub fn unescape_subpath(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '\\' || next == '"' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaping_round_trips_for_paths_with_backslashes_and_quotes() {
        let path = r#"C:\weird"dir\name"#;
        let escaped = escape_subpath(path);
        assert_eq!(unescape_subpath(&escaped), path);
    }

    #[test]
    fn profile_denies_network_by_default() {
        let config = SandboxConfig::default();
        let profile = generate_profile(&config, "/workspace");
        assert!(profile.contains("(deny network*)"));
        assert!(profile.contains("(deny default)"));
    }

    #[test]
    fn profile_allows_subprocesses_only_when_configured() {
        let mut config = SandboxConfig::default();
        config.allow_subprocesses = true;
        let profile = generate_profile(&config, "/workspace");
        assert!(profile.contains("(allow process-fork)"));
    }
}
