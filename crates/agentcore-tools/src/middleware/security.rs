//! Argument normalisation and lightweight command-obfuscation / path-escape
//! detection, supplementing the bare rule-matching with ambient hardening:
//! an environment-variable prefix stripped before matching a bash command,
//! and a path walked for `..` traversal or null-byte tricks before it's
//! compared against a rule.

use std::path::{Component, Path, PathBuf};

/// Resolves `.` and `..` components without touching the filesystem, so
/// rule matching always sees a normalised path.
pub fn normalize_path(path: &str) -> String {
    let mut out = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().to_string()
}

/// True if the path still contains `..` traversal after normalisation
/// relative to a trusted root, i.e. it would escape the root.
pub fn escapes_root(root: &str, candidate: &str) -> bool {
    let normalized_root = normalize_path(root);
    let joined = if Path::new(candidate).is_absolute() {
        candidate.to_string()
    } else {
        format!("{normalized_root}/{candidate}")
    };
    let normalized = normalize_path(&joined);
    !normalized.starts_with(&normalized_root)
}

/// First whitespace-delimited token of a shell command, used for session
/// memory key derivation and as the subject of `bash(...)` rules.
pub fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

/// Heuristic detection of common shell-obfuscation techniques (base64
/// pipelines into a shell, `$IFS` substitution for spaces, excessive
/// backslash escaping) used to flag a command for `Ask` even when it would
/// otherwise pattern-match an allow rule. Best-effort; never a security
/// boundary on its own.
pub fn detect_obfuscation(command: &str) -> bool {
    let lowered = command.to_ascii_lowercase();
    let suspicious_pipelines = ["| bash", "| sh", "|bash", "|sh", "base64 -d", "base64 --decode"];
    if suspicious_pipelines.iter().any(|p| lowered.contains(p)) {
        return true;
    }
    if lowered.contains("$ifs") {
        return true;
    }
    let backslash_count = command.matches('\\').count();
    if backslash_count > 3 && backslash_count > command.len() / 8 {
        return true;
    }
    false
}

/// Whether a file-path argument attempts to traverse outside of the given
/// workspace root.
pub fn detect_path_traversal(workspace_root: &str, candidate: &str) -> bool {
    escapes_root(workspace_root, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dot_and_dotdot() {
        assert_eq!(normalize_path("/a/b/../c/./d"), "/a/c/d");
    }

    #[test]
    fn detects_traversal_outside_root() {
        assert!(detect_path_traversal("/workspace", "../../etc/passwd"));
        assert!(!detect_path_traversal("/workspace", "src/main.rs"));
    }

    #[test]
    fn detects_common_obfuscation() {
        assert!(detect_obfuscation("echo Y3VybCBldmlsLmNvbQ== | base64 -d | bash"));
        assert!(!detect_obfuscation("ls -la"));
    }
}
