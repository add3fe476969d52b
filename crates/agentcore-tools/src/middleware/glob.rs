//! Permission-rule pattern matching: `*` wildcard in tool names,
//! `prefix:*` delimiter-aware matching in argument patterns.

const DELIMITERS: [char; 8] = [' ', '-', '\t', ';', '|', '&', '\n', '/'];

pub fn matches_tool_name(pattern: &str, tool_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return tool_name.starts_with(prefix);
    }
    pattern == tool_name
}

/// `prefix:*` matches `argument` exactly equal to `prefix`, or `prefix`
/// followed immediately by one of the fixed delimiter characters.
pub fn matches_argument_pattern(pattern: &str, argument: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(":*") {
        if argument == prefix {
            return true;
        }
        return argument
            .strip_prefix(prefix)
            .and_then(|rest| rest.chars().next())
            .map(|c| DELIMITERS.contains(&c))
            .unwrap_or(false);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return argument.starts_with(prefix);
    }
    pattern == argument
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_tool_matches_anything() {
        assert!(matches_tool_name("*", "Read"));
    }

    #[test]
    fn tool_prefix_wildcard() {
        assert!(matches_tool_name("Read*", "ReadFile"));
        assert!(!matches_tool_name("Read*", "Write"));
    }

    #[test]
    fn prefix_colon_star_matches_exact_and_delimited() {
        assert!(matches_argument_pattern("rm:*", "rm"));
        assert!(matches_argument_pattern("rm:*", "rm -rf /tmp/x"));
        assert!(!matches_argument_pattern("rm:*", "rmdir foo"));
    }

    #[test]
    fn prefix_colon_star_respects_all_delimiters() {
        for d in [' ', '-', '\t', ';', '|', '&', '\n', '/'] {
            let arg = format!("rm{d}rest");
            assert!(matches_argument_pattern("rm:*", &arg), "delimiter {:?} should match", d);
        }
    }
}
