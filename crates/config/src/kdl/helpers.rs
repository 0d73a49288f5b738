//! KDL parsing helper functions.
//!
//! Common utilities for extracting values from KDL nodes. Values are read
//! from child nodes, so `lookup-timeout-secs 5` inside a `network { }` block
//! is looked up with `get_int_entry(network, "lookup-timeout-secs")`.

use std::path::PathBuf;

/// Convert a byte offset to line and column numbers (1-indexed)
pub fn offset_to_line_col(content: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in content.chars().enumerate() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Helper to get a string entry from a KDL node
pub fn get_string_entry(node: &kdl::KdlNode, name: &str) -> Option<String> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|n| n.entries().first())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Helper to get a path entry from a KDL node
pub fn get_path_entry(node: &kdl::KdlNode, name: &str) -> Option<PathBuf> {
    get_string_entry(node, name).map(PathBuf::from)
}

/// Helper to get an integer entry from a KDL node
pub fn get_int_entry(node: &kdl::KdlNode, name: &str) -> Option<i128> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|n| n.entries().first())
        .and_then(|e| e.value().as_integer())
}

/// Helper to get a boolean entry from a KDL node
pub fn get_bool_entry(node: &kdl::KdlNode, name: &str) -> Option<bool> {
    node.children()
        .and_then(|children| children.get(name))
        .and_then(|n| n.entries().first())
        .and_then(|e| e.value().as_bool())
}

/// Helper to get every string argument of a child node
///
/// `issue-command "/usr/bin/certbot" "renew"` yields both strings in order.
pub fn get_string_args(node: &kdl::KdlNode, name: &str) -> Vec<String> {
    node.children()
        .and_then(|children| children.get(name))
        .map(|n| {
            n.entries()
                .iter()
                .filter(|e| e.name().is_none())
                .filter_map(|e| e.value().as_string())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Helper to get the first argument of a node as a string
pub fn get_first_arg_string(node: &kdl::KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(content: &str) -> kdl::KdlDocument {
        content.parse().unwrap()
    }

    #[test]
    fn test_offset_to_line_col() {
        let content = "a\nbc\ndef";
        assert_eq!(offset_to_line_col(content, 0), (1, 1));
        assert_eq!(offset_to_line_col(content, 3), (2, 2));
        assert_eq!(offset_to_line_col(content, 5), (3, 1));
    }

    #[test]
    fn test_typed_entries() {
        let doc = block(
            r#"
            network {
                lookup-timeout-secs 7
                ip-discovery-url "https://example.com/ip"
                enabled #true
            }
            "#,
        );
        let node = doc.get("network").unwrap();
        assert_eq!(get_int_entry(node, "lookup-timeout-secs"), Some(7));
        assert_eq!(
            get_string_entry(node, "ip-discovery-url").as_deref(),
            Some("https://example.com/ip")
        );
        assert_eq!(get_bool_entry(node, "enabled"), Some(true));
        assert_eq!(get_string_entry(node, "missing"), None);
    }

    #[test]
    fn test_string_args() {
        let doc = block(
            r#"
            certificate {
                issue-command "/usr/bin/cert-issue" "--real" "--quiet"
            }
            "#,
        );
        let node = doc.get("certificate").unwrap();
        assert_eq!(
            get_string_args(node, "issue-command"),
            vec!["/usr/bin/cert-issue", "--real", "--quiet"]
        );
        assert!(get_string_args(node, "absent").is_empty());
    }
}
