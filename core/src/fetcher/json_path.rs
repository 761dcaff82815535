//! Minimal JSON path: `data.children`, `$.items[0].entries`, `[2]`.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Key(String),
    Index(usize),
}

/// Walks `path` from `root`. An empty path (or `$`) yields `root`.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let steps = parse(path)?;
    steps.iter().try_fold(root, |node, step| match step {
        Step::Key(key) => node.get(key.as_str()),
        Step::Index(index) => node.get(*index),
    })
}

fn parse(path: &str) -> Option<Vec<Step>> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);

    let mut steps = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (key, mut rest) = match segment.find('[') {
            Some(open) => segment.split_at(open),
            None => (segment, ""),
        };
        if !key.is_empty() {
            steps.push(Step::Key(key.to_string()));
        }
        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            steps.push(Step::Index(inner[..close].trim().parse().ok()?));
            rest = &inner[close + 1..];
        }
    }
    Some(steps)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn walks_keys_and_indices() {
        let doc = json!({"data": {"children": [{"id": 1}, {"id": 2}]}});
        assert_eq!(resolve(&doc, "data.children[1].id"), Some(&json!(2)));
        assert_eq!(resolve(&doc, "$.data.children[0]"), Some(&json!({"id": 1})));
    }

    #[test]
    fn empty_path_is_root() {
        let doc = json!([1, 2]);
        assert_eq!(resolve(&doc, ""), Some(&doc));
        assert_eq!(resolve(&doc, "$"), Some(&doc));
        assert_eq!(resolve(&doc, "[0]"), Some(&json!(1)));
    }

    #[test]
    fn missing_segments_resolve_to_none() {
        let doc = json!({"data": {"children": []}});
        assert_eq!(resolve(&doc, "data.posts"), None);
        assert_eq!(resolve(&doc, "data.children[3]"), None);
    }

    #[test]
    fn malformed_paths_resolve_to_none() {
        let doc = json!({"a": [1]});
        assert_eq!(resolve(&doc, "a[0"), None);
        assert_eq!(resolve(&doc, "a[x]"), None);
    }
}
