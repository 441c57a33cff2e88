//! Dotted-path completion against the session namespace
//!
//! The trailing identifier path of the input line (`window.sh`, `wind`, or a
//! bare `obj.`) is resolved against the namespace and the final partial
//! segment is matched against the names reachable there. Candidates are
//! recomputed on every request; nothing is cached between keystrokes.

use itertools::Itertools;

/// Read-only view of the namespace used to resolve completion candidates
///
/// Implemented by [`EvalRuntime`](crate::runtime::EvalRuntime); a resolution
/// failure at any step is reported as an empty name list, never an error.
pub trait NamespaceView {
    /// Names resolvable at the root of the namespace
    fn root_names(&self) -> Vec<String>;
    /// Attribute names reachable under a resolved dotted path
    fn attr_names(&self, path: &[String]) -> Vec<String>;
}

/// A computed completion for an input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The partial final segment being completed (may be empty)
    pub prefix: String,
    /// Candidate names for the final segment, sorted and deduplicated
    pub candidates: Vec<String>,
}

/// Compute completion candidates for the trailing dotted path of `input`
pub fn complete(view: &dyn NamespaceView, input: &str) -> Completion {
    let (path, prefix) = split_dotted_path(input);
    let names = if path.is_empty() {
        view.root_names()
    } else {
        view.attr_names(&path)
    };
    let candidates = names
        .into_iter()
        .filter(|name| name.starts_with(&prefix))
        .sorted()
        .dedup()
        .collect();
    Completion { prefix, candidates }
}

/// Longest common prefix of the candidates, on char boundaries
pub fn longest_common_prefix(candidates: &[String]) -> String {
    let first = match candidates.first() {
        Some(first) => first,
        None => return String::new(),
    };
    let mut prefix = first.as_str();
    for candidate in &candidates[1..] {
        while !candidate.starts_with(prefix) {
            let mut end = prefix.len() - 1;
            while end > 0 && !prefix.is_char_boundary(end) {
                end -= 1;
            }
            prefix = &prefix[..end];
            if prefix.is_empty() {
                return String::new();
            }
        }
    }
    prefix.to_string()
}

// Split the trailing dotted identifier path off the input: everything up to
// the last dot is the path, the remainder is the partial final segment.
// Whitespace and operators terminate the scan, so completion works anywhere
// a name can appear, not just at the start of the line.
fn split_dotted_path(input: &str) -> (Vec<String>, String) {
    let tail_start = input
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_' || *c == '.')
        .last()
        .map_or(input.len(), |(index, _)| index);
    let tail = &input[tail_start..];

    let mut parts: Vec<&str> = tail.split('.').collect();
    let prefix = parts.pop().unwrap_or("").to_string();
    let path = parts.into_iter().map(|s| s.to_string()).collect();
    (path, prefix)
}
