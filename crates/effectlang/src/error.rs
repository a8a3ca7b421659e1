//! Error types (§6 "Error", §7 error handling design).
//!
//! Two channels, matching the distinction between fatal engine faults and
//! ordinary per-expression inference failures (§7): `InferError` aborts an
//! entire run; `Error` is the tree-structured value recorded in the
//! per-id error map and never thrown.

/// A tree-structured diagnostic (§6). Built by wrapping a child error with
/// a context frame, e.g. "while inferring effect for `f(x)`".
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Error {
    pub location: String,
    pub message: String,
    pub children: Vec<Error>,
}

impl Error {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Error {
            location: location.into(),
            message: message.into(),
            children: Vec::new(),
        }
    }

    /// Wrap this error as a child under a new context frame.
    pub fn wrap(self, location: impl Into<String>, message: impl Into<String>) -> Self {
        Error {
            location: location.into(),
            message: message.into(),
            children: vec![self],
        }
    }

    /// Flatten the tree into one line per node, root first, depth-first.
    pub fn flatten(&self) -> Vec<String> {
        let mut lines = Vec::new();
        self.flatten_into(0, &mut lines);
        lines
    }

    fn flatten_into(&self, depth: usize, out: &mut Vec<String>) {
        out.push(format!(
            "{}{}: {}",
            "  ".repeat(depth),
            self.location,
            self.message
        ));
        for child in &self.children {
            child.flatten_into(depth + 1, out);
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.flatten().join("\n"))
    }
}

/// Fatal conditions that abort an entire inference run rather than a
/// single expression id (SPEC_FULL.md "Error handling" addition to §5).
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferError {
    #[error("recursion limit of {limit} exceeded while walking the IR")]
    RecursionLimitExceeded { limit: usize },
    #[error("expression id {0:?} has no IR node (IR producer contract violation)")]
    DanglingExprId(crate::ir::ExprId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_nests_as_a_child() {
        let leaf = Error::new("s", "couldn't find s in the lookup table");
        let wrapped = leaf.clone().wrap("f(s)", "while inferring effect for f(s)");
        assert_eq!(wrapped.children, vec![leaf]);
    }

    #[test]
    fn flatten_is_depth_first_root_first() {
        let leaf = Error::new("s", "not found");
        let wrapped = leaf.wrap("f(s)", "while inferring f(s)");
        let lines = wrapped.flatten();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("f(s)"));
        assert!(lines[1].trim_start().starts_with("s:"));
    }
}
