//! Shared helpers.

pub mod graph;

/// Escapes a label for use inside a quoted DOT string.
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_method_signature() {
        assert_eq!(
            escape_dot("A.<init>(\"x\")"),
            "A.\\<init\\>(\\\"x\\\")"
        );
    }

    #[test]
    fn test_escape_dot_newlines() {
        assert_eq!(escape_dot("a\r\nb"), "a\\nb");
    }
}
