//! Request-line parsing.

/// A parsed client request: the uppercased verb token plus its positional
/// arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// First token of the line, uppercased. May name no known verb.
    pub token: String,
    /// Remaining space-separated tokens, verbatim.
    pub args: Vec<String>,
}

impl Request {
    /// Parses one request line.
    ///
    /// Surrounding `\r`, spaces, and `\n` carry no meaning and are stripped
    /// before the line is split on single spaces; the verb is
    /// case-insensitive on input.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim_matches(|c| c == '\r' || c == ' ' || c == '\n');
        let mut tokens = line.split(' ');
        let token = tokens.next().unwrap_or_default().to_uppercase();
        let args = tokens.map(str::to_string).collect();
        Self { token, args }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verb_and_args() {
        let req = Request::parse("RETR 1");
        assert_eq!(req.token, "RETR");
        assert_eq!(req.args, vec!["1"]);
    }

    #[test]
    fn test_parse_uppercases_verb_only() {
        let req = Request::parse("user Alice");
        assert_eq!(req.token, "USER");
        assert_eq!(req.args, vec!["Alice"]);
    }

    #[test]
    fn test_parse_strips_line_terminators() {
        let req = Request::parse("QUIT\r\n");
        assert_eq!(req.token, "QUIT");
        assert!(req.args.is_empty());

        let req = Request::parse("  NOOP  ");
        assert_eq!(req.token, "NOOP");
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_parse_empty_line() {
        let req = Request::parse("");
        assert_eq!(req.token, "");
        assert!(req.args.is_empty());
    }

    #[test]
    fn test_parse_double_space_yields_empty_arg() {
        let req = Request::parse("LIST  1");
        assert_eq!(req.token, "LIST");
        assert_eq!(req.args, vec!["", "1"]);
    }
}
