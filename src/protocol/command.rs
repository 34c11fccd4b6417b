//! Command line grammar.
//!
//! A command line is a case-insensitive verb followed by at most one argument
//! after the first space. Argument requirements are checked by the handlers;
//! this module only tokenizes the verb and extracts forward/reverse paths.

/// A tokenized command line.
///
/// The argument is carried raw; whether it may be empty (or must be) is the
/// dispatcher's concern, since the failure reply differs per verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Helo(&'a str),
    Help(&'a str),
    Quit(&'a str),
    Data(&'a str),
    Mail(&'a str),
    Rcpt(&'a str),
    /// Unrecognized verb
    Unknown,
}

impl<'a> Command<'a> {
    /// Tokenize one command line.
    pub fn parse(line: &'a str) -> Self {
        let (verb, argument) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, rest),
            None => (line, ""),
        };

        if verb.eq_ignore_ascii_case("helo") {
            Command::Helo(argument)
        } else if verb.eq_ignore_ascii_case("help") {
            Command::Help(argument)
        } else if verb.eq_ignore_ascii_case("quit") {
            Command::Quit(argument)
        } else if verb.eq_ignore_ascii_case("data") {
            Command::Data(argument)
        } else if verb.eq_ignore_ascii_case("mail") {
            Command::Mail(argument)
        } else if verb.eq_ignore_ascii_case("rcpt") {
            Command::Rcpt(argument)
        } else {
            Command::Unknown
        }
    }
}

/// Extract the address from a `FROM:<address>` or `TO:<address>` argument.
///
/// `keyword` is matched case-insensitively and the whole argument must have
/// the shape `<keyword>:<` ... `>`. The address is everything between the
/// opening bracket and the final `>`, and must be non-empty: `FROM:<>` is
/// rejected here, the empty reverse-path is not accepted. No further address
/// validation is performed.
pub fn extract_path<'a>(argument: &'a str, keyword: &str) -> Option<&'a str> {
    let bytes = argument.as_bytes();
    let prefix_len = keyword.len() + 2; // keyword + ":<"
    if bytes.len() <= prefix_len || bytes[bytes.len() - 1] != b'>' {
        return None;
    }

    // Byte-level prefix check: the matched bytes are ASCII, so the str
    // slices below land on character boundaries.
    if !bytes[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        || &bytes[keyword.len()..prefix_len] != b":<"
    {
        return None;
    }

    let address = &argument[prefix_len..argument.len() - 1];
    if address.is_empty() {
        None
    } else {
        Some(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verbs() {
        assert_eq!(Command::parse("QUIT"), Command::Quit(""));
        assert_eq!(Command::parse("helo box"), Command::Helo("box"));
        assert_eq!(Command::parse("Help me"), Command::Help("me"));
        assert_eq!(Command::parse("DATA"), Command::Data(""));
        assert_eq!(Command::parse("MAIL FROM:<a@x>"), Command::Mail("FROM:<a@x>"));
        assert_eq!(Command::parse("rcpt to:<b@y>"), Command::Rcpt("to:<b@y>"));
        assert_eq!(Command::parse("FOO bar"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }

    #[test]
    fn test_parse_keeps_argument_verbatim() {
        // Only the first space splits; the rest is one argument
        assert_eq!(Command::parse("HELO a b c"), Command::Helo("a b c"));
        // Trailing space yields an empty argument, distinct from no argument
        assert_eq!(Command::parse("HELO "), Command::Helo(""));
    }

    #[test]
    fn test_extract_path() {
        assert_eq!(extract_path("FROM:<a@x>", "FROM"), Some("a@x"));
        assert_eq!(extract_path("from:<a@x>", "FROM"), Some("a@x"));
        assert_eq!(extract_path("To:<b@y>", "TO"), Some("b@y"));
    }

    #[test]
    fn test_extract_path_takes_final_bracket() {
        // The address may itself contain '>'; everything up to the final
        // bracket belongs to it.
        assert_eq!(extract_path("FROM:<a>b>", "FROM"), Some("a>b"));
    }

    #[test]
    fn test_extract_path_rejects() {
        // Empty address
        assert_eq!(extract_path("FROM:<>", "FROM"), None);
        // Missing brackets
        assert_eq!(extract_path("FROM:a@x", "FROM"), None);
        // Wrong keyword
        assert_eq!(extract_path("TO:<a@x>", "FROM"), None);
        // Trailing garbage after the closing bracket
        assert_eq!(extract_path("FROM:<a@x> ", "FROM"), None);
        // Too short to hold the prefix
        assert_eq!(extract_path("F", "FROM"), None);
        assert_eq!(extract_path("", "FROM"), None);
    }
}
