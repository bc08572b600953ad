//! Building the command line handed to `CreateProcess`.
//!
//! The aim is that the child reconstructs exactly the argv array we
//! started with, so quotes at the beginning and end of an argument are
//! treated as embedded quotes.

/// The escape character used when quoting arguments.
const ESCAPE: char = '\\';

/// Concatenates `argv` into one command line, quoting where needed.
pub(crate) fn build_command_line<S: AsRef<str>>(argv: &[S]) -> String {
    let mut cmdline = String::new();
    for (index, arg) in argv.iter().enumerate() {
        if index > 0 {
            cmdline.push(' ');
        }
        append_quoted(arg.as_ref(), &mut cmdline);
    }
    cmdline
}

/// Appends one argument, wrapped in quotes if it is empty or contains
/// whitespace or quote characters.
///
/// An embedded quote is preceded by the escape character, and any run
/// of escape characters directly before an embedded quote, or before
/// the closing quote, is doubled.
fn append_quoted(arg: &str, cmdline: &mut String) {
    let need_quotes = arg.is_empty() || arg.chars().any(|c| c == ' ' || c == '\t' || c == '"');
    if !need_quotes {
        cmdline.push_str(arg);
        return;
    }

    cmdline.push('"');
    let mut escape_run = 0;
    for c in arg.chars() {
        if c == '"' {
            for _ in 0..escape_run {
                cmdline.push(ESCAPE);
            }
            cmdline.push(ESCAPE);
        }
        cmdline.push(c);

        if c == ESCAPE {
            escape_run += 1;
        } else {
            escape_run = 0;
        }
    }
    // The closing quote must not end up escaped either.
    for _ in 0..escape_run {
        cmdline.push(ESCAPE);
    }
    cmdline.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_arguments_stay_plain() {
        assert_eq!(build_command_line(&["prog", "-v", "input.txt"]), "prog -v input.txt");
    }

    #[test]
    fn whitespace_forces_quotes() {
        assert_eq!(build_command_line(&["prog", "a b"]), "prog \"a b\"");
        assert_eq!(build_command_line(&["prog", "a\tb"]), "prog \"a\tb\"");
    }

    #[test]
    fn empty_argument_is_kept() {
        assert_eq!(build_command_line(&["prog", ""]), "prog \"\"");
    }

    #[test]
    fn embedded_quotes_are_escaped() {
        assert_eq!(build_command_line(&[r#"a"b"#]), r#""a\"b""#);
        // A quote at the very beginning counts as embedded too.
        assert_eq!(build_command_line(&[r#""a"#]), r#""\"a""#);
    }

    #[test]
    fn escape_runs_before_quotes_are_doubled() {
        // One backslash before an embedded quote becomes three: the
        // doubled run plus the escape of the quote itself.
        assert_eq!(build_command_line(&[r#"a\"b"#]), r#""a\\\"b""#);
        assert_eq!(build_command_line(&[r#"a\\"b"#]), r#""a\\\\\"b""#);
    }

    #[test]
    fn trailing_escapes_do_not_eat_the_closing_quote() {
        assert_eq!(build_command_line(&[r#"a \"#]), r#""a \\""#);
        assert_eq!(build_command_line(&[r#"a \\"#]), r#""a \\\\""#);
        // Without quoting there is nothing to protect.
        assert_eq!(build_command_line(&[r#"a\"#]), r#"a\"#);
    }

    #[test]
    fn arguments_keep_their_order() {
        assert_eq!(
            build_command_line(&["cmd", "/c", "echo x y", ""]),
            "cmd /c \"echo x y\" \"\""
        );
    }
}
