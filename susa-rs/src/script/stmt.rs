//! Line classification for the simulator.
//!
//! A SUSA program is read one line at a time.  Each line is trimmed and
//! assigned exactly one [`Stmt`] kind; nothing spans lines, and a line that
//! cannot be understood is simply [`Stmt::Ignored`].

/// A classified source line.  Borrowed slices point into the source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt<'a> {
    /// Empty (or all-whitespace) line.
    Blank,
    /// `# …` without a `===` marker.
    Comment,
    /// `# === Title ===`; the text after `#`, trimmed, is echoed.
    Banner(&'a str),
    /// `let <name> = <literal>`; both halves trimmed.
    Let { name: &'a str, literal: &'a str },
    /// `PRINT <content>`; content trimmed.
    Print(&'a str),
    /// `FUNC …:`, `START:` or `END:`: block syntax with no simulated meaning.
    Marker,
    /// Anything else, including a `let` with no `=`.
    Ignored,
}

/// Classify a single (untrimmed) line.
pub fn classify(raw: &str) -> Stmt<'_> {
    let line = raw.trim();

    if line.is_empty() {
        return Stmt::Blank;
    }
    if let Some(body) = line.strip_prefix('#') {
        return if line.contains("===") {
            Stmt::Banner(body.trim())
        } else {
            Stmt::Comment
        };
    }
    if let Some(decl) = line.strip_prefix("let ") {
        return match decl.split_once('=') {
            Some((name, literal)) => Stmt::Let {
                name: name.trim(),
                literal: literal.trim(),
            },
            None => Stmt::Ignored,
        };
    }
    if let Some(content) = line.strip_prefix("PRINT ") {
        return Stmt::Print(content.trim());
    }
    if (line.starts_with("FUNC ") && line.ends_with(':')) || line == "START:" || line == "END:" {
        return Stmt::Marker;
    }
    Stmt::Ignored
}

/// Split a program into 1-based `(line_number, Stmt)` pairs.
pub fn parse_script(src: &str) -> impl Iterator<Item = (usize, Stmt<'_>)> {
    src.split('\n').enumerate().map(|(i, line)| (i + 1, classify(line)))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_lines() {
        assert_eq!(classify(""), Stmt::Blank);
        assert_eq!(classify("   \t\r"), Stmt::Blank);
    }

    #[test]
    fn comments_and_banners() {
        assert_eq!(classify("# just a comment"), Stmt::Comment);
        assert_eq!(classify("# === Section ==="), Stmt::Banner("=== Section ==="));
        assert_eq!(classify("  #===x"), Stmt::Banner("===x"));
    }

    #[test]
    fn declarations_split_on_first_equals() {
        assert_eq!(
            classify("let x = \"a=b\""),
            Stmt::Let { name: "x", literal: "\"a=b\"" }
        );
        assert_eq!(classify("let  y=5"), Stmt::Let { name: "y", literal: "5" });
        assert_eq!(classify("let x"), Stmt::Ignored);
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(classify("LET x = 1"), Stmt::Ignored);
        assert_eq!(classify("print \"hi\""), Stmt::Ignored);
    }

    #[test]
    fn print_requires_a_space() {
        assert_eq!(classify("PRINT  \"hi\"  "), Stmt::Print("\"hi\""));
        assert_eq!(classify("PRINT"), Stmt::Ignored);
        assert_eq!(classify("PRINT   "), Stmt::Ignored);
        assert_eq!(classify("PRINTx"), Stmt::Ignored);
    }

    #[test]
    fn block_markers() {
        assert_eq!(classify("FUNC greet(name):"), Stmt::Marker);
        assert_eq!(classify("START:"), Stmt::Marker);
        assert_eq!(classify("END:"), Stmt::Marker);
        assert_eq!(classify("FUNC greet(name)"), Stmt::Ignored);
        assert_eq!(classify("LOOP i FROM 1 TO 3:"), Stmt::Ignored);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let lines: Vec<_> = parse_script("let a = 1\n\nPRINT a").collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].0, 1);
        assert_eq!(lines[2], (3, Stmt::Print("a")));
    }

    #[test]
    fn crlf_line_endings() {
        let lines: Vec<_> = parse_script("PRINT \"a\"\r\nPRINT \"b\"\r\n").collect();
        assert_eq!(lines[0].1, Stmt::Print("\"a\""));
        assert_eq!(lines[1].1, Stmt::Print("\"b\""));
    }
}
