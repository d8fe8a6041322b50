//! Text utilities for locating Haskell symbols in a document.

use tower_lsp::lsp_types::{Position, Range};

/// Characters that form Haskell operator symbols.
fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '!' | '#'
            | '$'
            | '%'
            | '&'
            | '*'
            | '+'
            | '.'
            | '/'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '\\'
            | '^'
            | '|'
            | '-'
            | '~'
            | ':'
    )
}

/// Characters that may appear inside a Haskell identifier.
fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '\'' || c == '_'
}

/// Extracts the identifier or operator symbol under `position`, if any.
///
/// Comment tokens are not symbols: `--` alone is an ordinary comment, and a
/// `-` adjacent to `{` or `}` belongs to a nested comment delimiter.
pub fn symbol_at_position(text: &str, position: Position) -> Option<String> {
    let line = text.lines().nth(position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let offset = position.character as usize;
    let at = *chars.get(offset)?;

    let matcher: fn(char) -> bool = if is_operator_char(at) {
        is_operator_char
    } else if at.is_ascii_alphabetic() {
        is_identifier_char
    } else {
        return None;
    };

    let mut start = offset;
    while start > 0 && matcher(chars[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < chars.len() && matcher(chars[end]) {
        end += 1;
    }

    let symbol: String = chars[start..end].iter().collect();

    if symbol == "--" {
        return None;
    }
    if symbol == "-" {
        let before = offset.checked_sub(1).and_then(|i| chars.get(i));
        let after = chars.get(offset + 1);
        if before == Some(&'{') || after == Some(&'}') {
            return None;
        }
    }

    Some(symbol).filter(|s| !s.is_empty())
}

/// True if `position` falls inside `range`, comparing lines and columns
/// independently the way ghc-mod's narrowest-range-first results expect.
pub fn is_position_in_range(position: Position, range: Range) -> bool {
    position.line >= range.start.line
        && position.line <= range.end.line
        && position.character >= range.start.character
        && position.character <= range.end.character
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    #[test]
    fn finds_identifier_under_cursor() {
        let text = "main = putStrLn \"hello\"";
        assert_eq!(symbol_at_position(text, pos(0, 9)), Some("putStrLn".into()));
    }

    #[test]
    fn finds_identifier_with_primes_and_digits() {
        let text = "go2' x = x";
        assert_eq!(symbol_at_position(text, pos(0, 1)), Some("go2'".into()));
    }

    #[test]
    fn finds_operator_under_cursor() {
        let text = "f = (>>=)";
        assert_eq!(symbol_at_position(text, pos(0, 6)), Some(">>=".into()));
    }

    #[test]
    fn finds_symbol_on_later_lines() {
        let text = "module A where\nmain = foldr f z";
        assert_eq!(symbol_at_position(text, pos(1, 7)), Some("foldr".into()));
    }

    #[test]
    fn comment_dashes_are_not_a_symbol() {
        let text = "-- a comment";
        assert_eq!(symbol_at_position(text, pos(0, 0)), None);
    }

    #[test]
    fn nested_comment_delimiters_are_not_symbols() {
        assert_eq!(symbol_at_position("{- open", pos(0, 1)), None);
        assert_eq!(symbol_at_position("x -} close", pos(0, 2)), None);
    }

    #[test]
    fn whitespace_yields_no_symbol() {
        let text = "a b";
        assert_eq!(symbol_at_position(text, pos(0, 1)), None);
        assert_eq!(symbol_at_position(text, pos(0, 42)), None);
    }

    #[test]
    fn position_containment_checks_lines_and_columns() {
        let range = Range {
            start: pos(2, 7),
            end: pos(2, 8),
        };
        assert!(is_position_in_range(pos(2, 7), range));
        assert!(is_position_in_range(pos(2, 8), range));
        assert!(!is_position_in_range(pos(2, 9), range));
        assert!(!is_position_in_range(pos(1, 7), range));
    }
}
