//! Static structural scoring of candidate programs.
//!
//! Counts come from line-anchored pattern scans; syntactic validity comes from
//! a tree-sitter Python parse. Nothing here executes the candidate.

use std::cell::RefCell;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tree_sitter::Parser;

thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // A failed language load surfaces as a `None` parse below.
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });
}

/// Returns true when `code` parses without error nodes.
pub fn is_valid_python(code: &str) -> bool {
    PYTHON_PARSER.with(|p| {
        p.borrow_mut()
            .parse(code, None)
            .map(|tree| !tree.root_node().has_error())
            .unwrap_or(false)
    })
}

/// Structural metrics for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScore {
    pub line_count: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub comment_count: usize,
    pub variable_count: usize,
    /// String and numeric literal tokens.
    pub literal_count: usize,
    pub syntax_valid: bool,
}

impl QualityScore {
    /// Syntax validity of this single sample as a percentage (0 or 100).
    pub fn syntax_valid_percent(&self) -> f64 {
        if self.syntax_valid {
            100.0
        } else {
            0.0
        }
    }
}

/// Computes [`QualityScore`]s.
pub struct QualityScorer {
    function: Regex,
    class: Regex,
    comment: Regex,
    assignment: Regex,
    literal: Regex,
}

impl QualityScorer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            function: Regex::new(r"(?m)^\s*(?:async\s+)?def\s+\w+")?,
            class: Regex::new(r"(?m)^\s*class\s+\w+")?,
            comment: Regex::new(r"(?m)^\s*#")?,
            assignment: Regex::new(r"\b\w+\s*(==?)")?,
            literal: Regex::new(r#"[^a-zA-Z]("[^"]*"|'[^']*'|\d+)"#)?,
        })
    }

    pub fn score(&self, code: &str) -> QualityScore {
        let trimmed = code.trim();

        // `a == b` is a comparison, not a declaration.
        let variable_count = self
            .assignment
            .captures_iter(code)
            .filter(|c| c.get(1).is_some_and(|m| m.as_str() == "="))
            .count();

        QualityScore {
            line_count: trimmed.lines().count(),
            function_count: self.function.find_iter(code).count(),
            class_count: self.class.find_iter(code).count(),
            comment_count: self.comment.find_iter(code).count(),
            variable_count,
            literal_count: self.literal.find_iter(code).count(),
            syntax_valid: !trimmed.is_empty() && is_valid_python(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"import requests

# Fetch the user list
class Client:
    pass

async def fetch(session):
    return None

def main():
    url = "http://api.example.com/users"
    retries = 3
    if retries == 3:
        response = requests.get(url, timeout=10)
        print(response.status_code)

main()
"#;

    #[test]
    fn test_counts_structure() {
        let scorer = QualityScorer::new().unwrap();
        let score = scorer.score(SCRIPT);

        assert_eq!(score.line_count, 17);
        assert_eq!(score.function_count, 2);
        assert_eq!(score.class_count, 1);
        assert_eq!(score.comment_count, 1);
        // url, retries, response, timeout
        assert_eq!(score.variable_count, 4);
        assert!(score.literal_count >= 3);
        assert!(score.syntax_valid);
        assert_eq!(score.syntax_valid_percent(), 100.0);
    }

    #[test]
    fn test_invalid_syntax_detected() {
        let scorer = QualityScorer::new().unwrap();
        let score = scorer.score("def broken(:\n    return 1\n");
        assert!(!score.syntax_valid);
        assert_eq!(score.syntax_valid_percent(), 0.0);
    }

    #[test]
    fn test_empty_code_is_not_valid() {
        let scorer = QualityScorer::new().unwrap();
        let score = scorer.score("   \n");
        assert_eq!(score.line_count, 0);
        assert!(!score.syntax_valid);
    }

    #[test]
    fn test_is_valid_python() {
        assert!(is_valid_python("x = 1\nprint(x)\n"));
        assert!(!is_valid_python("print(\"unterminated\n"));
    }
}
