//! Best-effort cleanup of raw generator output.
//!
//! Input is whatever the model produced; output is text with the most common
//! wrapping artifacts removed. The result is never guaranteed to be valid
//! source code: the gates decide that.
//!
//! Applied in order:
//! 1. If a markdown fence is present, keep only the body of the first fenced
//!    block (prose before it and anything after its closing fence is dropped).
//! 2. Drop lines made only of backticks.
//! 3. Drop trailing lines made only of closing brackets that have no opener.
//! 4. Drop the final line when the text ends inside an unterminated string
//!    literal (cut-off generation). Triple quotes open and close as one token.

/// Cleans raw generated text.
pub fn sanitize(raw: &str) -> String {
    let text = extract_fenced_body(raw.trim());

    let mut lines: Vec<&str> = text
        .lines()
        .filter(|line| !is_backtick_residue(line))
        .collect();

    drop_unmatched_closers(&mut lines);

    if ends_in_open_string(&lines.join("\n")) {
        lines.pop();
    }

    lines.join("\n").trim().to_string()
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

fn is_backtick_residue(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '`')
}

/// Returns the body of the first fenced block, or the input when there is none.
fn extract_fenced_body(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let Some(open) = lines.iter().position(|l| is_fence(l)) else {
        return text.to_string();
    };

    let body = &lines[open + 1..];
    let close = body.iter().position(|l| is_fence(l)).unwrap_or(body.len());
    body[..close].join("\n")
}

fn bracket_balance(text: &str) -> i64 {
    text.chars().fold(0i64, |acc, c| match c {
        '(' | '[' | '{' => acc + 1,
        ')' | ']' | '}' => acc - 1,
        _ => acc,
    })
}

fn drop_unmatched_closers(lines: &mut Vec<&str>) {
    loop {
        let Some(last) = lines.last() else { return };
        let trimmed = last.trim();
        let closers_only = !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|c| matches!(c, ')' | ']' | '}' | ',' | ' '));
        if closers_only && bracket_balance(&lines.join("\n")) < 0 {
            lines.pop();
        } else {
            return;
        }
    }
}

#[derive(Clone, Copy)]
enum Lexeme {
    Code,
    Short(char),
    Long(char),
}

/// True when a single-line string is left open on the last line, or the text
/// ends inside a triple-quoted string.
fn ends_in_open_string(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let is_triple =
        |i: usize, q: char| chars.get(i + 1) == Some(&q) && chars.get(i + 2) == Some(&q);

    let mut state = Lexeme::Code;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match state {
            Lexeme::Code => match c {
                '#' => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                '"' | '\'' if is_triple(i, c) => {
                    state = Lexeme::Long(c);
                    i += 3;
                    continue;
                }
                '"' | '\'' => state = Lexeme::Short(c),
                _ => {}
            },
            Lexeme::Short(q) => match c {
                '\\' => {
                    i += 2;
                    continue;
                }
                '\n' => state = Lexeme::Code,
                _ if c == q => state = Lexeme::Code,
                _ => {}
            },
            Lexeme::Long(q) => match c {
                '\\' => {
                    i += 2;
                    continue;
                }
                _ if c == q && is_triple(i, q) => {
                    state = Lexeme::Code;
                    i += 3;
                    continue;
                }
                _ => {}
            },
        }
        i += 1;
    }

    matches!(state, Lexeme::Short(_) | Lexeme::Long(_))
}
