use super::Error;

const CONTEXT_LINES: usize = 5;

/// Renders the source around an error: five lines before and after the
/// offending line, with a caret under the column.
pub fn context(file: &str, source: &str, first_line: usize, error: &Error) -> String {
    let mut s = format!("{} in {}\n", error, file);
    let line = match error.line() {
        Some(line) => line,
        None => return s,
    };
    let column = error.column().unwrap_or(1);
    let from = line.saturating_sub(CONTEXT_LINES).max(first_line);
    for (n, text) in source
        .lines()
        .enumerate()
        .map(|(i, text)| (i + first_line, text))
        .skip_while(|(n, _)| *n < from)
        .take_while(|(n, _)| *n <= line + CONTEXT_LINES)
    {
        s.push_str(&format!("{:>5}: {}\n", n, text));
        if n == line {
            s.push_str(&format!("{:>5}  {:>w$}\n", "", "^", w = column));
        }
    }
    s
}
