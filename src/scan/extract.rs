use regex::Regex;

/// Matcher for throw sites of one exception type, plus the statement
/// prefixes to strip when recovering the message expression.
#[derive(Debug)]
pub struct MessagePattern {
    throw_re: Regex,
    strip: Vec<String>,
}

impl MessagePattern {
    pub fn new(exception: &str, qualified: &[String]) -> Result<Self, regex::Error> {
        let throw_re = Regex::new(&format!(
            r"\bthrow\b.*\bnew\b.*\b{}\b",
            regex::escape(exception)
        ))?;
        let mut strip = Vec::new();
        for name in qualified {
            strip.push(format!("throw new {name}"));
        }
        strip.push(format!("throw new {exception}"));
        Ok(Self { throw_re, strip })
    }

    pub fn matches(&self, line: &str) -> bool {
        self.throw_re.is_match(line)
    }

    /// The argument text of a joined throw statement, or None when the
    /// statement carries no string literal (nothing worth tracking).
    fn message_from_statement(&self, statement: &str) -> Option<String> {
        let mut stripped = statement.to_string();
        for prefix in &self.strip {
            stripped = stripped.replace(prefix.as_str(), "");
        }
        let inner = unwrap_call(stripped.trim()).trim();
        if inner.is_empty() || !inner.contains('"') {
            return None;
        }
        Some(inner.to_string())
    }
}

fn unwrap_call(stripped: &str) -> &str {
    if let Some(rest) = stripped.strip_prefix('(') {
        if let Some(inner) = rest.strip_suffix(");") {
            return inner;
        }
        if let Some(inner) = rest.strip_suffix(')') {
            return inner;
        }
        // Statement truncated at end of file: the call never closed.
        return rest;
    }
    stripped.strip_suffix(';').unwrap_or(stripped)
}

/// All message expressions thrown in one file. A matched line is joined with
/// following lines until the statement's `;`; a statement still open at end
/// of file is taken as complete.
pub fn extract_messages(content: &str, pattern: &MessagePattern) -> Vec<String> {
    let lines: Vec<&str> = content.lines().collect();
    let mut messages = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        if !pattern.matches(line) {
            i += 1;
            continue;
        }

        let mut statement = line.to_string();
        while !statement.ends_with(';') && i + 1 < lines.len() {
            i += 1;
            statement.push(' ');
            statement.push_str(lines[i].trim());
        }
        i += 1;

        if let Some(message) = pattern.message_from_statement(&statement) {
            messages.push(message);
        }
    }

    messages
}
