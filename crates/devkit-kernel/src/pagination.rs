//! Size-aware pagination for transcript and evaluator output.
//!
//! Chat platforms cap a single message (2000 characters by default).
//! [`Paginator`] collects lines into pages that stay under the cap,
//! splitting any single line that exceeds the per-line budget. Splits
//! never land inside a backtick run, and the concatenation of the
//! split chunks equals the original line exactly.

/// Default single-message size cap.
pub const MAX_PAGE_SIZE: usize = 2000;

/// Builds fixed-size pages from a stream of lines.
#[derive(Debug)]
pub struct Paginator {
    prefix: String,
    suffix: String,
    max_size: usize,
    closed: Vec<String>,
    current: Vec<String>,
    current_len: usize,
}

impl Paginator {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>, max_size: usize) -> Self {
        let prefix = prefix.into();
        let current_len = prefix.len() + 1;
        Self {
            prefix,
            suffix: suffix.into(),
            max_size,
            closed: Vec::new(),
            current: Vec::new(),
            current_len,
        }
    }

    /// A paginator whose pages are fenced code blocks.
    pub fn codeblock(highlight: &str) -> Self {
        Self::new(format!("```{highlight}"), "```", MAX_PAGE_SIZE)
    }

    /// Room left for line content on a page, after the fences and the
    /// newlines that join them.
    fn line_budget(&self) -> usize {
        self.max_size
            .saturating_sub(self.prefix.len() + self.suffix.len() + 2)
            .max(1)
    }

    /// Add a logical line, splitting it first if it alone exceeds the
    /// per-line budget.
    pub fn add_line(&mut self, line: &str) {
        for chunk in split_line(line, self.line_budget()) {
            self.push_line(chunk);
        }
    }

    fn push_line(&mut self, line: String) {
        let added = line.len() + 1;
        if self.current_len + added + self.suffix.len() > self.max_size {
            self.close_page();
        }
        self.current_len += added;
        self.current.push(line);
    }

    fn close_page(&mut self) {
        self.closed.push(render_page(
            &self.prefix,
            &self.current,
            &self.suffix,
        ));
        self.current.clear();
        self.current_len = self.prefix.len() + 1;
    }

    /// All pages, including the one still being filled.
    pub fn pages(&self) -> Vec<String> {
        let mut pages = self.closed.clone();
        if !self.current.is_empty() {
            pages.push(render_page(&self.prefix, &self.current, &self.suffix));
        }
        pages
    }
}

fn render_page(prefix: &str, lines: &[String], suffix: &str) -> String {
    format!("{prefix}\n{}\n{suffix}", lines.join("\n"))
}

/// Split a line into chunks of at most `budget` bytes.
///
/// Cuts fall on char boundaries and never inside a backtick run, so a
/// rewrapped chunk cannot accidentally close its own fence.
fn split_line(line: &str, budget: usize) -> Vec<String> {
    if line.len() <= budget {
        return vec![line.to_string()];
    }
    let mut chunks = Vec::new();
    let mut rest = line;
    while rest.len() > budget {
        let mut cut = budget;
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let adjusted = backtick_safe_cut(rest, cut);
        let cut = if adjusted > 0 { adjusted } else { cut };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks.push(rest.to_string());
    chunks
}

/// Walk a cut point left until it no longer splits a backtick run.
fn backtick_safe_cut(s: &str, mut cut: usize) -> usize {
    let bytes = s.as_bytes();
    while cut > 0 && bytes[cut - 1] == b'`' && bytes[cut] == b'`' {
        cut -= 1;
    }
    cut
}

/// Wrap content in a fenced code block with a highlight tag.
pub fn wrap_codeblock(content: &str, highlight: &str) -> String {
    format!("```{highlight}\n{content}\n```")
}

/// Strip a code fence (or inline backticks) from message content.
///
/// The inverse of [`wrap_codeblock`]: the fence line and the single
/// newline before the closing fence are removed, nothing else. Content
/// without any fence passes through unchanged.
pub fn strip_codeblock(content: &str) -> &str {
    let trimmed = content.trim();
    if let Some(inner) = trimmed
        .strip_prefix("```")
        .and_then(|s| s.strip_suffix("```"))
    {
        return match inner.split_once('\n') {
            Some((_tag, body)) => body.strip_suffix('\n').unwrap_or(body),
            None => inner,
        };
    }
    if let Some(inner) = trimmed
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
    {
        return inner;
    }
    trimmed
}
