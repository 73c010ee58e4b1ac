//! The output sink contract toward the host chat layer.
//!
//! The core never talks to a chat platform directly. Anything it wants
//! displayed goes through an [`OutputSink`], which is responsible for
//! splitting content that exceeds the platform message-size limit into
//! multiple messages/pages.

use async_trait::async_trait;

/// Options forwarded with each send.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Wrap the content in a fenced code block before sending.
    pub codeblock: bool,
    /// Highlight language tag used when wrapping (or re-wrapping pages).
    pub highlight: String,
    /// Force pagination controls even when the content fits one message.
    pub forced_pagination: bool,
    /// Skip all processing and hand the content to the platform as-is.
    pub raw: bool,
}

impl SendOptions {
    pub fn codeblock(highlight: impl Into<String>) -> Self {
        Self {
            codeblock: true,
            highlight: highlight.into(),
            ..Self::default()
        }
    }
}

/// Accepts chunked text content for display.
///
/// Implementations own pagination: a single send may become several
/// platform messages. `send` replaces the previous content for streaming
/// use cases (a terminal-style transcript that grows in place).
#[async_trait]
pub trait OutputSink: Send {
    async fn send(&mut self, content: &str, options: &SendOptions) -> anyhow::Result<()>;
}

/// Sink that records everything sent to it. Used by tests and the
/// standalone REPL driver.
#[derive(Debug, Default)]
pub struct BufferSink {
    sends: Vec<String>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every content string passed to `send`, in order.
    pub fn sends(&self) -> &[String] {
        &self.sends
    }

    /// The most recent content, if anything was sent.
    pub fn last(&self) -> Option<&str> {
        self.sends.last().map(String::as_str)
    }
}

#[async_trait]
impl OutputSink for BufferSink {
    async fn send(&mut self, content: &str, _options: &SendOptions) -> anyhow::Result<()> {
        self.sends.push(content.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn buffer_sink_records_in_order() {
        let mut sink = BufferSink::new();
        sink.send("one", &SendOptions::default()).await.unwrap();
        sink.send("two", &SendOptions::codeblock("console"))
            .await
            .unwrap();
        assert_eq!(sink.sends(), &["one".to_string(), "two".to_string()]);
        assert_eq!(sink.last(), Some("two"));
    }
}
