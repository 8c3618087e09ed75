use tracing::warn;

pub const DEFAULT_DELIMITERS: &[u8] = b";\n\r";
pub const DEFAULT_MAX_LINE: usize = 256;

/// Splits a byte stream into command lines.
pub struct LineFramer {
    buffer: String,
    delimiters: &'static [u8],
    max_line: usize,
    overflowed: bool,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIMITERS, DEFAULT_MAX_LINE)
    }
}

impl LineFramer {
    pub fn new(delimiters: &'static [u8], max_line: usize) -> Self {
        Self {
            buffer: String::new(),
            delimiters,
            max_line,
            overflowed: false,
        }
    }

    /// Feeds received bytes and returns every line they complete. Empty
    /// lines are skipped; a line longer than the limit is dropped whole.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in bytes {
            if self.delimiters.contains(&byte) {
                if self.overflowed {
                    self.overflowed = false;
                } else if !self.buffer.is_empty() {
                    lines.push(std::mem::take(&mut self.buffer));
                }
                self.buffer.clear();
                continue;
            }

            if self.overflowed {
                continue;
            }

            if self.buffer.len() >= self.max_line {
                warn!(
                    "Discarding line longer than {} bytes: {:?}...",
                    self.max_line,
                    self.buffer.chars().take(16).collect::<String>()
                );
                self.buffer.clear();
                self.overflowed = true;
                continue;
            }

            self.buffer.push(char::from(byte));
        }

        lines
    }

    /// Bytes received since the last delimiter.
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}
