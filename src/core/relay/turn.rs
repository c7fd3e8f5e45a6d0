//! Per-turn text buffering.

/// Buffers the text fragments of the current model turn.
///
/// Owned by the outbound relay of one session. Text from a completed turn is
/// never carried into the next one: [`TurnAccumulator::flush_if_non_empty`]
/// always leaves the buffer empty.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    buffer: String,
}

impl TurnAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Take the buffered text, or `None` if nothing was appended since the
    /// last flush.
    pub fn flush_if_non_empty(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffered length in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }
}
