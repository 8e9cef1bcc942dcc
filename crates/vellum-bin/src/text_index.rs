use core_text::{TextLineProvider, TextPosition};

/// Char offsets of every line start in a text, for converting between
/// `(line, column)` positions and buffer offsets.
///
/// `\n`, `\r\n` and a lone `\r` terminate lines, matching
/// [`core_text::LineLengths`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    lengths: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        let mut lengths = Vec::new();
        let mut offset = 0usize;
        let mut current = 0usize;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            offset += 1;
            match ch {
                '\r' | '\n' => {
                    if ch == '\r' && chars.peek() == Some(&'\n') {
                        chars.next();
                        offset += 1;
                    }
                    lengths.push(current);
                    starts.push(offset);
                    current = 0;
                }
                _ => current += 1,
            }
        }
        lengths.push(current);
        Self { starts, lengths }
    }

    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.starts.get(line).copied()
    }

    /// Clamp `position` onto an existing line and column.
    pub fn clamp(&self, position: TextPosition) -> TextPosition {
        let line = position.line.min(self.lengths.len() - 1);
        TextPosition::new(line, position.column.min(self.lengths[line]))
    }

    /// Buffer offset of `position` after clamping.
    pub fn offset_of(&self, position: TextPosition) -> usize {
        let p = self.clamp(position);
        self.starts[p.line] + p.column
    }

    /// Position of `offset`; offsets inside a terminator map to the end of
    /// its line and offsets past the end to the end of the text.
    pub fn position_of(&self, offset: usize) -> TextPosition {
        let line = self.starts.partition_point(|&s| s <= offset) - 1;
        TextPosition::new(line, (offset - self.starts[line]).min(self.lengths[line]))
    }
}

impl TextLineProvider for LineIndex {
    fn line_count(&self) -> usize {
        self.lengths.len()
    }

    fn line_length(&self, line: usize) -> Option<usize> {
        self.lengths.get(line).copied()
    }
}
