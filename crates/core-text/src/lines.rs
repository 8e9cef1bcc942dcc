//! Line metrics used to clamp positions.

/// Read-only view of a document's line structure.
///
/// Lengths exclude line terminators and are measured in `char`s.
pub trait TextLineProvider {
    fn line_count(&self) -> usize;

    /// Length of `line`, or `None` when the index is past the last line.
    fn line_length(&self, line: usize) -> Option<usize>;
}

/// Line lengths computed eagerly from a text.
///
/// `\n`, `\r\n` and a lone `\r` each terminate a line. Empty text has a
/// single empty line, and a trailing terminator opens a final empty line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineLengths {
    lengths: Vec<usize>,
}

impl LineLengths {
    pub fn from_text(text: &str) -> Self {
        let mut lengths = Vec::new();
        let mut current = 0usize;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '\r' => {
                    lengths.push(current);
                    current = 0;
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                }
                '\n' => {
                    lengths.push(current);
                    current = 0;
                }
                _ => current += 1,
            }
        }
        lengths.push(current);
        Self { lengths }
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.lengths
    }
}

impl TextLineProvider for LineLengths {
    fn line_count(&self) -> usize {
        self.lengths.len()
    }

    fn line_length(&self, line: usize) -> Option<usize> {
        self.lengths.get(line).copied()
    }
}

impl<T: TextLineProvider + ?Sized> TextLineProvider for &T {
    fn line_count(&self) -> usize {
        (**self).line_count()
    }
    fn line_length(&self, line: usize) -> Option<usize> {
        (**self).line_length(line)
    }
}
