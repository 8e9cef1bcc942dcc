use async_trait::async_trait;
use core_render::{
    CancellationToken, LineLayoutInfo, LineLayoutProvider, LineMetricsProvider, MeasureError,
};
use core_text::{LineLengths, TextLineProvider};
use parking_lot::RwLock;

/// Fixed-pitch line geometry: every char is `char_width` wide and every line
/// is `line_height` tall.
///
/// The line table is swapped wholesale when the document changes; readers
/// always see one consistent table.
#[derive(Debug)]
pub struct MonospaceLayout {
    lines: RwLock<LineLengths>,
    char_width: f64,
    line_height: f64,
}

impl MonospaceLayout {
    pub fn new(text: &str, char_width: f64, line_height: f64) -> Self {
        Self {
            lines: RwLock::new(LineLengths::from_text(text)),
            char_width,
            line_height,
        }
    }

    pub fn char_width(&self) -> f64 {
        self.char_width
    }

    pub fn line_height(&self) -> f64 {
        self.line_height
    }

    pub fn line_length(&self, line: usize) -> Option<usize> {
        self.lines.read().line_length(line)
    }

    /// Install a new line table. Returns the first line whose geometry
    /// differs from the old table, or `None` when nothing changed.
    pub fn replace_lines(&self, next: LineLengths) -> Option<usize> {
        let mut lines = self.lines.write();
        let old = lines.as_slice();
        let new = next.as_slice();
        let first = old
            .iter()
            .zip(new)
            .position(|(a, b)| a != b)
            .or_else(|| (old.len() != new.len()).then(|| old.len().min(new.len())));
        *lines = next;
        first
    }
}

impl LineMetricsProvider for MonospaceLayout {
    fn line_count(&self) -> usize {
        self.lines.read().line_count()
    }

    fn line_height(&self, _line: usize) -> f64 {
        self.line_height
    }
}

#[async_trait]
impl LineLayoutProvider for MonospaceLayout {
    fn line_count(&self) -> usize {
        self.lines.read().line_count()
    }

    async fn measure(
        &self,
        line: usize,
        cancel: &CancellationToken,
    ) -> Result<LineLayoutInfo, MeasureError> {
        tokio::task::yield_now().await;
        if cancel.is_cancelled() {
            return Err(MeasureError::Cancelled);
        }
        let length = self
            .line_length(line)
            .ok_or_else(|| MeasureError::Failed(format!("line {line} is past the end")))?;
        Ok(LineLayoutInfo::new(
            line,
            length as f64 * self.char_width,
            self.line_height,
            self.line_height * 0.8,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn replace_reports_first_changed_line() {
        let layout = MonospaceLayout::new("ab\ncd\nef", 8.0, 16.0);
        assert_eq!(layout.replace_lines(LineLengths::from_text("ab\ncd\nef")), None);
        assert_eq!(layout.replace_lines(LineLengths::from_text("ab\ncdx\nef")), Some(1));
        assert_eq!(layout.replace_lines(LineLengths::from_text("ab\ncdx\nef\n")), Some(3));
        assert_eq!(layout.replace_lines(LineLengths::from_text("ab")), Some(1));
        assert_eq!(LineMetricsProvider::line_count(&layout), 1);
    }

    #[tokio::test]
    async fn measures_width_from_char_count() {
        let layout = MonospaceLayout::new("hello\n", 7.5, 20.0);
        let token = CancellationToken::new();
        let info = layout.measure(0, &token).await.unwrap();
        assert_eq!(info, LineLayoutInfo::new(0, 37.5, 20.0, 16.0));
        assert!(matches!(layout.measure(9, &token).await, Err(MeasureError::Failed(_))));
        token.cancel();
        assert!(matches!(layout.measure(0, &token).await, Err(MeasureError::Cancelled)));
    }
}
