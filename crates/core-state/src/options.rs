use thiserror::Error;

pub const DEFAULT_MAX_CARET_COUNT: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaretOptionsError {
    #[error("invalid caret configuration: {0}")]
    InvalidConfiguration(String),
}

/// Normalization policy for [`crate::CaretSelectionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretSelectionManagerOptions {
    max_caret_count: usize,
    pub deduplicate_carets: bool,
    pub sort_carets_by_position: bool,
}

impl Default for CaretSelectionManagerOptions {
    fn default() -> Self {
        Self {
            max_caret_count: DEFAULT_MAX_CARET_COUNT,
            deduplicate_carets: true,
            sort_carets_by_position: true,
        }
    }
}

impl CaretSelectionManagerOptions {
    pub fn new(
        max_caret_count: usize,
        deduplicate_carets: bool,
        sort_carets_by_position: bool,
    ) -> Result<Self, CaretOptionsError> {
        let mut options = Self {
            deduplicate_carets,
            sort_carets_by_position,
            ..Self::default()
        };
        options.set_max_caret_count(max_caret_count)?;
        Ok(options)
    }

    pub fn max_caret_count(&self) -> usize {
        self.max_caret_count
    }

    pub fn set_max_caret_count(&mut self, value: usize) -> Result<(), CaretOptionsError> {
        if value == 0 {
            return Err(CaretOptionsError::InvalidConfiguration(
                "max_caret_count must be greater than zero".into(),
            ));
        }
        self.max_caret_count = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let o = CaretSelectionManagerOptions::default();
        assert_eq!(o.max_caret_count(), 128);
        assert!(o.deduplicate_carets);
        assert!(o.sort_carets_by_position);
    }

    #[test]
    fn zero_caret_limit_is_rejected() {
        assert!(CaretSelectionManagerOptions::new(0, true, true).is_err());
        let mut o = CaretSelectionManagerOptions::default();
        assert!(o.set_max_caret_count(0).is_err());
        assert_eq!(o.max_caret_count(), 128);
    }
}
