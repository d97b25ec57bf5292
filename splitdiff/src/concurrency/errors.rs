use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{SplitDiffError, SplitDiffResult};

/// Thread-safe collector of the errors produced by concurrent tasks.
///
/// Clones share the same underlying list.
#[derive(Debug, Clone, Default)]
pub struct ErrorRecorder {
    errors: Arc<Mutex<Vec<SplitDiffError>>>,
}

impl ErrorRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, error: SplitDiffError) {
        self.errors.lock().push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.lock().is_empty()
    }

    pub fn errors(&self) -> Vec<SplitDiffError> {
        self.errors.lock().clone()
    }

    /// Returns `Ok(())` if nothing was recorded, otherwise a single error or the aggregate.
    pub fn result(&self) -> SplitDiffResult<()> {
        let mut errors = self.errors();
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(SplitDiffError::many(errors)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::splitdiff_error;

    #[test]
    fn empty_recorder_is_ok() {
        let recorder = ErrorRecorder::new();

        assert!(!recorder.has_errors());
        assert!(recorder.result().is_ok());
    }

    #[test]
    fn single_error_is_returned_as_is() {
        let recorder = ErrorRecorder::new();
        recorder.record_error(splitdiff_error!(ErrorKind::TableScanFailed, "scan failed"));

        let err = recorder.result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TableScanFailed);
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn clones_share_errors() {
        let recorder = ErrorRecorder::new();
        let clone = recorder.clone();

        clone.record_error(splitdiff_error!(ErrorKind::RowReadFailed, "read failed"));
        recorder.record_error(splitdiff_error!(
            ErrorKind::TableHasDifferences,
            "table differs"
        ));

        let err = recorder.result().unwrap_err();
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::RowReadFailed, ErrorKind::TableHasDifferences]
        );
    }
}
