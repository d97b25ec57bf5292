//! Macros for building and returning [`crate::error::SplitDiffError`] values.

/// Creates a [`crate::error::SplitDiffError`] from an error kind, a static description and an
/// optional dynamic detail.
#[macro_export]
macro_rules! splitdiff_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SplitDiffError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SplitDiffError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Returns a [`crate::error::SplitDiffError`] from the current function.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::splitdiff_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::splitdiff_error!($kind, $desc, $detail))
    };
}
