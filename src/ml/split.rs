//! Time-respecting train/test partitioning.
//!
//! Nothing here shuffles. The held-out window and every validation fold
//! always lie strictly after the rows used for fitting.

use std::ops::Range;

use chrono::NaiveDate;
use tracing::warn;

use super::training::TrainingError;

/// Number of leading rows assigned to training.
///
/// The test window holds `round(n * p)` rows, clamped so both partitions
/// keep at least one row. Tables with fewer than two rows are all training.
pub fn train_len(n: usize, test_fraction: f64) -> usize {
    if n < 2 {
        return n;
    }
    let n_test = ((n as f64) * test_fraction).round() as usize;
    n - n_test.clamp(1, n - 1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Range<usize>,
    pub test: Range<usize>,
}

impl Split {
    pub fn has_test(&self) -> bool {
        !self.test.is_empty()
    }
}

/// Split date-ordered rows into a leading training block and a trailing
/// test block.
pub fn chronological_split(dates: &[NaiveDate], test_fraction: f64) -> Result<Split, TrainingError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainingError::InvalidTestFraction(test_fraction));
    }
    if dates.windows(2).any(|w| w[0] >= w[1]) {
        return Err(TrainingError::Fit(
            "rows must be strictly ascending by date".to_string(),
        ));
    }

    let n = dates.len();
    let cut = train_len(n, test_fraction);
    if cut == n {
        warn!(rows = n, "too few rows for a held-out window, training on everything");
    }
    Ok(Split {
        train: 0..cut,
        test: cut..n,
    })
}

/// Expanding-window cross-validation splitter.
///
/// Fold `k` trains on everything before its test block; test blocks are
/// consecutive and equally sized, ending at the last row.
#[derive(Debug, Clone, Copy)]
pub struct TimeSeriesSplit {
    n_splits: usize,
}

impl TimeSeriesSplit {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits: n_splits.max(1),
        }
    }

    pub fn split(&self, n: usize) -> Vec<Split> {
        let test_size = n / (self.n_splits + 1);
        if test_size == 0 {
            return Vec::new();
        }
        (0..self.n_splits)
            .map(|k| {
                let train_end = n - (self.n_splits - k) * test_size;
                Split {
                    train: 0..train_end,
                    test: train_end..train_end + test_size,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rstest::rstest;

    fn dates(n: usize) -> Vec<NaiveDate> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n).map(|i| start + Duration::days(i as i64)).collect()
    }

    #[rstest]
    #[case(30, 0.2, 24)]
    #[case(10, 0.25, 7)] // 2.5 rounds away from zero
    #[case(2, 0.2, 1)]
    #[case(3, 0.9, 1)]
    #[case(1, 0.2, 1)]
    #[case(0, 0.2, 0)]
    fn test_train_len(#[case] n: usize, #[case] p: f64, #[case] expected: usize) {
        assert_eq!(train_len(n, p), expected);
    }

    #[test]
    fn test_single_row_has_empty_test_window() {
        let split = chronological_split(&dates(1), 0.2).unwrap();
        assert_eq!(split.train, 0..1);
        assert!(!split.has_test());
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(f64::NAN)]
    fn test_rejects_bad_fraction(#[case] p: f64) {
        assert!(matches!(
            chronological_split(&dates(10), p),
            Err(TrainingError::InvalidTestFraction(_))
        ));
    }

    #[test]
    fn test_expanding_window_folds() {
        let folds = TimeSeriesSplit::new(3).split(40);
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].train, 0..10);
        assert_eq!(folds[0].test, 10..20);
        assert_eq!(folds[2].test, 30..40);
        for f in &folds {
            assert_eq!(f.train.end, f.test.start);
        }
        assert!(TimeSeriesSplit::new(5).split(4).is_empty());
    }

    proptest! {
        #[test]
        fn prop_test_dates_follow_train_dates(n in 2usize..200, p in 0.01f64..0.99) {
            let d = dates(n);
            let split = chronological_split(&d, p).unwrap();
            prop_assert!(!split.train.is_empty());
            prop_assert!(split.has_test());
            let last_train = d[split.train.end - 1];
            for i in split.test.clone() {
                prop_assert!(d[i] > last_train);
            }
        }
    }
}
