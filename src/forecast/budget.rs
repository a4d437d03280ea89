//! Gas demand budget ratios and the gas-specific derived fields.
//!
//! The budget ratio is the historical share of peak electricity demand that
//! was covered by gas plus solar, per day type. A day's budgeted gas target is
//! what that share implies once its own solar output is subtracted.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// `num / den`, or 0.0 when the result would not be finite.
pub fn safe_ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        return 0.0;
    }
    let r = num / den;
    if r.is_finite() {
        r
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GasShares {
    pub residual_load: f64,
    pub solar_share: f64,
    pub residual_share: f64,
}

/// Residual load and the solar/residual shares of a day's peak.
pub fn gas_shares(peak_demand: f64, solar_peak: f64) -> GasShares {
    let residual_load = peak_demand - solar_peak;
    GasShares {
        residual_load,
        solar_share: safe_ratio(solar_peak, peak_demand),
        residual_share: safe_ratio(residual_load, peak_demand),
    }
}

/// Day-over-day growth of gas demand between t-2 and t-1.
pub fn gas_growth_rate(yesterday: Option<f64>, day_before: Option<f64>) -> Option<f64> {
    match (yesterday, day_before) {
        (Some(g1), Some(g2)) => Some(safe_ratio(g1 - g2, g2)),
        _ => None,
    }
}

/// One fully instrumented day usable for fitting the budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetSample {
    pub date: NaiveDate,
    pub is_business_day: bool,
    pub peak_demand: f64,
    pub gas_demand: f64,
    pub solar_peak: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GasBudget {
    pub business_ratio: f64,
    pub non_business_ratio: f64,
    pub business_rows: usize,
    pub non_business_rows: usize,
}

impl GasBudget {
    /// Fit both ratios from training samples on or after `cutoff`.
    ///
    /// A day type without samples borrows the other type's ratio. Returns
    /// `None` when no sample is eligible at all.
    pub fn fit(samples: &[BudgetSample], cutoff: Option<NaiveDate>) -> Option<Self> {
        let mut business = (0.0, 0usize);
        let mut other = (0.0, 0usize);

        for s in samples
            .iter()
            .filter(|s| cutoff.map_or(true, |c| s.date >= c))
            .filter(|s| s.peak_demand > 0.0)
        {
            let ratio = safe_ratio(s.gas_demand + s.solar_peak, s.peak_demand);
            let acc = if s.is_business_day {
                &mut business
            } else {
                &mut other
            };
            acc.0 += ratio;
            acc.1 += 1;
        }

        let mean = |(sum, n): (f64, usize)| (n > 0).then(|| sum / n as f64);
        let (business_ratio, non_business_ratio) = match (mean(business), mean(other)) {
            (Some(b), Some(o)) => (b, o),
            (Some(b), None) => (b, b),
            (None, Some(o)) => (o, o),
            (None, None) => return None,
        };

        debug!(
            business_ratio,
            non_business_ratio,
            business_rows = business.1,
            non_business_rows = other.1,
            "gas budget fitted"
        );

        Some(Self {
            business_ratio,
            non_business_ratio,
            business_rows: business.1,
            non_business_rows: other.1,
        })
    }

    pub fn ratio_for(&self, is_business_day: bool) -> f64 {
        if is_business_day {
            self.business_ratio
        } else {
            self.non_business_ratio
        }
    }

    /// `peak * ratio - solar`, clipped at zero.
    pub fn budgeted_target(&self, peak_demand: f64, solar_peak: f64, is_business_day: bool) -> f64 {
        (peak_demand * self.ratio_for(is_business_day) - solar_peak).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(day: u32, business: bool, peak: f64, gas: f64, solar: f64) -> BudgetSample {
        BudgetSample {
            date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            is_business_day: business,
            peak_demand: peak,
            gas_demand: gas,
            solar_peak: solar,
        }
    }

    #[test]
    fn test_ratios_per_day_type() {
        let samples = vec![
            sample(1, true, 100.0, 30.0, 10.0),  // 0.4
            sample(2, true, 100.0, 50.0, 10.0),  // 0.6
            sample(6, false, 100.0, 10.0, 10.0), // 0.2
        ];
        let budget = GasBudget::fit(&samples, None).unwrap();
        assert!((budget.business_ratio - 0.5).abs() < 1e-12);
        assert!((budget.non_business_ratio - 0.2).abs() < 1e-12);
        assert_eq!(budget.business_rows, 2);

        assert!((budget.budgeted_target(200.0, 20.0, true) - 80.0).abs() < 1e-9);
        assert_eq!(budget.budgeted_target(100.0, 50.0, false), 0.0);
    }

    #[test]
    fn test_cutoff_excludes_stale_rows() {
        let samples = vec![
            sample(1, true, 100.0, 90.0, 0.0),
            sample(10, true, 100.0, 30.0, 0.0),
        ];
        let cutoff = NaiveDate::from_ymd_opt(2024, 4, 5);
        let budget = GasBudget::fit(&samples, cutoff).unwrap();
        assert!((budget.business_ratio - 0.3).abs() < 1e-12);
        assert_eq!(budget.non_business_ratio, budget.business_ratio);
    }

    #[test]
    fn test_no_eligible_rows() {
        assert_eq!(GasBudget::fit(&[sample(1, true, 0.0, 5.0, 1.0)], None), None);
    }

    #[test]
    fn test_growth_rate_guards_zero() {
        assert_eq!(gas_growth_rate(Some(10.0), Some(0.0)), Some(0.0));
        assert_eq!(gas_growth_rate(Some(12.0), Some(10.0)), Some(0.2));
        assert_eq!(gas_growth_rate(None, Some(10.0)), None);
    }

    proptest! {
        #[test]
        fn prop_zero_peak_shares_are_zero(solar in -1e6f64..1e6) {
            let s = gas_shares(0.0, solar);
            prop_assert_eq!(s.solar_share, 0.0);
            prop_assert_eq!(s.residual_share, 0.0);
        }

        #[test]
        fn prop_shares_are_finite(peak in -1e6f64..1e6, solar in -1e6f64..1e6) {
            let s = gas_shares(peak, solar);
            prop_assert!(s.solar_share.is_finite());
            prop_assert!(s.residual_share.is_finite());
        }
    }
}
