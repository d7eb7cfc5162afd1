//! Likelihood-ratio testing between nested path models.
//!
//! Stateless helpers: degrees-of-freedom differencing, the Wilks statistic
//! `x = -2 (log L0 - log L1)` and the chi-square survival function used to
//! turn it into a p-value. Every function is total on its numeric domain;
//! degenerate inputs map to a boundary p-value instead of failing.

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Survival function `P(X > x)` of a chi-square distribution with `dof`
/// degrees of freedom. Injected into models so tests can swap it out.
pub type SurvivalFn = fn(f64, u64) -> f64;

/// Result of a likelihood-ratio test. Accepting or rejecting is left to
/// the caller through [`rejects`](Self::rejects).
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct TestOutcome {
	statistic: f64,
	dof: u64,
	p_value: f64,
}

impl TestOutcome {
	/// Test statistic `-2 (log L0 - log L1)`.
	pub fn statistic(&self) -> f64 {
		self.statistic
	}

	/// Difference in degrees of freedom between the two models.
	pub fn dof(&self) -> u64 {
		self.dof
	}

	/// Asymptotic chi-square p-value of the null hypothesis.
	pub fn p_value(&self) -> f64 {
		self.p_value
	}

	/// Whether the null hypothesis is rejected at `significance`.
	pub fn rejects(&self, significance: f64) -> bool {
		self.p_value < significance
	}
}

/// Chi-square survival function `1 - CDF(x; dof)`.
///
/// - `dof = 0`: no parameter difference, so `1` for `x <= 0` and `0` otherwise
/// - `x <= 0` or NaN: `1`
/// - `x = +inf`: `0`
/// - a distribution that cannot be evaluated maps to `1`, the extreme that
///   never rejects
pub fn chi2_survival(x: f64, dof: u64) -> f64 {
	if x.is_nan() {
		return 1.0;
	}
	if dof == 0 {
		return if x <= 0.0 { 1.0 } else { 0.0 };
	}
	if x <= 0.0 {
		return 1.0;
	}
	if x.is_infinite() {
		return 0.0;
	}
	match ChiSquared::new(dof as f64) {
		Ok(distribution) => {
			let p = distribution.sf(x);
			if p.is_finite() { p.clamp(0.0, 1.0) } else { 1.0 }
		}
		Err(_) => 1.0,
	}
}

/// Wilks statistic `-2 (log L0 - log L1)`.
///
/// Identical log-likelihoods (including two `-inf`) give `0`.
pub fn likelihood_ratio_statistic(loglik_null: f64, loglik_alt: f64) -> f64 {
	if loglik_null == loglik_alt {
		return 0.0;
	}
	-2.0 * (loglik_null - loglik_alt)
}

/// Additional free parameters of the alternative over the null model.
pub fn dof_difference(dof_null: u64, dof_alt: u64) -> u64 {
	dof_alt.saturating_sub(dof_null)
}

/// Likelihood-ratio test using [`chi2_survival`].
pub fn likelihood_ratio_test(loglik_null: f64, loglik_alt: f64, dof_null: u64, dof_alt: u64) -> TestOutcome {
	likelihood_ratio_test_with(chi2_survival, loglik_null, loglik_alt, dof_null, dof_alt)
}

/// Likelihood-ratio test with an explicit survival function.
pub fn likelihood_ratio_test_with(
	survival: SurvivalFn,
	loglik_null: f64,
	loglik_alt: f64,
	dof_null: u64,
	dof_alt: u64,
) -> TestOutcome {
	let statistic = likelihood_ratio_statistic(loglik_null, loglik_alt);
	let dof = dof_difference(dof_null, dof_alt);
	TestOutcome { statistic, dof, p_value: survival(statistic, dof) }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_dof_is_a_step_function() {
		assert_eq!(chi2_survival(0.0, 0), 1.0);
		assert_eq!(chi2_survival(-1.0, 0), 1.0);
		assert_eq!(chi2_survival(1e-9, 0), 0.0);
		assert_eq!(chi2_survival(42.0, 0), 0.0);
	}

	#[test]
	fn survival_matches_known_values() {
		// P(X > 3.841) = 0.05 for one degree of freedom
		assert!((chi2_survival(3.841_458_820_694_124, 1) - 0.05).abs() < 1e-9);
		// with two degrees of freedom the survival function is exp(-x / 2)
		assert!((chi2_survival(5.0, 2) - (-2.5f64).exp()).abs() < 1e-12);
	}

	#[test]
	fn boundary_inputs_map_to_extremes() {
		assert_eq!(chi2_survival(f64::NAN, 3), 1.0);
		assert_eq!(chi2_survival(f64::INFINITY, 3), 0.0);
		assert_eq!(chi2_survival(-0.5, 3), 1.0);
	}

	#[test]
	fn statistic_handles_impossible_models() {
		assert_eq!(likelihood_ratio_statistic(f64::NEG_INFINITY, f64::NEG_INFINITY), 0.0);
		assert_eq!(likelihood_ratio_statistic(f64::NEG_INFINITY, -3.0), f64::INFINITY);
		assert_eq!(likelihood_ratio_statistic(-2.0, -1.0), 2.0);
	}

	#[test]
	fn toy_first_versus_second_order() {
		// first-order likelihood 0.5^4, second-order likelihood 1
		let outcome = likelihood_ratio_test(4.0 * 0.5f64.ln(), 0.0, 1, 2);
		assert_eq!(outcome.dof(), 1);
		assert!((outcome.statistic() - 5.545_177_444_479_562).abs() < 1e-9);
		assert!((outcome.p_value() - 0.0185).abs() < 5e-4);
		assert!(outcome.rejects(0.05));
		assert!(!outcome.rejects(0.01));
	}

	#[test]
	fn dof_difference_saturates() {
		assert_eq!(dof_difference(5, 3), 0);
		assert_eq!(dof_difference(3, 5), 2);
	}

	#[test]
	fn survival_function_can_be_injected() {
		fn always_half(_: f64, _: u64) -> f64 {
			0.5
		}
		let outcome = likelihood_ratio_test_with(always_half, -10.0, 0.0, 0, 4);
		assert_eq!(outcome.p_value(), 0.5);
		assert_eq!(outcome.statistic(), 20.0);
	}
}
