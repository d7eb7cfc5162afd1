use crate::errors::{ModelError, ModelResult};

/// Default significance threshold of the order estimation.
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Configuration of [`MultiOrderModel::estimate_order_with`].
///
/// [`MultiOrderModel::estimate_order_with`]: super::multi_order::MultiOrderModel::estimate_order_with
///
/// # Invariants
/// - `significance` is always strictly between 0 and 1
#[derive(Clone, Debug, PartialEq)]
pub struct OrderSelection {
	/// Threshold below which a p-value rejects the lower order.
	significance: f64,

	/// Stop at the first successive pair whose test does not reject,
	/// instead of scanning every pair up to the maximum order.
	pub stop_at_first: bool,
}

impl Default for OrderSelection {
	fn default() -> Self {
		Self { significance: DEFAULT_SIGNIFICANCE, stop_at_first: false }
	}
}

impl OrderSelection {
	/// Creates a configuration with the given significance.
	///
	/// # Errors
	/// Returns an error if `significance` is outside (0, 1).
	pub fn with_significance(significance: f64) -> ModelResult<Self> {
		let mut selection = Self::default();
		selection.set_significance(significance)?;
		Ok(selection)
	}

	/// Returns the current significance threshold.
	pub fn significance(&self) -> f64 {
		self.significance
	}

	/// Sets the significance threshold.
	///
	/// # Errors
	/// Returns an error if the value is outside (0, 1).
	pub fn set_significance(&mut self, significance: f64) -> ModelResult<()> {
		if !(significance > 0.0 && significance < 1.0) {
			return Err(ModelError::InvalidSignificance(significance));
		}
		self.significance = significance;
		Ok(())
	}
}
