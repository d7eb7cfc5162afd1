use std::collections::HashMap;
use std::sync::{Mutex, mpsc};
use std::thread;

use log::{debug, info, trace};
use rand::Rng;

use super::higher_order::HigherOrderNetwork;
use super::selection::OrderSelection;
use crate::errors::{ModelError, ModelResult};
use crate::hypothesis::{SurvivalFn, TestOutcome, chi2_survival, likelihood_ratio_test_with};
use crate::statistics::PathStatistics;

/// Multi-order model: fitted layers of order 0 to `max_order` combined into
/// a single generative model of paths.
///
/// The likelihood of a path is computed hierarchically: its first node is
/// drawn from layer 0, the transition onto position `i` comes from layer
/// `min(i, max_order)`. Every node of every path is therefore evaluated
/// exactly once whatever the maximum order, which makes likelihoods of
/// different maximum orders comparable.
///
/// # Responsibilities
/// - Build and own the layers (in parallel, one worker per order)
/// - Compute hierarchical likelihoods, memoized for the fitted statistics
/// - Run likelihood-ratio tests between maximum orders and estimate the
///   optimal order
/// - Sample new paths
#[derive(Debug)]
pub struct MultiOrderModel {
	max_order: usize,
	/// Layer `k` is stored at index `k`.
	layers: Vec<HigherOrderNetwork>,
	/// Statistics the layers were fitted on.
	statistics: PathStatistics,
	survival: SurvivalFn,
	/// max order -> log-likelihood of `statistics`
	likelihood_cache: Mutex<HashMap<usize, f64>>,
}

impl MultiOrderModel {
	/// Fits layers 0 to `max_order` on `statistics`.
	pub fn build(statistics: &PathStatistics, max_order: usize) -> Self {
		Self::build_with_survival(statistics, max_order, chi2_survival)
	}

	/// Same as [`build`](Self::build) with a custom chi-square survival
	/// function for the likelihood-ratio tests.
	pub fn build_with_survival(statistics: &PathStatistics, max_order: usize, survival: SurvivalFn) -> Self {
		let layers = build_layers(statistics, max_order);
		info!(
			"multi-order model built: max order {}, {} paths, {} distinct nodes",
			max_order,
			statistics.total_count(),
			statistics.nodes().len()
		);
		Self {
			max_order,
			layers,
			statistics: statistics.clone(),
			survival,
			likelihood_cache: Mutex::new(HashMap::new()),
		}
	}

	pub fn max_order(&self) -> usize {
		self.max_order
	}

	/// All layers, indexed by order.
	pub fn layers(&self) -> &[HigherOrderNetwork] {
		&self.layers
	}

	/// Layer of a given order.
	pub fn layer(&self, order: usize) -> Option<&HigherOrderNetwork> {
		self.layers.get(order)
	}

	/// Statistics the model was fitted on.
	pub fn statistics(&self) -> &PathStatistics {
		&self.statistics
	}

	/// Order of the layer evaluating each position of a path of `path_len`
	/// nodes: `min(i, max_order)` for position `i`.
	///
	/// The schedule always has `path_len` entries, one per evaluated factor.
	pub fn layer_schedule(path_len: usize, max_order: usize) -> Vec<usize> {
		(0..path_len).map(|position| position.min(max_order)).collect()
	}

	/// Likelihood of `statistics` (the fitted statistics when `None`) using
	/// layers up to `max_order`, as a log-likelihood when `log` is set.
	///
	/// # Errors
	/// Returns `ModelError::OrderOutOfRange` if `max_order` exceeds the
	/// model's maximum order.
	pub fn likelihood(&self, statistics: Option<&PathStatistics>, max_order: usize, log: bool) -> ModelResult<f64> {
		let log_likelihood = self.log_likelihood(statistics, max_order)?;
		Ok(if log { log_likelihood } else { log_likelihood.exp() })
	}

	/// Log-likelihood of `statistics` using layers up to `max_order`.
	///
	/// `-inf` if any path has a transition of probability 0.
	pub fn log_likelihood(&self, statistics: Option<&PathStatistics>, max_order: usize) -> ModelResult<f64> {
		self.check_order(max_order)?;
		Ok(match statistics {
			Some(statistics) => self.compute_log_likelihood(statistics, max_order),
			None => self.fitted_log_likelihood(max_order),
		})
	}

	/// Log-likelihood of a single path using layers up to `max_order`.
	pub fn path_log_likelihood<S: AsRef<str>>(&self, path: &[S], max_order: usize) -> ModelResult<f64> {
		self.check_order(max_order)?;
		let nodes: Vec<String> = path.iter().map(|node| node.as_ref().to_owned()).collect();
		Ok(self.path_log_likelihood_unchecked(&nodes, max_order))
	}

	/// Weighted number of factors the likelihood of `statistics` consumes at
	/// `max_order`. Equal to the total number of node observations for every
	/// maximum order.
	pub fn evaluated_transitions(&self, statistics: Option<&PathStatistics>, max_order: usize) -> ModelResult<u64> {
		self.check_order(max_order)?;
		let statistics = statistics.unwrap_or(&self.statistics);
		Ok(statistics
			.sequences()
			.map(|(path, count)| self.path_factors(path, max_order).count() as u64 * count)
			.sum())
	}

	/// Sum of the degrees of freedom of layers 0 to `max_order`.
	pub fn degrees_of_freedom(&self, max_order: usize) -> ModelResult<u64> {
		self.check_order(max_order)?;
		Ok(self.layers[..=max_order]
			.iter()
			.map(HigherOrderNetwork::degrees_of_freedom)
			.fold(0u64, u64::saturating_add))
	}

	/// Likelihood-ratio test of maximum order `order_null` against
	/// `order_alt`.
	///
	/// # Errors
	/// - `ModelError::InvalidOrderPair` unless `order_null < order_alt`
	/// - `ModelError::OrderOutOfRange` if `order_alt` exceeds the model
	pub fn likelihood_ratio_test(
		&self,
		statistics: Option<&PathStatistics>,
		order_null: usize,
		order_alt: usize,
	) -> ModelResult<TestOutcome> {
		if order_alt <= order_null {
			return Err(ModelError::InvalidOrderPair { null: order_null, alt: order_alt });
		}
		self.check_order(order_alt)?;

		let loglik_null = self.log_likelihood(statistics, order_null)?;
		let loglik_alt = self.log_likelihood(statistics, order_alt)?;
		let dof_null = self.degrees_of_freedom(order_null)?;
		let dof_alt = self.degrees_of_freedom(order_alt)?;

		let outcome = likelihood_ratio_test_with(self.survival, loglik_null, loglik_alt, dof_null, dof_alt);
		debug!(
			"likelihood ratio test {} vs {}: x = {}, d = {}, p = {}",
			order_null,
			order_alt,
			outcome.statistic(),
			outcome.dof(),
			outcome.p_value()
		);
		Ok(outcome)
	}

	/// Largest order justified by a significant likelihood-ratio test
	/// against the order just below it, 1 if no test rejects.
	///
	/// Uses the fitted statistics when `statistics` is `None`.
	///
	/// # Errors
	/// Returns an error if `significance` is outside (0, 1).
	pub fn estimate_order(&self, statistics: Option<&PathStatistics>, significance: f64) -> ModelResult<usize> {
		let selection = OrderSelection::with_significance(significance)?;
		self.estimate_order_with(statistics, &selection)
	}

	/// Order estimation with a full [`OrderSelection`] configuration.
	///
	/// Successive pairs `(k - 1, k)` are tested for `k = 1..=max_order`;
	/// the result is the largest `k` whose test rejects. With
	/// `stop_at_first`, the scan ends at the first pair that does not reject.
	pub fn estimate_order_with(&self, statistics: Option<&PathStatistics>, selection: &OrderSelection) -> ModelResult<usize> {
		let mut estimated = self.max_order.min(1);
		for order in 1..=self.max_order {
			let outcome = self.likelihood_ratio_test(statistics, order - 1, order)?;
			if outcome.rejects(selection.significance()) {
				estimated = order;
			} else if selection.stop_at_first {
				debug!("order {} not significant, stopping", order);
				break;
			}
		}
		info!("estimated optimal order: {}", estimated);
		Ok(estimated)
	}

	/// Samples a path of at most `max_len` nodes.
	pub fn generate_path(&self, max_len: usize) -> Vec<String> {
		self.generate_path_with(&mut rand::rng(), max_len)
	}

	/// Samples a path of at most `max_len` nodes with the given generator.
	///
	/// The first node is drawn from layer 0 and every following node from
	/// layer `min(i, max_order)`. Generation stops early on a context
	/// without outgoing transitions.
	pub fn generate_path_with<R: Rng + ?Sized>(&self, rng: &mut R, max_len: usize) -> Vec<String> {
		let mut path: Vec<String> = Vec::with_capacity(max_len);
		while path.len() < max_len {
			let position = path.len();
			let order = position.min(self.max_order);
			let context = &path[position - order..];
			let next = self.layers[order]
				.state(context)
				.and_then(|state| state.sample(rng))
				.map(str::to_owned);
			match next {
				Some(node) => path.push(node),
				None => break,
			}
		}
		trace!("generated path of {} nodes", path.len());
		path
	}

	fn check_order(&self, order: usize) -> ModelResult<()> {
		if order > self.max_order {
			return Err(ModelError::OrderOutOfRange { order, max_order: self.max_order });
		}
		Ok(())
	}

	fn fitted_log_likelihood(&self, max_order: usize) -> f64 {
		if let Ok(cache) = self.likelihood_cache.lock() {
			if let Some(log_likelihood) = cache.get(&max_order) {
				trace!("log-likelihood of order {} served from cache", max_order);
				return *log_likelihood;
			}
		}
		let log_likelihood = self.compute_log_likelihood(&self.statistics, max_order);
		if let Ok(mut cache) = self.likelihood_cache.lock() {
			cache.insert(max_order, log_likelihood);
		}
		log_likelihood
	}

	fn compute_log_likelihood(&self, statistics: &PathStatistics, max_order: usize) -> f64 {
		let mut log_likelihood = 0.0;
		for (path, count) in statistics.sequences() {
			let path_log_likelihood = self.path_log_likelihood_unchecked(path, max_order);
			if path_log_likelihood == f64::NEG_INFINITY {
				return f64::NEG_INFINITY;
			}
			log_likelihood += count as f64 * path_log_likelihood;
		}
		log_likelihood
	}

	fn path_log_likelihood_unchecked(&self, path: &[String], max_order: usize) -> f64 {
		let mut log_likelihood = 0.0;
		for probability in self.path_factors(path, max_order) {
			if probability <= 0.0 {
				return f64::NEG_INFINITY;
			}
			log_likelihood += probability.ln();
		}
		log_likelihood
	}

	/// Probabilities multiplied into the likelihood of `path`, one per node.
	fn path_factors<'a>(&'a self, path: &'a [String], max_order: usize) -> impl Iterator<Item = f64> + 'a {
		Self::layer_schedule(path.len(), max_order)
			.into_iter()
			.enumerate()
			.map(move |(position, order)| {
				let context = &path[position - order..position];
				self.layers[order].probability(context, &path[position])
			})
	}
}

/// Fits the layers on scoped workers and collects them by order.
///
/// Orders are split into at most `num_cpus` contiguous chunks, one worker
/// per chunk.
fn build_layers(statistics: &PathStatistics, max_order: usize) -> Vec<HigherOrderNetwork> {
	let orders: Vec<usize> = (0..=max_order).collect();
	let workers = num_cpus::get().max(1);
	let chunk_size = orders.len().div_ceil(workers).max(1);

	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for chunk in orders.chunks(chunk_size) {
			let tx = tx.clone();
			scope.spawn(move || {
				for &order in chunk {
					let layer = HigherOrderNetwork::fitted(statistics, order);
					// rx lives past the scope
					let _ = tx.send((order, layer));
				}
			});
		}
	});
	drop(tx);

	let mut slots: Vec<Option<HigherOrderNetwork>> = (0..=max_order).map(|_| None).collect();
	for (order, layer) in rx.iter() {
		slots[order] = Some(layer);
	}
	slots
		.into_iter()
		.enumerate()
		.map(|(order, slot)| slot.unwrap_or_else(|| HigherOrderNetwork::fitted(statistics, order)))
		.collect()
}
