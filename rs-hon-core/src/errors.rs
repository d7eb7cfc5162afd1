use thiserror::Error;

/// Result alias for model construction and evaluation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result alias for path-record ingestion.
pub type LoadResult<T> = Result<T, LoadError>;

/// Invalid input handed to statistics or models.
///
/// These are surfaced to the caller immediately and never recovered
/// internally. Degenerate computations (zero-probability paths, zero
/// degrees of freedom) are not errors: they produce sentinel values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
	#[error("a path must contain at least one node")]
	EmptyPath,

	#[error("scale factor must be positive, got {0}")]
	InvalidScaleFactor(u64),

	#[error("null order {null} must be strictly below alternative order {alt}")]
	InvalidOrderPair { null: usize, alt: usize },

	#[error("order {order} exceeds the maximum order {max_order} of the model")]
	OrderOutOfRange { order: usize, max_order: usize },

	#[error("significance must lie strictly between 0 and 1, got {0}")]
	InvalidSignificance(f64),
}

/// Failures while turning raw path records into statistics.
#[derive(Error, Debug)]
pub enum LoadError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("statistics cache error: {0}")]
	Cache(#[from] postcard::Error),

	#[error("line {line}: invalid path frequency '{value}'")]
	InvalidFrequency { line: usize, value: String },

	#[error("line {line}: {source}")]
	InvalidRecord { line: usize, source: ModelError },

	#[error(transparent)]
	Model(#[from] ModelError),
}
