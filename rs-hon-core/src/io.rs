use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::{fs, io, thread};

use log::{debug, info};

use crate::errors::{LoadError, LoadResult};
use crate::statistics::PathStatistics;

/// Layout of a path-record file.
///
/// One path per line, nodes separated by `separator`. With `frequency`,
/// the last field is the number of times the path was observed
/// (`a,c,d,2`); otherwise each line counts once.
#[derive(Clone, Debug, PartialEq)]
pub struct PathFormat {
	pub separator: char,
	pub frequency: bool,
}

impl Default for PathFormat {
	fn default() -> Self {
		Self { separator: ',', frequency: false }
	}
}

/// Loads path statistics from a record file.
///
/// - Checks if a binary cache (`<stem>.bin` next to the file) exists for fast loading
/// - Otherwise parses the file with multithreaded chunking and writes the cache
/// - Uses `postcard` for compact serialization/deserialization
pub fn load_statistics<P: AsRef<Path>>(filepath: P, format: &PathFormat) -> LoadResult<PathStatistics> {
	let binary_data_path = build_output_path(&filepath, "bin")?;
	if binary_data_path.exists() {
		debug!("loading cached statistics from {}", binary_data_path.display());
		let bytes = fs::read(&binary_data_path)?;
		return Ok(postcard::from_bytes(&bytes)?);
	}

	let lines = read_file(&filepath)?;
	let statistics = parse_statistics(&lines, format)?;
	info!(
		"parsed {} paths ({} distinct) from {}",
		statistics.total_count(),
		statistics.len(),
		filepath.as_ref().display()
	);

	let bytes = postcard::to_stdvec(&statistics)?;
	fs::write(binary_data_path, bytes)?;
	Ok(statistics)
}

/// Parses path records into statistics.
///
/// # Behavior
/// - Splits the lines into chunks (based on CPU cores * factor)
/// - Parses each chunk into partial statistics on its own thread
/// - Merges the partial statistics
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Errors
/// The error of the first invalid line (by line number) is returned.
pub fn parse_statistics(lines: &[String], format: &PathFormat) -> LoadResult<PathStatistics> {
	if lines.is_empty() {
		return Ok(PathStatistics::new());
	}
	let cpus = num_cpus::get();
	let factor = 8;
	let chunks = cpus * factor;
	let chunk_size = lines.len().div_ceil(chunks).max(1);

	let (tx, rx) = mpsc::channel();
	thread::scope(|scope| {
		for (index, chunk) in lines.chunks(chunk_size).enumerate() {
			let tx = tx.clone();
			scope.spawn(move || {
				let first_line = index * chunk_size + 1;
				let _ = tx.send(parse_chunk(chunk, first_line, format));
			});
		}
	});
	drop(tx);

	let mut statistics = PathStatistics::new();
	let mut first_error: Option<(usize, LoadError)> = None;
	for partial in rx.iter() {
		match partial {
			Ok(partial) => statistics.merge(&partial),
			Err((line, error)) => {
				if first_error.as_ref().is_none_or(|(first, _)| line < *first) {
					first_error = Some((line, error));
				}
			}
		}
	}
	match first_error {
		Some((_, error)) => Err(error),
		None => Ok(statistics),
	}
}

/// Parses one record. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str, line_number: usize, format: &PathFormat) -> LoadResult<Option<(Vec<String>, u64)>> {
	let trimmed = line.trim();
	if trimmed.is_empty() || trimmed.starts_with('#') {
		return Ok(None);
	}

	let mut fields: Vec<&str> = trimmed.split(format.separator).map(str::trim).collect();
	let count = if format.frequency {
		let value = fields.pop().unwrap_or_default();
		parse_frequency(value).ok_or_else(|| LoadError::InvalidFrequency {
			line: line_number,
			value: value.to_owned(),
		})?
	} else {
		1
	};

	let nodes: Vec<String> = fields
		.into_iter()
		.filter(|node| !node.is_empty())
		.map(str::to_owned)
		.collect();
	Ok(Some((nodes, count)))
}

/// Accepts `"3"` as well as integral floats such as `"3.0"`.
fn parse_frequency(value: &str) -> Option<u64> {
	if let Ok(count) = value.parse::<u64>() {
		return Some(count);
	}
	let value: f64 = value.parse().ok()?;
	if value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64 {
		Some(value as u64)
	} else {
		None
	}
}

fn parse_chunk(
	lines: &[String],
	first_line: usize,
	format: &PathFormat,
) -> Result<PathStatistics, (usize, LoadError)> {
	let mut statistics = PathStatistics::new();
	for (offset, line) in lines.iter().enumerate() {
		let line_number = first_line + offset;
		let Some((nodes, count)) = parse_line(line, line_number, format).map_err(|e| (line_number, e))? else {
			continue;
		};
		statistics
			.add(&nodes, count)
			.map_err(|source| (line_number, LoadError::InvalidRecord { line: line_number, source }))?;
	}
	Ok(statistics)
}

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/paths.dat` + `"bin"` → `data/paths.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/flights.dat"` → `"flights"`
/// - `"flights.dat"` → `"flights"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}
