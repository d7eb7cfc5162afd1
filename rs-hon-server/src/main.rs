use std::sync::Mutex;

use actix_cors::Cors;
use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use rs_hon_core::io::{list_files, load_statistics, PathFormat};
use rs_hon_core::model::higher_order::Edge;
use rs_hon_core::model::selection::DEFAULT_SIGNIFICANCE;
use rs_hon_core::{HigherOrderNode, ModelKind, MultiOrderModel, OrderSelection, PathStatistics};

const DATA_FOLDER: &str = "./data";
const DEFAULT_MAX_ORDER: usize = 3;

#[derive(Deserialize)]
struct DatasetQuery {
	names: Option<String>,
	max_order: Option<usize>,
}

#[derive(Deserialize)]
struct EstimateParams {
	significance: Option<f64>,
	stop_at_first: Option<bool>,
}

#[derive(Deserialize)]
struct LikelihoodParams {
	max_order: Option<usize>,
	log: Option<bool>,
}

#[derive(Deserialize)]
struct TestParams {
	null: usize,
	alt: usize,
}

/// Node and edge set of one layer, for layout collaborators.
#[derive(Serialize)]
struct LayerView {
	order: usize,
	kind: ModelKind,
	degrees_of_freedom: u64,
	nodes: Vec<HigherOrderNode>,
	edges: Vec<Edge>,
}

struct SharedData {
	model: Option<MultiOrderModel>,
	datasets: Vec<String>,
}

macro_rules! lock_or_fail {
	($data:expr) => {
		match $data.lock() {
			Ok(m) => m,
			Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
		}
	};
}

macro_rules! loaded_model {
	($shared:expr) => {
		match &$shared.model {
			Some(model) => model,
			None => return HttpResponse::Conflict().body("No dataset loaded"),
		}
	};
}

#[get("/v1/datasets")]
async fn get_datasets() -> impl Responder {
	match list_files(DATA_FOLDER, "dat") {
		Ok(files) => HttpResponse::Ok().body(files.join("\n").replace(".dat", "")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list datasets"),
	}
}

#[get("/v1/loaded_datasets")]
async fn get_loaded_datasets(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = lock_or_fail!(data);
	HttpResponse::Ok().body(shared_data.datasets.join("\n"))
}

/// HTTP PUT endpoint `/v1/load_datasets`
///
/// Merges the statistics of every named dataset and fits a multi-order
/// model of `max_order` on them, replacing the previously loaded model.
#[put("/v1/load_datasets")]
async fn put_datasets(data: web::Data<Mutex<SharedData>>, query: web::Query<DatasetQuery>) -> impl Responder {
	let query_names = match &query.names {
		Some(s) if !s.trim().is_empty() => s.trim(),
		_ => return HttpResponse::BadRequest().body("Missing or empty dataset name"),
	};
	let names: Vec<String> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.map(str::to_owned)
		.collect();

	let format = PathFormat { separator: ',', frequency: true };
	let mut statistics = PathStatistics::new();
	for name in &names {
		let path = format!("{DATA_FOLDER}/{name}.dat");
		match load_statistics(&path, &format) {
			Ok(partial) => statistics.merge(&partial),
			Err(e) => {
				warn!("failed to load {path}: {e}");
				return HttpResponse::InternalServerError().body(format!("Failed to load dataset: {e}"));
			}
		}
	}

	let max_order = match check_max_order(query.max_order.unwrap_or(DEFAULT_MAX_ORDER), &statistics) {
		Ok(order) => order,
		Err(e) => return HttpResponse::BadRequest().body(e),
	};
	let model = MultiOrderModel::build(&statistics, max_order);

	let mut shared_data = lock_or_fail!(data);
	shared_data.model = Some(model);
	shared_data.datasets = names;
	info!("loaded datasets: {}", shared_data.datasets.join(", "));
	HttpResponse::Ok().body("Datasets loaded successfully")
}

/// A layer above the longest path has no node, so such orders are refused.
fn check_max_order(max_order: usize, statistics: &PathStatistics) -> Result<usize, String> {
	let longest = statistics.max_path_length();
	if max_order > longest {
		return Err(format!("max_order must be at most {longest}, the length of the longest path"));
	}
	Ok(max_order)
}

#[get("/v1/estimate_order")]
async fn get_estimate_order(data: web::Data<Mutex<SharedData>>, query: web::Query<EstimateParams>) -> impl Responder {
	let mut selection = OrderSelection::default();
	if let Err(e) = selection.set_significance(query.significance.unwrap_or(DEFAULT_SIGNIFICANCE)) {
		return HttpResponse::BadRequest().body(e.to_string());
	}
	selection.stop_at_first = query.stop_at_first.unwrap_or(false);

	let shared_data = lock_or_fail!(data);
	let model = loaded_model!(shared_data);
	match model.estimate_order_with(None, &selection) {
		Ok(order) => HttpResponse::Ok().body(order.to_string()),
		Err(e) => HttpResponse::BadRequest().body(e.to_string()),
	}
}

#[get("/v1/likelihood")]
async fn get_likelihood(data: web::Data<Mutex<SharedData>>, query: web::Query<LikelihoodParams>) -> impl Responder {
	let shared_data = lock_or_fail!(data);
	let model = loaded_model!(shared_data);
	let max_order = query.max_order.unwrap_or(model.max_order());
	match model.likelihood(None, max_order, query.log.unwrap_or(true)) {
		Ok(likelihood) => HttpResponse::Ok().body(likelihood.to_string()),
		Err(e) => HttpResponse::BadRequest().body(e.to_string()),
	}
}

/// HTTP GET endpoint `/v1/test`
///
/// Likelihood-ratio test of maximum order `null` against `alt`, as JSON.
#[get("/v1/test")]
async fn get_test(data: web::Data<Mutex<SharedData>>, query: web::Query<TestParams>) -> impl Responder {
	let shared_data = lock_or_fail!(data);
	let model = loaded_model!(shared_data);
	match model.likelihood_ratio_test(None, query.null, query.alt) {
		Ok(outcome) => HttpResponse::Ok().json(outcome),
		Err(e) => HttpResponse::BadRequest().body(e.to_string()),
	}
}

#[get("/v1/layers/{order}")]
async fn get_layer(data: web::Data<Mutex<SharedData>>, order: web::Path<usize>) -> impl Responder {
	let shared_data = lock_or_fail!(data);
	let model = loaded_model!(shared_data);
	let order = order.into_inner();
	let Some(layer) = model.layer(order) else {
		return HttpResponse::NotFound().body(format!("No layer of order {order}"));
	};
	HttpResponse::Ok().json(LayerView {
		order,
		kind: layer.kind(),
		degrees_of_freedom: layer.degrees_of_freedom(),
		nodes: layer.nodes().cloned().collect(),
		edges: layer.edges(),
	})
}

/// Main entry point for the server.
///
/// Starts without a model; datasets from `./data` are loaded on demand
/// through `/v1/load_datasets`. The server binds to 127.0.0.1:5000.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::init();

	let shared_data = SharedData { model: None, datasets: Vec::new() };
	let shared_model = web::Data::new(Mutex::new(shared_data));

	info!("listening on 127.0.0.1:5000");
	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_model.clone())
			.service(get_datasets)
			.service(put_datasets)
			.service(get_loaded_datasets)
			.service(get_estimate_order)
			.service(get_likelihood)
			.service(get_test)
			.service(get_layer)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}
