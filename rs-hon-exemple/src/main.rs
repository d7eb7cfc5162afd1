use rs_hon_core::hypothesis::likelihood_ratio_test;
use rs_hon_core::io::{get_filename, list_files, load_statistics, PathFormat};
use rs_hon_core::{HigherOrderNetwork, MultiOrderModel, OrderSelection, PathStatistics};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Two paths through c, each observed twice: the first node decides the last one
    let mut toy = PathStatistics::new();
    toy.add_path("a,c,d", 2)?;
    toy.add_path("b,c,e", 2)?;

    // Fixed-order models: first order forgets where the path came from
    let first = HigherOrderNetwork::fitted(&toy, 1);
    let second = HigherOrderNetwork::fitted(&toy, 2);
    let second_null = HigherOrderNetwork::null(&toy, 2);
    println!("first order:  {} nodes, {} edges, dof {}", first.node_count(), first.edge_count(), first.degrees_of_freedom());
    println!("second order: {} nodes, {} edges, dof {}", second.node_count(), second.edge_count(), second.degrees_of_freedom());
    println!("likelihood (order 1):      {}", first.likelihood(&toy, false));
    println!("likelihood (order 2):      {}", second.likelihood(&toy, false));
    println!("likelihood (order 2 null): {}", second_null.likelihood(&toy, false));

    let outcome = likelihood_ratio_test(
        first.log_likelihood(&toy),
        second.log_likelihood(&toy),
        first.degrees_of_freedom(),
        second.degrees_of_freedom(),
    );
    println!("fixed-order test 1 vs 2: x = {:.3}, d = {}, p = {:.4}", outcome.statistic(), outcome.dof(), outcome.p_value());

    // The multi-order model evaluates every node once, whatever the maximum order
    let model = MultiOrderModel::build(&toy, 2);
    for max_order in 0..=model.max_order() {
        println!(
            "multi-order likelihood (K = {}): {:.6}",
            max_order,
            model.likelihood(None, max_order, false)?
        );
    }
    let outcome = model.likelihood_ratio_test(None, 1, 2)?;
    println!("multi-order test 1 vs 2: x = {:.3}, d = {}, p = {:.4}", outcome.statistic(), outcome.dof(), outcome.p_value());
    println!("estimated order: {}", model.estimate_order(None, 0.05)?);

    // Ten times the same observations carry ten times the evidence
    let scaled = toy.scale(10)?;
    let scaled_model = MultiOrderModel::build(&scaled, 2);
    println!("estimated order (x10): {}", scaled_model.estimate_order(None, 0.05)?);

    // Memory hidden behind an unambiguous step: only the third order sees it
    let mut chain = PathStatistics::new();
    chain.add_path("a,c,d,f", 5)?;
    chain.add_path("b,c,d,g", 5)?;
    let chain_model = MultiOrderModel::build(&chain, 3);
    println!("chain: estimated order {}", chain_model.estimate_order(None, 0.05)?);

    let mut selection = OrderSelection::with_significance(0.01)?;
    selection.stop_at_first = true;
    println!("chain: estimated order (stop at first) {}", chain_model.estimate_order_with(None, &selection)?);

    // Invalid settings are rejected
    match OrderSelection::with_significance(1.5) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }
    match chain_model.likelihood_ratio_test(None, 2, 1) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    for i in 0..5 {
        println!("generated path {}: {}", i + 1, chain_model.generate_path(8).join(","));
    }

    // Path records in ./data (one path per line, last field is the frequency)
    let format = PathFormat { separator: ',', frequency: true };
    if let Ok(files) = list_files("./data", "dat") {
        for file in files {
            let statistics = load_statistics(format!("./data/{file}"), &format)?;
            let model = MultiOrderModel::build(&statistics, 3);
            println!("{}: estimated order {}", get_filename(&file)?, model.estimate_order(None, 0.05)?);
        }
    }

    Ok(())
}
