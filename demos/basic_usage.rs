//! Basic usage example for the nested-synth library.
//!
//! This example builds a three-level nested experiment (batches, positions
//! within a batch, labs), prints the simulated table and verifies its layout.
//!
//! Run with `RUST_LOG=debug` to see the build stages.

use nested_synth::table::verify_table;
use nested_synth::{ExperimentBuilder, Factor};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("nested-synth - Basic Usage Example\n");

    let experiment = ExperimentBuilder::new()
        .grand_mean(1.10)
        .factor(
            Factor::new("batch-to-batch", 2, 0.01)
                .with_level_names(["Batch A", "Batch B"])
                .with_level_effects([-0.08, 0.08]),
        )
        .factor(
            Factor::new("within batch", 3, 0.005)
                .with_level_names(["Top", "Middle", "Bottom"])
                .with_level_effects([-0.04, 0.0, 0.03]),
        )
        .factor(Factor::new("lab", 2, 0.02))
        .measurement_name("thickness")
        .seed(2024)
        .build()
        .expect("Failed to build experiment");

    let cumulative = experiment
        .cumulative_levels()
        .expect("Failed to plan levels");
    println!("Cumulative levels: {}", cumulative);
    println!("Seed pool size: {}", experiment.sampler().len());
    println!();

    let table = experiment.run().expect("Failed to create experiment");
    println!("Experiment table ({} rows):", table.rows());
    println!("{}", table);

    println!("Verifying table layout...");
    let result = verify_table(&table, experiment.grand_mean(), experiment.digits());
    if result.is_valid {
        println!("✓ Table matches its nesting and measurement rules");
    } else {
        println!("✗ Table failed verification");
        for issue in &result.issues {
            println!("  Issue: {:?}", issue);
        }
    }
}
