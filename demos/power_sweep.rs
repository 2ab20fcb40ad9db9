//! Sweep sample sizes and print the power curve for a fixed interaction.
//!
//! ```text
//! RUST_LOG=did_power=info cargo run --release --example power_sweep
//! ```

use did_power::helpers::response_mean;
use did_power::output::format_estimate;
use did_power::{Config, DesignParameters, GroupParameters, PowerAnalysis};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::quick().from_env();

    // 5-point scale: baseline centred on 3, treated arm shifted upward.
    let baseline = response_mean(&[0.1, 0.25, 0.3, 0.25, 0.1])?;
    let treated = response_mean(&[0.05, 0.15, 0.3, 0.3, 0.2])?;

    println!("interaction = {:.2}", treated - baseline);
    println!("{:>6}  {:>8}  {:>17}", "n/arm", "power", "95% CI");

    for n in [10, 20, 30, 40, 60, 80] {
        let design = DesignParameters::new(
            GroupParameters::new(n, (baseline, baseline), (1.0, 1.0), 0.75),
            GroupParameters::new(n, (baseline, treated), (1.0, 1.0), 0.75),
        );
        let estimate = PowerAnalysis::with_config(design, config.clone())
            .seed(config.seed.unwrap_or(2024))
            .run()?;
        let (lo, hi) = estimate.confidence_interval();
        println!(
            "{:>6}  {:>7.1}%  [{:>5.1}%, {:>5.1}%]",
            n,
            estimate.power * 100.0,
            lo * 100.0,
            hi * 100.0
        );
    }

    let reference = DesignParameters::new(
        GroupParameters::new(40, (3.0, 3.0), (1.0, 1.0), 0.75),
        GroupParameters::new(38, (3.0, 3.5), (1.0, 1.0), 0.75),
    );
    let estimate = PowerAnalysis::with_config(reference, config).run()?;
    println!();
    print!("{}", format_estimate(&estimate));
    Ok(())
}
