//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::power::PowerEstimate;

/// Conventional target for adequate power.
const ADEQUATE_POWER: f64 = 0.8;

/// Format a PowerEstimate for human-readable terminal output.
pub fn format_estimate(estimate: &PowerEstimate) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str("did-power\n");
    output.push_str(&sep);
    output.push_str("\n\n");

    output.push_str(&format!(
        "  Trials: {} ({} completed, {} excluded)\n",
        estimate.n_trials, estimate.n_completed, estimate.n_failed
    ));
    output.push_str(&format!("  Alpha:  {}\n", estimate.alpha));
    output.push_str(&format!("  Seed:   {}\n\n", estimate.seed));

    let headline = estimate.to_string();
    let headline = if estimate.power >= ADEQUATE_POWER {
        headline.green().bold()
    } else {
        headline.yellow().bold()
    };
    output.push_str(&format!("  {headline}\n\n"));

    let (lo, hi) = estimate.confidence_interval();
    output.push_str(&format!(
        "    95% CI:             {:.1}%\u{2013}{:.1}%\n",
        lo * 100.0,
        hi * 100.0
    ));
    output.push_str(&format!(
        "    Monte Carlo SE:     {:.2} pp\n",
        estimate.standard_error() * 100.0
    ));
    output.push_str(&format!(
        "    Interaction:        {:.3} (true {:.3})\n",
        estimate.mean_estimate, estimate.true_interaction
    ));
    output.push('\n');

    if estimate.n_failed > 0 {
        output.push_str(&format!(
            "  {}\n\n",
            format!(
                "\u{26A0} {} trial(s) failed to fit and were excluded",
                estimate.n_failed
            )
            .red()
        ));
    }

    output.push_str(&sep);
    output.push('\n');
    output.push_str(&format!("Runtime: {:.2} s\n", estimate.runtime_secs));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_estimate(power: f64, n_failed: usize) -> PowerEstimate {
        PowerEstimate {
            power,
            alpha: 0.05,
            n_trials: 1000,
            n_completed: 1000 - n_failed,
            n_failed,
            n_significant: (power * (1000 - n_failed) as f64).round() as usize,
            mean_estimate: 0.49,
            true_interaction: 0.5,
            seed: 42,
            runtime_secs: 1.25,
        }
    }

    #[test]
    fn test_format_contains_headline() {
        colored::control::set_override(false);
        let output = format_estimate(&make_estimate(0.853, 0));
        assert!(output.contains("did-power"));
        assert!(output.contains("Power of the interaction effect: 85.3%"), "{output}");
        assert!(output.contains("Seed:   42"));
        assert!(!output.contains("excluded\n\n"));
    }

    #[test]
    fn test_format_reports_failures() {
        colored::control::set_override(false);
        let output = format_estimate(&make_estimate(0.4, 12));
        assert!(output.contains("12 trial(s) failed to fit"), "{output}");
        assert!(output.contains("988 completed"));
    }
}
