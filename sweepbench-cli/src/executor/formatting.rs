//! Output Formatting
//!
//! Human-readable rendering of a series build: one section per result type,
//! one table per build with the reduced value, the spread and the sample count
//! of every point.

use sweepbench_report::SeriesMap;

/// Format series for terminal display
pub fn format_human_output(title: &str, x_key: &str, series: &SeriesMap) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(&format!("{}\n", title));
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    if series.is_empty() {
        output.push_str("No results.\n");
        return output;
    }

    let x_label = if x_key.is_empty() { "x" } else { x_key };

    for (result_type, entries) in series {
        output.push_str(&format!("Result: {}\n", result_type));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for entry in entries {
            output.push_str(&format!("  {}\n", entry.build));

            let x_values: Vec<String> = entry.x.iter().map(|x| x.to_string()).collect();
            let x_width = x_values
                .iter()
                .map(String::len)
                .max()
                .unwrap_or(0)
                .max(x_label.len());

            output.push_str(&format!(
                "    {:>xw$} | {:>12} | {:>12} | {:>7}\n",
                x_label,
                "value",
                "std dev",
                "samples",
                xw = x_width
            ));
            output.push_str(&format!("    {}\n", "-".repeat(x_width + 41)));

            for ((x, y), error) in x_values.iter().zip(&entry.y).zip(&entry.errors) {
                let samples = error.samples.iter().filter(|v| !v.is_nan()).count();
                output.push_str(&format!(
                    "    {:>xw$} | {:>12} | {:>12} | {:>7}\n",
                    x,
                    format_value(*y),
                    format_value(error.std_dev),
                    samples,
                    xw = x_width
                ));
            }
            output.push('\n');
        }
    }

    output
}

/// Fixed precision for ordinary magnitudes, scientific notation otherwise
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else if value != 0.0 && (value.abs() >= 1_000_000.0 || value.abs() < 0.001) {
        format!("{:.2e}", value)
    } else if value.abs() >= 1000.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}
