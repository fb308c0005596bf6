//! Human-readable rendering of partition scores.
//!
//! Cards group one record's fields into sections; tables lay many records out
//! through Arrow's pretty printer.

use std::fmt::Write as _;

use anomres_core::partition_score::fields;
use anomres_core::{results, PartitionScore};
use arrow::util::pretty::pretty_format_batches;

const LABEL_WIDTH: usize = 26;

// ── Public API ──

/// Print a single partition score as a vertical card.
pub fn print_score_card(score: &PartitionScore) {
    print!("{}", format_score_card(score));
}

/// Print partition scores as an Arrow table.
pub fn print_score_table(scores: &[PartitionScore]) -> anyhow::Result<()> {
    let batch = results::partition_scores_to_batch(scores)?;
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}

// ── Card rendering ──

pub fn format_score_card(score: &PartitionScore) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "=== {}={} ===",
        score.partition_field_name(),
        score.partition_field_value()
    );
    out.push('\n');

    push_section(
        &mut out,
        "Partition",
        &[
            (fields::PARTITION_FIELD_NAME, score.partition_field_name().to_string()),
            (fields::PARTITION_FIELD_VALUE, score.partition_field_value().to_string()),
        ],
    );
    push_section(
        &mut out,
        "Score",
        &[
            (fields::ANOMALY_SCORE, format_number(score.anomaly_score())),
            (fields::PROBABILITY, format_number(score.probability())),
        ],
    );
    push_section(
        &mut out,
        "Normalisation",
        &[(
            results::HAD_BIG_NORMALISED_UPDATE,
            if score.had_big_normalised_update() { "yes" } else { "no" }.to_string(),
        )],
    );
    out
}

fn push_section(out: &mut String, header: &str, rows: &[(&str, String)]) {
    let _ = writeln!(out, "{header}");
    for (label, value) in rows {
        let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
    }
    out.push('\n');
}

/// Plain decimal for ordinary magnitudes, exponent form for tiny probabilities.
fn format_number(v: f64) -> String {
    if v != 0.0 && v.abs() < 1e-4 {
        format!("{v:e}")
    } else {
        format!("{v}")
    }
}
