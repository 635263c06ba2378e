use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::{CheckContext, CheckOutcome, keep_samples, write_mismatch_artifacts};
use crate::compare::compare_keyed;
use crate::error::ReconError;
use crate::gdc::{Endpoint, Filter, PAGE_SIZE_WIDE};
use crate::reconcile::reconcile_sample_sets;
use crate::table::{Cell, Table};
use crate::value::Value;

struct Donor {
    os_time: Option<f64>,
    censored: bool,
    /// Overall-survival event indicator: 1 dead, 0 alive/censored.
    os: Option<i64>,
    samples: Vec<String>,
}

pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let mut donors = fetch_donors(ctx)?;
    let keep = keep_samples(ctx)?;
    attach_status_and_samples(ctx, &mut donors, &keep)?;

    let mut rows: IndexMap<String, IndexMap<String, Value>> = IndexMap::new();
    for (patient, donor) in &donors {
        let os = donor
            .os
            .unwrap_or(if donor.censored { 0 } else { 1 });
        for sample in &donor.samples {
            let mut row = IndexMap::new();
            row.insert("sample".to_string(), Value::Text(sample.clone()));
            row.insert(
                "OS.time".to_string(),
                donor
                    .os_time
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            );
            row.insert("OS".to_string(), Value::Number(os as f64));
            row.insert("_PATIENT".to_string(), Value::Text(patient.clone()));
            rows.insert(sample.clone(), row);
        }
    }

    let mut reference = super::read_reference_table(ctx)?;
    let reference_samples: BTreeSet<String> =
        reference.unique_values("sample")?.into_iter().collect();
    let repository_samples: BTreeSet<String> = rows.keys().cloned().collect();
    reconcile_sample_sets(&repository_samples, &reference_samples)?;

    let mut recomputed = Table::new(reference.columns.clone());
    for row in rows.values() {
        recomputed.rows.push(
            reference
                .columns
                .iter()
                .map(|column| match row.get(column) {
                    Some(value) => Cell::from_value(value),
                    None => Cell::Missing,
                })
                .collect(),
        );
    }

    let total = rows.len();
    let failed = match compare_keyed(&mut reference, &mut recomputed, "sample") {
        Ok(failed) => failed,
        Err(ReconError::RowCountMismatch { context, left, right }) => {
            write_mismatch_artifacts(ctx, &reference, &recomputed)?;
            vec![format!("row count mismatch ({context}): {left} vs {right}")]
        }
        Err(err) => return Err(err),
    };
    if !failed.is_empty() {
        write_mismatch_artifacts(ctx, &reference, &recomputed)?;
    }

    Ok(CheckOutcome {
        total_samples: total,
        failed_samples: failed,
    })
}

fn fetch_donors(ctx: &CheckContext<'_>) -> Result<IndexMap<String, Donor>, ReconError> {
    let entries = ctx.gdc.survival(ctx.project)?;
    let mut donors = IndexMap::new();
    for entry in &entries {
        let Some(patient) = entry.get("submitter_id").and_then(JsonValue::as_str) else {
            continue;
        };
        donors.insert(
            patient.to_string(),
            Donor {
                os_time: entry.get("time").and_then(JsonValue::as_f64),
                censored: entry
                    .get("censored")
                    .map(truthy)
                    .unwrap_or(false),
                os: None,
                samples: Vec::new(),
            },
        );
    }
    Ok(donors)
}

/// The survival endpoint reports `censored` as a boolean, older exports as
/// the strings "True"/"False".
fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(flag) => *flag,
        JsonValue::String(text) => text.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn attach_status_and_samples(
    ctx: &CheckContext<'_>,
    donors: &mut IndexMap<String, Donor>,
    keep: &BTreeSet<String>,
) -> Result<(), ReconError> {
    let patients: Vec<&str> = donors.keys().map(String::as_str).collect();
    let filter = Filter::and(vec![
        Filter::field_in("submitter_id", patients),
        Filter::field_in("project.project_id", [ctx.project.as_str()]),
    ]);
    let hits = ctx.gdc.query(
        Endpoint::Cases,
        &filter,
        &[
            "demographic.vital_status",
            "submitter_id",
            "submitter_sample_ids",
        ],
        PAGE_SIZE_WIDE,
    )?;

    for hit in &hits {
        let Some(patient) = hit.get("submitter_id").and_then(JsonValue::as_str) else {
            continue;
        };
        let Some(donor) = donors.get_mut(patient) else {
            continue;
        };
        donor.os = match hit
            .get("demographic")
            .and_then(|demographic| demographic.get("vital_status"))
            .and_then(JsonValue::as_str)
        {
            Some("Dead") => Some(1),
            Some("Alive") => Some(0),
            _ => None,
        };
        if let Some(samples) = hit.get("submitter_sample_ids").and_then(JsonValue::as_array) {
            donor.samples = samples
                .iter()
                .filter_map(JsonValue::as_str)
                .filter(|sample| keep.contains(*sample))
                .map(str::to_string)
                .collect();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn censored_flag_accepts_both_encodings() {
        assert!(truthy(&serde_json::json!(true)));
        assert!(truthy(&serde_json::json!("True")));
        assert!(!truthy(&serde_json::json!("False")));
        assert!(!truthy(&serde_json::json!(3)));
    }
}
