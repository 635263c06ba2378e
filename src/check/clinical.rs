use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::{CheckContext, CheckOutcome, keep_samples, write_mismatch_artifacts};
use crate::compare::compare_keyed;
use crate::error::ReconError;
use crate::flatten::{SAMPLES_KEY, dedup_by_id, dedup_nested_by_id, flatten, hoist_samples};
use crate::gdc::{Endpoint, Filter, PAGE_SIZE_WIDE};
use crate::reconcile::reconcile_sample_sets;
use crate::table::{Cell, Table};
use crate::value::{Value, merge_maps};

/// Attributes the portal drops before requesting fields: internal ids,
/// timestamps, dbGaP bookkeeping, and paths the mapping advertises but the
/// cases endpoint does not actually serve.
const DROPPED_FIELDS: &[&str] = &[
    "cases.aliquot_ids",
    "cases.submitter_aliquot_ids",
    "cases.created_datetime",
    "cases.sample_ids",
    "diagnosis_ids",
    "cases.submitter_sample_ids",
    "submitter_diagnosis_ids",
    "cases.updated_datetime",
    "cases.index_date",
    "cases.state",
    "cases.project.dbgap_accession_number",
    "cases.project.releasable",
    "cases.project.state",
    "cases.project.program.dbgap_accession_number",
    "cases.project.program.program_id",
    "cases.project.released",
    "cases.diagnoses.created_datetime",
    "cases.diagnoses.updated_datetime",
    "cases.diagnoses.state",
    "cases.diagnoses.submitter_id",
    "cases.diagnoses.diagnosis_id",
    "cases.demographic.submitter_id",
    "cases.demographic.created_datetime",
    "cases.demographic.demographic_id",
    "cases.demographic.updated_datetime",
    "cases.demographic.state",
    "cases.submitter_slide_ids",
    "cases.submitter_analyte_ids",
    "cases.follow_ups",
    "cases.portion_ids",
    "cases.submitter_portion_ids",
    "case.slide_ids",
    "cases.analyte_ids",
    "diagnoses",
    "diagnoses.treatments",
    "cases.family_histories.updated_datetime",
    "cases.family_histories.submitter_id",
    "cases.family_histories.state",
    "cases.family_histories.created_datetime",
    "cases.family_histories.family_history_id",
    "cases.exposures.submitter_id",
    "cases.exposures.created_datetime",
    "cases.exposures.updated_datetime",
    "cases.exposures.exposure_id",
    "cases.exposures.state",
    "cases.samples.created_datetime",
    "cases.samples.updated_datetime",
    "cases.samples.state",
    "samples.portions",
];

pub(super) fn run(ctx: &CheckContext<'_>) -> Result<CheckOutcome, ReconError> {
    let fields = wanted_fields(ctx.gdc.field_mapping()?);
    let split = split_fields(fields);

    let mut cases = fetch_case_records(ctx, &split.case_fields)?;
    let project_data = fetch_project_data(ctx, &split.project_fields)?;
    let case_samples = fetch_case_samples(ctx, &split.sample_fields)?;

    for (case_id, case) in cases.iter_mut() {
        case.insert("project".to_string(), Value::Map(project_data.clone()));
        if let Some(samples) = case_samples.get(case_id) {
            case.insert(SAMPLES_KEY.to_string(), samples.clone());
        }
        dedup_by_id(case, "diagnoses", "diagnosis_id", true);
        dedup_nested_by_id(case, "diagnoses", "treatments", "treatment_id");
    }

    let keep = keep_samples(ctx)?;
    let mut rows: IndexMap<String, IndexMap<String, Value>> = IndexMap::new();
    for case in cases.values() {
        let mut flat = flatten(case);
        retain_kept_samples(&mut flat, &keep);
        for (sample, row) in hoist_samples(&flat)? {
            rows.insert(sample, portal_row(row));
        }
    }

    let mut reference = super::read_reference_table(ctx)?;
    let reference_samples: BTreeSet<String> =
        reference.unique_values("sample")?.into_iter().collect();
    let repository_samples: BTreeSet<String> = rows.keys().cloned().collect();
    reconcile_sample_sets(&repository_samples, &reference_samples)?;

    // Only the columns the portal publishes are inspected; the repository
    // exposes strictly more.
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

fn wanted_fields(mapping: Vec<String>) -> Vec<String> {
    mapping
        .into_iter()
        .filter(|field| {
            field.starts_with("cases.")
                && !DROPPED_FIELDS.contains(&field.as_str())
                && !field.starts_with("cases.summary.")
                && !field.starts_with("cases.follow_ups.")
        })
        .collect()
}

struct SplitFields {
    /// `cases.project.*`, stripped for the projects endpoint.
    project_fields: Vec<String>,
    /// `cases.samples.*`, stripped to `samples.*` for the cases endpoint.
    sample_fields: Vec<String>,
    /// Everything else, requested from the files endpoint.
    case_fields: Vec<String>,
}

fn split_fields(fields: Vec<String>) -> SplitFields {
    let mut project_fields = Vec::new();
    let mut sample_fields = Vec::new();
    let mut case_fields = Vec::new();
    for field in fields {
        if let Some(stripped) = field.strip_prefix("cases.project.") {
            project_fields.push(stripped.to_string());
        } else if field.starts_with("cases.samples.") {
            sample_fields.push(field.trim_start_matches("cases.").to_string());
        } else {
            case_fields.push(field);
        }
    }
    SplitFields {
        project_fields,
        sample_fields,
        case_fields,
    }
}

fn fetch_project_data(
    ctx: &CheckContext<'_>,
    fields: &[String],
) -> Result<IndexMap<String, Value>, ReconError> {
    let filter = Filter::and(vec![Filter::field_in("project_id", [ctx.project.as_str()])]);
    let refs: Vec<&str> = fields.iter().map(String::as_str).collect();
    let hits = ctx
        .gdc
        .query(Endpoint::Projects, &filter, &refs, PAGE_SIZE_WIDE)?;
    let first = hits
        .first()
        .ok_or_else(|| ReconError::MalformedRecord("project query returned no hits".to_string()))?;
    let mut project = match Value::from_json(first.clone()) {
        Value::Map(entries) => entries,
        _ => {
            return Err(ReconError::MalformedRecord(
                "project hit is not an object".to_string(),
            ));
        }
    };
    project.shift_remove("id");
    Ok(project)
}

/// Per-case sample collections, from a dedicated cases-endpoint call.
fn fetch_case_samples(
    ctx: &CheckContext<'_>,
    sample_fields: &[String],
) -> Result<IndexMap<String, Value>, ReconError> {
    let filter = Filter::and(vec![Filter::field_in(
        "project.project_id",
        [ctx.project.as_str()],
    )]);
    let mut fields: Vec<&str> = sample_fields.iter().map(String::as_str).collect();
    fields.push("case_id");
    let hits = ctx
        .gdc
        .query(Endpoint::Cases, &filter, &fields, PAGE_SIZE_WIDE)?;

    let mut samples = IndexMap::new();
    for hit in &hits {
        let Some(case_id) = hit.get("case_id").and_then(JsonValue::as_str) else {
            continue;
        };
        if let Some(collection) = hit.get(SAMPLES_KEY) {
            samples.insert(case_id.to_string(), Value::from_json(collection.clone()));
        }
    }
    Ok(samples)
}

/// The repository caps query complexity, so the case field list is fetched
/// in two halves and reassembled per case without overwriting either half.
fn fetch_case_records(
    ctx: &CheckContext<'_>,
    case_fields: &[String],
) -> Result<IndexMap<String, IndexMap<String, Value>>, ReconError> {
    let half = case_fields.len() / 2;
    let first_half = &case_fields[half..];
    let second_half = &case_fields[..half];

    let mut cases = fetch_case_half(ctx, first_half)?;
    let second = fetch_case_half(ctx, second_half)?;
    for (case_id, record) in second {
        match cases.get_mut(&case_id) {
            Some(existing) => merge_maps(existing, record),
            None => {
                cases.insert(case_id, record);
            }
        }
    }
    Ok(cases)
}

fn fetch_case_half(
    ctx: &CheckContext<'_>,
    fields: &[String],
) -> Result<IndexMap<String, IndexMap<String, Value>>, ReconError> {
    let filter = Filter::and(vec![Filter::field_in(
        "cases.project.project_id",
        [ctx.project.as_str()],
    )]);
    let mut requested: Vec<&str> = fields.iter().map(String::as_str).collect();
    requested.push("cases.case_id");
    requested.push("cases.diagnoses.diagnosis_id");
    requested.push("cases.diagnoses.treatments.treatment_id");

    let hits = ctx
        .gdc
        .query(Endpoint::Files, &filter, &requested, PAGE_SIZE_WIDE)?;
    let mut cases = IndexMap::new();
    for hit in &hits {
        let Some(case) = hit.get("cases").and_then(|cases| cases.get(0)) else {
            continue;
        };
        let Some(case_id) = case.get("case_id").and_then(JsonValue::as_str) else {
            continue;
        };
        let record = match Value::from_json(case.clone()) {
            Value::Map(entries) => entries,
            _ => continue,
        };
        cases.insert(case_id.to_string(), record);
    }
    Ok(cases)
}

fn retain_kept_samples(flat: &mut IndexMap<String, Value>, keep: &BTreeSet<String>) {
    if let Some(Value::List(samples)) = flat.get_mut(SAMPLES_KEY) {
        samples.retain(|sample| {
            sample
                .as_map()
                .and_then(|attrs| attrs.get("submitter_id"))
                .and_then(Value::as_str)
                .is_some_and(|id| keep.contains(id))
        });
    }
}

/// Rename a hoisted row into the portal's column vocabulary: the sample id
/// column is `sample`, every other dotted path is reversed, `id` mirrors the
/// case id, and the earliest-diagnosis columns are derived.
fn portal_row(row: IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut renamed: IndexMap<String, Value> = IndexMap::new();
    for (key, value) in row {
        if key == "samples.submitter_id" {
            renamed.insert("sample".to_string(), value);
        } else {
            let reversed: Vec<&str> = key.split('.').rev().collect();
            renamed.insert(reversed.join("."), value);
        }
    }
    if let Some(case_id) = renamed.get("case_id").cloned() {
        renamed.insert("id".to_string(), case_id);
    }
    if let Some(age) = renamed.get("age_at_diagnosis.diagnoses").cloned() {
        let earliest = earliest_value(&age);
        if let Value::Number(days) = earliest {
            renamed.insert(
                "age_at_earliest_diagnosis_in_years.diagnoses.xena_derived".to_string(),
                Value::Number(days / 365.0),
            );
        }
        renamed.insert(
            "age_at_earliest_diagnosis.diagnoses.xena_derived".to_string(),
            earliest,
        );
    }
    renamed
}

/// Numeric minimum over a per-diagnosis list; entries that do not coerce
/// count as +inf, scalars pass through.
fn earliest_value(value: &Value) -> Value {
    match value {
        Value::List(items) => {
            let minimum = items
                .iter()
                .map(|item| match item {
                    Value::Number(num) => *num,
                    Value::Text(text) => text.trim().parse::<f64>().unwrap_or(f64::INFINITY),
                    _ => f64::INFINITY,
                })
                .fold(f64::INFINITY, f64::min);
            Value::Number(minimum)
        }
        other => other.clone(),
    }
}
