use indexmap::IndexMap;

use crate::error::ReconError;
use crate::value::{Value, merge_maps};

/// Collection that is never unpacked by the flattener; each of its elements
/// becomes its own row later, via [`hoist_samples`].
pub const SAMPLES_KEY: &str = "samples";

/// Flatten one nested repository record into a mapping from dot-joined
/// composite keys to scalar or list values.
///
/// Nested objects extend the prefix, singleton lists unwrap in place, and a
/// repeated collection of objects turns into one key per attribute name seen
/// anywhere in the collection, each holding a positionally aligned list of
/// per-element values with missing entries filled by an empty string.
pub fn flatten(record: &IndexMap<String, Value>) -> IndexMap<String, Value> {
    let mut out = IndexMap::new();
    flatten_into(record, "", &mut out);
    out
}

fn flatten_into(record: &IndexMap<String, Value>, prefix: &str, out: &mut IndexMap<String, Value>) {
    for (key, value) in record {
        let composite = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        if key == SAMPLES_KEY {
            out.insert(composite, value.clone());
            continue;
        }

        match value {
            Value::Map(inner) => flatten_into(inner, &composite, out),
            Value::List(items) if items.len() == 1 => match &items[0] {
                Value::Map(inner) => flatten_into(inner, &composite, out),
                single => {
                    out.insert(composite, single.clone());
                }
            },
            Value::List(items) if items.iter().all(|item| item.as_map().is_some()) => {
                // Covers the empty list as well: no attribute names, no keys.
                flatten_collection(items, &composite, out);
            }
            Value::List(_) => {
                out.insert(composite, value.clone());
            }
            scalar => {
                out.insert(composite, scalar.clone());
            }
        }
    }
}

fn flatten_collection(items: &[Value], prefix: &str, out: &mut IndexMap<String, Value>) {
    let flattened: Vec<IndexMap<String, Value>> = items
        .iter()
        .filter_map(|item| item.as_map())
        .map(flatten)
        .collect();

    let mut attribute_names: Vec<String> = Vec::new();
    for element in &flattened {
        for name in element.keys() {
            if !attribute_names.iter().any(|existing| existing == name) {
                attribute_names.push(name.clone());
            }
        }
    }

    for name in attribute_names {
        let column: Vec<Value> = flattened
            .iter()
            .map(|element| match element.get(&name) {
                Some(Value::Null) | None => Value::Text(String::new()),
                Some(value) => value.clone(),
            })
            .collect();
        out.insert(format!("{prefix}.{name}"), Value::List(column));
    }
}

/// Merge repeated collection elements sharing an identifier into one element
/// each, using the cross-record merge rules. The repository returns one copy
/// of a diagnosis or treatment per file hit, so collections arrive with
/// duplicates that must collapse before flattening.
pub fn dedup_by_id(
    case: &mut IndexMap<String, Value>,
    collection: &str,
    id_field: &str,
    drop_id: bool,
) {
    let Some(Value::List(items)) = case.get_mut(collection) else {
        return;
    };

    let mut grouped: IndexMap<String, IndexMap<String, Value>> = IndexMap::new();
    for item in items.drain(..) {
        let Value::Map(mut entries) = item else {
            continue;
        };
        let id = match entries.get(id_field).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => continue,
        };
        if drop_id {
            entries.shift_remove(id_field);
        }
        match grouped.get_mut(&id) {
            Some(existing) => merge_maps(existing, entries),
            None => {
                grouped.insert(id, entries);
            }
        }
    }

    *items = grouped.into_values().map(Value::Map).collect();
}

/// Apply [`dedup_by_id`] to a collection nested one level down, e.g. the
/// treatments list inside every diagnosis.
pub fn dedup_nested_by_id(
    case: &mut IndexMap<String, Value>,
    outer: &str,
    collection: &str,
    id_field: &str,
) {
    let Some(Value::List(items)) = case.get_mut(outer) else {
        return;
    };
    for item in items {
        if let Some(entries) = item.as_map_mut() {
            dedup_by_id(entries, collection, id_field, false);
        }
    }
}

/// Hoist each element of a flattened case's sample collection into its own
/// row: `samples.`-prefixed attributes from the element (null attributes
/// dropped) plus a copy of every other case-level field. Returns
/// `(sample submitter id, row)` pairs.
pub fn hoist_samples(
    flat_case: &IndexMap<String, Value>,
) -> Result<Vec<(String, IndexMap<String, Value>)>, ReconError> {
    let samples = match flat_case.get(SAMPLES_KEY) {
        Some(Value::List(items)) => items.as_slice(),
        Some(_) => {
            return Err(ReconError::MalformedRecord(
                "samples collection is not a list".to_string(),
            ));
        }
        None => &[],
    };

    let mut rows = Vec::with_capacity(samples.len());
    for sample in samples {
        let Some(attributes) = sample.as_map() else {
            return Err(ReconError::MalformedRecord(
                "sample element is not an object".to_string(),
            ));
        };
        let mut row: IndexMap<String, Value> = IndexMap::new();
        for (key, value) in attributes {
            if value.is_null() {
                continue;
            }
            row.insert(format!("{SAMPLES_KEY}.{key}"), value.clone());
        }
        for (key, value) in flat_case {
            if key != SAMPLES_KEY {
                row.insert(key.clone(), value.clone());
            }
        }
        let submitter_id = row
            .get("samples.submitter_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ReconError::MalformedRecord("sample element missing submitter_id".to_string())
            })?
            .to_string();
        rows.push((submitter_id, row));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> IndexMap<String, Value> {
        entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }

    #[test]
    fn scalar_leaves_pass_through() {
        let record = map(vec![
            ("case_id", Value::Text("c1".into())),
            ("age", Value::Number(61.0)),
        ]);
        let flat = flatten(&record);
        assert_eq!(flat.get("case_id"), Some(&Value::Text("c1".into())));
        assert_eq!(flat.get("age"), Some(&Value::Number(61.0)));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn nested_objects_extend_the_prefix() {
        let record = map(vec![(
            "demographic",
            Value::Map(map(vec![("gender", Value::Text("female".into()))])),
        )]);
        let flat = flatten(&record);
        assert_eq!(
            flat.get("demographic.gender"),
            Some(&Value::Text("female".into()))
        );
    }

    #[test]
    fn singleton_list_unwraps_like_inline_object() {
        let inner = map(vec![("primary_diagnosis", Value::Text("AML".into()))]);
        let listed = map(vec![(
            "diagnoses",
            Value::List(vec![Value::Map(inner.clone())]),
        )]);
        let inline = map(vec![("diagnoses", Value::Map(inner))]);
        assert_eq!(flatten(&listed), flatten(&inline));
    }

    #[test]
    fn repeated_collection_becomes_aligned_lists() {
        let record = map(vec![(
            "diagnoses",
            Value::List(vec![
                Value::Map(map(vec![
                    ("primary_diagnosis", Value::Text("AML".into())),
                    ("age_at_diagnosis", Value::Number(300.0)),
                ])),
                Value::Map(map(vec![("primary_diagnosis", Value::Text("MDS".into()))])),
            ]),
        )]);
        let flat = flatten(&record);
        assert_eq!(
            flat.get("diagnoses.primary_diagnosis"),
            Some(&Value::List(vec![
                Value::Text("AML".into()),
                Value::Text("MDS".into())
            ]))
        );
        // Missing attribute filled with the empty marker, position preserved.
        assert_eq!(
            flat.get("diagnoses.age_at_diagnosis"),
            Some(&Value::List(vec![
                Value::Number(300.0),
                Value::Text(String::new())
            ]))
        );
    }

    #[test]
    fn empty_list_emits_nothing() {
        let record = map(vec![("diagnoses", Value::List(vec![]))]);
        assert!(flatten(&record).is_empty());
    }

    #[test]
    fn non_object_list_passes_through() {
        let record = map(vec![(
            "submitter_sample_ids",
            Value::List(vec![Value::Text("S1".into()), Value::Text("S2".into())]),
        )]);
        let flat = flatten(&record);
        assert_eq!(
            flat.get("submitter_sample_ids"),
            Some(&Value::List(vec![
                Value::Text("S1".into()),
                Value::Text("S2".into())
            ]))
        );
    }

    #[test]
    fn samples_collection_is_never_unpacked() {
        let samples = Value::List(vec![
            Value::Map(map(vec![("submitter_id", Value::Text("S1".into()))])),
            Value::Map(map(vec![("submitter_id", Value::Text("S2".into()))])),
        ]);
        let record = map(vec![("samples", samples.clone())]);
        let flat = flatten(&record);
        assert_eq!(flat.get("samples"), Some(&samples));
    }

    #[test]
    fn dedup_merges_repeated_diagnoses() {
        let mut case = map(vec![(
            "diagnoses",
            Value::List(vec![
                Value::Map(map(vec![
                    ("diagnosis_id", Value::Text("d1".into())),
                    ("primary_diagnosis", Value::Text("AML".into())),
                ])),
                Value::Map(map(vec![
                    ("diagnosis_id", Value::Text("d1".into())),
                    ("tumor_grade", Value::Text("G2".into())),
                ])),
            ]),
        )]);
        dedup_by_id(&mut case, "diagnoses", "diagnosis_id", true);
        let items = case.get("diagnoses").unwrap().as_list().unwrap();
        assert_eq!(items.len(), 1);
        let merged = items[0].as_map().unwrap();
        assert!(merged.get("diagnosis_id").is_none());
        assert_eq!(
            merged.get("primary_diagnosis"),
            Some(&Value::Text("AML".into()))
        );
        assert_eq!(merged.get("tumor_grade"), Some(&Value::Text("G2".into())));
    }

    #[test]
    fn hoisted_rows_copy_case_fields() {
        let case = map(vec![
            ("case_id", Value::Text("c1".into())),
            (
                "samples",
                Value::List(vec![
                    Value::Map(map(vec![
                        ("submitter_id", Value::Text("S1".into())),
                        ("sample_type", Value::Text("Primary Tumor".into())),
                        ("preservation_method", Value::Null),
                    ])),
                    Value::Map(map(vec![("submitter_id", Value::Text("S2".into()))])),
                ]),
            ),
        ]);
        let flat = flatten(&case);
        let rows = hoist_samples(&flat).unwrap();
        assert_eq!(rows.len(), 2);
        let (id, row) = &rows[0];
        assert_eq!(id, "S1");
        assert_eq!(row.get("case_id"), Some(&Value::Text("c1".into())));
        assert_eq!(
            row.get("samples.sample_type"),
            Some(&Value::Text("Primary Tumor".into()))
        );
        // Null sample attributes are dropped, case fields shared across rows.
        assert!(row.get("samples.preservation_method").is_none());
        assert_eq!(rows[1].1.get("case_id"), Some(&Value::Text("c1".into())));
    }
}
