use crate::error::ReconError;
use crate::table::{Cell, Table};
use crate::transform::format_float_scientific;

/// Granularity of the numeric fallback: two cells agree when their scientific
/// renderings at this many fractional digits are textually identical.
pub const COMPARE_PRECISION: usize = 8;

/// Nested-collection columns whose consistency is not checked yet. Reversed
/// dotted names, matching the portal's column naming.
pub const EXCLUDED_COLUMN_SUFFIXES: [&str; 3] = [
    ".treatments.diagnoses",
    ".annotations.diagnoses",
    ".pathology_details.diagnoses",
];

/// Tolerant cell equivalence. Textual "none"/"nan" count as absent, absent
/// values equal each other, decoded list literals compare element-wise, and
/// anything that coerces to a number on both sides compares at
/// [`COMPARE_PRECISION`] digits. The last resort is case-insensitive string
/// equality.
pub fn equivalent(left: &Cell, right: &Cell) -> bool {
    let left = normalize(left);
    let right = normalize(right);

    match (left.is_missing(), right.is_missing()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        (false, false) => {}
    }

    let left = match decode_if_list_literal(&left) {
        Ok(cell) => cell,
        Err(()) => return false,
    };
    let right = match decode_if_list_literal(&right) {
        Ok(cell) => cell,
        Err(()) => return false,
    };

    if let (Cell::List(a), Cell::List(b)) = (&left, &right) {
        return a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equivalent(x, y));
    }

    if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
        return format_float_scientific(a, COMPARE_PRECISION)
            == format_float_scientific(b, COMPARE_PRECISION);
    }

    left.to_string().to_lowercase() == right.to_string().to_lowercase()
}

fn normalize(cell: &Cell) -> Cell {
    match cell {
        Cell::Text(text) => {
            let lowered = text.trim().to_lowercase();
            if lowered == "none" || lowered == "nan" {
                Cell::Missing
            } else {
                cell.clone()
            }
        }
        Cell::Number(num) if num.is_nan() => Cell::Missing,
        other => other.clone(),
    }
}

/// A bracketed text cell either decodes to a list or poisons the comparison,
/// mirroring the strict literal decoding of the reference pipeline.
fn decode_if_list_literal(cell: &Cell) -> Result<Cell, ()> {
    match cell {
        Cell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                parse_list_literal(trimmed).map(Cell::List).ok_or(())
            } else {
                Ok(cell.clone())
            }
        }
        other => Ok(other.clone()),
    }
}

fn parse_list_literal(text: &str) -> Option<Vec<Cell>> {
    let bytes: Vec<char> = text.chars().collect();
    let mut pos = 0usize;
    let items = parse_list_body(&bytes, &mut pos)?;
    skip_spaces(&bytes, &mut pos);
    if pos == bytes.len() { Some(items) } else { None }
}

fn parse_list_body(chars: &[char], pos: &mut usize) -> Option<Vec<Cell>> {
    if chars.get(*pos) != Some(&'[') {
        return None;
    }
    *pos += 1;
    let mut items = Vec::new();
    loop {
        skip_spaces(chars, pos);
        match chars.get(*pos) {
            Some(']') => {
                *pos += 1;
                return Some(items);
            }
            Some(_) => {
                items.push(parse_element(chars, pos)?);
                skip_spaces(chars, pos);
                match chars.get(*pos) {
                    Some(',') => {
                        *pos += 1;
                    }
                    Some(']') => {}
                    _ => return None,
                }
            }
            None => return None,
        }
    }
}

fn parse_element(chars: &[char], pos: &mut usize) -> Option<Cell> {
    match chars.get(*pos)? {
        '[' => parse_list_body(chars, pos).map(Cell::List),
        quote @ ('\'' | '"') => {
            let quote = *quote;
            *pos += 1;
            let mut text = String::new();
            loop {
                match chars.get(*pos)? {
                    ch if *ch == quote => {
                        *pos += 1;
                        return Some(Cell::Text(text));
                    }
                    '\\' => {
                        *pos += 1;
                        text.push(*chars.get(*pos)?);
                        *pos += 1;
                    }
                    ch => {
                        text.push(*ch);
                        *pos += 1;
                    }
                }
            }
        }
        _ => {
            let start = *pos;
            while let Some(ch) = chars.get(*pos) {
                if *ch == ',' || *ch == ']' {
                    break;
                }
                *pos += 1;
            }
            let token: String = chars[start..*pos].iter().collect::<String>().trim().to_string();
            match token.as_str() {
                "None" => Some(Cell::Missing),
                "True" => Some(Cell::Text("True".to_string())),
                "False" => Some(Cell::Text("False".to_string())),
                _ => token.parse::<f64>().ok().map(Cell::Number),
            }
        }
    }
}

fn skip_spaces(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|ch| ch.is_whitespace()) {
        *pos += 1;
    }
}

fn compared_column_pairs(
    reference: &Table,
    recomputed: &Table,
) -> Result<Vec<(usize, usize)>, ReconError> {
    let mut pairs = Vec::new();
    for (ref_index, name) in reference.columns.iter().enumerate() {
        if EXCLUDED_COLUMN_SUFFIXES
            .iter()
            .any(|suffix| name.ends_with(suffix))
        {
            continue;
        }
        let rec_index = recomputed.require_column(name)?;
        pairs.push((ref_index, rec_index));
    }
    Ok(pairs)
}

/// Compare two long tables joined on an explicit key column. Both tables are
/// sorted by the key; row counts must already agree (the sample-set gate runs
/// first), and a key disagreement after sorting is an error rather than a
/// silently misaligned comparison. Returns the key values of rows where any
/// inspected column disagrees.
pub fn compare_keyed(
    reference: &mut Table,
    recomputed: &mut Table,
    key: &str,
) -> Result<Vec<String>, ReconError> {
    reference.sort_by_columns(&[key])?;
    recomputed.sort_by_columns(&[key])?;

    if reference.rows.len() != recomputed.rows.len() {
        return Err(ReconError::RowCountMismatch {
            context: format!("table keyed by {key}"),
            left: recomputed.rows.len(),
            right: reference.rows.len(),
        });
    }

    let ref_key = reference.require_column(key)?;
    let rec_key = recomputed.require_column(key)?;
    let pairs = compared_column_pairs(reference, recomputed)?;

    let mut mismatched = Vec::new();
    for (ref_row, rec_row) in reference.rows.iter().zip(&recomputed.rows) {
        let key_value = ref_row[ref_key].to_string();
        if key_value != rec_row[rec_key].to_string() {
            return Err(ReconError::RowKeyMismatch(format!(
                "{key}: {} vs {}",
                key_value, rec_row[rec_key]
            )));
        }
        let disagrees = pairs
            .iter()
            .any(|&(r, c)| !equivalent(&ref_row[r], &rec_row[c]));
        if disagrees && !mismatched.contains(&key_value) {
            mismatched.push(key_value);
        }
    }
    Ok(mismatched)
}

/// Compare two long tables positionally after sorting each by all of its
/// columns; used where the row identity is the whole row (segments,
/// mutations). Failing rows are reported by `report_column`.
pub fn compare_positional(
    reference: &mut Table,
    recomputed: &mut Table,
    report_column: &str,
) -> Result<Vec<String>, ReconError> {
    reference.sort_by_all_columns();
    recomputed.sort_by_all_columns();

    if reference.rows.len() != recomputed.rows.len() {
        return Err(ReconError::RowCountMismatch {
            context: "positional table comparison".to_string(),
            left: recomputed.rows.len(),
            right: reference.rows.len(),
        });
    }

    let report = reference.require_column(report_column)?;
    let pairs = compared_column_pairs(reference, recomputed)?;

    let mut mismatched = Vec::new();
    for (ref_row, rec_row) in reference.rows.iter().zip(&recomputed.rows) {
        let disagrees = pairs
            .iter()
            .any(|&(r, c)| !equivalent(&ref_row[r], &rec_row[c]));
        if disagrees {
            let sample = ref_row[report].to_string();
            if !mismatched.contains(&sample) {
                mismatched.push(sample);
            }
        }
    }
    Ok(mismatched)
}
