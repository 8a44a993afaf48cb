//! Field extraction from raw feed objects.
//!
//! The feed uses mixed-case vendor keys (`votePct`, `statePostal`).
//! Data that has already been through the engine once, for example a
//! previously exported JSON file, uses the canonical lowercase names.
//! Every getter therefore takes a key list tried in order: canonical
//! key first, vendor key second, and a documented default if neither
//! is present. Keys that the engine does not recognize are ignored.

use serde_json::{Map, Value};

pub type RawObject = Map<String, Value>;

fn pick<'a>(obj: &'a RawObject, keys: &[&str]) -> Option<&'a Value> {
    for k in keys {
        match obj.get(*k) {
            Some(Value::Null) | None => continue,
            Some(v) => return Some(v),
        }
    }
    None
}

/// A string field. Bare JSON numbers are accepted and stringified,
/// since the feed is inconsistent about quoting identifiers.
pub fn get_str(obj: &RawObject, keys: &[&str]) -> Option<String> {
    match pick(obj, keys) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// A non-negative integer field, default 0. Numeric strings are
/// accepted as well.
pub fn get_u64(obj: &RawObject, keys: &[&str]) -> u64 {
    match pick(obj, keys) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// An optional integer field with no default.
pub fn get_u64_opt(obj: &RawObject, keys: &[&str]) -> Option<u64> {
    match pick(obj, keys) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse::<u64>().ok(),
        _ => None,
    }
}

/// A floating point field, default 0.0.
pub fn get_f64(obj: &RawObject, keys: &[&str]) -> f64 {
    match pick(obj, keys) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// A boolean field, default false.
pub fn get_bool(obj: &RawObject, keys: &[&str]) -> bool {
    matches!(pick(obj, keys), Some(Value::Bool(true)))
}

/// An array field, default empty.
pub fn get_array<'a>(obj: &'a RawObject, keys: &[&str]) -> &'a [Value] {
    match pick(obj, keys) {
        Some(Value::Array(a)) => a.as_slice(),
        _ => &[],
    }
}

/// The vendor reports precincts reporting as a 0-100 percentage while
/// the canonical field is a 0-1 fraction. Scale only when falling back
/// to the vendor key.
pub fn get_precincts_reporting_pct(obj: &RawObject) -> f64 {
    if let Some(v) = pick(obj, &["precinctsreportingpct"]) {
        match v {
            Value::Number(n) => return n.as_f64().unwrap_or(0.0),
            Value::String(s) => return s.parse::<f64>().unwrap_or(0.0),
            _ => return 0.0,
        }
    }
    get_f64(obj, &["precinctsReportingPct"]) * 0.01
}

/// A `polid` of `"0"` means "no national politician id assigned" and
/// is normalized to `None` before identity resolution.
pub fn normalize_polid(polid: Option<String>) -> Option<String> {
    match polid {
        Some(p) if p == "0" => None,
        other => other,
    }
}

/// FIPS codes come over the wire with leading zeroes stripped.
pub fn pad_fipscode(fipscode: Option<String>) -> Option<String> {
    fipscode.map(|f| format!("{:0>5}", f))
}

/// Stable cross-race identity for a person on a ballot.
///
/// Raw candidate ids repeat across races, states and years. National
/// politician ids (`polid`) are unique but only national candidates
/// have one; everyone else falls back to the politician number. The
/// key embeds the name of the id namespace so the two cannot collide.
///
/// Returns `None` when neither id is present; callers decide whether
/// to skip the record (a degenerate id would corrupt deduplication).
pub fn candidate_unique_id(polid: Option<&str>, polnum: Option<&str>) -> Option<String> {
    match (polid, polnum) {
        (Some(p), _) => Some(format!("polid-{}", p)),
        (None, Some(n)) => Some(format!("polnum-{}", n)),
        (None, None) => None,
    }
}

/// Cross-election identity for a ballot measure. Measures have no
/// meaningful `polid`; the raw candidate id is only unique within one
/// election date, so the date is part of the key.
pub fn ballot_measure_unique_id(electiondate: &str, candidateid: &str) -> String {
    format!("{}-{}", electiondate, candidateid)
}
