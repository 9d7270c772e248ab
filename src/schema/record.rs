//! Record values keyed by field name

use serde_json::Value;
use std::collections::BTreeMap;

/// Field values of a single record.
///
/// A missing key means the field is unset; `Value::Null` means it was
/// explicitly set to null. The two are kept apart everywhere.
pub type Record = BTreeMap<String, Value>;

/// True when no field carries a value (every entry is absent or null)
pub fn is_blank(record: &Record) -> bool {
    record.values().all(Value::is_null)
}

/// Names of the fields whose values differ between two records
pub fn changed_fields(before: &Record, after: &Record) -> Vec<String> {
    let mut changed: Vec<String> = before
        .iter()
        .filter(|(name, value)| after.get(*name) != Some(*value))
        .map(|(name, _)| name.clone())
        .collect();

    changed.extend(
        after
            .keys()
            .filter(|name| !before.contains_key(*name))
            .cloned(),
    );
    changed.sort();
    changed
}
