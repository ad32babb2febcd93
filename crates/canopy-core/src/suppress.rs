use crate::value::Value;

/// Predicates that treat two different values as semantically equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSuppress {
    /// Strings differing only in ASCII case are unchanged.
    CaseDifference,
    /// Region names compared lowercase with spaces removed
    /// (`"East US"` equals `"eastus"`).
    LocationDifference,
}

/// Canonical form of a region name.
pub fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

impl DiffSuppress {
    pub fn suppresses(&self, old: &Value, new: &Value) -> bool {
        match self {
            DiffSuppress::CaseDifference => match (old, new) {
                (Value::String(a), Value::String(b)) => a.eq_ignore_ascii_case(b),
                _ => false,
            },
            DiffSuppress::LocationDifference => match (old, new) {
                (Value::String(a), Value::String(b)) => {
                    normalize_location(a) == normalize_location(b)
                }
                _ => false,
            },
        }
    }
}
