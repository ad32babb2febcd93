use ipnet::IpNet;

use crate::resource_id::ResourceId;
use crate::value::Value;

/// Per-field value checks, declared in a [`FieldSchema`](crate::FieldSchema)
/// and run by the generic validation pass.
///
/// Checks see a value that already has the right type; type mismatches are
/// reported by the schema before any validator runs.
#[derive(Debug, Clone, Copy)]
pub enum Validator {
    NoEmptyStrings,
    Cidr,
    Uuid,
    UuidOrEmpty,
    StringInSlice {
        values: &'static [&'static str],
        ignore_case: bool,
    },
    /// Lowercase letter followed by up to 11 lowercase letters or digits.
    AgentPoolName,
    /// 1-90 characters of letters, digits, `_`, `-`, `.`, `(`, `)`; no trailing period.
    ResourceGroupName,
    /// A hierarchical ID with a `subscriptions` segment.
    ResourceId,
    IntAtLeast(i64),
}

impl Validator {
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Validator::NoEmptyStrings => {
                let s = expect_str(value)?;
                if s.trim().is_empty() {
                    return Err("must not be empty".into());
                }
                Ok(())
            }
            Validator::Cidr => {
                let s = expect_str(value)?;
                s.parse::<IpNet>()
                    .map(|_| ())
                    .map_err(|_| format!("{s:?} is not a valid CIDR block"))
            }
            Validator::Uuid => {
                let s = expect_str(value)?;
                uuid::Uuid::parse_str(s)
                    .map(|_| ())
                    .map_err(|_| format!("{s:?} is not a valid UUID"))
            }
            Validator::UuidOrEmpty => match expect_str(value)? {
                "" => Ok(()),
                _ => Validator::Uuid.check(value),
            },
            Validator::StringInSlice {
                values,
                ignore_case,
            } => {
                let s = expect_str(value)?;
                let found = values.iter().any(|v| {
                    if *ignore_case {
                        v.eq_ignore_ascii_case(s)
                    } else {
                        *v == s
                    }
                });
                if found {
                    Ok(())
                } else {
                    Err(format!("expected one of {values:?}, got {s:?}"))
                }
            }
            Validator::AgentPoolName => {
                let s = expect_str(value)?;
                let mut chars = s.chars();
                let first_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
                let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
                if first_ok && rest_ok && s.len() <= 12 {
                    Ok(())
                } else {
                    Err(format!(
                        "{s:?} must start with a lowercase letter, contain only lowercase \
                         letters and digits, and be at most 12 characters"
                    ))
                }
            }
            Validator::ResourceGroupName => {
                let s = expect_str(value)?;
                if s.is_empty() || s.len() > 90 {
                    return Err("must be between 1 and 90 characters".into());
                }
                if s.ends_with('.') {
                    return Err("must not end with a period".into());
                }
                let allowed = |c: char| c.is_alphanumeric() || "_-.()".contains(c);
                if !s.chars().all(allowed) {
                    return Err(format!(
                        "{s:?} may only contain letters, digits, underscores, hyphens, \
                         periods and parentheses"
                    ));
                }
                Ok(())
            }
            Validator::ResourceId => {
                let s = expect_str(value)?;
                let id = ResourceId::parse(s).map_err(|e| e.to_string())?;
                id.get("subscriptions")
                    .map(|_| ())
                    .ok_or_else(|| format!("{s:?} has no subscriptions segment"))
            }
            Validator::IntAtLeast(min) => {
                let i = value
                    .as_int()
                    .ok_or_else(|| format!("expected int, got {}", value.type_name()))?;
                if i < *min {
                    return Err(format!("must be at least {min}, got {i}"));
                }
                Ok(())
            }
        }
    }
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, got {}", value.type_name()))
}
