use std::collections::BTreeMap;

use crate::error::{FieldError, ValidationError};
use crate::spec::ResourceSpec;
use crate::suppress::DiffSuppress;
use crate::validate::Validator;
use crate::value::Value;

/// Placeholder written in place of sensitive values by [`Schema::redact`].
pub const REDACTED: &str = "(sensitive)";

#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Int,
    Bool,
    /// List of scalars of the given kind.
    List(Box<FieldKind>),
    /// String → string map (tags).
    StringMap,
    /// Ordered list of nested blocks.
    Blocks(Schema),
}

/// One row of the constraint table.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    pub kind: FieldKind,
    pub required: bool,
    pub optional: bool,
    /// Assigned by the remote system. Combined with `optional` the user may
    /// supply it; on its own the user must not.
    pub computed: bool,
    /// Changing the field after creation requires replacing the resource.
    pub force_new: bool,
    pub default: Option<Value>,
    pub validator: Option<Validator>,
    pub diff_suppress: Option<DiffSuppress>,
    pub max_items: Option<usize>,
    pub sensitive: bool,
    /// For block lists whose order the remote does not guarantee: the
    /// nested field elements are stable-sorted by.
    pub ordered_by: Option<&'static str>,
}

impl FieldSchema {
    fn of(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            default: None,
            validator: None,
            diff_suppress: None,
            max_items: None,
            sensitive: false,
            ordered_by: None,
        }
    }

    pub fn string() -> Self {
        Self::of(FieldKind::String)
    }

    pub fn int() -> Self {
        Self::of(FieldKind::Int)
    }

    pub fn bool() -> Self {
        Self::of(FieldKind::Bool)
    }

    pub fn list(elem: FieldKind) -> Self {
        Self::of(FieldKind::List(Box::new(elem)))
    }

    pub fn string_map() -> Self {
        Self::of(FieldKind::StringMap)
    }

    pub fn blocks(schema: Schema) -> Self {
        Self::of(FieldKind::Blocks(schema))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn suppress(mut self, suppress: DiffSuppress) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn ordered_by(mut self, key: &'static str) -> Self {
        self.ordered_by = Some(key);
        self
    }

    /// Server-assigned and never accepted from the user.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// True if this field, or any field nested under it, is force-new.
    pub fn has_force_new(&self) -> bool {
        self.force_new
            || match &self.kind {
                FieldKind::Blocks(schema) => schema.fields().any(|(_, f)| f.has_force_new()),
                _ => false,
            }
    }

    /// Whether two values for this field are semantically equal.
    pub fn equivalent(&self, old: &Value, new: &Value) -> bool {
        old == new
            || self
                .diff_suppress
                .is_some_and(|s| s.suppresses(old, new))
    }
}

/// Ordered constraint table for one resource kind or nested block.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSchema)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSchema)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Generic validation pass over the whole spec.
    ///
    /// Collects every violation instead of failing fast.
    pub fn validate(&self, spec: &ResourceSpec) -> Result<(), ValidationError> {
        let mut errors = Vec::new();
        self.validate_map(spec.as_map(), "", &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::from(errors))
        }
    }

    fn validate_map(
        &self,
        map: &BTreeMap<String, Value>,
        prefix: &str,
        errors: &mut Vec<FieldError>,
    ) {
        for name in map.keys() {
            if self.get(name).is_none() {
                errors.push(FieldError::new(
                    format!("{prefix}{name}"),
                    "unsupported argument",
                ));
            }
        }

        for (name, field) in self.fields() {
            let path = format!("{prefix}{name}");
            let Some(value) = map.get(name).filter(|v| !v.is_null()) else {
                if field.required && field.default.is_none() {
                    errors.push(FieldError::new(path, "required field is missing"));
                }
                continue;
            };

            if field.is_computed_only() {
                errors.push(FieldError::new(
                    path,
                    "computed by the remote system and cannot be set",
                ));
                continue;
            }

            validate_value(field, &field.kind, value, &path, errors);
        }
    }

    /// Fill absent fields that declare a default, recursing into blocks.
    pub fn apply_defaults(&self, spec: &ResourceSpec) -> ResourceSpec {
        ResourceSpec::from(self.normalize_map(spec.as_map(), false))
    }

    /// Defaults plus canonical element order for `ordered_by` block lists.
    ///
    /// Desired state goes through this before it is compared with, or
    /// submitted to, the remote system.
    pub fn normalize(&self, spec: &ResourceSpec) -> ResourceSpec {
        ResourceSpec::from(self.normalize_map(spec.as_map(), true))
    }

    fn normalize_map(&self, map: &BTreeMap<String, Value>, sort: bool) -> BTreeMap<String, Value> {
        let mut out = map.clone();
        for (name, field) in self.fields() {
            match out.get(name).filter(|v| !v.is_null()) {
                None => {
                    if let Some(default) = &field.default {
                        out.insert(name.to_string(), default.clone());
                    }
                }
                Some(Value::List(items)) => {
                    if let FieldKind::Blocks(schema) = &field.kind {
                        let mut items: Vec<Value> = items
                            .iter()
                            .map(|item| match item {
                                Value::Block(block) => {
                                    Value::Block(schema.normalize_map(block, sort))
                                }
                                other => other.clone(),
                            })
                            .collect();
                        if sort && let Some(key) = field.ordered_by {
                            sort_blocks(&mut items, key);
                        }
                        out.insert(name.to_string(), Value::List(items));
                    }
                }
                Some(_) => {}
            }
        }
        out
    }

    /// The resource spec with every computed-only field removed, recursively.
    ///
    /// This is the part of observed state a user could have written.
    pub fn user_view(&self, spec: &ResourceSpec) -> ResourceSpec {
        ResourceSpec::from(self.map_fields(spec.as_map(), &|field, value| {
            if field.is_computed_only() {
                None
            } else {
                Some(value.clone())
            }
        }))
    }

    /// The resource spec with sensitive values replaced, safe to log.
    pub fn redact(&self, spec: &ResourceSpec) -> ResourceSpec {
        ResourceSpec::from(self.map_fields(spec.as_map(), &|field, value| {
            if field.sensitive {
                Some(Value::from(REDACTED))
            } else {
                Some(value.clone())
            }
        }))
    }

    fn map_fields(
        &self,
        map: &BTreeMap<String, Value>,
        f: &dyn Fn(&FieldSchema, &Value) -> Option<Value>,
    ) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (name, value) in map {
            let Some(field) = self.get(name) else {
                out.insert(name.clone(), value.clone());
                continue;
            };
            let Some(mapped) = f(field, value) else {
                continue;
            };
            let mapped = match (&field.kind, mapped) {
                (FieldKind::Blocks(schema), Value::List(items)) => Value::List(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::Block(block) => Value::Block(schema.map_fields(&block, f)),
                            other => other,
                        })
                        .collect(),
                ),
                (_, other) => other,
            };
            out.insert(name.clone(), mapped);
        }
        out
    }
}

fn validate_value(
    field: &FieldSchema,
    kind: &FieldKind,
    value: &Value,
    path: &str,
    errors: &mut Vec<FieldError>,
) {
    let mismatch = |expected: &str| {
        FieldError::new(
            path,
            format!("expected {expected}, got {}", value.type_name()),
        )
    };

    match (kind, value) {
        (FieldKind::String, Value::String(_))
        | (FieldKind::Int, Value::Int(_))
        | (FieldKind::Bool, Value::Bool(_)) => {
            if let Some(validator) = &field.validator
                && let Err(message) = validator.check(value)
            {
                errors.push(FieldError::new(path, message));
            }
        }
        (FieldKind::String, _) => errors.push(mismatch("string")),
        (FieldKind::Int, _) => errors.push(mismatch("int")),
        (FieldKind::Bool, _) => errors.push(mismatch("bool")),
        (FieldKind::StringMap, Value::Block(entries)) => {
            for (k, v) in entries {
                if v.as_str().is_none() {
                    errors.push(FieldError::new(
                        format!("{path}.{k}"),
                        format!("expected string, got {}", v.type_name()),
                    ));
                }
            }
        }
        (FieldKind::StringMap, _) => errors.push(mismatch("map of strings")),
        (FieldKind::List(elem), Value::List(items)) => {
            check_max_items(field, items.len(), path, errors);
            for (i, item) in items.iter().enumerate() {
                validate_value(field, elem, item, &format!("{path}.{i}"), errors);
            }
        }
        (FieldKind::List(_), _) => errors.push(mismatch("list")),
        (FieldKind::Blocks(schema), Value::List(items)) => {
            if field.required && items.is_empty() {
                errors.push(FieldError::new(path, "at least one block is required"));
            }
            check_max_items(field, items.len(), path, errors);
            for (i, item) in items.iter().enumerate() {
                match item {
                    Value::Block(block) => {
                        schema.validate_map(block, &format!("{path}.{i}."), errors)
                    }
                    other => errors.push(FieldError::new(
                        format!("{path}.{i}"),
                        format!("expected block, got {}", other.type_name()),
                    )),
                }
            }
        }
        (FieldKind::Blocks(_), _) => errors.push(mismatch("list of blocks")),
    }
}

/// Stable sort of block elements by a string field; elements without the
/// field keep their relative order at the end.
pub fn sort_blocks(items: &mut [Value], key: &str) {
    items.sort_by(|a, b| {
        let ka = a.as_block().and_then(|m| m.get(key)).and_then(Value::as_str);
        let kb = b.as_block().and_then(|m| m.get(key)).and_then(Value::as_str);
        match (ka, kb) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}

fn check_max_items(field: &FieldSchema, len: usize, path: &str, errors: &mut Vec<FieldError>) {
    if let Some(max) = field.max_items
        && len > max
    {
        errors.push(FieldError::new(
            path,
            format!("at most {max} item(s) allowed, got {len}"),
        ));
    }
}
