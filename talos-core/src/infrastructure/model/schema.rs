use serde_json::Value;

/// Declarative description of the JSON object a model call must produce.
///
/// Validation is interpreted generically over `serde_json::Value`, so the
/// target Rust type stays a plain serde struct and the constraints (ranges,
/// non-empty strings, nested shapes) live in one inspectable place. The
/// same description is rendered into the repair prompt when the model's
/// output does not conform.
#[derive(Debug, Clone)]
pub struct Schema {
    pub name: &'static str,
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    String { non_empty: bool },
    Bool,
    UInt { min: Option<u64> },
    Float { min: Option<f64>, max: Option<f64> },
    Array { items: Box<FieldKind>, min_items: usize },
    Object,
    Struct(Schema),
}

impl Schema {
    /// Check `value` against this schema. Returns the first violation as a
    /// human-readable detail string with a JSON-path-like location.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let Value::Object(map) = value else {
            return Err(format!("expected a JSON object, got {}", type_name(value)));
        };

        for field in &self.fields {
            match map.get(field.name) {
                Some(inner) => validate_kind(&field.kind, inner, field.name)?,
                None if field.required => {
                    return Err(format!("missing required field '{}'", field.name));
                }
                None => {}
            }
        }
        Ok(())
    }

    /// One line per field, used to describe the expected shape to the model
    /// in repair prompts.
    pub fn describe(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let requirement = if field.required { "required" } else { "optional" };
            lines.push(format!(
                "- \"{}\" ({}): {}",
                field.name,
                requirement,
                describe_kind(&field.kind)
            ));
        }
        lines.join("\n")
    }
}

fn validate_kind(kind: &FieldKind, value: &Value, path: &str) -> Result<(), String> {
    match kind {
        FieldKind::String { non_empty } => match value.as_str() {
            Some(text) if *non_empty && text.trim().is_empty() => {
                Err(format!("field '{path}' must be a non-empty string"))
            }
            Some(_) => Ok(()),
            None => Err(format!(
                "field '{path}' must be a string, got {}",
                type_name(value)
            )),
        },
        FieldKind::Bool => value
            .as_bool()
            .map(|_| ())
            .ok_or_else(|| format!("field '{path}' must be a boolean, got {}", type_name(value))),
        FieldKind::UInt { min } => match value.as_u64() {
            Some(number) => match min {
                Some(min) if number < *min => {
                    Err(format!("field '{path}' must be >= {min}, got {number}"))
                }
                _ => Ok(()),
            },
            None => Err(format!(
                "field '{path}' must be a non-negative integer, got {}",
                type_name(value)
            )),
        },
        FieldKind::Float { min, max } => match value.as_f64() {
            Some(number) => {
                if let Some(min) = min {
                    if number < *min {
                        return Err(format!("field '{path}' must be >= {min}, got {number}"));
                    }
                }
                if let Some(max) = max {
                    if number > *max {
                        return Err(format!("field '{path}' must be <= {max}, got {number}"));
                    }
                }
                Ok(())
            }
            None => Err(format!(
                "field '{path}' must be a number, got {}",
                type_name(value)
            )),
        },
        FieldKind::Array { items, min_items } => match value.as_array() {
            Some(entries) => {
                if entries.len() < *min_items {
                    return Err(format!(
                        "field '{path}' must have at least {min_items} item(s), got {}",
                        entries.len()
                    ));
                }
                for (index, entry) in entries.iter().enumerate() {
                    validate_kind(items, entry, &format!("{path}[{index}]"))?;
                }
                Ok(())
            }
            None => Err(format!(
                "field '{path}' must be an array, got {}",
                type_name(value)
            )),
        },
        FieldKind::Object => value
            .as_object()
            .map(|_| ())
            .ok_or_else(|| format!("field '{path}' must be an object, got {}", type_name(value))),
        FieldKind::Struct(schema) => {
            schema.validate(value).map_err(|detail| format!("{path}: {detail}"))
        }
    }
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::String { non_empty: true } => "non-empty string".to_string(),
        FieldKind::String { non_empty: false } => "string".to_string(),
        FieldKind::Bool => "boolean".to_string(),
        FieldKind::UInt { min: Some(min) } => format!("integer >= {min}"),
        FieldKind::UInt { min: None } => "non-negative integer".to_string(),
        FieldKind::Float {
            min: Some(min),
            max: Some(max),
        } => format!("number between {min} and {max}"),
        FieldKind::Float { min: Some(min), .. } => format!("number >= {min}"),
        FieldKind::Float { max: Some(max), .. } => format!("number <= {max}"),
        FieldKind::Float { .. } => "number".to_string(),
        FieldKind::Array { items, min_items: 0 } => {
            format!("array of {}", describe_kind(items))
        }
        FieldKind::Array { items, min_items } => {
            format!("array of {} with at least {min_items} item(s)", describe_kind(items))
        }
        FieldKind::Object => "object".to_string(),
        FieldKind::Struct(schema) => format!("object with fields:\n{}", indent(&schema.describe())),
    }
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
