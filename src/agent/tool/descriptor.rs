use schemars::{JsonSchema, Schema};
use serde_json::{Map, Value};
use tracing::trace;

use crate::agent::types::{ParamFormat, ParamType, ToolDescriptor, ToolParameter};
use crate::error::ConfigError;

type Object = Map<String, Value>;

/// Build a tool descriptor from the JSON schema of the tool's request type.
///
/// Every field must carry a doc comment: it becomes the parameter description
/// the model sees. Only nullable fields (`Option`) become optional parameters;
/// a `#[serde(default)]` field is still required.
pub fn describe<T: JsonSchema>(name: &str, description: &str) -> Result<ToolDescriptor, ConfigError> {
    let schema = schemars::schema_for!(T);
    describe_schema(name, description, &schema)
}

/// Same as [`describe`], for an already generated root schema
pub fn describe_schema(
    name: &str,
    description: &str,
    schema: &Schema,
) -> Result<ToolDescriptor, ConfigError> {
    let root = schema
        .as_object()
        .ok_or_else(|| ConfigError::NotARecord(name.to_string()))?;
    if root.get("type").and_then(Value::as_str) != Some("object") {
        return Err(ConfigError::NotARecord(name.to_string()));
    }
    let properties = root
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| ConfigError::NotARecord(name.to_string()))?;

    let defs = root
        .get("$defs")
        .or_else(|| root.get("definitions"))
        .and_then(Value::as_object);

    let mut parameters = Vec::with_capacity(properties.len());
    for (field, property) in properties {
        let property = property.as_object().ok_or_else(|| ConfigError::MissingType {
            tool: name.to_string(),
            field: field.clone(),
        })?;

        let description = property
            .get("description")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ConfigError::MissingDescription {
                tool: name.to_string(),
                field: field.clone(),
            })?;

        let resolved = classify(property, defs).ok_or_else(|| ConfigError::MissingType {
            tool: name.to_string(),
            field: field.clone(),
        })?;
        trace!(
            "Tool '{}' field '{}': {:?}/{:?} nullable={}",
            name, field, resolved.param_type, resolved.format, resolved.nullable
        );

        parameters.push(ToolParameter {
            name: field.clone(),
            param_type: resolved.param_type,
            format: resolved.format,
            description: description.to_string(),
            required: !resolved.nullable,
        });
    }

    Ok(ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    })
}

/// Base type of a field once any optional wrapper is stripped
#[derive(Debug, Clone, Copy, PartialEq)]
struct Resolved {
    param_type: ParamType,
    format: ParamFormat,
    nullable: bool,
}

impl Resolved {
    fn object(nullable: bool) -> Self {
        Self {
            param_type: ParamType::Object,
            format: ParamFormat::Plain,
            nullable,
        }
    }
}

fn classify(property: &Object, defs: Option<&Object>) -> Option<Resolved> {
    match property.get("type") {
        Some(Value::String(base)) => return Some(map_base(base, property, false)),
        Some(Value::Array(types)) => {
            let nullable = types.iter().any(|t| t == "null");
            let bases: Vec<&str> = types
                .iter()
                .filter_map(Value::as_str)
                .filter(|t| *t != "null")
                .collect();
            return match bases.as_slice() {
                [base] => Some(map_base(base, property, nullable)),
                [] => None,
                _ => Some(Resolved::object(nullable)),
            };
        }
        _ => {}
    }

    for key in ["anyOf", "oneOf", "allOf"] {
        let Some(branches) = property.get(key).and_then(Value::as_array) else {
            continue;
        };
        let nullable = branches.iter().any(is_null_schema);
        let rest: Vec<&Object> = branches
            .iter()
            .filter(|b| !is_null_schema(b))
            .filter_map(Value::as_object)
            .collect();
        return match rest.as_slice() {
            [single] => classify(single, defs).map(|r| Resolved {
                nullable: r.nullable || nullable,
                ..r
            }),
            [] => None,
            _ => Some(Resolved::object(nullable)),
        };
    }

    if let Some(reference) = property.get("$ref").and_then(Value::as_str) {
        let target = reference
            .rsplit('/')
            .next()
            .and_then(|def| defs?.get(def))
            .and_then(Value::as_object);
        return match target {
            Some(def) => classify(def, defs),
            None => Some(Resolved::object(false)),
        };
    }

    if let Some(values) = property.get("enum").and_then(Value::as_array) {
        return if values.iter().all(Value::is_string) {
            Some(map_base("string", property, false))
        } else {
            Some(Resolved::object(false))
        };
    }

    None
}

fn is_null_schema(schema: &Value) -> bool {
    schema.get("type").and_then(Value::as_str) == Some("null")
}

fn map_base(base: &str, property: &Object, nullable: bool) -> Resolved {
    let (param_type, format) = match base {
        "integer" => (ParamType::Int, ParamFormat::Plain),
        "number" => (ParamType::Float, ParamFormat::Plain),
        "boolean" => (ParamType::Bool, ParamFormat::Plain),
        "string" => (
            ParamType::String,
            match property.get("format").and_then(Value::as_str) {
                Some("uuid") => ParamFormat::Uuid,
                Some("date-time") | Some("partial-date-time") => ParamFormat::Datetime,
                Some("date") => ParamFormat::Date,
                Some("time") | Some("partial-time") => ParamFormat::Time,
                Some("duration") => ParamFormat::Duration,
                _ => ParamFormat::String,
            },
        ),
        _ => (ParamType::Object, ParamFormat::Plain),
    };
    Resolved {
        param_type,
        format,
        nullable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate, Utc};
    use schemars::json_schema;
    use serde::Deserialize;
    use uuid::Uuid;

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct WhatToDoRequest {
        /// Situation description to decide what to do
        situation: String,
        /// This field is not used
        do_not_use_this_field: Option<String>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Booking {
        /// Booking id
        id: Uuid,
        /// Number of guests
        guests: u32,
        /// Total price
        price: f64,
        /// Whether breakfast is included
        breakfast: bool,
        /// Creation moment
        created_at: DateTime<Utc>,
        /// Arrival day
        arrival: NaiveDate,
        /// Guest preferences
        preferences: Option<Preferences>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Preferences {
        /// Room floor
        floor: u8,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Undocumented {
        /// Documented
        a: String,
        b: String,
    }

    fn param<'a>(descriptor: &'a ToolDescriptor, name: &str) -> &'a ToolParameter {
        descriptor
            .parameters
            .iter()
            .find(|p| p.name == name)
            .unwrap()
    }

    #[test]
    fn test_describe_keeps_fields_and_optionality() {
        let descriptor = describe::<WhatToDoRequest>("what_to_do", "Get a suggestion").unwrap();
        assert_eq!(descriptor.name, "what_to_do");
        assert_eq!(descriptor.description, "Get a suggestion");
        assert_eq!(descriptor.parameters.len(), 2);
        assert_eq!(descriptor.parameters[0].name, "situation");

        let situation = param(&descriptor, "situation");
        assert!(situation.required);
        assert_eq!(situation.param_type, ParamType::String);
        assert_eq!(situation.format, ParamFormat::String);
        assert_eq!(situation.description, "Situation description to decide what to do");

        let unused = param(&descriptor, "do_not_use_this_field");
        assert!(!unused.required);
        assert_eq!(unused.param_type, ParamType::String);
    }

    #[test]
    fn test_describe_maps_types_and_formats() {
        let descriptor = describe::<Booking>("book", "Book a room").unwrap();
        assert_eq!(descriptor.parameters.len(), 7);

        let expect = [
            ("id", ParamType::String, ParamFormat::Uuid),
            ("guests", ParamType::Int, ParamFormat::Plain),
            ("price", ParamType::Float, ParamFormat::Plain),
            ("breakfast", ParamType::Bool, ParamFormat::Plain),
            ("created_at", ParamType::String, ParamFormat::Datetime),
            ("arrival", ParamType::String, ParamFormat::Date),
            ("preferences", ParamType::Object, ParamFormat::Plain),
        ];
        for (name, param_type, format) in expect {
            let p = param(&descriptor, name);
            assert_eq!(p.param_type, param_type, "type of {}", name);
            assert_eq!(p.format, format, "format of {}", name);
        }
        assert!(!param(&descriptor, "preferences").required);
        assert!(param(&descriptor, "arrival").required);
    }

    #[allow(dead_code)]
    #[derive(Deserialize, JsonSchema)]
    struct Defaults {
        /// Search query
        query: String,
        /// Result language
        #[serde(default)]
        language: String,
        /// Page size
        limit: Option<u32>,
    }

    #[test]
    fn test_only_option_fields_are_optional() {
        let descriptor = describe::<Defaults>("search", "Search").unwrap();
        assert!(param(&descriptor, "query").required);
        assert!(param(&descriptor, "language").required);
        assert_eq!(param(&descriptor, "language").param_type, ParamType::String);
        assert!(!param(&descriptor, "limit").required);
        assert_eq!(param(&descriptor, "limit").param_type, ParamType::Int);
    }

    #[test]
    fn test_missing_description_is_rejected() {
        let err = describe::<Undocumented>("broken", "Broken tool").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingDescription { ref field, .. } if field == "b"
        ));
    }

    #[test]
    fn test_primitive_argument_is_not_a_record() {
        let err = describe::<String>("echo", "Echo").unwrap_err();
        assert!(matches!(err, ConfigError::NotARecord(_)));
    }

    #[test]
    fn test_untyped_field_is_rejected() {
        let schema = json_schema!({
            "type": "object",
            "properties": {
                "payload": {"description": "Anything at all"}
            },
            "required": ["payload"]
        });
        let err = describe_schema("raw", "Raw", &schema).unwrap_err();
        assert!(matches!(err, ConfigError::MissingType { .. }));
    }

    #[test]
    fn test_time_and_duration_formats() {
        let schema = json_schema!({
            "type": "object",
            "properties": {
                "at": {"type": "string", "format": "partial-time", "description": "Time of day"},
                "lasts": {"type": "string", "format": "duration", "description": "How long"},
                "note": {"anyOf": [{"type": "string"}, {"type": "null"}], "description": "Note"}
            },
            "required": ["at", "lasts", "note"]
        });
        let descriptor = describe_schema("plan", "Plan", &schema).unwrap();
        assert_eq!(param(&descriptor, "at").format, ParamFormat::Time);
        assert_eq!(param(&descriptor, "lasts").format, ParamFormat::Duration);
        let note = param(&descriptor, "note");
        assert_eq!(note.param_type, ParamType::String);
        assert!(!note.required);
    }

    #[test]
    fn test_string_enum_reference_resolves_to_string() {
        let schema = json_schema!({
            "type": "object",
            "properties": {
                "mood": {"$ref": "#/$defs/Mood", "description": "Current mood"}
            },
            "required": ["mood"],
            "$defs": {
                "Mood": {"type": "string", "enum": ["happy", "bored"]}
            }
        });
        let descriptor = describe_schema("mood", "Mood", &schema).unwrap();
        let mood = param(&descriptor, "mood");
        assert_eq!(mood.param_type, ParamType::String);
        assert!(mood.required);
    }
}
