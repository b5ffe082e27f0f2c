// Schema translator
//! Turns a remote tool's declared input schema into a static
//! [`ArgumentContract`] and validates call arguments against it before any
//! request is sent. No coercion: a value either has the declared type or the
//! call is rejected.

use serde::Serialize;
use serde_json::{json, Map, Value};

use super::types::ToolDescriptor;

/// Native type a parameter maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParamType {
    /// Fixed tag table. Missing or unrecognised tags fall back to `String`.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag {
            Some("integer") => ParamType::Integer,
            Some("number") => ParamType::Number,
            Some("boolean") => ParamType::Boolean,
            Some("object") => ParamType::Object,
            Some("array") => ParamType::Array,
            _ => ParamType::String,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub description: Option<String>,
}

/// Typed argument contract for one remote tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgumentContract {
    pub tool: String,
    pub params: Vec<ParamSpec>,
    pub allow_extra: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("arguments for '{tool}' must be a JSON object, got {found}")]
    NotAnObject { tool: String, found: &'static str },
    #[error("missing required argument '{param}' for '{tool}'")]
    MissingRequired { tool: String, param: String },
    #[error("argument '{param}' for '{tool}' must be {expected}, got {found}")]
    WrongType {
        tool: String,
        param: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("unknown argument '{param}' for '{tool}'")]
    Unknown { tool: String, param: String },
}

/// Translate a descriptor into its contract. Pure and deterministic.
pub fn translate(descriptor: &ToolDescriptor) -> ArgumentContract {
    let mut params: Vec<ParamSpec> = descriptor
        .params
        .iter()
        .map(|p| ParamSpec {
            name: p.name.clone(),
            ty: ParamType::from_tag(p.type_tag.as_deref()),
            required: p.required,
            description: p.description.clone(),
        })
        .collect();
    params.sort_by(|a, b| a.name.cmp(&b.name));

    ArgumentContract {
        tool: descriptor.name.clone(),
        params,
        allow_extra: descriptor.additional_properties,
    }
}

impl ArgumentContract {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    /// Check `args` and return the argument object to send.
    ///
    /// `null` means "no arguments". Optional parameters passed as `null` are
    /// dropped rather than sent.
    pub fn validate(&self, args: &Value) -> Result<Map<String, Value>, ContractError> {
        let obj = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map.clone(),
            other => {
                return Err(ContractError::NotAnObject {
                    tool: self.tool.clone(),
                    found: json_kind(other),
                })
            }
        };

        for spec in self.required() {
            if obj.get(&spec.name).is_none_or(Value::is_null) {
                return Err(ContractError::MissingRequired {
                    tool: self.tool.clone(),
                    param: spec.name.clone(),
                });
            }
        }

        let mut out = Map::with_capacity(obj.len());
        for (name, value) in obj {
            match self.param(&name) {
                Some(_) if value.is_null() => continue,
                Some(spec) if !spec.ty.accepts(&value) => {
                    return Err(ContractError::WrongType {
                        tool: self.tool.clone(),
                        param: name,
                        expected: spec.ty.tag(),
                        found: json_kind(&value),
                    })
                }
                Some(_) => {}
                None if !self.allow_extra => {
                    return Err(ContractError::Unknown {
                        tool: self.tool.clone(),
                        param: name,
                    })
                }
                None => {}
            }
            out.insert(name, value);
        }
        Ok(out)
    }

    /// JSON Schema advertised to the model for this contract.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for p in &self.params {
            let mut prop = json!({ "type": p.ty.tag() });
            if let Some(desc) = &p.description {
                prop["description"] = json!(desc);
            }
            properties.insert(p.name.clone(), prop);
        }
        let required: Vec<&str> = self.required().map(|p| p.name.as_str()).collect();
        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "required": required,
        });
        if !self.allow_extra {
            schema["additionalProperties"] = json!(false);
        }
        schema
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(schema: Value) -> ToolDescriptor {
        ToolDescriptor::from_listing(&json!({
            "name": "list_repositories",
            "description": "List repos",
            "inputSchema": schema
        }))
        .unwrap()
    }

    fn owner_repo() -> ArgumentContract {
        translate(&descriptor(json!({
            "type": "object",
            "properties": {
                "owner": {"type": "string"},
                "repo": {"type": "string"}
            },
            "required": ["owner"]
        })))
    }

    #[test]
    fn owner_is_required_repo_is_optional() {
        let c = owner_repo();
        assert!(c.param("owner").unwrap().required);
        assert!(!c.param("repo").unwrap().required);
        assert_eq!(c.param("repo").unwrap().ty, ParamType::String);
    }

    #[test]
    fn accepts_required_only() {
        let args = owner_repo().validate(&json!({"owner": "acme"})).unwrap();
        assert_eq!(args["owner"], "acme");
        assert!(!args.contains_key("repo"));
    }

    #[test]
    fn rejects_missing_required() {
        let err = owner_repo().validate(&json!({})).unwrap_err();
        assert_eq!(
            err,
            ContractError::MissingRequired {
                tool: "list_repositories".into(),
                param: "owner".into()
            }
        );
        assert!(owner_repo().validate(&json!({"owner": null})).is_err());
    }

    #[test]
    fn rejects_wrong_type_without_coercion() {
        let c = translate(&descriptor(json!({
            "properties": {"limit": {"type": "integer"}, "ratio": {"type": "number"}}
        })));
        assert!(matches!(
            c.validate(&json!({"limit": "5"})),
            Err(ContractError::WrongType { expected: "integer", found: "string", .. })
        ));
        assert!(matches!(
            c.validate(&json!({"limit": 2.5})),
            Err(ContractError::WrongType { expected: "integer", found: "number", .. })
        ));
        assert!(c.validate(&json!({"limit": 5, "ratio": 1})).is_ok());
    }

    #[test]
    fn non_object_arguments_rejected() {
        assert!(matches!(
            owner_repo().validate(&json!(["acme"])),
            Err(ContractError::NotAnObject { found: "array", .. })
        ));
    }

    #[test]
    fn null_optional_is_dropped() {
        let args = owner_repo().validate(&json!({"owner": "acme", "repo": null})).unwrap();
        assert!(!args.contains_key("repo"));
    }

    #[test]
    fn extra_arguments_follow_additional_properties() {
        assert!(owner_repo().validate(&json!({"owner": "a", "page": 2})).is_ok());

        let strict = translate(&descriptor(json!({
            "properties": {"owner": {"type": "string"}},
            "additionalProperties": false
        })));
        assert!(matches!(
            strict.validate(&json!({"page": 2})),
            Err(ContractError::Unknown { .. })
        ));
    }

    #[test]
    fn unknown_type_tag_defaults_to_string() {
        assert_eq!(ParamType::from_tag(Some("uuid")), ParamType::String);
        assert_eq!(ParamType::from_tag(None), ParamType::String);
    }

    #[test]
    fn translation_is_deterministic() {
        let d = descriptor(json!({
            "properties": {"b": {"type": "boolean"}, "a": {"type": "array"}},
            "required": ["b"]
        }));
        let first = translate(&d);
        assert_eq!(first, translate(&d));
        assert_eq!(first.params[0].name, "a");
        assert_eq!(first.to_json_schema(), translate(&d).to_json_schema());
    }

    #[test]
    fn schema_roundtrips_required() {
        let schema = owner_repo().to_json_schema();
        assert_eq!(schema["required"], json!(["owner"]));
        assert_eq!(schema["properties"]["repo"]["type"], "string");
        assert!(schema.get("additionalProperties").is_none());
    }
}
