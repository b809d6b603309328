//! Schema - Type schemas for resource attributes
//!
//! Providers declare a schema for each resource type, enabling
//! validation before any remote API call is made.

use std::collections::HashMap;
use std::fmt;

use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, .. }, v) => {
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Attribute '{name}' conflicts with '{other}'")]
    ConflictingAttributes { name: String, other: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Filled in by the provider after the remote call
    pub computed: bool,
    /// Whether the operator may set this attribute. False only for
    /// purely computed outputs.
    pub accepts_input: bool,
    /// Redacted from logs and diffs (e.g., private keys)
    pub sensitive: bool,
    /// Changing this attribute requires replacing the resource
    pub force_new: bool,
    /// Attributes that must not be set together with this one
    pub conflicts_with: Vec<String>,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            accepts_input: true,
            sensitive: false,
            force_new: false,
            conflicts_with: Vec::new(),
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Purely computed output; rejected when given as input
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.accepts_input = false;
        self
    }

    /// Computed when absent, but the operator may also set it
    /// (e.g., security_policy)
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn conflicts_with(mut self, names: &[&str]) -> Self {
        self.conflicts_with = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes against this schema
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        for (name, value) in attributes {
            let Some(schema) = self.attributes.get(name) else {
                // Unknown attributes are allowed (for flexibility)
                continue;
            };

            // Purely computed attributes are provider output, never input
            if !schema.accepts_input {
                errors.push(TypeError::ComputedAttribute { name: name.clone() });
                continue;
            }

            if let Err(e) = schema.attr_type.validate(value) {
                errors.push(e);
            }

            for other in &schema.conflicts_with {
                // Report each conflict once, from the lexically smaller side
                if attributes.contains_key(other) && name < other {
                    errors.push(TypeError::ConflictingAttributes {
                        name: name.clone(),
                        other: other.clone(),
                    });
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["DAILY".to_string(), "HOURLY".to_string()]);
        assert!(t.validate(&Value::String("DAILY".to_string())).is_ok());
        assert!(t.validate(&Value::String("WEEKLY".to_string())).is_err());
    }

    #[test]
    fn validate_list_of_strings() {
        let t = AttributeType::List(Box::new(AttributeType::String));
        let ok = Value::List(vec![Value::from("a"), Value::from("b")]);
        let bad = Value::List(vec![Value::from("a"), Value::Int(1)]);
        assert!(t.validate(&ok).is_ok());
        assert!(t.validate(&bad).is_err());
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("zone")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let attrs = HashMap::new();
        let result = schema.validate(&attrs);
        assert!(result.is_err());
    }

    #[test]
    fn required_with_default_is_satisfied() {
        let schema = ResourceSchema::new("zone").attribute(
            AttributeSchema::new("comment", AttributeType::String)
                .required()
                .with_default(Value::from("Managed by Vela")),
        );

        assert!(schema.validate(&HashMap::new()).is_ok());
    }

    #[test]
    fn conflicting_attributes_are_rejected() {
        let schema = ResourceSchema::new("domain")
            .attribute(
                AttributeSchema::new("certificate_arn", AttributeType::String)
                    .conflicts_with(&["certificate_body"]),
            )
            .attribute(
                AttributeSchema::new("certificate_body", AttributeType::String)
                    .conflicts_with(&["certificate_arn"]),
            );

        let mut attrs = HashMap::new();
        attrs.insert("certificate_arn".to_string(), Value::from("arn:aws:acm:..."));
        attrs.insert("certificate_body".to_string(), Value::from("-----BEGIN..."));

        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            TypeError::ConflictingAttributes { .. }
        ));
    }

    #[test]
    fn unknown_attributes_are_allowed() {
        let schema = ResourceSchema::new("zone")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("example.com"));
        attrs.insert("extra".to_string(), Value::from("ignored"));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn computed_attribute_rejects_input() {
        let schema = ResourceSchema::new("zone")
            .attribute(AttributeSchema::new("name_servers", AttributeType::List(Box::new(AttributeType::String))).computed())
            .attribute(
                AttributeSchema::new("security_policy", AttributeType::String).optional_computed(),
            );

        let mut attrs = HashMap::new();
        attrs.insert(
            "name_servers".to_string(),
            Value::List(vec![Value::from("ns-1.awsdns.com")]),
        );
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::ComputedAttribute { .. }));

        // Optional+computed accepts input
        let mut attrs = HashMap::new();
        attrs.insert("security_policy".to_string(), Value::from("TLS_1_2"));
        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn custom_type_runs_validator() {
        let t = AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |v| match v {
                Value::Int(n) if (1..=65535).contains(n) => Ok(()),
                Value::Int(_) => Err("port out of range".to_string()),
                _ => Err("expected integer".to_string()),
            },
        };
        assert!(t.validate(&Value::Int(443)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
    }
}
