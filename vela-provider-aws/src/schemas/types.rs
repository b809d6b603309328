//! AWS-specific attribute type definitions

use vela_core::resource::Value;
use vela_core::schema::AttributeType;

use crate::validation::{validate_arn, validate_domain_name, validate_report_name};

/// ARN type with format validation
pub fn arn() -> AttributeType {
    AttributeType::Custom {
        name: "Arn".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_arn(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// DNS domain or zone name
pub fn domain_name() -> AttributeType {
    AttributeType::Custom {
        name: "DomainName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_domain_name(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Cost-and-usage report name
pub fn report_name() -> AttributeType {
    AttributeType::Custom {
        name: "ReportName".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| match value {
            Value::String(s) => validate_report_name(s),
            _ => Err("Expected string".to_string()),
        },
    }
}

/// Enum helper taking static variants
pub fn string_enum(variants: &[&str]) -> AttributeType {
    AttributeType::Enum(variants.iter().map(|s| s.to_string()).collect())
}

/// Map of string tags
pub fn tags() -> AttributeType {
    AttributeType::Map(Box::new(AttributeType::String))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arn_type_accepts_valid_arn() {
        let t = arn();
        assert!(
            t.validate(&Value::String(
                "arn:aws:apigateway:us-east-1::/domainnames/api.example.com".to_string()
            ))
            .is_ok()
        );
        assert!(t.validate(&Value::String("bogus".to_string())).is_err());
        assert!(t.validate(&Value::Int(1)).is_err());
    }

    #[test]
    fn domain_name_type() {
        let t = domain_name();
        assert!(t.validate(&Value::String("api.example.com".to_string())).is_ok());
        assert!(t.validate(&Value::String("..".to_string())).is_err());
    }
}
