//! Route 53 recovery-control routing control schema

use vela_core::resource::Value;
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;

pub fn routing_control_schema() -> ResourceSchema {
    ResourceSchema::new("recovery_control.routing_control")
        .with_description("A routing control hosted on a recovery-control cluster")
        .attribute(
            AttributeSchema::new("name", AttributeType::Custom {
                name: "RoutingControlName".to_string(),
                base: Box::new(AttributeType::String),
                validate: |value| match value {
                    Value::String(s) if (1..=64).contains(&s.len()) => Ok(()),
                    Value::String(_) => {
                        Err("name must be between 1 and 64 characters".to_string())
                    }
                    _ => Err("Expected string".to_string()),
                },
            })
            .required(),
        )
        .attribute(
            AttributeSchema::new("cluster_arn", types::arn())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("control_panel_arn", types::arn())
                .optional_computed()
                .force_new()
                .with_description("Defaults to the cluster's default control panel"),
        )
        .attribute(AttributeSchema::new("status", AttributeType::String).computed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn valid_routing_control() {
        let schema = routing_control_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("failover-primary"));
        attrs.insert(
            "cluster_arn".to_string(),
            Value::from("arn:aws:route53-recovery-control::123456789012:cluster/5d3e"),
        );
        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn cluster_arn_is_required_and_validated() {
        let schema = routing_control_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("failover-primary"));
        assert!(schema.validate(&attrs).is_err());

        attrs.insert("cluster_arn".to_string(), Value::from("not-an-arn"));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn overlong_name_rejected() {
        let schema = routing_control_schema();
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::from("x".repeat(65)));
        attrs.insert(
            "cluster_arn".to_string(),
            Value::from("arn:aws:route53-recovery-control::123456789012:cluster/5d3e"),
        );
        assert!(schema.validate(&attrs).is_err());
    }
}
