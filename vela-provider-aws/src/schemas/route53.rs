//! Route 53 hosted zone schema definition

use vela_core::resource::Value;
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;

/// Default comment written when the operator sets none
pub const DEFAULT_ZONE_COMMENT: &str = "Managed by Vela";

/// Returns the schema for Route 53 hosted zones
pub fn zone_schema() -> ResourceSchema {
    ResourceSchema::new("route53.zone")
        .with_description("A Route 53 public or private hosted zone")
        .attribute(
            AttributeSchema::new("name", types::domain_name())
                .required()
                .force_new()
                .with_description("The zone name, e.g. example.com"),
        )
        .attribute(
            AttributeSchema::new("comment", AttributeType::String)
                .with_default(Value::from(DEFAULT_ZONE_COMMENT)),
        )
        .attribute(
            AttributeSchema::new("delegation_set_id", AttributeType::String)
                .force_new()
                .conflicts_with(&["vpc"])
                .with_description("Reusable delegation set to serve the zone from"),
        )
        .attribute(
            AttributeSchema::new(
                "vpc",
                AttributeType::List(Box::new(AttributeType::Map(Box::new(
                    AttributeType::String,
                )))),
            )
            .conflicts_with(&["delegation_set_id"])
            .with_description(
                "VPC associations ({vpc_id, vpc_region}); presence makes the zone private",
            ),
        )
        .attribute(
            AttributeSchema::new("force_destroy", AttributeType::Bool)
                .with_default(Value::from(false))
                .with_description("Delete all records in the zone before destroying it"),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
        .attribute(AttributeSchema::new("zone_id", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new(
                "name_servers",
                AttributeType::List(Box::new(AttributeType::String)),
            )
            .computed(),
        )
}
