//! Resource schemas for the AWS provider

pub mod apigateway;
pub mod cur;
pub mod recovery_control;
pub mod route53;
pub mod types;

use vela_core::schema::ResourceSchema;

/// Returns all schemas this provider declares
pub fn schemas() -> Vec<ResourceSchema> {
    vec![
        route53::zone_schema(),
        apigateway::domain_name_schema(),
        cur::report_definition_schema(),
        recovery_control::routing_control_schema(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_types_are_unique() {
        let all = schemas();
        let mut names: Vec<_> = all.iter().map(|s| s.resource_type.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }
}
