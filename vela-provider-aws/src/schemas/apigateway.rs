//! API Gateway custom domain name schema definition

use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;

/// Returns the schema for API Gateway custom domain names
pub fn domain_name_schema() -> ResourceSchema {
    ResourceSchema::new("apigateway.domain_name")
        .with_description("An API Gateway custom domain name")
        .attribute(
            AttributeSchema::new("domain_name", types::domain_name())
                .required()
                .force_new(),
        )
        // ACM is the only supported path for new certificates; the IAM
        // certificate_body/chain/private_key trio is kept for imports.
        .attribute(
            AttributeSchema::new("certificate_arn", types::arn()).conflicts_with(&[
                "certificate_body",
                "certificate_chain",
                "certificate_name",
                "certificate_private_key",
                "regional_certificate_arn",
                "regional_certificate_name",
            ]),
        )
        .attribute(
            AttributeSchema::new("certificate_body", AttributeType::String)
                .force_new()
                .conflicts_with(&["certificate_arn", "regional_certificate_arn"]),
        )
        .attribute(
            AttributeSchema::new("certificate_chain", AttributeType::String)
                .force_new()
                .conflicts_with(&["certificate_arn", "regional_certificate_arn"]),
        )
        .attribute(
            AttributeSchema::new("certificate_name", AttributeType::String).conflicts_with(&[
                "certificate_arn",
                "regional_certificate_arn",
                "regional_certificate_name",
            ]),
        )
        .attribute(
            AttributeSchema::new("certificate_private_key", AttributeType::String)
                .force_new()
                .sensitive()
                .conflicts_with(&["certificate_arn", "regional_certificate_arn"]),
        )
        .attribute(
            AttributeSchema::new("regional_certificate_arn", types::arn()).conflicts_with(&[
                "certificate_arn",
                "certificate_body",
                "certificate_chain",
                "certificate_name",
                "certificate_private_key",
                "regional_certificate_name",
            ]),
        )
        .attribute(
            AttributeSchema::new("regional_certificate_name", AttributeType::String)
                .conflicts_with(&["certificate_arn", "certificate_name", "regional_certificate_arn"]),
        )
        .attribute(
            AttributeSchema::new(
                "endpoint_configuration",
                // { types: [EDGE | REGIONAL] }, at most one type
                AttributeType::Map(Box::new(AttributeType::List(Box::new(
                    types::string_enum(&["EDGE", "REGIONAL"]),
                )))),
            )
            .optional_computed(),
        )
        .attribute(
            AttributeSchema::new(
                "mutual_tls_authentication",
                // { truststore_uri, truststore_version }
                AttributeType::Map(Box::new(AttributeType::String)),
            ),
        )
        .attribute(
            AttributeSchema::new("ownership_verification_certificate_arn", types::arn())
                .optional_computed(),
        )
        .attribute(
            AttributeSchema::new(
                "security_policy",
                types::string_enum(&["TLS_1_0", "TLS_1_2"]),
            )
            .optional_computed(),
        )
        .attribute(AttributeSchema::new("tags", types::tags()))
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("certificate_upload_date", AttributeType::String).computed())
        .attribute(AttributeSchema::new("cloudfront_domain_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("cloudfront_zone_id", AttributeType::String).computed())
        .attribute(AttributeSchema::new("regional_domain_name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("regional_zone_id", AttributeType::String).computed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use vela_core::resource::Value;
    use vela_core::schema::TypeError;

    #[test]
    fn valid_edge_domain() {
        let schema = domain_name_schema();
        let mut attrs = HashMap::new();
        attrs.insert("domain_name".to_string(), Value::from("api.example.com"));
        attrs.insert(
            "certificate_arn".to_string(),
            Value::from("arn:aws:acm:us-east-1:123456789012:certificate/abc"),
        );
        let mut endpoint = HashMap::new();
        endpoint.insert(
            "types".to_string(),
            Value::List(vec![Value::from("EDGE")]),
        );
        attrs.insert("endpoint_configuration".to_string(), Value::Map(endpoint));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn acm_and_iam_certificates_conflict() {
        let schema = domain_name_schema();
        let mut attrs = HashMap::new();
        attrs.insert("domain_name".to_string(), Value::from("api.example.com"));
        attrs.insert(
            "certificate_arn".to_string(),
            Value::from("arn:aws:acm:us-east-1:123456789012:certificate/abc"),
        );
        attrs.insert(
            "certificate_body".to_string(),
            Value::from("-----BEGIN CERTIFICATE-----"),
        );

        let errors = schema.validate(&attrs).unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::ConflictingAttributes { .. }))
        );
    }

    #[test]
    fn invalid_endpoint_type_rejected() {
        let schema = domain_name_schema();
        let mut attrs = HashMap::new();
        attrs.insert("domain_name".to_string(), Value::from("api.example.com"));
        let mut endpoint = HashMap::new();
        endpoint.insert(
            "types".to_string(),
            Value::List(vec![Value::from("PRIVATE")]),
        );
        attrs.insert("endpoint_configuration".to_string(), Value::Map(endpoint));

        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn security_policy_enum() {
        let schema = domain_name_schema();
        let mut attrs = HashMap::new();
        attrs.insert("domain_name".to_string(), Value::from("api.example.com"));
        attrs.insert("security_policy".to_string(), Value::from("TLS_1_2"));
        assert!(schema.validate(&attrs).is_ok());

        attrs.insert("security_policy".to_string(), Value::from("SSL_3_0"));
        assert!(schema.validate(&attrs).is_err());
    }

    #[test]
    fn private_key_is_sensitive() {
        let schema = domain_name_schema();
        assert!(schema.attributes["certificate_private_key"].sensitive);
    }
}
