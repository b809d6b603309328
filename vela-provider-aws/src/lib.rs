//! AWS provider
//!
//! Implements the Provider trait for a set of AWS resources:
//! Route 53 hosted zones, API Gateway custom domain names,
//! cost-and-usage report definitions, and recovery-control routing
//! controls. Each resource family lives in its own module; this module
//! owns the SDK clients and dispatches by resource type.

pub mod schemas;
pub mod validation;

mod apigateway;
mod cur;
mod errors;
mod recovery_control;
mod route53;
mod tags;

use aws_config::BehaviorVersion;
use vela_core::provider::{
    BoxFuture, Provider, ProviderError, ProviderResult, ResourceType,
};
use vela_core::resource::{Resource, ResourceId, State};
use vela_core::schema::ResourceSchema;

const ROUTE53_ZONE: &str = "route53.zone";
const APIGATEWAY_DOMAIN_NAME: &str = "apigateway.domain_name";
const CUR_REPORT_DEFINITION: &str = "cur.report_definition";
const RECOVERY_CONTROL_ROUTING_CONTROL: &str = "recovery_control.routing_control";

struct Route53Zone;

impl ResourceType for Route53Zone {
    fn name(&self) -> &'static str {
        ROUTE53_ZONE
    }

    fn schema(&self) -> ResourceSchema {
        schemas::route53::zone_schema()
    }
}

struct ApiGatewayDomainName;

impl ResourceType for ApiGatewayDomainName {
    fn name(&self) -> &'static str {
        APIGATEWAY_DOMAIN_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schemas::apigateway::domain_name_schema()
    }
}

struct CurReportDefinition;

impl ResourceType for CurReportDefinition {
    fn name(&self) -> &'static str {
        CUR_REPORT_DEFINITION
    }

    fn schema(&self) -> ResourceSchema {
        schemas::cur::report_definition_schema()
    }
}

struct RecoveryControlRoutingControl;

impl ResourceType for RecoveryControlRoutingControl {
    fn name(&self) -> &'static str {
        RECOVERY_CONTROL_ROUTING_CONTROL
    }

    fn schema(&self) -> ResourceSchema {
        schemas::recovery_control::routing_control_schema()
    }
}

/// AWS implementation of the Provider trait
pub struct AwsProvider {
    route53: aws_sdk_route53::Client,
    apigateway: aws_sdk_apigateway::Client,
    cur: aws_sdk_costandusagereport::Client,
    recovery_control: aws_sdk_route53recoverycontrolconfig::Client,
    region: String,
}

impl AwsProvider {
    /// Build a provider from the ambient AWS configuration
    /// (environment, shared config files, instance metadata)
    pub async fn new() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| "us-east-1".to_string());

        Self {
            route53: aws_sdk_route53::Client::new(&config),
            apigateway: aws_sdk_apigateway::Client::new(&config),
            cur: aws_sdk_costandusagereport::Client::new(&config),
            recovery_control: aws_sdk_route53recoverycontrolconfig::Client::new(&config),
            region,
        }
    }

    /// Build a provider from pre-configured clients
    pub fn with_clients(
        route53: aws_sdk_route53::Client,
        apigateway: aws_sdk_apigateway::Client,
        cur: aws_sdk_costandusagereport::Client,
        recovery_control: aws_sdk_route53recoverycontrolconfig::Client,
        region: impl Into<String>,
    ) -> Self {
        Self {
            route53,
            apigateway,
            cur,
            recovery_control,
            region: region.into(),
        }
    }

    fn unsupported(id: &ResourceId) -> ProviderError {
        ProviderError::new(format!(
            "Unsupported resource type: {}",
            id.resource_type
        ))
        .for_resource(id.clone())
    }
}

/// Validate a resource's attributes against its declared schema
fn validate_resource(resource: &Resource) -> ProviderResult<()> {
    let Some(schema) = schemas::schemas()
        .into_iter()
        .find(|s| s.resource_type == resource.id.resource_type)
    else {
        return Err(AwsProvider::unsupported(&resource.id));
    };

    schema.validate(&resource.attributes).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        ProviderError::new(messages.join("; ")).for_resource(resource.id.clone())
    })
}

/// Data sources resolve through their natural key attribute instead of
/// a stored identifier
fn data_source_key(resource: &Resource) -> ProviderResult<String> {
    let attr = match resource.id.resource_type.as_str() {
        CUR_REPORT_DEFINITION => "report_name",
        APIGATEWAY_DOMAIN_NAME => "domain_name",
        _ => {
            return Err(ProviderError::new(format!(
                "Resource type {} cannot be used as a data source",
                resource.id.resource_type
            ))
            .for_resource(resource.id.clone()));
        }
    };

    resource
        .string_attr(attr)
        .map(String::from)
        .ok_or_else(|| {
            ProviderError::new(format!("Data source requires attribute '{}'", attr))
                .for_resource(resource.id.clone())
        })
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![
            Box::new(Route53Zone),
            Box::new(ApiGatewayDomainName),
            Box::new(CurReportDefinition),
            Box::new(RecoveryControlRoutingControl),
        ]
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(String::from);
        Box::pin(async move {
            let identifier = identifier.as_deref();
            match id.resource_type.as_str() {
                ROUTE53_ZONE => route53::read_zone(&self.route53, id, identifier).await,
                APIGATEWAY_DOMAIN_NAME => {
                    apigateway::read_domain_name(&self.apigateway, &self.region, id, identifier)
                        .await
                }
                CUR_REPORT_DEFINITION => {
                    cur::read_report_definition(&self.cur, id, identifier).await
                }
                RECOVERY_CONTROL_ROUTING_CONTROL => {
                    recovery_control::read_routing_control(&self.recovery_control, id, identifier)
                        .await
                }
                _ => Err(Self::unsupported(&id)),
            }
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            validate_resource(&resource)?;

            if resource.is_data_source() {
                let key = data_source_key(&resource)?;
                let state = self.read(&resource.id, Some(&key)).await?;
                if !state.exists {
                    return Err(ProviderError::new(format!(
                        "Data source target '{}' does not exist",
                        key
                    ))
                    .not_found()
                    .for_resource(resource.id.clone()));
                }
                return Ok(state);
            }

            match resource.id.resource_type.as_str() {
                ROUTE53_ZONE => {
                    route53::create_zone(&self.route53, &self.region, &resource).await
                }
                APIGATEWAY_DOMAIN_NAME => {
                    apigateway::create_domain_name(&self.apigateway, &self.region, &resource)
                        .await
                }
                CUR_REPORT_DEFINITION => {
                    cur::create_report_definition(&self.cur, &resource).await
                }
                RECOVERY_CONTROL_ROUTING_CONTROL => {
                    recovery_control::create_routing_control(&self.recovery_control, &resource)
                        .await
                }
                _ => Err(Self::unsupported(&resource.id)),
            }
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            validate_resource(&to)?;

            match id.resource_type.as_str() {
                ROUTE53_ZONE => {
                    route53::update_zone(&self.route53, &self.region, id, &identifier, &from, &to)
                        .await
                }
                APIGATEWAY_DOMAIN_NAME => {
                    apigateway::update_domain_name(
                        &self.apigateway,
                        &self.region,
                        id,
                        &identifier,
                        &from,
                        &to,
                    )
                    .await
                }
                CUR_REPORT_DEFINITION => {
                    cur::update_report_definition(&self.cur, id, &identifier, &to).await
                }
                RECOVERY_CONTROL_ROUTING_CONTROL => {
                    recovery_control::update_routing_control(
                        &self.recovery_control,
                        id,
                        &identifier,
                        &from,
                        &to,
                    )
                    .await
                }
                _ => Err(Self::unsupported(&id)),
            }
        })
    }

    fn delete(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
    ) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        Box::pin(async move {
            match id.resource_type.as_str() {
                ROUTE53_ZONE => {
                    route53::delete_zone(&self.route53, id, &identifier, &from).await
                }
                APIGATEWAY_DOMAIN_NAME => {
                    apigateway::delete_domain_name(&self.apigateway, id, &identifier).await
                }
                CUR_REPORT_DEFINITION => {
                    cur::delete_report_definition(&self.cur, id, &identifier).await
                }
                RECOVERY_CONTROL_ROUTING_CONTROL => {
                    recovery_control::delete_routing_control(
                        &self.recovery_control,
                        id,
                        &identifier,
                    )
                    .await
                }
                _ => Err(Self::unsupported(&id)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vela_core::resource::Value;

    #[test]
    fn every_resource_type_has_a_schema() {
        let declared: Vec<&str> = [
            ROUTE53_ZONE,
            APIGATEWAY_DOMAIN_NAME,
            CUR_REPORT_DEFINITION,
            RECOVERY_CONTROL_ROUTING_CONTROL,
        ]
        .to_vec();

        let from_schemas: Vec<String> = schemas::schemas()
            .into_iter()
            .map(|s| s.resource_type)
            .collect();

        for name in declared {
            assert!(
                from_schemas.iter().any(|s| s == name),
                "missing schema for {name}"
            );
        }
    }

    #[test]
    fn validation_rejects_unknown_type() {
        let resource = Resource::new("dynamodb.table", "users");
        let err = validate_resource(&resource).unwrap_err();
        assert!(err.to_string().contains("Unsupported resource type"));
    }

    #[test]
    fn validation_rejects_bad_attributes() {
        let resource = Resource::new(ROUTE53_ZONE, "primary");
        // name missing
        assert!(validate_resource(&resource).is_err());

        let resource = resource.with_attribute("name", Value::from("example.com"));
        assert!(validate_resource(&resource).is_ok());
    }

    #[test]
    fn data_source_key_resolution() {
        let resource = Resource::new(CUR_REPORT_DEFINITION, "billing")
            .with_read_only(true)
            .with_attribute("report_name", Value::from("monthly-costs"));
        assert_eq!(data_source_key(&resource).unwrap(), "monthly-costs");

        let zone = Resource::new(ROUTE53_ZONE, "primary").with_read_only(true);
        assert!(data_source_key(&zone).is_err());
    }
}
