//! Route 53 recovery-control routing control adapter
//!
//! Routing controls are identified by their ARN. Creation is
//! asynchronous: the control sits in PENDING while the cluster deploys
//! it, and deletion passes through PENDING_DELETION before the control
//! disappears.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_route53recoverycontrolconfig::Client;
use aws_sdk_route53recoverycontrolconfig::error::ProvideErrorMetadata;
use aws_sdk_route53recoverycontrolconfig::types::RoutingControl;
use tracing::{debug, warn};
use uuid::Uuid;
use vela_core::provider::{ProviderError, ProviderResult};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::retry::StateChange;

use crate::errors::is_throttling_code;

fn routing_control_attributes(control: &RoutingControl) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    if let Some(name) = control.name() {
        attributes.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(arn) = control.control_panel_arn() {
        attributes.insert(
            "control_panel_arn".to_string(),
            Value::String(arn.to_string()),
        );
    }
    if let Some(status) = control.status() {
        attributes.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
    }
    attributes
}

/// The cluster ARN is configuration the describe call never returns;
/// carry it into state so drift checks keep working
fn carry_over_cluster_arn(resource: &Resource, state: &mut State) {
    if let Some(cluster_arn) = resource.string_attr("cluster_arn") {
        state
            .attributes
            .insert("cluster_arn".to_string(), Value::String(cluster_arn.to_string()));
    }
}

async fn describe_routing_control(
    client: &Client,
    routing_control_arn: &str,
) -> ProviderResult<Option<RoutingControl>> {
    let result = client
        .describe_routing_control()
        .routing_control_arn(routing_control_arn)
        .send()
        .await;

    match result {
        Ok(out) => Ok(out.routing_control().cloned()),
        Err(err) => {
            let not_found = err
                .as_service_error()
                .map(|e| e.is_resource_not_found_exception())
                .unwrap_or(false);
            if not_found {
                Ok(None)
            } else {
                let e = ProviderError::new(format!(
                    "Failed to describe routing control: {:?}",
                    err
                ));
                if is_throttling_code(err.code()) {
                    Err(e.transient())
                } else {
                    Err(e)
                }
            }
        }
    }
}

async fn wait_for_routing_control_deployed(
    client: &Client,
    routing_control_arn: &str,
) -> ProviderResult<RoutingControl> {
    let arn = routing_control_arn.to_string();
    let conf = StateChange::new(["PENDING"], ["DEPLOYED"])
        .timeout(Duration::from_secs(2 * 60))
        .min_timeout(Duration::from_secs(5));

    let control = conf
        .wait_for(|| {
            let arn = arn.clone();
            async move {
                Ok(describe_routing_control(client, &arn).await?.map(|control| {
                    let status = control
                        .status()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_else(|| "PENDING".to_string());
                    (control, status)
                }))
            }
        })
        .await
        .map_err(ProviderError::from)?;

    control.ok_or_else(|| {
        ProviderError::new("Routing control disappeared while deploying").not_found()
    })
}

async fn wait_for_routing_control_deleted(
    client: &Client,
    routing_control_arn: &str,
) -> ProviderResult<()> {
    let arn = routing_control_arn.to_string();
    let conf = StateChange::new(["DEPLOYED", "PENDING_DELETION"], [])
        .timeout(Duration::from_secs(5 * 60))
        .min_timeout(Duration::from_secs(5));

    conf.wait_for(|| {
        let arn = arn.clone();
        async move {
            Ok(describe_routing_control(client, &arn).await?.map(|control| {
                let status = control
                    .status()
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_else(|| "PENDING_DELETION".to_string());
                ((), status)
            }))
        }
    })
    .await
    .map_err(ProviderError::from)?;

    Ok(())
}

/// Read a routing control by its ARN
pub(crate) async fn read_routing_control(
    client: &Client,
    id: ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(arn) = identifier else {
        return Ok(State::not_found(id));
    };

    let control = describe_routing_control(client, arn)
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

    match control {
        Some(control) => {
            Ok(State::existing(id, routing_control_attributes(&control)).with_identifier(arn))
        }
        None => {
            warn!(routing_control_arn = %arn, "routing control not found, removing from state");
            Ok(State::not_found(id))
        }
    }
}

/// Create a routing control and wait until the cluster deploys it
pub(crate) async fn create_routing_control(
    client: &Client,
    resource: &Resource,
) -> ProviderResult<State> {
    let name = resource
        .string_attr("name")
        .ok_or_else(|| {
            ProviderError::new("Routing control name is required")
                .for_resource(resource.id.clone())
        })?
        .to_string();
    let cluster_arn = resource
        .string_attr("cluster_arn")
        .ok_or_else(|| {
            ProviderError::new("Cluster ARN is required").for_resource(resource.id.clone())
        })?
        .to_string();

    let mut req = client
        .create_routing_control()
        .client_token(Uuid::new_v4().to_string())
        .cluster_arn(&cluster_arn)
        .routing_control_name(&name);

    if let Some(control_panel_arn) = resource.string_attr("control_panel_arn") {
        req = req.control_panel_arn(control_panel_arn);
    }

    let out = req.send().await.map_err(|e| {
        ProviderError::new(format!("Failed to create routing control: {:?}", e))
            .for_resource(resource.id.clone())
    })?;

    let arn = out
        .routing_control()
        .and_then(|c| c.routing_control_arn())
        .map(String::from)
        .ok_or_else(|| {
            ProviderError::new("Routing control created but no ARN returned")
                .for_resource(resource.id.clone())
        })?;

    debug!(routing_control_arn = %arn, name = %name, "created routing control");

    wait_for_routing_control_deployed(client, &arn)
        .await
        .map_err(|e| e.for_resource(resource.id.clone()))?;

    let mut state = read_routing_control(client, resource.id.clone(), Some(&arn)).await?;
    carry_over_cluster_arn(resource, &mut state);
    Ok(state)
}

/// Rename a routing control; everything else forces replacement
pub(crate) async fn update_routing_control(
    client: &Client,
    id: ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let new_name = to.string_attr("name").ok_or_else(|| {
        ProviderError::new("Routing control name is required").for_resource(id.clone())
    })?;
    let old_name = from.attributes.get("name").and_then(Value::as_str);

    if old_name != Some(new_name) {
        client
            .update_routing_control()
            .routing_control_arn(identifier)
            .routing_control_name(new_name)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to update routing control: {:?}", e))
                    .for_resource(id.clone())
            })?;
    }

    let mut state = read_routing_control(client, id, Some(identifier)).await?;
    carry_over_cluster_arn(to, &mut state);
    Ok(state)
}

/// Delete a routing control and wait for it to disappear
pub(crate) async fn delete_routing_control(
    client: &Client,
    id: ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    let result = client
        .delete_routing_control()
        .routing_control_arn(identifier)
        .send()
        .await;

    if let Err(err) = result {
        let not_found = err
            .as_service_error()
            .map(|e| e.is_resource_not_found_exception())
            .unwrap_or(false);
        if not_found {
            debug!(routing_control_arn = %identifier, "routing control already deleted");
            return Ok(());
        }
        return Err(
            ProviderError::new(format!("Failed to delete routing control: {:?}", err))
                .for_resource(id),
        );
    }

    wait_for_routing_control_deleted(client, identifier)
        .await
        .map_err(|e| e.for_resource(id))
}
