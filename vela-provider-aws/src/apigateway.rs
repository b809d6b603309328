//! API Gateway custom domain name adapter
//!
//! The domain name itself is the provider-side identifier. Updates go
//! through the patch-operation API and may leave the domain in an
//! UPDATING status while CloudFront redeploys, so updates wait for the
//! domain to come back AVAILABLE.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_apigateway::Client;
use aws_sdk_apigateway::error::ProvideErrorMetadata;
use aws_sdk_apigateway::types::{
    EndpointConfiguration, EndpointType, MutualTlsAuthenticationInput, Op, PatchOperation,
    SecurityPolicy,
};
use tracing::{debug, warn};
use vela_core::provider::{ProviderError, ProviderResult};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::retry::StateChange;

use crate::errors::is_throttling_code;
use crate::tags::{tag_diff, tag_map, tags_attr};

/// API Gateway domain names live under this ARN form
fn domain_name_arn(region: &str, domain_name: &str) -> String {
    format!("arn:aws:apigateway:{}::/domainnames/{}", region, domain_name)
}

fn map_str<'a>(attrs: &'a HashMap<String, Value>, map_key: &str, key: &str) -> Option<&'a str> {
    if let Some(Value::Map(map)) = attrs.get(map_key) {
        map.get(key).and_then(Value::as_str)
    } else {
        None
    }
}

/// The single endpoint type declared under endpoint_configuration.types
fn endpoint_type(attrs: &HashMap<String, Value>) -> Option<&str> {
    if let Some(Value::Map(map)) = attrs.get("endpoint_configuration")
        && let Some(Value::List(types)) = map.get("types")
    {
        types.first().and_then(Value::as_str)
    } else {
        None
    }
}

fn attr_str<'a>(attrs: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str)
}

/// Patch operations needed to move the remote domain from its last
/// known state to the desired configuration
fn patch_operations(from: &State, to: &Resource) -> Vec<PatchOperation> {
    let mut ops = Vec::new();

    let replace = |path: &str, value: &str| {
        PatchOperation::builder()
            .op(Op::Replace)
            .path(path)
            .value(value)
            .build()
    };

    let simple = [
        ("certificate_arn", "/certificateArn"),
        ("certificate_name", "/certificateName"),
        ("regional_certificate_arn", "/regionalCertificateArn"),
        ("regional_certificate_name", "/regionalCertificateName"),
        ("security_policy", "/securityPolicy"),
        (
            "ownership_verification_certificate_arn",
            "/ownershipVerificationCertificateArn",
        ),
    ];
    for (attr, path) in simple {
        let old = attr_str(&from.attributes, attr);
        let new = attr_str(&to.attributes, attr);
        match (old, new) {
            // Removing an optional attribute patches it to empty
            (Some(_), None) => ops.push(replace(path, "")),
            (old, Some(new)) if old != Some(new) => ops.push(replace(path, new)),
            _ => {}
        }
    }

    let old_type = endpoint_type(&from.attributes);
    let new_type = endpoint_type(&to.attributes);
    if let Some(new_type) = new_type
        && old_type != Some(new_type)
    {
        ops.push(replace("/endpointConfiguration/types/0", new_type));
    }

    let old_uri = map_str(&from.attributes, "mutual_tls_authentication", "truststore_uri");
    let new_uri = map_str(&to.attributes, "mutual_tls_authentication", "truststore_uri");
    match (old_uri, new_uri) {
        (Some(_), None) => {
            // Clearing the truststore URI disables mutual TLS
            ops.push(replace("/mutualTlsAuthentication/truststoreUri", ""));
        }
        (old, Some(new)) => {
            if old != Some(new) {
                ops.push(replace("/mutualTlsAuthentication/truststoreUri", new));
            }
            let old_ver =
                map_str(&from.attributes, "mutual_tls_authentication", "truststore_version");
            let new_ver =
                map_str(&to.attributes, "mutual_tls_authentication", "truststore_version");
            if let Some(new_ver) = new_ver
                && old_ver != Some(new_ver)
            {
                ops.push(replace("/mutualTlsAuthentication/truststoreVersion", new_ver));
            }
        }
        (None, None) => {}
    }

    ops
}

/// Read a custom domain name by its name
pub(crate) async fn read_domain_name(
    client: &Client,
    region: &str,
    id: ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(domain_name) = identifier else {
        return Ok(State::not_found(id));
    };
    let domain_name = domain_name.to_string();

    let result = client
        .get_domain_name()
        .domain_name(&domain_name)
        .send()
        .await;

    let out = match result {
        Ok(out) => out,
        Err(err) => {
            let not_found = err
                .as_service_error()
                .map(|e| e.is_not_found_exception())
                .unwrap_or(false);
            if not_found {
                warn!(domain_name = %domain_name, "domain name not found, removing from state");
                return Ok(State::not_found(id));
            }
            return Err(
                ProviderError::new(format!("Failed to get domain name: {:?}", err))
                    .for_resource(id),
            );
        }
    };

    let mut attributes = HashMap::new();
    attributes.insert("domain_name".to_string(), Value::String(domain_name.clone()));
    attributes.insert(
        "arn".to_string(),
        Value::String(domain_name_arn(region, &domain_name)),
    );

    let strings = [
        ("certificate_arn", out.certificate_arn()),
        ("certificate_name", out.certificate_name()),
        ("regional_certificate_arn", out.regional_certificate_arn()),
        ("regional_certificate_name", out.regional_certificate_name()),
        ("cloudfront_domain_name", out.distribution_domain_name()),
        ("cloudfront_zone_id", out.distribution_hosted_zone_id()),
        ("regional_domain_name", out.regional_domain_name()),
        ("regional_zone_id", out.regional_hosted_zone_id()),
        (
            "ownership_verification_certificate_arn",
            out.ownership_verification_certificate_arn(),
        ),
    ];
    for (attr, value) in strings {
        if let Some(value) = value {
            attributes.insert(attr.to_string(), Value::String(value.to_string()));
        }
    }

    if let Some(date) = out.certificate_upload_date() {
        attributes.insert(
            "certificate_upload_date".to_string(),
            Value::String(date.to_string()),
        );
    }
    if let Some(policy) = out.security_policy() {
        attributes.insert(
            "security_policy".to_string(),
            Value::String(policy.as_str().to_string()),
        );
    }

    if let Some(endpoint) = out.endpoint_configuration() {
        let types: Vec<Value> = endpoint
            .types()
            .iter()
            .map(|t| Value::String(t.as_str().to_string()))
            .collect();
        if !types.is_empty() {
            let mut map = HashMap::new();
            map.insert("types".to_string(), Value::List(types));
            attributes.insert("endpoint_configuration".to_string(), Value::Map(map));
        }
    }

    if let Some(mtls) = out.mutual_tls_authentication() {
        let mut map = HashMap::new();
        if let Some(uri) = mtls.truststore_uri() {
            map.insert("truststore_uri".to_string(), Value::String(uri.to_string()));
        }
        if let Some(version) = mtls.truststore_version() {
            map.insert(
                "truststore_version".to_string(),
                Value::String(version.to_string()),
            );
        }
        if !map.is_empty() {
            attributes.insert("mutual_tls_authentication".to_string(), Value::Map(map));
        }
    }

    if let Some(tags) = out.tags()
        && let Some(attr) = tags_attr(tags)
    {
        attributes.insert("tags".to_string(), attr);
    }

    Ok(State::existing(id, attributes).with_identifier(domain_name))
}

/// Create a custom domain name
pub(crate) async fn create_domain_name(
    client: &Client,
    region: &str,
    resource: &Resource,
) -> ProviderResult<State> {
    let domain_name = resource
        .string_attr("domain_name")
        .ok_or_else(|| {
            ProviderError::new("Domain name is required").for_resource(resource.id.clone())
        })?
        .to_string();

    let mut req = client.create_domain_name().domain_name(&domain_name);

    if let Some(v) = resource.string_attr("certificate_arn") {
        req = req.certificate_arn(v);
    }
    if let Some(v) = resource.string_attr("certificate_name") {
        req = req.certificate_name(v);
    }
    if let Some(v) = resource.string_attr("certificate_body") {
        req = req.certificate_body(v);
    }
    if let Some(v) = resource.string_attr("certificate_chain") {
        req = req.certificate_chain(v);
    }
    if let Some(v) = resource.string_attr("certificate_private_key") {
        req = req.certificate_private_key(v);
    }
    if let Some(v) = resource.string_attr("regional_certificate_arn") {
        req = req.regional_certificate_arn(v);
    }
    if let Some(v) = resource.string_attr("regional_certificate_name") {
        req = req.regional_certificate_name(v);
    }
    if let Some(v) = resource.string_attr("ownership_verification_certificate_arn") {
        req = req.ownership_verification_certificate_arn(v);
    }

    if let Some(policy) = resource.string_attr("security_policy") {
        req = req.security_policy(SecurityPolicy::from(policy));
    }

    if let Some(endpoint_type) = endpoint_type(&resource.attributes) {
        req = req.endpoint_configuration(
            EndpointConfiguration::builder()
                .types(EndpointType::from(endpoint_type))
                .build(),
        );
    }

    if let Some(uri) = map_str(&resource.attributes, "mutual_tls_authentication", "truststore_uri")
    {
        let mut mtls = MutualTlsAuthenticationInput::builder().truststore_uri(uri);
        if let Some(version) =
            map_str(&resource.attributes, "mutual_tls_authentication", "truststore_version")
        {
            mtls = mtls.truststore_version(version);
        }
        req = req.mutual_tls_authentication(mtls.build());
    }

    for (key, value) in tag_map(resource.attributes.get("tags")) {
        req = req.tags(key, value);
    }

    req.send().await.map_err(|e| {
        ProviderError::new(format!("Failed to create domain name: {:?}", e))
            .for_resource(resource.id.clone())
    })?;

    debug!(domain_name = %domain_name, "created domain name");

    let mut state = read_domain_name(client, region, resource.id.clone(), Some(&domain_name)).await?;
    carry_over_certificate_input(resource, &mut state);
    Ok(state)
}

/// The IAM certificate material is write-only; the API never returns
/// it, so it must be carried into state from configuration
fn carry_over_certificate_input(resource: &Resource, state: &mut State) {
    for attr in ["certificate_body", "certificate_chain", "certificate_private_key"] {
        if let Some(value) = resource.string_attr(attr) {
            state
                .attributes
                .insert(attr.to_string(), Value::String(value.to_string()));
        }
    }
}

/// Wait for a patched domain name to come back AVAILABLE
async fn wait_for_domain_name_available(
    client: &Client,
    domain_name: &str,
) -> ProviderResult<()> {
    let domain_name = domain_name.to_string();
    let conf = StateChange::new(
        [
            "UPDATING",
            "PENDING",
            "PENDING_CERTIFICATE_REIMPORT",
            "PENDING_OWNERSHIP_VERIFICATION",
        ],
        ["AVAILABLE"],
    )
    .timeout(Duration::from_secs(15 * 60))
    .delay(Duration::from_secs(60))
    .min_timeout(Duration::from_secs(10));

    conf.wait_for(|| {
        let domain_name = domain_name.clone();
        async move {
            let result = client
                .get_domain_name()
                .domain_name(&domain_name)
                .send()
                .await;
            match result {
                Ok(out) => {
                    let status = out
                        .domain_name_status()
                        .map(|s| s.as_str().to_string())
                        .unwrap_or_else(|| "AVAILABLE".to_string());
                    Ok(Some(((), status)))
                }
                Err(err) => {
                    let not_found = err
                        .as_service_error()
                        .map(|e| e.is_not_found_exception())
                        .unwrap_or(false);
                    if not_found {
                        Ok(None)
                    } else {
                        let e = ProviderError::new(format!(
                            "Failed to get domain name status: {:?}",
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
    })
    .await
    .map_err(ProviderError::from)?;

    Ok(())
}

/// Update a custom domain name via patch operations, then wait for the
/// redeployment to finish
pub(crate) async fn update_domain_name(
    client: &Client,
    region: &str,
    id: ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let ops = patch_operations(from, to);
    if !ops.is_empty() {
        debug!(domain_name = %identifier, operations = ops.len(), "patching domain name");
        client
            .update_domain_name()
            .domain_name(identifier)
            .set_patch_operations(Some(ops))
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to update domain name: {:?}", e))
                    .for_resource(id.clone())
            })?;

        wait_for_domain_name_available(client, identifier)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
    }

    let (upserts, removals) = tag_diff(
        &tag_map(from.attributes.get("tags")),
        &tag_map(to.attributes.get("tags")),
    );
    let arn = domain_name_arn(region, identifier);
    if !upserts.is_empty() {
        let mut req = client.tag_resource().resource_arn(&arn);
        for (key, value) in upserts {
            req = req.tags(key, value);
        }
        req.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to tag domain name: {:?}", e))
                .for_resource(id.clone())
        })?;
    }
    if !removals.is_empty() {
        let mut req = client.untag_resource().resource_arn(&arn);
        for key in removals {
            req = req.tag_keys(key);
        }
        req.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to untag domain name: {:?}", e))
                .for_resource(id.clone())
        })?;
    }

    let mut state = read_domain_name(client, region, id, Some(identifier)).await?;
    carry_over_certificate_input(to, &mut state);
    Ok(state)
}

/// Delete a custom domain name; already-gone is success
pub(crate) async fn delete_domain_name(
    client: &Client,
    id: ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    let result = client
        .delete_domain_name()
        .domain_name(identifier)
        .send()
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(err) => {
            let not_found = err
                .as_service_error()
                .map(|e| e.is_not_found_exception())
                .unwrap_or(false);
            if not_found {
                debug!(domain_name = %identifier, "domain name already deleted");
                Ok(())
            } else {
                Err(
                    ProviderError::new(format!("Failed to delete domain name: {:?}", err))
                        .for_resource(id),
                )
            }
        }
    }
}
