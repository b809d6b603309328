//! Route 53 hosted zone adapter

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_route53::Client;
use aws_sdk_route53::error::ProvideErrorMetadata;
use aws_sdk_route53::types::{
    Change, ChangeAction, ChangeBatch, HostedZoneConfig, ResourceRecordSet, RrType, Tag,
    TagResourceType, Vpc, VpcRegion,
};
use tracing::{debug, warn};
use uuid::Uuid;
use vela_core::provider::{ProviderError, ProviderResult};
use vela_core::resource::{Resource, ResourceId, State, Value};
use vela_core::retry::StateChange;

use crate::errors::is_throttling_code;
use crate::schemas::route53::DEFAULT_ZONE_COMMENT;
use crate::tags::{tag_diff, tag_map, tags_attr};

/// Route 53 caps a ChangeResourceRecordSets call at this many changes
const CHANGE_BATCH_MAX: usize = 100;

/// Hosted zone IDs come back as "/hostedzone/Z123..."
fn clean_zone_id(id: &str) -> &str {
    id.trim_start_matches("/hostedzone/")
}

/// Change IDs come back as "/change/C123..."
fn clean_change_id(id: &str) -> &str {
    id.trim_start_matches("/change/")
}

/// Zone names are compared with their trailing dot
fn normalize_zone_name(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// The apex NS and SOA records belong to the zone itself and must
/// survive until DeleteHostedZone
fn is_protected_record(record: &ResourceRecordSet, zone_name: &str) -> bool {
    let apex = normalize_zone_name(record.name()) == normalize_zone_name(zone_name);
    apex && matches!(record.r#type(), RrType::Ns | RrType::Soa)
}

/// Split deletions into batches the API accepts
fn chunk_changes(changes: Vec<Change>, size: usize) -> Vec<Vec<Change>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    for change in changes {
        current.push(change);
        if current.len() == size {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// VPC associations declared on the resource: (vpc_id, vpc_region)
fn vpc_associations(
    attributes: &HashMap<String, Value>,
    default_region: &str,
) -> Vec<(String, String)> {
    let mut vpcs = Vec::new();
    if let Some(Value::List(items)) = attributes.get("vpc") {
        for item in items {
            if let Value::Map(map) = item
                && let Some(vpc_id) = map.get("vpc_id").and_then(Value::as_str)
            {
                let region = map
                    .get("vpc_region")
                    .and_then(Value::as_str)
                    .unwrap_or(default_region);
                vpcs.push((vpc_id.to_string(), region.to_string()));
            }
        }
    }
    vpcs
}

/// Wait for a Route 53 change to propagate to all authoritative servers
async fn wait_for_change_insync(client: &Client, change_id: &str) -> ProviderResult<()> {
    let change_id = clean_change_id(change_id).to_string();
    let conf = StateChange::new(["PENDING"], ["INSYNC"])
        .timeout(Duration::from_secs(15 * 60))
        .delay(Duration::from_secs(15))
        .min_timeout(Duration::from_secs(5));

    conf.wait_for(|| {
        let change_id = change_id.clone();
        async move {
            let out = client
                .get_change()
                .id(&change_id)
                .send()
                .await
                .map_err(|e| {
                    let err =
                        ProviderError::new(format!("Failed to get change status: {:?}", e));
                    if is_throttling_code(e.code()) {
                        err.transient()
                    } else {
                        err
                    }
                })?;
            Ok(out
                .change_info()
                .map(|ci| ((), ci.status().as_str().to_string())))
        }
    })
    .await
    .map_err(ProviderError::from)?;

    Ok(())
}

/// Read a hosted zone by its zone ID
pub(crate) async fn read_zone(
    client: &Client,
    id: ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(zone_id) = identifier else {
        return Ok(State::not_found(id));
    };
    let zone_id = clean_zone_id(zone_id).to_string();

    let result = client.get_hosted_zone().id(&zone_id).send().await;

    let out = match result {
        Ok(out) => out,
        Err(err) => {
            let not_found = err
                .as_service_error()
                .map(|e| e.is_no_such_hosted_zone())
                .unwrap_or(false);
            if not_found {
                warn!(zone_id = %zone_id, "hosted zone not found, removing from state");
                return Ok(State::not_found(id));
            }
            return Err(
                ProviderError::new(format!("Failed to get hosted zone: {:?}", err))
                    .for_resource(id),
            );
        }
    };

    let Some(zone) = out.hosted_zone() else {
        return Ok(State::not_found(id));
    };

    let mut attributes = HashMap::new();
    attributes.insert("name".to_string(), Value::String(zone.name().to_string()));
    attributes.insert("zone_id".to_string(), Value::String(zone_id.clone()));

    let comment = zone
        .config()
        .and_then(|c| c.comment())
        .unwrap_or(DEFAULT_ZONE_COMMENT);
    attributes.insert("comment".to_string(), Value::String(comment.to_string()));

    let private_zone = zone.config().map(|c| c.private_zone()).unwrap_or(false);

    // Name servers: delegation set for public zones, the apex NS record
    // for private zones
    let name_servers = if let Some(ds) = out.delegation_set() {
        ds.name_servers().to_vec()
    } else if private_zone {
        find_name_servers(client, &zone_id, zone.name()).await?
    } else {
        Vec::new()
    };
    if !name_servers.is_empty() {
        attributes.insert(
            "name_servers".to_string(),
            Value::List(name_servers.into_iter().map(Value::String).collect()),
        );
    }

    let vpcs: Vec<Value> = out
        .vpcs()
        .iter()
        .filter_map(|vpc| {
            let vpc_id = vpc.vpc_id()?;
            let mut map = HashMap::new();
            map.insert("vpc_id".to_string(), Value::String(vpc_id.to_string()));
            if let Some(region) = vpc.vpc_region() {
                map.insert(
                    "vpc_region".to_string(),
                    Value::String(region.as_str().to_string()),
                );
            }
            Some(Value::Map(map))
        })
        .collect();
    if !vpcs.is_empty() {
        attributes.insert("vpc".to_string(), Value::List(vpcs));
    }

    let tags = read_zone_tags(client, &zone_id).await?;
    if let Some(tags) = tags_attr(&tags) {
        attributes.insert("tags".to_string(), tags);
    }

    Ok(State::existing(id, attributes).with_identifier(zone_id))
}

/// Fall back to the apex NS record set for private zone name servers
async fn find_name_servers(
    client: &Client,
    zone_id: &str,
    zone_name: &str,
) -> ProviderResult<Vec<String>> {
    let out = client
        .list_resource_record_sets()
        .hosted_zone_id(zone_id)
        .start_record_name(zone_name)
        .start_record_type(RrType::Ns)
        .max_items(1)
        .send()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to list record sets: {:?}", e)))?;

    Ok(out
        .resource_record_sets()
        .iter()
        .filter(|rrs| {
            normalize_zone_name(rrs.name()) == normalize_zone_name(zone_name)
                && *rrs.r#type() == RrType::Ns
        })
        .flat_map(|rrs| rrs.resource_records())
        .map(|r| r.value().to_string())
        .collect())
}

async fn read_zone_tags(
    client: &Client,
    zone_id: &str,
) -> ProviderResult<HashMap<String, String>> {
    let out = client
        .list_tags_for_resource()
        .resource_type(TagResourceType::Hostedzone)
        .resource_id(zone_id)
        .send()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to list zone tags: {:?}", e)))?;

    let mut tags = HashMap::new();
    if let Some(tag_set) = out.resource_tag_set() {
        for tag in tag_set.tags() {
            if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                tags.insert(key.to_string(), value.to_string());
            }
        }
    }
    Ok(tags)
}

/// Create a hosted zone and wait for the creation change to propagate
pub(crate) async fn create_zone(
    client: &Client,
    region: &str,
    resource: &Resource,
) -> ProviderResult<State> {
    let name = resource
        .string_attr("name")
        .ok_or_else(|| ProviderError::new("Zone name is required").for_resource(resource.id.clone()))?
        .to_string();

    let comment = resource
        .string_attr("comment")
        .unwrap_or(DEFAULT_ZONE_COMMENT);
    let vpcs = vpc_associations(&resource.attributes, region);

    let config = HostedZoneConfig::builder()
        .comment(comment)
        .private_zone(!vpcs.is_empty())
        .build();

    let mut req = client
        .create_hosted_zone()
        .name(&name)
        .caller_reference(Uuid::new_v4().to_string())
        .hosted_zone_config(config);

    if let Some(delegation_set_id) = resource.string_attr("delegation_set_id") {
        req = req.delegation_set_id(delegation_set_id);
    }

    // The API accepts a single VPC at creation; the rest are associated
    // afterwards
    if let Some((vpc_id, vpc_region)) = vpcs.first() {
        req = req.vpc(
            Vpc::builder()
                .vpc_id(vpc_id)
                .vpc_region(VpcRegion::from(vpc_region.as_str()))
                .build(),
        );
    }

    let out = req.send().await.map_err(|e| {
        ProviderError::new(format!("Failed to create hosted zone: {:?}", e))
            .for_resource(resource.id.clone())
    })?;

    let zone_id = out
        .hosted_zone()
        .map(|z| clean_zone_id(z.id()).to_string())
        .ok_or_else(|| {
            ProviderError::new("Hosted zone created but no ID returned")
                .for_resource(resource.id.clone())
        })?;

    debug!(zone_id = %zone_id, name = %name, "created hosted zone");

    if let Some(change) = out.change_info() {
        wait_for_change_insync(client, change.id())
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;
    }

    for (vpc_id, vpc_region) in vpcs.iter().skip(1) {
        associate_vpc(client, &zone_id, vpc_id, vpc_region)
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;
    }

    let tags = tag_map(resource.attributes.get("tags"));
    if !tags.is_empty() {
        update_zone_tags(client, &zone_id, tags, Vec::new())
            .await
            .map_err(|e| e.for_resource(resource.id.clone()))?;
    }

    let mut state = read_zone(client, resource.id.clone(), Some(&zone_id)).await?;
    carry_over_force_destroy(resource, &mut state);
    Ok(state)
}

/// force_destroy is configuration, not remote state; it must survive
/// into state so destroy can honor it
fn carry_over_force_destroy(resource: &Resource, state: &mut State) {
    let force = resource.bool_attr("force_destroy").unwrap_or(false);
    state
        .attributes
        .insert("force_destroy".to_string(), Value::Bool(force));
}

async fn associate_vpc(
    client: &Client,
    zone_id: &str,
    vpc_id: &str,
    vpc_region: &str,
) -> ProviderResult<()> {
    let out = client
        .associate_vpc_with_hosted_zone()
        .hosted_zone_id(zone_id)
        .vpc(
            Vpc::builder()
                .vpc_id(vpc_id)
                .vpc_region(VpcRegion::from(vpc_region))
                .build(),
        )
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to associate VPC {}: {:?}", vpc_id, e))
        })?;

    if let Some(change) = out.change_info() {
        wait_for_change_insync(client, change.id()).await?;
    }
    Ok(())
}

async fn disassociate_vpc(
    client: &Client,
    zone_id: &str,
    vpc_id: &str,
    vpc_region: &str,
) -> ProviderResult<()> {
    let out = client
        .disassociate_vpc_from_hosted_zone()
        .hosted_zone_id(zone_id)
        .vpc(
            Vpc::builder()
                .vpc_id(vpc_id)
                .vpc_region(VpcRegion::from(vpc_region))
                .build(),
        )
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to disassociate VPC {}: {:?}", vpc_id, e))
        })?;

    if let Some(change) = out.change_info() {
        wait_for_change_insync(client, change.id()).await?;
    }
    Ok(())
}

async fn update_zone_tags(
    client: &Client,
    zone_id: &str,
    upserts: HashMap<String, String>,
    removals: Vec<String>,
) -> ProviderResult<()> {
    if upserts.is_empty() && removals.is_empty() {
        return Ok(());
    }

    let mut req = client
        .change_tags_for_resource()
        .resource_type(TagResourceType::Hostedzone)
        .resource_id(zone_id);

    for (key, value) in upserts {
        req = req.add_tags(Tag::builder().key(key).value(value).build());
    }
    for key in removals {
        req = req.remove_tag_keys(key);
    }

    req.send()
        .await
        .map_err(|e| ProviderError::new(format!("Failed to update zone tags: {:?}", e)))?;
    Ok(())
}

/// Update the mutable pieces of a hosted zone: comment, VPC
/// associations, and tags
pub(crate) async fn update_zone(
    client: &Client,
    region: &str,
    id: ResourceId,
    identifier: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let zone_id = clean_zone_id(identifier).to_string();

    let new_comment = to.string_attr("comment").unwrap_or(DEFAULT_ZONE_COMMENT);
    let old_comment = from.attributes.get("comment").and_then(Value::as_str);
    if old_comment != Some(new_comment) {
        client
            .update_hosted_zone_comment()
            .id(&zone_id)
            .comment(new_comment)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to update zone comment: {:?}", e))
                    .for_resource(id.clone())
            })?;
    }

    let old_vpcs = vpc_associations(&from.attributes, region);
    let new_vpcs = vpc_associations(&to.attributes, region);
    for (vpc_id, vpc_region) in &new_vpcs {
        if !old_vpcs.iter().any(|(v, _)| v == vpc_id) {
            associate_vpc(client, &zone_id, vpc_id, vpc_region)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }
    }
    for (vpc_id, vpc_region) in &old_vpcs {
        if !new_vpcs.iter().any(|(v, _)| v == vpc_id) {
            disassociate_vpc(client, &zone_id, vpc_id, vpc_region)
                .await
                .map_err(|e| e.for_resource(id.clone()))?;
        }
    }

    let (upserts, removals) = tag_diff(
        &tag_map(from.attributes.get("tags")),
        &tag_map(to.attributes.get("tags")),
    );
    update_zone_tags(client, &zone_id, upserts, removals)
        .await
        .map_err(|e| e.for_resource(id.clone()))?;

    let mut state = read_zone(client, id, Some(&zone_id)).await?;
    carry_over_force_destroy(to, &mut state);
    Ok(state)
}

/// Delete a hosted zone; with force_destroy, empty it of records first
pub(crate) async fn delete_zone(
    client: &Client,
    id: ResourceId,
    identifier: &str,
    from: &State,
) -> ProviderResult<()> {
    let zone_id = clean_zone_id(identifier).to_string();

    let force_destroy = from
        .attributes
        .get("force_destroy")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if force_destroy {
        let zone_name = from
            .attributes
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        delete_all_records(client, &zone_id, &zone_name)
            .await
            .map_err(|e| e.for_resource(id.clone()))?;
    }

    let result = client.delete_hosted_zone().id(&zone_id).send().await;

    match result {
        Ok(out) => {
            if let Some(change) = out.change_info() {
                wait_for_change_insync(client, change.id())
                    .await
                    .map_err(|e| e.for_resource(id.clone()))?;
            }
            Ok(())
        }
        Err(err) => {
            let not_found = err
                .as_service_error()
                .map(|e| e.is_no_such_hosted_zone())
                .unwrap_or(false);
            if not_found {
                debug!(zone_id = %zone_id, "hosted zone already deleted");
                Ok(())
            } else {
                Err(
                    ProviderError::new(format!("Failed to delete hosted zone: {:?}", err))
                        .for_resource(id),
                )
            }
        }
    }
}

/// Enumerate every record set in the zone and delete them in batches,
/// keeping the apex NS/SOA the API requires
async fn delete_all_records(
    client: &Client,
    zone_id: &str,
    zone_name: &str,
) -> ProviderResult<()> {
    let mut changes = Vec::new();
    let mut next_name: Option<String> = None;
    let mut next_type: Option<RrType> = None;
    let mut next_identifier: Option<String> = None;

    loop {
        let mut req = client.list_resource_record_sets().hosted_zone_id(zone_id);
        if let Some(name) = &next_name {
            req = req.start_record_name(name);
        }
        if let Some(rr_type) = &next_type {
            req = req.start_record_type(rr_type.clone());
        }
        if let Some(ident) = &next_identifier {
            req = req.start_record_identifier(ident);
        }

        let out = req.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to list record sets: {:?}", e))
        })?;

        for record in out.resource_record_sets() {
            if is_protected_record(record, zone_name) {
                continue;
            }
            let change = Change::builder()
                .action(ChangeAction::Delete)
                .resource_record_set(record.clone())
                .build()
                .map_err(|e| {
                    ProviderError::new("Failed to build record deletion").with_cause(e)
                })?;
            changes.push(change);
        }

        if !out.is_truncated() {
            break;
        }
        next_name = out.next_record_name().map(String::from);
        next_type = out.next_record_type().cloned();
        next_identifier = out.next_record_identifier().map(String::from);
    }

    debug!(
        zone_id = %zone_id,
        records = changes.len(),
        "force_destroy: deleting all record sets"
    );

    for batch in chunk_changes(changes, CHANGE_BATCH_MAX) {
        let change_batch = ChangeBatch::builder()
            .set_changes(Some(batch))
            .build()
            .map_err(|e| ProviderError::new("Failed to build change batch").with_cause(e))?;

        client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(change_batch)
            .send()
            .await
            .map_err(|e| {
                ProviderError::new(format!("Failed to delete record sets: {:?}", e))
            })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, rr_type: RrType) -> ResourceRecordSet {
        ResourceRecordSet::builder()
            .name(name)
            .r#type(rr_type)
            .build()
            .unwrap()
    }

    fn delete_change(name: &str) -> Change {
        Change::builder()
            .action(ChangeAction::Delete)
            .resource_record_set(record(name, RrType::Cname))
            .build()
            .unwrap()
    }

    #[test]
    fn zone_and_change_ids_are_cleaned() {
        assert_eq!(clean_zone_id("/hostedzone/Z123"), "Z123");
        assert_eq!(clean_zone_id("Z123"), "Z123");
        assert_eq!(clean_change_id("/change/C456"), "C456");
    }

    #[test]
    fn zone_names_normalize_with_trailing_dot() {
        assert_eq!(normalize_zone_name("example.com"), "example.com.");
        assert_eq!(normalize_zone_name("example.com."), "example.com.");
    }

    #[test]
    fn apex_ns_and_soa_are_protected() {
        assert!(is_protected_record(
            &record("example.com.", RrType::Ns),
            "example.com"
        ));
        assert!(is_protected_record(
            &record("example.com.", RrType::Soa),
            "example.com"
        ));
        // NS delegation for a subdomain is deletable
        assert!(!is_protected_record(
            &record("sub.example.com.", RrType::Ns),
            "example.com"
        ));
        assert!(!is_protected_record(
            &record("example.com.", RrType::A),
            "example.com"
        ));
    }

    #[test]
    fn changes_are_chunked_at_batch_limit() {
        let changes: Vec<Change> = (0..250)
            .map(|i| delete_change(&format!("r{}.example.com.", i)))
            .collect();
        let batches = chunk_changes(changes, CHANGE_BATCH_MAX);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 100);
        assert_eq!(batches[1].len(), 100);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn chunking_empty_changes_yields_no_batches() {
        assert!(chunk_changes(Vec::new(), CHANGE_BATCH_MAX).is_empty());
    }

    #[test]
    fn vpc_associations_default_region() {
        let mut vpc = HashMap::new();
        vpc.insert("vpc_id".to_string(), Value::from("vpc-1"));
        let mut other = HashMap::new();
        other.insert("vpc_id".to_string(), Value::from("vpc-2"));
        other.insert("vpc_region".to_string(), Value::from("eu-west-1"));

        let mut attrs = HashMap::new();
        attrs.insert(
            "vpc".to_string(),
            Value::List(vec![Value::Map(vpc), Value::Map(other)]),
        );

        let vpcs = vpc_associations(&attrs, "us-east-1");
        assert_eq!(
            vpcs,
            vec![
                ("vpc-1".to_string(), "us-east-1".to_string()),
                ("vpc-2".to_string(), "eu-west-1".to_string()),
            ]
        );
    }
}
