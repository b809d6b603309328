//! Cost-and-usage report definition adapter
//!
//! Report definitions are keyed by report name; the API has no
//! get-by-name call, so reads page through DescribeReportDefinitions.

use std::collections::HashMap;

use aws_sdk_costandusagereport::Client;
use aws_sdk_costandusagereport::types::{
    AdditionalArtifact, AwsRegion, CompressionFormat, ReportDefinition, ReportFormat,
    ReportVersioning, SchemaElement, TimeUnit,
};
use tracing::{debug, warn};
use vela_core::provider::{ProviderError, ProviderResult};
use vela_core::resource::{Resource, ResourceId, State, Value};

const FORMAT_PARQUET: &str = "Parquet";
const COMPRESSION_PARQUET: &str = "Parquet";
const ARTIFACT_ATHENA: &str = "ATHENA";
const VERSIONING_OVERWRITE: &str = "OVERWRITE_REPORT";

fn string_list(attrs: &HashMap<String, Value>, key: &str) -> Vec<String> {
    attrs
        .get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// The API rejects some format/compression/artifact combinations only
/// at delivery time; catch them up front
fn check_report_combination(resource: &Resource) -> ProviderResult<()> {
    let format = resource.string_attr("format").unwrap_or_default();
    let compression = resource.string_attr("compression").unwrap_or_default();
    let artifacts = string_list(&resource.attributes, "additional_artifacts");
    let versioning = resource
        .string_attr("report_versioning")
        .unwrap_or("CREATE_NEW_REPORT");

    let fail = |msg: String| Err(ProviderError::new(msg).for_resource(resource.id.clone()));

    if artifacts.iter().any(|a| a == ARTIFACT_ATHENA) {
        if artifacts.len() > 1 {
            return fail("The ATHENA artifact cannot be combined with other artifacts".to_string());
        }
        if format != FORMAT_PARQUET || compression != COMPRESSION_PARQUET {
            return fail(format!(
                "The ATHENA artifact requires Parquet format and compression, got format '{}' and compression '{}'",
                format, compression
            ));
        }
        if versioning != VERSIONING_OVERWRITE {
            return fail(format!(
                "The ATHENA artifact requires report_versioning '{}', got '{}'",
                VERSIONING_OVERWRITE, versioning
            ));
        }
    } else if format == FORMAT_PARQUET {
        if compression != COMPRESSION_PARQUET {
            return fail(format!(
                "Parquet format requires Parquet compression, got '{}'",
                compression
            ));
        }
    } else if compression == COMPRESSION_PARQUET {
        return fail(format!(
            "Parquet compression requires Parquet format, got '{}'",
            format
        ));
    }

    Ok(())
}

fn build_definition(resource: &Resource) -> ProviderResult<ReportDefinition> {
    let required = |attr: &str| {
        resource.string_attr(attr).ok_or_else(|| {
            ProviderError::new(format!("Attribute '{}' is required", attr))
                .for_resource(resource.id.clone())
        })
    };

    let schema_elements: Vec<SchemaElement> =
        string_list(&resource.attributes, "additional_schema_elements")
            .into_iter()
            .map(|s| SchemaElement::from(s.as_str()))
            .collect();
    let artifacts: Vec<AdditionalArtifact> =
        string_list(&resource.attributes, "additional_artifacts")
            .into_iter()
            .map(|s| AdditionalArtifact::from(s.as_str()))
            .collect();

    let mut builder = ReportDefinition::builder()
        .report_name(required("report_name")?)
        .time_unit(TimeUnit::from(required("time_unit")?))
        .format(ReportFormat::from(required("format")?))
        .compression(CompressionFormat::from(required("compression")?))
        .set_additional_schema_elements(Some(schema_elements))
        .s3_bucket(required("s3_bucket")?)
        .s3_prefix(resource.string_attr("s3_prefix").unwrap_or_default())
        .s3_region(AwsRegion::from(required("s3_region")?))
        .report_versioning(ReportVersioning::from(
            resource
                .string_attr("report_versioning")
                .unwrap_or("CREATE_NEW_REPORT"),
        ));

    if !artifacts.is_empty() {
        builder = builder.set_additional_artifacts(Some(artifacts));
    }
    if let Some(refresh) = resource.bool_attr("refresh_closed_reports") {
        builder = builder.refresh_closed_reports(refresh);
    }

    builder.build().map_err(|e| {
        ProviderError::new("Failed to build report definition")
            .with_cause(e)
            .for_resource(resource.id.clone())
    })
}

fn definition_attributes(def: &ReportDefinition) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    attributes.insert(
        "report_name".to_string(),
        Value::String(def.report_name().to_string()),
    );
    attributes.insert(
        "time_unit".to_string(),
        Value::String(def.time_unit().as_str().to_string()),
    );
    attributes.insert(
        "format".to_string(),
        Value::String(def.format().as_str().to_string()),
    );
    attributes.insert(
        "compression".to_string(),
        Value::String(def.compression().as_str().to_string()),
    );
    attributes.insert(
        "additional_schema_elements".to_string(),
        Value::List(
            def.additional_schema_elements()
                .iter()
                .map(|e| Value::String(e.as_str().to_string()))
                .collect(),
        ),
    );
    attributes.insert(
        "s3_bucket".to_string(),
        Value::String(def.s3_bucket().to_string()),
    );
    attributes.insert(
        "s3_prefix".to_string(),
        Value::String(def.s3_prefix().to_string()),
    );
    attributes.insert(
        "s3_region".to_string(),
        Value::String(def.s3_region().as_str().to_string()),
    );

    let artifacts = def.additional_artifacts();
    if !artifacts.is_empty() {
        attributes.insert(
            "additional_artifacts".to_string(),
            Value::List(
                artifacts
                    .iter()
                    .map(|a| Value::String(a.as_str().to_string()))
                    .collect(),
            ),
        );
    }
    if let Some(refresh) = def.refresh_closed_reports() {
        attributes.insert("refresh_closed_reports".to_string(), Value::Bool(refresh));
    }
    if let Some(versioning) = def.report_versioning() {
        attributes.insert(
            "report_versioning".to_string(),
            Value::String(versioning.as_str().to_string()),
        );
    }

    attributes
}

/// Page through all report definitions looking for one by name
async fn find_report_definition(
    client: &Client,
    report_name: &str,
) -> ProviderResult<Option<ReportDefinition>> {
    let mut next_token: Option<String> = None;

    loop {
        let mut req = client.describe_report_definitions();
        if let Some(token) = &next_token {
            req = req.next_token(token);
        }

        let out = req.send().await.map_err(|e| {
            ProviderError::new(format!("Failed to describe report definitions: {:?}", e))
        })?;

        if let Some(def) = out
            .report_definitions()
            .iter()
            .find(|d| d.report_name() == report_name)
        {
            return Ok(Some(def.clone()));
        }

        match out.next_token() {
            Some(token) => next_token = Some(token.to_string()),
            None => return Ok(None),
        }
    }
}

/// Read a report definition by its report name
pub(crate) async fn read_report_definition(
    client: &Client,
    id: ResourceId,
    identifier: Option<&str>,
) -> ProviderResult<State> {
    let Some(report_name) = identifier else {
        return Ok(State::not_found(id));
    };

    match find_report_definition(client, report_name).await? {
        Some(def) => {
            Ok(State::existing(id, definition_attributes(&def)).with_identifier(report_name))
        }
        None => {
            warn!(report_name = %report_name, "report definition not found, removing from state");
            Ok(State::not_found(id))
        }
    }
}

/// Create a report definition
pub(crate) async fn create_report_definition(
    client: &Client,
    resource: &Resource,
) -> ProviderResult<State> {
    check_report_combination(resource)?;
    let definition = build_definition(resource)?;
    let report_name = definition.report_name().to_string();

    client
        .put_report_definition()
        .report_definition(definition)
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to create report definition: {:?}", e))
                .for_resource(resource.id.clone())
        })?;

    debug!(report_name = %report_name, "created report definition");

    read_report_definition(client, resource.id.clone(), Some(&report_name)).await
}

/// Replace the mutable parts of a report definition in place
pub(crate) async fn update_report_definition(
    client: &Client,
    id: ResourceId,
    identifier: &str,
    to: &Resource,
) -> ProviderResult<State> {
    check_report_combination(to)?;
    let definition = build_definition(to)?;

    client
        .modify_report_definition()
        .report_name(identifier)
        .report_definition(definition)
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to modify report definition: {:?}", e))
                .for_resource(id.clone())
        })?;

    read_report_definition(client, id, Some(identifier)).await
}

/// Delete a report definition; already-gone is success
pub(crate) async fn delete_report_definition(
    client: &Client,
    id: ResourceId,
    identifier: &str,
) -> ProviderResult<()> {
    if find_report_definition(client, identifier)
        .await
        .map_err(|e| e.for_resource(id.clone()))?
        .is_none()
    {
        debug!(report_name = %identifier, "report definition already deleted");
        return Ok(());
    }

    client
        .delete_report_definition()
        .report_name(identifier)
        .send()
        .await
        .map_err(|e| {
            ProviderError::new(format!("Failed to delete report definition: {:?}", e))
                .for_resource(id)
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_resource() -> Resource {
        Resource::new("cur.report_definition", "billing")
            .with_attribute("report_name", Value::from("monthly-costs"))
            .with_attribute("time_unit", Value::from("DAILY"))
            .with_attribute("format", Value::from("textORcsv"))
            .with_attribute("compression", Value::from("GZIP"))
            .with_attribute(
                "additional_schema_elements",
                Value::List(vec![Value::from("RESOURCES")]),
            )
            .with_attribute("s3_bucket", Value::from("billing-bucket"))
            .with_attribute("s3_region", Value::from("us-east-1"))
    }

    #[test]
    fn csv_with_gzip_is_valid() {
        assert!(check_report_combination(&base_resource()).is_ok());
    }

    #[test]
    fn parquet_format_requires_parquet_compression() {
        let resource = base_resource().with_attribute("format", Value::from("Parquet"));
        assert!(check_report_combination(&resource).is_err());

        let resource = resource.with_attribute("compression", Value::from("Parquet"));
        assert!(check_report_combination(&resource).is_ok());
    }

    #[test]
    fn parquet_compression_requires_parquet_format() {
        let resource = base_resource().with_attribute("compression", Value::from("Parquet"));
        assert!(check_report_combination(&resource).is_err());
    }

    #[test]
    fn athena_requires_parquet_and_overwrite() {
        let athena = base_resource().with_attribute(
            "additional_artifacts",
            Value::List(vec![Value::from("ATHENA")]),
        );
        assert!(check_report_combination(&athena).is_err());

        let parquet = athena
            .with_attribute("format", Value::from("Parquet"))
            .with_attribute("compression", Value::from("Parquet"));
        assert!(check_report_combination(&parquet).is_err());

        let overwrite =
            parquet.with_attribute("report_versioning", Value::from("OVERWRITE_REPORT"));
        assert!(check_report_combination(&overwrite).is_ok());
    }

    #[test]
    fn athena_cannot_combine_with_other_artifacts() {
        let resource = base_resource()
            .with_attribute("format", Value::from("Parquet"))
            .with_attribute("compression", Value::from("Parquet"))
            .with_attribute("report_versioning", Value::from("OVERWRITE_REPORT"))
            .with_attribute(
                "additional_artifacts",
                Value::List(vec![Value::from("ATHENA"), Value::from("REDSHIFT")]),
            );
        assert!(check_report_combination(&resource).is_err());
    }

    #[test]
    fn definition_round_trips_attributes() {
        let def = build_definition(&base_resource()).unwrap();
        let attrs = definition_attributes(&def);

        assert_eq!(attrs["report_name"], Value::from("monthly-costs"));
        assert_eq!(attrs["time_unit"], Value::from("DAILY"));
        assert_eq!(attrs["s3_prefix"], Value::from(""));
        assert_eq!(attrs["report_versioning"], Value::from("CREATE_NEW_REPORT"));
        assert_eq!(
            attrs["additional_schema_elements"],
            Value::List(vec![Value::from("RESOURCES")])
        );
    }

    #[test]
    fn missing_required_attribute_fails_build() {
        let mut resource = base_resource();
        resource.attributes.remove("s3_bucket");
        assert!(build_definition(&resource).is_err());
    }
}
