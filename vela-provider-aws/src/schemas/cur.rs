//! Cost-and-usage report definition schema

use vela_core::resource::Value;
use vela_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use super::types;

pub fn report_definition_schema() -> ResourceSchema {
    ResourceSchema::new("cur.report_definition")
        .with_description("A cost-and-usage report definition delivered to S3")
        .attribute(
            AttributeSchema::new("report_name", types::report_name())
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("time_unit", types::string_enum(&["HOURLY", "DAILY", "MONTHLY"]))
                .required(),
        )
        .attribute(
            AttributeSchema::new("format", types::string_enum(&["textORcsv", "Parquet"]))
                .required(),
        )
        .attribute(
            AttributeSchema::new("compression", types::string_enum(&["ZIP", "GZIP", "Parquet"]))
                .required(),
        )
        .attribute(
            AttributeSchema::new(
                "additional_schema_elements",
                AttributeType::List(Box::new(types::string_enum(&[
                    "RESOURCES",
                    "SPLIT_COST_ALLOCATION_DATA",
                    "MANUAL_DISCOUNT_COMPATIBILITY",
                ]))),
            )
            .required()
            .force_new(),
        )
        .attribute(AttributeSchema::new("s3_bucket", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("s3_prefix", AttributeType::String)
                .with_default(Value::from("")),
        )
        .attribute(AttributeSchema::new("s3_region", AttributeType::String).required())
        .attribute(AttributeSchema::new(
            "additional_artifacts",
            AttributeType::List(Box::new(types::string_enum(&[
                "REDSHIFT",
                "QUICKSIGHT",
                "ATHENA",
            ]))),
        ))
        .attribute(AttributeSchema::new("refresh_closed_reports", AttributeType::Bool))
        .attribute(
            AttributeSchema::new(
                "report_versioning",
                types::string_enum(&["CREATE_NEW_REPORT", "OVERWRITE_REPORT"]),
            )
            .with_default(Value::from("CREATE_NEW_REPORT")),
        )
}
