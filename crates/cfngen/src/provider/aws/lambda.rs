use super::tags::TagsEncoder;
use crate::cloudformation::ArtifactLocation;
use crate::schema::{Field, Shape, SourceCodeSetter, StructSchema, TypeDescriptor};
use serde_json::json;

/// Points `Code` at the uploaded source archive
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Code;

impl SourceCodeSetter for S3Code {
    fn set_source_location(
        &self,
        properties: &mut serde_json::Map<String, serde_json::Value>,
        location: &ArtifactLocation,
    ) {
        properties.insert(
            "Code".to_string(),
            json!({
                "S3Bucket": location.bucket,
                "S3Key": location.key,
            }),
        );
    }
}

pub(super) fn function() -> TypeDescriptor {
    let environment = StructSchema::new()
        .input(Field::new("variables", Shape::map(Shape::String)).target("Variables"));
    let dead_letter_config =
        StructSchema::new().input(Field::new("target", Shape::String).target("TargetArn"));
    let tracing_config =
        StructSchema::new().input(Field::new("mode", Shape::String).target("Mode"));
    let vpc_config = StructSchema::new()
        .input(Field::new("security_groups", Shape::list(Shape::String)).target("SecurityGroupIds"))
        .input(Field::new("subnets", Shape::list(Shape::String)).target("SubnetIds"));

    TypeDescriptor::builder("aws:lambda_function")
        .target_type("AWS::Lambda::Function")
        .input(Field::new("description", Shape::String).optional().target("Description"))
        .input(Field::new("handler", Shape::String).target("Handler"))
        .input(Field::new("runtime", Shape::String).target("Runtime"))
        .input(Field::new("role", Shape::String).target("Role"))
        .input(Field::new("memory_size", Shape::Number).optional().target("MemorySize"))
        .input(Field::new("timeout", Shape::Number).optional().target("Timeout"))
        .input(
            Field::new("environment", Shape::Struct(environment))
                .optional()
                .target("Environment"),
        )
        .input(
            Field::new("dead_letter_config", Shape::Struct(dead_letter_config))
                .optional()
                .target("DeadLetterConfig"),
        )
        .input(Field::new("kms_key_arn", Shape::String).optional().target("KmsKeyArn"))
        .input(Field::new("layers", Shape::list(Shape::String)).optional().target("Layers"))
        .input(Field::new("name", Shape::String).optional().target_ref("FunctionName"))
        .input(
            Field::new("reserved_concurrent_executions", Shape::Number)
                .optional()
                .target("ReservedConcurrentExecutions"),
        )
        .input(Field::new("tags", TagsEncoder::shape()).optional().target("Tags"))
        .input(
            Field::new("tracing_config", Shape::Struct(tracing_config))
                .optional()
                .target("TracingConfig"),
        )
        .input(
            Field::new("vpc_config", Shape::Struct(vpc_config))
                .optional()
                .target("VpcConfig"),
        )
        .output(Field::new("arn", Shape::String).target_att("Arn"))
        .output(Field::new("code_sha256", Shape::String))
        .output(Field::new("code_size", Shape::Number))
        .output(Field::new("last_modified", Shape::String))
        .output(Field::new("master_arn", Shape::String))
        .output(Field::new("revision_id", Shape::String))
        .output(Field::new("version", Shape::String))
        .source_code(S3Code)
        .build()
}

pub(super) fn permission() -> TypeDescriptor {
    TypeDescriptor::builder("aws:lambda_permission")
        .target_type("AWS::Lambda::Permission")
        .input(Field::new("action", Shape::String).target("Action"))
        .input(
            Field::new("event_source_token", Shape::String)
                .optional()
                .target("EventSourceToken"),
        )
        .input(Field::new("function", Shape::String).target("FunctionName"))
        .input(Field::new("principal", Shape::String).target("Principal"))
        .input(
            Field::new("source_account", Shape::String)
                .optional()
                .target("SourceAccount"),
        )
        .input(Field::new("source_arn", Shape::String).optional().target("SourceArn"))
        .output(Field::new("statement", Shape::String))
        .build()
}
