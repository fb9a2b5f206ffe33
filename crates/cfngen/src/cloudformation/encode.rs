use super::intrinsic;
use super::{ArtifactLocation, Template, TemplateResource};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::expression::{FieldPath, PathStep};
use crate::graph::{Graph, Resource};
use crate::schema::{Shape, StructSchema};
use crate::value::Value;
use rayon::prelude::*;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

/// Generates [Template]s from resource graphs
///
/// Resources are independent of each other and are encoded in parallel unless
/// [Encoder::sequential] is set. The result does not depend on the mode.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    description: Option<String>,
    sequential: bool,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Encode all resources on the calling thread
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential = sequential;
        self
    }

    /// Encodes every resource of the graph
    ///
    /// `artifacts` maps resource names to their uploaded source code. Resources that fail to
    /// encode are left out of the template, their diagnostics are returned.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn encode(
        &self,
        graph: &Graph,
        artifacts: &HashMap<String, ArtifactLocation>,
    ) -> (Template, Diagnostics) {
        let resources = graph.sorted();
        let encode = |resource: &&Resource| {
            ResourceEncoder::new(graph, resource).encode(artifacts.get(resource.name()))
        };

        let results: Vec<_> = if self.sequential {
            resources.iter().map(encode).collect()
        } else {
            resources.par_iter().map(encode).collect()
        };

        let mut template = Template::new(self.description.clone());
        let mut diagnostics = Diagnostics::new();
        for (resource, (encoded, resource_diagnostics)) in resources.into_iter().zip(results) {
            diagnostics.append(resource_diagnostics);
            if let Some(encoded) = encoded {
                template.insert(resource.name(), encoded);
            }
        }

        tracing::debug!(
            resources = template.resources().len(),
            errors = diagnostics.errors().count(),
            "template encoded"
        );
        (template, diagnostics)
    }
}

/// Encodes a single resource
struct ResourceEncoder<'a> {
    graph: &'a Graph,
    resource: &'a Resource,
    diagnostics: Diagnostics,
}

impl<'a> ResourceEncoder<'a> {
    fn new(graph: &'a Graph, resource: &'a Resource) -> Self {
        Self {
            graph,
            resource,
            diagnostics: Diagnostics::new(),
        }
    }

    fn encode(
        mut self,
        artifact: Option<&ArtifactLocation>,
    ) -> (Option<TemplateResource>, Diagnostics) {
        let resource = self.resource;
        let descriptor = resource.descriptor();

        let Some(target_type) = descriptor.target_type() else {
            self.diagnostics.push(
                Diagnostic::error("Incompatible resource")
                    .with_detail(format!(
                        "A CloudFormation resource cannot be generated from {}.",
                        resource.type_name()
                    ))
                    .with_subject(resource.definition().clone()),
            );
            return (None, self.diagnostics);
        };

        let source_code = match (descriptor.source_code(), artifact) {
            (Some(setter), Some(location)) => Some((setter, location)),
            (Some(_), None) => {
                self.diagnostics.push(
                    Diagnostic::error("Source code not provided")
                        .with_detail(format!(
                            "Source code must be provided for {}.",
                            resource.type_name()
                        ))
                        .with_subject(resource.definition().clone()),
                );
                return (None, self.diagnostics);
            }
            (None, _) => None,
        };

        let mut path = FieldPath::default();
        let mut properties =
            self.encode_struct(resource.value(), descriptor.schema(), &mut path);

        if let Some((setter, location)) = source_code {
            setter.set_source_location(&mut properties, location);
        }

        if self.diagnostics.has_errors() {
            return (None, self.diagnostics);
        }

        tracing::trace!(name = resource.name(), target_type, "resource encoded");
        let encoded = TemplateResource {
            resource_type: target_type.to_owned(),
            properties,
        };
        (Some(encoded), self.diagnostics)
    }

    fn encode_struct(
        &mut self,
        value: &Value,
        schema: &StructSchema,
        path: &mut FieldPath,
    ) -> Map<String, JsonValue> {
        let mut properties = Map::new();

        for field in schema.inputs() {
            let Some(target) = field.target_mapping() else {
                continue;
            };
            let Some(field_value) = value.get_attr(field.name()) else {
                continue;
            };

            path.push(PathStep::Attr(field.name().to_owned()));
            let encoded = self.encode_value(field_value, field.shape(), path);
            path.pop();

            if let Some(encoded) = encoded {
                properties.insert(target.name.clone(), encoded);
            }
        }

        properties
    }

    /// `None` for values that are left out: null, empty collections, failures
    fn encode_value(
        &mut self,
        value: &Value,
        shape: &Shape,
        path: &mut FieldPath,
    ) -> Option<JsonValue> {
        if let Some(encoder) = shape.encoder() {
            if self.reject_nested_references(path) || value.is_null() {
                return None;
            }

            return match encoder.encode(value) {
                Ok(encoded) => non_empty(encoded),
                Err(error) => {
                    self.diagnostics.push(
                        Diagnostic::error("Could not create CloudFormation resource")
                            .with_detail(format!("Encoding {path} failed: {error}."))
                            .with_subject(self.resource.definition().clone()),
                    );
                    None
                }
            };
        }

        if let Some(reference) = self.resource.reference_at(path) {
            return match intrinsic::convert(reference.expression(), self.graph) {
                Ok(intrinsic) => Some(intrinsic.to_json()),
                Err(diagnostics) => {
                    self.diagnostics.append(diagnostics);
                    None
                }
            };
        }

        match (value, shape.underlying()) {
            (Value::Null, _) => None,
            (Value::Object(_), Shape::Struct(schema)) => {
                non_empty(JsonValue::Object(self.encode_struct(value, schema, path)))
            }
            (Value::List(items), Shape::List(element)) => {
                let mut encoded = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    path.push(PathStep::Index(index));
                    encoded.extend(self.encode_value(item, element, path));
                    path.pop();
                }
                non_empty(JsonValue::Array(encoded))
            }
            (Value::Object(entries), Shape::Map(element)) => {
                let mut encoded = Map::new();
                for (key, item) in entries {
                    path.push(PathStep::Attr(key.clone()));
                    if let Some(item) = self.encode_value(item, element, path) {
                        encoded.insert(key.clone(), item);
                    }
                    path.pop();
                }
                non_empty(JsonValue::Object(encoded))
            }
            (Value::Unknown | Value::Expression(_), _) => panic!(
                "unresolved value at {path} of resource {:?}, this is a bug",
                self.resource.name()
            ),
            (value, _) => value.to_json(),
        }
    }

    /// Custom encoders only see concrete values
    ///
    /// Returns whether a reference was found at or below `path`.
    fn reject_nested_references(&mut self, path: &FieldPath) -> bool {
        let mut found = false;

        for reference in self.resource.references() {
            if !reference.path().starts_with(path) {
                continue;
            }
            found = true;

            let expression = reference.expression();
            let subject = expression
                .traversals()
                .first()
                .map(|traversal| traversal.range.clone())
                .unwrap_or_else(|| expression.range().clone());
            self.diagnostics.push(
                Diagnostic::error("References are not allowed here")
                    .with_detail(format!(
                        "The value of {path} cannot contain references to other resources."
                    ))
                    .with_subject(subject)
                    .with_context(expression.range().clone())
                    .with_expression(expression.clone()),
            );
        }

        found
    }
}

fn non_empty(value: JsonValue) -> Option<JsonValue> {
    match &value {
        JsonValue::Array(items) if items.is_empty() => None,
        JsonValue::Object(entries) if entries.is_empty() => None,
        _ => Some(value),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::documents;
    use crate::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn graph(text: &str) -> Graph {
        let documents = documents!(text);
        let (graph, diagnostics) = Graph::decode(&documents, &testing::registry());
        graph.unwrap_or_else(|| panic!("{diagnostics}"))
    }

    fn artifacts(names: &[&str]) -> HashMap<String, ArtifactLocation> {
        names
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ArtifactLocation::new("bucket".to_string(), format!("{name}.zip")),
                )
            })
            .collect()
    }

    fn encode(text: &str) -> (JsonValue, Vec<(String, String)>) {
        let (template, diagnostics) =
            Encoder::new().encode(&graph(text), &artifacts(&["func", "other"]));
        (
            serde_json::to_value(&template).unwrap(),
            testing::messages(&diagnostics),
        )
    }

    #[test]
    fn empty_graph() {
        let (template, diagnostics) = Encoder::new().encode(&Graph::default(), &HashMap::new());
        assert!(diagnostics.is_empty());
        assert_eq!(
            serde_json::to_value(&template).unwrap(),
            json!({ "AWSTemplateFormatVersion": "2010-09-09" })
        );
    }

    #[test]
    fn description() {
        let encoder = Encoder::new().with_description("my stack");
        let (template, _) = encoder.encode(&Graph::default(), &HashMap::new());
        assert_eq!(template.description(), Some("my stack"));
    }

    #[test]
    fn literal_values() {
        let (template, errors) = encode(
            r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = "arn:aws:iam::123456789012:role/lambda"
  memory_size = 512
  description = null
  layers      = []

  environment {
    variables = {
      STAGE = "prod"
    }
  }

  tracing_config {
    mode = "Active"
  }
}
"#,
        );

        assert_eq!(errors, vec![]);
        assert_eq!(
            template["Resources"]["Func"],
            json!({
                "Type": "AWS::Lambda::Function",
                "Properties": {
                    "Code": { "S3Bucket": "bucket", "S3Key": "func.zip" },
                    "Environment": { "Variables": { "STAGE": "prod" } },
                    "Handler": "index.handler",
                    "MemorySize": 512,
                    "Role": "arn:aws:iam::123456789012:role/lambda",
                    "Runtime": "nodejs10.x",
                    "TracingConfig": { "Mode": "Active" }
                }
            })
        );
    }

    #[test]
    fn references() {
        let (template, errors) = encode(
            r#"
resource "lambda-role" {
  type = "aws:iam_role"
  name = "my-lambda-role"

  assume_role_policy {
    statement {
      effect = "Allow"
      action = ["sts:AssumeRole"]
      principal {
        service = ["lambda.amazonaws.com"]
      }
    }
  }
}

resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = lambda-role.arn
  description = "Runs as ${lambda-role.name}"

  environment {
    variables = {
      ROLE_ID = lambda-role.id
      STATIC  = "$${not a reference}"
    }
  }
}

resource "invoke" {
  type       = "aws:lambda_permission"
  action     = "lambda:InvokeFunction"
  function   = func
  principal  = "s3.amazonaws.com"
  source_arn = "arn:aws:s3:::${func.handler}"
}
"#,
        );

        assert_eq!(errors, vec![]);

        let func = &template["Resources"]["Func"]["Properties"];
        assert_eq!(func["Role"], json!({ "Fn::GetAtt": "LambdaRole.Arn" }));
        assert_eq!(
            func["Description"],
            json!({ "Fn::Sub": "Runs as ${LambdaRole}" })
        );
        assert_eq!(
            func["Environment"]["Variables"],
            json!({
                "ROLE_ID": { "Fn::GetAtt": "LambdaRole.RoleId" },
                "STATIC": "${not a reference}"
            })
        );

        let invoke = &template["Resources"]["Invoke"]["Properties"];
        assert_eq!(invoke["FunctionName"], json!({ "Ref": "Func" }));
        assert_eq!(invoke["SourceArn"], json!("arn:aws:s3:::index.handler"));
    }

    #[test]
    fn custom_encoders() {
        let (template, errors) = encode(
            r#"
resource "role" {
  type = "aws:iam_role"

  assume_role_policy {
    statement {
      effect = "Allow"
      action = ["sts:AssumeRole"]
      principal {
        service = ["lambda.amazonaws.com"]
      }
    }
  }

  tags = {
    b = "2"
    a = "1"
  }
}
"#,
        );

        assert_eq!(errors, vec![]);
        assert_eq!(
            template["Resources"]["Role"]["Properties"],
            json!({
                "AssumeRolePolicyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "sts:AssumeRole",
                        "Principal": { "Service": "lambda.amazonaws.com" }
                    }]
                },
                "Tags": [
                    { "Key": "a", "Value": "1" },
                    { "Key": "b", "Value": "2" }
                ]
            })
        );
    }

    #[test]
    fn references_in_custom_encoded_fields() {
        let (template, errors) = encode(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = role.arn
}

resource "role" {
  type = "aws:iam_role"

  assume_role_policy {
    statement {
      effect = "Allow"
      action = ["sts:AssumeRole"]
    }
  }

  policy "Invoke" {
    statement {
      effect   = "Allow"
      action   = ["lambda:InvokeFunction"]
      resource = [func.arn]
    }
  }
}
"#,
        );

        assert_eq!(
            errors,
            vec![(
                "References are not allowed here".to_string(),
                "The value of policy[0] cannot contain references to other resources."
                    .to_string()
            )]
        );
        assert!(template["Resources"]["Func"].is_object());
        assert!(template["Resources"].get("Role").is_none());
    }

    #[test]
    fn incompatible_resources() {
        let (template, errors) = encode(
            r#"
resource "test" {
  type = "test:resource"
}

resource "other" {
  type      = "aws:lambda_permission"
  action    = "lambda:InvokeFunction"
  function  = "f"
  principal = "s3.amazonaws.com"
}
"#,
        );

        assert_eq!(
            errors,
            vec![(
                "Incompatible resource".to_string(),
                "A CloudFormation resource cannot be generated from test:resource.".to_string()
            )]
        );
        assert_eq!(
            template["Resources"],
            json!({
                "Other": {
                    "Type": "AWS::Lambda::Permission",
                    "Properties": {
                        "Action": "lambda:InvokeFunction",
                        "FunctionName": "f",
                        "Principal": "s3.amazonaws.com"
                    }
                }
            })
        );
    }

    #[test]
    fn missing_source_code() {
        let graph = graph(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = "role"
}
"#,
        );

        let (template, diagnostics) = Encoder::new().encode(&graph, &HashMap::new());
        assert!(template.resources().is_empty());
        assert_eq!(
            testing::messages(&diagnostics),
            vec![(
                "Source code not provided".to_string(),
                "Source code must be provided for aws:lambda_function.".to_string()
            )]
        );
    }

    #[test]
    fn unreadable_reference() {
        let (_, errors) = encode(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = other.last_modified
}

resource "other" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = "role"
}
"#,
        );

        assert_eq!(
            errors,
            vec![(
                "Invalid reference".to_string(),
                "CloudFormation does not support reading this field.".to_string()
            )]
        );
    }

    #[test]
    fn block_lists() {
        let (template, errors) = encode(
            r#"
resource "blocks" {
  type = "test:blocks"
  name = "blocks"

  item { value = "a" }
  item { value = other.output }
}

resource "other" {
  type = "test:blocks"

  item { value = "x" }
  item { value = "y" }
}
"#,
        );

        assert_eq!(errors, vec![]);
        assert_eq!(
            template["Resources"]["Blocks"]["Properties"],
            json!({
                "Items": [
                    { "Value": "a" },
                    { "Value": { "Fn::GetAtt": "Other.Output" } }
                ],
                "Name": "blocks"
            })
        );
    }

    #[test]
    fn sequential_and_parallel_are_equal() {
        let mut text = String::new();
        for index in 0..32 {
            text.push_str(&format!(
                r#"
resource "perm-{index}" {{
  type      = "aws:lambda_permission"
  action    = "lambda:InvokeFunction"
  function  = "f"
  principal = "${{perm-{next}.function}}"
}}
resource "test-{index}" {{
  type = "test:resource"
}}
"#,
                next = (index + 1) % 32
            ));
        }

        let graph = graph(&text);
        let artifacts = HashMap::new();
        let (parallel, parallel_diagnostics) = Encoder::new().encode(&graph, &artifacts);
        let (sequential, sequential_diagnostics) =
            Encoder::new().sequential(true).encode(&graph, &artifacts);

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.resources().len(), 32);
        assert_eq!(
            parallel_diagnostics.to_string(),
            sequential_diagnostics.to_string()
        );
        assert_eq!(parallel_diagnostics.errors().count(), 32);
    }
}
