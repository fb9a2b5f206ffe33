//! static evaluation and reference extraction
//!
//! Walks the raw value of a resource alongside its schema. Every expression leaf is either
//! - evaluated right away (no variables) and converted to the field's shape
//! - recorded as a [Reference] (a traversal or template of traversals) and replaced by
//!   [Value::Unknown]
//!
//! Object and tuple constructors containing references are split into their elements when
//! they are assigned to a map or list field, so that each reference lands on its own path:
//!
//! ```hcl
//! environment {
//!   variables = {
//!     ROLE  = role.arn   # reference at environment.variables.ROLE
//!     STAGE = "prod"     # evaluated
//!   }
//! }
//! ```
use crate::decode::invalid_expression;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::expression::{Expression, FieldPath, Form, PathStep};
use crate::graph::Reference;
use crate::schema::{Shape, StructSchema};
use crate::value::Value;
use indexmap::IndexMap;

/// Results collected while evaluating a single resource
#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    pub references: Vec<Reference>,
    pub diagnostics: Diagnostics,
}

#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn evaluate(value: Value, schema: &StructSchema, accumulator: &mut Accumulator) -> Value {
    let mut path = FieldPath::default();
    evaluate_struct(value, schema, &mut path, accumulator)
}

fn evaluate_struct(
    value: Value,
    schema: &StructSchema,
    path: &mut FieldPath,
    accumulator: &mut Accumulator,
) -> Value {
    let Value::Object(fields) = value else {
        return value;
    };

    let mut evaluated = IndexMap::with_capacity(fields.len());
    for (name, value) in fields {
        let value = match schema.input_field(&name) {
            Some(field) => {
                path.push(PathStep::Attr(name.clone()));
                let value = evaluate_value(value, field.shape(), path, accumulator);
                path.pop();
                value
            }
            None => value,
        };
        evaluated.insert(name, value);
    }

    Value::Object(evaluated)
}

fn evaluate_value(
    value: Value,
    shape: &Shape,
    path: &mut FieldPath,
    accumulator: &mut Accumulator,
) -> Value {
    match (value, shape.underlying()) {
        (Value::Expression(expression), _) => {
            evaluate_expression(*expression, shape, path, accumulator)
        }
        (value @ Value::Object(_), Shape::Struct(schema)) => {
            evaluate_struct(value, schema, path, accumulator)
        }
        (Value::List(items), Shape::List(element)) => Value::List(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    path.push(PathStep::Index(index));
                    let item = evaluate_value(item, element, path, accumulator);
                    path.pop();
                    item
                })
                .collect(),
        ),
        (Value::Object(entries), Shape::Map(element)) => Value::Object(
            entries
                .into_iter()
                .map(|(key, item)| {
                    path.push(PathStep::Attr(key.clone()));
                    let item = evaluate_value(item, element, path, accumulator);
                    path.pop();
                    (key, item)
                })
                .collect(),
        ),
        (value, _) => value,
    }
}

fn evaluate_expression(
    expression: Expression,
    shape: &Shape,
    path: &mut FieldPath,
    accumulator: &mut Accumulator,
) -> Value {
    match expression.form() {
        Form::Static => evaluate_static(&expression, shape, &mut accumulator.diagnostics),
        Form::Traversal(_) | Form::Template(_) => {
            tracing::trace!(%path, expression = expression.text(), "reference found");
            accumulator
                .references
                .push(Reference::new(path.clone(), expression));
            Value::Unknown
        }
        Form::Unsupported => match decompose(&expression, shape) {
            Some(value) => evaluate_value(value, shape, path, accumulator),
            None => {
                accumulator.diagnostics.push(
                    Diagnostic::error("Unsupported reference expression")
                        .with_detail(
                            "References to other resources can only be used on their own or as interpolations in a string.",
                        )
                        .with_subject(expression.range().clone())
                        .with_expression(expression),
                );
                Value::Unknown
            }
        },
    }
}

/// Splits a constructor assigned to a collection field into its elements
fn decompose(expression: &Expression, shape: &Shape) -> Option<Value> {
    match shape.underlying() {
        Shape::Map(_) => expression.object_entries().map(|entries| {
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, expression)| (key, Value::from(expression)))
                    .collect(),
            )
        }),
        Shape::List(_) => expression
            .array_items()
            .map(|items| Value::List(items.into_iter().map(Value::from).collect())),
        _ => None,
    }
}

fn evaluate_static(expression: &Expression, shape: &Shape, diagnostics: &mut Diagnostics) -> Value {
    let value = match expression.evaluate() {
        Ok(value) => Value::from(value),
        Err(error) => {
            diagnostics.push(invalid_expression(expression, error));
            return Value::Unknown;
        }
    };

    let from = value.type_name();
    let is_null = value.is_null();

    match value.convert(shape) {
        Ok(converted) => {
            let to = shape.friendly_name();
            if shape.is_primitive() && !is_null && from != to {
                diagnostics.push(
                    Diagnostic::warning(format!("Value is converted from {from} to {to}"))
                        .with_subject(expression.range().clone())
                        .with_expression(expression.clone()),
                );
            }
            converted
        }
        Err(error) => {
            diagnostics.push(
                Diagnostic::error("Incorrect attribute value type")
                    .with_detail(format!("Inappropriate value for attribute: {error}."))
                    .with_subject(expression.range().clone())
                    .with_expression(expression.clone()),
            );
            Value::Unknown
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::documents;
    use crate::decode::Decoder;
    use crate::diagnostic::Severity;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn evaluate_resource(text: &str) -> (Value, Vec<Reference>, Diagnostics) {
        let documents = documents!(text);
        let (mut resources, diagnostics) = Decoder::new(&testing::registry()).decode(&documents);
        assert!(!diagnostics.has_errors(), "{diagnostics}");

        let resource = resources.remove(0);
        let mut accumulator = Accumulator::default();
        let value = evaluate(resource.value, resource.descriptor.schema(), &mut accumulator);
        (value, accumulator.references, accumulator.diagnostics)
    }

    fn paths(references: &[Reference]) -> Vec<String> {
        references
            .iter()
            .map(|reference| reference.path().to_string())
            .collect()
    }

    #[test]
    fn static_values() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs${10 + 2}.x"
  role        = "testrole"
  memory_size = 256
  description = null
}
"#,
        );

        assert!(references.is_empty());
        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(value.get_attr("runtime"), Some(&Value::from("nodejs12.x")));
        assert_eq!(value.get_attr("memory_size"), Some(&Value::from(256_i64)));
        assert_eq!(value.get_attr("description"), Some(&Value::Null));
    }

    #[test]
    fn conversions() {
        let (value, _, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = 12345
  memory_size = "256"
  timeout     = "soon"
}
"#,
        );

        assert_eq!(value.get_attr("role"), Some(&Value::from("12345")));
        assert_eq!(value.get_attr("memory_size"), Some(&Value::from(256_i64)));
        assert_eq!(value.get_attr("timeout"), Some(&Value::Unknown));

        let messages: Vec<_> = diagnostics
            .iter()
            .map(|d| (d.severity, d.summary.as_str(), d.detail.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (
                    Severity::Warning,
                    "Value is converted from number to string",
                    ""
                ),
                (
                    Severity::Warning,
                    "Value is converted from string to number",
                    ""
                ),
                (
                    Severity::Error,
                    "Incorrect attribute value type",
                    "Inappropriate value for attribute: number required."
                ),
            ]
        );
    }

    #[test]
    fn references() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = role.arn
  description = "${role.name} function"

  environment {
    variables = {
      ROLE  = role.arn
      STAGE = "prod"
    }
  }
}
"#,
        );

        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(
            paths(&references),
            vec!["description", "role", "environment.variables.ROLE"]
        );
        assert_eq!(value.get_attr("role"), Some(&Value::Unknown));

        let variables = value
            .get_attr("environment")
            .and_then(|environment| environment.get_attr("variables"))
            .unwrap();
        assert_eq!(variables.get_attr("ROLE"), Some(&Value::Unknown));
        assert_eq!(variables.get_attr("STAGE"), Some(&Value::from("prod")));
    }

    #[test]
    fn list_decomposition() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = "testrole"
  layers  = ["static", layer.arn]
}
"#,
        );

        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(paths(&references), vec!["layers[1]"]);
        assert_eq!(
            value.get_attr("layers"),
            Some(&Value::List(vec![Value::from("static"), Value::Unknown]))
        );
    }

    #[test]
    fn nested_block_references() {
        let (_, references, _) = evaluate_resource(
            r#"
resource "role" {
  type = "aws:iam_role"

  assume_role_policy {
    statement {
      effect   = "Allow"
      action   = ["sts:AssumeRole"]
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

        assert_eq!(paths(&references), vec!["policy[0].statement[0].resource[0]"]);
    }

    #[test]
    fn heredoc_references() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = "testrole"
  description = <<EOT
runs as ${role.name}
EOT
}
"#,
        );

        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(paths(&references), vec!["description"]);
        assert_eq!(value.get_attr("description"), Some(&Value::Unknown));
    }

    #[test]
    fn static_for_expressions() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = "testrole"
  layers  = [for s in ["a", "b"] : s]
}
"#,
        );

        assert!(references.is_empty());
        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert_eq!(
            value.get_attr("layers"),
            Some(&Value::List(vec![Value::from("a"), Value::from("b")]))
        );
    }

    #[test]
    fn unsupported_expressions() {
        let (value, references, diagnostics) = evaluate_resource(
            r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = upper(role.name)
  runtime = nope("x")
  role    = "testrole"
}
"#,
        );

        assert!(references.is_empty());
        assert_eq!(value.get_attr("handler"), Some(&Value::Unknown));
        assert_eq!(
            testing::messages(&diagnostics)
                .into_iter()
                .map(|(summary, _)| summary)
                .collect::<Vec<_>>(),
            vec!["Unsupported reference expression", "Invalid expression"]
        );
    }
}
