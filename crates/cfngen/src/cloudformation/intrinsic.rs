//! conversion of references into intrinsic functions
use super::name::normalize;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::expression::{Expression, Form, PathStep, TemplatePart, Traversal};
use crate::graph::Graph;
use crate::schema::{Access, Direction, Target};
use crate::value::Value;
use serde_json::{json, Value as JsonValue};

/// A value that is only known when the stack is deployed
#[derive(Debug, Clone, PartialEq)]
pub enum Intrinsic {
    /// `{ "Ref": "LogicalId" }`
    Ref(String),
    /// `{ "Fn::GetAtt": "LogicalId.Attribute" }`
    GetAtt(String),
    /// `{ "Fn::Sub": "arn:${Func.Arn}/*" }`
    Sub(String),
    /// an input that is already known, written as is
    Inline(JsonValue),
}

impl Intrinsic {
    pub fn to_json(&self) -> JsonValue {
        match self {
            Intrinsic::Ref(logical_id) => json!({ "Ref": logical_id }),
            Intrinsic::GetAtt(attribute) => json!({ "Fn::GetAtt": attribute }),
            Intrinsic::Sub(template) => json!({ "Fn::Sub": template }),
            Intrinsic::Inline(value) => value.clone(),
        }
    }
}

/// Converts the expression of a reference
///
/// Expects a validated graph: the expression is a traversal or a template of traversals.
pub(crate) fn convert(expression: &Expression, graph: &Graph) -> Result<Intrinsic, Diagnostics> {
    match expression.form() {
        Form::Traversal(traversal) => {
            convert_traversal(&traversal, expression, graph).map_err(Diagnostics::from)
        }
        Form::Template(parts) => convert_template(parts, expression, graph),
        Form::Static | Form::Unsupported => {
            unreachable!("references are traversals or templates: {}", expression.text())
        }
    }
}

fn convert_template(
    parts: Vec<TemplatePart>,
    expression: &Expression,
    graph: &Graph,
) -> Result<Intrinsic, Diagnostics> {
    let parts: Vec<TemplatePart> = parts
        .into_iter()
        .filter(|part| !matches!(part, TemplatePart::Literal(text) if text.is_empty()))
        .collect();

    // "${a.b}" is the same as a.b
    if let [TemplatePart::Reference(traversal)] = parts.as_slice() {
        return convert_traversal(traversal, expression, graph).map_err(Diagnostics::from);
    }

    let mut diagnostics = Diagnostics::new();
    let mut sub = String::new();
    let mut plain = String::new();
    let mut dynamic = false;

    for part in parts {
        match part {
            TemplatePart::Literal(text) => {
                sub.push_str(&escape(&text));
                plain.push_str(&text);
            }
            TemplatePart::Reference(traversal) => {
                match convert_traversal(&traversal, expression, graph) {
                    Ok(Intrinsic::Ref(name) | Intrinsic::GetAtt(name)) => {
                        sub.push_str(&format!("${{{name}}}"));
                        dynamic = true;
                    }
                    Ok(Intrinsic::Inline(value)) => {
                        let text = match value {
                            JsonValue::String(text) => text,
                            value => value.to_string(),
                        };
                        sub.push_str(&escape(&text));
                        plain.push_str(&text);
                    }
                    Ok(Intrinsic::Sub(_)) => unreachable!("traversals never convert to Fn::Sub"),
                    Err(diagnostic) => diagnostics.push(diagnostic),
                }
            }
        }
    }

    if diagnostics.has_errors() {
        return Err(diagnostics);
    }

    Ok(if dynamic {
        Intrinsic::Sub(sub)
    } else {
        Intrinsic::Inline(JsonValue::String(plain))
    })
}

/// Literal `${` must not be read as a variable by `Fn::Sub`
fn escape(text: &str) -> String {
    text.replace("${", "${!")
}

fn convert_traversal(
    traversal: &Traversal,
    expression: &Expression,
    graph: &Graph,
) -> Result<Intrinsic, Diagnostic> {
    let Some(target) = graph.get(&traversal.root) else {
        return Err(Diagnostic::error("Invalid reference")
            .with_detail(format!("No resource named {:?}.", traversal.root))
            .with_subject(traversal.root_range.clone())
            .with_expression(expression.clone()));
    };

    let logical_id = normalize(&traversal.root);
    let Some((first, rest)) = traversal.steps.split_first() else {
        return Ok(Intrinsic::Ref(logical_id));
    };

    let field = match first {
        PathStep::Attr(name) => target.descriptor().schema().field(name),
        PathStep::Index(_) => None,
    };
    let Some(field) = field else {
        return Err(invalid_reference("No such output.", traversal, expression));
    };

    match field.target_mapping() {
        Some(Target {
            access: Access::Ref,
            ..
        }) if rest.is_empty() => Ok(Intrinsic::Ref(logical_id)),
        Some(Target {
            name,
            access: Access::Att,
        }) if rest.is_empty() => Ok(Intrinsic::GetAtt(format!("{logical_id}.{name}"))),
        _ => {
            let known = match field.direction() {
                Direction::Input => target
                    .value()
                    .get_path(&traversal.steps)
                    .filter(|value| {
                        matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
                    })
                    .and_then(Value::to_json),
                Direction::Output => None,
            };

            known.map(Intrinsic::Inline).ok_or_else(|| {
                invalid_reference(
                    "CloudFormation does not support reading this field.",
                    traversal,
                    expression,
                )
            })
        }
    }
}

fn invalid_reference(detail: &str, traversal: &Traversal, expression: &Expression) -> Diagnostic {
    Diagnostic::error("Invalid reference")
        .with_detail(detail)
        .with_subject(traversal.rel_range.clone())
        .with_expression(expression.clone())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::documents;
    use crate::expression::FieldPath;
    use crate::testing;
    use pretty_assertions::assert_eq;

    const RESOURCES: &str = r#"
resource "my-role" {
  type = "aws:iam_role"
  path = "/service/"

  assume_role_policy {
    statement {
      effect = "Allow"
      action = ["sts:AssumeRole"]
    }
  }
}

resource "test" {
  type  = "test:resource"
  input = "static"
}
"#;

    fn convert_role(expression: &str) -> Result<Intrinsic, Vec<(String, String)>> {
        let text = format!(
            r#"{RESOURCES}
resource "func" {{
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = {expression}
}}
"#
        );
        let documents = documents!(text);
        let (graph, diagnostics) = Graph::decode(&documents, &testing::registry());
        let graph = graph.unwrap_or_else(|| panic!("{diagnostics}"));

        let reference = graph
            .get("func")
            .and_then(|func| func.reference_at(&FieldPath::attrs(["role"])))
            .unwrap();
        convert(reference.expression(), &graph).map_err(|diagnostics| testing::messages(&diagnostics))
    }

    fn invalid(detail: &str) -> Result<Intrinsic, Vec<(String, String)>> {
        Err(vec![("Invalid reference".to_string(), detail.to_string())])
    }

    #[test]
    fn traversals() {
        assert_eq!(
            convert_role("my-role.arn"),
            Ok(Intrinsic::GetAtt("MyRole.Arn".to_string()))
        );
        assert_eq!(
            convert_role("my-role.id"),
            Ok(Intrinsic::GetAtt("MyRole.RoleId".to_string()))
        );
        assert_eq!(
            convert_role("my-role"),
            Ok(Intrinsic::Ref("MyRole".to_string()))
        );
        assert_eq!(
            convert_role("test.input"),
            Ok(Intrinsic::Inline(JsonValue::from("static")))
        );
        assert_eq!(
            convert_role("my-role.path"),
            Ok(Intrinsic::Inline(JsonValue::from("/service/")))
        );
        assert_eq!(
            convert_role("my-role.assume_role_policy.statement[0].effect"),
            Ok(Intrinsic::Inline(JsonValue::from("Allow")))
        );
    }

    #[test]
    fn unreadable_fields() {
        assert_eq!(
            convert_role("my-role.created_at"),
            invalid("CloudFormation does not support reading this field.")
        );
        assert_eq!(
            convert_role("my-role.assume_role_policy.statement[0].action"),
            invalid("CloudFormation does not support reading this field.")
        );
        assert_eq!(
            convert_role("test.output"),
            invalid("CloudFormation does not support reading this field.")
        );
    }

    #[test]
    fn templates() {
        assert_eq!(
            convert_role(r#""arn:${my-role.arn}/*""#),
            Ok(Intrinsic::Sub("arn:${MyRole.Arn}/*".to_string()))
        );
        assert_eq!(
            convert_role(r#""${my-role.arn}""#),
            Ok(Intrinsic::GetAtt("MyRole.Arn".to_string()))
        );
        assert_eq!(
            convert_role(r#""${my-role}-${test.input}""#),
            Ok(Intrinsic::Sub("${MyRole}-static".to_string()))
        );
        assert_eq!(
            convert_role(r#""${test.input}-x""#),
            Ok(Intrinsic::Inline(JsonValue::from("static-x")))
        );
    }

    #[test]
    fn heredoc_templates() {
        assert_eq!(
            convert_role("<<EOT\narn:${my-role.arn}/*\nEOT"),
            Ok(Intrinsic::Sub("arn:${MyRole.Arn}/*\n".to_string()))
        );
    }

    #[test]
    fn escaped_literals() {
        assert_eq!(
            convert_role(r#""$${literal}:${my-role.arn}""#),
            Ok(Intrinsic::Sub("${!literal}:${MyRole.Arn}".to_string()))
        );
    }

    #[test]
    fn template_errors() {
        assert_eq!(
            convert_role(r#""${my-role.created_at}/${test.output}""#),
            Err(vec![
                (
                    "Invalid reference".to_string(),
                    "CloudFormation does not support reading this field.".to_string()
                ),
                (
                    "Invalid reference".to_string(),
                    "CloudFormation does not support reading this field.".to_string()
                ),
            ])
        );
    }

    #[test]
    fn json() {
        assert_eq!(
            Intrinsic::Ref("A".to_string()).to_json(),
            json!({ "Ref": "A" })
        );
        assert_eq!(
            Intrinsic::GetAtt("A.Arn".to_string()).to_json(),
            json!({ "Fn::GetAtt": "A.Arn" })
        );
        assert_eq!(
            Intrinsic::Sub("${A}".to_string()).to_json(),
            json!({ "Fn::Sub": "${A}" })
        );
    }
}
