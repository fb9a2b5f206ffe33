use super::tags::TagsEncoder;
use crate::schema::{CustomEncoder, EncodeError, Field, Shape, StructSchema, TypeDescriptor};
use crate::value::Value;
use serde::Serialize;
use serde_json::Map;

const DEFAULT_POLICY_VERSION: &str = "2012-10-17";

/// Encodes a policy block as a JSON policy document
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyDocumentEncoder;

/// Encodes a labelled policy block as `{ "PolicyName": .., "PolicyDocument": .. }`
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedPolicyEncoder;

impl CustomEncoder for PolicyDocumentEncoder {
    fn encode(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        Ok(serde_json::to_value(PolicyDocument::read(value)?)?)
    }
}

impl CustomEncoder for NamedPolicyEncoder {
    fn encode(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        let name = string(value, "name")?.ok_or_else(|| EncodeError::MissingField {
            field: "name".to_string(),
        })?;

        Ok(serde_json::to_value(NamedPolicy {
            policy_name: name,
            policy_document: PolicyDocument::read(value)?,
        })?)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct NamedPolicy {
    policy_name: String,
    policy_document: PolicyDocument,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PolicyDocument {
    version: String,
    statement: Vec<Statement>,
}

impl PolicyDocument {
    fn read(value: &Value) -> Result<Self, EncodeError> {
        let statement: Vec<Statement> = match value.get_attr("statement") {
            Some(Value::List(statements)) => statements
                .iter()
                .map(Statement::read)
                .collect::<Result<_, _>>()?,
            _ => vec![],
        };

        let version = string(value, "version")?;
        Ok(Self {
            version: version.unwrap_or_else(|| DEFAULT_POLICY_VERSION.to_string()),
            statement,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    effect: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    principal: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_principal: Option<Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_action: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    not_resource: Option<OneOrMany>,
    #[serde(skip_serializing_if = "Option::is_none")]
    condition: Option<serde_json::Value>,
}

impl Statement {
    fn read(value: &Value) -> Result<Self, EncodeError> {
        let effect = string(value, "effect")?.ok_or_else(|| EncodeError::MissingField {
            field: "effect".to_string(),
        })?;

        let condition = match value.get_attr("condition") {
            None | Some(Value::Null) => None,
            Some(condition) => condition.to_json(),
        };

        Ok(Self {
            sid: string(value, "id")?,
            effect,
            principal: principal(value, "principal")?,
            not_principal: principal(value, "not_principal")?,
            action: strings(value, "action")?,
            not_action: strings(value, "not_action")?,
            resource: strings(value, "resource")?,
            not_resource: strings(value, "not_resource")?,
            condition,
        })
    }
}

/// IAM accepts a single string wherever a list of strings is allowed
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn string(value: &Value, name: &str) -> Result<Option<String>, EncodeError> {
    match value.get_attr(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(EncodeError::Invalid(format!(
            "{name} must be a string, got {}",
            other.type_name()
        ))),
    }
}

fn strings(value: &Value, name: &str) -> Result<Option<OneOrMany>, EncodeError> {
    let items = match value.get_attr(name) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::List(items)) => items,
        Some(other) => {
            return Err(EncodeError::Invalid(format!(
                "{name} must be a list of strings, got {}",
                other.type_name()
            )))
        }
    };

    let mut items = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_owned).ok_or_else(|| {
                EncodeError::Invalid(format!("{name} must be a list of strings"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match items.len() {
        0 => None,
        1 => items.pop().map(OneOrMany::One),
        _ => Some(OneOrMany::Many(items)),
    })
}

fn principal(
    value: &Value,
    name: &str,
) -> Result<Option<Map<String, serde_json::Value>>, EncodeError> {
    let Some(principal) = value.get_attr(name).filter(|principal| !principal.is_null()) else {
        return Ok(None);
    };

    let mut encoded = Map::new();
    for (field, key) in [("aws", "AWS"), ("service", "Service")] {
        if let Some(ids) = strings(principal, field)? {
            encoded.insert(key.to_string(), serde_json::to_value(ids)?);
        }
    }
    for (field, key) in [("canonical_user", "CanonicalUser"), ("federated", "Federated")] {
        if let Some(id) = string(principal, field)? {
            encoded.insert(key.to_string(), serde_json::Value::String(id));
        }
    }

    Ok((!encoded.is_empty()).then_some(encoded))
}

fn policy_schema() -> StructSchema {
    let principal = || {
        StructSchema::new()
            .input(Field::new("aws", Shape::list(Shape::String)).optional())
            .input(Field::new("service", Shape::list(Shape::String)).optional())
            .input(Field::new("canonical_user", Shape::String).optional())
            .input(Field::new("federated", Shape::String).optional())
    };

    let statement = StructSchema::new()
        .input(Field::new("id", Shape::String).optional())
        .input(Field::new("effect", Shape::String))
        .input(Field::new("principal", Shape::Struct(principal())).optional())
        .input(Field::new("not_principal", Shape::Struct(principal())).optional())
        .input(Field::new("action", Shape::list(Shape::String)).optional())
        .input(Field::new("not_action", Shape::list(Shape::String)).optional())
        .input(Field::new("resource", Shape::list(Shape::String)).optional())
        .input(Field::new("not_resource", Shape::list(Shape::String)).optional())
        .input(Field::new("condition", Shape::map(Shape::map(Shape::String))).optional());

    StructSchema::new()
        .input(Field::new("version", Shape::String).optional())
        .input(Field::new("statement", Shape::list(Shape::Struct(statement))).min_blocks(1))
}

pub(super) fn role() -> TypeDescriptor {
    let mut named_policy = StructSchema::new().input(Field::new("name", Shape::String).label());
    for field in policy_schema().inputs() {
        named_policy = named_policy.input(field.clone());
    }

    TypeDescriptor::builder("aws:iam_role")
        .target_type("AWS::IAM::Role")
        .input(
            Field::new(
                "assume_role_policy",
                Shape::custom(Shape::Struct(policy_schema()), PolicyDocumentEncoder),
            )
            .target("AssumeRolePolicyDocument"),
        )
        .input(Field::new("description", Shape::String).optional().target("Description"))
        .input(
            Field::new("managed_policies", Shape::list(Shape::String))
                .optional()
                .target("ManagedPolicyArns"),
        )
        .input(
            Field::new("max_session_duration", Shape::Number)
                .optional()
                .target("MaxSessionDuration"),
        )
        .input(Field::new("name", Shape::String).optional().target_ref("RoleName"))
        .input(Field::new("path", Shape::String).optional().target("Path"))
        .input(
            Field::new("permissions_boundary", Shape::String)
                .optional()
                .target("PermissionsBoundary"),
        )
        .input(
            Field::new(
                "policy",
                Shape::list(Shape::custom(Shape::Struct(named_policy), NamedPolicyEncoder)),
            )
            .optional()
            .target("Policies"),
        )
        .input(Field::new("tags", TagsEncoder::shape()).optional().target("Tags"))
        .output(Field::new("arn", Shape::String).target_att("Arn"))
        .output(Field::new("created_at", Shape::String))
        .output(Field::new("id", Shape::String).target_att("RoleId"))
        .build()
}
