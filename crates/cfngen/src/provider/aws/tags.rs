use crate::schema::{CustomEncoder, EncodeError, Shape};
use crate::value::Value;
use serde::Serialize;

/// Encodes a map of tags as a list of `{ "Key": .., "Value": .. }`, sorted by key
#[derive(Debug, Clone, Copy, Default)]
pub struct TagsEncoder;

impl TagsEncoder {
    pub fn shape() -> Shape {
        Shape::custom(Shape::map(Shape::String), TagsEncoder)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Tag<'a> {
    key: &'a str,
    value: &'a str,
}

impl CustomEncoder for TagsEncoder {
    fn encode(&self, value: &Value) -> Result<serde_json::Value, EncodeError> {
        let entries = value.as_object().ok_or_else(|| {
            EncodeError::Invalid(format!("tags must be a map, got {}", value.type_name()))
        })?;

        let mut tags = entries
            .iter()
            .map(|(key, value)| {
                let value = value.as_str().ok_or_else(|| {
                    EncodeError::Invalid(format!("tag {key:?} must be a string"))
                })?;
                Ok(Tag { key, value })
            })
            .collect::<Result<Vec<_>, EncodeError>>()?;
        tags.sort_by(|a, b| a.key.cmp(b.key));

        Ok(serde_json::to_value(tags)?)
    }
}
