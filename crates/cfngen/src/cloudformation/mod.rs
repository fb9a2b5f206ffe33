//! CloudFormation templates
//!
//! The [Encoder] lowers a validated [Graph](crate::graph::Graph) into a [Template]:
//!
//! ```json
//! {
//!   "AWSTemplateFormatVersion": "2010-09-09",
//!   "Resources": {
//!     "Func": {
//!       "Type": "AWS::Lambda::Function",
//!       "Properties": {
//!         "Handler": "index.handler",
//!         "Role": { "Fn::GetAtt": "Role.Arn" }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! References to other resources become intrinsic functions, see [Intrinsic].
mod encode;
mod intrinsic;
pub mod name;

pub use encode::Encoder;
pub use intrinsic::Intrinsic;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub const FORMAT_VERSION: &str = "2010-09-09";

/// Location of uploaded source code
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct ArtifactLocation {
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: String,
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "Resources", skip_serializing_if = "BTreeMap::is_empty")]
    resources: BTreeMap<String, TemplateResource>,
    /// logical id -> declared name
    #[serde(skip)]
    logical_names: HashMap<String, String>,
}

impl Template {
    pub fn new(description: Option<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            description,
            resources: BTreeMap::new(),
            logical_names: HashMap::new(),
        }
    }

    pub fn format_version(&self) -> &str {
        &self.format_version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Resources keyed by logical id
    pub fn resources(&self) -> &BTreeMap<String, TemplateResource> {
        &self.resources
    }

    pub fn resource(&self, logical_id: &str) -> Option<&TemplateResource> {
        self.resources.get(logical_id)
    }

    /// Declared name of the resource with the given logical id
    pub fn lookup_resource(&self, logical_id: &str) -> Option<&str> {
        self.logical_names.get(logical_id).map(String::as_str)
    }

    pub(crate) fn insert(&mut self, name: &str, resource: TemplateResource) {
        let logical_id = name::normalize(name);
        self.logical_names.insert(logical_id.clone(), name.to_owned());
        self.resources.insert(logical_id, resource);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateResource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    #[serde(
        rename = "Properties",
        skip_serializing_if = "serde_json::Map::is_empty"
    )]
    pub properties: serde_json::Map<String, serde_json::Value>,
}
