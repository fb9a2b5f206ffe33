//! AWS resource types
//!
//! | type                    | CloudFormation type       |
//! |-------------------------|---------------------------|
//! | `aws:iam_role`          | `AWS::IAM::Role`          |
//! | `aws:lambda_function`   | `AWS::Lambda::Function`   |
//! | `aws:lambda_permission` | `AWS::Lambda::Permission` |
mod iam;
mod lambda;
mod tags;

use crate::registry::Registry;
use crate::schema::TypeDescriptor;

pub use iam::{NamedPolicyEncoder, PolicyDocumentEncoder};
pub use lambda::S3Code;
pub use tags::TagsEncoder;

pub fn descriptors() -> Vec<TypeDescriptor> {
    vec![
        iam::role(),
        lambda::function(),
        lambda::permission(),
    ]
}

/// Registry of all AWS resource types
pub fn registry() -> Registry {
    Registry::new(descriptors())
}
