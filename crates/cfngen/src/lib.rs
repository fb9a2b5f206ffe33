//! # cfngen - HCL resource declarations to CloudFormation
//!
//! ## Introduction for developers
//!
//! Read this to understand how `cfngen` works internally.
//!
//! ### HCL Terms
//!
//! In hcl terms...
//! - a file gets parsed as a `body`
//! - ...which is just a list of `structures`
//! - ...where there are two kinds:
//!   - `attribute`: a "key = value" pair
//!   - or `block`:
//!     - 1 `identifier`
//!     - followed by 0 or more `labels`
//!     - and a `body` enclosed in `{` and `}`
//!
//! Resources are declared as blocks with a single label, their name:
//! ```hcl
//! resource "lambda-role" {
//!   type = "aws:iam_role"
//!
//!   assume_role_policy {
//!     statement {
//!       effect     = "Allow"
//!       principal  = { Service = "lambda.amazonaws.com" }
//!       action     = ["sts:AssumeRole"]
//!     }
//!   }
//! }
//!
//! resource "api" {
//!   type    = "aws:lambda_function"
//!   handler = "index.handler"
//!   runtime = "nodejs18.x"
//!   role    = lambda-role.arn
//! }
//! ```
//!
//! ### Loading files
//!
//! Every `.hcl` file is parsed as a `body` ([hcl_edit::structure::Body]). [documents::Documents] stores the
//! root attributes and blocks of all files and remembers where each came from, so diagnostics can point at it.
//! At this point the files only have to be valid HCL.
//!
//! ### Types
//!
//! Each resource has a type, looked up in the [registry::Registry]. A [schema::TypeDescriptor] lists the input
//! and output fields of a type, their [schema::Shape] and how they map onto the CloudFormation resource.
//! The built-in types live in [provider::aws].
//!
//! ### Decoding the resource graph
//!
//! see [graph::Graph::decode]
//!
//! Three stages, each one only runs when the previous one reported no errors:
//!
//! 1. **decode**: every `resource` block is checked against the [schema::DecodeSpec] of its type. Required
//!    attributes, unknown arguments and block counts are reported here. Leaves stay unevaluated
//!    [expression::Expression]s.
//! 2. **evaluate**: expressions without variables are evaluated and converted to the field shape. Expressions
//!    that reference other resources (`role.arn`, `"${role.name}-x"`) become [graph::Reference]s and evaluate to
//!    [value::Value::Unknown].
//! 3. **validate**: every reference must point at a declared resource and at a field that exists and, for
//!    inputs, has been set. Resource names must map to distinct CloudFormation logical ids.
//!
//! ### Output
//!
//! [cloudformation::Encoder] lowers the graph into a [cloudformation::Template]. References are translated into
//! `Ref`, `Fn::GetAtt` and `Fn::Sub`, see [cloudformation::Intrinsic]. Resources are encoded in parallel.
//!
pub mod documents;

pub mod cloudformation;
pub(crate) mod decode;
pub mod diagnostic;
pub(crate) mod evaluate;
pub mod expression;
pub mod graph;
pub mod provider;
pub mod registry;
pub mod schema;
#[cfg(test)]
mod testing;
pub(crate) mod validate;
pub mod value;
mod visit;
