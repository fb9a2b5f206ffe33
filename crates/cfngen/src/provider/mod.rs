//! built-in resource types
//!
//! Every provider exposes the [TypeDescriptor](crate::schema::TypeDescriptor)s of its
//! resource types. [aws::registry] is the registry used by the command line.
pub mod aws;
