//! helpers shared by unit tests
use crate::diagnostic::Diagnostics;
use crate::provider::aws;
use crate::registry::Registry;
use crate::schema::{Field, Shape, StructSchema, TypeDescriptor};

/// AWS types plus
/// - `test:resource`, no CloudFormation counterpart
/// - `test:blocks`, a list of `item` blocks
pub(crate) fn registry() -> Registry {
    let mut descriptors = aws::descriptors();

    descriptors.push(
        TypeDescriptor::builder("test:resource")
            .input(Field::new("input", Shape::String).optional())
            .output(Field::new("output", Shape::String))
            .build(),
    );

    let item = StructSchema::new().input(Field::new("value", Shape::String).target("Value"));
    descriptors.push(
        TypeDescriptor::builder("test:blocks")
            .target_type("Test::Blocks")
            .input(
                Field::new("item", Shape::list(Shape::Struct(item)))
                    .min_blocks(2)
                    .max_blocks(3)
                    .target("Items"),
            )
            .input(Field::new("name", Shape::String).optional().target_ref("Name"))
            .output(Field::new("output", Shape::String).target_att("Output"))
            .build(),
    );

    Registry::new(descriptors)
}

/// Summary and detail of every diagnostic
pub(crate) fn messages(diagnostics: &Diagnostics) -> Vec<(String, String)> {
    diagnostics
        .iter()
        .map(|diagnostic| (diagnostic.summary.clone(), diagnostic.detail.clone()))
        .collect()
}
