//! decoding of `resource` blocks into raw value trees
//!
//! ```hcl
//! resource "func" {
//!   type    = "aws:lambda_function"
//!   handler = "index.handler"
//!   role    = role.arn
//!
//!   source {
//!     dir = "./src"
//!   }
//! }
//! ```
//!
//! The body of every resource block is checked against the [DecodeSpec] of its type. Attribute
//! values are not evaluated here, they are kept as [Value::Expression] leaves.
use crate::diagnostic::{Diagnostic, Diagnostics, SourceRange};
use crate::documents::{Documents, SourceFile};
use crate::expression::{Expression, Form};
use crate::graph::SourceCode;
use crate::registry::Registry;
use crate::schema::{
    BlockCount, DecodeSpec, Field, Shape, SpecEntry, StructSchema, TypeDescriptor,
    RESERVED_FIELDS,
};
use crate::value::Value;
use hcl_edit::structure::{Attribute, Block, BlockLabel, Body};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A resource block before evaluation
#[derive(Debug)]
pub(crate) struct RawResource {
    pub name: String,
    pub descriptor: Arc<TypeDescriptor>,
    pub value: Value,
    pub definition: SourceRange,
    pub source_code: Option<SourceCode>,
}

#[derive(derive_new::new)]
pub(crate) struct Decoder<'r> {
    registry: &'r Registry,
}

impl Decoder<'_> {
    /// Decodes all resource blocks
    ///
    /// Problems with the root structure abort before any resource is decoded. A resource
    /// with problems is skipped, its siblings are still decoded.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn decode(&self, documents: &Documents) -> (Vec<RawResource>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();

        for (source, attribute) in documents.attributes() {
            diagnostics.push(unsupported_argument(source, attribute));
        }

        let mut resource_blocks = Vec::new();
        for (source, block) in documents.blocks() {
            if block.ident.value().as_str() != "resource" {
                diagnostics.push(unsupported_block(source, block));
                continue;
            }

            match block.labels.len() {
                1 => resource_blocks.push((source, block)),
                0 => diagnostics.push(missing_labels(source, block, &["name"])),
                _ => diagnostics.push(extraneous_label(source, block, &["name"])),
            }
        }

        if diagnostics.has_errors() {
            return (vec![], diagnostics);
        }

        let mut resources = Vec::with_capacity(resource_blocks.len());
        let mut declared: HashMap<&str, SourceRange> = HashMap::new();
        for (source, block) in resource_blocks {
            let label = &block.labels[0];
            let name = label.as_str();
            let definition = definition_range(source, block);

            if name.is_empty() {
                diagnostics.push(
                    Diagnostic::error("Resource name not set")
                        .with_detail("A resource name cannot be blank.")
                        .with_subject(source.range_of(label)),
                );
                continue;
            }

            if let Some(previous) = declared.get(name) {
                diagnostics.push(
                    Diagnostic::error("Duplicate resource")
                        .with_detail(format!(
                            "Another resource named {name:?} was defined in {} on line {}.",
                            previous.filename_display(),
                            previous.start.line
                        ))
                        .with_subject(source.range_of(label))
                        .with_context(definition),
                );
                continue;
            }
            declared.insert(name, definition.clone());

            if let Some(resource) =
                self.decode_resource(name, source, block, definition, &mut diagnostics)
            {
                tracing::debug!(
                    name,
                    resource_type = resource.descriptor.name(),
                    "resource decoded"
                );
                resources.push(resource);
            }
        }

        (resources, diagnostics)
    }

    fn decode_resource(
        &self,
        name: &str,
        source: &Arc<SourceFile>,
        block: &Block,
        definition: SourceRange,
        diagnostics: &mut Diagnostics,
    ) -> Option<RawResource> {
        let Some(type_attribute) = find_attribute(&block.body, "type") else {
            diagnostics.push(missing_argument("type", definition));
            return None;
        };

        let expression = Expression::new(type_attribute.value.clone(), source);
        let type_name = static_string(&expression, diagnostics)?;

        let Some(descriptor) = self.registry.lookup(&type_name) else {
            let mut detail = format!("Resources of type {type_name:?} are not supported.");
            if let Some(suggestion) = self.registry.suggest(&type_name) {
                detail.push_str(&format!(" Did you mean {suggestion:?}?"));
            }
            diagnostics.push(
                Diagnostic::error("Unsupported resource")
                    .with_detail(detail)
                    .with_subject(expression.range().clone()),
            );
            return None;
        };

        let source_code = decode_source_code(source, &block.body, diagnostics);

        let value = BodyDecoder::new(source, diagnostics).decode_body(
            &block.body,
            &[],
            descriptor.decode_spec(),
            &definition,
            &RESERVED_FIELDS,
        );

        Some(RawResource {
            name: name.to_owned(),
            descriptor: Arc::clone(descriptor),
            value,
            definition,
            source_code,
        })
    }
}

/// Decodes the optional `source { dir = "..." }` block of a resource
fn decode_source_code(
    source: &Arc<SourceFile>,
    body: &Body,
    diagnostics: &mut Diagnostics,
) -> Option<SourceCode> {
    let blocks: Vec<&Block> = body
        .blocks()
        .filter(|block| block.ident.value().as_str() == "source")
        .collect();
    let (first, rest) = blocks.split_first()?;

    let definition = definition_range(source, first);
    for duplicate in rest {
        diagnostics.push(duplicate_block(
            "source",
            &definition,
            definition_range(source, duplicate),
        ));
    }

    if !first.labels.is_empty() {
        diagnostics.push(extraneous_label(source, first, &[]));
        return None;
    }

    let spec = DecodeSpec::derive(&StructSchema::new().input(Field::new("dir", Shape::String)));
    let value =
        BodyDecoder::new(source, diagnostics).decode_body(&first.body, &[], &spec, &definition, &[]);

    let Some(Value::Expression(expression)) = value.get_attr("dir") else {
        return None;
    };
    let dir = static_string(expression, diagnostics)?;
    let dir = match source.dir() {
        Some(base) => base.join(dir),
        None => PathBuf::from(dir),
    };

    Some(SourceCode { dir, definition })
}

/// Evaluates an expression that must be a literal string
fn static_string(expression: &Expression, diagnostics: &mut Diagnostics) -> Option<String> {
    if expression.form() != Form::Static {
        diagnostics.push(
            Diagnostic::error("Variables not allowed")
                .with_detail("Variables may not be used here.")
                .with_subject(expression.range().clone())
                .with_expression(expression.clone()),
        );
        return None;
    }

    let value = match expression.evaluate() {
        Ok(value) => Value::from(value),
        Err(error) => {
            diagnostics.push(invalid_expression(expression, error));
            return None;
        }
    };

    let reason = match value.convert(&Shape::String) {
        Ok(Value::String(s)) => return Some(s),
        Ok(_) => "string required".to_string(),
        Err(error) => error.to_string(),
    };

    diagnostics.push(
        Diagnostic::error("Incorrect attribute value type")
            .with_detail(format!("Inappropriate value for attribute: {reason}."))
            .with_subject(expression.range().clone())
            .with_expression(expression.clone()),
    );
    None
}

/// Decodes a body against a [DecodeSpec]
struct BodyDecoder<'a> {
    source: &'a Arc<SourceFile>,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> BodyDecoder<'a> {
    fn new(source: &'a Arc<SourceFile>, diagnostics: &'a mut Diagnostics) -> Self {
        Self {
            source,
            diagnostics,
        }
    }

    /// Decodes `body` into an object with one entry per spec entry
    ///
    /// Structures named in `reserved` are skipped, they are handled by the caller.
    fn decode_body(
        &mut self,
        body: &Body,
        labels: &[BlockLabel],
        spec: &DecodeSpec,
        definition: &SourceRange,
        reserved: &[&str],
    ) -> Value {
        let mut attributes: HashMap<&str, &Attribute> = HashMap::new();
        for attribute in body.attributes() {
            let name = attribute.key.value().as_str();
            if reserved.contains(&name) {
                continue;
            }

            if !spec.has_attribute(name) {
                self.diagnostics
                    .push(unsupported_argument(self.source, attribute));
                continue;
            }

            if let Some(previous) = attributes.get(name) {
                self.diagnostics.push(
                    Diagnostic::error("Attribute redefined")
                        .with_detail(format!(
                            "The argument {name:?} was already set at {}. Each argument may be set only once.",
                            self.source.range_of(&previous.key)
                        ))
                        .with_subject(self.source.range_of(&attribute.key)),
                );
                continue;
            }

            attributes.insert(name, attribute);
        }

        let mut blocks: HashMap<&str, Vec<&Block>> = HashMap::new();
        for block in body.blocks() {
            let name = block.ident.value().as_str();
            if reserved.contains(&name) {
                continue;
            }

            if !spec.has_block(name) {
                self.diagnostics.push(unsupported_block(self.source, block));
                continue;
            }

            blocks.entry(name).or_default().push(block);
        }

        let mut object = IndexMap::new();
        for entry in spec.entries() {
            let value = match entry {
                SpecEntry::Label { index, .. } => labels
                    .get(*index)
                    .map(|label| Value::from(label.as_str()))
                    .unwrap_or(Value::Null),
                SpecEntry::Attribute { name, required, .. } => match attributes.get(name.as_str()) {
                    Some(attribute) => {
                        Value::from(Expression::new(attribute.value.clone(), self.source))
                    }
                    None => {
                        if *required {
                            self.diagnostics
                                .push(missing_argument(name, definition.clone()));
                        }
                        Value::Null
                    }
                },
                SpecEntry::Block {
                    name,
                    spec: nested,
                    count,
                } => {
                    let found = blocks
                        .get(name.as_str())
                        .map(Vec::as_slice)
                        .unwrap_or_default();

                    match *count {
                        BlockCount::Single { required } => {
                            self.decode_single_block(name, nested, required, found, definition)
                        }
                        BlockCount::List { min, max } => {
                            self.decode_block_list(name, nested, (min, max), found, definition)
                        }
                    }
                }
            };

            object.insert(entry.name().to_owned(), value);
        }

        Value::Object(object)
    }

    fn decode_single_block(
        &mut self,
        name: &str,
        spec: &DecodeSpec,
        required: bool,
        found: &[&Block],
        definition: &SourceRange,
    ) -> Value {
        let Some((first, rest)) = found.split_first() else {
            if required {
                self.diagnostics.push(
                    Diagnostic::error(format!("Missing {name} block"))
                        .with_detail(format!("A block of type {name:?} is required here."))
                        .with_subject(definition.clone()),
                );
            }
            return Value::Null;
        };

        let first_definition = definition_range(self.source, first);
        for duplicate in rest {
            self.diagnostics.push(duplicate_block(
                name,
                &first_definition,
                definition_range(self.source, duplicate),
            ));
        }

        self.decode_nested_block(spec, first).unwrap_or(Value::Null)
    }

    fn decode_block_list(
        &mut self,
        name: &str,
        spec: &DecodeSpec,
        (min, max): (usize, usize),
        found: &[&Block],
        definition: &SourceRange,
    ) -> Value {
        if found.len() < min {
            self.diagnostics.push(
                Diagnostic::error(format!("Insufficient {name} blocks"))
                    .with_detail(format!("At least {min} {name:?} blocks are required."))
                    .with_subject(definition.clone()),
            );
        }

        if max > 0 && found.len() > max {
            self.diagnostics.push(
                Diagnostic::error(format!("Too many {name} blocks"))
                    .with_detail(format!("No more than {max} {name:?} blocks are allowed"))
                    .with_subject(definition_range(self.source, found[max])),
            );
        }

        Value::List(
            found
                .iter()
                .filter_map(|block| self.decode_nested_block(spec, block))
                .collect(),
        )
    }

    fn decode_nested_block(&mut self, spec: &DecodeSpec, block: &Block) -> Option<Value> {
        let expected: Vec<&str> = spec.labels().collect();

        if block.labels.len() > expected.len() {
            self.diagnostics
                .push(extraneous_label(self.source, block, &expected));
            return None;
        }

        if block.labels.len() < expected.len() {
            self.diagnostics
                .push(missing_labels(self.source, block, &expected));
            return None;
        }

        let definition = definition_range(self.source, block);
        Some(self.decode_body(&block.body, &block.labels, spec, &definition, &[]))
    }
}

fn find_attribute<'b>(body: &'b Body, name: &str) -> Option<&'b Attribute> {
    body.attributes()
        .find(|attribute| attribute.key.value().as_str() == name)
}

/// Range of a block header: its type and labels
fn definition_range(source: &SourceFile, block: &Block) -> SourceRange {
    let header = source.range_of(&block.ident);
    match block.labels.last() {
        Some(label) => header.to(&source.range_of(label)),
        None => header,
    }
}

fn unsupported_argument(source: &SourceFile, attribute: &Attribute) -> Diagnostic {
    let name = attribute.key.value().as_str();
    Diagnostic::error("Unsupported argument")
        .with_detail(format!("An argument named {name:?} is not expected here."))
        .with_subject(source.range_of(&attribute.key))
}

fn unsupported_block(source: &SourceFile, block: &Block) -> Diagnostic {
    let name = block.ident.value().as_str();
    Diagnostic::error("Unsupported block type")
        .with_detail(format!("Blocks of type {name:?} are not expected here."))
        .with_subject(source.range_of(&block.ident))
}

fn missing_argument(name: &str, definition: SourceRange) -> Diagnostic {
    Diagnostic::error("Missing required argument")
        .with_detail(format!(
            "The argument {name:?} is required, but no definition was found."
        ))
        .with_subject(definition)
}

fn duplicate_block(name: &str, previous: &SourceRange, subject: SourceRange) -> Diagnostic {
    Diagnostic::error(format!("Duplicate {name} block"))
        .with_detail(format!(
            "Only one block of type {name:?} is allowed. Previous definition was at {previous}."
        ))
        .with_subject(subject)
}

fn extraneous_label(source: &SourceFile, block: &Block, expected: &[&str]) -> Diagnostic {
    let name = block.ident.value().as_str();
    let detail = if expected.is_empty() {
        format!("No labels are expected for {name} blocks.")
    } else {
        format!(
            "Only {} labels ({}) are expected for {name} blocks.",
            expected.len(),
            expected.join(", ")
        )
    };

    Diagnostic::error(format!("Extraneous label for {name}"))
        .with_detail(detail)
        .with_subject(source.range_of(&block.labels[expected.len()]))
        .with_context(definition_range(source, block))
}

fn missing_labels(source: &SourceFile, block: &Block, expected: &[&str]) -> Diagnostic {
    let name = block.ident.value().as_str();
    Diagnostic::error(format!("Missing name for {name}"))
        .with_detail(format!(
            "All {name} blocks must have {} labels ({}).",
            expected.len(),
            expected.join(", ")
        ))
        .with_subject(definition_range(source, block))
}

pub(crate) fn invalid_expression(
    expression: &Expression,
    error: hcl::eval::Error,
) -> Diagnostic {
    Diagnostic::error("Invalid expression")
        .with_detail(error.to_string())
        .with_subject(expression.range().clone())
        .with_expression(expression.clone())
}
