//! resource type descriptions
//!
//! A [TypeDescriptor] declares everything the pipeline needs to know about a resource type:
//!
//! ```
//! # use cfngen::schema::{Field, Shape, TypeDescriptor};
//! let descriptor = TypeDescriptor::builder("aws:lambda_permission")
//!     .target_type("AWS::Lambda::Permission")
//!     .input(Field::new("action", Shape::String).target("Action"))
//!     .input(Field::new("function", Shape::String).target("FunctionName"))
//!     .input(Field::new("source_arn", Shape::String).optional().target("SourceArn"))
//!     .output(Field::new("statement", Shape::String))
//!     .build();
//!
//! assert_eq!(descriptor.decode_spec().entries().len(), 3);
//! ```
//!
//! Input fields are decoded from the configuration and encoded into the template, output
//! fields can only be referenced. The [DecodeSpec] describing what the configuration body of
//! a resource may contain is derived once, when the descriptor is built.
use crate::cloudformation::ArtifactLocation;
use crate::expression::PathStep;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Field names every resource block uses for itself
pub const RESERVED_FIELDS: [&str; 2] = ["type", "source"];

/// Replaces the structural encoding of a field
pub trait CustomEncoder: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<serde_json::Value, EncodeError>;
}

/// Writes the location of a resource's uploaded source code into its properties
pub trait SourceCodeSetter: Send + Sync + fmt::Debug {
    fn set_source_location(
        &self,
        properties: &mut serde_json::Map<String, serde_json::Value>,
        location: &ArtifactLocation,
    );
}

#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("{field} is required")]
    MissingField { field: String },
    #[error("{0}")]
    Invalid(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Type of a field
#[derive(Debug, Clone)]
pub enum Shape {
    Bool,
    Number,
    String,
    List(Box<Shape>),
    Map(Box<Shape>),
    Struct(StructSchema),
    Custom(Box<Shape>, Arc<dyn CustomEncoder>),
}

impl Shape {
    pub fn list(element: Shape) -> Self {
        Shape::List(Box::new(element))
    }

    pub fn map(element: Shape) -> Self {
        Shape::Map(Box::new(element))
    }

    pub fn custom(shape: Shape, encoder: impl CustomEncoder + 'static) -> Self {
        Shape::Custom(Box::new(shape), Arc::new(encoder))
    }

    /// The shape without any custom encoder
    pub fn underlying(&self) -> &Shape {
        match self {
            Shape::Custom(shape, _) => shape.underlying(),
            shape => shape,
        }
    }

    pub fn encoder(&self) -> Option<&Arc<dyn CustomEncoder>> {
        match self {
            Shape::Custom(_, encoder) => Some(encoder),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self.underlying(),
            Shape::Bool | Shape::Number | Shape::String
        )
    }

    /// Human readable name, as used in diagnostics
    pub fn friendly_name(&self) -> String {
        match self.underlying() {
            Shape::Bool => "bool".to_string(),
            Shape::Number => "number".to_string(),
            Shape::String => "string".to_string(),
            Shape::List(element) => format!("list of {}", element.friendly_name()),
            Shape::Map(element) => format!("map of {}", element.friendly_name()),
            Shape::Struct(_) => "object".to_string(),
            Shape::Custom(..) => unreachable!("custom shapes are unwrapped by underlying()"),
        }
    }

    /// Shape reached by following `step`
    pub fn step(&self, step: &PathStep) -> Option<&Shape> {
        match (self.underlying(), step) {
            (Shape::Struct(schema), PathStep::Attr(name)) => schema.field(name).map(Field::shape),
            (Shape::List(element), PathStep::Index(_)) => Some(element.as_ref()),
            (Shape::Map(element), PathStep::Attr(_)) => Some(element.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// How a field is accessed in the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// written as a property, cannot be read by other resources
    Value,
    /// written as a property and readable through `Ref`
    Ref,
    /// readable through `Fn::GetAtt`
    Att,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    shape: Shape,
    direction: Direction,
    optional: bool,
    label: bool,
    min_blocks: usize,
    max_blocks: usize,
    target: Option<Target>,
}

impl Field {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            direction: Direction::Input,
            optional: false,
            label: false,
            min_blocks: 0,
            max_blocks: 0,
            target: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Decode the field from a block label instead of an attribute
    pub fn label(mut self) -> Self {
        self.label = true;
        self
    }

    pub fn min_blocks(mut self, min: usize) -> Self {
        self.min_blocks = min;
        self
    }

    /// `0` means unlimited
    pub fn max_blocks(mut self, max: usize) -> Self {
        self.max_blocks = max;
        self
    }

    pub fn target(self, name: impl Into<String>) -> Self {
        self.with_target(name, Access::Value)
    }

    pub fn target_ref(self, name: impl Into<String>) -> Self {
        self.with_target(name, Access::Ref)
    }

    pub fn target_att(self, name: impl Into<String>) -> Self {
        self.with_target(name, Access::Att)
    }

    fn with_target(mut self, name: impl Into<String>, access: Access) -> Self {
        self.target = Some(Target {
            name: name.into(),
            access,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_label(&self) -> bool {
        self.label
    }

    pub fn target_mapping(&self) -> Option<&Target> {
        self.target.as_ref()
    }
}

/// Ordered set of fields
#[derive(Debug, Clone, Default)]
pub struct StructSchema {
    fields: Vec<Field>,
}

impl StructSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(self, field: Field) -> Self {
        self.with_field(field, Direction::Input)
    }

    pub fn output(self, field: Field) -> Self {
        self.with_field(field, Direction::Output)
    }

    fn with_field(mut self, mut field: Field, direction: Direction) -> Self {
        assert!(
            self.field(&field.name).is_none(),
            "field {:?} declared twice",
            field.name
        );
        field.direction = direction;
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|field| field.direction == Direction::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Field> {
        self.fields
            .iter()
            .filter(|field| field.direction == Direction::Output)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn input_field(&self, name: &str) -> Option<&Field> {
        self.inputs().find(|field| field.name == name)
    }

    pub fn output_field(&self, name: &str) -> Option<&Field> {
        self.outputs().find(|field| field.name == name)
    }

    fn only(&self, direction: Direction) -> StructSchema {
        StructSchema {
            fields: self
                .fields
                .iter()
                .filter(|field| field.direction == direction)
                .cloned()
                .collect(),
        }
    }
}

/// How many blocks of a type a body may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockCount {
    Single { required: bool },
    /// `max == 0` means unlimited
    List { min: usize, max: usize },
}

#[derive(Debug, Clone)]
pub enum SpecEntry {
    Label {
        name: String,
        index: usize,
    },
    Attribute {
        name: String,
        shape: Shape,
        required: bool,
    },
    Block {
        name: String,
        spec: DecodeSpec,
        count: BlockCount,
    },
}

impl SpecEntry {
    pub fn name(&self) -> &str {
        match self {
            SpecEntry::Label { name, .. }
            | SpecEntry::Attribute { name, .. }
            | SpecEntry::Block { name, .. } => name,
        }
    }
}

/// What a configuration body may contain, derived from the input fields of a [StructSchema]
///
/// - label fields consume the block labels in declaration order
/// - struct fields (and lists of structs) are nested blocks
/// - everything else is an attribute; lists and maps are never required
#[derive(Debug, Clone, Default)]
pub struct DecodeSpec {
    entries: Vec<SpecEntry>,
}

impl DecodeSpec {
    pub fn derive(schema: &StructSchema) -> Self {
        let mut entries = Vec::new();
        let mut label_index = 0;

        for field in schema.inputs() {
            let name = field.name.clone();
            let entry = if field.label {
                label_index += 1;
                SpecEntry::Label {
                    name,
                    index: label_index - 1,
                }
            } else {
                match field.shape.underlying() {
                    Shape::Struct(nested) => SpecEntry::Block {
                        name,
                        spec: DecodeSpec::derive(nested),
                        count: BlockCount::Single {
                            required: !field.optional,
                        },
                    },
                    Shape::List(element) => match element.underlying() {
                        Shape::Struct(nested) => SpecEntry::Block {
                            name,
                            spec: DecodeSpec::derive(nested),
                            count: BlockCount::List {
                                min: field.min_blocks,
                                max: field.max_blocks,
                            },
                        },
                        _ => SpecEntry::Attribute {
                            name,
                            shape: field.shape.clone(),
                            required: false,
                        },
                    },
                    Shape::Map(_) => SpecEntry::Attribute {
                        name,
                        shape: field.shape.clone(),
                        required: false,
                    },
                    _ => SpecEntry::Attribute {
                        name,
                        shape: field.shape.clone(),
                        required: !field.optional,
                    },
                }
            };
            entries.push(entry);
        }

        Self { entries }
    }

    pub fn entries(&self) -> &[SpecEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            SpecEntry::Label { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, SpecEntry::Attribute { name: n, .. } if n == name))
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, SpecEntry::Block { name: n, .. } if n == name))
    }
}

/// Everything known about one resource type
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    target_type: Option<String>,
    schema: StructSchema,
    source_code: Option<Arc<dyn SourceCodeSetter>>,
    decode_spec: DecodeSpec,
}

impl TypeDescriptor {
    pub fn builder(name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: name.into(),
            target_type: None,
            schema: StructSchema::new(),
            source_code: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target_type(&self) -> Option<&str> {
        self.target_type.as_deref()
    }

    pub fn schema(&self) -> &StructSchema {
        &self.schema
    }

    pub fn source_code(&self) -> Option<&Arc<dyn SourceCodeSetter>> {
        self.source_code.as_ref()
    }

    pub fn decode_spec(&self) -> &DecodeSpec {
        &self.decode_spec
    }

    /// Struct of the input fields only
    pub fn input_shape(&self) -> Shape {
        Shape::Struct(self.schema.only(Direction::Input))
    }

    /// Struct of the output fields only
    pub fn output_shape(&self) -> Shape {
        Shape::Struct(self.schema.only(Direction::Output))
    }
}

#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: String,
    target_type: Option<String>,
    schema: StructSchema,
    source_code: Option<Arc<dyn SourceCodeSetter>>,
}

impl TypeDescriptorBuilder {
    pub fn target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn input(mut self, field: Field) -> Self {
        assert!(
            !RESERVED_FIELDS.contains(&field.name()),
            "field name {:?} is reserved",
            field.name()
        );
        self.schema = self.schema.input(field);
        self
    }

    pub fn output(mut self, field: Field) -> Self {
        self.schema = self.schema.output(field);
        self
    }

    pub fn source_code(mut self, setter: impl SourceCodeSetter + 'static) -> Self {
        self.source_code = Some(Arc::new(setter));
        self
    }

    pub fn build(self) -> TypeDescriptor {
        let decode_spec = DecodeSpec::derive(&self.schema);
        tracing::trace!(name = %self.name, entries = decode_spec.entries().len(), "type described");

        TypeDescriptor {
            name: self.name,
            target_type: self.target_type,
            schema: self.schema,
            source_code: self.source_code,
            decode_spec,
        }
    }
}
