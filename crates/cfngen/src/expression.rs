//! hcl expressions with source information
//!
//! An [Expression] wraps a parsed [hcl_edit] expression together with the [SourceFile] it came
//! from. Later stages only care about a few kinds of expressions, see [Form]:
//!
//! ```hcl
//! role    = "arn:aws:iam::123:role/x"  # static, evaluated right away
//! role    = my_role.arn                # traversal, a reference to another resource
//! source  = "${my_role.arn}/*"         # template, literal text and traversals
//! handler = upper(my_role.name)        # unsupported
//! ```
use crate::diagnostic::SourceRange;
use crate::documents::SourceFile;
use crate::visit::VisitTraversals;
use hcl::eval::Evaluate;
use hcl_edit::expr::{Expression as HclExpression, ObjectKey, TraversalOperator};
use hcl_edit::template::Element;
use std::fmt;
use std::sync::Arc;

/// One step of a path into a value tree
///
/// Object and map keys are both [PathStep::Attr].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathStep {
    Attr(String),
    Index(usize),
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Attr(name) => write!(f, ".{name}"),
            PathStep::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Path from the root of a resource's value to one of its fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FieldPath(Vec<PathStep>);

impl FieldPath {
    pub fn new(steps: impl IntoIterator<Item = PathStep>) -> Self {
        Self(steps.into_iter().collect())
    }

    /// Convenience constructor for paths made of attribute names only
    pub fn attrs<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(names.into_iter().map(|name| PathStep::Attr(name.to_owned())))
    }

    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    pub fn pop(&mut self) -> Option<PathStep> {
        self.0.pop()
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, step) in self.0.iter().enumerate() {
            match step {
                PathStep::Attr(name) if index == 0 => f.write_str(name)?,
                step => step.fmt(f)?,
            }
        }
        Ok(())
    }
}

/// A variable traversal such as `my_role.policy[0].name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    /// name of the referenced resource
    pub root: String,
    pub steps: Vec<PathStep>,
    /// the whole traversal
    pub range: SourceRange,
    pub root_range: SourceRange,
    /// everything after the root, equal to `root_range` when there are no steps
    pub rel_range: SourceRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Reference(Traversal),
}

/// Classification of an [Expression]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Form {
    /// no variables, can be evaluated without context
    Static,
    Traversal(Traversal),
    /// string template where every interpolation is a traversal
    Template(Vec<TemplatePart>),
    /// contains variables in a way that cannot be expressed in the target format
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct Expression {
    raw: HclExpression,
    source: Arc<SourceFile>,
    range: SourceRange,
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.range == other.range && self.raw == other.raw
    }
}

impl Expression {
    pub fn new(raw: HclExpression, source: &Arc<SourceFile>) -> Self {
        let range = source.range_of(&raw);
        Self {
            raw,
            source: Arc::clone(source),
            range,
        }
    }

    pub fn raw(&self) -> &HclExpression {
        &self.raw
    }

    pub fn range(&self) -> &SourceRange {
        &self.range
    }

    pub fn source(&self) -> &Arc<SourceFile> {
        &self.source
    }

    /// Source text of the expression
    pub fn text(&self) -> &str {
        self.source
            .text()
            .get(self.range.bytes())
            .unwrap_or_default()
    }

    pub fn form(&self) -> Form {
        if let Some(traversal) = self.traversal_of(&self.raw) {
            return Form::Traversal(traversal);
        }
        if let Some(parts) = self.template_parts() {
            return Form::Template(parts);
        }
        if self.has_variables() {
            Form::Unsupported
        } else {
            Form::Static
        }
    }

    /// All traversals of a traversal or template expression
    pub fn traversals(&self) -> Vec<Traversal> {
        match self.form() {
            Form::Traversal(traversal) => vec![traversal],
            Form::Template(parts) => parts
                .into_iter()
                .filter_map(|part| match part {
                    TemplatePart::Reference(traversal) => Some(traversal),
                    TemplatePart::Literal(_) => None,
                })
                .collect(),
            Form::Static | Form::Unsupported => vec![],
        }
    }

    /// Evaluates the expression without any variables in scope
    pub fn evaluate(&self) -> Result<hcl::Value, hcl::eval::Error> {
        let expression = hcl::Expression::from(self.raw.clone());
        expression.evaluate(&hcl::eval::Context::new())
    }

    /// Entries of an object constructor (`{ key = value }`)
    ///
    /// `None` if this is not an object constructor or one of its keys is not a plain name or
    /// string.
    pub fn object_entries(&self) -> Option<Vec<(String, Expression)>> {
        let HclExpression::Object(object) = &self.raw else {
            return None;
        };

        object
            .iter()
            .map(|(key, value)| {
                let key = match key {
                    ObjectKey::Ident(ident) => ident.value().to_string(),
                    ObjectKey::Expression(HclExpression::String(key)) => key.value().clone(),
                    ObjectKey::Expression(_) => return None,
                };
                Some((key, Expression::new(value.expr().clone(), &self.source)))
            })
            .collect()
    }

    /// Items of a tuple constructor (`[a, b]`)
    pub fn array_items(&self) -> Option<Vec<Expression>> {
        let HclExpression::Array(array) = &self.raw else {
            return None;
        };

        Some(
            array
                .iter()
                .map(|item| Expression::new(item.clone(), &self.source))
                .collect(),
        )
    }

    fn has_variables(&self) -> bool {
        let expression = hcl::Expression::from(self.raw.clone());
        let mut found = false;
        expression.visit_traversals(&mut |_: &hcl::Traversal| found = true);
        found
    }

    fn template_parts(&self) -> Option<Vec<TemplatePart>> {
        let elements: Vec<&Element> = match &self.raw {
            HclExpression::StringTemplate(template) => template.iter().collect(),
            HclExpression::HeredocTemplate(heredoc) => heredoc.template.iter().collect(),
            _ => return None,
        };

        let mut parts = Vec::new();
        let mut has_reference = false;
        for element in elements {
            match element {
                Element::Literal(literal) => {
                    parts.push(TemplatePart::Literal(literal.value().clone()))
                }
                Element::Interpolation(interpolation) => {
                    let traversal = self.traversal_of(&interpolation.expr)?;
                    parts.push(TemplatePart::Reference(traversal));
                    has_reference = true;
                }
                Element::Directive(_) => return None,
            }
        }

        has_reference.then_some(parts)
    }

    fn traversal_of(&self, expression: &HclExpression) -> Option<Traversal> {
        match expression {
            HclExpression::Variable(variable) => {
                let range = self.source.range_of(variable);
                Some(Traversal {
                    root: variable.value().to_string(),
                    steps: vec![],
                    range: range.clone(),
                    root_range: range.clone(),
                    rel_range: range,
                })
            }
            HclExpression::Traversal(traversal) => {
                let HclExpression::Variable(variable) = &traversal.expr else {
                    return None;
                };

                let steps = traversal
                    .operators
                    .iter()
                    .map(|operator| path_step(operator.value()))
                    .collect::<Option<Vec<_>>>()?;

                let range = self.source.range_of(expression);
                let root_range = self.source.range_of(variable);
                let rel_range = match traversal.operators.is_empty() {
                    true => root_range.clone(),
                    false => SourceRange {
                        filename: range.filename.clone(),
                        start: root_range.end,
                        end: range.end,
                    },
                };

                Some(Traversal {
                    root: variable.value().to_string(),
                    steps,
                    range,
                    root_range,
                    rel_range,
                })
            }
            _ => None,
        }
    }
}

fn path_step(operator: &TraversalOperator) -> Option<PathStep> {
    match operator {
        TraversalOperator::GetAttr(name) => Some(PathStep::Attr(name.value().to_string())),
        TraversalOperator::Index(HclExpression::Number(number)) => {
            let index = number.value().as_u64()?;
            usize::try_from(index).ok().map(PathStep::Index)
        }
        TraversalOperator::Index(HclExpression::String(key)) => {
            Some(PathStep::Attr(key.value().clone()))
        }
        TraversalOperator::LegacyIndex(index) => {
            usize::try_from(*index.value()).ok().map(PathStep::Index)
        }
        _ => None,
    }
}
