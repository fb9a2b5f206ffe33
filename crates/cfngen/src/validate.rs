//! validation of references between resources
//!
//! Every traversal of every [Reference](crate::graph::Reference) must point at a field that
//! will have a value at deploy time:
//! - an output of the referenced resource (known once it is created)
//! - an input of the referenced resource that is set
//!
//! The graph is not modified. Resources are checked in name order so that diagnostics are
//! stable.
use crate::cloudformation::name::normalize;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::expression::{Expression, PathStep, Traversal};
use crate::graph::{Graph, Resource};
use crate::value::Value;
use std::collections::HashMap;

#[tracing::instrument(level = "trace", skip_all)]
pub(crate) fn validate(graph: &Graph) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    check_identifiers(graph, &mut diagnostics);

    for resource in graph.sorted() {
        for reference in resource.references() {
            let expression = reference.expression();
            for traversal in expression.traversals() {
                if let Err(diagnostic) = check_traversal(graph, expression, &traversal) {
                    diagnostics.push(diagnostic);
                }
            }
        }
    }

    diagnostics
}

/// Declared names must map to distinct template identifiers
fn check_identifiers(graph: &Graph, diagnostics: &mut Diagnostics) {
    let mut identifiers: HashMap<String, &Resource> = HashMap::new();

    for resource in graph.sorted() {
        let identifier = normalize(resource.name());
        if identifier.is_empty() {
            diagnostics.push(
                Diagnostic::error("Invalid resource name")
                    .with_detail(format!(
                        "The name {:?} must contain at least one letter or digit.",
                        resource.name()
                    ))
                    .with_subject(resource.definition().clone()),
            );
            continue;
        }

        if let Some(previous) = identifiers.get(&identifier) {
            diagnostics.push(
                Diagnostic::error("Conflicting resource identifiers")
                    .with_detail(format!(
                        "The resources {:?} and {:?} would both be named {identifier:?} in the template.",
                        previous.name(),
                        resource.name()
                    ))
                    .with_subject(resource.definition().clone())
                    .with_context(previous.definition().clone()),
            );
            continue;
        }

        identifiers.insert(identifier, resource);
    }
}

/// What a traversal resolves to in the referenced resource
#[derive(Debug, PartialEq, Eq)]
enum Resolution {
    Valid,
    NoSuchField,
    Unset,
}

fn check_traversal(
    graph: &Graph,
    expression: &Expression,
    traversal: &Traversal,
) -> Result<(), Diagnostic> {
    let Some(target) = graph.get(&traversal.root) else {
        return Err(Diagnostic::error("No such resource")
            .with_detail(format!(
                "A resource named {:?} has not been declared.",
                traversal.root
            ))
            .with_subject(traversal.root_range.clone())
            .with_expression(expression.clone()));
    };

    match resolve(target, &traversal.steps) {
        Resolution::Valid => Ok(()),
        Resolution::NoSuchField => Err(Diagnostic::error("Invalid reference")
            .with_detail(format!(
                "The resource {:?} ({}) does not have such a field.",
                target.name(),
                target.type_name()
            ))
            .with_subject(traversal.rel_range.clone())
            .with_expression(expression.clone())),
        Resolution::Unset => Err(Diagnostic::error("Input value not set")
            .with_detail(format!(
                "A value has not been set for this field in {:?}.",
                target.name()
            ))
            .with_subject(traversal.range.clone())
            .with_expression(expression.clone())),
    }
}

/// Resolves `steps` against the outputs of `target`, then against its inputs
fn resolve(target: &Resource, steps: &[PathStep]) -> Resolution {
    // the resource itself
    let Some((first, rest)) = steps.split_first() else {
        return Resolution::Valid;
    };
    let PathStep::Attr(name) = first else {
        return Resolution::NoSuchField;
    };

    let schema = target.descriptor().schema();
    let field = match (schema.output_field(name), schema.input_field(name)) {
        (Some(output), _) => output,
        (None, Some(input)) => input,
        (None, None) => return Resolution::NoSuchField,
    };

    let shape_resolves = rest
        .iter()
        .try_fold(field.shape(), |shape, step| shape.step(step))
        .is_some();
    if !shape_resolves {
        return Resolution::NoSuchField;
    }

    if schema.output_field(name).is_some() {
        return Resolution::Valid;
    }

    let mut value = target.value().get(first);
    for step in rest {
        match value {
            None => return Resolution::NoSuchField,
            Some(Value::Null) => return Resolution::Unset,
            Some(Value::Unknown) => return Resolution::Valid,
            Some(current) => value = current.get(step),
        }
    }

    match value {
        None => Resolution::NoSuchField,
        Some(Value::Null) => Resolution::Unset,
        Some(_) => Resolution::Valid,
    }
}
