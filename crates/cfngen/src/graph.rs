//! the resource graph
//!
//! [Graph::decode] runs the whole frontend on a set of [Documents]:
//!
//! 1. decode the resource blocks against the schema of their type
//! 2. evaluate static expressions and extract [Reference]s to other resources
//! 3. validate every reference against the declared resources
//!
//! Each stage only runs when the previous one produced no errors. The collected diagnostics
//! are always returned, a [Graph] only when there were no errors at all.
use crate::decode::Decoder;
use crate::diagnostic::{Diagnostics, SourceRange};
use crate::documents::Documents;
use crate::evaluate::{self, Accumulator};
use crate::expression::{Expression, FieldPath};
use crate::registry::Registry;
use crate::schema::TypeDescriptor;
use crate::validate;
use crate::value::Value;
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

/// A field of a resource that is defined in terms of another resource
#[derive(Debug, Clone, derive_new::new)]
pub struct Reference {
    path: FieldPath,
    expression: Expression,
}

impl Reference {
    /// Path of the field within the resource declaring the reference
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn expression(&self) -> &Expression {
        &self.expression
    }
}

/// Source code declared with a `source` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCode {
    /// resolved relative to the file declaring the resource
    pub dir: PathBuf,
    pub definition: SourceRange,
}

#[derive(Debug, Clone, derive_new::new)]
pub struct Resource {
    name: String,
    descriptor: Arc<TypeDescriptor>,
    value: Value,
    references: Vec<Reference>,
    definition: SourceRange,
    source_code: Option<SourceCode>,
}

impl Resource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Input values, fields set by references are [Value::Unknown]
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Reference at exactly `path`
    pub fn reference_at(&self, path: &FieldPath) -> Option<&Reference> {
        self.references
            .iter()
            .find(|reference| reference.path() == path)
    }

    /// Range of the `resource "name"` header
    pub fn definition(&self) -> &SourceRange {
        &self.definition
    }

    pub fn source_code(&self) -> Option<&SourceCode> {
        self.source_code.as_ref()
    }
}

/// Resources keyed by their declared name, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Graph {
    resources: IndexMap<String, Resource>,
}

impl Graph {
    /// Decodes, evaluates and validates all resources in `documents`
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn decode(documents: &Documents, registry: &Registry) -> (Option<Graph>, Diagnostics) {
        let (raw_resources, mut diagnostics) = Decoder::new(registry).decode(documents);
        if diagnostics.has_errors() {
            tracing::debug!(errors = diagnostics.errors().count(), "decode failed");
            return (None, diagnostics);
        }

        let mut graph = Graph::default();
        for raw in raw_resources {
            let mut accumulator = Accumulator::default();
            let value = evaluate::evaluate(raw.value, raw.descriptor.schema(), &mut accumulator);
            diagnostics.append(accumulator.diagnostics);

            graph.insert(Resource::new(
                raw.name,
                raw.descriptor,
                value,
                accumulator.references,
                raw.definition,
                raw.source_code,
            ));
        }
        if diagnostics.has_errors() {
            tracing::debug!(errors = diagnostics.errors().count(), "evaluation failed");
            return (None, diagnostics);
        }

        diagnostics.append(validate::validate(&graph));
        if diagnostics.has_errors() {
            tracing::debug!(errors = diagnostics.errors().count(), "validation failed");
            return (None, diagnostics);
        }

        tracing::debug!(resources = graph.len(), "graph decoded");
        (Some(graph), diagnostics)
    }

    /// Adds a resource, replacing and returning any resource with the same name
    pub fn insert(&mut self, resource: Resource) -> Option<Resource> {
        self.resources.insert(resource.name.clone(), resource)
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Resources in declaration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Resources in lexicographic name order
    pub fn sorted(&self) -> Vec<&Resource> {
        let mut resources: Vec<&Resource> = self.resources.values().collect();
        resources.sort_by(|a, b| a.name.cmp(&b.name));
        resources
    }

    pub fn of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a Resource> {
        self.resources()
            .filter(move |resource| resource.type_name() == type_name)
    }

    /// Resources that declared a `source` block
    pub fn with_source_code(&self) -> impl Iterator<Item = (&Resource, &SourceCode)> {
        self.resources()
            .filter_map(|resource| Some((resource, resource.source_code()?)))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl FromIterator<Resource> for Graph {
    fn from_iter<T: IntoIterator<Item = Resource>>(iter: T) -> Self {
        let mut graph = Graph::default();
        for resource in iter {
            graph.insert(resource);
        }
        graph
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::documents;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn decode(documents: &Documents) -> (Option<Graph>, Diagnostics) {
        Graph::decode(documents, &testing::registry())
    }

    #[test]
    fn decode_graph() {
        let documents = documents! {
            "main.hcl" => r#"
resource "role" {
  type = "aws:iam_role"

  assume_role_policy {
    statement {
      effect = "Allow"
      action = ["sts:AssumeRole"]
    }
  }
}

resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = role.arn

  source {
    dir = "./func"
  }
}
"#
        };

        let (graph, diagnostics) = decode(&documents);
        assert!(diagnostics.is_empty(), "{diagnostics}");

        let graph = graph.unwrap();
        assert_eq!(graph.len(), 2);

        let names: Vec<_> = graph.resources().map(Resource::name).collect();
        assert_eq!(names, vec!["role", "func"]);
        let sorted: Vec<_> = graph.sorted().into_iter().map(Resource::name).collect();
        assert_eq!(sorted, vec!["func", "role"]);

        let func = graph.get("func").unwrap();
        assert_eq!(func.type_name(), "aws:lambda_function");
        assert_eq!(func.references().len(), 1);
        assert!(func
            .reference_at(&FieldPath::attrs(["role"]))
            .is_some());
        assert_eq!(func.value().get_attr("role"), Some(&Value::Unknown));

        let with_source: Vec<_> = graph
            .with_source_code()
            .map(|(resource, _)| resource.name())
            .collect();
        assert_eq!(with_source, vec!["func"]);
        assert_eq!(graph.of_type("aws:iam_role").count(), 1);
    }

    #[test]
    fn decode_errors_stop_evaluation() {
        let documents = documents! {r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = "role"
  timeout = "soon"
  nope    = 1
}
"#};

        let (graph, diagnostics) = decode(&documents);
        assert!(graph.is_none());

        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Unsupported argument"]);
    }

    #[test]
    fn evaluation_errors_stop_validation() {
        let documents = documents! {r#"
resource "func" {
  type    = "aws:lambda_function"
  handler = "index.handler"
  runtime = "nodejs10.x"
  role    = nope.arn
  timeout = "soon"
}
"#};

        let (graph, diagnostics) = decode(&documents);
        assert!(graph.is_none());

        let summaries: Vec<_> = diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Incorrect attribute value type"]);
    }

    #[test]
    fn warnings_do_not_block() {
        let documents = documents! {r#"
resource "func" {
  type        = "aws:lambda_function"
  handler     = "index.handler"
  runtime     = "nodejs10.x"
  role        = "role"
  memory_size = "128"
}
"#};

        let (graph, diagnostics) = decode(&documents);
        assert!(graph.is_some());
        assert_eq!(diagnostics.warnings().count(), 1);
        assert!(!diagnostics.has_errors());
    }

    #[test]
    fn empty() {
        let (graph, diagnostics) = decode(&documents!(""));
        assert!(diagnostics.is_empty());
        assert!(graph.unwrap().is_empty());
    }
}
