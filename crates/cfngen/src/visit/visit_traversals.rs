use super::Visit;
use hcl::{
    template::{Directive, Element},
    Expression, Operation, Template, Traversal, TraversalOperator,
};

/// Recursively visit all [hcl::Traversal]s
///
/// Function arguments, template interpolations and directives, operators and
/// `for` expressions are all descended into.
pub trait VisitTraversals {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>);
}

impl VisitTraversals for Expression {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        match self {
            Expression::Variable(variable) => {
                // a standalone variable is a traversal with no operators...kind of
                let traversal = Traversal::new(
                    Expression::Variable(variable.clone()),
                    Vec::<TraversalOperator>::new(),
                );
                visitor.visit(&traversal);
            }
            Expression::Traversal(traversal) => {
                visitor.visit(traversal);
                for operator in &traversal.operators {
                    if let TraversalOperator::Index(index) = operator {
                        index.visit_traversals(visitor);
                    }
                }
                if !matches!(traversal.expr, Expression::Variable(_)) {
                    traversal.expr.visit_traversals(visitor);
                }
            }
            Expression::Array(array) => {
                for expr in array {
                    expr.visit_traversals(visitor);
                }
            }
            Expression::Object(object) => {
                for value in object.values() {
                    value.visit_traversals(visitor);
                }
            }
            Expression::TemplateExpr(template_expr) => {
                if let Ok(template) = Template::from_expr(template_expr) {
                    template.visit_traversals(visitor);
                }
            }
            Expression::FuncCall(func_call) => {
                for arg in &func_call.args {
                    arg.visit_traversals(visitor);
                }
            }
            Expression::Parenthesis(expr) => {
                expr.visit_traversals(visitor);
            }
            Expression::Conditional(cond) => {
                cond.cond_expr.visit_traversals(visitor);
                cond.true_expr.visit_traversals(visitor);
                cond.false_expr.visit_traversals(visitor);
            }
            Expression::Operation(operation) => match operation.as_ref() {
                Operation::Binary(binop) => {
                    binop.lhs_expr.visit_traversals(visitor);
                    binop.rhs_expr.visit_traversals(visitor);
                }
                Operation::Unary(unop) => {
                    unop.expr.visit_traversals(visitor);
                }
            },
            Expression::ForExpr(forexpr) => {
                forexpr.collection_expr.visit_traversals(visitor);

                // iterator variables are local to the for expression
                let locals: Vec<&str> = forexpr
                    .key_var
                    .iter()
                    .chain(std::iter::once(&forexpr.value_var))
                    .map(|local| local.as_str())
                    .collect();
                let mut free = |traversal: &Traversal| match &traversal.expr {
                    Expression::Variable(variable) if locals.contains(&variable.as_str()) => {}
                    _ => visitor.visit(traversal),
                };

                forexpr
                    .cond_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(&mut free));
                forexpr
                    .key_expr
                    .iter()
                    .for_each(|e| e.visit_traversals(&mut free));
                forexpr.value_expr.visit_traversals(&mut free);
            }
            _ => {}
        }
    }
}

impl VisitTraversals for Template {
    fn visit_traversals(&self, visitor: &mut dyn Visit<Traversal>) {
        for element in self.elements() {
            match element {
                Element::Interpolation(interpolation) => {
                    interpolation.expr.visit_traversals(visitor);
                }
                Element::Directive(directive) => match directive {
                    Directive::If(ifdir) => {
                        ifdir.cond_expr.visit_traversals(visitor);
                        ifdir.true_template.visit_traversals(visitor);
                        ifdir
                            .false_template
                            .iter()
                            .for_each(|t| t.visit_traversals(visitor));
                    }
                    Directive::For(fordir) => {
                        fordir.template.visit_traversals(visitor);
                        fordir.collection_expr.visit_traversals(visitor);
                    }
                },
                Element::Literal(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn roots(source: &str) -> Vec<String> {
        let body: hcl::Body = hcl::from_str(&format!("value = {source}")).unwrap();
        let attribute = body.into_attributes().next().unwrap();

        let mut roots = Vec::new();
        attribute.expr.visit_traversals(&mut |traversal: &Traversal| {
            if let Expression::Variable(variable) = &traversal.expr {
                roots.push(variable.to_string());
            }
        });
        roots
    }

    #[test]
    fn finds_variables() {
        assert_eq!(roots("a"), vec!["a"]);
        assert_eq!(roots("a.b[0]"), vec!["a"]);
        assert_eq!(roots("\"x-${a.b}-${c}\""), vec!["a", "c"]);
        assert_eq!(roots("upper(a.name)"), vec!["a"]);
        assert_eq!(roots("x ? [y] : { k = z }"), vec!["x", "y", "z"]);
        assert_eq!(roots("[for s in xs : s.name if s != y]"), vec!["xs", "y"]);
        assert_eq!(roots("{ for k, v in m : k => v }"), vec!["m"]);
    }

    #[test]
    fn ignores_literals() {
        assert!(roots("\"plain\"").is_empty());
        assert!(roots("[1, 2, { a = true }]").is_empty());
        assert!(roots("upper(\"x\")").is_empty());
        assert!(roots("[for s in [\"a\", \"b\"] : s]").is_empty());
    }
}
