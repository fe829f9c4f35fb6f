//! Constant propagation.
//!
//! A [`Cloner`] that folds whatever bottomed out to compile-time values:
//! binary and unary operators, casts, swizzles, conditional expressions,
//! and branches whose conditions are known. Everything it cannot fold is
//! copied unchanged, so running the pass is always safe.
//!
//! Folding reuses the operator semantics of [`nzsl_ast::value::ops`]; a
//! zero division or modulo discovered while folding aborts the pass with
//! the offending operands rendered in the message.

use nzsl_ast::ast::*;
use nzsl_ast::cloner::Cloner;
use nzsl_ast::error::Result;
use nzsl_ast::foundation::SourceLocation;
use nzsl_ast::module::Module;
use nzsl_ast::resolve_alias;
use nzsl_ast::types::ExpressionType;
use nzsl_ast::value::{ops, ConstantValue};
use tracing::debug;

/// Callback resolving a constant reference to its value.
pub type ConstantQuery<'a> = dyn Fn(usize) -> Option<ConstantValue> + 'a;

/// Options for a propagation run.
#[derive(Default)]
pub struct PropagationOptions<'a> {
    /// Resolves `ConstantExpression` references; `None` leaves them alone
    pub constant_query: Option<Box<ConstantQuery<'a>>>,
}

/// Fold constants across a whole module.
pub fn propagate_constants(module: &Module) -> Result<Module> {
    propagate_constants_with(module, PropagationOptions::default())
}

/// Fold constants across a whole module, resolving constant references
/// through the provided options.
pub fn propagate_constants_with(module: &Module, options: PropagationOptions) -> Result<Module> {
    debug!(module = %module.metadata.module_name, "propagating constants");

    let mut visitor = ConstantPropagation { options };

    let mut statements = Vec::with_capacity(module.root_node.statements.len());
    for statement in &module.root_node.statements {
        statements.push(visitor.clone_statement(statement)?);
    }

    Ok(Module {
        metadata: module.metadata.clone(),
        imported_modules: module.imported_modules.clone(),
        root_node: MultiStatement {
            statements,
            source_location: module.root_node.source_location.clone(),
        },
    })
}

/// Fold constants in a single expression.
pub fn propagate_expression(expr: &Expression, options: PropagationOptions) -> Result<Expression> {
    ConstantPropagation { options }.clone_expression(expr)
}

/// Fold constants in a single statement.
pub fn propagate_statement(stmt: &Statement, options: PropagationOptions) -> Result<Statement> {
    ConstantPropagation { options }.clone_statement(stmt)
}

struct ConstantPropagation<'a> {
    options: PropagationOptions<'a>,
}

/// The folded value of an already-propagated expression.
fn constant_of(expr: &Expression) -> Option<&ConstantValue> {
    match expr {
        Expression::ConstantValue(node) => Some(&node.value),
        _ => None,
    }
}

/// Wrap a folded value, preserving the type the sanitizer computed.
fn folded(value: ConstantValue, original_type: Option<&ExpressionType>, location: &SourceLocation) -> Expression {
    let cached_type = original_type.cloned().or_else(|| Some(value.type_of()));
    Expression::ConstantValue(ConstantValueExpression {
        value,
        cached_type,
        source_location: location.clone(),
    })
}

impl Cloner for ConstantPropagation<'_> {
    fn clone_binary(&mut self, node: &BinaryExpression) -> Result<Expression> {
        let left = self.clone_expression(&node.left)?;
        let right = self.clone_expression(&node.right)?;

        if let (Some(lhs), Some(rhs)) = (constant_of(&left), constant_of(&right)) {
            match ops::binary(node.op, lhs, rhs)
                .map_err(|kind| kind.at(node.source_location.clone()))?
            {
                Some(value) => {
                    return Ok(folded(
                        value,
                        node.cached_type.as_ref(),
                        &node.source_location,
                    ))
                }
                None => {}
            }
        }

        Ok(Expression::Binary(BinaryExpression {
            op: node.op,
            left: Box::new(left),
            right: Box::new(right),
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_unary(&mut self, node: &UnaryExpression) -> Result<Expression> {
        let expression = self.clone_expression(&node.expression)?;

        if let Some(operand) = constant_of(&expression) {
            if let Some(value) = ops::unary(node.op, operand) {
                return Ok(folded(
                    value,
                    node.cached_type.as_ref(),
                    &node.source_location,
                ));
            }
        }

        Ok(Expression::Unary(UnaryExpression {
            op: node.op,
            expression: Box::new(expression),
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_cast(&mut self, node: &CastExpression) -> Result<Expression> {
        let mut expressions = Vec::with_capacity(node.expressions.len());
        for expr in &node.expressions {
            expressions.push(self.clone_expression(expr)?);
        }

        if let ExpressionValue::Value(target) = &node.target_type {
            let operands: Option<Vec<ConstantValue>> = expressions
                .iter()
                .map(|e| constant_of(e).cloned())
                .collect();

            if let Some(operands) = operands {
                if let Some(value) = ops::cast(resolve_alias(target), &operands) {
                    return Ok(folded(
                        value,
                        node.cached_type.as_ref(),
                        &node.source_location,
                    ));
                }
            }
        }

        Ok(Expression::Cast(CastExpression {
            target_type: node.target_type.clone(),
            expressions,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_swizzle(&mut self, node: &SwizzleExpression) -> Result<Expression> {
        let expression = self.clone_expression(&node.expression)?;

        if let Some(operand) = constant_of(&expression) {
            if let Some(value) = ops::swizzle(operand, node.active_components()) {
                return Ok(folded(
                    value,
                    node.cached_type.as_ref(),
                    &node.source_location,
                ));
            }
        }

        Ok(Expression::Swizzle(SwizzleExpression {
            expression: Box::new(expression),
            components: node.components,
            component_count: node.component_count,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_conditional(&mut self, node: &ConditionalExpression) -> Result<Expression> {
        let condition = self.clone_expression(&node.condition)?;

        if let Some(value) = constant_of(&condition).and_then(|v| v.as_bool()) {
            return if value {
                self.clone_expression(&node.true_path)
            } else {
                self.clone_expression(&node.false_path)
            };
        }

        Ok(Expression::Conditional(ConditionalExpression {
            condition: Box::new(condition),
            true_path: Box::new(self.clone_expression(&node.true_path)?),
            false_path: Box::new(self.clone_expression(&node.false_path)?),
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_constant(&mut self, node: &ConstantExpression) -> Result<Expression> {
        if let Some(query) = &self.options.constant_query {
            if let Some(value) = query(node.constant_id) {
                return Ok(folded(
                    value,
                    node.cached_type.as_ref(),
                    &node.source_location,
                ));
            }
        }

        Ok(Expression::Constant(node.clone()))
    }

    fn clone_branch(&mut self, node: &BranchStatement) -> Result<Statement> {
        // drop leading arms with false conditions; select an arm whose
        // condition folds to true; stop folding at the first unknown
        let mut remaining = Vec::new();
        let mut reached_unknown = false;

        for arm in &node.cond_statements {
            let condition = self.clone_expression(&arm.condition)?;

            if !reached_unknown {
                match constant_of(&condition).and_then(|v| v.as_bool()) {
                    Some(false) => continue,
                    Some(true) => {
                        if remaining.is_empty() {
                            // first live arm is statically taken
                            return Ok(unscope(self.clone_statement(&arm.statement)?));
                        }
                        // a later arm that is always reached becomes the
                        // else of what remains
                        return Ok(Statement::Branch(BranchStatement {
                            cond_statements: remaining,
                            else_statement: Some(Box::new(
                                unscope(self.clone_statement(&arm.statement)?),
                            )),
                            is_const: false,
                            source_location: node.source_location.clone(),
                        }));
                    }
                    None => reached_unknown = true,
                }
            }

            remaining.push(ConditionalBranch {
                condition,
                statement: self.clone_statement(&arm.statement)?,
            });
        }

        let else_statement = match &node.else_statement {
            Some(else_statement) => Some(self.clone_statement(else_statement)?),
            None => None,
        };

        if remaining.is_empty() {
            // no arm can ever be taken
            return Ok(match else_statement {
                Some(else_statement) => unscope(else_statement),
                None => Statement::NoOp(NoOpStatement {
                    source_location: node.source_location.clone(),
                }),
            });
        }

        Ok(Statement::Branch(BranchStatement {
            cond_statements: remaining,
            else_statement: else_statement.map(Box::new),
            is_const: node.is_const && reached_unknown,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_conditional_statement(&mut self, node: &ConditionalStatement) -> Result<Statement> {
        let condition = self.clone_expression(&node.condition)?;

        match constant_of(&condition).and_then(|v| v.as_bool()) {
            Some(true) => self.clone_statement(&node.statement),
            Some(false) => Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            })),
            None => Ok(Statement::Conditional(ConditionalStatement {
                condition,
                statement: Box::new(self.clone_statement(&node.statement)?),
                source_location: node.source_location.clone(),
            })),
        }
    }
}

/// A statically selected branch body splices in place of the branch; drop
/// its scope wrapper so declarations merge into the surrounding block.
fn unscope(statement: Statement) -> Statement {
    match statement {
        Statement::Scoped(scoped) => *scoped.statement,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::builder;
    use nzsl_ast::foundation::Vector4;

    fn fold(expr: &Expression) -> Expression {
        propagate_expression(expr, PropagationOptions::default()).unwrap()
    }

    #[test]
    fn test_binary_fold() {
        // 21 * 2
        let expr = builder::binary(
            BinaryOp::Multiply,
            builder::constant(ConstantValue::I32(21)),
            builder::constant(ConstantValue::I32(2)),
        );
        assert_eq!(
            constant_of(&fold(&expr)),
            Some(&ConstantValue::I32(42))
        );
    }

    #[test]
    fn test_division_by_folded_zero() {
        // 21 * 2 / (9 - 3 * 3)
        let expr = builder::binary(
            BinaryOp::Divide,
            builder::binary(
                BinaryOp::Multiply,
                builder::constant(ConstantValue::I32(21)),
                builder::constant(ConstantValue::I32(2)),
            ),
            builder::binary(
                BinaryOp::Subtract,
                builder::constant(ConstantValue::I32(9)),
                builder::binary(
                    BinaryOp::Multiply,
                    builder::constant(ConstantValue::I32(3)),
                    builder::constant(ConstantValue::I32(3)),
                ),
            ),
        );

        let error = propagate_expression(&expr, PropagationOptions::default()).unwrap_err();
        assert!(error.to_string().contains("(42 / 0)"), "{}", error);
    }

    #[test]
    fn test_swizzle_of_constant_vector() {
        // vec4[f32](3, 0, 1, 2).yzwx → (0, 1, 2, 3)
        let expr = builder::swizzle(
            builder::constant(ConstantValue::Vec4F32(Vector4::new(3.0, 0.0, 1.0, 2.0))),
            &[1, 2, 3, 0],
        );

        assert_eq!(
            constant_of(&fold(&expr)),
            Some(&ConstantValue::Vec4F32(Vector4::new(0.0, 1.0, 2.0, 3.0)))
        );
    }

    #[test]
    fn test_conditional_selection() {
        let expr = builder::conditional(
            builder::constant(ConstantValue::Bool(false)),
            builder::constant(ConstantValue::I32(1)),
            builder::constant(ConstantValue::I32(2)),
        );
        assert_eq!(constant_of(&fold(&expr)), Some(&ConstantValue::I32(2)));
    }

    #[test]
    fn test_constant_query() {
        let expr = Expression::Constant(ConstantExpression {
            constant_id: 7,
            cached_type: None,
            source_location: SourceLocation::unknown(),
        });

        let options = PropagationOptions {
            constant_query: Some(Box::new(|id| {
                (id == 7).then(|| ConstantValue::F32(1.5))
            })),
        };
        let result = propagate_expression(&expr, options).unwrap();
        assert_eq!(constant_of(&result), Some(&ConstantValue::F32(1.5)));
    }

    #[test]
    fn test_branch_folding() {
        // if (false) { 1; } else if (true) { 2; } else { 3; }
        let branch = builder::branch(
            vec![
                (
                    builder::constant(ConstantValue::Bool(false)),
                    builder::expression_statement(builder::constant(ConstantValue::I32(1))),
                ),
                (
                    builder::constant(ConstantValue::Bool(true)),
                    builder::expression_statement(builder::constant(ConstantValue::I32(2))),
                ),
            ],
            Some(builder::expression_statement(builder::constant(
                ConstantValue::I32(3),
            ))),
        );

        let result =
            propagate_statement(&branch, PropagationOptions::default()).unwrap();
        match result {
            Statement::Expression(stmt) => {
                assert_eq!(constant_of(&stmt.expression), Some(&ConstantValue::I32(2)));
            }
            other => panic!("expected the second arm body, got {:?}", other.node_kind()),
        }
    }

    #[test]
    fn test_branch_with_unknown_condition_is_kept() {
        let branch = builder::branch(
            vec![(
                builder::identifier("runtime"),
                builder::expression_statement(builder::constant(ConstantValue::I32(1))),
            )],
            None,
        );

        let result =
            propagate_statement(&branch, PropagationOptions::default()).unwrap();
        assert!(matches!(result, Statement::Branch(_)));
    }

    #[test]
    fn test_dead_branch_becomes_noop() {
        let branch = builder::branch(
            vec![(
                builder::constant(ConstantValue::Bool(false)),
                builder::expression_statement(builder::constant(ConstantValue::I32(1))),
            )],
            None,
        );

        let result =
            propagate_statement(&branch, PropagationOptions::default()).unwrap();
        assert!(matches!(result, Statement::NoOp(_)));
    }
}
