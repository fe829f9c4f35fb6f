//! Deep cloning with per-variant override points.
//!
//! [`Cloner`] is the backbone of every rewriting pass: the default method
//! for each variant produces a field-for-field deep copy — cached types and
//! source locations included — recursing through `clone_expression` /
//! `clone_statement` so that an override anywhere in the tree takes effect
//! at every depth. A pass implements `Cloner` and overrides only the
//! variants it rewrites; everything else round-trips bit-for-bit.
//!
//! All methods are fallible: rewriting passes report their first error
//! through the same channel the traversal uses.

use crate::ast::*;
use crate::error::Result;
use crate::types::ExpressionType;

/// Clone the expression branch of an [`ExpressionValue`] through a cloner,
/// copying resolved values as-is.
pub fn clone_expression_value<C, T>(cloner: &mut C, value: &ExpressionValue<T>) -> Result<ExpressionValue<T>>
where
    C: Cloner + ?Sized,
    T: Clone,
{
    Ok(match value {
        ExpressionValue::Unset => ExpressionValue::Unset,
        ExpressionValue::Value(v) => ExpressionValue::Value(v.clone()),
        ExpressionValue::Expression(expr) => {
            ExpressionValue::Expression(Box::new(cloner.clone_expression(expr)?))
        }
    })
}

/// Deep-copying visitor with one override point per variant.
pub trait Cloner {
    /// Dispatch on the concrete expression variant.
    fn clone_expression(&mut self, expr: &Expression) -> Result<Expression> {
        match expr {
            Expression::AccessIdentifier(node) => self.clone_access_identifier(node),
            Expression::AccessIndex(node) => self.clone_access_index(node),
            Expression::AliasValue(node) => self.clone_alias_value(node),
            Expression::Assign(node) => self.clone_assign(node),
            Expression::Binary(node) => self.clone_binary(node),
            Expression::CallFunction(node) => self.clone_call_function(node),
            Expression::CallMethod(node) => self.clone_call_method(node),
            Expression::Cast(node) => self.clone_cast(node),
            Expression::Conditional(node) => self.clone_conditional(node),
            Expression::Constant(node) => self.clone_constant(node),
            Expression::ConstantValue(node) => self.clone_constant_value(node),
            Expression::Function(node) => self.clone_function(node),
            Expression::Identifier(node) => self.clone_identifier(node),
            Expression::Intrinsic(node) => self.clone_intrinsic(node),
            Expression::IntrinsicFunction(node) => self.clone_intrinsic_function(node),
            Expression::StructType(node) => self.clone_struct_type(node),
            Expression::Swizzle(node) => self.clone_swizzle(node),
            Expression::Type(node) => self.clone_type(node),
            Expression::Unary(node) => self.clone_unary(node),
            Expression::VariableValue(node) => self.clone_variable_value(node),
        }
    }

    /// Dispatch on the concrete statement variant.
    fn clone_statement(&mut self, stmt: &Statement) -> Result<Statement> {
        match stmt {
            Statement::Branch(node) => self.clone_branch(node),
            Statement::Break(node) => self.clone_break(node),
            Statement::Conditional(node) => self.clone_conditional_statement(node),
            Statement::Continue(node) => self.clone_continue(node),
            Statement::DeclareAlias(node) => self.clone_declare_alias(node),
            Statement::DeclareConst(node) => self.clone_declare_const(node),
            Statement::DeclareExternal(node) => self.clone_declare_external(node),
            Statement::DeclareFunction(node) => self.clone_declare_function(node),
            Statement::DeclareOption(node) => self.clone_declare_option(node),
            Statement::DeclareStruct(node) => self.clone_declare_struct(node),
            Statement::DeclareVariable(node) => self.clone_declare_variable(node),
            Statement::Discard(node) => self.clone_discard(node),
            Statement::Expression(node) => self.clone_expression_statement(node),
            Statement::For(node) => self.clone_for(node),
            Statement::ForEach(node) => self.clone_for_each(node),
            Statement::Import(node) => self.clone_import(node),
            Statement::Multi(node) => self.clone_multi(node),
            Statement::NoOp(node) => self.clone_no_op(node),
            Statement::Return(node) => self.clone_return(node),
            Statement::Scoped(node) => self.clone_scoped(node),
            Statement::While(node) => self.clone_while(node),
        }
    }

    /// Clone a boxed child expression.
    fn clone_expression_box(&mut self, expr: &Expression) -> Result<Box<Expression>> {
        Ok(Box::new(self.clone_expression(expr)?))
    }

    /// Clone a boxed child statement.
    fn clone_statement_box(&mut self, stmt: &Statement) -> Result<Box<Statement>> {
        Ok(Box::new(self.clone_statement(stmt)?))
    }

    /// Clone a list of child expressions.
    fn clone_expression_list(&mut self, exprs: &[Expression]) -> Result<Vec<Expression>> {
        exprs.iter().map(|e| self.clone_expression(e)).collect()
    }

    /// Clone a list of child statements.
    fn clone_statement_list(&mut self, stmts: &[Statement]) -> Result<Vec<Statement>> {
        stmts.iter().map(|s| self.clone_statement(s)).collect()
    }

    /// Clone an attribute-position type value.
    fn clone_type_value(
        &mut self,
        value: &ExpressionValue<ExpressionType>,
    ) -> Result<ExpressionValue<ExpressionType>> {
        clone_expression_value(self, value)
    }

    // expressions

    fn clone_access_identifier(&mut self, node: &AccessIdentifierExpression) -> Result<Expression> {
        Ok(Expression::AccessIdentifier(AccessIdentifierExpression {
            expr: self.clone_expression_box(&node.expr)?,
            identifiers: node.identifiers.clone(),
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_access_index(&mut self, node: &AccessIndexExpression) -> Result<Expression> {
        Ok(Expression::AccessIndex(AccessIndexExpression {
            expr: self.clone_expression_box(&node.expr)?,
            indices: self.clone_expression_list(&node.indices)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_alias_value(&mut self, node: &AliasValueExpression) -> Result<Expression> {
        Ok(Expression::AliasValue(node.clone()))
    }

    fn clone_assign(&mut self, node: &AssignExpression) -> Result<Expression> {
        Ok(Expression::Assign(AssignExpression {
            op: node.op,
            left: self.clone_expression_box(&node.left)?,
            right: self.clone_expression_box(&node.right)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_binary(&mut self, node: &BinaryExpression) -> Result<Expression> {
        Ok(Expression::Binary(BinaryExpression {
            op: node.op,
            left: self.clone_expression_box(&node.left)?,
            right: self.clone_expression_box(&node.right)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_call_function(&mut self, node: &CallFunctionExpression) -> Result<Expression> {
        Ok(Expression::CallFunction(CallFunctionExpression {
            target_function: self.clone_expression_box(&node.target_function)?,
            parameters: self.clone_expression_list(&node.parameters)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_call_method(&mut self, node: &CallMethodExpression) -> Result<Expression> {
        Ok(Expression::CallMethod(CallMethodExpression {
            object: self.clone_expression_box(&node.object)?,
            method_name: node.method_name.clone(),
            parameters: self.clone_expression_list(&node.parameters)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_cast(&mut self, node: &CastExpression) -> Result<Expression> {
        Ok(Expression::Cast(CastExpression {
            target_type: self.clone_type_value(&node.target_type)?,
            expressions: self.clone_expression_list(&node.expressions)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_conditional(&mut self, node: &ConditionalExpression) -> Result<Expression> {
        Ok(Expression::Conditional(ConditionalExpression {
            condition: self.clone_expression_box(&node.condition)?,
            true_path: self.clone_expression_box(&node.true_path)?,
            false_path: self.clone_expression_box(&node.false_path)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_constant(&mut self, node: &ConstantExpression) -> Result<Expression> {
        Ok(Expression::Constant(node.clone()))
    }

    fn clone_constant_value(&mut self, node: &ConstantValueExpression) -> Result<Expression> {
        Ok(Expression::ConstantValue(node.clone()))
    }

    fn clone_function(&mut self, node: &FunctionExpression) -> Result<Expression> {
        Ok(Expression::Function(node.clone()))
    }

    fn clone_identifier(&mut self, node: &IdentifierExpression) -> Result<Expression> {
        Ok(Expression::Identifier(node.clone()))
    }

    fn clone_intrinsic(&mut self, node: &IntrinsicExpression) -> Result<Expression> {
        Ok(Expression::Intrinsic(IntrinsicExpression {
            intrinsic: node.intrinsic,
            parameters: self.clone_expression_list(&node.parameters)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_intrinsic_function(&mut self, node: &IntrinsicFunctionExpression) -> Result<Expression> {
        Ok(Expression::IntrinsicFunction(node.clone()))
    }

    fn clone_struct_type(&mut self, node: &StructTypeExpression) -> Result<Expression> {
        Ok(Expression::StructType(node.clone()))
    }

    fn clone_swizzle(&mut self, node: &SwizzleExpression) -> Result<Expression> {
        Ok(Expression::Swizzle(SwizzleExpression {
            expression: self.clone_expression_box(&node.expression)?,
            components: node.components,
            component_count: node.component_count,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_type(&mut self, node: &TypeExpression) -> Result<Expression> {
        Ok(Expression::Type(node.clone()))
    }

    fn clone_unary(&mut self, node: &UnaryExpression) -> Result<Expression> {
        Ok(Expression::Unary(UnaryExpression {
            op: node.op,
            expression: self.clone_expression_box(&node.expression)?,
            cached_type: node.cached_type.clone(),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_variable_value(&mut self, node: &VariableValueExpression) -> Result<Expression> {
        Ok(Expression::VariableValue(node.clone()))
    }

    // statements

    fn clone_branch(&mut self, node: &BranchStatement) -> Result<Statement> {
        let mut cond_statements = Vec::with_capacity(node.cond_statements.len());
        for cond in &node.cond_statements {
            cond_statements.push(ConditionalBranch {
                condition: self.clone_expression(&cond.condition)?,
                statement: self.clone_statement(&cond.statement)?,
            });
        }

        let else_statement = match &node.else_statement {
            Some(else_statement) => Some(self.clone_statement_box(else_statement)?),
            None => None,
        };

        Ok(Statement::Branch(BranchStatement {
            cond_statements,
            else_statement,
            is_const: node.is_const,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_break(&mut self, node: &BreakStatement) -> Result<Statement> {
        Ok(Statement::Break(node.clone()))
    }

    fn clone_conditional_statement(&mut self, node: &ConditionalStatement) -> Result<Statement> {
        Ok(Statement::Conditional(ConditionalStatement {
            condition: self.clone_expression(&node.condition)?,
            statement: self.clone_statement_box(&node.statement)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_continue(&mut self, node: &ContinueStatement) -> Result<Statement> {
        Ok(Statement::Continue(node.clone()))
    }

    fn clone_declare_alias(&mut self, node: &DeclareAliasStatement) -> Result<Statement> {
        Ok(Statement::DeclareAlias(DeclareAliasStatement {
            alias_index: node.alias_index,
            name: node.name.clone(),
            expression: self.clone_expression_box(&node.expression)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_const(&mut self, node: &DeclareConstStatement) -> Result<Statement> {
        Ok(Statement::DeclareConst(DeclareConstStatement {
            const_index: node.const_index,
            name: node.name.clone(),
            const_type: self.clone_type_value(&node.const_type)?,
            expression: self.clone_expression_box(&node.expression)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_external(&mut self, node: &DeclareExternalStatement) -> Result<Statement> {
        let mut external_vars = Vec::with_capacity(node.external_vars.len());
        for var in &node.external_vars {
            external_vars.push(ExternalVar {
                var_index: var.var_index,
                name: var.name.clone(),
                var_type: self.clone_type_value(&var.var_type)?,
                binding_index: clone_expression_value(self, &var.binding_index)?,
                binding_set: clone_expression_value(self, &var.binding_set)?,
                source_location: var.source_location.clone(),
            });
        }

        Ok(Statement::DeclareExternal(DeclareExternalStatement {
            binding_set: clone_expression_value(self, &node.binding_set)?,
            external_vars,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_function(&mut self, node: &DeclareFunctionStatement) -> Result<Statement> {
        let mut parameters = Vec::with_capacity(node.parameters.len());
        for parameter in &node.parameters {
            parameters.push(FunctionParameter {
                var_index: parameter.var_index,
                name: parameter.name.clone(),
                param_type: self.clone_type_value(&parameter.param_type)?,
                source_location: parameter.source_location.clone(),
            });
        }

        Ok(Statement::DeclareFunction(DeclareFunctionStatement {
            func_index: node.func_index,
            name: node.name.clone(),
            parameters,
            statements: self.clone_statement_list(&node.statements)?,
            return_type: self.clone_type_value(&node.return_type)?,
            entry_stage: clone_expression_value(self, &node.entry_stage)?,
            depth_write: clone_expression_value(self, &node.depth_write)?,
            early_fragment_tests: clone_expression_value(self, &node.early_fragment_tests)?,
            is_exported: clone_expression_value(self, &node.is_exported)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_option(&mut self, node: &DeclareOptionStatement) -> Result<Statement> {
        let default_value = match &node.default_value {
            Some(default_value) => Some(self.clone_expression_box(default_value)?),
            None => None,
        };

        Ok(Statement::DeclareOption(DeclareOptionStatement {
            opt_index: node.opt_index,
            opt_name: node.opt_name.clone(),
            opt_type: self.clone_type_value(&node.opt_type)?,
            default_value,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_struct(&mut self, node: &DeclareStructStatement) -> Result<Statement> {
        let mut members = Vec::with_capacity(node.description.members.len());
        for member in &node.description.members {
            members.push(StructMember {
                name: member.name.clone(),
                member_type: self.clone_type_value(&member.member_type)?,
                builtin: clone_expression_value(self, &member.builtin)?,
                cond: clone_expression_value(self, &member.cond)?,
                location_index: clone_expression_value(self, &member.location_index)?,
                source_location: member.source_location.clone(),
            });
        }

        Ok(Statement::DeclareStruct(DeclareStructStatement {
            struct_index: node.struct_index,
            is_exported: clone_expression_value(self, &node.is_exported)?,
            description: StructDescription {
                name: node.description.name.clone(),
                layout: clone_expression_value(self, &node.description.layout)?,
                members,
            },
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_variable(&mut self, node: &DeclareVariableStatement) -> Result<Statement> {
        let initial_expression = match &node.initial_expression {
            Some(initial) => Some(self.clone_expression_box(initial)?),
            None => None,
        };

        Ok(Statement::DeclareVariable(DeclareVariableStatement {
            var_index: node.var_index,
            var_name: node.var_name.clone(),
            var_type: self.clone_type_value(&node.var_type)?,
            initial_expression,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_discard(&mut self, node: &DiscardStatement) -> Result<Statement> {
        Ok(Statement::Discard(node.clone()))
    }

    fn clone_expression_statement(&mut self, node: &ExpressionStatement) -> Result<Statement> {
        Ok(Statement::Expression(ExpressionStatement {
            expression: self.clone_expression(&node.expression)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_for(&mut self, node: &ForStatement) -> Result<Statement> {
        let step_expr = match &node.step_expr {
            Some(step) => Some(self.clone_expression_box(step)?),
            None => None,
        };

        Ok(Statement::For(ForStatement {
            var_index: node.var_index,
            var_name: node.var_name.clone(),
            from_expr: self.clone_expression_box(&node.from_expr)?,
            to_expr: self.clone_expression_box(&node.to_expr)?,
            step_expr,
            unroll: clone_expression_value(self, &node.unroll)?,
            statement: self.clone_statement_box(&node.statement)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_for_each(&mut self, node: &ForEachStatement) -> Result<Statement> {
        Ok(Statement::ForEach(ForEachStatement {
            var_index: node.var_index,
            var_name: node.var_name.clone(),
            expression: self.clone_expression_box(&node.expression)?,
            unroll: clone_expression_value(self, &node.unroll)?,
            statement: self.clone_statement_box(&node.statement)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_import(&mut self, node: &ImportStatement) -> Result<Statement> {
        Ok(Statement::Import(node.clone()))
    }

    fn clone_multi(&mut self, node: &MultiStatement) -> Result<Statement> {
        Ok(Statement::Multi(MultiStatement {
            statements: self.clone_statement_list(&node.statements)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_no_op(&mut self, node: &NoOpStatement) -> Result<Statement> {
        Ok(Statement::NoOp(node.clone()))
    }

    fn clone_return(&mut self, node: &ReturnStatement) -> Result<Statement> {
        let returned_expr = match &node.returned_expr {
            Some(expr) => Some(self.clone_expression_box(expr)?),
            None => None,
        };

        Ok(Statement::Return(ReturnStatement {
            returned_expr,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_scoped(&mut self, node: &ScopedStatement) -> Result<Statement> {
        Ok(Statement::Scoped(ScopedStatement {
            statement: self.clone_statement_box(&node.statement)?,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_while(&mut self, node: &WhileStatement) -> Result<Statement> {
        Ok(Statement::While(WhileStatement {
            condition: self.clone_expression_box(&node.condition)?,
            unroll: clone_expression_value(self, &node.unroll)?,
            body: self.clone_statement_box(&node.body)?,
            source_location: node.source_location.clone(),
        }))
    }
}

/// The identity cloner: deep-copies a tree without any rewriting.
#[derive(Debug, Default)]
pub struct DeepCloner;

impl Cloner for DeepCloner {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::value::ConstantValue;

    #[test]
    fn test_deep_clone_is_identical() {
        let expr = builder::binary(
            BinaryOp::Add,
            builder::constant(ConstantValue::I32(1)),
            builder::swizzle(
                builder::constant(ConstantValue::Vec2F32(crate::foundation::Vector2::new(
                    1.0, 2.0,
                ))),
                &[1, 0],
            ),
        );

        let cloned = DeepCloner.clone_expression(&expr).unwrap();
        assert_eq!(cloned, expr);
    }

    #[test]
    fn test_override_rewrites_at_depth() {
        // replaces every i32 literal with 0
        struct Zeroer;

        impl Cloner for Zeroer {
            fn clone_constant_value(&mut self, node: &ConstantValueExpression) -> Result<Expression> {
                let mut node = node.clone();
                if let ConstantValue::I32(v) = &mut node.value {
                    *v = 0;
                }
                Ok(Expression::ConstantValue(node))
            }
        }

        let expr = builder::binary(
            BinaryOp::Add,
            builder::constant(ConstantValue::I32(1)),
            builder::unary(UnaryOp::Minus, builder::constant(ConstantValue::I32(2))),
        );

        let rewritten = Zeroer.clone_expression(&expr).unwrap();

        let mut literals = Vec::new();
        collect_literals(&rewritten, &mut literals);
        assert_eq!(literals, vec![ConstantValue::I32(0), ConstantValue::I32(0)]);
    }

    fn collect_literals(expr: &Expression, out: &mut Vec<ConstantValue>) {
        match expr {
            Expression::ConstantValue(node) => out.push(node.value.clone()),
            Expression::Binary(node) => {
                collect_literals(&node.left, out);
                collect_literals(&node.right, out);
            }
            Expression::Unary(node) => collect_literals(&node.expression, out),
            _ => {}
        }
    }

    #[test]
    fn test_clone_preserves_statement_structure() {
        let stmt = builder::multi(vec![
            builder::declare_variable("x", None, Some(builder::constant(ConstantValue::I32(1)))),
            builder::expression_statement(builder::constant(ConstantValue::Bool(true))),
        ]);

        let cloned = DeepCloner.clone_statement(&stmt).unwrap();
        assert_eq!(cloned, stmt);
    }
}
