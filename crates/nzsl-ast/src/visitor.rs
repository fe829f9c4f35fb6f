//! Read-only traversal of the AST.
//!
//! [`ExpressionVisitor`] and [`StatementVisitor`] have one method per
//! concrete variant; default implementations recurse into children in
//! pre-order, so a pass only overrides the variants it cares about and
//! inherits full traversal for everything else.

use crate::ast::*;

/// Visit the expression branch of an [`ExpressionValue`], if present.
pub fn visit_expression_value<V, T>(visitor: &mut V, value: &ExpressionValue<T>)
where
    V: ExpressionVisitor + ?Sized,
{
    if let ExpressionValue::Expression(expr) = value {
        visitor.visit_expression(expr);
    }
}

/// Visitor over expression variants. Default methods recurse.
pub trait ExpressionVisitor {
    /// Dispatch on the concrete variant.
    fn visit_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::AccessIdentifier(node) => self.visit_access_identifier(node),
            Expression::AccessIndex(node) => self.visit_access_index(node),
            Expression::AliasValue(node) => self.visit_alias_value(node),
            Expression::Assign(node) => self.visit_assign(node),
            Expression::Binary(node) => self.visit_binary(node),
            Expression::CallFunction(node) => self.visit_call_function(node),
            Expression::CallMethod(node) => self.visit_call_method(node),
            Expression::Cast(node) => self.visit_cast(node),
            Expression::Conditional(node) => self.visit_conditional(node),
            Expression::Constant(node) => self.visit_constant(node),
            Expression::ConstantValue(node) => self.visit_constant_value(node),
            Expression::Function(node) => self.visit_function(node),
            Expression::Identifier(node) => self.visit_identifier(node),
            Expression::Intrinsic(node) => self.visit_intrinsic(node),
            Expression::IntrinsicFunction(node) => self.visit_intrinsic_function(node),
            Expression::StructType(node) => self.visit_struct_type(node),
            Expression::Swizzle(node) => self.visit_swizzle(node),
            Expression::Type(node) => self.visit_type(node),
            Expression::Unary(node) => self.visit_unary(node),
            Expression::VariableValue(node) => self.visit_variable_value(node),
        }
    }

    fn visit_access_identifier(&mut self, node: &AccessIdentifierExpression) {
        self.visit_expression(&node.expr);
    }

    fn visit_access_index(&mut self, node: &AccessIndexExpression) {
        self.visit_expression(&node.expr);
        for index in &node.indices {
            self.visit_expression(index);
        }
    }

    fn visit_alias_value(&mut self, _node: &AliasValueExpression) {}

    fn visit_assign(&mut self, node: &AssignExpression) {
        self.visit_expression(&node.left);
        self.visit_expression(&node.right);
    }

    fn visit_binary(&mut self, node: &BinaryExpression) {
        self.visit_expression(&node.left);
        self.visit_expression(&node.right);
    }

    fn visit_call_function(&mut self, node: &CallFunctionExpression) {
        self.visit_expression(&node.target_function);
        for parameter in &node.parameters {
            self.visit_expression(parameter);
        }
    }

    fn visit_call_method(&mut self, node: &CallMethodExpression) {
        self.visit_expression(&node.object);
        for parameter in &node.parameters {
            self.visit_expression(parameter);
        }
    }

    fn visit_cast(&mut self, node: &CastExpression) {
        if let ExpressionValue::Expression(expr) = &node.target_type {
            self.visit_expression(expr);
        }
        for expr in &node.expressions {
            self.visit_expression(expr);
        }
    }

    fn visit_conditional(&mut self, node: &ConditionalExpression) {
        self.visit_expression(&node.condition);
        self.visit_expression(&node.true_path);
        self.visit_expression(&node.false_path);
    }

    fn visit_constant(&mut self, _node: &ConstantExpression) {}

    fn visit_constant_value(&mut self, _node: &ConstantValueExpression) {}

    fn visit_function(&mut self, _node: &FunctionExpression) {}

    fn visit_identifier(&mut self, _node: &IdentifierExpression) {}

    fn visit_intrinsic(&mut self, node: &IntrinsicExpression) {
        for parameter in &node.parameters {
            self.visit_expression(parameter);
        }
    }

    fn visit_intrinsic_function(&mut self, _node: &IntrinsicFunctionExpression) {}

    fn visit_struct_type(&mut self, _node: &StructTypeExpression) {}

    fn visit_swizzle(&mut self, node: &SwizzleExpression) {
        self.visit_expression(&node.expression);
    }

    fn visit_type(&mut self, _node: &TypeExpression) {}

    fn visit_unary(&mut self, node: &UnaryExpression) {
        self.visit_expression(&node.expression);
    }

    fn visit_variable_value(&mut self, _node: &VariableValueExpression) {}
}

/// Visitor over statement variants. Default methods recurse into child
/// statements and expressions (including the expression branches of
/// attribute values).
pub trait StatementVisitor: ExpressionVisitor {
    /// Dispatch on the concrete variant.
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Branch(node) => self.visit_branch(node),
            Statement::Break(node) => self.visit_break(node),
            Statement::Conditional(node) => self.visit_conditional_statement(node),
            Statement::Continue(node) => self.visit_continue(node),
            Statement::DeclareAlias(node) => self.visit_declare_alias(node),
            Statement::DeclareConst(node) => self.visit_declare_const(node),
            Statement::DeclareExternal(node) => self.visit_declare_external(node),
            Statement::DeclareFunction(node) => self.visit_declare_function(node),
            Statement::DeclareOption(node) => self.visit_declare_option(node),
            Statement::DeclareStruct(node) => self.visit_declare_struct(node),
            Statement::DeclareVariable(node) => self.visit_declare_variable(node),
            Statement::Discard(node) => self.visit_discard(node),
            Statement::Expression(node) => self.visit_expression_statement(node),
            Statement::For(node) => self.visit_for(node),
            Statement::ForEach(node) => self.visit_for_each(node),
            Statement::Import(node) => self.visit_import(node),
            Statement::Multi(node) => self.visit_multi(node),
            Statement::NoOp(node) => self.visit_no_op(node),
            Statement::Return(node) => self.visit_return(node),
            Statement::Scoped(node) => self.visit_scoped(node),
            Statement::While(node) => self.visit_while(node),
        }
    }

    fn visit_branch(&mut self, node: &BranchStatement) {
        for cond in &node.cond_statements {
            self.visit_expression(&cond.condition);
            self.visit_statement(&cond.statement);
        }
        if let Some(else_statement) = &node.else_statement {
            self.visit_statement(else_statement);
        }
    }

    fn visit_break(&mut self, _node: &BreakStatement) {}

    fn visit_conditional_statement(&mut self, node: &ConditionalStatement) {
        self.visit_expression(&node.condition);
        self.visit_statement(&node.statement);
    }

    fn visit_continue(&mut self, _node: &ContinueStatement) {}

    fn visit_declare_alias(&mut self, node: &DeclareAliasStatement) {
        self.visit_expression(&node.expression);
    }

    fn visit_declare_const(&mut self, node: &DeclareConstStatement) {
        visit_expression_value(self, &node.const_type);
        self.visit_expression(&node.expression);
    }

    fn visit_declare_external(&mut self, node: &DeclareExternalStatement) {
        visit_expression_value(self, &node.binding_set);
        for var in &node.external_vars {
            visit_expression_value(self, &var.var_type);
            visit_expression_value(self, &var.binding_index);
            visit_expression_value(self, &var.binding_set);
        }
    }

    fn visit_declare_function(&mut self, node: &DeclareFunctionStatement) {
        for parameter in &node.parameters {
            visit_expression_value(self, &parameter.param_type);
        }
        visit_expression_value(self, &node.return_type);
        for statement in &node.statements {
            self.visit_statement(statement);
        }
    }

    fn visit_declare_option(&mut self, node: &DeclareOptionStatement) {
        visit_expression_value(self, &node.opt_type);
        if let Some(default_value) = &node.default_value {
            self.visit_expression(default_value);
        }
    }

    fn visit_declare_struct(&mut self, node: &DeclareStructStatement) {
        for member in &node.description.members {
            visit_expression_value(self, &member.member_type);
            visit_expression_value(self, &member.cond);
            visit_expression_value(self, &member.location_index);
        }
    }

    fn visit_declare_variable(&mut self, node: &DeclareVariableStatement) {
        visit_expression_value(self, &node.var_type);
        if let Some(initial) = &node.initial_expression {
            self.visit_expression(initial);
        }
    }

    fn visit_discard(&mut self, _node: &DiscardStatement) {}

    fn visit_expression_statement(&mut self, node: &ExpressionStatement) {
        self.visit_expression(&node.expression);
    }

    fn visit_for(&mut self, node: &ForStatement) {
        self.visit_expression(&node.from_expr);
        self.visit_expression(&node.to_expr);
        if let Some(step) = &node.step_expr {
            self.visit_expression(step);
        }
        self.visit_statement(&node.statement);
    }

    fn visit_for_each(&mut self, node: &ForEachStatement) {
        self.visit_expression(&node.expression);
        self.visit_statement(&node.statement);
    }

    fn visit_import(&mut self, _node: &ImportStatement) {}

    fn visit_multi(&mut self, node: &MultiStatement) {
        for statement in &node.statements {
            self.visit_statement(statement);
        }
    }

    fn visit_no_op(&mut self, _node: &NoOpStatement) {}

    fn visit_return(&mut self, node: &ReturnStatement) {
        if let Some(expr) = &node.returned_expr {
            self.visit_expression(expr);
        }
    }

    fn visit_scoped(&mut self, node: &ScopedStatement) {
        self.visit_statement(&node.statement);
    }

    fn visit_while(&mut self, node: &WhileStatement) {
        self.visit_expression(&node.condition);
        self.visit_statement(&node.body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder;
    use crate::value::ConstantValue;

    #[derive(Default)]
    struct LiteralCounter(usize);

    impl ExpressionVisitor for LiteralCounter {
        fn visit_constant_value(&mut self, _node: &ConstantValueExpression) {
            self.0 += 1;
        }
    }

    impl StatementVisitor for LiteralCounter {}

    #[test]
    fn test_default_recursion_counts_children() {
        // (1 + 2) * 3 — three literals
        let expr = builder::binary(
            BinaryOp::Multiply,
            builder::binary(
                BinaryOp::Add,
                builder::constant(ConstantValue::I32(1)),
                builder::constant(ConstantValue::I32(2)),
            ),
            builder::constant(ConstantValue::I32(3)),
        );

        let mut counter = LiteralCounter::default();
        counter.visit_expression(&expr);
        assert_eq!(counter.0, 3);
    }

    #[test]
    fn test_statement_recursion_reaches_expressions() {
        let stmt = builder::declare_variable(
            "x",
            None,
            Some(builder::constant(ConstantValue::F32(1.0))),
        );

        let mut counter = LiteralCounter::default();
        counter.visit_statement(&stmt);
        assert_eq!(counter.0, 1);
    }

    #[test]
    fn test_branch_recursion() {
        let branch = builder::branch(
            vec![(
                builder::constant(ConstantValue::Bool(true)),
                builder::expression_statement(builder::constant(ConstantValue::I32(1))),
            )],
            Some(builder::expression_statement(builder::constant(
                ConstantValue::I32(2),
            ))),
        );

        let mut counter = LiteralCounter::default();
        counter.visit_statement(&branch);
        // condition + both arm bodies
        assert_eq!(counter.0, 3);
    }
}
