//! Programmatic AST construction.
//!
//! Free functions building nodes with unknown source locations. Producers
//! that do not come from a parser — tests, lowering steps inside the
//! sanitizer, host applications generating shaders — all go through here so
//! node-construction details stay in one place.
//!
//! Literal-constructing helpers pre-populate `cached_type` where the type
//! is implied by the value itself; everything else is left for the
//! sanitizer to fill in.

use crate::ast::*;
use crate::foundation::SourceLocation;
use crate::types::ExpressionType;
use crate::value::ConstantValue;

/// A literal expression, with its type already cached.
pub fn constant(value: ConstantValue) -> Expression {
    let cached_type = Some(value.type_of());
    Expression::ConstantValue(ConstantValueExpression {
        value,
        cached_type,
        source_location: SourceLocation::unknown(),
    })
}

/// An unresolved identifier reference.
pub fn identifier(name: impl Into<String>) -> Expression {
    Expression::Identifier(IdentifierExpression {
        identifier: name.into(),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// A resolved variable reference with a known type.
pub fn variable(variable_id: usize, ty: ExpressionType) -> Expression {
    Expression::VariableValue(VariableValueExpression {
        variable_id,
        cached_type: Some(ty),
        source_location: SourceLocation::unknown(),
    })
}

/// `lhs <op> rhs`.
pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    Expression::Binary(BinaryExpression {
        op,
        left: Box::new(left),
        right: Box::new(right),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `<op> expr`.
pub fn unary(op: UnaryOp, expression: Expression) -> Expression {
    Expression::Unary(UnaryExpression {
        op,
        expression: Box::new(expression),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `left <op>= right`.
pub fn assign(op: AssignOp, left: Expression, right: Expression) -> Expression {
    Expression::Assign(AssignExpression {
        op,
        left: Box::new(left),
        right: Box::new(right),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `T(e1, e2, ...)`.
pub fn cast(target_type: ExpressionType, expressions: Vec<Expression>) -> Expression {
    Expression::Cast(CastExpression {
        target_type: ExpressionValue::Value(target_type),
        expressions,
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `expr.<components>`.
///
/// # Panics
/// Panics when more than four components are requested.
pub fn swizzle(expression: Expression, components: &[u32]) -> Expression {
    assert!(
        components.len() <= 4,
        "a swizzle has at most 4 components, got {}",
        components.len()
    );

    let mut component_array = [0u32; 4];
    component_array[..components.len()].copy_from_slice(components);

    Expression::Swizzle(SwizzleExpression {
        expression: Box::new(expression),
        components: component_array,
        component_count: components.len(),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `expr[i]...`.
pub fn access_index(expr: Expression, indices: Vec<Expression>) -> Expression {
    Expression::AccessIndex(AccessIndexExpression {
        expr: Box::new(expr),
        indices,
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `expr.a.b...`.
pub fn access_member(expr: Expression, members: &[&str]) -> Expression {
    Expression::AccessIdentifier(AccessIdentifierExpression {
        expr: Box::new(expr),
        identifiers: members
            .iter()
            .map(|member| AccessIdentifierEntry {
                identifier: (*member).to_string(),
                source_location: SourceLocation::unknown(),
            })
            .collect(),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `target(params...)`.
pub fn call_function(target: Expression, parameters: Vec<Expression>) -> Expression {
    Expression::CallFunction(CallFunctionExpression {
        target_function: Box::new(target),
        parameters,
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// A built-in operation call.
pub fn intrinsic(intrinsic: IntrinsicType, parameters: Vec<Expression>) -> Expression {
    Expression::Intrinsic(IntrinsicExpression {
        intrinsic,
        parameters,
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// `cond ? true_path : false_path`.
pub fn conditional(condition: Expression, true_path: Expression, false_path: Expression) -> Expression {
    Expression::Conditional(ConditionalExpression {
        condition: Box::new(condition),
        true_path: Box::new(true_path),
        false_path: Box::new(false_path),
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

/// An expression in statement position.
pub fn expression_statement(expression: Expression) -> Statement {
    Statement::Expression(ExpressionStatement {
        expression,
        source_location: SourceLocation::unknown(),
    })
}

/// `let name[: ty] [= initial];`
pub fn declare_variable(
    name: impl Into<String>,
    ty: Option<ExpressionType>,
    initial: Option<Expression>,
) -> Statement {
    Statement::DeclareVariable(DeclareVariableStatement {
        var_index: None,
        var_name: name.into(),
        var_type: match ty {
            Some(ty) => ExpressionValue::Value(ty),
            None => ExpressionValue::Unset,
        },
        initial_expression: initial.map(Box::new),
        source_location: SourceLocation::unknown(),
    })
}

/// `const name[: ty] = expr;`
pub fn declare_const(
    name: impl Into<String>,
    ty: Option<ExpressionType>,
    expression: Expression,
) -> Statement {
    Statement::DeclareConst(DeclareConstStatement {
        const_index: None,
        name: name.into(),
        const_type: match ty {
            Some(ty) => ExpressionValue::Value(ty),
            None => ExpressionValue::Unset,
        },
        expression: Box::new(expression),
        source_location: SourceLocation::unknown(),
    })
}

/// `option name: ty [= default];`
pub fn declare_option(
    name: impl Into<String>,
    ty: ExpressionType,
    default_value: Option<Expression>,
) -> Statement {
    Statement::DeclareOption(DeclareOptionStatement {
        opt_index: None,
        opt_name: name.into(),
        opt_type: ExpressionValue::Value(ty),
        default_value: default_value.map(Box::new),
        source_location: SourceLocation::unknown(),
    })
}

/// `alias name = expr;`
pub fn declare_alias(name: impl Into<String>, expression: Expression) -> Statement {
    Statement::DeclareAlias(DeclareAliasStatement {
        alias_index: None,
        name: name.into(),
        expression: Box::new(expression),
        source_location: SourceLocation::unknown(),
    })
}

/// A plain struct member without attributes.
pub fn struct_member(name: impl Into<String>, ty: ExpressionType) -> StructMember {
    StructMember {
        name: name.into(),
        member_type: ExpressionValue::Value(ty),
        builtin: ExpressionValue::Unset,
        cond: ExpressionValue::Unset,
        location_index: ExpressionValue::Unset,
        source_location: SourceLocation::unknown(),
    }
}

/// `struct name { members }`.
pub fn declare_struct(name: impl Into<String>, members: Vec<StructMember>) -> Statement {
    Statement::DeclareStruct(DeclareStructStatement {
        struct_index: None,
        is_exported: ExpressionValue::Unset,
        description: StructDescription {
            name: name.into(),
            layout: ExpressionValue::Unset,
            members,
        },
        source_location: SourceLocation::unknown(),
    })
}

/// A plain function parameter.
pub fn function_parameter(name: impl Into<String>, ty: ExpressionType) -> FunctionParameter {
    FunctionParameter {
        var_index: None,
        name: name.into(),
        param_type: ExpressionValue::Value(ty),
        source_location: SourceLocation::unknown(),
    }
}

/// `fn name(parameters) [-> return_type] { statements }`
pub fn declare_function(
    name: impl Into<String>,
    parameters: Vec<FunctionParameter>,
    return_type: Option<ExpressionType>,
    statements: Vec<Statement>,
) -> Statement {
    Statement::DeclareFunction(DeclareFunctionStatement {
        func_index: None,
        name: name.into(),
        parameters,
        statements,
        return_type: match return_type {
            Some(ty) => ExpressionValue::Value(ty),
            None => ExpressionValue::Unset,
        },
        entry_stage: ExpressionValue::Unset,
        depth_write: ExpressionValue::Unset,
        early_fragment_tests: ExpressionValue::Unset,
        is_exported: ExpressionValue::Unset,
        source_location: SourceLocation::unknown(),
    })
}

/// `[entry(stage)] fn name(parameters) [-> return_type] { statements }`
pub fn entry_function(
    stage: ShaderStage,
    name: impl Into<String>,
    parameters: Vec<FunctionParameter>,
    return_type: Option<ExpressionType>,
    statements: Vec<Statement>,
) -> Statement {
    match declare_function(name, parameters, return_type, statements) {
        Statement::DeclareFunction(mut func) => {
            func.entry_stage = ExpressionValue::Value(stage);
            Statement::DeclareFunction(func)
        }
        _ => unreachable!(),
    }
}

/// An external variable with explicit binding.
pub fn external_var(name: impl Into<String>, ty: ExpressionType, binding: u32) -> ExternalVar {
    ExternalVar {
        var_index: None,
        name: name.into(),
        var_type: ExpressionValue::Value(ty),
        binding_index: ExpressionValue::Value(binding),
        binding_set: ExpressionValue::Unset,
        source_location: SourceLocation::unknown(),
    }
}

/// `external { vars }`.
pub fn declare_external(external_vars: Vec<ExternalVar>) -> Statement {
    Statement::DeclareExternal(DeclareExternalStatement {
        binding_set: ExpressionValue::Unset,
        external_vars,
        source_location: SourceLocation::unknown(),
    })
}

/// `if/else if/else` chain.
pub fn branch(conditions: Vec<(Expression, Statement)>, else_statement: Option<Statement>) -> Statement {
    Statement::Branch(BranchStatement {
        cond_statements: conditions
            .into_iter()
            .map(|(condition, statement)| ConditionalBranch {
                condition,
                statement,
            })
            .collect(),
        else_statement: else_statement.map(Box::new),
        is_const: false,
        source_location: SourceLocation::unknown(),
    })
}

/// `const if` chain (collapsed at compile time).
pub fn const_branch(
    conditions: Vec<(Expression, Statement)>,
    else_statement: Option<Statement>,
) -> Statement {
    match branch(conditions, else_statement) {
        Statement::Branch(mut node) => {
            node.is_const = true;
            Statement::Branch(node)
        }
        _ => unreachable!(),
    }
}

/// `for var in from -> to [: step] { body }`
pub fn for_loop(
    var_name: impl Into<String>,
    from: Expression,
    to: Expression,
    step: Option<Expression>,
    body: Statement,
) -> Statement {
    Statement::For(ForStatement {
        var_index: None,
        var_name: var_name.into(),
        from_expr: Box::new(from),
        to_expr: Box::new(to),
        step_expr: step.map(Box::new),
        unroll: ExpressionValue::Unset,
        statement: Box::new(body),
        source_location: SourceLocation::unknown(),
    })
}

/// `for var in expr { body }`
pub fn for_each(var_name: impl Into<String>, expression: Expression, body: Statement) -> Statement {
    Statement::ForEach(ForEachStatement {
        var_index: None,
        var_name: var_name.into(),
        expression: Box::new(expression),
        unroll: ExpressionValue::Unset,
        statement: Box::new(body),
        source_location: SourceLocation::unknown(),
    })
}

/// `while (condition) { body }`
pub fn while_loop(condition: Expression, body: Statement) -> Statement {
    Statement::While(WhileStatement {
        condition: Box::new(condition),
        unroll: ExpressionValue::Unset,
        body: Box::new(body),
        source_location: SourceLocation::unknown(),
    })
}

/// `{ statement }` — a lexical scope.
pub fn scoped(statement: Statement) -> Statement {
    Statement::Scoped(ScopedStatement {
        statement: Box::new(statement),
        source_location: SourceLocation::unknown(),
    })
}

/// A statement sequence.
pub fn multi(statements: Vec<Statement>) -> Statement {
    Statement::Multi(MultiStatement {
        statements,
        source_location: SourceLocation::unknown(),
    })
}

/// `return [expr];`
pub fn return_statement(expr: Option<Expression>) -> Statement {
    Statement::Return(ReturnStatement {
        returned_expr: expr.map(Box::new),
        source_location: SourceLocation::unknown(),
    })
}

/// `import Module;` bringing the whole module in under its own name.
pub fn import(module_name: impl Into<String>) -> Statement {
    Statement::Import(ImportStatement {
        module_name: module_name.into(),
        identifiers: Vec::new(),
        source_location: SourceLocation::unknown(),
    })
}

/// `import <identifiers> from Module;`
pub fn import_identifiers(
    module_name: impl Into<String>,
    identifiers: Vec<ImportIdentifier>,
) -> Statement {
    Statement::Import(ImportStatement {
        module_name: module_name.into(),
        identifiers,
        source_location: SourceLocation::unknown(),
    })
}

/// `discard;`
pub fn discard() -> Statement {
    Statement::Discard(DiscardStatement {
        source_location: SourceLocation::unknown(),
    })
}

/// `break;`
pub fn break_statement() -> Statement {
    Statement::Break(BreakStatement {
        source_location: SourceLocation::unknown(),
    })
}

/// `continue;`
pub fn continue_statement() -> Statement {
    Statement::Continue(ContinueStatement {
        source_location: SourceLocation::unknown(),
    })
}

/// An empty statement.
pub fn no_op() -> Statement {
    Statement::NoOp(NoOpStatement {
        source_location: SourceLocation::unknown(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    #[test]
    fn test_constant_caches_type() {
        let expr = constant(ConstantValue::F32(1.0));
        assert_eq!(
            expr.cached_type(),
            Some(&ExpressionType::Primitive(PrimitiveType::Float32))
        );
    }

    #[test]
    fn test_entry_function_sets_stage() {
        let func = entry_function(ShaderStage::Fragment, "main", Vec::new(), None, Vec::new());
        match func {
            Statement::DeclareFunction(func) => {
                assert_eq!(func.entry_stage.value(), Some(&ShaderStage::Fragment));
            }
            _ => panic!("expected a function declaration"),
        }
    }

    #[test]
    #[should_panic(expected = "at most 4 components")]
    fn test_swizzle_rejects_too_many_components() {
        swizzle(constant(ConstantValue::F32(0.0)), &[0, 1, 2, 3, 0]);
    }
}
