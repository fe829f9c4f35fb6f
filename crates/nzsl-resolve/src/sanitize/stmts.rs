//! Statement sanitization: the [`Cloner`] implementation.
//!
//! Declarations register into the index arenas and come back with their
//! assigned index; control flow is validated and, depending on the options,
//! lowered (loops to `while` or unrolled scopes, branch chains split,
//! compound assignments expanded). Expression variants delegate to the
//! resolution methods of `exprs.rs`.

use super::{AliasData, ConstantData, Identifier, OptionData, Sanitizer, StructData};
use nzsl_ast::ast::*;
use nzsl_ast::cloner::{clone_expression_value, Cloner};
use nzsl_ast::error::{ErrorKind, Result};
use nzsl_ast::foundation::stable_hash::fnv1a32_str;
use nzsl_ast::foundation::SourceLocation;
use nzsl_ast::resolve_alias;
use nzsl_ast::types::{ExpressionType, PrimitiveType};
use nzsl_ast::value::ConstantValue;

impl Cloner for Sanitizer<'_> {
    // -----------------------------------------------------------------
    // expressions (see exprs.rs)
    // -----------------------------------------------------------------

    fn clone_identifier(&mut self, node: &IdentifierExpression) -> Result<Expression> {
        self.sanitize_identifier(node)
    }

    fn clone_access_identifier(&mut self, node: &AccessIdentifierExpression) -> Result<Expression> {
        self.sanitize_access_identifier(node)
    }

    fn clone_access_index(&mut self, node: &AccessIndexExpression) -> Result<Expression> {
        self.sanitize_access_index(node)
    }

    fn clone_swizzle(&mut self, node: &SwizzleExpression) -> Result<Expression> {
        self.sanitize_swizzle(node)
    }

    fn clone_binary(&mut self, node: &BinaryExpression) -> Result<Expression> {
        self.sanitize_binary(node)
    }

    fn clone_unary(&mut self, node: &UnaryExpression) -> Result<Expression> {
        self.sanitize_unary(node)
    }

    fn clone_assign(&mut self, node: &AssignExpression) -> Result<Expression> {
        self.sanitize_assign(node)
    }

    fn clone_cast(&mut self, node: &CastExpression) -> Result<Expression> {
        self.sanitize_cast(node)
    }

    fn clone_conditional(&mut self, node: &ConditionalExpression) -> Result<Expression> {
        self.sanitize_conditional(node)
    }

    fn clone_call_function(&mut self, node: &CallFunctionExpression) -> Result<Expression> {
        self.sanitize_call_function(node)
    }

    fn clone_call_method(&mut self, node: &CallMethodExpression) -> Result<Expression> {
        self.sanitize_call_method(node)
    }

    fn clone_intrinsic(&mut self, node: &IntrinsicExpression) -> Result<Expression> {
        self.sanitize_intrinsic(node)
    }

    // -----------------------------------------------------------------
    // statement sequences and scopes
    // -----------------------------------------------------------------

    fn clone_multi(&mut self, node: &MultiStatement) -> Result<Statement> {
        self.scopes.enter();
        let statements = self.sanitize_statement_list(&node.statements)?;
        self.scopes.leave();

        Ok(Statement::Multi(MultiStatement {
            statements,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_scoped(&mut self, node: &ScopedStatement) -> Result<Statement> {
        self.scopes.enter();
        let statements = self.sanitize_body_statements(&node.statement)?;
        self.scopes.leave();

        Ok(Statement::Scoped(ScopedStatement {
            statement: Box::new(Statement::Multi(MultiStatement {
                statements,
                source_location: node.source_location.clone(),
            })),
            source_location: node.source_location.clone(),
        }))
    }

    // -----------------------------------------------------------------
    // declarations
    // -----------------------------------------------------------------

    fn clone_declare_variable(&mut self, node: &DeclareVariableStatement) -> Result<Statement> {
        let declared = self.resolve_type_value(&node.var_type, &node.source_location)?;

        let initial = match &node.initial_expression {
            Some(initial) => Some(self.clone_expression(initial)?),
            None => None,
        };
        let initial_type = initial.as_ref().and_then(|e| e.cached_type().cloned());

        let var_type = match declared {
            Some(ExpressionType::Array(array)) if array.length == 0 => {
                // unsized arrays are only legal when the literal supplies
                // the length
                match &initial_type {
                    Some(ExpressionType::Array(inferred)) if inferred.length != 0 => {
                        let inferred = ExpressionType::Array(inferred.clone());
                        check_declaration_type(&inferred, &initial_type, initial.as_ref(), node)?;
                        inferred
                    }
                    _ => {
                        return Err(
                            ErrorKind::ArrayLengthRequired.at(node.source_location.clone())
                        )
                    }
                }
            }
            Some(ty) => {
                check_declaration_type(&ty, &initial_type, initial.as_ref(), node)?;
                ty
            }
            None => match initial_type {
                Some(ty) => {
                    if let ExpressionType::Array(array) = &ty {
                        if array.length == 0 {
                            return Err(
                                ErrorKind::ArrayLengthRequired.at(node.source_location.clone())
                            );
                        }
                    }
                    ty
                }
                None if self.allow_partial() || node.initial_expression.is_some() => {
                    ExpressionType::NoType
                }
                None => {
                    return Err(
                        ErrorKind::VarDeclarationMissingTypeAndValue
                            .at(node.source_location.clone()),
                    )
                }
            },
        };

        let var_index = self.register_variable(&node.var_name, var_type.clone());

        Ok(Statement::DeclareVariable(DeclareVariableStatement {
            var_index: Some(var_index),
            var_name: self.variables[var_index].name.clone(),
            var_type: ExpressionValue::Value(var_type),
            initial_expression: initial.map(Box::new),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_const(&mut self, node: &DeclareConstStatement) -> Result<Statement> {
        let declared = self.resolve_type_value(&node.const_type, &node.source_location)?;

        let expression = self.clone_expression(&node.expression)?;
        let value = self.eval_constant(&expression)?;
        let expression_type = expression.cached_type().cloned();

        if let (Some(declared), Some(got)) = (&declared, &expression_type) {
            let mut expected = declared.clone();
            // unsized const arrays take their length from the literal
            if let (ExpressionType::Array(a), ExpressionType::Array(b)) =
                (resolve_alias(declared), resolve_alias(got))
            {
                if a.length == 0 {
                    expected = ExpressionType::Array(nzsl_ast::types::ArrayType {
                        contained_type: a.contained_type.clone(),
                        length: b.length,
                    });
                }
            }

            if resolve_alias(&expected) != resolve_alias(got) {
                return Err(ErrorKind::VarDeclarationTypeUnmatching {
                    got: got.to_string(),
                    expected: expected.to_string(),
                }
                .at(expression.source_location().clone()));
            }
        }

        let ty = expression_type
            .or(declared)
            .unwrap_or(ExpressionType::NoType);

        // fold the initializer down to its value where possible
        let folded = match &value {
            Some(value) => Expression::ConstantValue(ConstantValueExpression {
                value: value.clone(),
                cached_type: Some(ty.clone()),
                source_location: expression.source_location().clone(),
            }),
            None => expression,
        };

        let const_index = self.constants.len();
        self.constants.push(ConstantData {
            name: node.name.clone(),
            ty: ty.clone(),
            value,
            expression: folded.clone(),
        });
        self.scopes
            .register(node.name.clone(), Identifier::Constant(const_index));

        if self.options().remove_const_declaration {
            return Ok(nzsl_ast::builder::no_op());
        }

        Ok(Statement::DeclareConst(DeclareConstStatement {
            const_index: Some(const_index),
            name: node.name.clone(),
            const_type: ExpressionValue::Value(ty),
            expression: Box::new(folded),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_option(&mut self, node: &DeclareOptionStatement) -> Result<Statement> {
        let ty = self
            .resolve_type_value(&node.opt_type, &node.source_location)?
            .ok_or_else(|| {
                ErrorKind::UnknownIdentifier {
                    identifier: node.opt_name.clone(),
                }
                .at(node.source_location.clone())
            })?;

        let default_value = match &node.default_value {
            Some(default) => Some(self.clone_expression(default)?),
            None => None,
        };
        let default_constant = match &default_value {
            Some(default) => self.eval_constant(default)?,
            None => None,
        };

        // host-supplied values are looked up by name hash and win over the
        // declared default
        let provided = self
            .options()
            .option_values
            .get(&fnv1a32_str(&node.opt_name))
            .cloned();

        let value = provided.or(default_constant);
        let value = match value {
            Some(value) => {
                if resolve_alias(&value.type_of()) != resolve_alias(&ty) {
                    return Err(ErrorKind::VarDeclarationTypeUnmatching {
                        got: value.type_of().to_string(),
                        expected: ty.to_string(),
                    }
                    .at(node.source_location.clone()));
                }
                value
            }
            None => {
                return Err(
                    ErrorKind::ConstantExpressionRequired.at(node.source_location.clone())
                )
            }
        };

        let const_index = self.constants.len();
        self.constants.push(ConstantData {
            name: node.opt_name.clone(),
            ty: ty.clone(),
            value: Some(value.clone()),
            expression: Expression::ConstantValue(ConstantValueExpression {
                value: value.clone(),
                cached_type: Some(ty.clone()),
                source_location: node.source_location.clone(),
            }),
        });

        let opt_index = self.shader_options.len();
        self.shader_options.push(OptionData {
            name: node.opt_name.clone(),
            const_index,
        });
        self.scopes.register(
            node.opt_name.clone(),
            Identifier::Option {
                opt_index,
                const_index,
            },
        );

        if self.options().remove_option_declaration {
            return Ok(nzsl_ast::builder::no_op());
        }

        Ok(Statement::DeclareOption(DeclareOptionStatement {
            opt_index: Some(opt_index),
            opt_name: node.opt_name.clone(),
            opt_type: ExpressionValue::Value(ty),
            default_value: default_value.map(Box::new),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_alias(&mut self, node: &DeclareAliasStatement) -> Result<Statement> {
        let expression = self.clone_expression(&node.expression)?;

        let target = match &expression {
            Expression::Function(func) => Identifier::Function(func.func_id),
            Expression::StructType(s) => Identifier::Struct(s.struct_type_id),
            Expression::AliasValue(alias) => Identifier::Alias(alias.alias_id),
            _ => {
                return Err(ErrorKind::UnknownIdentifier {
                    identifier: node.name.clone(),
                }
                .at(node.source_location.clone()))
            }
        };
        let target_type = expression
            .cached_type()
            .cloned()
            .unwrap_or(ExpressionType::NoType);

        let alias_index = self.aliases.len();
        self.aliases.push(AliasData {
            name: node.name.clone(),
            target,
            target_type,
        });
        self.scopes
            .register(node.name.clone(), Identifier::Alias(alias_index));

        if self.options().remove_aliases {
            return Ok(nzsl_ast::builder::no_op());
        }

        Ok(Statement::DeclareAlias(DeclareAliasStatement {
            alias_index: Some(alias_index),
            name: node.name.clone(),
            expression: Box::new(expression),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_struct(&mut self, node: &DeclareStructStatement) -> Result<Statement> {
        let mut members = Vec::with_capacity(node.description.members.len());
        for member in &node.description.members {
            let member_type = self
                .resolve_type_value(&member.member_type, &member.source_location)?
                .map(|ty| {
                    // unsized arrays have no place in a struct
                    if matches!(resolve_alias(&ty), ExpressionType::Array(a) if a.length == 0) {
                        Err(ErrorKind::ArrayLengthRequired.at(member.source_location.clone()))
                    } else {
                        Ok(ty)
                    }
                })
                .transpose()?;

            let cond = self.resolve_bool_value(&member.cond, &member.source_location)?;
            let location_index =
                self.resolve_u32_value(&member.location_index, "location", &member.source_location)?;

            members.push(StructMember {
                name: member.name.clone(),
                member_type: match member_type {
                    Some(ty) => ExpressionValue::Value(ty),
                    None => ExpressionValue::Unset,
                },
                builtin: clone_expression_value(self, &member.builtin)?,
                cond,
                location_index,
                source_location: member.source_location.clone(),
            });
        }

        let description = StructDescription {
            name: node.description.name.clone(),
            layout: clone_expression_value(self, &node.description.layout)?,
            members,
        };

        let struct_index = self.structs.len();
        self.structs.push(StructData {
            description: description.clone(),
        });
        self.scopes.register(
            description.name.clone(),
            Identifier::Struct(struct_index),
        );

        if matches!(node.is_exported, ExpressionValue::Value(true)) {
            self.exports
                .push((description.name.clone(), Identifier::Struct(struct_index)));
        }

        Ok(Statement::DeclareStruct(DeclareStructStatement {
            struct_index: Some(struct_index),
            is_exported: clone_expression_value(self, &node.is_exported)?,
            description,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_external(&mut self, node: &DeclareExternalStatement) -> Result<Statement> {
        let block_set = self.resolve_u32_value(&node.binding_set, "set", &node.source_location)?;

        let mut external_vars = Vec::with_capacity(node.external_vars.len());
        for var in &node.external_vars {
            let ty = self
                .resolve_type_value(&var.var_type, &var.source_location)?
                .ok_or_else(|| {
                    ErrorKind::UnknownIdentifier {
                        identifier: var.name.clone(),
                    }
                    .at(var.source_location.clone())
                })?;

            self.check_external_type(&ty, &var.name, &var.source_location)?;

            let binding_index =
                self.resolve_u32_value(&var.binding_index, "binding", &var.source_location)?;
            if binding_index.is_unset() {
                return Err(ErrorKind::AttributeMissingParameter {
                    attribute: "binding".to_string(),
                }
                .at(var.source_location.clone()));
            }

            let mut binding_set =
                self.resolve_u32_value(&var.binding_set, "set", &var.source_location)?;
            if binding_set.is_unset() {
                // block-level set, defaulting to 0
                binding_set = match &block_set {
                    ExpressionValue::Value(set) => ExpressionValue::Value(*set),
                    _ => ExpressionValue::Value(0),
                };
            }

            let var_index = self.register_variable(&var.name, ty.clone());

            external_vars.push(ExternalVar {
                var_index: Some(var_index),
                name: self.variables[var_index].name.clone(),
                var_type: ExpressionValue::Value(ty),
                binding_index,
                binding_set,
                source_location: var.source_location.clone(),
            });
        }

        Ok(Statement::DeclareExternal(DeclareExternalStatement {
            binding_set: block_set,
            external_vars,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_function(&mut self, node: &DeclareFunctionStatement) -> Result<Statement> {
        // functions only exist at module level; the root driver intercepts
        // them before dispatch ever reaches this point
        Err(ErrorKind::UnexpectedToken {
            token: "fn".to_string(),
        }
        .at(node.source_location.clone()))
    }

    fn clone_import(&mut self, node: &ImportStatement) -> Result<Statement> {
        Err(ErrorKind::UnexpectedToken {
            token: "import".to_string(),
        }
        .at(node.source_location.clone()))
    }

    // -----------------------------------------------------------------
    // control flow
    // -----------------------------------------------------------------

    fn clone_branch(&mut self, node: &BranchStatement) -> Result<Statement> {
        if node.is_const {
            return self.sanitize_const_branch(node);
        }

        let mut arms = Vec::with_capacity(node.cond_statements.len());
        for arm in &node.cond_statements {
            let condition = self.clone_expression(&arm.condition)?;
            self.check_condition_type(&condition)?;
            let statement = self.sanitize_body(&arm.statement)?;
            arms.push(ConditionalBranch {
                condition,
                statement,
            });
        }

        let else_statement = match &node.else_statement {
            Some(else_statement) => Some(self.sanitize_body(else_statement)?),
            None => None,
        };

        if self.options().split_multiple_branches && arms.len() > 1 {
            // if/else if/else → nested two-way branches
            let mut current_else = else_statement;
            for arm in arms.drain(1..).rev() {
                let location = arm.condition.source_location().clone();
                current_else = Some(Statement::Branch(BranchStatement {
                    cond_statements: vec![arm],
                    else_statement: current_else.map(Box::new),
                    is_const: false,
                    source_location: location,
                }));
            }

            return Ok(Statement::Branch(BranchStatement {
                cond_statements: arms,
                else_statement: current_else.map(Box::new),
                is_const: false,
                source_location: node.source_location.clone(),
            }));
        }

        Ok(Statement::Branch(BranchStatement {
            cond_statements: arms,
            else_statement: else_statement.map(Box::new),
            is_const: false,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_conditional_statement(&mut self, node: &ConditionalStatement) -> Result<Statement> {
        let condition = self.clone_expression(&node.condition)?;

        match self.eval_constant(&condition)?.and_then(|v| v.as_bool()) {
            Some(true) => self.clone_statement(&node.statement),
            Some(false) => Ok(nzsl_ast::builder::no_op()),
            None if self.allow_partial() => {
                Ok(Statement::Conditional(ConditionalStatement {
                    condition,
                    statement: Box::new(self.clone_statement(&node.statement)?),
                    source_location: node.source_location.clone(),
                }))
            }
            None => Err(
                ErrorKind::ConstantExpressionRequired.at(condition.source_location().clone())
            ),
        }
    }

    fn clone_for(&mut self, node: &ForStatement) -> Result<Statement> {
        let from_expr = self.clone_expression(&node.from_expr)?;
        let to_expr = self.clone_expression(&node.to_expr)?;
        let step_expr = match &node.step_expr {
            Some(step) => Some(self.clone_expression(step)?),
            None => None,
        };

        let counter_type = from_expr
            .cached_type()
            .cloned()
            .unwrap_or(ExpressionType::NoType);
        if let Some(to_type) = to_expr.cached_type() {
            if resolve_alias(to_type) != resolve_alias(&counter_type) {
                return Err(ErrorKind::VarDeclarationTypeUnmatching {
                    got: to_type.to_string(),
                    expected: counter_type.to_string(),
                }
                .at(to_expr.source_location().clone()));
            }
        }

        let unroll = self.resolve_unroll(&node.unroll, &node.source_location)?;

        if matches!(unroll.value(), Some(LoopUnroll::Always)) {
            return self.unroll_for(node, &from_expr, &to_expr, step_expr.as_ref(), &counter_type);
        }

        if self.options().reduce_loops_to_while {
            return self.reduce_for_to_while(node, from_expr, to_expr, step_expr, counter_type);
        }

        self.scopes.enter();
        let var_index = self.register_variable(&node.var_name, counter_type);
        self.loop_depth += 1;
        let statement = self.sanitize_body(&node.statement)?;
        self.loop_depth -= 1;
        let var_name = self.variables[var_index].name.clone();
        self.scopes.leave();

        Ok(Statement::For(ForStatement {
            var_index: Some(var_index),
            var_name,
            from_expr: Box::new(from_expr),
            to_expr: Box::new(to_expr),
            step_expr: step_expr.map(Box::new),
            unroll,
            statement: Box::new(statement),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_for_each(&mut self, node: &ForEachStatement) -> Result<Statement> {
        let expression = self.clone_expression(&node.expression)?;

        let Some(expr_type) = expression.cached_type().cloned() else {
            // partial sanitization
            self.scopes.enter();
            let var_index = self.register_variable(&node.var_name, ExpressionType::NoType);
            self.loop_depth += 1;
            let statement = self.sanitize_body(&node.statement)?;
            self.loop_depth -= 1;
            let var_name = self.variables[var_index].name.clone();
            self.scopes.leave();

            return Ok(Statement::ForEach(ForEachStatement {
                var_index: Some(var_index),
                var_name,
                expression: Box::new(expression),
                unroll: clone_expression_value(self, &node.unroll)?,
                statement: Box::new(statement),
                source_location: node.source_location.clone(),
            }));
        };

        let (element_type, length) = match resolve_alias(&expr_type) {
            ExpressionType::Array(array) => {
                if array.length == 0 {
                    return Err(ErrorKind::ArrayLengthRequired.at(node.source_location.clone()));
                }
                ((*array.contained_type).clone(), array.length)
            }
            other => {
                return Err(ErrorKind::ForEachUnsupportedType {
                    ty: other.to_string(),
                }
                .at(node.source_location.clone()))
            }
        };

        let unroll = self.resolve_unroll(&node.unroll, &node.source_location)?;

        if matches!(unroll.value(), Some(LoopUnroll::Always)) {
            return self.unroll_for_each(node, &expression, &element_type, length);
        }

        if self.options().reduce_loops_to_while {
            return self.reduce_for_each_to_while(node, expression, element_type, length);
        }

        self.scopes.enter();
        let var_index = self.register_variable(&node.var_name, element_type);
        self.loop_depth += 1;
        let statement = self.sanitize_body(&node.statement)?;
        self.loop_depth -= 1;
        let var_name = self.variables[var_index].name.clone();
        self.scopes.leave();

        Ok(Statement::ForEach(ForEachStatement {
            var_index: Some(var_index),
            var_name,
            expression: Box::new(expression),
            unroll,
            statement: Box::new(statement),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_while(&mut self, node: &WhileStatement) -> Result<Statement> {
        let condition = self.clone_expression(&node.condition)?;
        self.check_condition_type(&condition)?;

        self.loop_depth += 1;
        let body = self.sanitize_body(&node.body)?;
        self.loop_depth -= 1;

        Ok(Statement::While(WhileStatement {
            condition: Box::new(condition),
            unroll: clone_expression_value(self, &node.unroll)?,
            body: Box::new(body),
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_break(&mut self, node: &BreakStatement) -> Result<Statement> {
        if self.loop_depth == 0 {
            return Err(ErrorKind::LoopControlOutsideOfLoop {
                instruction: "break".to_string(),
            }
            .at(node.source_location.clone()));
        }
        Ok(Statement::Break(node.clone()))
    }

    fn clone_continue(&mut self, node: &ContinueStatement) -> Result<Statement> {
        if self.loop_depth == 0 {
            return Err(ErrorKind::LoopControlOutsideOfLoop {
                instruction: "continue".to_string(),
            }
            .at(node.source_location.clone()));
        }
        Ok(Statement::Continue(node.clone()))
    }

    fn clone_discard(&mut self, node: &DiscardStatement) -> Result<Statement> {
        // discard only exists in the fragment stage
        self.require_stage(ShaderStage::Fragment, &node.source_location);
        Ok(Statement::Discard(node.clone()))
    }

    fn clone_return(&mut self, node: &ReturnStatement) -> Result<Statement> {
        let returned_expr = match &node.returned_expr {
            Some(expr) => Some(self.clone_expression(expr)?),
            None => None,
        };

        if let Some(func_index) = self.current_function {
            let expected = self.functions[func_index].return_type.clone();
            let got = returned_expr
                .as_ref()
                .and_then(|e| e.cached_type().cloned())
                .unwrap_or(ExpressionType::NoType);

            let comparable = !matches!(got, ExpressionType::NoType)
                || matches!(expected, ExpressionType::NoType);
            if comparable && resolve_alias(&got) != resolve_alias(&expected) {
                return Err(ErrorKind::VarDeclarationTypeUnmatching {
                    got: got.to_string(),
                    expected: expected.to_string(),
                }
                .at(node.source_location.clone()));
            }
        }

        Ok(Statement::Return(ReturnStatement {
            returned_expr: returned_expr.map(Box::new),
            source_location: node.source_location.clone(),
        }))
    }
}

impl Sanitizer<'_> {
    fn check_condition_type(&self, condition: &Expression) -> Result<()> {
        if let Some(ty) = condition.cached_type() {
            if resolve_alias(ty) != &ExpressionType::Primitive(PrimitiveType::Boolean) {
                return Err(ErrorKind::ConditionExpectedBool {
                    got: ty.to_string(),
                }
                .at(condition.source_location().clone()));
            }
        }
        Ok(())
    }

    fn check_external_type(
        &self,
        ty: &ExpressionType,
        name: &str,
        location: &SourceLocation,
    ) -> Result<()> {
        let allowed = match resolve_alias(ty) {
            ExpressionType::Sampler(_) | ExpressionType::Uniform(_) => true,
            ExpressionType::Primitive(_) | ExpressionType::Vector(_) | ExpressionType::Matrix(_) => {
                self.has_feature(ModuleFeature::PrimitiveExternals)
            }
            _ => false,
        };

        if !allowed {
            return Err(ErrorKind::ExtTypeNotAllowed {
                name: name.to_string(),
                ty: ty.to_string(),
            }
            .at(location.clone()));
        }

        Ok(())
    }

    /// Bottom a `u32` attribute value out into a constant.
    fn resolve_u32_value(
        &mut self,
        value: &ExpressionValue<u32>,
        attribute: &str,
        location: &SourceLocation,
    ) -> Result<ExpressionValue<u32>> {
        match value {
            ExpressionValue::Unset => Ok(ExpressionValue::Unset),
            ExpressionValue::Value(v) => Ok(ExpressionValue::Value(*v)),
            ExpressionValue::Expression(expr) => {
                let sanitized = self.clone_expression(expr)?;
                match self.eval_constant(&sanitized)?.and_then(|v| v.as_u32()) {
                    Some(v) => Ok(ExpressionValue::Value(v)),
                    None if self.allow_partial() => {
                        Ok(ExpressionValue::Expression(Box::new(sanitized)))
                    }
                    None => Err(ErrorKind::AttributeInvalidParameter {
                        attribute: attribute.to_string(),
                        parameter: describe_value(&sanitized),
                    }
                    .at(location.clone())),
                }
            }
        }
    }

    /// Bottom a `bool` attribute value (`cond`) out into a constant.
    fn resolve_bool_value(
        &mut self,
        value: &ExpressionValue<bool>,
        location: &SourceLocation,
    ) -> Result<ExpressionValue<bool>> {
        match value {
            ExpressionValue::Unset => Ok(ExpressionValue::Unset),
            ExpressionValue::Value(v) => Ok(ExpressionValue::Value(*v)),
            ExpressionValue::Expression(expr) => {
                let sanitized = self.clone_expression(expr)?;
                match self.eval_constant(&sanitized)?.and_then(|v| v.as_bool()) {
                    Some(v) => Ok(ExpressionValue::Value(v)),
                    None if self.allow_partial() => {
                        Ok(ExpressionValue::Expression(Box::new(sanitized)))
                    }
                    None => {
                        Err(ErrorKind::ConstantExpressionRequired.at(location.clone()))
                    }
                }
            }
        }
    }

    fn resolve_unroll(
        &mut self,
        value: &ExpressionValue<LoopUnroll>,
        location: &SourceLocation,
    ) -> Result<ExpressionValue<LoopUnroll>> {
        match value {
            ExpressionValue::Expression(_) => Err(ErrorKind::AttributeInvalidParameter {
                attribute: "unroll".to_string(),
                parameter: "<expression>".to_string(),
            }
            .at(location.clone())),
            other => clone_expression_value(self, other),
        }
    }

    /// `const if`: conditions must fold, the first true arm is spliced
    /// inline (unwrapping one scope level), a missing else folds to no-op.
    fn sanitize_const_branch(&mut self, node: &BranchStatement) -> Result<Statement> {
        for arm in &node.cond_statements {
            let condition = self.clone_expression(&arm.condition)?;
            match self.eval_constant(&condition)?.and_then(|v| v.as_bool()) {
                Some(true) => {
                    let body = self.sanitize_body(&arm.statement)?;
                    return Ok(unscope(body));
                }
                Some(false) => continue,
                None if self.allow_partial() => {
                    // cannot resolve yet: re-sanitize as a live const branch
                    return self.keep_partial_const_branch(node);
                }
                None => {
                    return Err(ErrorKind::ConstantExpressionRequired
                        .at(condition.source_location().clone()))
                }
            }
        }

        match &node.else_statement {
            Some(else_statement) => {
                let body = self.sanitize_body(else_statement)?;
                Ok(unscope(body))
            }
            None => Ok(nzsl_ast::builder::no_op()),
        }
    }

    fn keep_partial_const_branch(&mut self, node: &BranchStatement) -> Result<Statement> {
        let mut arms = Vec::with_capacity(node.cond_statements.len());
        for arm in &node.cond_statements {
            arms.push(ConditionalBranch {
                condition: self.clone_expression(&arm.condition)?,
                statement: self.sanitize_body(&arm.statement)?,
            });
        }
        let else_statement = match &node.else_statement {
            Some(else_statement) => Some(Box::new(self.sanitize_body(else_statement)?)),
            None => None,
        };

        Ok(Statement::Branch(BranchStatement {
            cond_statements: arms,
            else_statement,
            is_const: true,
            source_location: node.source_location.clone(),
        }))
    }

    // -----------------------------------------------------------------
    // loop lowering
    // -----------------------------------------------------------------

    /// `for i in A -> B : S { body }` → `{ let i = A; while (i < B) {
    /// body; i = i + S; } }`
    fn reduce_for_to_while(
        &mut self,
        node: &ForStatement,
        from_expr: Expression,
        to_expr: Expression,
        step_expr: Option<Expression>,
        counter_type: ExpressionType,
    ) -> Result<Statement> {
        let location = node.source_location.clone();

        self.scopes.enter();
        let var_index = self.register_variable(&node.var_name, counter_type.clone());
        let var_name = self.variables[var_index].name.clone();

        let counter_var = Expression::VariableValue(VariableValueExpression {
            variable_id: var_index,
            cached_type: Some(counter_type.clone()),
            source_location: location.clone(),
        });

        let declaration = Statement::DeclareVariable(DeclareVariableStatement {
            var_index: Some(var_index),
            var_name: var_name.clone(),
            var_type: ExpressionValue::Value(counter_type.clone()),
            initial_expression: Some(Box::new(from_expr)),
            source_location: location.clone(),
        });

        let condition = Expression::Binary(BinaryExpression {
            op: BinaryOp::CompLt,
            left: Box::new(counter_var.clone()),
            right: Box::new(to_expr),
            cached_type: Some(ExpressionType::Primitive(PrimitiveType::Boolean)),
            source_location: location.clone(),
        });

        self.loop_depth += 1;
        let body = self.sanitize_body(&node.statement)?;
        self.loop_depth -= 1;

        let step = match step_expr {
            Some(step) => step,
            None => Expression::ConstantValue(ConstantValueExpression {
                value: one_of_type(&counter_type),
                cached_type: Some(counter_type.clone()),
                source_location: location.clone(),
            }),
        };
        let increment = Statement::Expression(ExpressionStatement {
            expression: Expression::Assign(AssignExpression {
                op: AssignOp::Simple,
                left: Box::new(counter_var.clone()),
                right: Box::new(Expression::Binary(BinaryExpression {
                    op: BinaryOp::Add,
                    left: Box::new(counter_var),
                    right: Box::new(step),
                    cached_type: Some(counter_type.clone()),
                    source_location: location.clone(),
                })),
                cached_type: Some(counter_type),
                source_location: location.clone(),
            }),
            source_location: location.clone(),
        });

        let body = append_statement(body, increment);

        self.scopes.leave();

        Ok(Statement::Scoped(ScopedStatement {
            statement: Box::new(Statement::Multi(MultiStatement {
                statements: vec![
                    declaration,
                    Statement::While(WhileStatement {
                        condition: Box::new(condition),
                        unroll: ExpressionValue::Unset,
                        body: Box::new(body),
                        source_location: location.clone(),
                    }),
                ],
                source_location: location.clone(),
            })),
            source_location: location,
        }))
    }

    /// `for v in arr { body }` → indexed while loop.
    fn reduce_for_each_to_while(
        &mut self,
        node: &ForEachStatement,
        array_expr: Expression,
        element_type: ExpressionType,
        length: u32,
    ) -> Result<Statement> {
        let location = node.source_location.clone();
        let u32_type = ExpressionType::Primitive(PrimitiveType::UInt32);

        self.scopes.enter();

        let counter_index = self.register_variable("i", u32_type.clone());
        let counter_name = self.variables[counter_index].name.clone();
        let counter_var = Expression::VariableValue(VariableValueExpression {
            variable_id: counter_index,
            cached_type: Some(u32_type.clone()),
            source_location: location.clone(),
        });

        let counter_declaration = Statement::DeclareVariable(DeclareVariableStatement {
            var_index: Some(counter_index),
            var_name: counter_name,
            var_type: ExpressionValue::Value(u32_type.clone()),
            initial_expression: Some(Box::new(Expression::ConstantValue(
                ConstantValueExpression {
                    value: ConstantValue::U32(0),
                    cached_type: Some(u32_type.clone()),
                    source_location: location.clone(),
                },
            ))),
            source_location: location.clone(),
        });

        let condition = Expression::Binary(BinaryExpression {
            op: BinaryOp::CompLt,
            left: Box::new(counter_var.clone()),
            right: Box::new(Expression::ConstantValue(ConstantValueExpression {
                value: ConstantValue::U32(length),
                cached_type: Some(u32_type.clone()),
                source_location: location.clone(),
            })),
            cached_type: Some(ExpressionType::Primitive(PrimitiveType::Boolean)),
            source_location: location.clone(),
        });

        // the element binding lives in the loop body's scope
        self.scopes.enter();
        let element_index = self.register_variable(&node.var_name, element_type.clone());
        let element_name = self.variables[element_index].name.clone();

        let element_declaration = Statement::DeclareVariable(DeclareVariableStatement {
            var_index: Some(element_index),
            var_name: element_name,
            var_type: ExpressionValue::Value(element_type.clone()),
            initial_expression: Some(Box::new(Expression::AccessIndex(AccessIndexExpression {
                expr: Box::new(array_expr),
                indices: vec![counter_var.clone()],
                cached_type: Some(element_type),
                source_location: location.clone(),
            }))),
            source_location: location.clone(),
        });

        self.loop_depth += 1;
        let mut body_statements = self.sanitize_body_statements(&node.statement)?;
        self.loop_depth -= 1;
        self.scopes.leave();

        let increment = Statement::Expression(ExpressionStatement {
            expression: Expression::Assign(AssignExpression {
                op: AssignOp::Simple,
                left: Box::new(counter_var.clone()),
                right: Box::new(Expression::Binary(BinaryExpression {
                    op: BinaryOp::Add,
                    left: Box::new(counter_var),
                    right: Box::new(Expression::ConstantValue(ConstantValueExpression {
                        value: ConstantValue::U32(1),
                        cached_type: Some(u32_type.clone()),
                        source_location: location.clone(),
                    })),
                    cached_type: Some(u32_type.clone()),
                    source_location: location.clone(),
                })),
                cached_type: Some(u32_type),
                source_location: location.clone(),
            }),
            source_location: location.clone(),
        });

        let mut statements = vec![element_declaration];
        statements.append(&mut body_statements);
        statements.push(increment);

        self.scopes.leave();

        Ok(Statement::Scoped(ScopedStatement {
            statement: Box::new(Statement::Multi(MultiStatement {
                statements: vec![
                    counter_declaration,
                    Statement::While(WhileStatement {
                        condition: Box::new(condition),
                        unroll: ExpressionValue::Unset,
                        body: Box::new(Statement::Multi(MultiStatement {
                            statements,
                            source_location: location.clone(),
                        })),
                        source_location: location.clone(),
                    }),
                ],
                source_location: location.clone(),
            })),
            source_location: location,
        }))
    }

    /// Unroll a numeric `for` into one lexical scope per iteration, the
    /// induction variable pinned to a constant.
    fn unroll_for(
        &mut self,
        node: &ForStatement,
        from_expr: &Expression,
        to_expr: &Expression,
        step_expr: Option<&Expression>,
        counter_type: &ExpressionType,
    ) -> Result<Statement> {
        let location = &node.source_location;

        let from = self.require_integer_constant(from_expr)?;
        let to = self.require_integer_constant(to_expr)?;
        let step = match step_expr {
            Some(step) => self.require_integer_constant(step)?,
            None => 1,
        };
        if step <= 0 {
            return Err(ErrorKind::ConstantExpressionRequired.at(location.clone()));
        }

        let mut scopes = Vec::new();
        let mut value = from;
        while value < to {
            self.scopes.enter();
            let var_index = self.register_variable(&node.var_name, counter_type.clone());
            let var_name = self.variables[var_index].name.clone();

            let declaration = Statement::DeclareVariable(DeclareVariableStatement {
                var_index: Some(var_index),
                var_name,
                var_type: ExpressionValue::Value(counter_type.clone()),
                initial_expression: Some(Box::new(Expression::ConstantValue(
                    ConstantValueExpression {
                        value: integer_of_type(counter_type, value),
                        cached_type: Some(counter_type.clone()),
                        source_location: location.clone(),
                    },
                ))),
                source_location: location.clone(),
            });

            // loop control cannot escape an unrolled iteration
            let saved_depth = std::mem::replace(&mut self.loop_depth, 0);
            let mut statements = vec![declaration];
            statements.extend(self.sanitize_body_statements(&node.statement)?);
            self.loop_depth = saved_depth;
            self.scopes.leave();

            scopes.push(Statement::Scoped(ScopedStatement {
                statement: Box::new(Statement::Multi(MultiStatement {
                    statements,
                    source_location: location.clone(),
                })),
                source_location: location.clone(),
            }));

            value += step;
        }

        Ok(Statement::Multi(MultiStatement {
            statements: scopes,
            source_location: location.clone(),
        }))
    }

    /// Unroll a `for each` into one scope per array element.
    fn unroll_for_each(
        &mut self,
        node: &ForEachStatement,
        array_expr: &Expression,
        element_type: &ExpressionType,
        length: u32,
    ) -> Result<Statement> {
        let location = &node.source_location;
        let mut scopes = Vec::with_capacity(length as usize);

        for index in 0..length {
            self.scopes.enter();
            let var_index = self.register_variable(&node.var_name, element_type.clone());
            let var_name = self.variables[var_index].name.clone();

            let declaration = Statement::DeclareVariable(DeclareVariableStatement {
                var_index: Some(var_index),
                var_name,
                var_type: ExpressionValue::Value(element_type.clone()),
                initial_expression: Some(Box::new(Expression::AccessIndex(
                    AccessIndexExpression {
                        expr: Box::new(array_expr.clone()),
                        indices: vec![Expression::ConstantValue(ConstantValueExpression {
                            value: ConstantValue::U32(index),
                            cached_type: Some(ExpressionType::Primitive(PrimitiveType::UInt32)),
                            source_location: location.clone(),
                        })],
                        cached_type: Some(element_type.clone()),
                        source_location: location.clone(),
                    },
                ))),
                source_location: location.clone(),
            });

            let saved_depth = std::mem::replace(&mut self.loop_depth, 0);
            let mut statements = vec![declaration];
            statements.extend(self.sanitize_body_statements(&node.statement)?);
            self.loop_depth = saved_depth;
            self.scopes.leave();

            scopes.push(Statement::Scoped(ScopedStatement {
                statement: Box::new(Statement::Multi(MultiStatement {
                    statements,
                    source_location: location.clone(),
                })),
                source_location: location.clone(),
            }));
        }

        Ok(Statement::Multi(MultiStatement {
            statements: scopes,
            source_location: location.clone(),
        }))
    }

    fn require_integer_constant(&self, expr: &Expression) -> Result<i64> {
        let value = self.eval_constant(expr)?;
        let value = match value {
            Some(ConstantValue::I32(v)) => Some(v as i64),
            Some(ConstantValue::U32(v)) => Some(v as i64),
            _ => None,
        };

        value.ok_or_else(|| {
            ErrorKind::ConstantExpressionRequired.at(expr.source_location().clone())
        })
    }
}

/// `1` in the counter's type.
fn one_of_type(ty: &ExpressionType) -> ConstantValue {
    integer_of_type(ty, 1)
}

fn integer_of_type(ty: &ExpressionType, value: i64) -> ConstantValue {
    match resolve_alias(ty) {
        ExpressionType::Primitive(PrimitiveType::UInt32) => ConstantValue::U32(value as u32),
        _ => ConstantValue::I32(value as i32),
    }
}

/// Splice a statement onto the end of a body produced by
/// [`Sanitizer::sanitize_body`].
fn append_statement(body: Statement, statement: Statement) -> Statement {
    match body {
        Statement::Multi(mut multi) => {
            multi.statements.push(statement);
            Statement::Multi(multi)
        }
        Statement::Scoped(scoped) => {
            let inner = append_statement(*scoped.statement, statement);
            Statement::Scoped(ScopedStatement {
                statement: Box::new(inner),
                source_location: scoped.source_location,
            })
        }
        other => Statement::Multi(MultiStatement {
            source_location: other.source_location().clone(),
            statements: vec![other, statement],
        }),
    }
}

/// Drop the scope wrapper around a selected `const if` arm so its body
/// splices inline.
fn unscope(statement: Statement) -> Statement {
    match statement {
        Statement::Scoped(scoped) => *scoped.statement,
        other => other,
    }
}

fn describe_value(expr: &Expression) -> String {
    expr.cached_type()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "<expression>".to_string())
}

/// Declared type against initializer type.
fn check_declaration_type(
    expected: &ExpressionType,
    initial_type: &Option<ExpressionType>,
    initial: Option<&Expression>,
    node: &DeclareVariableStatement,
) -> Result<()> {
    let Some(got) = initial_type else {
        return Ok(());
    };

    if resolve_alias(got) != resolve_alias(expected) {
        let location = initial
            .map(|e| e.source_location().clone())
            .unwrap_or_else(|| node.source_location.clone());
        return Err(ErrorKind::VarDeclarationTypeUnmatching {
            got: got.to_string(),
            expected: expected.to_string(),
        }
        .at(location));
    }

    Ok(())
}
