//! Expression resolution and type checking.
//!
//! Bottom-up: children are sanitized first, then the parent node is
//! resolved, validated and given its `cached_type`. Identifier expressions
//! never survive — they become variable/function/struct/alias/constant
//! references or intrinsic values. Under partial sanitization, unresolved
//! subtrees keep a `None` cached type and validation involving them is
//! skipped.

use super::{ConstantData, Identifier, Sanitizer};
use nzsl_ast::ast::*;
use nzsl_ast::cloner::Cloner;
use nzsl_ast::error::{ErrorKind, Result};
use nzsl_ast::foundation::SourceLocation;
use nzsl_ast::types::{
    is_cast_allowed, ArrayType, ExpressionType, FunctionType, MatrixType, PrimitiveType,
    SamplerType, StructType, VectorType,
};
use nzsl_ast::value::{ops, ConstantValue};
use nzsl_ast::resolve_alias;

/// Swizzle letter sets: `xyzw` and the `rgba` aliases.
fn swizzle_component(letter: char) -> Option<u32> {
    match letter {
        'x' | 'r' => Some(0),
        'y' | 'g' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// Result type of a binary operation, `None` when unsupported.
fn binary_result_type(op: BinaryOp, left: &ExpressionType, right: &ExpressionType) -> Option<ExpressionType> {
    use BinaryOp::*;

    let left = resolve_alias(left);
    let right = resolve_alias(right);

    let bool_type = ExpressionType::Primitive(PrimitiveType::Boolean);

    match op {
        CompEq | CompNe => (left == right).then(|| bool_type),
        CompGe | CompGt | CompLe | CompLt => match (left, right) {
            (ExpressionType::Primitive(a), ExpressionType::Primitive(b))
                if a == b && a.is_numeric() =>
            {
                Some(bool_type)
            }
            _ => None,
        },
        LogicalAnd | LogicalOr => {
            (left == &bool_type && right == &bool_type).then(|| bool_type)
        }
        Add | Subtract => match (left, right) {
            (ExpressionType::Primitive(a), ExpressionType::Primitive(b))
                if a == b && a.is_numeric() =>
            {
                Some(left.clone())
            }
            (ExpressionType::Vector(a), ExpressionType::Vector(b)) if a == b => Some(left.clone()),
            (ExpressionType::Matrix(a), ExpressionType::Matrix(b)) if a == b => Some(left.clone()),
            _ => None,
        },
        Divide | Modulo => match (left, right) {
            (ExpressionType::Primitive(a), ExpressionType::Primitive(b))
                if a == b && a.is_numeric() =>
            {
                Some(left.clone())
            }
            (ExpressionType::Vector(a), ExpressionType::Vector(b)) if a == b => Some(left.clone()),
            (ExpressionType::Vector(v), ExpressionType::Primitive(p))
                if v.component_type == *p && p.is_numeric() =>
            {
                Some(left.clone())
            }
            _ => None,
        },
        Multiply => match (left, right) {
            (ExpressionType::Primitive(a), ExpressionType::Primitive(b))
                if a == b && a.is_numeric() =>
            {
                Some(left.clone())
            }
            (ExpressionType::Vector(a), ExpressionType::Vector(b)) if a == b => Some(left.clone()),
            (ExpressionType::Primitive(p), ExpressionType::Vector(v))
                if v.component_type == *p && p.is_numeric() =>
            {
                Some(right.clone())
            }
            (ExpressionType::Vector(v), ExpressionType::Primitive(p))
                if v.component_type == *p && p.is_numeric() =>
            {
                Some(left.clone())
            }
            (ExpressionType::Matrix(a), ExpressionType::Matrix(b))
                if a.component_type == b.component_type && a.column_count == b.row_count =>
            {
                Some(ExpressionType::Matrix(MatrixType {
                    column_count: b.column_count,
                    row_count: a.row_count,
                    component_type: a.component_type,
                }))
            }
            (ExpressionType::Matrix(m), ExpressionType::Vector(v))
                if m.component_type == v.component_type && m.column_count == v.component_count =>
            {
                Some(ExpressionType::Vector(VectorType {
                    component_count: m.row_count,
                    component_type: m.component_type,
                }))
            }
            (ExpressionType::Matrix(m), ExpressionType::Primitive(p))
            | (ExpressionType::Primitive(p), ExpressionType::Matrix(m))
                if m.component_type == *p =>
            {
                Some(ExpressionType::Matrix(*m))
            }
            _ => None,
        },
    }
}

impl Sanitizer<'_> {
    /// Cached type of a sanitized expression; `None` only under partial
    /// sanitization.
    fn cached(&self, expr: &Expression) -> Option<ExpressionType> {
        expr.cached_type().cloned()
    }

    // -----------------------------------------------------------------
    // type positions
    // -----------------------------------------------------------------

    /// Bottom an [`ExpressionValue`] type out into a concrete type.
    ///
    /// Already-resolved values pass through (alias-resolved when aliases
    /// are being removed); expression forms are sanitized and must denote a
    /// type (a struct name, an alias to one).
    pub(crate) fn resolve_type_value(
        &mut self,
        value: &ExpressionValue<ExpressionType>,
        location: &SourceLocation,
    ) -> Result<Option<ExpressionType>> {
        match value {
            ExpressionValue::Unset => Ok(None),
            ExpressionValue::Value(ty) => Ok(Some(self.normalize_type(ty))),
            ExpressionValue::Expression(expr) => {
                let sanitized = self.clone_expression(expr)?;
                match self.type_from_expression(&sanitized) {
                    Some(ty) => Ok(Some(self.normalize_type(&ty))),
                    None if self.allow_partial() => Ok(None),
                    None => Err(ErrorKind::UnknownIdentifier {
                        identifier: describe_expression(&sanitized),
                    }
                    .at(location.clone())),
                }
            }
        }
    }

    /// Strip aliases when `remove_aliases` is on.
    pub(crate) fn normalize_type(&self, ty: &ExpressionType) -> ExpressionType {
        if self.options().remove_aliases {
            resolve_alias(ty).clone()
        } else {
            ty.clone()
        }
    }

    /// The type denoted by a type-position expression.
    fn type_from_expression(&self, expr: &Expression) -> Option<ExpressionType> {
        match expr {
            Expression::StructType(node) => Some(ExpressionType::Struct(StructType {
                struct_index: node.struct_type_id,
            })),
            Expression::AliasValue(node) => {
                let target = &self.aliases[node.alias_id].target_type;
                match target {
                    // alias to a struct used in type position
                    ExpressionType::Type(inner) => Some((**inner).clone()),
                    other => Some(other.clone()),
                }
            }
            _ => match expr.cached_type() {
                Some(ExpressionType::Type(inner)) => Some((*inner.clone())),
                _ => None,
            },
        }
    }

    // -----------------------------------------------------------------
    // identifiers
    // -----------------------------------------------------------------

    pub(crate) fn sanitize_identifier(&mut self, node: &IdentifierExpression) -> Result<Expression> {
        match self.scopes.resolve(&node.identifier).cloned() {
            Some(identifier) => {
                self.identifier_to_expression(&identifier, &node.source_location)
            }
            None if self.allow_partial() => Ok(Expression::Identifier(node.clone())),
            None => Err(ErrorKind::UnknownIdentifier {
                identifier: node.identifier.clone(),
            }
            .at(node.source_location.clone())),
        }
    }

    /// Materialize a resolved identifier as the corresponding typed
    /// reference expression.
    pub(crate) fn identifier_to_expression(
        &mut self,
        identifier: &Identifier,
        location: &SourceLocation,
    ) -> Result<Expression> {
        match identifier {
            Identifier::Variable(var_index) => {
                let ty = self.variables[*var_index].ty.clone();
                Ok(Expression::VariableValue(VariableValueExpression {
                    variable_id: *var_index,
                    cached_type: Some(ty),
                    source_location: location.clone(),
                }))
            }
            Identifier::Function(func_index) => Ok(Expression::Function(FunctionExpression {
                func_id: *func_index,
                cached_type: Some(ExpressionType::Function(FunctionType {
                    func_index: *func_index,
                })),
                source_location: location.clone(),
            })),
            Identifier::Struct(struct_index) => Ok(Expression::StructType(StructTypeExpression {
                struct_type_id: *struct_index,
                cached_type: Some(ExpressionType::Type(Box::new(ExpressionType::Struct(
                    StructType {
                        struct_index: *struct_index,
                    },
                )))),
                source_location: location.clone(),
            })),
            Identifier::Alias(alias_index) => {
                if self.options().remove_aliases {
                    let target = self.aliases[*alias_index].target.clone();
                    self.identifier_to_expression(&target, location)
                } else {
                    let target_type = self.aliases[*alias_index].target_type.clone();
                    Ok(Expression::AliasValue(AliasValueExpression {
                        alias_id: *alias_index,
                        cached_type: Some(ExpressionType::Alias(nzsl_ast::types::AliasType {
                            alias_index: *alias_index,
                            target_type: Box::new(target_type),
                        })),
                        source_location: location.clone(),
                    }))
                }
            }
            Identifier::Constant(const_index) => self.constant_reference(*const_index, location),
            Identifier::Option { const_index, .. } => {
                // option references always bottom out into their value
                let constant = &self.constants[*const_index];
                match &constant.value {
                    Some(value) => Ok(Expression::ConstantValue(ConstantValueExpression {
                        value: value.clone(),
                        cached_type: Some(constant.ty.clone()),
                        source_location: location.clone(),
                    })),
                    None => Err(ErrorKind::ConstantExpressionRequired.at(location.clone())),
                }
            }
            Identifier::Intrinsic(intrinsic) => {
                Ok(Expression::IntrinsicFunction(IntrinsicFunctionExpression {
                    intrinsic_id: *intrinsic as usize,
                    cached_type: Some(ExpressionType::IntrinsicFunction(
                        nzsl_ast::types::IntrinsicFunctionType {
                            intrinsic_index: *intrinsic as usize,
                        },
                    )),
                    source_location: location.clone(),
                }))
            }
        }
    }

    fn constant_reference(&mut self, const_index: usize, location: &SourceLocation) -> Result<Expression> {
        let ConstantData { ty, value, expression, .. } = &self.constants[const_index];

        if self.options().remove_const_declaration {
            if let Some(value) = value {
                return Ok(Expression::ConstantValue(ConstantValueExpression {
                    value: value.clone(),
                    cached_type: Some(ty.clone()),
                    source_location: location.clone(),
                }));
            }
            // not representable as a single constant (e.g. array literals):
            // inline the sanitized initializer instead
            return Ok(expression.clone());
        }

        Ok(Expression::Constant(ConstantExpression {
            constant_id: const_index,
            cached_type: Some(ty.clone()),
            source_location: location.clone(),
        }))
    }

    // -----------------------------------------------------------------
    // accesses and swizzles
    // -----------------------------------------------------------------

    pub(crate) fn sanitize_access_identifier(
        &mut self,
        node: &AccessIdentifierExpression,
    ) -> Result<Expression> {
        let mut current = self.clone_expression(&node.expr)?;

        for entry in &node.identifiers {
            let Some(base_type) = self.cached(&current) else {
                // partial sanitization: keep the rest of the chain untouched
                return Ok(Expression::AccessIdentifier(AccessIdentifierExpression {
                    expr: Box::new(current),
                    identifiers: node.identifiers.clone(),
                    cached_type: None,
                    source_location: node.source_location.clone(),
                }));
            };

            current = self.access_member(current, &base_type, entry)?;
        }

        Ok(current)
    }

    /// One step of a member access chain.
    fn access_member(
        &mut self,
        base: Expression,
        base_type: &ExpressionType,
        entry: &AccessIdentifierEntry,
    ) -> Result<Expression> {
        let location = &entry.source_location;

        match resolve_alias(base_type) {
            ExpressionType::Struct(s) => {
                self.struct_member_access(base, s.struct_index, entry)
            }
            ExpressionType::Uniform(u) => {
                self.struct_member_access(base, u.contained_type.struct_index, entry)
            }
            ExpressionType::Vector(v) => {
                let components = parse_swizzle(&entry.identifier, v.component_count)
                    .ok_or_else(|| {
                        ErrorKind::InvalidSwizzle {
                            swizzle: entry.identifier.clone(),
                        }
                        .at(location.clone())
                    })?;
                self.build_swizzle(base, v.component_type, &components, location)
            }
            ExpressionType::Primitive(p) if p.is_numeric() => {
                // scalar swizzle: only the first component may be named
                let components = parse_swizzle(&entry.identifier, 1).ok_or_else(|| {
                    ErrorKind::InvalidSwizzle {
                        swizzle: entry.identifier.clone(),
                    }
                    .at(location.clone())
                })?;
                self.build_swizzle(base, *p, &components, location)
            }
            other => Err(ErrorKind::UnknownIdentifier {
                identifier: format!("{} on type {}", entry.identifier, other),
            }
            .at(location.clone())),
        }
    }

    fn struct_member_access(
        &mut self,
        base: Expression,
        struct_index: usize,
        entry: &AccessIdentifierEntry,
    ) -> Result<Expression> {
        let location = &entry.source_location;
        let description = &self.structs[struct_index].description;

        // member index counts enabled members only, so indices stay valid
        // once disabled members are eliminated
        let mut member_index = 0u32;
        let mut found = None;
        for member in &description.members {
            if matches!(member.cond.value(), Some(false)) {
                continue;
            }
            if member.name == entry.identifier {
                found = Some((member_index, member));
                break;
            }
            member_index += 1;
        }

        let (member_index, member) = found.ok_or_else(|| {
            ErrorKind::UnknownIdentifier {
                identifier: entry.identifier.clone(),
            }
            .at(location.clone())
        })?;

        let member_type = member.member_type.value().cloned().ok_or_else(|| {
            ErrorKind::UnknownIdentifier {
                identifier: entry.identifier.clone(),
            }
            .at(location.clone())
        })?;
        let member_type = self.normalize_type(&member_type);

        if self.options().use_identifier_accesses_for_structs {
            Ok(Expression::AccessIdentifier(AccessIdentifierExpression {
                expr: Box::new(base),
                identifiers: vec![entry.clone()],
                cached_type: Some(member_type),
                source_location: location.clone(),
            }))
        } else {
            Ok(Expression::AccessIndex(AccessIndexExpression {
                expr: Box::new(base),
                indices: vec![Expression::ConstantValue(ConstantValueExpression {
                    value: ConstantValue::U32(member_index),
                    cached_type: Some(ExpressionType::Primitive(PrimitiveType::UInt32)),
                    source_location: location.clone(),
                })],
                cached_type: Some(member_type),
                source_location: location.clone(),
            }))
        }
    }

    fn build_swizzle(
        &mut self,
        base: Expression,
        component_type: PrimitiveType,
        components: &[u32],
        location: &SourceLocation,
    ) -> Result<Expression> {
        let mut component_array = [0u32; 4];
        component_array[..components.len()].copy_from_slice(components);

        let cached_type = if components.len() == 1 {
            ExpressionType::Primitive(component_type)
        } else {
            ExpressionType::Vector(VectorType {
                component_count: components.len() as u32,
                component_type,
            })
        };

        let swizzle = SwizzleExpression {
            expression: Box::new(base),
            components: component_array,
            component_count: components.len(),
            cached_type: Some(cached_type),
            source_location: location.clone(),
        };

        self.sanitize_swizzle_node(swizzle)
    }

    pub(crate) fn sanitize_swizzle(&mut self, node: &SwizzleExpression) -> Result<Expression> {
        let expression = self.clone_expression(&node.expression)?;

        let Some(base_type) = self.cached(&expression) else {
            return Ok(Expression::Swizzle(SwizzleExpression {
                expression: Box::new(expression),
                components: node.components,
                component_count: node.component_count,
                cached_type: None,
                source_location: node.source_location.clone(),
            }));
        };

        let (component_type, source_count) = match resolve_alias(&base_type) {
            ExpressionType::Vector(v) => (v.component_type, v.component_count),
            ExpressionType::Primitive(p) if p.is_numeric() => (*p, 1),
            other => {
                return Err(ErrorKind::InvalidSwizzle {
                    swizzle: other.to_string(),
                }
                .at(node.source_location.clone()))
            }
        };

        for component in node.active_components() {
            if *component >= source_count {
                return Err(ErrorKind::InvalidSwizzle {
                    swizzle: format!("component #{}", component),
                }
                .at(node.source_location.clone()));
            }
        }

        let cached_type = if node.component_count == 1 {
            ExpressionType::Primitive(component_type)
        } else {
            ExpressionType::Vector(VectorType {
                component_count: node.component_count as u32,
                component_type,
            })
        };

        self.sanitize_swizzle_node(SwizzleExpression {
            expression: Box::new(expression),
            components: node.components,
            component_count: node.component_count,
            cached_type: Some(cached_type),
            source_location: node.source_location.clone(),
        })
    }

    /// Final swizzle form: scalar swizzles become casts when requested.
    fn sanitize_swizzle_node(&mut self, node: SwizzleExpression) -> Result<Expression> {
        let scalar_source = matches!(
            self.cached(&node.expression).map(|t| resolve_alias(&t).clone()),
            Some(ExpressionType::Primitive(_))
        );

        if scalar_source && self.options().remove_scalar_swizzling {
            if node.component_count == 1 {
                return Ok(*node.expression);
            }

            let target_type = node
                .cached_type
                .clone()
                .expect("scalar swizzles always carry a type");
            return Ok(Expression::Cast(CastExpression {
                target_type: ExpressionValue::Value(target_type.clone()),
                expressions: vec![*node.expression],
                cached_type: Some(target_type),
                source_location: node.source_location,
            }));
        }

        Ok(Expression::Swizzle(node))
    }

    pub(crate) fn sanitize_access_index(&mut self, node: &AccessIndexExpression) -> Result<Expression> {
        let mut current = self.clone_expression(&node.expr)?;

        for index in &node.indices {
            let index = self.clone_expression(index)?;
            let Some(base_type) = self.cached(&current) else {
                return Ok(Expression::AccessIndex(AccessIndexExpression {
                    expr: Box::new(current),
                    indices: vec![index],
                    cached_type: None,
                    source_location: node.source_location.clone(),
                }));
            };

            current = self.access_by_index(current, &base_type, index, &node.source_location)?;
        }

        Ok(current)
    }

    fn access_by_index(
        &mut self,
        base: Expression,
        base_type: &ExpressionType,
        index: Expression,
        location: &SourceLocation,
    ) -> Result<Expression> {
        let index_type = self.cached(&index);
        if let Some(index_type) = &index_type {
            if !matches!(
                resolve_alias(index_type),
                ExpressionType::Primitive(PrimitiveType::Int32)
                    | ExpressionType::Primitive(PrimitiveType::UInt32)
            ) {
                return Err(ErrorKind::InvalidIndexType {
                    got: index_type.to_string(),
                }
                .at(location.clone()));
            }
        }

        let result_type = match resolve_alias(base_type) {
            ExpressionType::Array(a) => (*a.contained_type).clone(),
            ExpressionType::Vector(v) => ExpressionType::Primitive(v.component_type),
            ExpressionType::Matrix(m) => ExpressionType::Vector(m.column_type()),
            ExpressionType::Struct(s) => {
                // constant index into a struct (produced by member lowering)
                let member_index = match &index {
                    Expression::ConstantValue(value) => value.value.as_u32(),
                    _ => None,
                };
                let member_index = member_index.ok_or_else(|| {
                    ErrorKind::ConstantExpressionRequired.at(location.clone())
                })?;

                let description = &self.structs[s.struct_index].description;
                let member_type = description
                    .members
                    .iter()
                    .filter(|m| !matches!(m.cond.value(), Some(false)))
                    .nth(member_index as usize)
                    .and_then(|m| m.member_type.value())
                    .ok_or_else(|| {
                        ErrorKind::ConstantExpressionRequired.at(location.clone())
                    })?;
                self.normalize_type(member_type)
            }
            ExpressionType::Uniform(u) => {
                return self.access_by_index(
                    base,
                    &ExpressionType::Struct(u.contained_type),
                    index,
                    location,
                )
            }
            other => {
                return Err(ErrorKind::BinaryUnsupported {
                    op: "[]".to_string(),
                    left: other.to_string(),
                    right: index_type
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "<unknown>".to_string()),
                }
                .at(location.clone()))
            }
        };

        Ok(Expression::AccessIndex(AccessIndexExpression {
            expr: Box::new(base),
            indices: vec![index],
            cached_type: Some(result_type),
            source_location: location.clone(),
        }))
    }

    // -----------------------------------------------------------------
    // operators
    // -----------------------------------------------------------------

    pub(crate) fn sanitize_binary(&mut self, node: &BinaryExpression) -> Result<Expression> {
        let left = self.clone_expression(&node.left)?;
        let right = self.clone_expression(&node.right)?;

        let cached_type = match (self.cached(&left), self.cached(&right)) {
            (Some(lt), Some(rt)) => Some(
                binary_result_type(node.op, &lt, &rt).ok_or_else(|| {
                    ErrorKind::BinaryUnsupported {
                        op: node.op.token().to_string(),
                        left: lt.to_string(),
                        right: rt.to_string(),
                    }
                    .at(node.source_location.clone())
                })?,
            ),
            _ => None,
        };

        Ok(Expression::Binary(BinaryExpression {
            op: node.op,
            left: Box::new(left),
            right: Box::new(right),
            cached_type,
            source_location: node.source_location.clone(),
        }))
    }

    pub(crate) fn sanitize_unary(&mut self, node: &UnaryExpression) -> Result<Expression> {
        let expression = self.clone_expression(&node.expression)?;

        let cached_type = match self.cached(&expression) {
            Some(operand) => {
                let resolved = resolve_alias(&operand);
                let supported = match node.op {
                    UnaryOp::LogicalNot => matches!(
                        resolved,
                        ExpressionType::Primitive(PrimitiveType::Boolean)
                            | ExpressionType::Vector(VectorType {
                                component_type: PrimitiveType::Boolean,
                                ..
                            })
                    ),
                    UnaryOp::Minus | UnaryOp::Plus => match resolved {
                        ExpressionType::Primitive(p) => p.is_numeric(),
                        ExpressionType::Vector(v) => v.component_type.is_numeric(),
                        ExpressionType::Matrix(_) => true,
                        _ => false,
                    },
                };

                if !supported {
                    return Err(ErrorKind::UnaryUnsupported {
                        op: match node.op {
                            UnaryOp::LogicalNot => "!",
                            UnaryOp::Minus => "-",
                            UnaryOp::Plus => "+",
                        }
                        .to_string(),
                        operand: operand.to_string(),
                    }
                    .at(node.source_location.clone()));
                }

                Some(operand)
            }
            None => None,
        };

        Ok(Expression::Unary(UnaryExpression {
            op: node.op,
            expression: Box::new(expression),
            cached_type,
            source_location: node.source_location.clone(),
        }))
    }

    pub(crate) fn sanitize_assign(&mut self, node: &AssignExpression) -> Result<Expression> {
        let left = self.clone_expression(&node.left)?;
        let right = self.clone_expression(&node.right)?;

        if !is_lvalue(&left) {
            return Err(ErrorKind::AssignTemporary.at(node.source_location.clone()));
        }

        let cached_type = match (self.cached(&left), self.cached(&right)) {
            (Some(lt), Some(rt)) => {
                match node.op.binary_op() {
                    None => {
                        if resolve_alias(&lt) != resolve_alias(&rt) {
                            return Err(ErrorKind::VarDeclarationTypeUnmatching {
                                got: rt.to_string(),
                                expected: lt.to_string(),
                            }
                            .at(node.source_location.clone()));
                        }
                    }
                    Some(op) => {
                        binary_result_type(op, &lt, &rt).ok_or_else(|| {
                            ErrorKind::BinaryUnsupported {
                                op: op.token().to_string(),
                                left: lt.to_string(),
                                right: rt.to_string(),
                            }
                            .at(node.source_location.clone())
                        })?;
                    }
                }
                Some(lt)
            }
            _ => None,
        };

        // a += b  →  a = a + b
        if self.options().remove_compound_assignments {
            if let Some(op) = node.op.binary_op() {
                let lowered_right = Expression::Binary(BinaryExpression {
                    op,
                    left: Box::new(left.clone()),
                    right: Box::new(right),
                    cached_type: cached_type.clone(),
                    source_location: node.source_location.clone(),
                });

                return Ok(Expression::Assign(AssignExpression {
                    op: AssignOp::Simple,
                    left: Box::new(left),
                    right: Box::new(lowered_right),
                    cached_type,
                    source_location: node.source_location.clone(),
                }));
            }
        }

        Ok(Expression::Assign(AssignExpression {
            op: node.op,
            left: Box::new(left),
            right: Box::new(right),
            cached_type,
            source_location: node.source_location.clone(),
        }))
    }

    pub(crate) fn sanitize_conditional(&mut self, node: &ConditionalExpression) -> Result<Expression> {
        let condition = self.clone_expression(&node.condition)?;
        let true_path = self.clone_expression(&node.true_path)?;
        let false_path = self.clone_expression(&node.false_path)?;

        if let Some(cond_type) = self.cached(&condition) {
            if resolve_alias(&cond_type) != &ExpressionType::Primitive(PrimitiveType::Boolean) {
                return Err(ErrorKind::ConditionExpectedBool {
                    got: cond_type.to_string(),
                }
                .at(node.source_location.clone()));
            }
        }

        let cached_type = match (self.cached(&true_path), self.cached(&false_path)) {
            (Some(tt), Some(ft)) => {
                if resolve_alias(&tt) != resolve_alias(&ft) {
                    return Err(ErrorKind::CastIncompatibleTypes {
                        from: ft.to_string(),
                        to: tt.to_string(),
                    }
                    .at(node.source_location.clone()));
                }
                Some(tt)
            }
            _ => None,
        };

        Ok(Expression::Conditional(ConditionalExpression {
            condition: Box::new(condition),
            true_path: Box::new(true_path),
            false_path: Box::new(false_path),
            cached_type,
            source_location: node.source_location.clone(),
        }))
    }

    // -----------------------------------------------------------------
    // casts
    // -----------------------------------------------------------------

    pub(crate) fn sanitize_cast(&mut self, node: &CastExpression) -> Result<Expression> {
        let location = &node.source_location;
        let target = self.resolve_type_value(&node.target_type, location)?;

        let mut expressions = Vec::with_capacity(node.expressions.len());
        for expr in &node.expressions {
            expressions.push(self.clone_expression(expr)?);
        }

        let Some(mut target) = target else {
            return Ok(Expression::Cast(CastExpression {
                target_type: ExpressionValue::Unset,
                expressions,
                cached_type: None,
                source_location: location.clone(),
            }));
        };

        let operand_types: Option<Vec<ExpressionType>> =
            expressions.iter().map(|e| self.cached(e)).collect();

        if let Some(operand_types) = operand_types {
            match resolve_alias(&target).clone() {
                ExpressionType::Primitive(_) => {
                    let from = single_operand(&operand_types, location)?;
                    if !is_cast_allowed(from, &target) {
                        return Err(cast_error(from, &target, location));
                    }
                }
                ExpressionType::Vector(v) => {
                    self.check_vector_cast(&v, &operand_types, location)?;
                }
                ExpressionType::Matrix(m) => {
                    if let [single] = operand_types.as_slice() {
                        if let ExpressionType::Matrix(source) = resolve_alias(single) {
                            if source.component_type != m.component_type {
                                return Err(cast_error(single, &target, location));
                            }

                            let needs_expansion = source.column_count != m.column_count
                                || source.row_count != m.row_count;
                            if needs_expansion && self.options().remove_matrix_cast {
                                let source_expr = expressions.pop().expect("one operand");
                                return self.expand_matrix_cast(source_expr, *source, m, location);
                            }
                        } else {
                            return Err(cast_error(single, &target, location));
                        }
                    } else {
                        self.check_matrix_columns_cast(&m, &operand_types, location)?;
                    }
                }
                ExpressionType::Array(a) => {
                    let element = self.normalize_type(&a.contained_type);
                    if a.length == 0 {
                        // unsized array literal: length inferred from the
                        // component count
                        target = ExpressionType::Array(ArrayType {
                            contained_type: Box::new(element.clone()),
                            length: operand_types.len() as u32,
                        });
                    } else if operand_types.len() as u32 != a.length {
                        return Err(ErrorKind::CastComponentMismatch {
                            got: operand_types.len() as u32,
                            expected: a.length,
                        }
                        .at(location.clone()));
                    }

                    for operand in &operand_types {
                        if resolve_alias(operand) != resolve_alias(&element) {
                            return Err(cast_error(operand, &element, location));
                        }
                    }
                }
                other => return Err(cast_error(&other, &target, location)),
            }
        }

        Ok(Expression::Cast(CastExpression {
            target_type: ExpressionValue::Value(target.clone()),
            expressions,
            cached_type: Some(target),
            source_location: location.clone(),
        }))
    }

    fn check_vector_cast(
        &self,
        target: &VectorType,
        operand_types: &[ExpressionType],
        location: &SourceLocation,
    ) -> Result<()> {
        if !target.component_type.is_numeric() {
            // vectors of bool cannot be produced by casts
            return Err(ErrorKind::CastIncompatibleTypes {
                from: "<component list>".to_string(),
                to: ExpressionType::Vector(*target).to_string(),
            }
            .at(location.clone()));
        }

        // single-operand reshaping casts: replication or conversion
        if let [single] = operand_types {
            if is_cast_allowed(single, &ExpressionType::Vector(*target)) {
                return Ok(());
            }
        }

        let mut total = 0u32;
        for operand in operand_types {
            total += match resolve_alias(operand) {
                ExpressionType::Primitive(p) if p.is_numeric() => 1,
                ExpressionType::Vector(v) if v.component_type.is_numeric() => v.component_count,
                other => {
                    return Err(cast_error(other, &ExpressionType::Vector(*target), location))
                }
            };
        }

        if total != target.component_count {
            return Err(ErrorKind::CastComponentMismatch {
                got: total,
                expected: target.component_count,
            }
            .at(location.clone()));
        }

        Ok(())
    }

    fn check_matrix_columns_cast(
        &self,
        target: &MatrixType,
        operand_types: &[ExpressionType],
        location: &SourceLocation,
    ) -> Result<()> {
        if operand_types.len() as u32 != target.column_count {
            return Err(ErrorKind::CastComponentMismatch {
                got: operand_types.len() as u32,
                expected: target.column_count,
            }
            .at(location.clone()));
        }

        for operand in operand_types {
            match resolve_alias(operand) {
                ExpressionType::Vector(v) if v.component_type == target.component_type => {
                    if v.component_count != target.row_count {
                        return Err(ErrorKind::CastMatrixVectorComponentMismatch {
                            got: v.component_count,
                            expected: target.row_count,
                        }
                        .at(location.clone()));
                    }
                }
                other => {
                    return Err(cast_error(other, &ExpressionType::Matrix(*target), location))
                }
            }
        }

        Ok(())
    }

    /// Expand a dimension-changing matrix cast into explicit column
    /// assembly over a destination variable.
    ///
    /// Columns covered by the source are copied (truncated by a swizzle
    /// when the source has more rows); extra columns and padded rows take
    /// identity-matrix values.
    fn expand_matrix_cast(
        &mut self,
        source: Expression,
        source_type: MatrixType,
        target_type: MatrixType,
        location: &SourceLocation,
    ) -> Result<Expression> {
        let target = ExpressionType::Matrix(target_type);
        let column_type = VectorType {
            component_count: target_type.row_count,
            component_type: target_type.component_type,
        };

        // the source is referenced once per copied column, so anything that
        // is not already a plain variable gets captured first
        let source_expr = match source {
            Expression::VariableValue(_) => source,
            other => {
                let var_index =
                    self.register_variable("sourceMat", ExpressionType::Matrix(source_type));
                self.pending_statements
                    .push(Statement::DeclareVariable(DeclareVariableStatement {
                        var_index: Some(var_index),
                        var_name: self.variables[var_index].name.clone(),
                        var_type: ExpressionValue::Value(ExpressionType::Matrix(source_type)),
                        initial_expression: Some(Box::new(other)),
                        source_location: location.clone(),
                    }));
                Expression::VariableValue(VariableValueExpression {
                    variable_id: var_index,
                    cached_type: Some(ExpressionType::Matrix(source_type)),
                    source_location: location.clone(),
                })
            }
        };

        let target_index = self.register_variable("targetMat", target.clone());
        self.pending_statements
            .push(Statement::DeclareVariable(DeclareVariableStatement {
                var_index: Some(target_index),
                var_name: self.variables[target_index].name.clone(),
                var_type: ExpressionValue::Value(target.clone()),
                initial_expression: None,
                source_location: location.clone(),
            }));

        let target_var = Expression::VariableValue(VariableValueExpression {
            variable_id: target_index,
            cached_type: Some(target.clone()),
            source_location: location.clone(),
        });

        let scalar = |value: f32| {
            Expression::ConstantValue(ConstantValueExpression {
                value: ConstantValue::F32(value),
                cached_type: Some(ExpressionType::Primitive(PrimitiveType::Float32)),
                source_location: location.clone(),
            })
        };

        for column in 0..target_type.column_count {
            let column_expr = if column < source_type.column_count {
                let source_column = Expression::AccessIndex(AccessIndexExpression {
                    expr: Box::new(source_expr.clone()),
                    indices: vec![Expression::ConstantValue(ConstantValueExpression {
                        value: ConstantValue::U32(column),
                        cached_type: Some(ExpressionType::Primitive(PrimitiveType::UInt32)),
                        source_location: location.clone(),
                    })],
                    cached_type: Some(ExpressionType::Vector(VectorType {
                        component_count: source_type.row_count,
                        component_type: source_type.component_type,
                    })),
                    source_location: location.clone(),
                });

                match source_type.row_count.cmp(&target_type.row_count) {
                    std::cmp::Ordering::Equal => source_column,
                    std::cmp::Ordering::Greater => {
                        // truncate with .xy / .xyz
                        let mut components = [0u32; 4];
                        for (i, slot) in components
                            .iter_mut()
                            .enumerate()
                            .take(target_type.row_count as usize)
                        {
                            *slot = i as u32;
                        }
                        Expression::Swizzle(SwizzleExpression {
                            expression: Box::new(source_column),
                            components,
                            component_count: target_type.row_count as usize,
                            cached_type: Some(ExpressionType::Vector(column_type)),
                            source_location: location.clone(),
                        })
                    }
                    std::cmp::Ordering::Less => {
                        // pad missing rows with 0, or 1 on the diagonal
                        let mut operands = vec![source_column];
                        for row in source_type.row_count..target_type.row_count {
                            operands.push(scalar(if row == column { 1.0 } else { 0.0 }));
                        }
                        Expression::Cast(CastExpression {
                            target_type: ExpressionValue::Value(ExpressionType::Vector(
                                column_type,
                            )),
                            expressions: operands,
                            cached_type: Some(ExpressionType::Vector(column_type)),
                            source_location: location.clone(),
                        })
                    }
                }
            } else {
                // identity column
                let operands = (0..target_type.row_count)
                    .map(|row| scalar(if row == column { 1.0 } else { 0.0 }))
                    .collect();
                Expression::Cast(CastExpression {
                    target_type: ExpressionValue::Value(ExpressionType::Vector(column_type)),
                    expressions: operands,
                    cached_type: Some(ExpressionType::Vector(column_type)),
                    source_location: location.clone(),
                })
            };

            let column_access = Expression::AccessIndex(AccessIndexExpression {
                expr: Box::new(target_var.clone()),
                indices: vec![Expression::ConstantValue(ConstantValueExpression {
                    value: ConstantValue::U32(column),
                    cached_type: Some(ExpressionType::Primitive(PrimitiveType::UInt32)),
                    source_location: location.clone(),
                })],
                cached_type: Some(ExpressionType::Vector(column_type)),
                source_location: location.clone(),
            });

            self.pending_statements
                .push(Statement::Expression(ExpressionStatement {
                    expression: Expression::Assign(AssignExpression {
                        op: AssignOp::Simple,
                        left: Box::new(column_access),
                        right: Box::new(column_expr),
                        cached_type: Some(ExpressionType::Vector(column_type)),
                        source_location: location.clone(),
                    }),
                    source_location: location.clone(),
                }));
        }

        Ok(target_var)
    }

    // -----------------------------------------------------------------
    // calls and intrinsics
    // -----------------------------------------------------------------

    /// Resolve alias references down to the declaration they stand for.
    fn unalias_target(&mut self, expr: Expression) -> Result<Expression> {
        match expr {
            Expression::AliasValue(alias) => {
                let target = self.aliases[alias.alias_id].target.clone();
                let resolved = self.identifier_to_expression(&target, &alias.source_location)?;
                self.unalias_target(resolved)
            }
            other => Ok(other),
        }
    }

    pub(crate) fn sanitize_call_function(&mut self, node: &CallFunctionExpression) -> Result<Expression> {
        let target = self.clone_expression(&node.target_function)?;
        let target = self.unalias_target(target)?;

        let mut parameters = Vec::with_capacity(node.parameters.len());
        for parameter in &node.parameters {
            parameters.push(self.clone_expression(parameter)?);
        }

        match &target {
            Expression::Function(func) => {
                let func_id = func.func_id;
                self.check_function_call(func_id, &parameters, &node.source_location)?;

                if let Some(current) = self.current_function {
                    self.functions[current].called_functions.insert(func_id);
                }

                let return_type = self.functions[func_id].return_type.clone();
                Ok(Expression::CallFunction(CallFunctionExpression {
                    target_function: Box::new(target),
                    parameters,
                    cached_type: Some(return_type),
                    source_location: node.source_location.clone(),
                }))
            }
            Expression::IntrinsicFunction(intrinsic) => {
                let intrinsic = intrinsic_from_index(intrinsic.intrinsic_id)
                    .ok_or_else(|| {
                        ErrorKind::ExpectedFunction {
                            got: "<intrinsic>".to_string(),
                        }
                        .at(node.source_location.clone())
                    })?;
                self.sanitize_intrinsic_node(intrinsic, parameters, &node.source_location)
            }
            // a struct name used as a constructor is a cast
            Expression::StructType(struct_type) => {
                let target_type = ExpressionType::Struct(StructType {
                    struct_index: struct_type.struct_type_id,
                });
                Ok(Expression::Cast(CastExpression {
                    target_type: ExpressionValue::Value(target_type.clone()),
                    expressions: parameters,
                    cached_type: Some(target_type),
                    source_location: node.source_location.clone(),
                }))
            }
            Expression::Identifier(_) => Ok(Expression::CallFunction(CallFunctionExpression {
                target_function: Box::new(target),
                parameters,
                cached_type: None,
                source_location: node.source_location.clone(),
            })),
            other => Err(ErrorKind::ExpectedFunction {
                got: other
                    .cached_type()
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
            }
            .at(node.source_location.clone())),
        }
    }

    fn check_function_call(
        &self,
        func_id: usize,
        parameters: &[Expression],
        location: &SourceLocation,
    ) -> Result<()> {
        let function = &self.functions[func_id];

        if parameters.len() != function.parameters.len() {
            return Err(ErrorKind::FunctionCallUnmatchingParameterCount {
                function: function.name.clone(),
                expected: function.parameters.len() as u32,
                got: parameters.len() as u32,
            }
            .at(location.clone()));
        }

        for (index, (parameter, expected)) in
            parameters.iter().zip(&function.parameters).enumerate()
        {
            let Some(got) = parameter.cached_type() else {
                continue;
            };
            if resolve_alias(got) != resolve_alias(expected) {
                return Err(ErrorKind::FunctionCallUnmatchingParameterType {
                    function: function.name.clone(),
                    index: index as u32,
                    expected: expected.to_string(),
                    got: got.to_string(),
                }
                .at(parameter.source_location().clone()));
            }
        }

        Ok(())
    }

    pub(crate) fn sanitize_call_method(&mut self, node: &CallMethodExpression) -> Result<Expression> {
        let object = self.clone_expression(&node.object)?;

        let mut parameters = Vec::with_capacity(node.parameters.len());
        for parameter in &node.parameters {
            parameters.push(self.clone_expression(parameter)?);
        }

        let Some(object_type) = self.cached(&object) else {
            return Ok(Expression::CallMethod(CallMethodExpression {
                object: Box::new(object),
                method_name: node.method_name.clone(),
                parameters,
                cached_type: None,
                source_location: node.source_location.clone(),
            }));
        };

        match (resolve_alias(&object_type), node.method_name.as_str()) {
            (ExpressionType::Sampler(sampler), "Sample") => {
                let sampler = *sampler;
                let mut arguments = vec![object];
                arguments.extend(parameters);
                self.check_sample_call(&sampler, &arguments, &node.source_location)?;

                Ok(Expression::Intrinsic(IntrinsicExpression {
                    intrinsic: IntrinsicType::SampleTexture,
                    parameters: arguments,
                    cached_type: Some(ExpressionType::Vector(VectorType {
                        component_count: 4,
                        component_type: sampler.sampled_type,
                    })),
                    source_location: node.source_location.clone(),
                }))
            }
            (other, method) => Err(ErrorKind::UnknownMethod {
                method: method.to_string(),
                ty: other.to_string(),
            }
            .at(node.source_location.clone())),
        }
    }

    pub(crate) fn sanitize_intrinsic(&mut self, node: &IntrinsicExpression) -> Result<Expression> {
        let mut parameters = Vec::with_capacity(node.parameters.len());
        for parameter in &node.parameters {
            parameters.push(self.clone_expression(parameter)?);
        }

        self.sanitize_intrinsic_node(node.intrinsic, parameters, &node.source_location)
    }

    /// Validate an intrinsic call and compute its type.
    fn sanitize_intrinsic_node(
        &mut self,
        intrinsic: IntrinsicType,
        parameters: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<Expression> {
        let parameter_types: Option<Vec<ExpressionType>> =
            parameters.iter().map(|p| self.cached(p)).collect();

        let cached_type = match parameter_types {
            Some(types) => Some(self.intrinsic_result_type(intrinsic, &types, location)?),
            None => None,
        };

        Ok(Expression::Intrinsic(IntrinsicExpression {
            intrinsic,
            parameters,
            cached_type,
            source_location: location.clone(),
        }))
    }

    fn intrinsic_result_type(
        &self,
        intrinsic: IntrinsicType,
        parameter_types: &[ExpressionType],
        location: &SourceLocation,
    ) -> Result<ExpressionType> {
        use IntrinsicType::*;

        let arity = |expected: u32| -> Result<()> {
            if parameter_types.len() as u32 != expected {
                return Err(ErrorKind::FunctionCallUnmatchingParameterCount {
                    function: intrinsic.name().to_string(),
                    expected,
                    got: parameter_types.len() as u32,
                }
                .at(location.clone()));
            }
            Ok(())
        };

        let expect = |index: usize, expected: &str, got: &ExpressionType| -> nzsl_ast::CompilerError {
            ErrorKind::IntrinsicExpectedType {
                index: index as u32,
                expected: expected.to_string(),
                got: got.to_string(),
            }
            .at(location.clone())
        };

        let float_vector = |index: usize| -> Result<VectorType> {
            let ty = &parameter_types[index];
            match resolve_alias(ty) {
                ExpressionType::Vector(v) if v.component_type == PrimitiveType::Float32 => Ok(*v),
                other => Err(expect(index, "floating-point vector", other)),
            }
        };

        let same_as_first = |_index: usize| -> Result<()> {
            let first = resolve_alias(&parameter_types[0]);
            for (i, ty) in parameter_types.iter().enumerate().skip(1) {
                if resolve_alias(ty) != first {
                    return Err(expect(i, &first.to_string(), resolve_alias(ty)));
                }
            }
            Ok(())
        };

        match intrinsic {
            CrossProduct => {
                arity(2)?;
                let v = float_vector(0)?;
                if v.component_count != 3 {
                    return Err(expect(0, "vec3[f32]", resolve_alias(&parameter_types[0])));
                }
                same_as_first(1)?;
                Ok(ExpressionType::Vector(v))
            }
            DotProduct => {
                arity(2)?;
                let v = float_vector(0)?;
                same_as_first(1)?;
                Ok(ExpressionType::Primitive(v.component_type))
            }
            Length => {
                arity(1)?;
                let v = float_vector(0)?;
                Ok(ExpressionType::Primitive(v.component_type))
            }
            Normalize | Reflect => {
                let expected_arity = if intrinsic == Reflect { 2 } else { 1 };
                arity(expected_arity)?;
                let v = float_vector(0)?;
                same_as_first(1)?;
                Ok(ExpressionType::Vector(v))
            }
            Max | Min => {
                arity(2)?;
                let ty = resolve_alias(&parameter_types[0]);
                let numeric = match ty {
                    ExpressionType::Primitive(p) => p.is_numeric(),
                    ExpressionType::Vector(v) => v.component_type.is_numeric(),
                    _ => false,
                };
                if !numeric {
                    return Err(expect(0, "numeric scalar or vector", ty));
                }
                same_as_first(1)?;
                Ok(ty.clone())
            }
            Pow => {
                arity(2)?;
                let ty = resolve_alias(&parameter_types[0]);
                let float = match ty {
                    ExpressionType::Primitive(PrimitiveType::Float32) => true,
                    ExpressionType::Vector(v) => v.component_type == PrimitiveType::Float32,
                    _ => false,
                };
                if !float {
                    return Err(expect(0, "floating-point scalar or vector", ty));
                }
                same_as_first(1)?;
                Ok(ty.clone())
            }
            Exp => {
                arity(1)?;
                let ty = resolve_alias(&parameter_types[0]);
                let float = match ty {
                    ExpressionType::Primitive(PrimitiveType::Float32) => true,
                    ExpressionType::Vector(v) => v.component_type == PrimitiveType::Float32,
                    _ => false,
                };
                if !float {
                    return Err(expect(0, "floating-point scalar or vector", ty));
                }
                Ok(ty.clone())
            }
            Inverse => {
                arity(1)?;
                match resolve_alias(&parameter_types[0]) {
                    ExpressionType::Matrix(m) if m.is_square() => Ok(ExpressionType::Matrix(*m)),
                    other => Err(expect(0, "square matrix", other)),
                }
            }
            Transpose => {
                arity(1)?;
                match resolve_alias(&parameter_types[0]) {
                    ExpressionType::Matrix(m) => Ok(ExpressionType::Matrix(MatrixType {
                        column_count: m.row_count,
                        row_count: m.column_count,
                        component_type: m.component_type,
                    })),
                    other => Err(expect(0, "matrix", other)),
                }
            }
            SampleTexture => {
                arity(2)?;
                match resolve_alias(&parameter_types[0]) {
                    ExpressionType::Sampler(sampler) => {
                        let sampler = *sampler;
                        self.check_sample_coordinates(&sampler, &parameter_types[1], 1, location)?;
                        Ok(ExpressionType::Vector(VectorType {
                            component_count: 4,
                            component_type: sampler.sampled_type,
                        }))
                    }
                    other => Err(expect(0, "sampler", other)),
                }
            }
        }
    }

    fn check_sample_call(
        &self,
        sampler: &SamplerType,
        arguments: &[Expression],
        location: &SourceLocation,
    ) -> Result<()> {
        if arguments.len() != 2 {
            return Err(ErrorKind::FunctionCallUnmatchingParameterCount {
                function: "Sample".to_string(),
                expected: 1,
                got: (arguments.len() - 1) as u32,
            }
            .at(location.clone()));
        }

        if let Some(coordinates) = arguments[1].cached_type() {
            self.check_sample_coordinates(sampler, coordinates, 1, location)?;
        }

        Ok(())
    }

    fn check_sample_coordinates(
        &self,
        sampler: &SamplerType,
        coordinates: &ExpressionType,
        index: usize,
        location: &SourceLocation,
    ) -> Result<()> {
        let expected_count = sampler.dimension.coordinate_count();
        let ok = match resolve_alias(coordinates) {
            ExpressionType::Primitive(PrimitiveType::Float32) => expected_count == 1,
            ExpressionType::Vector(v) => {
                v.component_type == PrimitiveType::Float32 && v.component_count == expected_count
            }
            _ => false,
        };

        if !ok {
            return Err(ErrorKind::IntrinsicExpectedType {
                index: index as u32,
                expected: if expected_count == 1 {
                    "f32".to_string()
                } else {
                    format!("vec{}[f32]", expected_count)
                },
                got: coordinates.to_string(),
            }
            .at(location.clone()));
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // constant evaluation
    // -----------------------------------------------------------------

    /// Evaluate a sanitized expression to a constant, when possible.
    ///
    /// `Ok(None)` means "not a compile-time constant"; zero divisions and
    /// modulos surface as errors anchored to the offending node.
    pub(crate) fn eval_constant(&self, expr: &Expression) -> Result<Option<ConstantValue>> {
        match expr {
            Expression::ConstantValue(node) => Ok(Some(node.value.clone())),
            Expression::Constant(node) => Ok(self.constants[node.constant_id].value.clone()),
            Expression::Binary(node) => {
                let (Some(lhs), Some(rhs)) =
                    (self.eval_constant(&node.left)?, self.eval_constant(&node.right)?)
                else {
                    return Ok(None);
                };
                ops::binary(node.op, &lhs, &rhs)
                    .map_err(|kind| kind.at(node.source_location.clone()))
            }
            Expression::Unary(node) => {
                let Some(operand) = self.eval_constant(&node.expression)? else {
                    return Ok(None);
                };
                Ok(ops::unary(node.op, &operand))
            }
            Expression::Cast(node) => {
                let Some(target) = node.target_type.value() else {
                    return Ok(None);
                };
                let mut operands = Vec::with_capacity(node.expressions.len());
                for operand in &node.expressions {
                    match self.eval_constant(operand)? {
                        Some(value) => operands.push(value),
                        None => return Ok(None),
                    }
                }
                Ok(ops::cast(resolve_alias(target), &operands))
            }
            Expression::Swizzle(node) => {
                let Some(operand) = self.eval_constant(&node.expression)? else {
                    return Ok(None);
                };
                Ok(ops::swizzle(&operand, node.active_components()))
            }
            Expression::Conditional(node) => {
                let Some(condition) = self.eval_constant(&node.condition)? else {
                    return Ok(None);
                };
                match condition.as_bool() {
                    Some(true) => self.eval_constant(&node.true_path),
                    Some(false) => self.eval_constant(&node.false_path),
                    None => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

/// Whether an expression can stand on the left of an assignment.
fn is_lvalue(expr: &Expression) -> bool {
    match expr {
        Expression::VariableValue(_) => true,
        Expression::Identifier(_) => true, // partial sanitization
        Expression::AccessIndex(node) => is_lvalue(&node.expr),
        Expression::AccessIdentifier(node) => is_lvalue(&node.expr),
        Expression::Swizzle(node) => is_lvalue(&node.expression),
        _ => false,
    }
}

fn parse_swizzle(identifier: &str, source_components: u32) -> Option<Vec<u32>> {
    if identifier.is_empty() || identifier.len() > 4 {
        return None;
    }

    let mut components = Vec::with_capacity(identifier.len());
    for letter in identifier.chars() {
        let component = swizzle_component(letter)?;
        if component >= source_components {
            return None;
        }
        components.push(component);
    }

    Some(components)
}

fn single_operand<'t>(
    operand_types: &'t [ExpressionType],
    location: &SourceLocation,
) -> Result<&'t ExpressionType> {
    match operand_types {
        [single] => Ok(single),
        _ => Err(ErrorKind::CastComponentMismatch {
            got: operand_types.len() as u32,
            expected: 1,
        }
        .at(location.clone())),
    }
}

fn cast_error(
    from: &ExpressionType,
    to: &ExpressionType,
    location: &SourceLocation,
) -> nzsl_ast::CompilerError {
    ErrorKind::CastIncompatibleTypes {
        from: from.to_string(),
        to: to.to_string(),
    }
    .at(location.clone())
}

fn intrinsic_from_index(index: usize) -> Option<IntrinsicType> {
    use IntrinsicType::*;
    Some(match index {
        0 => CrossProduct,
        1 => DotProduct,
        2 => SampleTexture,
        3 => Length,
        4 => Max,
        5 => Min,
        6 => Pow,
        7 => Exp,
        8 => Reflect,
        9 => Normalize,
        10 => Inverse,
        11 => Transpose,
        _ => return None,
    })
}

fn describe_expression(expr: &Expression) -> String {
    match expr {
        Expression::Identifier(node) => node.identifier.clone(),
        other => other
            .cached_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "<expression>".to_string()),
    }
}
