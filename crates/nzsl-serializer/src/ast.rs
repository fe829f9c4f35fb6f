//! The symmetric module walk.
//!
//! One method per node shape, written against the direction-agnostic
//! [`AstStream`]: on a writing stream the methods emit the tree, on a
//! reading stream the same code path fills placeholder nodes from the
//! bytes. Field order inside each method IS the wire format — reordering
//! anything is a format break.

use crate::stream::{AstStream, Result, SerializationError};
use nzsl_ast::ast::*;
use nzsl_ast::foundation::{Matrix2, Matrix3, Matrix4, SourceLocation, Vector2, Vector3, Vector4};
use nzsl_ast::module::{ImportedModule, Module, ModuleMetadata};
use nzsl_ast::types::*;
use nzsl_ast::value::ConstantValue;
use std::sync::Arc;

/// File magic of compiled shader modules.
pub const MAGIC: &[u8; 5] = b"NZSLB";
/// Current format version. There is no backward compatibility: readers
/// reject every other version.
pub const FORMAT_VERSION: u16 = 1;

/// Symmetric (de)serializer over a primitive stream.
pub struct AstSerializer<'s, S: AstStream> {
    stream: &'s mut S,
}

/// Node used to pre-fill child slots before a read overwrites them.
fn placeholder_expression() -> Expression {
    Expression::ConstantValue(ConstantValueExpression {
        value: ConstantValue::NoValue,
        cached_type: None,
        source_location: SourceLocation::unknown(),
    })
}

fn placeholder_statement() -> Statement {
    Statement::NoOp(NoOpStatement {
        source_location: SourceLocation::unknown(),
    })
}

/// Generates a walk method for a `Copy` enum with frozen `u8` values.
macro_rules! enum_codec {
    ($method:ident, $ty:ty, { $($value:literal => $variant:path),+ $(,)? }) => {
        fn $method(&mut self, value: &mut $ty) -> Result<()> {
            let mut byte: u8 = match *value {
                $($variant => $value),+
            };
            self.stream.value_u8(&mut byte)?;
            if !self.stream.is_writing() {
                *value = match byte {
                    $($value => $variant),+ ,
                    other => {
                        return Err(SerializationError::InvalidTag {
                            what: stringify!($ty),
                            tag: other,
                        })
                    }
                };
            }
            Ok(())
        }
    };
}

/// Generates a walk method for an `ExpressionValue<T>` given the method
/// walking a `T`.
macro_rules! expression_value_codec {
    ($method:ident, $ty:ty, $inner:ident, $default:expr) => {
        fn $method(&mut self, value: &mut ExpressionValue<$ty>) -> Result<()> {
            let mut tag: u8 = match value {
                ExpressionValue::Unset => 0,
                ExpressionValue::Value(_) => 1,
                ExpressionValue::Expression(_) => 2,
            };
            self.stream.value_u8(&mut tag)?;

            if !self.stream.is_writing() {
                *value = match tag {
                    0 => ExpressionValue::Unset,
                    1 => ExpressionValue::Value($default),
                    2 => ExpressionValue::Expression(Box::new(placeholder_expression())),
                    other => {
                        return Err(SerializationError::InvalidTag {
                            what: "ExpressionValue",
                            tag: other,
                        })
                    }
                };
            }

            match value {
                ExpressionValue::Unset => Ok(()),
                ExpressionValue::Value(inner) => self.$inner(inner),
                ExpressionValue::Expression(expr) => self.expression(expr),
            }
        }
    };
}

impl<'s, S: AstStream> AstSerializer<'s, S> {
    pub fn new(stream: &'s mut S) -> Self {
        Self { stream }
    }

    // -----------------------------------------------------------------
    // module envelope
    // -----------------------------------------------------------------

    /// The whole `.nzslb` envelope: magic, version, metadata, imports,
    /// root node.
    pub fn module_envelope(&mut self, module: &mut Module) -> Result<()> {
        self.stream.magic(MAGIC)?;

        let mut version = FORMAT_VERSION;
        self.stream.value_u16(&mut version)?;
        if version != FORMAT_VERSION {
            return Err(SerializationError::UnsupportedVersion(version));
        }

        self.module(module)
    }

    fn module(&mut self, module: &mut Module) -> Result<()> {
        self.metadata(&mut module.metadata)?;
        self.imported_modules(&mut module.imported_modules)?;
        self.multi(&mut module.root_node)
    }

    fn metadata(&mut self, metadata: &mut ModuleMetadata) -> Result<()> {
        self.stream.value_string(&mut metadata.module_name)?;
        self.stream.value_u32(&mut metadata.shader_lang_version)?;
        self.opt_string(&mut metadata.author)?;
        self.opt_string(&mut metadata.description)?;
        self.opt_string(&mut metadata.license)?;

        let mut count = metadata.enabled_features.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            metadata.enabled_features = vec![ModuleFeature::PrimitiveExternals; count as usize];
        }
        for feature in &mut metadata.enabled_features {
            self.module_feature(feature)?;
        }

        Ok(())
    }

    fn imported_modules(&mut self, imports: &mut Vec<ImportedModule>) -> Result<()> {
        let mut count = imports.len() as u32;
        self.stream.value_u32(&mut count)?;

        if self.stream.is_writing() {
            for imported in imports {
                let mut identifier = imported.identifier.clone();
                self.stream.value_string(&mut identifier)?;

                // imported modules are shared; serialize from a copy
                let mut module = (*imported.module).clone();
                self.module(&mut module)?;
            }
        } else {
            imports.clear();
            for _ in 0..count {
                let mut identifier = String::new();
                self.stream.value_string(&mut identifier)?;

                let mut module = Module::new(ModuleMetadata::new(""));
                self.module(&mut module)?;
                imports.push(ImportedModule {
                    identifier,
                    module: Arc::new(module),
                });
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // statements
    // -----------------------------------------------------------------

    pub fn statement(&mut self, statement: &mut Statement) -> Result<()> {
        let mut tag = statement.node_kind() as u8;
        self.stream.value_u8(&mut tag)?;

        if !self.stream.is_writing() {
            *statement = statement_for_tag(tag)?;
        }

        match statement {
            Statement::Branch(node) => self.branch(node),
            Statement::Break(node) => self.source_location(&mut node.source_location),
            Statement::Conditional(node) => self.conditional_statement(node),
            Statement::Continue(node) => self.source_location(&mut node.source_location),
            Statement::DeclareAlias(node) => self.declare_alias(node),
            Statement::DeclareConst(node) => self.declare_const(node),
            Statement::DeclareExternal(node) => self.declare_external(node),
            Statement::DeclareFunction(node) => self.declare_function(node),
            Statement::DeclareOption(node) => self.declare_option(node),
            Statement::DeclareStruct(node) => self.declare_struct(node),
            Statement::DeclareVariable(node) => self.declare_variable(node),
            Statement::Discard(node) => self.source_location(&mut node.source_location),
            Statement::Expression(node) => {
                self.expression(&mut node.expression)?;
                self.source_location(&mut node.source_location)
            }
            Statement::For(node) => self.for_statement(node),
            Statement::ForEach(node) => self.for_each(node),
            Statement::Import(node) => self.import(node),
            Statement::Multi(node) => self.multi(node),
            Statement::NoOp(node) => self.source_location(&mut node.source_location),
            Statement::Return(node) => {
                self.opt_expression(&mut node.returned_expr)?;
                self.source_location(&mut node.source_location)
            }
            Statement::Scoped(node) => {
                self.statement_box(&mut node.statement)?;
                self.source_location(&mut node.source_location)
            }
            Statement::While(node) => self.while_statement(node),
        }
    }

    fn branch(&mut self, node: &mut BranchStatement) -> Result<()> {
        let mut count = node.cond_statements.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            node.cond_statements = (0..count)
                .map(|_| ConditionalBranch {
                    condition: placeholder_expression(),
                    statement: placeholder_statement(),
                })
                .collect();
        }
        for arm in &mut node.cond_statements {
            self.expression(&mut arm.condition)?;
            self.statement(&mut arm.statement)?;
        }

        self.opt_statement(&mut node.else_statement)?;
        self.stream.value_bool(&mut node.is_const)?;
        self.source_location(&mut node.source_location)
    }

    fn conditional_statement(&mut self, node: &mut ConditionalStatement) -> Result<()> {
        self.expression(&mut node.condition)?;
        self.statement_box(&mut node.statement)?;
        self.source_location(&mut node.source_location)
    }

    fn declare_alias(&mut self, node: &mut DeclareAliasStatement) -> Result<()> {
        self.opt_index(&mut node.alias_index)?;
        self.stream.value_string(&mut node.name)?;
        self.expression_box(&mut node.expression)?;
        self.source_location(&mut node.source_location)
    }

    fn declare_const(&mut self, node: &mut DeclareConstStatement) -> Result<()> {
        self.opt_index(&mut node.const_index)?;
        self.stream.value_string(&mut node.name)?;
        self.ev_type(&mut node.const_type)?;
        self.expression_box(&mut node.expression)?;
        self.source_location(&mut node.source_location)
    }

    fn declare_external(&mut self, node: &mut DeclareExternalStatement) -> Result<()> {
        self.ev_u32(&mut node.binding_set)?;

        let mut count = node.external_vars.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            node.external_vars = (0..count)
                .map(|_| ExternalVar {
                    var_index: None,
                    name: String::new(),
                    var_type: ExpressionValue::Unset,
                    binding_index: ExpressionValue::Unset,
                    binding_set: ExpressionValue::Unset,
                    source_location: SourceLocation::unknown(),
                })
                .collect();
        }
        for var in &mut node.external_vars {
            self.opt_index(&mut var.var_index)?;
            self.stream.value_string(&mut var.name)?;
            self.ev_type(&mut var.var_type)?;
            self.ev_u32(&mut var.binding_index)?;
            self.ev_u32(&mut var.binding_set)?;
            self.source_location(&mut var.source_location)?;
        }

        self.source_location(&mut node.source_location)
    }

    fn declare_function(&mut self, node: &mut DeclareFunctionStatement) -> Result<()> {
        self.opt_index(&mut node.func_index)?;
        self.stream.value_string(&mut node.name)?;

        let mut count = node.parameters.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            node.parameters = (0..count)
                .map(|_| FunctionParameter {
                    var_index: None,
                    name: String::new(),
                    param_type: ExpressionValue::Unset,
                    source_location: SourceLocation::unknown(),
                })
                .collect();
        }
        for parameter in &mut node.parameters {
            self.opt_index(&mut parameter.var_index)?;
            self.stream.value_string(&mut parameter.name)?;
            self.ev_type(&mut parameter.param_type)?;
            self.source_location(&mut parameter.source_location)?;
        }

        self.statement_list(&mut node.statements)?;
        self.ev_type(&mut node.return_type)?;
        self.ev_stage(&mut node.entry_stage)?;
        self.ev_depth_write(&mut node.depth_write)?;
        self.ev_bool(&mut node.early_fragment_tests)?;
        self.ev_bool(&mut node.is_exported)?;
        self.source_location(&mut node.source_location)
    }

    fn declare_option(&mut self, node: &mut DeclareOptionStatement) -> Result<()> {
        self.opt_index(&mut node.opt_index)?;
        self.stream.value_string(&mut node.opt_name)?;
        self.ev_type(&mut node.opt_type)?;
        self.opt_expression(&mut node.default_value)?;
        self.source_location(&mut node.source_location)
    }

    fn declare_struct(&mut self, node: &mut DeclareStructStatement) -> Result<()> {
        self.opt_index(&mut node.struct_index)?;
        self.ev_bool(&mut node.is_exported)?;
        self.stream.value_string(&mut node.description.name)?;
        self.ev_layout(&mut node.description.layout)?;

        let mut count = node.description.members.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            node.description.members = (0..count)
                .map(|_| StructMember {
                    name: String::new(),
                    member_type: ExpressionValue::Unset,
                    builtin: ExpressionValue::Unset,
                    cond: ExpressionValue::Unset,
                    location_index: ExpressionValue::Unset,
                    source_location: SourceLocation::unknown(),
                })
                .collect();
        }
        for member in &mut node.description.members {
            self.stream.value_string(&mut member.name)?;
            self.ev_type(&mut member.member_type)?;
            self.ev_builtin(&mut member.builtin)?;
            self.ev_bool(&mut member.cond)?;
            self.ev_u32(&mut member.location_index)?;
            self.source_location(&mut member.source_location)?;
        }

        self.source_location(&mut node.source_location)
    }

    fn declare_variable(&mut self, node: &mut DeclareVariableStatement) -> Result<()> {
        self.opt_index(&mut node.var_index)?;
        self.stream.value_string(&mut node.var_name)?;
        self.ev_type(&mut node.var_type)?;
        self.opt_expression(&mut node.initial_expression)?;
        self.source_location(&mut node.source_location)
    }

    fn for_statement(&mut self, node: &mut ForStatement) -> Result<()> {
        self.opt_index(&mut node.var_index)?;
        self.stream.value_string(&mut node.var_name)?;
        self.expression_box(&mut node.from_expr)?;
        self.expression_box(&mut node.to_expr)?;
        self.opt_expression(&mut node.step_expr)?;
        self.ev_unroll(&mut node.unroll)?;
        self.statement_box(&mut node.statement)?;
        self.source_location(&mut node.source_location)
    }

    fn for_each(&mut self, node: &mut ForEachStatement) -> Result<()> {
        self.opt_index(&mut node.var_index)?;
        self.stream.value_string(&mut node.var_name)?;
        self.expression_box(&mut node.expression)?;
        self.ev_unroll(&mut node.unroll)?;
        self.statement_box(&mut node.statement)?;
        self.source_location(&mut node.source_location)
    }

    fn import(&mut self, node: &mut ImportStatement) -> Result<()> {
        self.stream.value_string(&mut node.module_name)?;

        let mut count = node.identifiers.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            node.identifiers = (0..count)
                .map(|_| ImportIdentifier {
                    identifier: String::new(),
                    rename: String::new(),
                    source_location: SourceLocation::unknown(),
                })
                .collect();
        }
        for identifier in &mut node.identifiers {
            self.stream.value_string(&mut identifier.identifier)?;
            self.stream.value_string(&mut identifier.rename)?;
            self.source_location(&mut identifier.source_location)?;
        }

        self.source_location(&mut node.source_location)
    }

    fn multi(&mut self, node: &mut MultiStatement) -> Result<()> {
        self.statement_list(&mut node.statements)?;
        self.source_location(&mut node.source_location)
    }

    fn while_statement(&mut self, node: &mut WhileStatement) -> Result<()> {
        self.expression_box(&mut node.condition)?;
        self.ev_unroll(&mut node.unroll)?;
        self.statement_box(&mut node.body)?;
        self.source_location(&mut node.source_location)
    }

    // -----------------------------------------------------------------
    // expressions
    // -----------------------------------------------------------------

    pub fn expression(&mut self, expression: &mut Expression) -> Result<()> {
        let mut tag = expression.node_kind() as u8;
        self.stream.value_u8(&mut tag)?;

        if !self.stream.is_writing() {
            *expression = expression_for_tag(tag)?;
        }

        match expression {
            Expression::AccessIdentifier(node) => {
                self.expression_box(&mut node.expr)?;

                let mut count = node.identifiers.len() as u32;
                self.stream.value_u32(&mut count)?;
                if !self.stream.is_writing() {
                    node.identifiers = (0..count)
                        .map(|_| AccessIdentifierEntry {
                            identifier: String::new(),
                            source_location: SourceLocation::unknown(),
                        })
                        .collect();
                }
                for entry in &mut node.identifiers {
                    self.stream.value_string(&mut entry.identifier)?;
                    self.source_location(&mut entry.source_location)?;
                }

                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::AccessIndex(node) => {
                self.expression_box(&mut node.expr)?;
                self.expression_list(&mut node.indices)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::AliasValue(node) => {
                self.index(&mut node.alias_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Assign(node) => {
                self.assign_op(&mut node.op)?;
                self.expression_box(&mut node.left)?;
                self.expression_box(&mut node.right)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Binary(node) => {
                self.binary_op(&mut node.op)?;
                self.expression_box(&mut node.left)?;
                self.expression_box(&mut node.right)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::CallFunction(node) => {
                self.expression_box(&mut node.target_function)?;
                self.expression_list(&mut node.parameters)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::CallMethod(node) => {
                self.expression_box(&mut node.object)?;
                self.stream.value_string(&mut node.method_name)?;
                self.expression_list(&mut node.parameters)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Cast(node) => {
                self.ev_type(&mut node.target_type)?;
                self.expression_list(&mut node.expressions)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Conditional(node) => {
                self.expression_box(&mut node.condition)?;
                self.expression_box(&mut node.true_path)?;
                self.expression_box(&mut node.false_path)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Constant(node) => {
                self.index(&mut node.constant_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::ConstantValue(node) => {
                self.constant_value(&mut node.value)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Function(node) => {
                self.index(&mut node.func_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Identifier(node) => {
                self.stream.value_string(&mut node.identifier)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Intrinsic(node) => {
                self.intrinsic_type(&mut node.intrinsic)?;
                self.expression_list(&mut node.parameters)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::IntrinsicFunction(node) => {
                self.index(&mut node.intrinsic_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::StructType(node) => {
                self.index(&mut node.struct_type_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Swizzle(node) => {
                self.expression_box(&mut node.expression)?;
                for component in &mut node.components {
                    self.stream.value_u32(component)?;
                }
                let mut count = node.component_count as u8;
                self.stream.value_u8(&mut count)?;
                node.component_count = count as usize;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Type(node) => {
                self.index(&mut node.type_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::Unary(node) => {
                self.unary_op(&mut node.op)?;
                self.expression_box(&mut node.expression)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
            Expression::VariableValue(node) => {
                self.index(&mut node.variable_id)?;
                self.expression_common(&mut node.cached_type, &mut node.source_location)
            }
        }
    }

    /// Trailing fields shared by every expression: optional cached type,
    /// then the source location.
    fn expression_common(
        &mut self,
        cached_type: &mut Option<ExpressionType>,
        location: &mut SourceLocation,
    ) -> Result<()> {
        let mut present = cached_type.is_some();
        self.stream.value_bool(&mut present)?;
        if !self.stream.is_writing() {
            *cached_type = present.then(|| ExpressionType::NoType);
        }
        if let Some(ty) = cached_type {
            self.expression_type(ty)?;
        }

        self.source_location(location)
    }

    fn source_location(&mut self, location: &mut SourceLocation) -> Result<()> {
        let mut has_file = location.file.is_some();
        self.stream.value_bool(&mut has_file)?;

        if self.stream.is_writing() {
            if let Some(file) = &location.file {
                let mut file = file.to_string();
                self.stream.shared_string(&mut file)?;
            }
        } else if has_file {
            let mut file = String::new();
            self.stream.shared_string(&mut file)?;
            location.file = Some(Arc::from(file.as_str()));
        } else {
            location.file = None;
        }

        self.stream.value_u32(&mut location.start_line)?;
        self.stream.value_u32(&mut location.start_column)?;
        self.stream.value_u32(&mut location.end_line)?;
        self.stream.value_u32(&mut location.end_column)
    }

    // -----------------------------------------------------------------
    // types and values
    // -----------------------------------------------------------------

    fn expression_type(&mut self, ty: &mut ExpressionType) -> Result<()> {
        let mut tag: u8 = match ty {
            ExpressionType::NoType => 0,
            ExpressionType::Primitive(_) => 1,
            ExpressionType::Vector(_) => 2,
            ExpressionType::Matrix(_) => 3,
            ExpressionType::Array(_) => 4,
            ExpressionType::Struct(_) => 5,
            ExpressionType::Sampler(_) => 6,
            ExpressionType::Uniform(_) => 7,
            ExpressionType::Alias(_) => 8,
            ExpressionType::Function(_) => 9,
            ExpressionType::IntrinsicFunction(_) => 10,
            ExpressionType::Method(_) => 11,
            ExpressionType::Type(_) => 12,
        };
        self.stream.value_u8(&mut tag)?;

        if !self.stream.is_writing() {
            *ty = match tag {
                0 => ExpressionType::NoType,
                1 => ExpressionType::Primitive(PrimitiveType::Float32),
                2 => ExpressionType::Vector(VectorType {
                    component_count: 0,
                    component_type: PrimitiveType::Float32,
                }),
                3 => ExpressionType::Matrix(MatrixType {
                    column_count: 0,
                    row_count: 0,
                    component_type: PrimitiveType::Float32,
                }),
                4 => ExpressionType::Array(ArrayType {
                    contained_type: Box::new(ExpressionType::NoType),
                    length: 0,
                }),
                5 => ExpressionType::Struct(StructType { struct_index: 0 }),
                6 => ExpressionType::Sampler(SamplerType {
                    dimension: SamplerDimension::Dim2D,
                    sampled_type: PrimitiveType::Float32,
                }),
                7 => ExpressionType::Uniform(UniformType {
                    contained_type: StructType { struct_index: 0 },
                }),
                8 => ExpressionType::Alias(AliasType {
                    alias_index: 0,
                    target_type: Box::new(ExpressionType::NoType),
                }),
                9 => ExpressionType::Function(FunctionType { func_index: 0 }),
                10 => ExpressionType::IntrinsicFunction(IntrinsicFunctionType {
                    intrinsic_index: 0,
                }),
                11 => ExpressionType::Method(MethodType {
                    object_type: Box::new(ExpressionType::NoType),
                    method_index: 0,
                }),
                12 => ExpressionType::Type(Box::new(ExpressionType::NoType)),
                other => {
                    return Err(SerializationError::InvalidTag {
                        what: "ExpressionType",
                        tag: other,
                    })
                }
            };
        }

        match ty {
            ExpressionType::NoType => Ok(()),
            ExpressionType::Primitive(p) => self.primitive_type(p),
            ExpressionType::Vector(v) => {
                self.stream.value_u32(&mut v.component_count)?;
                self.primitive_type(&mut v.component_type)
            }
            ExpressionType::Matrix(m) => {
                self.stream.value_u32(&mut m.column_count)?;
                self.stream.value_u32(&mut m.row_count)?;
                self.primitive_type(&mut m.component_type)
            }
            ExpressionType::Array(a) => {
                self.expression_type(&mut a.contained_type)?;
                self.stream.value_u32(&mut a.length)
            }
            ExpressionType::Struct(s) => self.index(&mut s.struct_index),
            ExpressionType::Sampler(s) => {
                self.sampler_dimension(&mut s.dimension)?;
                self.primitive_type(&mut s.sampled_type)
            }
            ExpressionType::Uniform(u) => self.index(&mut u.contained_type.struct_index),
            ExpressionType::Alias(a) => {
                self.index(&mut a.alias_index)?;
                self.expression_type(&mut a.target_type)
            }
            ExpressionType::Function(f) => self.index(&mut f.func_index),
            ExpressionType::IntrinsicFunction(f) => self.index(&mut f.intrinsic_index),
            ExpressionType::Method(m) => {
                self.expression_type(&mut m.object_type)?;
                self.index(&mut m.method_index)
            }
            ExpressionType::Type(inner) => self.expression_type(inner),
        }
    }

    fn constant_value(&mut self, value: &mut ConstantValue) -> Result<()> {
        let mut tag: u8 = match value {
            ConstantValue::NoValue => 0,
            ConstantValue::Bool(_) => 1,
            ConstantValue::F32(_) => 2,
            ConstantValue::I32(_) => 3,
            ConstantValue::U32(_) => 4,
            ConstantValue::String(_) => 5,
            ConstantValue::Vec2F32(_) => 6,
            ConstantValue::Vec3F32(_) => 7,
            ConstantValue::Vec4F32(_) => 8,
            ConstantValue::Vec2I32(_) => 9,
            ConstantValue::Vec3I32(_) => 10,
            ConstantValue::Vec4I32(_) => 11,
            ConstantValue::Vec2U32(_) => 12,
            ConstantValue::Vec3U32(_) => 13,
            ConstantValue::Vec4U32(_) => 14,
            ConstantValue::Vec2Bool(_) => 15,
            ConstantValue::Vec3Bool(_) => 16,
            ConstantValue::Vec4Bool(_) => 17,
            ConstantValue::Mat2F32(_) => 18,
            ConstantValue::Mat3F32(_) => 19,
            ConstantValue::Mat4F32(_) => 20,
        };
        self.stream.value_u8(&mut tag)?;

        if !self.stream.is_writing() {
            *value = match tag {
                0 => ConstantValue::NoValue,
                1 => ConstantValue::Bool(false),
                2 => ConstantValue::F32(0.0),
                3 => ConstantValue::I32(0),
                4 => ConstantValue::U32(0),
                5 => ConstantValue::String(String::new()),
                6 => ConstantValue::Vec2F32(Vector2::default()),
                7 => ConstantValue::Vec3F32(Vector3::default()),
                8 => ConstantValue::Vec4F32(Vector4::default()),
                9 => ConstantValue::Vec2I32(Vector2::default()),
                10 => ConstantValue::Vec3I32(Vector3::default()),
                11 => ConstantValue::Vec4I32(Vector4::default()),
                12 => ConstantValue::Vec2U32(Vector2::default()),
                13 => ConstantValue::Vec3U32(Vector3::default()),
                14 => ConstantValue::Vec4U32(Vector4::default()),
                15 => ConstantValue::Vec2Bool(Vector2::default()),
                16 => ConstantValue::Vec3Bool(Vector3::default()),
                17 => ConstantValue::Vec4Bool(Vector4::default()),
                18 => ConstantValue::Mat2F32(Matrix2::default()),
                19 => ConstantValue::Mat3F32(Matrix3::default()),
                20 => ConstantValue::Mat4F32(Matrix4::default()),
                other => {
                    return Err(SerializationError::InvalidTag {
                        what: "ConstantValue",
                        tag: other,
                    })
                }
            };
        }

        match value {
            ConstantValue::NoValue => Ok(()),
            ConstantValue::Bool(v) => self.stream.value_bool(v),
            ConstantValue::F32(v) => self.stream.value_f32(v),
            ConstantValue::I32(v) => self.stream.value_i32(v),
            ConstantValue::U32(v) => self.stream.value_u32(v),
            ConstantValue::String(v) => self.stream.value_string(v),
            ConstantValue::Vec2F32(v) => self.vec2(v, S::value_f32),
            ConstantValue::Vec3F32(v) => self.vec3(v, S::value_f32),
            ConstantValue::Vec4F32(v) => self.vec4(v, S::value_f32),
            ConstantValue::Vec2I32(v) => self.vec2(v, S::value_i32),
            ConstantValue::Vec3I32(v) => self.vec3(v, S::value_i32),
            ConstantValue::Vec4I32(v) => self.vec4(v, S::value_i32),
            ConstantValue::Vec2U32(v) => self.vec2(v, S::value_u32),
            ConstantValue::Vec3U32(v) => self.vec3(v, S::value_u32),
            ConstantValue::Vec4U32(v) => self.vec4(v, S::value_u32),
            ConstantValue::Vec2Bool(v) => self.vec2(v, S::value_bool),
            ConstantValue::Vec3Bool(v) => self.vec3(v, S::value_bool),
            ConstantValue::Vec4Bool(v) => self.vec4(v, S::value_bool),
            ConstantValue::Mat2F32(m) => {
                for column in &mut m.columns {
                    self.vec2(column, S::value_f32)?;
                }
                Ok(())
            }
            ConstantValue::Mat3F32(m) => {
                for column in &mut m.columns {
                    self.vec3(column, S::value_f32)?;
                }
                Ok(())
            }
            ConstantValue::Mat4F32(m) => {
                for column in &mut m.columns {
                    self.vec4(column, S::value_f32)?;
                }
                Ok(())
            }
        }
    }

    fn vec2<T>(
        &mut self,
        v: &mut Vector2<T>,
        mut component: impl FnMut(&mut S, &mut T) -> Result<()>,
    ) -> Result<()> {
        component(&mut *self.stream, &mut v.x)?;
        component(&mut *self.stream, &mut v.y)
    }

    fn vec3<T>(
        &mut self,
        v: &mut Vector3<T>,
        mut component: impl FnMut(&mut S, &mut T) -> Result<()>,
    ) -> Result<()> {
        component(&mut *self.stream, &mut v.x)?;
        component(&mut *self.stream, &mut v.y)?;
        component(&mut *self.stream, &mut v.z)
    }

    fn vec4<T>(
        &mut self,
        v: &mut Vector4<T>,
        mut component: impl FnMut(&mut S, &mut T) -> Result<()>,
    ) -> Result<()> {
        component(&mut *self.stream, &mut v.x)?;
        component(&mut *self.stream, &mut v.y)?;
        component(&mut *self.stream, &mut v.z)?;
        component(&mut *self.stream, &mut v.w)
    }

    // -----------------------------------------------------------------
    // small shared shapes
    // -----------------------------------------------------------------

    fn index(&mut self, value: &mut usize) -> Result<()> {
        let mut wide = *value as u64;
        self.stream.value_u64(&mut wide)?;
        *value = wide as usize;
        Ok(())
    }

    fn opt_index(&mut self, value: &mut Option<usize>) -> Result<()> {
        let mut present = value.is_some();
        self.stream.value_bool(&mut present)?;
        if !self.stream.is_writing() {
            *value = present.then_some(0);
        }
        if let Some(index) = value {
            self.index(index)?;
        }
        Ok(())
    }

    fn opt_string(&mut self, value: &mut Option<String>) -> Result<()> {
        let mut present = value.is_some();
        self.stream.value_bool(&mut present)?;
        if !self.stream.is_writing() {
            *value = present.then(String::new);
        }
        if let Some(string) = value {
            self.stream.value_string(string)?;
        }
        Ok(())
    }

    fn expression_box(&mut self, value: &mut Box<Expression>) -> Result<()> {
        self.expression(value)
    }

    fn statement_box(&mut self, value: &mut Box<Statement>) -> Result<()> {
        self.statement(value)
    }

    fn opt_expression(&mut self, value: &mut Option<Box<Expression>>) -> Result<()> {
        let mut present = value.is_some();
        self.stream.value_bool(&mut present)?;
        if !self.stream.is_writing() {
            *value = present.then(|| Box::new(placeholder_expression()));
        }
        if let Some(expr) = value {
            self.expression(expr)?;
        }
        Ok(())
    }

    fn opt_statement(&mut self, value: &mut Option<Box<Statement>>) -> Result<()> {
        let mut present = value.is_some();
        self.stream.value_bool(&mut present)?;
        if !self.stream.is_writing() {
            *value = present.then(|| Box::new(placeholder_statement()));
        }
        if let Some(statement) = value {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn expression_list(&mut self, list: &mut Vec<Expression>) -> Result<()> {
        let mut count = list.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            *list = (0..count).map(|_| placeholder_expression()).collect();
        }
        for expression in list {
            self.expression(expression)?;
        }
        Ok(())
    }

    fn statement_list(&mut self, list: &mut Vec<Statement>) -> Result<()> {
        let mut count = list.len() as u32;
        self.stream.value_u32(&mut count)?;
        if !self.stream.is_writing() {
            *list = (0..count).map(|_| placeholder_statement()).collect();
        }
        for statement in list {
            self.statement(statement)?;
        }
        Ok(())
    }

    // enum walks; the byte values are frozen wire format
    enum_codec!(assign_op, AssignOp, {
        0 => AssignOp::Simple,
        1 => AssignOp::CompoundAdd,
        2 => AssignOp::CompoundDivide,
        3 => AssignOp::CompoundMultiply,
        4 => AssignOp::CompoundLogicalAnd,
        5 => AssignOp::CompoundLogicalOr,
        6 => AssignOp::CompoundSubtract,
        7 => AssignOp::CompoundModulo,
    });

    enum_codec!(binary_op, BinaryOp, {
        0 => BinaryOp::Add,
        1 => BinaryOp::CompEq,
        2 => BinaryOp::CompGe,
        3 => BinaryOp::CompGt,
        4 => BinaryOp::CompLe,
        5 => BinaryOp::CompLt,
        6 => BinaryOp::CompNe,
        7 => BinaryOp::Divide,
        8 => BinaryOp::Multiply,
        9 => BinaryOp::LogicalAnd,
        10 => BinaryOp::LogicalOr,
        11 => BinaryOp::Subtract,
        12 => BinaryOp::Modulo,
    });

    enum_codec!(unary_op, UnaryOp, {
        0 => UnaryOp::LogicalNot,
        1 => UnaryOp::Minus,
        2 => UnaryOp::Plus,
    });

    enum_codec!(intrinsic_type, IntrinsicType, {
        0 => IntrinsicType::CrossProduct,
        1 => IntrinsicType::DotProduct,
        2 => IntrinsicType::SampleTexture,
        3 => IntrinsicType::Length,
        4 => IntrinsicType::Max,
        5 => IntrinsicType::Min,
        6 => IntrinsicType::Pow,
        7 => IntrinsicType::Exp,
        8 => IntrinsicType::Reflect,
        9 => IntrinsicType::Normalize,
        10 => IntrinsicType::Inverse,
        11 => IntrinsicType::Transpose,
    });

    enum_codec!(primitive_type, PrimitiveType, {
        0 => PrimitiveType::Boolean,
        1 => PrimitiveType::Float32,
        2 => PrimitiveType::Int32,
        3 => PrimitiveType::UInt32,
        4 => PrimitiveType::String,
    });

    enum_codec!(sampler_dimension, SamplerDimension, {
        0 => SamplerDimension::Dim1D,
        1 => SamplerDimension::Dim1DArray,
        2 => SamplerDimension::Dim2D,
        3 => SamplerDimension::Dim2DArray,
        4 => SamplerDimension::Dim3D,
        5 => SamplerDimension::Cube,
    });

    enum_codec!(shader_stage, ShaderStage, {
        0 => ShaderStage::Vertex,
        1 => ShaderStage::Fragment,
    });

    enum_codec!(depth_write_mode, DepthWriteMode, {
        0 => DepthWriteMode::Greater,
        1 => DepthWriteMode::Less,
        2 => DepthWriteMode::Replace,
        3 => DepthWriteMode::Unchanged,
    });

    enum_codec!(loop_unroll, LoopUnroll, {
        0 => LoopUnroll::Always,
        1 => LoopUnroll::Hint,
        2 => LoopUnroll::Never,
    });

    enum_codec!(memory_layout, MemoryLayout, {
        0 => MemoryLayout::Std140,
    });

    enum_codec!(module_feature, ModuleFeature, {
        0 => ModuleFeature::PrimitiveExternals,
    });

    fn bool_value(&mut self, value: &mut bool) -> Result<()> {
        self.stream.value_bool(value)
    }

    fn u32_value(&mut self, value: &mut u32) -> Result<()> {
        self.stream.value_u32(value)
    }

    // attribute slots
    expression_value_codec!(ev_type, ExpressionType, expression_type, ExpressionType::NoType);
    expression_value_codec!(ev_u32, u32, u32_value, 0);
    expression_value_codec!(ev_bool, bool, bool_value, false);
    expression_value_codec!(ev_stage, ShaderStage, shader_stage, ShaderStage::Vertex);
    expression_value_codec!(
        ev_depth_write,
        DepthWriteMode,
        depth_write_mode,
        DepthWriteMode::Greater
    );
    expression_value_codec!(ev_unroll, LoopUnroll, loop_unroll, LoopUnroll::Always);
    expression_value_codec!(ev_layout, MemoryLayout, memory_layout, MemoryLayout::Std140);
    expression_value_codec!(
        ev_builtin,
        BuiltinEntry,
        builtin_entry,
        BuiltinEntry::VertexPosition
    );

    enum_codec!(builtin_entry, BuiltinEntry, {
        0 => BuiltinEntry::VertexPosition,
        1 => BuiltinEntry::FragCoord,
        2 => BuiltinEntry::FragDepth,
    });
}

/// Placeholder statement for a wire tag.
fn statement_for_tag(tag: u8) -> Result<Statement> {
    let location = SourceLocation::unknown();
    Ok(match tag {
        t if t == NodeKind::BranchStatement as u8 => Statement::Branch(BranchStatement {
            cond_statements: Vec::new(),
            else_statement: None,
            is_const: false,
            source_location: location,
        }),
        t if t == NodeKind::BreakStatement as u8 => Statement::Break(BreakStatement {
            source_location: location,
        }),
        t if t == NodeKind::ConditionalStatement as u8 => {
            Statement::Conditional(ConditionalStatement {
                condition: placeholder_expression(),
                statement: Box::new(placeholder_statement()),
                source_location: location,
            })
        }
        t if t == NodeKind::ContinueStatement as u8 => Statement::Continue(ContinueStatement {
            source_location: location,
        }),
        t if t == NodeKind::DeclareAliasStatement as u8 => {
            Statement::DeclareAlias(DeclareAliasStatement {
                alias_index: None,
                name: String::new(),
                expression: Box::new(placeholder_expression()),
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareConstStatement as u8 => {
            Statement::DeclareConst(DeclareConstStatement {
                const_index: None,
                name: String::new(),
                const_type: ExpressionValue::Unset,
                expression: Box::new(placeholder_expression()),
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareExternalStatement as u8 => {
            Statement::DeclareExternal(DeclareExternalStatement {
                binding_set: ExpressionValue::Unset,
                external_vars: Vec::new(),
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareFunctionStatement as u8 => {
            Statement::DeclareFunction(DeclareFunctionStatement {
                func_index: None,
                name: String::new(),
                parameters: Vec::new(),
                statements: Vec::new(),
                return_type: ExpressionValue::Unset,
                entry_stage: ExpressionValue::Unset,
                depth_write: ExpressionValue::Unset,
                early_fragment_tests: ExpressionValue::Unset,
                is_exported: ExpressionValue::Unset,
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareOptionStatement as u8 => {
            Statement::DeclareOption(DeclareOptionStatement {
                opt_index: None,
                opt_name: String::new(),
                opt_type: ExpressionValue::Unset,
                default_value: None,
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareStructStatement as u8 => {
            Statement::DeclareStruct(DeclareStructStatement {
                struct_index: None,
                is_exported: ExpressionValue::Unset,
                description: StructDescription {
                    name: String::new(),
                    layout: ExpressionValue::Unset,
                    members: Vec::new(),
                },
                source_location: location,
            })
        }
        t if t == NodeKind::DeclareVariableStatement as u8 => {
            Statement::DeclareVariable(DeclareVariableStatement {
                var_index: None,
                var_name: String::new(),
                var_type: ExpressionValue::Unset,
                initial_expression: None,
                source_location: location,
            })
        }
        t if t == NodeKind::DiscardStatement as u8 => Statement::Discard(DiscardStatement {
            source_location: location,
        }),
        t if t == NodeKind::ExpressionStatement as u8 => {
            Statement::Expression(ExpressionStatement {
                expression: placeholder_expression(),
                source_location: location,
            })
        }
        t if t == NodeKind::ForStatement as u8 => Statement::For(ForStatement {
            var_index: None,
            var_name: String::new(),
            from_expr: Box::new(placeholder_expression()),
            to_expr: Box::new(placeholder_expression()),
            step_expr: None,
            unroll: ExpressionValue::Unset,
            statement: Box::new(placeholder_statement()),
            source_location: location,
        }),
        t if t == NodeKind::ForEachStatement as u8 => Statement::ForEach(ForEachStatement {
            var_index: None,
            var_name: String::new(),
            expression: Box::new(placeholder_expression()),
            unroll: ExpressionValue::Unset,
            statement: Box::new(placeholder_statement()),
            source_location: location,
        }),
        t if t == NodeKind::ImportStatement as u8 => Statement::Import(ImportStatement {
            module_name: String::new(),
            identifiers: Vec::new(),
            source_location: location,
        }),
        t if t == NodeKind::MultiStatement as u8 => Statement::Multi(MultiStatement {
            statements: Vec::new(),
            source_location: location,
        }),
        t if t == NodeKind::NoOpStatement as u8 => Statement::NoOp(NoOpStatement {
            source_location: location,
        }),
        t if t == NodeKind::ReturnStatement as u8 => Statement::Return(ReturnStatement {
            returned_expr: None,
            source_location: location,
        }),
        t if t == NodeKind::ScopedStatement as u8 => Statement::Scoped(ScopedStatement {
            statement: Box::new(placeholder_statement()),
            source_location: location,
        }),
        t if t == NodeKind::WhileStatement as u8 => Statement::While(WhileStatement {
            condition: Box::new(placeholder_expression()),
            unroll: ExpressionValue::Unset,
            body: Box::new(placeholder_statement()),
            source_location: location,
        }),
        other => {
            return Err(SerializationError::InvalidTag {
                what: "Statement",
                tag: other,
            })
        }
    })
}

/// Placeholder expression for a wire tag.
fn expression_for_tag(tag: u8) -> Result<Expression> {
    let location = SourceLocation::unknown();
    Ok(match tag {
        t if t == NodeKind::AccessIdentifierExpression as u8 => {
            Expression::AccessIdentifier(AccessIdentifierExpression {
                expr: Box::new(placeholder_expression()),
                identifiers: Vec::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::AccessIndexExpression as u8 => {
            Expression::AccessIndex(AccessIndexExpression {
                expr: Box::new(placeholder_expression()),
                indices: Vec::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::AliasValueExpression as u8 => {
            Expression::AliasValue(AliasValueExpression {
                alias_id: 0,
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::AssignExpression as u8 => Expression::Assign(AssignExpression {
            op: AssignOp::Simple,
            left: Box::new(placeholder_expression()),
            right: Box::new(placeholder_expression()),
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::BinaryExpression as u8 => Expression::Binary(BinaryExpression {
            op: BinaryOp::Add,
            left: Box::new(placeholder_expression()),
            right: Box::new(placeholder_expression()),
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::CallFunctionExpression as u8 => {
            Expression::CallFunction(CallFunctionExpression {
                target_function: Box::new(placeholder_expression()),
                parameters: Vec::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::CallMethodExpression as u8 => {
            Expression::CallMethod(CallMethodExpression {
                object: Box::new(placeholder_expression()),
                method_name: String::new(),
                parameters: Vec::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::CastExpression as u8 => Expression::Cast(CastExpression {
            target_type: ExpressionValue::Unset,
            expressions: Vec::new(),
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::ConditionalExpression as u8 => {
            Expression::Conditional(ConditionalExpression {
                condition: Box::new(placeholder_expression()),
                true_path: Box::new(placeholder_expression()),
                false_path: Box::new(placeholder_expression()),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::ConstantExpression as u8 => Expression::Constant(ConstantExpression {
            constant_id: 0,
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::ConstantValueExpression as u8 => placeholder_expression(),
        t if t == NodeKind::FunctionExpression as u8 => Expression::Function(FunctionExpression {
            func_id: 0,
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::IdentifierExpression as u8 => {
            Expression::Identifier(IdentifierExpression {
                identifier: String::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::IntrinsicExpression as u8 => {
            Expression::Intrinsic(IntrinsicExpression {
                intrinsic: IntrinsicType::CrossProduct,
                parameters: Vec::new(),
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::IntrinsicFunctionExpression as u8 => {
            Expression::IntrinsicFunction(IntrinsicFunctionExpression {
                intrinsic_id: 0,
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::StructTypeExpression as u8 => {
            Expression::StructType(StructTypeExpression {
                struct_type_id: 0,
                cached_type: None,
                source_location: location,
            })
        }
        t if t == NodeKind::SwizzleExpression as u8 => Expression::Swizzle(SwizzleExpression {
            expression: Box::new(placeholder_expression()),
            components: [0; 4],
            component_count: 0,
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::TypeExpression as u8 => Expression::Type(TypeExpression {
            type_id: 0,
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::UnaryExpression as u8 => Expression::Unary(UnaryExpression {
            op: UnaryOp::LogicalNot,
            expression: Box::new(placeholder_expression()),
            cached_type: None,
            source_location: location,
        }),
        t if t == NodeKind::VariableValueExpression as u8 => {
            Expression::VariableValue(VariableValueExpression {
                variable_id: 0,
                cached_type: None,
                source_location: location,
            })
        }
        other => {
            return Err(SerializationError::InvalidTag {
                what: "Expression",
                tag: other,
            })
        }
    })
}
