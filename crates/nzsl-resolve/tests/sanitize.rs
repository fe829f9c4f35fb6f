//! Sanitizer integration tests: canonicalization, typing and diagnostics
//! over programmatically built modules.

use nzsl_ast::ast::*;
use nzsl_ast::builder;
use nzsl_ast::foundation::stable_hash::fnv1a32_str;
use nzsl_ast::module::{Module, ModuleMetadata};
use nzsl_ast::types::{
    ArrayType, ExpressionType, MatrixType, PrimitiveType, SamplerDimension, SamplerType,
    StructType, UniformType, VectorType,
};
use nzsl_ast::value::ConstantValue;
use nzsl_ast::visitor::{ExpressionVisitor, StatementVisitor};
use nzsl_resolve::{sanitize, SanitizeOptions};

fn test_module(statements: Vec<Statement>) -> Module {
    Module::with_root(
        ModuleMetadata::new("Test"),
        MultiStatement {
            statements,
            source_location: Default::default(),
        },
    )
}

fn f32_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Float32)
}

fn i32_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Int32)
}

fn bool_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Boolean)
}

fn mat_type(dim: u32) -> ExpressionType {
    ExpressionType::Matrix(MatrixType {
        column_count: dim,
        row_count: dim,
        component_type: PrimitiveType::Float32,
    })
}

fn vec_type(count: u32) -> ExpressionType {
    ExpressionType::Vector(VectorType {
        component_count: count,
        component_type: PrimitiveType::Float32,
    })
}

/// Function body of the first function found in the module root.
fn function_body(module: &Module, name: &str) -> Vec<Statement> {
    for statement in &module.root_node.statements {
        if let Statement::DeclareFunction(func) = statement {
            if func.name == name {
                return func.statements.clone();
            }
        }
    }
    panic!("function {} not found", name);
}

#[derive(Default)]
struct KindCounter {
    identifiers: usize,
    loops: usize,
    branches: usize,
}

impl ExpressionVisitor for KindCounter {
    fn visit_identifier(&mut self, _node: &IdentifierExpression) {
        self.identifiers += 1;
    }
}

impl StatementVisitor for KindCounter {
    fn visit_for(&mut self, node: &ForStatement) {
        self.loops += 1;
        self.visit_expression(&node.from_expr);
        self.visit_statement(&node.statement);
    }

    fn visit_while(&mut self, node: &WhileStatement) {
        self.loops += 1;
        self.visit_statement(&node.body);
    }

    fn visit_branch(&mut self, node: &BranchStatement) {
        self.branches += 1;
        for arm in &node.cond_statements {
            self.visit_statement(&arm.statement);
        }
        if let Some(else_statement) = &node.else_statement {
            self.visit_statement(else_statement);
        }
    }
}

fn count_kinds(module: &Module) -> KindCounter {
    let mut counter = KindCounter::default();
    for statement in &module.root_node.statements {
        counter.visit_statement(statement);
    }
    counter
}

#[test]
fn sanitizing_resolves_every_identifier() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![
            builder::declare_variable("value", Some(f32_type()), None),
            builder::expression_statement(builder::assign(
                AssignOp::Simple,
                builder::identifier("value"),
                builder::constant(ConstantValue::F32(3.0)),
            )),
        ],
    )]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    assert_eq!(count_kinds(&sanitized).identifiers, 0);
}

#[test]
fn constant_folding_reports_division_by_zero() {
    // const V = 21 * 2 / (9 - 3 * 3);
    let module = test_module(vec![builder::declare_const(
        "V",
        None,
        builder::binary(
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
        ),
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "IntegralDivisionByZero");
    assert!(error.to_string().contains("(42 / 0)"), "{}", error);
}

#[test]
fn const_if_selects_the_true_branch() {
    let body_assign = |value: f32| {
        builder::scoped(builder::multi(vec![builder::expression_statement(
            builder::assign(
                AssignOp::Simple,
                builder::identifier("value"),
                builder::constant(ConstantValue::F32(value)),
            ),
        )]))
    };

    let module = test_module(vec![
        builder::declare_option("UseInt", bool_type(), Some(builder::constant(ConstantValue::Bool(false)))),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            None,
            vec![
                builder::declare_variable("value", Some(f32_type()), None),
                builder::const_branch(
                    vec![(builder::identifier("UseInt"), body_assign(1.0))],
                    Some(body_assign(2.0)),
                ),
            ],
        ),
    ]);

    let mut options = SanitizeOptions::default();
    options
        .option_values
        .insert(fnv1a32_str("UseInt"), ConstantValue::Bool(true));

    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    // no branch statement left, and only the 1.0 assignment survives
    assert_eq!(count_kinds(&sanitized).branches, 0);

    let mut assigned = Vec::new();
    collect_assigned_literals(&body, &mut assigned);
    assert_eq!(assigned, vec![ConstantValue::F32(1.0)]);
}

fn collect_assigned_literals(statements: &[Statement], out: &mut Vec<ConstantValue>) {
    for statement in statements {
        match statement {
            Statement::Expression(stmt) => {
                if let Expression::Assign(assign) = &stmt.expression {
                    if let Expression::ConstantValue(value) = assign.right.as_ref() {
                        out.push(value.value.clone());
                    }
                }
            }
            Statement::Multi(multi) => collect_assigned_literals(&multi.statements, out),
            Statement::Scoped(scoped) => {
                collect_assigned_literals(std::slice::from_ref(scoped.statement.as_ref()), out)
            }
            _ => {}
        }
    }
}

#[test]
fn unrolling_pins_the_induction_variable() {
    // for i in 0 -> 10 : 2 [unroll] { i; }
    let mut for_statement = builder::for_loop(
        "i",
        builder::constant(ConstantValue::I32(0)),
        builder::constant(ConstantValue::I32(10)),
        Some(builder::constant(ConstantValue::I32(2))),
        builder::multi(vec![builder::expression_statement(builder::identifier("i"))]),
    );
    if let Statement::For(node) = &mut for_statement {
        node.unroll = ExpressionValue::Value(LoopUnroll::Always);
    }

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![for_statement],
    )]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    assert_eq!(count_kinds(&sanitized).loops, 0, "no loop nodes may remain");

    let body = function_body(&sanitized, "main");
    let scopes = match body.as_slice() {
        [Statement::Multi(multi)] => &multi.statements,
        other => panic!("expected one multi statement, got {} statements", other.len()),
    };
    assert_eq!(scopes.len(), 5);

    let mut bound_values = Vec::new();
    for scope in scopes {
        let Statement::Scoped(scoped) = scope else {
            panic!("expected a lexical scope per iteration");
        };
        let Statement::Multi(multi) = scoped.statement.as_ref() else {
            panic!("expected a statement list inside the scope");
        };
        let Statement::DeclareVariable(decl) = &multi.statements[0] else {
            panic!("expected the induction variable declaration first");
        };
        let Some(init) = &decl.initial_expression else {
            panic!("induction variable must be initialized");
        };
        let Expression::ConstantValue(value) = init.as_ref() else {
            panic!("induction variable must be pinned to a constant");
        };
        bound_values.push(value.value.clone());
    }

    assert_eq!(
        bound_values,
        vec![
            ConstantValue::I32(0),
            ConstantValue::I32(2),
            ConstantValue::I32(4),
            ConstantValue::I32(6),
            ConstantValue::I32(8),
        ]
    );
}

#[test]
fn break_inside_unrolled_loop_is_rejected() {
    let mut for_statement = builder::for_loop(
        "i",
        builder::constant(ConstantValue::I32(0)),
        builder::constant(ConstantValue::I32(4)),
        None,
        builder::multi(vec![builder::break_statement()]),
    );
    if let Statement::For(node) = &mut for_statement {
        node.unroll = ExpressionValue::Value(LoopUnroll::Always);
    }

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![for_statement],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "LoopControlOutsideOfLoop");
    assert!(error.to_string().contains("break"));
}

#[test]
fn break_outside_any_loop_is_rejected() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::break_statement()],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "LoopControlOutsideOfLoop");
}

#[test]
fn matrix_cast_expands_into_column_assembly() {
    // fn pad(m: mat3[f32]) { let dst = mat4[f32](m); }
    let module = test_module(vec![builder::declare_function(
        "pad",
        vec![builder::function_parameter("m", mat_type(3))],
        None,
        vec![builder::declare_variable(
            "dst",
            None,
            Some(builder::cast(mat_type(4), vec![builder::identifier("m")])),
        )],
    )]);

    let options = SanitizeOptions {
        remove_matrix_cast: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "pad");

    // target declaration + four column assignments + the original let
    assert_eq!(body.len(), 6);

    let mut assignments = Vec::new();
    for statement in &body[1..5] {
        let Statement::Expression(stmt) = statement else {
            panic!("expected a column assignment");
        };
        let Expression::Assign(assign) = &stmt.expression else {
            panic!("expected an assignment");
        };
        assignments.push(assign.right.as_ref().clone());
    }

    // columns 0..2 pad the source column with a trailing zero
    for (column, assignment) in assignments.iter().take(3).enumerate() {
        let Expression::Cast(cast) = assignment else {
            panic!("expected a vec4 construction for column {}", column);
        };
        assert_eq!(cast.expressions.len(), 2);
        assert!(matches!(cast.expressions[0], Expression::AccessIndex(_)));
        assert!(matches!(
            &cast.expressions[1],
            Expression::ConstantValue(value) if value.value == ConstantValue::F32(0.0)
        ));
    }

    // column 3 is the identity column (0, 0, 0, 1)
    let Expression::Cast(identity) = &assignments[3] else {
        panic!("expected a vec4 construction for column 3");
    };
    let components: Vec<_> = identity
        .expressions
        .iter()
        .map(|expr| match expr {
            Expression::ConstantValue(value) => value.value.clone(),
            other => panic!("expected constant components, got {:?}", other.node_kind()),
        })
        .collect();
    assert_eq!(
        components,
        vec![
            ConstantValue::F32(0.0),
            ConstantValue::F32(0.0),
            ConstantValue::F32(0.0),
            ConstantValue::F32(1.0),
        ]
    );
}

#[test]
fn compound_assignments_are_lowered() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![
            builder::declare_variable(
                "x",
                None,
                Some(builder::constant(ConstantValue::F32(0.0))),
            ),
            builder::expression_statement(builder::assign(
                AssignOp::CompoundAdd,
                builder::identifier("x"),
                builder::constant(ConstantValue::F32(1.0)),
            )),
        ],
    )]);

    let options = SanitizeOptions {
        remove_compound_assignments: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::Expression(stmt) = &body[1] else {
        panic!("expected the lowered assignment");
    };
    let Expression::Assign(assign) = &stmt.expression else {
        panic!("expected an assignment");
    };
    assert_eq!(assign.op, AssignOp::Simple);
    assert!(
        matches!(assign.right.as_ref(), Expression::Binary(binary) if binary.op == BinaryOp::Add)
    );
}

#[test]
fn scalar_swizzle_becomes_a_vector_cast() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable(
            "v",
            None,
            Some(builder::swizzle(
                builder::constant(ConstantValue::F32(1.5)),
                &[0, 0, 0],
            )),
        )],
    )]);

    let options = SanitizeOptions {
        remove_scalar_swizzling: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::DeclareVariable(decl) = &body[0] else {
        panic!("expected the variable declaration");
    };
    let Some(init) = &decl.initial_expression else {
        panic!("expected an initializer");
    };
    let Expression::Cast(cast) = init.as_ref() else {
        panic!("expected a cast replacing the scalar swizzle");
    };
    assert_eq!(cast.cached_type, Some(vec_type(3)));
}

#[test]
fn branch_chains_are_split_into_nested_branches() {
    let arm = |value: f32| {
        (
            builder::binary(
                BinaryOp::CompGt,
                builder::identifier("x"),
                builder::constant(ConstantValue::F32(value)),
            ),
            builder::expression_statement(builder::assign(
                AssignOp::Simple,
                builder::identifier("x"),
                builder::constant(ConstantValue::F32(value)),
            )),
        )
    };

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![
            builder::declare_variable(
                "x",
                None,
                Some(builder::constant(ConstantValue::F32(0.0))),
            ),
            builder::branch(
                vec![arm(3.0), arm(2.0), arm(1.0)],
                Some(builder::expression_statement(builder::assign(
                    AssignOp::Simple,
                    builder::identifier("x"),
                    builder::constant(ConstantValue::F32(0.0)),
                ))),
            ),
        ],
    )]);

    let options = SanitizeOptions {
        split_multiple_branches: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::Branch(outer) = &body[1] else {
        panic!("expected the outer branch");
    };
    assert_eq!(outer.cond_statements.len(), 1);

    let Some(else_statement) = &outer.else_statement else {
        panic!("expected a nested else");
    };
    let Statement::Branch(middle) = else_statement.as_ref() else {
        panic!("expected a nested branch in the else");
    };
    assert_eq!(middle.cond_statements.len(), 1);
    assert!(matches!(
        middle.else_statement.as_deref(),
        Some(Statement::Branch(_))
    ));
}

#[test]
fn for_each_reduces_to_an_indexed_while() {
    let array = ExpressionType::Array(ArrayType {
        contained_type: Box::new(f32_type()),
        length: 10,
    });

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![
            builder::declare_variable(
                "data",
                Some(array),
                None,
            ),
            builder::declare_variable(
                "x",
                None,
                Some(builder::constant(ConstantValue::F32(0.0))),
            ),
            builder::for_each(
                "v",
                builder::identifier("data"),
                builder::multi(vec![builder::expression_statement(builder::assign(
                    AssignOp::Simple,
                    builder::identifier("x"),
                    builder::identifier("v"),
                ))]),
            ),
        ],
    )]);

    let options = SanitizeOptions {
        reduce_loops_to_while: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::Scoped(scoped) = &body[2] else {
        panic!("expected the lowered loop scope");
    };
    let Statement::Multi(multi) = scoped.statement.as_ref() else {
        panic!("expected the counter + while sequence");
    };
    assert_eq!(multi.statements.len(), 2);
    assert!(matches!(multi.statements[0], Statement::DeclareVariable(_)));

    let Statement::While(while_loop) = &multi.statements[1] else {
        panic!("expected the while loop");
    };
    let Statement::Multi(loop_body) = while_loop.body.as_ref() else {
        panic!("expected the loop body list");
    };
    // element binding first, increment last
    assert!(matches!(loop_body.statements.first(), Some(Statement::DeclareVariable(_))));
    assert!(matches!(loop_body.statements.last(), Some(Statement::Expression(_))));
}

#[test]
fn shadowed_variables_are_renamed() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![
            builder::declare_variable(
                "value",
                None,
                Some(builder::constant(ConstantValue::F32(1.0))),
            ),
            builder::scoped(builder::multi(vec![builder::declare_variable(
                "value",
                None,
                Some(builder::constant(ConstantValue::F32(2.0))),
            )])),
        ],
    )]);

    let options = SanitizeOptions {
        make_variable_name_unique: true,
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::Scoped(scoped) = &body[1] else {
        panic!("expected the inner scope");
    };
    let Statement::Multi(multi) = scoped.statement.as_ref() else {
        panic!("expected the scope body");
    };
    let Statement::DeclareVariable(inner) = &multi.statements[0] else {
        panic!("expected the shadowing declaration");
    };
    assert_eq!(inner.var_name, "value_2");
}

#[test]
fn stage_restricted_calls_are_checked() {
    // helper discards, vertex entry calls helper
    let module = test_module(vec![
        builder::declare_function("helper", Vec::new(), None, vec![builder::discard()]),
        builder::entry_function(
            ShaderStage::Vertex,
            "main",
            Vec::new(),
            None,
            vec![builder::expression_statement(builder::call_function(
                builder::identifier("helper"),
                Vec::new(),
            ))],
        ),
    ]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "InvalidStageDependency");
    assert_eq!(
        error.kind.to_string(),
        "this is only valid in the fragment stage but this function gets called in the vertex stage"
    );
}

#[test]
fn vertex_builtin_is_rejected_in_fragment_output() {
    let mut member = builder::struct_member("position", vec_type(4));
    member.builtin = ExpressionValue::Value(BuiltinEntry::VertexPosition);

    let module = test_module(vec![
        builder::declare_struct("Output", vec![member]),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            Some(ExpressionType::Struct(StructType { struct_index: 0 })),
            vec![builder::return_statement(Some(builder::call_function(
                builder::identifier("Output"),
                Vec::new(),
            )))],
        ),
    ]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "BuiltinUnsupportedStage");
    assert_eq!(
        error.kind.to_string(),
        "builtin position is not available in fragment stage"
    );
}

#[test]
fn builtin_type_is_validated() {
    let mut member = builder::struct_member("position", f32_type());
    member.builtin = ExpressionValue::Value(BuiltinEntry::VertexPosition);

    let module = test_module(vec![
        builder::declare_struct("Output", vec![member]),
        builder::entry_function(
            ShaderStage::Vertex,
            "main",
            Vec::new(),
            Some(ExpressionType::Struct(StructType { struct_index: 0 })),
            vec![builder::return_statement(Some(builder::call_function(
                builder::identifier("Output"),
                Vec::new(),
            )))],
        ),
    ]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "BuiltinUnexpectedType");
    assert_eq!(
        error.kind.to_string(),
        "builtin position expected type vec4[f32], got type f32"
    );
}

#[test]
fn external_matrix_requires_the_primitive_feature() {
    let external = builder::declare_external(vec![builder::external_var(
        "transform",
        mat_type(4),
        0,
    )]);

    let error = sanitize(&test_module(vec![external.clone()]), &SanitizeOptions::default())
        .unwrap_err();
    assert_eq!(error.kind.code(), "ExtTypeNotAllowed");
    assert!(error.to_string().contains("mat4[f32]"));

    // enabling the feature flag makes the same declaration legal
    let mut module = test_module(vec![external]);
    module
        .metadata
        .enabled_features
        .push(ModuleFeature::PrimitiveExternals);
    sanitize(&module, &SanitizeOptions::default()).unwrap();
}

#[test]
fn unsized_array_requires_an_initializer() {
    let unsized_array = ExpressionType::Array(ArrayType {
        contained_type: Box::new(f32_type()),
        length: 0,
    });

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable("data", Some(unsized_array), None)],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "ArrayLengthRequired");
}

#[test]
fn array_length_is_inferred_from_the_literal() {
    let unsized_array = ExpressionType::Array(ArrayType {
        contained_type: Box::new(f32_type()),
        length: 0,
    });

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable(
            "data",
            Some(unsized_array.clone()),
            Some(builder::cast(
                unsized_array,
                vec![
                    builder::constant(ConstantValue::F32(1.0)),
                    builder::constant(ConstantValue::F32(2.0)),
                    builder::constant(ConstantValue::F32(3.0)),
                ],
            )),
        )],
    )]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::DeclareVariable(decl) = &body[0] else {
        panic!("expected the declaration");
    };
    let Some(ExpressionType::Array(array)) = decl.var_type.value() else {
        panic!("expected an array type");
    };
    assert_eq!(array.length, 3);
}

#[test]
fn array_literal_with_wrong_count_is_rejected() {
    let sized_array = ExpressionType::Array(ArrayType {
        contained_type: Box::new(f32_type()),
        length: 4,
    });

    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable(
            "data",
            None,
            Some(builder::cast(
                sized_array,
                vec![
                    builder::constant(ConstantValue::F32(1.0)),
                    builder::constant(ConstantValue::F32(2.0)),
                    builder::constant(ConstantValue::F32(3.0)),
                ],
            )),
        )],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "CastComponentMismatch");
    assert_eq!(
        error.kind.to_string(),
        "component count (3) doesn't match required component count (4)"
    );
}

#[test]
fn variable_type_mismatch_is_rejected() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable(
            "data",
            Some(f32_type()),
            Some(builder::constant(ConstantValue::I32(42))),
        )],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "VarDeclarationTypeUnmatching");
    assert_eq!(
        error.kind.to_string(),
        "initial expression type (i32) doesn't match specified type (f32)"
    );
}

#[test]
fn return_type_is_checked() {
    let module = test_module(vec![builder::declare_function(
        "f",
        Vec::new(),
        Some(f32_type()),
        vec![builder::return_statement(Some(builder::constant(
            ConstantValue::I32(1),
        )))],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "VarDeclarationTypeUnmatching");
}

#[test]
fn inverse_requires_a_square_matrix() {
    let module = test_module(vec![builder::declare_function(
        "f",
        vec![builder::function_parameter(
            "m",
            ExpressionType::Matrix(MatrixType {
                column_count: 2,
                row_count: 3,
                component_type: PrimitiveType::Float32,
            }),
        )],
        None,
        vec![builder::declare_variable(
            "inv",
            None,
            Some(builder::intrinsic(
                IntrinsicType::Inverse,
                vec![builder::identifier("m")],
            )),
        )],
    )]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "IntrinsicExpectedType");
    assert_eq!(
        error.kind.to_string(),
        "expected type square matrix for parameter #0, got mat2x3[f32]"
    );
}

#[test]
fn sampler_method_call_becomes_an_intrinsic() {
    let sampler = ExpressionType::Sampler(SamplerType {
        dimension: SamplerDimension::Dim2D,
        sampled_type: PrimitiveType::Float32,
    });

    let module = test_module(vec![
        builder::declare_external(vec![builder::external_var("tex", sampler, 0)]),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            None,
            vec![builder::declare_variable(
                "color",
                None,
                Some(Expression::CallMethod(CallMethodExpression {
                    object: Box::new(builder::identifier("tex")),
                    method_name: "Sample".to_string(),
                    parameters: vec![builder::cast(
                        vec_type(2),
                        vec![
                            builder::constant(ConstantValue::F32(0.5)),
                            builder::constant(ConstantValue::F32(0.5)),
                        ],
                    )],
                    cached_type: None,
                    source_location: Default::default(),
                })),
            )],
        ),
    ]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::DeclareVariable(decl) = &body[0] else {
        panic!("expected the declaration");
    };
    let Some(init) = &decl.initial_expression else {
        panic!("expected an initializer");
    };
    let Expression::Intrinsic(intrinsic) = init.as_ref() else {
        panic!("expected a sample intrinsic");
    };
    assert_eq!(intrinsic.intrinsic, IntrinsicType::SampleTexture);
    assert_eq!(intrinsic.cached_type, Some(vec_type(4)));
}

#[test]
fn member_access_lowers_to_indices() {
    let module = test_module(vec![
        builder::declare_struct(
            "Data",
            vec![
                builder::struct_member("first", f32_type()),
                builder::struct_member("second", i32_type()),
            ],
        ),
        builder::declare_external(vec![builder::external_var(
            "data",
            ExpressionType::Uniform(UniformType {
                contained_type: StructType { struct_index: 0 },
            }),
            0,
        )]),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            None,
            vec![builder::declare_variable(
                "x",
                None,
                Some(builder::access_member(builder::identifier("data"), &["second"])),
            )],
        ),
    ]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    let body = function_body(&sanitized, "main");

    let Statement::DeclareVariable(decl) = &body[0] else {
        panic!("expected the declaration");
    };
    let Some(init) = &decl.initial_expression else {
        panic!("expected an initializer");
    };
    let Expression::AccessIndex(access) = init.as_ref() else {
        panic!("expected a lowered member access");
    };
    assert_eq!(access.cached_type, Some(i32_type()));
    assert!(matches!(
        &access.indices[0],
        Expression::ConstantValue(value) if value.value == ConstantValue::U32(1)
    ));
}
