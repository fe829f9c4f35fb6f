//! Optimization pipeline tests: constant propagation over sanitized
//! modules, dependency collection and unused-declaration elimination.

use nzsl_ast::ast::*;
use nzsl_ast::builder;
use nzsl_ast::module::{Module, ModuleMetadata};
use nzsl_ast::types::{ExpressionType, PrimitiveType, StructType, UniformType, VectorType};
use nzsl_ast::value::ConstantValue;
use nzsl_resolve::{
    collect_usage, eliminate_unused, propagate_constants, sanitize, DependencyConfig,
    SanitizeOptions,
};

fn f32_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Float32)
}

fn test_module(statements: Vec<Statement>) -> Module {
    Module::with_root(
        ModuleMetadata::new("Test"),
        MultiStatement {
            statements,
            source_location: Default::default(),
        },
    )
}

/// Two externals (one used), one helper function (unused), one entry point.
fn module_with_dead_code() -> Module {
    test_module(vec![
        builder::declare_struct(
            "UsedData",
            vec![builder::struct_member("value", f32_type())],
        ),
        builder::declare_struct(
            "UnusedData",
            vec![builder::struct_member("value", f32_type())],
        ),
        builder::declare_external(vec![
            builder::external_var(
                "data",
                ExpressionType::Uniform(UniformType {
                    contained_type: StructType { struct_index: 0 },
                }),
                0,
            ),
            builder::external_var(
                "unusedData",
                ExpressionType::Uniform(UniformType {
                    contained_type: StructType { struct_index: 1 },
                }),
                1,
            ),
        ]),
        builder::declare_function(
            "unusedHelper",
            Vec::new(),
            Some(f32_type()),
            vec![builder::return_statement(Some(builder::constant(
                ConstantValue::F32(0.0),
            )))],
        ),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            None,
            vec![builder::declare_variable(
                "x",
                None,
                Some(builder::access_member(builder::identifier("data"), &["value"])),
            )],
        ),
    ])
}

fn declared_struct_names(module: &Module) -> Vec<String> {
    module
        .root_node
        .statements
        .iter()
        .filter_map(|statement| match statement {
            Statement::DeclareStruct(decl) => Some(decl.description.name.clone()),
            _ => None,
        })
        .collect()
}

fn declared_function_names(module: &Module) -> Vec<String> {
    module
        .root_node
        .statements
        .iter()
        .filter_map(|statement| match statement {
            Statement::DeclareFunction(func) => Some(func.name.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn usage_is_collected_transitively() {
    let sanitized = sanitize(&module_with_dead_code(), &SanitizeOptions::default()).unwrap();

    let usage = collect_usage(&sanitized, &DependencyConfig::default());

    // main + the struct behind the used uniform, but not the helper
    assert_eq!(usage.used_functions.len(), 1);
    assert_eq!(usage.used_structs.len(), 1);
    assert!(usage.used_structs.contains(&0));
    assert!(!usage.used_structs.contains(&1));
}

#[test]
fn unused_declarations_are_eliminated() {
    let sanitized = sanitize(&module_with_dead_code(), &SanitizeOptions::default()).unwrap();

    let pruned = eliminate_unused(&sanitized, &DependencyConfig::default()).unwrap();

    assert_eq!(declared_struct_names(&pruned), vec!["UsedData"]);
    assert_eq!(declared_function_names(&pruned), vec!["main"]);

    // the external block keeps only the reachable variable
    let external = pruned
        .root_node
        .statements
        .iter()
        .find_map(|statement| match statement {
            Statement::DeclareExternal(node) => Some(node),
            _ => None,
        })
        .expect("external block must survive");
    assert_eq!(external.external_vars.len(), 1);
    assert_eq!(external.external_vars[0].name, "data");
}

#[test]
fn stage_filter_restricts_roots() {
    let sanitized = sanitize(&module_with_dead_code(), &SanitizeOptions::default()).unwrap();

    // no vertex entry point exists, so nothing is reachable
    let config = DependencyConfig {
        used_shader_stages: ShaderStageFlags::VERTEX,
    };
    let usage = collect_usage(&sanitized, &config);
    assert!(usage.used_functions.is_empty());

    let pruned = eliminate_unused(&sanitized, &config).unwrap();
    assert!(declared_function_names(&pruned).is_empty());
}

#[test]
fn disabled_struct_members_are_dropped() {
    let mut disabled = builder::struct_member("debugValue", f32_type());
    disabled.cond = ExpressionValue::Value(false);

    let module = test_module(vec![
        builder::declare_struct(
            "Data",
            vec![builder::struct_member("value", f32_type()), disabled],
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
                Some(builder::access_member(builder::identifier("data"), &["value"])),
            )],
        ),
    ]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    let pruned = eliminate_unused(&sanitized, &DependencyConfig::default()).unwrap();

    let members: Vec<_> = pruned
        .root_node
        .statements
        .iter()
        .find_map(|statement| match statement {
            Statement::DeclareStruct(decl) => Some(&decl.description.members),
            _ => None,
        })
        .expect("struct must survive")
        .iter()
        .map(|member| member.name.clone())
        .collect();
    assert_eq!(members, vec!["value"]);
}

#[test]
fn propagation_folds_inside_a_sanitized_module() {
    let module = test_module(vec![builder::entry_function(
        ShaderStage::Fragment,
        "main",
        Vec::new(),
        None,
        vec![builder::declare_variable(
            "v",
            None,
            Some(builder::swizzle(
                builder::cast(
                    ExpressionType::Vector(VectorType {
                        component_count: 4,
                        component_type: PrimitiveType::Float32,
                    }),
                    vec![
                        builder::constant(ConstantValue::F32(3.0)),
                        builder::constant(ConstantValue::F32(0.0)),
                        builder::constant(ConstantValue::F32(1.0)),
                        builder::constant(ConstantValue::F32(2.0)),
                    ],
                ),
                &[1, 2, 3, 0],
            )),
        )],
    )]);

    let sanitized = sanitize(&module, &SanitizeOptions::default()).unwrap();
    let folded = propagate_constants(&sanitized).unwrap();

    let Statement::DeclareFunction(func) = &folded.root_node.statements[0] else {
        panic!("expected the entry function");
    };
    let Statement::DeclareVariable(decl) = &func.statements[0] else {
        panic!("expected the declaration");
    };
    let Some(init) = &decl.initial_expression else {
        panic!("expected an initializer");
    };
    let Expression::ConstantValue(value) = init.as_ref() else {
        panic!("swizzle of a constant vector must fold, got {:?}", init.node_kind());
    };
    assert_eq!(
        value.value,
        ConstantValue::Vec4F32(nzsl_ast::foundation::Vector4::new(0.0, 1.0, 2.0, 3.0))
    );
    assert_eq!(
        value.cached_type,
        Some(ExpressionType::Vector(VectorType {
            component_count: 4,
            component_type: PrimitiveType::Float32,
        }))
    );
}
