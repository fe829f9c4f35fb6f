//! Round-trip tests: serialize → deserialize → serialize must reproduce
//! the module structurally and the bytes exactly.

use nzsl_ast::ast::*;
use nzsl_ast::builder;
use nzsl_ast::foundation::{SourceLocation, Vector3};
use nzsl_ast::module::{Module, ModuleMetadata};
use nzsl_ast::types::{ArrayType, ExpressionType, PrimitiveType, StructType, UniformType};
use nzsl_ast::value::ConstantValue;
use nzsl_resolve::{sanitize, SanitizeOptions};
use nzsl_serializer::{deserialize_module, serialize_module, SerializationError};
use std::sync::Arc;

fn f32_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Float32)
}

fn test_module(statements: Vec<Statement>) -> Module {
    let mut metadata = ModuleMetadata::new("Engine.Test");
    metadata.author = Some("unit tests".to_string());

    Module::with_root(
        metadata,
        MultiStatement {
            statements,
            source_location: Default::default(),
        },
    )
}

/// A module exercising most node shapes.
fn representative_module() -> Module {
    test_module(vec![
        builder::declare_struct(
            "Input",
            vec![
                builder::struct_member("value", f32_type()),
                builder::struct_member(
                    "values",
                    ExpressionType::Array(ArrayType {
                        contained_type: Box::new(f32_type()),
                        length: 4,
                    }),
                ),
            ],
        ),
        builder::declare_external(vec![builder::external_var(
            "data",
            ExpressionType::Uniform(UniformType {
                contained_type: StructType { struct_index: 0 },
            }),
            0,
        )]),
        builder::declare_const("Scale", None, builder::constant(ConstantValue::F32(2.0))),
        builder::entry_function(
            ShaderStage::Fragment,
            "main",
            Vec::new(),
            None,
            vec![
                builder::declare_variable(
                    "x",
                    None,
                    Some(builder::binary(
                        BinaryOp::Multiply,
                        builder::access_member(builder::identifier("data"), &["value"]),
                        builder::identifier("Scale"),
                    )),
                ),
                builder::branch(
                    vec![(
                        builder::binary(
                            BinaryOp::CompGt,
                            builder::identifier("x"),
                            builder::constant(ConstantValue::F32(1.0)),
                        ),
                        builder::scoped(builder::multi(vec![builder::discard()])),
                    )],
                    None,
                ),
                builder::for_loop(
                    "i",
                    builder::constant(ConstantValue::I32(0)),
                    builder::constant(ConstantValue::I32(4)),
                    None,
                    builder::multi(vec![builder::expression_statement(builder::assign(
                        AssignOp::CompoundAdd,
                        builder::identifier("x"),
                        builder::access_index(
                            builder::access_member(builder::identifier("data"), &["values"]),
                            vec![builder::identifier("i")],
                        ),
                    ))]),
                ),
            ],
        ),
    ])
}

#[test]
fn raw_module_round_trips() {
    let module = representative_module();

    let bytes = serialize_module(&module);
    let decoded = deserialize_module(&bytes).unwrap();

    assert_eq!(decoded, module);
}

#[test]
fn sanitized_module_round_trips_bit_exactly() {
    let sanitized = sanitize(&representative_module(), &SanitizeOptions::default()).unwrap();

    let bytes = serialize_module(&sanitized);
    let decoded = deserialize_module(&bytes).unwrap();
    assert_eq!(decoded, sanitized);

    // serialize(deserialize(serialize(M))) == serialize(M)
    let bytes_again = serialize_module(&decoded);
    assert_eq!(bytes_again, bytes);
}

#[test]
fn source_locations_and_cached_types_survive() {
    let mut expr = builder::constant(ConstantValue::Vec3F32(Vector3::new(1.0, 2.0, 3.0)));
    if let Expression::ConstantValue(node) = &mut expr {
        node.source_location =
            SourceLocation::new(3, 7, 3, 21).with_file(Arc::from("shaders/test.nzsl"));
    }

    let module = test_module(vec![builder::expression_statement(expr)]);

    let decoded = deserialize_module(&serialize_module(&module)).unwrap();

    let Statement::Expression(stmt) = &decoded.root_node.statements[0] else {
        panic!("expected the expression statement");
    };
    let Expression::ConstantValue(node) = &stmt.expression else {
        panic!("expected the literal");
    };
    assert_eq!(node.value, ConstantValue::Vec3F32(Vector3::new(1.0, 2.0, 3.0)));
    assert_eq!(node.cached_type, Some(node.value.type_of()));
    assert_eq!(node.source_location.file.as_deref(), Some("shaders/test.nzsl"));
    assert_eq!(node.source_location.start_line, 3);
    assert_eq!(node.source_location.end_column, 21);
}

#[test]
fn imported_modules_serialize_recursively() {
    let child = Arc::new(test_module(vec![builder::declare_const(
        "Tau",
        None,
        builder::constant(ConstantValue::F32(6.2831855)),
    )]));

    let mut parent = test_module(Vec::new());
    parent.imported_modules.push(nzsl_ast::module::ImportedModule {
        identifier: "Engine.Maths".to_string(),
        module: child,
    });

    let decoded = deserialize_module(&serialize_module(&parent)).unwrap();

    assert_eq!(decoded, parent);
    assert_eq!(decoded.imported_modules.len(), 1);
    assert_eq!(decoded.imported_modules[0].identifier, "Engine.Maths");
    assert_eq!(
        decoded.imported_modules[0].module.metadata.module_name,
        "Engine.Test"
    );
}

#[test]
fn shared_file_names_are_interned() {
    let file: Arc<str> = Arc::from("shaders/shared.nzsl");

    let constant = |value: f32, line: u32| {
        let mut expr = builder::constant(ConstantValue::F32(value));
        if let Expression::ConstantValue(node) = &mut expr {
            node.source_location = SourceLocation::new(line, 1, line, 4).with_file(file.clone());
        }
        builder::expression_statement(expr)
    };

    let repeated = test_module((0..16).map(|i| constant(i as f32, i + 1)).collect());
    let unique_files = test_module(
        (0..16)
            .map(|i| {
                let mut statement = constant(i as f32, i + 1);
                if let Statement::Expression(stmt) = &mut statement {
                    if let Expression::ConstantValue(node) = &mut stmt.expression {
                        node.source_location.file =
                            Some(Arc::from(format!("shaders/file{}.nzsl", i).as_str()));
                    }
                }
                statement
            })
            .collect(),
    );

    let repeated_bytes = serialize_module(&repeated);
    let unique_bytes = serialize_module(&unique_files);

    // the repeated path is spelled out once; distinct paths are not
    assert!(repeated_bytes.len() < unique_bytes.len());

    assert_eq!(deserialize_module(&repeated_bytes).unwrap(), repeated);
}

#[test]
fn magic_is_checked() {
    let mut bytes = serialize_module(&test_module(Vec::new()));
    bytes[0] = b'X';
    assert_eq!(
        deserialize_module(&bytes),
        Err(SerializationError::InvalidMagic)
    );
}

#[test]
fn version_is_checked() {
    let mut bytes = serialize_module(&test_module(Vec::new()));
    bytes[5] = 0xFF;
    bytes[6] = 0xFF;
    assert_eq!(
        deserialize_module(&bytes),
        Err(SerializationError::UnsupportedVersion(0xFFFF))
    );
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = serialize_module(&test_module(Vec::new()));
    bytes.push(0);
    assert_eq!(
        deserialize_module(&bytes),
        Err(SerializationError::TrailingBytes)
    );
}

#[test]
fn truncated_stream_is_rejected() {
    let bytes = serialize_module(&representative_module());
    let truncated = &bytes[..bytes.len() / 2];
    assert!(deserialize_module(truncated).is_err());
}
