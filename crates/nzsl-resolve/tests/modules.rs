//! Module linking: import resolution, export installation, cycle and
//! feature checks.

use nzsl_ast::ast::*;
use nzsl_ast::builder;
use nzsl_ast::module::{InMemoryModuleResolver, Module, ModuleMetadata};
use nzsl_ast::types::{ExpressionType, PrimitiveType, StructType, UniformType};
use nzsl_ast::value::ConstantValue;
use nzsl_resolve::{sanitize, SanitizeOptions};
use std::sync::Arc;

fn f32_type() -> ExpressionType {
    ExpressionType::Primitive(PrimitiveType::Float32)
}

fn module_with(name: &str, statements: Vec<Statement>) -> Module {
    Module::with_root(
        ModuleMetadata::new(name),
        MultiStatement {
            statements,
            source_location: Default::default(),
        },
    )
}

/// A library exporting a struct `Data` and a function `GetValue`.
fn library_module() -> Module {
    let mut exported_struct =
        builder::declare_struct("Data", vec![builder::struct_member("value", f32_type())]);
    if let Statement::DeclareStruct(decl) = &mut exported_struct {
        decl.is_exported = ExpressionValue::Value(true);
    }

    let mut exported_fn = builder::declare_function(
        "GetValue",
        Vec::new(),
        Some(f32_type()),
        vec![builder::return_statement(Some(builder::constant(
            ConstantValue::F32(42.0),
        )))],
    );
    if let Statement::DeclareFunction(func) = &mut exported_fn {
        func.is_exported = ExpressionValue::Value(true);
    }

    // an unexported helper must not leak to importers
    let private_fn = builder::declare_function("Hidden", Vec::new(), None, Vec::new());

    module_with("Engine.Library", vec![exported_struct, exported_fn, private_fn])
}

fn resolver_with_library() -> Arc<InMemoryModuleResolver> {
    let resolver = Arc::new(InMemoryModuleResolver::new());
    resolver.register(Arc::new(library_module()));
    resolver
}

#[test]
fn importing_installs_exported_names() {
    let module = module_with(
        "Test",
        vec![
            builder::import("Engine.Library"),
            builder::entry_function(
                ShaderStage::Fragment,
                "main",
                Vec::new(),
                None,
                vec![builder::declare_variable(
                    "x",
                    None,
                    Some(builder::call_function(
                        builder::identifier("GetValue"),
                        Vec::new(),
                    )),
                )],
            ),
        ],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();

    assert_eq!(sanitized.imported_modules.len(), 1);
    assert_eq!(sanitized.imported_modules[0].identifier, "Engine.Library");
    assert_eq!(
        sanitized.imported_modules[0].module.metadata.module_name,
        "Engine.Library"
    );

    // the import statement became alias declarations for both exports
    let alias_count = count_aliases(&sanitized.root_node.statements);
    assert_eq!(alias_count, 2);
}

fn count_aliases(statements: &[Statement]) -> usize {
    statements
        .iter()
        .map(|statement| match statement {
            Statement::DeclareAlias(_) => 1,
            Statement::Multi(multi) => count_aliases(&multi.statements),
            _ => 0,
        })
        .sum()
}

#[test]
fn unexported_names_are_not_importable() {
    let module = module_with(
        "Test",
        vec![builder::import_identifiers(
            "Engine.Library",
            vec![ImportIdentifier {
                identifier: "Hidden".to_string(),
                rename: String::new(),
                source_location: Default::default(),
            }],
        )],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "UnknownIdentifier");
}

#[test]
fn explicit_imports_can_rename() {
    let module = module_with(
        "Test",
        vec![
            builder::import_identifiers(
                "Engine.Library",
                vec![ImportIdentifier {
                    identifier: "GetValue".to_string(),
                    rename: "Fetch".to_string(),
                    source_location: Default::default(),
                }],
            ),
            builder::entry_function(
                ShaderStage::Fragment,
                "main",
                Vec::new(),
                None,
                vec![builder::declare_variable(
                    "x",
                    None,
                    Some(builder::call_function(builder::identifier("Fetch"), Vec::new())),
                )],
            ),
        ],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    sanitize(&module, &options).unwrap();
}

#[test]
fn multiple_wildcards_are_rejected() {
    let wildcard = || ImportIdentifier {
        identifier: String::new(),
        rename: String::new(),
        source_location: Default::default(),
    };

    let module = module_with(
        "Test",
        vec![builder::import_identifiers(
            "Engine.Library",
            vec![wildcard(), wildcard()],
        )],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "ImportMultipleWildcard");
}

#[test]
fn renamed_wildcard_is_rejected() {
    let module = module_with(
        "Test",
        vec![builder::import_identifiers(
            "Engine.Library",
            vec![ImportIdentifier {
                identifier: String::new(),
                rename: "Lib".to_string(),
                source_location: Default::default(),
            }],
        )],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "ImportWildcardRename");
}

#[test]
fn duplicate_import_is_rejected() {
    let entry = |rename: &str| ImportIdentifier {
        identifier: "GetValue".to_string(),
        rename: rename.to_string(),
        source_location: Default::default(),
    };

    let module = module_with(
        "Test",
        vec![builder::import_identifiers(
            "Engine.Library",
            vec![entry(""), entry("")],
        )],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "ImportIdentifierAlreadyPresent");
    assert_eq!(
        error.kind.to_string(),
        "GetValue identifier was already imported"
    );
}

#[test]
fn circular_imports_are_detected() {
    let resolver = Arc::new(InMemoryModuleResolver::new());
    resolver.register(Arc::new(module_with(
        "Engine.A",
        vec![builder::import("Engine.B")],
    )));
    resolver.register(Arc::new(module_with(
        "Engine.B",
        vec![builder::import("Engine.A")],
    )));

    let module = module_with("Test", vec![builder::import("Engine.A")]);

    let options = SanitizeOptions {
        module_resolver: Some(resolver),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "CircularImport");
}

#[test]
fn missing_resolver_fails_imports() {
    let module = module_with("Test", vec![builder::import("Engine.Library")]);

    let error = sanitize(&module, &SanitizeOptions::default()).unwrap_err();
    assert_eq!(error.kind.code(), "UnknownIdentifier");
}

#[test]
fn feature_mismatch_is_detected() {
    let mut library = library_module();
    library
        .metadata
        .enabled_features
        .push(ModuleFeature::PrimitiveExternals);

    let resolver = Arc::new(InMemoryModuleResolver::new());
    resolver.register(Arc::new(library));

    let module = module_with("Test", vec![builder::import("Engine.Library")]);

    let options = SanitizeOptions {
        module_resolver: Some(resolver),
        ..SanitizeOptions::default()
    };
    let error = sanitize(&module, &options).unwrap_err();
    assert_eq!(error.kind.code(), "ModuleFeatureMismatch");
    assert_eq!(
        error.kind.to_string(),
        "module Engine.Library requires feature primitive_externals"
    );
}

#[test]
fn imported_struct_is_usable_in_externals() {
    // the library struct lands at struct index 0 (imports sanitize first)
    let module = module_with(
        "Test",
        vec![
            builder::import("Engine.Library"),
            builder::declare_external(vec![builder::external_var(
                "block",
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
                    Some(builder::access_member(builder::identifier("block"), &["value"])),
                )],
            ),
        ],
    );

    let options = SanitizeOptions {
        module_resolver: Some(resolver_with_library()),
        ..SanitizeOptions::default()
    };
    let sanitized = sanitize(&module, &options).unwrap();

    // block.value resolved against the imported struct
    for statement in &sanitized.root_node.statements {
        if let Statement::DeclareFunction(func) = statement {
            let Statement::DeclareVariable(decl) = &func.statements[0] else {
                panic!("expected the declaration");
            };
            assert_eq!(
                decl.var_type.value(),
                Some(&ExpressionType::Primitive(PrimitiveType::Float32))
            );
            return;
        }
    }
    panic!("entry function not found");
}
