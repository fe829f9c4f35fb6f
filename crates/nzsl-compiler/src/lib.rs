// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Unified entry point for the NZSL compilation pipeline.
//!
//! [`compile`] chains the passes in their required order — sanitize the
//! module (linking imports through the configured resolver), propagate
//! constants, then drop everything unreachable from the selected entry
//! points. Each step consumes the previous step's output; nothing is
//! shared mutably, so callers may run compilations in parallel over
//! distinct modules.

pub mod log_format;
pub mod resolver;

pub use log_format::{format_classic, format_error, format_visual_studio, LogFormat};
pub use resolver::FilesystemModuleResolver;

use nzsl_ast::ast::ShaderStageFlags;
use nzsl_ast::error::Result;
use nzsl_ast::module::Module;
use nzsl_resolve::{
    eliminate_unused, propagate_constants, sanitize, DependencyConfig, SanitizeOptions,
};
use tracing::debug;

/// Pipeline configuration.
pub struct CompilerOptions {
    /// Sanitizer options; defaults to every canonicalization enabled
    pub sanitize: SanitizeOptions,
    /// Run constant propagation after sanitization
    pub propagate_constants: bool,
    /// Run dead-code elimination after propagation
    pub eliminate_unused: bool,
    /// Entry stages used as elimination roots
    pub used_shader_stages: ShaderStageFlags,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            sanitize: SanitizeOptions::full(),
            propagate_constants: true,
            eliminate_unused: true,
            used_shader_stages: ShaderStageFlags::ALL,
        }
    }
}

/// Run the full pipeline over a parsed module.
pub fn compile(module: &Module, options: &CompilerOptions) -> Result<Module> {
    debug!(module = %module.metadata.module_name, "compiling module");

    let mut module = sanitize(module, &options.sanitize)?;

    if options.propagate_constants {
        module = propagate_constants(&module)?;
    }

    if options.eliminate_unused {
        let config = DependencyConfig {
            used_shader_stages: options.used_shader_stages,
        };
        module = eliminate_unused(&module, &config)?;
    }

    Ok(module)
}

/// Compile and serialize to `.nzslb` bytes in one step.
pub fn compile_to_bytes(module: &Module, options: &CompilerOptions) -> Result<Vec<u8>> {
    let compiled = compile(module, options)?;
    Ok(nzsl_serializer::serialize_module(&compiled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nzsl_ast::ast::*;
    use nzsl_ast::builder;
    use nzsl_ast::module::ModuleMetadata;
    use nzsl_ast::types::{ExpressionType, PrimitiveType};
    use nzsl_ast::value::ConstantValue;

    fn simple_module() -> Module {
        Module::with_root(
            ModuleMetadata::new("Test"),
            MultiStatement {
                statements: vec![
                    builder::declare_const(
                        "Scale",
                        None,
                        builder::binary(
                            BinaryOp::Multiply,
                            builder::constant(ConstantValue::F32(2.0)),
                            builder::constant(ConstantValue::F32(3.0)),
                        ),
                    ),
                    builder::declare_function("unused", Vec::new(), None, Vec::new()),
                    builder::entry_function(
                        ShaderStage::Fragment,
                        "main",
                        Vec::new(),
                        None,
                        vec![builder::declare_variable(
                            "x",
                            Some(ExpressionType::Primitive(PrimitiveType::Float32)),
                            Some(builder::identifier("Scale")),
                        )],
                    ),
                ],
                source_location: Default::default(),
            },
        )
    }

    #[test]
    fn test_pipeline_folds_and_prunes() {
        let compiled = compile(&simple_module(), &CompilerOptions::default()).unwrap();

        // the const declaration was inlined and dropped, the helper pruned
        let mut function_names = Vec::new();
        for statement in &compiled.root_node.statements {
            match statement {
                Statement::DeclareFunction(func) => function_names.push(func.name.clone()),
                Statement::DeclareConst(_) => panic!("const declarations should be removed"),
                _ => {}
            }
        }
        assert_eq!(function_names, vec!["main"]);

        // x = 6.0, folded at sanitize time through the const table
        let Statement::DeclareFunction(main) = compiled
            .root_node
            .statements
            .iter()
            .find(|s| matches!(s, Statement::DeclareFunction(_)))
            .unwrap()
        else {
            unreachable!();
        };
        let Statement::DeclareVariable(decl) = &main.statements[0] else {
            panic!("expected the declaration");
        };
        let Some(init) = &decl.initial_expression else {
            panic!("expected an initializer");
        };
        assert!(
            matches!(init.as_ref(), Expression::ConstantValue(v) if v.value == ConstantValue::F32(6.0))
        );
    }

    #[test]
    fn test_compile_to_bytes_round_trips() {
        let bytes = compile_to_bytes(&simple_module(), &CompilerOptions::default()).unwrap();
        let decoded = nzsl_serializer::deserialize_module(&bytes).unwrap();
        assert_eq!(decoded.metadata.module_name, "Test");
    }
}
