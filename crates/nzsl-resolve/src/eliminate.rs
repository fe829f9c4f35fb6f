//! Unused-declaration elimination.
//!
//! A [`Cloner`] over a sanitized module that keeps a declaration only when
//! its index appears in a [`UsageSet`], and drops struct members whose
//! `cond` attribute resolved to false. Run after constant propagation so
//! conditions have bottomed out.

use crate::dependency::{collect_usage, DependencyConfig, UsageSet};
use nzsl_ast::ast::*;
use nzsl_ast::cloner::{clone_expression_value, Cloner};
use nzsl_ast::error::Result;
use nzsl_ast::module::Module;
use tracing::debug;

/// Remove everything not reachable from the entry points selected by
/// `config`.
pub fn eliminate_unused(module: &Module, config: &DependencyConfig) -> Result<Module> {
    let usage = collect_usage(module, config);
    eliminate_unused_with(module, &usage)
}

/// Remove everything not present in a precomputed usage set.
pub fn eliminate_unused_with(module: &Module, usage: &UsageSet) -> Result<Module> {
    debug!(module = %module.metadata.module_name, "eliminating unused declarations");

    let mut eliminator = Eliminator { usage };

    let mut statements = Vec::with_capacity(module.root_node.statements.len());
    for statement in &module.root_node.statements {
        let statement = eliminator.clone_statement(statement)?;
        if !matches!(statement, Statement::NoOp(_)) {
            statements.push(statement);
        }
    }

    Ok(Module {
        metadata: module.metadata.clone(),
        imported_modules: module.imported_modules.clone(),
        root_node: MultiStatement {
            statements,
            source_location: module.root_node.source_location.clone(),
        },
    })
}

struct Eliminator<'u> {
    usage: &'u UsageSet,
}

impl Eliminator<'_> {
    fn keep(set: &indexmap::IndexSet<usize>, index: Option<usize>) -> bool {
        match index {
            Some(index) => set.contains(&index),
            // unresolved declarations are kept; only sanitized indices can
            // prove a declaration dead
            None => true,
        }
    }
}

impl Cloner for Eliminator<'_> {
    fn clone_multi(&mut self, node: &MultiStatement) -> Result<Statement> {
        let mut statements = Vec::with_capacity(node.statements.len());
        for statement in &node.statements {
            let statement = self.clone_statement(statement)?;
            if !matches!(statement, Statement::NoOp(_)) {
                statements.push(statement);
            }
        }

        Ok(Statement::Multi(MultiStatement {
            statements,
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_function(&mut self, node: &DeclareFunctionStatement) -> Result<Statement> {
        if !Self::keep(&self.usage.used_functions, node.func_index) {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        // default deep copy for kept declarations
        nzsl_ast::cloner::Cloner::clone_declare_function(&mut KeepAll, node)
    }

    fn clone_declare_struct(&mut self, node: &DeclareStructStatement) -> Result<Statement> {
        if !Self::keep(&self.usage.used_structs, node.struct_index) {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        // disabled members disappear with their struct kept
        let mut members = Vec::with_capacity(node.description.members.len());
        for member in &node.description.members {
            if matches!(member.cond.value(), Some(false)) {
                continue;
            }
            members.push(StructMember {
                name: member.name.clone(),
                member_type: clone_expression_value(self, &member.member_type)?,
                builtin: clone_expression_value(self, &member.builtin)?,
                cond: clone_expression_value(self, &member.cond)?,
                location_index: clone_expression_value(self, &member.location_index)?,
                source_location: member.source_location.clone(),
            });
        }

        Ok(Statement::DeclareStruct(DeclareStructStatement {
            struct_index: node.struct_index,
            is_exported: clone_expression_value(self, &node.is_exported)?,
            description: StructDescription {
                name: node.description.name.clone(),
                layout: clone_expression_value(self, &node.description.layout)?,
                members,
            },
            source_location: node.source_location.clone(),
        }))
    }

    fn clone_declare_const(&mut self, node: &DeclareConstStatement) -> Result<Statement> {
        if !Self::keep(&self.usage.used_constants, node.const_index) {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        nzsl_ast::cloner::Cloner::clone_declare_const(&mut KeepAll, node)
    }

    fn clone_declare_alias(&mut self, node: &DeclareAliasStatement) -> Result<Statement> {
        if !Self::keep(&self.usage.used_aliases, node.alias_index) {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        nzsl_ast::cloner::Cloner::clone_declare_alias(&mut KeepAll, node)
    }

    fn clone_declare_option(&mut self, node: &DeclareOptionStatement) -> Result<Statement> {
        if !Self::keep(&self.usage.used_options, node.opt_index) {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        nzsl_ast::cloner::Cloner::clone_declare_option(&mut KeepAll, node)
    }

    fn clone_declare_external(&mut self, node: &DeclareExternalStatement) -> Result<Statement> {
        let mut external_vars = Vec::with_capacity(node.external_vars.len());
        for var in &node.external_vars {
            let used = match var.var_index {
                Some(index) => self.usage.used_variables.contains(&index),
                None => true,
            };
            if !used {
                continue;
            }

            external_vars.push(ExternalVar {
                var_index: var.var_index,
                name: var.name.clone(),
                var_type: clone_expression_value(self, &var.var_type)?,
                binding_index: clone_expression_value(self, &var.binding_index)?,
                binding_set: clone_expression_value(self, &var.binding_set)?,
                source_location: var.source_location.clone(),
            });
        }

        if external_vars.is_empty() {
            return Ok(Statement::NoOp(NoOpStatement {
                source_location: node.source_location.clone(),
            }));
        }

        Ok(Statement::DeclareExternal(DeclareExternalStatement {
            binding_set: clone_expression_value(self, &node.binding_set)?,
            external_vars,
            source_location: node.source_location.clone(),
        }))
    }
}

/// Plain deep cloner used for the bodies of kept declarations.
struct KeepAll;

impl Cloner for KeepAll {}
