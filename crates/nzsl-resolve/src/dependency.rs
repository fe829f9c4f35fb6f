//! Transitive usage tracking.
//!
//! Walks a sanitized module from its entry points (or any explicitly
//! marked roots) and records every function, struct, variable, constant,
//! alias and option the roots can reach. Recording a function pulls in its
//! body; types pull in the structs they mention. The resulting
//! [`UsageSet`] drives [`eliminate_unused`](crate::eliminate_unused).

use indexmap::IndexSet;
use nzsl_ast::ast::*;
use nzsl_ast::module::Module;
use nzsl_ast::types::ExpressionType;
use nzsl_ast::visitor::{ExpressionVisitor, StatementVisitor};
use tracing::debug;

/// Everything reachable from the configured roots, by index kind.
#[derive(Debug, Default, Clone)]
pub struct UsageSet {
    pub used_functions: IndexSet<usize>,
    pub used_structs: IndexSet<usize>,
    pub used_variables: IndexSet<usize>,
    pub used_constants: IndexSet<usize>,
    pub used_aliases: IndexSet<usize>,
    pub used_options: IndexSet<usize>,
}

/// Root selection for the walk.
#[derive(Debug, Clone)]
pub struct DependencyConfig {
    /// Entry functions targeting these stages become roots
    pub used_shader_stages: ShaderStageFlags,
}

impl Default for DependencyConfig {
    fn default() -> Self {
        Self {
            used_shader_stages: ShaderStageFlags::ALL,
        }
    }
}

/// Collects reachability over a sanitized module.
pub struct DependencyChecker<'m> {
    module: &'m Module,
    usage: UsageSet,
    /// Function declarations by index, across the whole module DAG
    functions: Vec<Option<&'m DeclareFunctionStatement>>,
    /// Struct declarations by index, across the whole module DAG
    structs: Vec<Option<&'m DeclareStructStatement>>,
    pending_functions: Vec<usize>,
}

impl<'m> DependencyChecker<'m> {
    pub fn new(module: &'m Module) -> Self {
        let mut checker = Self {
            module,
            usage: UsageSet::default(),
            functions: Vec::new(),
            structs: Vec::new(),
            pending_functions: Vec::new(),
        };
        checker.index_module(module);
        checker
    }

    /// The usage collected so far.
    pub fn usage(&self) -> &UsageSet {
        &self.usage
    }

    /// Consume the checker, returning the collected usage.
    pub fn into_usage(self) -> UsageSet {
        self.usage
    }

    /// Force a function into the used set (library roots).
    pub fn mark_function_as_used(&mut self, func_index: usize) {
        if self.usage.used_functions.insert(func_index) {
            self.pending_functions.push(func_index);
        }
    }

    /// Force a struct into the used set.
    pub fn mark_struct_as_used(&mut self, struct_index: usize) {
        if self.usage.used_structs.insert(struct_index) {
            self.register_struct_dependencies(struct_index);
        }
    }

    /// Register the entry points selected by `config` as roots and compute
    /// the transitive closure.
    pub fn register(&mut self, config: &DependencyConfig) {
        debug!(module = %self.module.metadata.module_name, "collecting dependencies");

        let mut roots = Vec::new();
        self.collect_entry_points(&self.module.root_node, config, &mut roots);
        for func_index in roots {
            self.mark_function_as_used(func_index);
        }

        self.resolve();
    }

    /// Drain the pending queue: each used function walks its body once.
    pub fn resolve(&mut self) {
        while let Some(func_index) = self.pending_functions.pop() {
            let Some(func) = self.functions.get(func_index).copied().flatten() else {
                continue;
            };

            for parameter in &func.parameters {
                if let Some(ty) = parameter.param_type.value() {
                    self.record_type(ty);
                }
            }
            if let Some(ty) = func.return_type.value() {
                let ty = ty.clone();
                self.record_type(&ty);
            }

            let statements: &[Statement] = &func.statements;
            for statement in statements {
                self.visit_statement(statement);
            }
        }
    }

    fn collect_entry_points(
        &self,
        root: &MultiStatement,
        config: &DependencyConfig,
        out: &mut Vec<usize>,
    ) {
        for statement in &root.statements {
            match statement {
                Statement::DeclareFunction(func) => {
                    let stage = func.entry_stage.value();
                    if let (Some(stage), Some(func_index)) = (stage, func.func_index) {
                        if config.used_shader_stages.contains(*stage) {
                            out.push(func_index);
                        }
                    }
                }
                Statement::Multi(multi) => self.collect_entry_points(multi, config, out),
                _ => {}
            }
        }
    }

    /// Index every function and struct declaration of the module DAG so
    /// reachability can jump across imports.
    fn index_module(&mut self, module: &'m Module) {
        for imported in &module.imported_modules {
            self.index_module(&imported.module);
        }
        self.index_statements(&module.root_node.statements);
    }

    fn index_statements(&mut self, statements: &'m [Statement]) {
        for statement in statements {
            match statement {
                Statement::DeclareFunction(func) => {
                    if let Some(index) = func.func_index {
                        if self.functions.len() <= index {
                            self.functions.resize(index + 1, None);
                        }
                        self.functions[index] = Some(func);
                    }
                }
                Statement::DeclareStruct(decl) => {
                    if let Some(index) = decl.struct_index {
                        if self.structs.len() <= index {
                            self.structs.resize(index + 1, None);
                        }
                        self.structs[index] = Some(decl);
                    }
                }
                Statement::Multi(multi) => self.index_statements(&multi.statements),
                _ => {}
            }
        }
    }

    /// Record every struct and alias a type mentions.
    fn record_type(&mut self, ty: &ExpressionType) {
        match ty {
            ExpressionType::Struct(s) => self.mark_struct_as_used(s.struct_index),
            ExpressionType::Uniform(u) => self.mark_struct_as_used(u.contained_type.struct_index),
            ExpressionType::Array(a) => self.record_type(&a.contained_type),
            ExpressionType::Alias(a) => {
                self.usage.used_aliases.insert(a.alias_index);
                let target = (*a.target_type).clone();
                self.record_type(&target);
            }
            ExpressionType::Type(inner) => {
                let inner = (**inner).clone();
                self.record_type(&inner);
            }
            _ => {}
        }
    }

    /// A used struct pulls in the structs its members mention.
    fn register_struct_dependencies(&mut self, struct_index: usize) {
        let Some(decl) = self.structs.get(struct_index).copied().flatten() else {
            return;
        };

        for member in &decl.description.members {
            if matches!(member.cond.value(), Some(false)) {
                continue;
            }
            if let Some(ty) = member.member_type.value() {
                let ty = ty.clone();
                self.record_type(&ty);
            }
        }
    }
}

impl ExpressionVisitor for DependencyChecker<'_> {
    fn visit_variable_value(&mut self, node: &VariableValueExpression) {
        self.usage.used_variables.insert(node.variable_id);
        if let Some(ty) = &node.cached_type {
            let ty = ty.clone();
            self.record_type(&ty);
        }
    }

    fn visit_function(&mut self, node: &FunctionExpression) {
        self.mark_function_as_used(node.func_id);
    }

    fn visit_constant(&mut self, node: &ConstantExpression) {
        self.usage.used_constants.insert(node.constant_id);
    }

    fn visit_alias_value(&mut self, node: &AliasValueExpression) {
        self.usage.used_aliases.insert(node.alias_id);
        if let Some(ty) = &node.cached_type {
            let ty = ty.clone();
            self.record_type(&ty);
        }
    }

    fn visit_struct_type(&mut self, node: &StructTypeExpression) {
        self.mark_struct_as_used(node.struct_type_id);
    }

    fn visit_cast(&mut self, node: &CastExpression) {
        if let Some(ty) = node.target_type.value() {
            let ty = ty.clone();
            self.record_type(&ty);
        }
        if let ExpressionValue::Expression(expr) = &node.target_type {
            self.visit_expression(expr);
        }
        for expr in &node.expressions {
            self.visit_expression(expr);
        }
    }
}

impl StatementVisitor for DependencyChecker<'_> {
    fn visit_declare_variable(&mut self, node: &DeclareVariableStatement) {
        if let Some(ty) = node.var_type.value() {
            let ty = ty.clone();
            self.record_type(&ty);
        }
        nzsl_ast::visitor::visit_expression_value(self, &node.var_type);
        if let Some(initial) = &node.initial_expression {
            self.visit_expression(initial);
        }
    }

    fn visit_declare_external(&mut self, node: &DeclareExternalStatement) {
        for var in &node.external_vars {
            if let Some(ty) = var.var_type.value() {
                let ty = ty.clone();
                self.record_type(&ty);
            }
        }
    }
}

/// Convenience wrapper: collect usage for a module with the given config.
pub fn collect_usage(module: &Module, config: &DependencyConfig) -> UsageSet {
    let mut checker = DependencyChecker::new(module);
    checker.register(config);
    checker.into_usage()
}
