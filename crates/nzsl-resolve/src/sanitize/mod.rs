//! The sanitization pass: name resolution, type checking and
//! canonicalization.
//!
//! Sanitization turns a freshly parsed module into the canonical form every
//! other pass and backend relies on: identifiers resolved to indices, every
//! expression carrying its type, imports linked and flattened, attributes
//! bottomed out to values, and — depending on [`SanitizeOptions`] — loops,
//! compound assignments, aliases, const/option declarations, scalar
//! swizzles and matrix casts lowered away.
//!
//! The pass is built on [`Cloner`]: the input module is never mutated, the
//! output is an independent tree. The first error aborts the pass.

mod exprs;
mod scope;
mod stmts;

pub use scope::{Identifier, ScopeStack};

use indexmap::{IndexMap, IndexSet};
use nzsl_ast::ast::*;
use nzsl_ast::cloner::{clone_expression_value, Cloner};
use nzsl_ast::error::{ErrorKind, Result};
use nzsl_ast::foundation::SourceLocation;
use nzsl_ast::module::{ImportedModule, Module, ModuleMetadata, ModuleResolver};
use nzsl_ast::types::{ExpressionType, StructType};
use nzsl_ast::value::ConstantValue;
use nzsl_ast::{builder, resolve_alias};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Sanitization options.
///
/// Every canonicalization is opt-in; [`SanitizeOptions::full`] enables all
/// of them, which is what code generation wants. Library sanitization (no
/// entry point, unresolvable identifiers tolerated) goes through
/// `allow_partial_sanitization`.
#[derive(Default)]
pub struct SanitizeOptions {
    /// Tolerate unknown identifiers and unresolvable constants, leaving the
    /// offending nodes untouched (library / precompilation mode)
    pub allow_partial_sanitization: bool,
    /// Rename shadowing declarations so every variable name is unique
    pub make_variable_name_unique: bool,
    /// Lower `for` / `for each` loops into `while` loops
    pub reduce_loops_to_while: bool,
    /// Resolve alias references and drop alias declarations
    pub remove_aliases: bool,
    /// Lower `a += b` into `a = a + b` (all compound forms)
    pub remove_compound_assignments: bool,
    /// Inline const values at every reference and drop the declarations
    pub remove_const_declaration: bool,
    /// Expand dimension-changing matrix casts into column assembly
    pub remove_matrix_cast: bool,
    /// Drop option declarations after resolving their values
    pub remove_option_declaration: bool,
    /// Replace swizzles over scalars with vector casts
    pub remove_scalar_swizzling: bool,
    /// Split `if/else if/else` chains into nested two-way branches
    pub split_multiple_branches: bool,
    /// Keep member accesses by name instead of lowering them to indices
    pub use_identifier_accesses_for_structs: bool,
    /// Names declarations may not take; colliding declarations are renamed
    pub reserved_identifiers: IndexSet<String>,
    /// Option values provided by the host, keyed by FNV-1a-32 name hash
    pub option_values: IndexMap<u32, ConstantValue>,
    /// Supplies imported modules by name
    pub module_resolver: Option<Arc<dyn ModuleResolver>>,
}

impl SanitizeOptions {
    /// Every canonicalization enabled: the form code generators consume.
    pub fn full() -> Self {
        Self {
            make_variable_name_unique: true,
            reduce_loops_to_while: true,
            remove_aliases: true,
            remove_compound_assignments: true,
            remove_const_declaration: true,
            remove_matrix_cast: true,
            remove_option_declaration: true,
            remove_scalar_swizzling: true,
            split_multiple_branches: true,
            ..Self::default()
        }
    }
}

/// Sanitize a module.
///
/// Consumes the input by reference and produces an independent, owned,
/// canonical module. Imported modules are resolved through
/// `options.module_resolver`, sanitized with the same options and shared
/// (`Arc`) in the output.
pub fn sanitize(module: &Module, options: &SanitizeOptions) -> Result<Module> {
    debug!(module = %module.metadata.module_name, "sanitizing module");

    let mut sanitizer = Sanitizer::new(options);
    sanitizer.sanitize_module(module)
}

pub(crate) struct VariableData {
    pub name: String,
    pub ty: ExpressionType,
}

pub(crate) struct FunctionData {
    pub name: String,
    pub parameters: Vec<ExpressionType>,
    pub return_type: ExpressionType,
    pub entry_stage: Option<ShaderStage>,
    /// Stage-restricted operation performed by this function's own body
    pub required_stage: Option<(ShaderStage, SourceLocation)>,
    pub called_functions: IndexSet<usize>,
}

pub(crate) struct ConstantData {
    pub name: String,
    pub ty: ExpressionType,
    /// Folded value, when the initializer folds to a constant
    pub value: Option<ConstantValue>,
    /// Sanitized initializer, inlined at references when consts are removed
    pub expression: Expression,
}

pub(crate) struct AliasData {
    pub name: String,
    pub target: Identifier,
    pub target_type: ExpressionType,
}

pub(crate) struct StructData {
    pub description: StructDescription,
}

pub(crate) struct OptionData {
    pub name: String,
    pub const_index: usize,
}

struct SanitizedImport {
    module: Arc<Module>,
    exports: Vec<(String, Identifier)>,
}

pub(crate) struct Sanitizer<'opts> {
    options: &'opts SanitizeOptions,
    pub(crate) scopes: ScopeStack,
    pub(crate) variables: Vec<VariableData>,
    pub(crate) functions: Vec<FunctionData>,
    pub(crate) constants: Vec<ConstantData>,
    pub(crate) aliases: Vec<AliasData>,
    pub(crate) structs: Vec<StructData>,
    pub(crate) shader_options: Vec<OptionData>,
    /// Statements to splice in front of the one being sanitized
    pub(crate) pending_statements: Vec<Statement>,
    pub(crate) current_function: Option<usize>,
    pub(crate) loop_depth: usize,
    module_stack: Vec<String>,
    module_cache: IndexMap<String, SanitizedImport>,
    exports: Vec<(String, Identifier)>,
    current_features: Vec<ModuleFeature>,
    name_counters: HashMap<String, usize>,
}

impl<'opts> Sanitizer<'opts> {
    fn new(options: &'opts SanitizeOptions) -> Self {
        Self {
            options,
            scopes: ScopeStack::new(),
            variables: Vec::new(),
            functions: Vec::new(),
            constants: Vec::new(),
            aliases: Vec::new(),
            structs: Vec::new(),
            shader_options: Vec::new(),
            pending_statements: Vec::new(),
            current_function: None,
            loop_depth: 0,
            module_stack: Vec::new(),
            module_cache: IndexMap::new(),
            exports: Vec::new(),
            current_features: Vec::new(),
            name_counters: HashMap::new(),
        }
    }

    pub(crate) fn options(&self) -> &SanitizeOptions {
        self.options
    }

    pub(crate) fn allow_partial(&self) -> bool {
        self.options.allow_partial_sanitization
    }

    /// Whether the module being sanitized opted into a feature flag.
    pub(crate) fn has_feature(&self, feature: ModuleFeature) -> bool {
        self.current_features.contains(&feature)
    }

    // ---------------------------------------------------------------------
    // module driver
    // ---------------------------------------------------------------------

    fn sanitize_module(&mut self, module: &Module) -> Result<Module> {
        // feature flags may only be specified once
        for (position, feature) in module.metadata.enabled_features.iter().enumerate() {
            if module.metadata.enabled_features[..position].contains(feature) {
                return Err(ErrorKind::ModuleFeatureMultipleUnique {
                    feature: feature.to_string(),
                }
                .at(module.root_node.source_location.clone()));
            }
        }

        self.module_stack.push(module.metadata.module_name.clone());
        self.current_features = module.metadata.enabled_features.clone();

        let previous_imports = std::mem::take(&mut self.exports);
        let mut imported_modules = Vec::new();

        let root_statements =
            self.sanitize_root(&module.root_node, &module.metadata, &mut imported_modules)?;

        let exports = std::mem::replace(&mut self.exports, previous_imports);
        self.module_stack.pop();

        let sanitized = Module {
            metadata: module.metadata.clone(),
            imported_modules,
            root_node: MultiStatement {
                statements: root_statements,
                source_location: module.root_node.source_location.clone(),
            },
        };

        // cache exports for parents that import this module
        if !self.module_stack.is_empty() {
            self.module_cache.insert(
                module.metadata.module_name.clone(),
                SanitizedImport {
                    module: Arc::new(sanitized.clone()),
                    exports,
                },
            );
        }

        Ok(sanitized)
    }

    /// Sanitize the module root: declarations register in order, function
    /// bodies are deferred until every root declaration is known so that
    /// functions can call functions declared after them.
    fn sanitize_root(
        &mut self,
        root: &MultiStatement,
        metadata: &ModuleMetadata,
        imported_modules: &mut Vec<ImportedModule>,
    ) -> Result<Vec<Statement>> {
        let mut out: Vec<Statement> = Vec::with_capacity(root.statements.len());
        let mut pending_bodies: Vec<(usize, &DeclareFunctionStatement, usize)> = Vec::new();

        for statement in &root.statements {
            match statement {
                Statement::DeclareFunction(func) => {
                    let func_index = self.register_function_signature(func)?;
                    pending_bodies.push((out.len(), func, func_index));
                    // placeholder, replaced once the body is sanitized
                    out.push(builder::no_op());
                }
                Statement::Import(import) => {
                    let replacement = self.link_import(import, metadata, imported_modules)?;
                    if !matches!(replacement, Statement::NoOp(_)) {
                        out.push(replacement);
                    }
                }
                other => {
                    let sanitized = self.clone_statement(other)?;
                    out.extend(self.pending_statements.drain(..));
                    if !matches!(sanitized, Statement::NoOp(_)) {
                        out.push(sanitized);
                    }
                }
            }
        }

        for (position, func, func_index) in pending_bodies {
            out[position] = self.sanitize_function_body(func, func_index)?;
        }

        // stage-dependency analysis runs once the whole call graph is known
        if self.module_stack.len() == 1 {
            self.check_stage_dependencies()?;
        }

        Ok(out)
    }

    // ---------------------------------------------------------------------
    // imports
    // ---------------------------------------------------------------------

    fn link_import(
        &mut self,
        import: &ImportStatement,
        metadata: &ModuleMetadata,
        imported_modules: &mut Vec<ImportedModule>,
    ) -> Result<Statement> {
        let location = &import.source_location;

        if self.module_stack.contains(&import.module_name) {
            return Err(ErrorKind::CircularImport {
                module: import.module_name.clone(),
            }
            .at(location.clone()));
        }

        // a single wildcard, never renamed
        let mut wildcard_seen = false;
        for identifier in &import.identifiers {
            if identifier.is_wildcard() {
                if wildcard_seen {
                    return Err(ErrorKind::ImportMultipleWildcard
                        .at(identifier.source_location.clone()));
                }
                if !identifier.rename.is_empty() {
                    return Err(
                        ErrorKind::ImportWildcardRename.at(identifier.source_location.clone())
                    );
                }
                wildcard_seen = true;
            }
        }

        // resolve and sanitize the imported module (once per name)
        if !self.module_cache.contains_key(&import.module_name) {
            let resolver = self.options.module_resolver.clone().ok_or_else(|| {
                ErrorKind::UnknownIdentifier {
                    identifier: import.module_name.clone(),
                }
                .at(location.clone())
            })?;
            let imported = resolver.resolve(&import.module_name).ok_or_else(|| {
                ErrorKind::UnknownIdentifier {
                    identifier: import.module_name.clone(),
                }
                .at(location.clone())
            })?;

            // imported modules must not require features the importer lacks
            for feature in &imported.metadata.enabled_features {
                if !metadata.enabled_features.contains(feature) {
                    return Err(ErrorKind::ModuleFeatureMismatch {
                        module: imported.metadata.module_name.clone(),
                        feature: feature.to_string(),
                    }
                    .at(location.clone()));
                }
            }

            let scopes = std::mem::replace(&mut self.scopes, ScopeStack::new());
            let features = std::mem::take(&mut self.current_features);
            let result = self.sanitize_module(&imported);
            self.scopes = scopes;
            self.current_features = features;
            result?;
        }

        let cached = &self.module_cache[&import.module_name];
        let child = cached.module.clone();
        let exports = cached.exports.clone();

        if !imported_modules
            .iter()
            .any(|m| m.identifier == import.module_name)
        {
            imported_modules.push(ImportedModule {
                identifier: import.module_name.clone(),
                module: child,
            });
        }

        // pick the names to install: explicit entries, wildcard = all
        let mut installed: Vec<(String, Identifier)> = Vec::new();
        let mut install = |name: String,
                           target: Identifier,
                           location: &SourceLocation,
                           installed: &mut Vec<(String, Identifier)>|
         -> Result<()> {
            if installed.iter().any(|(n, _)| *n == name) {
                return Err(ErrorKind::ImportIdentifierAlreadyPresent { identifier: name }
                    .at(location.clone()));
            }
            installed.push((name, target));
            Ok(())
        };

        if import.identifiers.is_empty() || wildcard_seen {
            for (name, target) in &exports {
                install(name.clone(), target.clone(), location, &mut installed)?;
            }
        }
        for entry in &import.identifiers {
            if entry.is_wildcard() {
                continue;
            }
            let target = exports
                .iter()
                .find(|(name, _)| *name == entry.identifier)
                .map(|(_, target)| target.clone())
                .ok_or_else(|| {
                    ErrorKind::UnknownIdentifier {
                        identifier: entry.identifier.clone(),
                    }
                    .at(entry.source_location.clone())
                })?;

            let local_name = if entry.rename.is_empty() {
                entry.identifier.clone()
            } else {
                entry.rename.clone()
            };
            install(local_name, target, &entry.source_location, &mut installed)?;
        }

        // install as alias declarations (or silently when aliases are
        // being removed anyway)
        let mut alias_statements = Vec::with_capacity(installed.len());
        for (name, target) in installed {
            trace!(name = %name, module = %import.module_name, "importing identifier");

            if self.options.remove_aliases {
                self.scopes.register(name, target);
                continue;
            }

            let (target_expr, target_type) = self.alias_target_expression(&target, location)?;
            let alias_index = self.aliases.len();
            self.aliases.push(AliasData {
                name: name.clone(),
                target: target.clone(),
                target_type,
            });
            self.scopes.register(name.clone(), Identifier::Alias(alias_index));

            alias_statements.push(Statement::DeclareAlias(DeclareAliasStatement {
                alias_index: Some(alias_index),
                name,
                expression: Box::new(target_expr),
                source_location: location.clone(),
            }));
        }

        if alias_statements.is_empty() {
            Ok(builder::no_op())
        } else {
            Ok(Statement::Multi(MultiStatement {
                statements: alias_statements,
                source_location: location.clone(),
            }))
        }
    }

    /// The expression an alias declaration points at for a given target.
    fn alias_target_expression(
        &self,
        target: &Identifier,
        location: &SourceLocation,
    ) -> Result<(Expression, ExpressionType)> {
        match target {
            Identifier::Function(func_index) => {
                let ty = ExpressionType::Function(nzsl_ast::types::FunctionType {
                    func_index: *func_index,
                });
                Ok((
                    Expression::Function(FunctionExpression {
                        func_id: *func_index,
                        cached_type: Some(ty.clone()),
                        source_location: location.clone(),
                    }),
                    ty,
                ))
            }
            Identifier::Struct(struct_index) => {
                let ty = ExpressionType::Type(Box::new(ExpressionType::Struct(StructType {
                    struct_index: *struct_index,
                })));
                Ok((
                    Expression::StructType(StructTypeExpression {
                        struct_type_id: *struct_index,
                        cached_type: Some(ty.clone()),
                        source_location: location.clone(),
                    }),
                    ty,
                ))
            }
            Identifier::Alias(alias_index) => {
                let ty = ExpressionType::Alias(nzsl_ast::types::AliasType {
                    alias_index: *alias_index,
                    target_type: Box::new(self.aliases[*alias_index].target_type.clone()),
                });
                Ok((
                    Expression::AliasValue(AliasValueExpression {
                        alias_id: *alias_index,
                        cached_type: Some(ty.clone()),
                        source_location: location.clone(),
                    }),
                    ty,
                ))
            }
            _ => Err(ErrorKind::ConstantExpressionRequired.at(location.clone())),
        }
    }

    // ---------------------------------------------------------------------
    // functions
    // ---------------------------------------------------------------------

    /// Register a function's signature without touching its body.
    fn register_function_signature(&mut self, func: &DeclareFunctionStatement) -> Result<usize> {
        let mut parameters = Vec::with_capacity(func.parameters.len());
        for parameter in &func.parameters {
            let ty = self.resolve_type_value(&parameter.param_type, &parameter.source_location)?;
            let ty = ty.ok_or_else(|| {
                ErrorKind::UnknownIdentifier {
                    identifier: parameter.name.clone(),
                }
                .at(parameter.source_location.clone())
            })?;
            parameters.push(ty);
        }

        let return_type = self
            .resolve_type_value(&func.return_type, &func.source_location)?
            .unwrap_or(ExpressionType::NoType);

        let entry_stage = match &func.entry_stage {
            ExpressionValue::Value(stage) => Some(*stage),
            _ => None,
        };

        // fragment-only attributes are rejected anywhere else
        if entry_stage != Some(ShaderStage::Fragment) {
            if func.depth_write.has_value() {
                return Err(ErrorKind::UnexpectedAttribute {
                    attribute: "depth_write".to_string(),
                }
                .at(func.source_location.clone()));
            }
            if func.early_fragment_tests.has_value() {
                return Err(ErrorKind::UnexpectedAttribute {
                    attribute: "early_fragment_tests".to_string(),
                }
                .at(func.source_location.clone()));
            }
        }

        if entry_stage.is_some() {
            self.validate_entry_signature(func, &parameters, &return_type)?;
        }

        let func_index = self.functions.len();
        trace!(name = %func.name, index = func_index, "registering function");
        self.functions.push(FunctionData {
            name: func.name.clone(),
            parameters,
            return_type,
            entry_stage,
            required_stage: None,
            called_functions: IndexSet::new(),
        });
        self.scopes
            .register(func.name.clone(), Identifier::Function(func_index));

        if matches!(func.is_exported, ExpressionValue::Value(true)) {
            self.exports
                .push((func.name.clone(), Identifier::Function(func_index)));
        }

        Ok(func_index)
    }

    /// Entry points take one struct parameter (or none) and return a struct
    /// (or nothing); their builtins must belong to the entry stage.
    fn validate_entry_signature(
        &self,
        func: &DeclareFunctionStatement,
        parameters: &[ExpressionType],
        return_type: &ExpressionType,
    ) -> Result<()> {
        let stage = match func.entry_stage.value() {
            Some(stage) => *stage,
            None => return Ok(()),
        };

        if parameters.len() > 1 {
            return Err(ErrorKind::EntryFunctionParameter.at(func.source_location.clone()));
        }

        if let Some(parameter) = parameters.first() {
            match resolve_alias(parameter) {
                ExpressionType::Struct(s) => {
                    self.validate_entry_struct(s.struct_index, stage, true)?
                }
                _ => {
                    return Err(ErrorKind::EntryFunctionParameter.at(func.source_location.clone()))
                }
            }
        }

        match resolve_alias(return_type) {
            ExpressionType::NoType => {}
            ExpressionType::Struct(s) => {
                self.validate_entry_struct(s.struct_index, stage, false)?
            }
            _ => return Err(ErrorKind::EntryFunctionParameter.at(func.source_location.clone())),
        }

        Ok(())
    }

    /// Check the builtins of an entry input/output struct against a stage.
    fn validate_entry_struct(
        &self,
        struct_index: usize,
        stage: ShaderStage,
        is_input: bool,
    ) -> Result<()> {
        let description = match self.structs.get(struct_index) {
            Some(data) => &data.description,
            None => return Ok(()), // partial sanitization
        };

        for member in &description.members {
            let builtin = match member.builtin.value() {
                Some(builtin) => *builtin,
                None => continue,
            };

            // (stage, input?) each builtin belongs to
            let (expected_stage, expected_input, expected_type) = match builtin {
                BuiltinEntry::VertexPosition => (
                    ShaderStage::Vertex,
                    false,
                    ExpressionType::Vector(nzsl_ast::types::VectorType {
                        component_count: 4,
                        component_type: nzsl_ast::types::PrimitiveType::Float32,
                    }),
                ),
                BuiltinEntry::FragCoord => (
                    ShaderStage::Fragment,
                    true,
                    ExpressionType::Vector(nzsl_ast::types::VectorType {
                        component_count: 4,
                        component_type: nzsl_ast::types::PrimitiveType::Float32,
                    }),
                ),
                BuiltinEntry::FragDepth => (
                    ShaderStage::Fragment,
                    false,
                    ExpressionType::Primitive(nzsl_ast::types::PrimitiveType::Float32),
                ),
            };

            if expected_stage != stage || expected_input != is_input {
                return Err(ErrorKind::BuiltinUnsupportedStage {
                    builtin: builtin.name().to_string(),
                    stage: stage.name().to_string(),
                }
                .at(member.source_location.clone()));
            }

            if let Some(member_type) = member.member_type.value() {
                if resolve_alias(member_type) != &expected_type {
                    return Err(ErrorKind::BuiltinUnexpectedType {
                        builtin: builtin.name().to_string(),
                        expected: expected_type.to_string(),
                        got: member_type.to_string(),
                    }
                    .at(member.source_location.clone()));
                }
            }
        }

        Ok(())
    }

    fn sanitize_function_body(
        &mut self,
        func: &DeclareFunctionStatement,
        func_index: usize,
    ) -> Result<Statement> {
        debug!(name = %func.name, "sanitizing function body");

        self.scopes.enter();
        let previous_function = self.current_function.replace(func_index);

        let mut parameters = Vec::with_capacity(func.parameters.len());
        for (parameter, ty) in func
            .parameters
            .iter()
            .zip(self.functions[func_index].parameters.clone())
        {
            let var_index = self.register_variable(&parameter.name, ty.clone());
            parameters.push(FunctionParameter {
                var_index: Some(var_index),
                name: self.variables[var_index].name.clone(),
                param_type: ExpressionValue::Value(ty),
                source_location: parameter.source_location.clone(),
            });
        }

        let statements = self.sanitize_statement_list(&func.statements)?;

        self.current_function = previous_function;
        self.scopes.leave();

        Ok(Statement::DeclareFunction(DeclareFunctionStatement {
            func_index: Some(func_index),
            name: func.name.clone(),
            parameters,
            statements,
            return_type: ExpressionValue::Value(self.functions[func_index].return_type.clone()),
            entry_stage: clone_expression_value(self, &func.entry_stage)?,
            depth_write: clone_expression_value(self, &func.depth_write)?,
            early_fragment_tests: clone_expression_value(self, &func.early_fragment_tests)?,
            is_exported: clone_expression_value(self, &func.is_exported)?,
            source_location: func.source_location.clone(),
        }))
    }

    /// Entry points may only reach functions whose stage restrictions match
    /// their own stage.
    fn check_stage_dependencies(&self) -> Result<()> {
        for entry in self.functions.iter().filter(|f| f.entry_stage.is_some()) {
            let stage = entry.entry_stage.expect("filtered on entry_stage");

            let mut visited = IndexSet::new();
            let mut stack: Vec<&FunctionData> = vec![entry];
            while let Some(function) = stack.pop() {
                if let Some((required, location)) = &function.required_stage {
                    if *required != stage {
                        return Err(ErrorKind::InvalidStageDependency {
                            requested: required.name().to_string(),
                            caller: stage.name().to_string(),
                        }
                        .at(location.clone()));
                    }
                }

                for callee in &function.called_functions {
                    if visited.insert(*callee) {
                        stack.push(&self.functions[*callee]);
                    }
                }
            }
        }

        Ok(())
    }

    /// Record a stage-restricted operation performed by the current
    /// function (e.g. `discard`).
    pub(crate) fn require_stage(&mut self, stage: ShaderStage, location: &SourceLocation) {
        if let Some(func_index) = self.current_function {
            let function = &mut self.functions[func_index];
            if function.required_stage.is_none() {
                function.required_stage = Some((stage, location.clone()));
            }
        }
    }

    // ---------------------------------------------------------------------
    // declarations and naming
    // ---------------------------------------------------------------------

    /// Register a variable, applying reserved-name and uniquing rules, and
    /// return its index.
    pub(crate) fn register_variable(&mut self, name: &str, ty: ExpressionType) -> usize {
        let unique_name = self.unique_name(name);

        let var_index = self.variables.len();
        trace!(name = %unique_name, index = var_index, "registering variable");
        self.variables.push(VariableData {
            name: unique_name.clone(),
            ty,
        });
        self.scopes
            .register(unique_name, Identifier::Variable(var_index));

        var_index
    }

    /// Resolve naming collisions: reserved identifiers are always renamed,
    /// shadowing names only when `make_variable_name_unique` is set.
    fn unique_name(&mut self, name: &str) -> String {
        let reserved = self.options.reserved_identifiers.contains(name);
        let shadows = self.options.make_variable_name_unique && self.scopes.is_known(name);
        if !reserved && !shadows {
            return name.to_string();
        }

        let counter = self.name_counters.entry(name.to_string()).or_insert(2);
        loop {
            let candidate = format!("{}_{}", name, counter);
            *counter += 1;
            if !self.scopes.is_known(&candidate)
                && !self.options.reserved_identifiers.contains(&candidate)
            {
                return candidate;
            }
        }
    }

    /// Sanitize a statement sequence, splicing statements generated by
    /// expression lowering in front of the statement that required them and
    /// dropping no-ops.
    pub(crate) fn sanitize_statement_list(&mut self, statements: &[Statement]) -> Result<Vec<Statement>> {
        let mut out = Vec::with_capacity(statements.len());
        for statement in statements {
            let sanitized = self.clone_statement(statement)?;
            out.extend(self.pending_statements.drain(..));
            if !matches!(sanitized, Statement::NoOp(_)) {
                out.push(sanitized);
            }
        }
        Ok(out)
    }

    /// Sanitize a loop or branch body in its own scope, normalizing it into
    /// a statement list so expression lowering has somewhere to put
    /// generated statements.
    pub(crate) fn sanitize_body(&mut self, body: &Statement) -> Result<Statement> {
        self.scopes.enter();
        let statements = match body {
            Statement::Multi(multi) => self.sanitize_statement_list(&multi.statements)?,
            Statement::Scoped(scoped) => {
                let inner = self.sanitize_body_statements(&scoped.statement)?;
                self.scopes.leave();
                return Ok(Statement::Scoped(ScopedStatement {
                    statement: Box::new(Statement::Multi(MultiStatement {
                        statements: inner,
                        source_location: scoped.source_location.clone(),
                    })),
                    source_location: scoped.source_location.clone(),
                }));
            }
            other => self.sanitize_statement_list(std::slice::from_ref(other))?,
        };
        self.scopes.leave();

        Ok(Statement::Multi(MultiStatement {
            statements,
            source_location: body.source_location().clone(),
        }))
    }

    fn sanitize_body_statements(&mut self, body: &Statement) -> Result<Vec<Statement>> {
        match body {
            Statement::Multi(multi) => self.sanitize_statement_list(&multi.statements),
            other => self.sanitize_statement_list(std::slice::from_ref(other)),
        }
    }
}
