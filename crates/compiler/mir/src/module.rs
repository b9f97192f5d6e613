//! # MIR Module
//!
//! This module defines the top-level container for MIR: every function lowered in
//! one `generate_mir` call.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;

use crate::{indent_str, FunctionId, MirFunction, PrettyPrint};

/// The MIR for a set of lowered functions
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MirModule {
    /// All functions in this module, indexed by `FunctionId`
    pub functions: IndexVec<FunctionId, MirFunction>,

    /// Mapping from function names to their IDs for lookup
    pub function_names: FxHashMap<String, FunctionId>,
}

impl MirModule {
    /// Creates a new empty MIR module
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function to the module and returns its ID
    pub fn add_function(&mut self, function: MirFunction) -> FunctionId {
        let name = function.name.clone();
        let function_id = self.functions.push(function);
        self.function_names.insert(name, function_id);
        function_id
    }

    /// Gets a function by ID
    pub fn get_function(&self, id: FunctionId) -> Option<&MirFunction> {
        self.functions.get(id)
    }

    /// Looks up a function by name
    pub fn lookup_function(&self, name: &str) -> Option<FunctionId> {
        self.function_names.get(name).copied()
    }

    /// Gets a function by name
    pub fn function_named(&self, name: &str) -> Option<&MirFunction> {
        self.lookup_function(name)
            .and_then(|id| self.get_function(id))
    }

    /// Returns an iterator over all functions
    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &MirFunction)> {
        self.functions.iter_enumerated()
    }

    /// Returns the number of functions in this module
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Validates the module structure
    pub fn validate(&self) -> Result<(), String> {
        for (name, &func_id) in &self.function_names {
            let function = self.functions.get(func_id).ok_or_else(|| {
                format!("Function name map references invalid function ID: {func_id:?}")
            })?;
            if function.name != *name {
                return Err(format!(
                    "Function name mismatch: map has '{}', function has '{}'",
                    name, function.name
                ));
            }
        }
        if self.function_names.len() != self.functions.len() {
            return Err("Duplicate function names".to_string());
        }

        for (_, function) in self.functions() {
            function
                .validate()
                .map_err(|err| format!("Function {} validation failed: {err}", function.name))?;
        }
        Ok(())
    }
}

impl PrettyPrint for MirModule {
    fn pretty_print(&self, indent: usize) -> String {
        let mut result = String::new();
        let base_indent = indent_str(indent);

        result.push_str(&format!("{base_indent}module {{\n"));
        for (_, function) in self.functions() {
            result.push_str(&function.pretty_print(indent + 1));
            result.push('\n');
        }
        result.push_str(&format!("{base_indent}}}\n"));
        result
    }
}
