// User aggregate types: concrete struct definitions (field layout plus
// name-to-index lookup) and uninstantiated struct templates.

use inkwell::types::StructType;
use std::collections::HashMap;

use crate::types::Type;
use vcl_ast::{FieldDecl, TemplateParam};

pub struct StructDefinition<'ctx> {
    pub name: String,
    pub llvm: StructType<'ctx>,
    fields: Vec<(String, Type<'ctx>)>,
    index: HashMap<String, u32>,
}

impl<'ctx> StructDefinition<'ctx> {
    pub fn new(name: String, llvm: StructType<'ctx>, fields: Vec<(String, Type<'ctx>)>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, (field, _))| (field.clone(), i as u32))
            .collect();
        Self {
            name,
            llvm,
            fields,
            index,
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field_index(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn field_type(&self, index: u32) -> Option<&Type<'ctx>> {
        self.fields.get(index as usize).map(|(_, ty)| ty)
    }
}

/// The uninstantiated source of a generic struct. Instantiations are
/// memoised through the scope under their mangled names.
pub struct StructTemplate {
    pub name: String,
    pub params: Vec<TemplateParam>,
    pub fields: Vec<FieldDecl>,
}
