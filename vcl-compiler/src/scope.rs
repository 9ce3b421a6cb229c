// Lexical scope stack. A flat vector of frames: the bottom frame is the
// program scope; lookups walk from the innermost frame outward. Template
// instantiations are inserted at the frame where the template was declared
// so they outlive the call site.

use inkwell::basic_block::BasicBlock;
use std::collections::HashMap;
use std::rc::Rc;

use crate::intrinsics::IntrinsicId;
use crate::structs::{StructDefinition, StructTemplate};
use crate::templates::CallableTemplate;
use crate::value::{FunctionDecl, Value};
use vcl_ast::TypeInfo;

#[derive(Clone)]
pub enum Symbol<'ctx> {
    Value(Value<'ctx>),
    Function(Rc<FunctionDecl<'ctx>>),
    Intrinsic(IntrinsicId),
}

#[derive(Default)]
struct Frame<'ctx> {
    symbols: HashMap<String, Symbol<'ctx>>,
    structs: HashMap<String, Rc<StructDefinition<'ctx>>>,
    struct_templates: HashMap<String, Rc<StructTemplate>>,
    callable_templates: HashMap<String, Rc<CallableTemplate>>,
    aliases: HashMap<String, TypeInfo>,
    break_target: Option<BasicBlock<'ctx>>,
}

pub struct ScopeManager<'ctx> {
    frames: Vec<Frame<'ctx>>,
}

impl<'ctx> ScopeManager<'ctx> {
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn push_scope(&mut self, break_target: Option<BasicBlock<'ctx>>) {
        self.frames.push(Frame {
            break_target,
            ..Frame::default()
        });
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the program scope");
        self.frames.pop();
    }

    pub fn is_global(&self) -> bool {
        self.frames.len() == 1
    }

    // ---- symbols -------------------------------------------------------

    /// Insert at the current frame; `false` on collision there.
    pub fn insert_symbol(&mut self, name: impl Into<String>, symbol: Symbol<'ctx>) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.symbols.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(symbol);
                true
            }
        }
    }

    /// Insert at an outer frame, used by template instantiation.
    pub fn insert_symbol_at(
        &mut self,
        depth: usize,
        name: impl Into<String>,
        symbol: Symbol<'ctx>,
    ) {
        if let Some(frame) = self.frames.get_mut(depth) {
            frame.symbols.insert(name.into(), symbol);
        }
    }

    pub fn find_symbol(&self, name: &str) -> Option<&Symbol<'ctx>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.symbols.get(name))
    }

    // ---- struct definitions -------------------------------------------

    pub fn insert_struct(
        &mut self,
        name: impl Into<String>,
        def: Rc<StructDefinition<'ctx>>,
    ) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.structs.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(def);
                true
            }
        }
    }

    pub fn insert_struct_at(
        &mut self,
        depth: usize,
        name: impl Into<String>,
        def: Rc<StructDefinition<'ctx>>,
    ) {
        if let Some(frame) = self.frames.get_mut(depth) {
            frame.structs.insert(name.into(), def);
        }
    }

    pub fn find_struct(&self, name: &str) -> Option<Rc<StructDefinition<'ctx>>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.structs.get(name).cloned())
    }

    /// Reverse lookup from the lowered LLVM type, used by field access
    /// where only the value's type is at hand.
    pub fn find_struct_by_llvm(
        &self,
        llvm: inkwell::types::StructType<'ctx>,
    ) -> Option<Rc<StructDefinition<'ctx>>> {
        self.frames.iter().rev().find_map(|frame| {
            frame
                .structs
                .values()
                .find(|def| def.llvm == llvm)
                .cloned()
        })
    }

    // ---- templates -----------------------------------------------------

    pub fn insert_struct_template(
        &mut self,
        name: impl Into<String>,
        template: Rc<StructTemplate>,
    ) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.struct_templates.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(template);
                true
            }
        }
    }

    /// Returns the template and the depth of its declaring frame.
    pub fn find_struct_template(&self, name: &str) -> Option<(Rc<StructTemplate>, usize)> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            if let Some(template) = frame.struct_templates.get(name) {
                return Some((template.clone(), depth));
            }
        }
        None
    }

    pub fn insert_callable_template(
        &mut self,
        name: impl Into<String>,
        template: Rc<CallableTemplate>,
    ) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.callable_templates.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(template);
                true
            }
        }
    }

    pub fn find_callable_template(&self, name: &str) -> Option<(Rc<CallableTemplate>, usize)> {
        for (depth, frame) in self.frames.iter().enumerate().rev() {
            if let Some(template) = frame.callable_templates.get(name) {
                return Some((template.clone(), depth));
            }
        }
        None
    }

    // ---- type aliases --------------------------------------------------

    pub fn insert_alias(&mut self, name: impl Into<String>, info: TypeInfo) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        match frame.aliases.entry(name.into()) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(info);
                true
            }
        }
    }

    pub fn find_alias(&self, name: &str) -> Option<&TypeInfo> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.aliases.get(name))
    }

    // ---- control transfer ---------------------------------------------

    /// Nearest enclosing break target, if any.
    pub fn transfer_control_block(&self) -> Option<BasicBlock<'ctx>> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.break_target)
    }
}

impl<'ctx> Default for ScopeManager<'ctx> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use crate::value::{Value, ValueKind};
    use vcl_ast::{TypeInfo, TypeKind};

    fn dummy_value<'ctx>() -> Value<'ctx> {
        Value {
            kind: ValueKind::Unit,
            ty: Type::new(TypeInfo::simple(TypeKind::Void), None),
        }
    }

    #[test]
    fn shadowing_and_collision() {
        let mut scopes = ScopeManager::new();
        assert!(scopes.insert_symbol("x", Symbol::Value(dummy_value())));
        assert!(!scopes.insert_symbol("x", Symbol::Value(dummy_value())));

        scopes.push_scope(None);
        // shadowing in an inner frame is allowed
        assert!(scopes.insert_symbol("x", Symbol::Value(dummy_value())));
        scopes.pop_scope();

        assert!(scopes.find_symbol("x").is_some());
        assert!(scopes.find_symbol("y").is_none());
    }

    #[test]
    fn global_scope_detection() {
        let mut scopes = ScopeManager::new();
        assert!(scopes.is_global());
        scopes.push_scope(None);
        assert!(!scopes.is_global());
        scopes.pop_scope();
        assert!(scopes.is_global());
    }

    #[test]
    fn alias_lookup_walks_outward() {
        let mut scopes = ScopeManager::new();
        scopes.insert_alias("T", TypeInfo::simple(TypeKind::Float));
        scopes.push_scope(None);
        assert_eq!(
            scopes.find_alias("T").map(|t| t.kind),
            Some(TypeKind::Float)
        );
        scopes.pop_scope();
    }
}
