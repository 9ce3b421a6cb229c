// The lowered type: semantic descriptor plus the LLVM type and runtime
// layout facts. `Type` values are cheap to clone; the code generator interns
// them per rendered name so repeated lookups share the same facts.

use inkwell::types::BasicTypeEnum;
use std::rc::Rc;

use vcl_ast::{TypeInfo, TypeKind};

#[derive(Debug, Clone)]
pub struct Type<'ctx> {
    pub info: Rc<TypeInfo>,
    /// `None` for `void`, callables and unlowered aggregates.
    pub llvm: Option<BasicTypeEnum<'ctx>>,
    pub size_bytes: u64,
    pub align_bytes: u64,
}

impl<'ctx> Type<'ctx> {
    pub fn new(info: TypeInfo, llvm: Option<BasicTypeEnum<'ctx>>) -> Self {
        Self {
            info: Rc::new(info),
            llvm,
            size_bytes: 0,
            align_bytes: 0,
        }
    }

    pub fn with_layout(mut self, size_bytes: u64, align_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self.align_bytes = align_bytes;
        self
    }

    pub fn kind(&self) -> TypeKind {
        self.info.kind
    }

    pub fn is_vector(&self) -> bool {
        self.info.is_vector()
    }

    pub fn is_void(&self) -> bool {
        self.info.kind == TypeKind::Void
    }

    /// The LLVM type, or an internal error for unlowerable kinds. Callers on
    /// value paths always deal with lowered types.
    pub fn llvm_type(&self) -> Result<BasicTypeEnum<'ctx>, crate::CompileError> {
        self.llvm.ok_or_else(|| {
            crate::CompileError::new(
                vcl_diagnostics::DiagnosticCode::TypeMismatch,
                format!("type `{}` has no runtime representation", self.info),
            )
        })
    }

    /// A copy of this type under different qualifiers.
    pub fn requalified(&self, qualifiers: vcl_ast::Qualifiers) -> Self {
        let mut info = (*self.info).clone();
        info.qualifiers = qualifiers;
        Self {
            info: Rc::new(info),
            llvm: self.llvm,
            size_bytes: self.size_bytes,
            align_bytes: self.align_bytes,
        }
    }
}

/// Type identity ignores qualifiers: `const int` and `int` are the same
/// type for casting and dispatch; constness is enforced at store sites.
impl<'ctx> PartialEq for Type<'ctx> {
    fn eq(&self, other: &Self) -> bool {
        self.info.kind == other.info.kind
            && self.info.name == other.info.name
            && self.info.template_args == other.info.template_args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcl_ast::Qualifiers;

    #[test]
    fn equality_ignores_qualifiers() {
        let plain = Type::new(TypeInfo::simple(TypeKind::Int), None);
        let constant = plain.requalified(Qualifiers {
            is_const: true,
            ..Default::default()
        });
        assert_eq!(plain, constant);

        let float = Type::new(TypeInfo::simple(TypeKind::Float), None);
        assert!(plain != float);
    }
}
