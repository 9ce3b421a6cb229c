// Type lowering: semantic descriptors become LLVM types on demand, with
// alias unfolding, qualifier checking, and struct-template
// monomorphisation. Results are memoised per rendered name so repeated
// requests share runtime layout facts.

use inkwell::types::{BasicType, BasicTypeEnum};

use super::CodeGen;
use crate::types::Type;
use crate::CompileError;
use vcl_ast::{TemplateArg, TypeInfo, TypeKind};
use vcl_diagnostics::DiagnosticCode;

impl<'ctx> CodeGen<'ctx> {
    /// Unfold type aliases, at the top level and through template-argument
    /// lists, so equal types always render equally.
    pub(crate) fn normalize_type_info(&self, info: &TypeInfo) -> TypeInfo {
        let mut resolved = info.clone();
        while resolved.kind == TypeKind::Custom {
            let Some(aliased) = self.scopes.find_alias(&resolved.name) else {
                break;
            };
            let qualifiers = resolved.qualifiers;
            resolved = aliased.clone();
            resolved.qualifiers.is_const |= qualifiers.is_const;
            resolved.qualifiers.is_in |= qualifiers.is_in;
            resolved.qualifiers.is_out |= qualifiers.is_out;
        }
        resolved.template_args = resolved
            .template_args
            .into_iter()
            .map(|arg| match arg {
                TemplateArg::Typename(inner) => {
                    TemplateArg::Typename(self.normalize_type_info(&inner))
                }
                arg => arg,
            })
            .collect();
        resolved
    }

    fn check_qualifiers(info: &TypeInfo) -> Result<(), CompileError> {
        if info.qualifiers.is_const && info.qualifiers.is_out {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("`{}`: `const` cannot be combined with `out`", info),
            ));
        }
        if info.qualifiers.is_in && info.qualifiers.is_out {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("`{}`: `in` cannot be combined with `out`", info),
            ));
        }
        Ok(())
    }

    pub(crate) fn create_type(&mut self, info: &TypeInfo) -> Result<Type<'ctx>, CompileError> {
        let info = self.normalize_type_info(info);
        Self::check_qualifiers(&info)?;

        let key = info.to_string();
        if let Some(cached) = self.type_cache.get(&key) {
            return Ok(cached.clone());
        }

        let created = self.lower_type(&info)?;
        self.type_cache.insert(key, created.clone());
        Ok(created)
    }

    fn lower_type(&mut self, info: &TypeInfo) -> Result<Type<'ctx>, CompileError> {
        let llvm: Option<BasicTypeEnum<'ctx>> = match info.kind {
            TypeKind::Float => self.prims.float.llvm,
            TypeKind::Int => self.prims.int.llvm,
            TypeKind::Bool => self.prims.bool_.llvm,
            TypeKind::VectorFloat => self.prims.vfloat.llvm,
            TypeKind::VectorBool => self.prims.vbool.llvm,
            TypeKind::VectorInt => self.prims.vint.llvm,
            TypeKind::Void => None,
            TypeKind::Array => Some(self.lower_array_type(info)?),
            TypeKind::Span => Some(self.lower_span_type(info)?),
            TypeKind::Custom => Some(self.lower_custom_type(info)?),
            TypeKind::Callable | TypeKind::Aggregate | TypeKind::None => {
                return Err(CompileError::new(
                    DiagnosticCode::TypeMismatch,
                    format!("type `{}` cannot be written in source", info),
                ))
            }
        };

        let mut ty = Type::new(info.clone(), llvm);
        if let Some(llvm) = llvm {
            ty = ty.with_layout(
                self.target_data.get_store_size(&llvm),
                self.target_data.get_abi_alignment(&llvm) as u64,
            );
        }
        Ok(ty)
    }

    /// `array<T, N>`: a contiguous N-element aggregate, N >= 0.
    fn lower_array_type(&mut self, info: &TypeInfo) -> Result<BasicTypeEnum<'ctx>, CompileError> {
        if info.template_args.len() != 2 {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "array type `{}` expects 2 template arguments but got {}",
                    info,
                    info.template_args.len()
                ),
            ));
        }
        let TemplateArg::Typename(element) = &info.template_args[0] else {
            return Err(CompileError::new(
                DiagnosticCode::TemplateArgKindMismatch,
                format!("array type `{}`: first template argument must be a typename", info),
            ));
        };
        let TemplateArg::Int(length) = info.template_args[1] else {
            return Err(CompileError::new(
                DiagnosticCode::TemplateArgKindMismatch,
                format!("array type `{}`: second template argument must be an int size", info),
            ));
        };
        if length < 0 {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("array type `{}` has a negative length", info),
            ));
        }
        let element_ty = self.create_type(element)?;
        Ok(element_ty.llvm_type()?.array_type(length as u32).into())
    }

    /// `span<T>`: an extern `{ T*, i32 }` view over host memory.
    fn lower_span_type(&mut self, info: &TypeInfo) -> Result<BasicTypeEnum<'ctx>, CompileError> {
        if !info.is_extern() {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("span type `{}` must be declared `in` or `out`", info),
            ));
        }
        if info.template_args.len() != 1 {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "span type `{}` expects 1 template argument but got {}",
                    info,
                    info.template_args.len()
                ),
            ));
        }
        let TemplateArg::Typename(element) = &info.template_args[0] else {
            return Err(CompileError::new(
                DiagnosticCode::TemplateArgKindMismatch,
                format!("span type `{}`: template argument must be a typename", info),
            ));
        };
        // The element type must lower even though the struct only stores a
        // pointer to it.
        let element_ty = self.create_type(element)?;
        let pointer = element_ty
            .llvm_type()?
            .ptr_type(inkwell::AddressSpace::default());
        let length = self.context.i32_type();
        Ok(self
            .context
            .struct_type(&[pointer.into(), length.into()], false)
            .into())
    }

    /// Named type: a defined struct, or a struct-template instantiation.
    fn lower_custom_type(&mut self, info: &TypeInfo) -> Result<BasicTypeEnum<'ctx>, CompileError> {
        if let Some((template, depth)) = self.scopes.find_struct_template(&info.name) {
            if info.template_args.is_empty() {
                return Err(CompileError::new(
                    DiagnosticCode::MissingTemplateArg,
                    format!("missing template arguments for generic type `{}`", info.name),
                ));
            }
            let def = self.resolve_struct_template(&template, depth, &info.template_args)?;
            return Ok(def.llvm.into());
        }

        if !info.template_args.is_empty() {
            return Err(CompileError::new(
                DiagnosticCode::UndefinedName,
                format!("`{}` is not a generic type", info.name),
            ));
        }

        match self.scopes.find_struct(&info.name) {
            Some(def) => Ok(def.llvm.into()),
            None => Err(CompileError::new(
                DiagnosticCode::UndefinedName,
                format!("undefined type `{}`", info.name),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodeGen;
    use inkwell::context::Context;

    #[test]
    fn created_types_are_memoised_and_share_layout() {
        let context = Context::create();
        let mut cg = CodeGen::new(&context, "types").expect("codegen");
        let info = TypeInfo::simple(TypeKind::Array).with_args(vec![
            TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
            TemplateArg::Int(8),
        ]);
        let first = cg.create_type(&info).expect("create");
        let second = cg.create_type(&info).expect("create again");
        assert_eq!(first, second);
        assert_eq!(first.size_bytes, 32);
        assert_eq!(first.size_bytes, second.size_bytes);
        assert_eq!(first.align_bytes, second.align_bytes);
    }

    #[test]
    fn aliases_unfold_before_lowering() {
        let context = Context::create();
        let mut cg = CodeGen::new(&context, "aliases").expect("codegen");
        cg.scopes
            .insert_alias("sample", TypeInfo::simple(TypeKind::Float));
        let ty = cg.create_type(&TypeInfo::custom("sample")).expect("create");
        assert_eq!(ty.kind(), TypeKind::Float);
    }

    #[test]
    fn vector_lanes_match_the_native_width() {
        let context = Context::create();
        let cg = CodeGen::new(&context, "vectors").expect("codegen");
        let lanes = crate::target::max_vector_element_width() as u64;
        assert_eq!(cg.prims.vfloat.size_bytes, lanes * 4);
        assert_eq!(cg.prims.vint.size_bytes, lanes * 4);
    }

    #[test]
    fn array_length_must_be_an_int() {
        let context = Context::create();
        let mut cg = CodeGen::new(&context, "badarray").expect("codegen");
        let info = TypeInfo::simple(TypeKind::Array).with_args(vec![
            TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
            TemplateArg::Typename(TypeInfo::simple(TypeKind::Int)),
        ]);
        let err = cg.create_type(&info).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::TemplateArgKindMismatch);
    }
}
