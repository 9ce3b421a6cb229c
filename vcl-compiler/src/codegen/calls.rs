// Call lowering: user functions (exact arity, casted arguments, pointers
// for by-reference parameters), callable-template instantiation with
// memoised resolves, and the intrinsic table.

use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue};
use std::rc::Rc;

use super::CodeGen;
use crate::intrinsics::{ArgPolicy, IntrinsicId};
use crate::scope::Symbol;
use crate::templates::TemplateArgumentMapper;
use crate::value::{FunctionDecl, Value, ValueKind};
use crate::CompileError;
use vcl_ast::{Expr, TemplateArg, TypeInfo, TypeKind};
use vcl_diagnostics::{DiagnosticCode, Span};

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn emit_call(
        &mut self,
        callee: &str,
        template_args: &[TemplateArg],
        args: &[Expr],
        span: Span,
    ) -> Result<Value<'ctx>, CompileError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push((self.emit_expression(arg)?, arg.span));
        }

        if let Some((template, depth)) = self.scopes.find_callable_template(callee) {
            let explicit: Vec<TemplateArg> = template_args
                .iter()
                .map(|arg| match arg {
                    TemplateArg::Typename(info) => {
                        TemplateArg::Typename(self.normalize_type_info(info))
                    }
                    arg => arg.clone(),
                })
                .collect();
            let actual: Vec<TypeInfo> = values
                .iter()
                .map(|(value, _)| self.normalize_type_info(&value.ty.info))
                .collect();

            let mut mapper = TemplateArgumentMapper::new(&template.name);
            mapper.map(&explicit, &template.template_params)?;
            let templated: Vec<TypeInfo> =
                template.params.iter().map(|(_, ty)| ty.clone()).collect();
            mapper.infer(&template.template_params, &templated, &actual)?;
            mapper.check(&template.template_params)?;

            let mangled = mapper.mangle(&template.template_params);
            let existing = match self.scopes.find_symbol(&mangled) {
                Some(Symbol::Function(decl)) => Some(decl.clone()),
                _ => None,
            };
            let decl = match existing {
                Some(decl) => decl,
                None => self.resolve_callable_template(&template, depth, &mapper, &mangled)?,
            };
            return self.emit_function_call(&decl, values, span);
        }

        if !template_args.is_empty() {
            return Err(CompileError::new(
                DiagnosticCode::NotCallable,
                format!("`{}` does not take template arguments", callee),
            ));
        }

        let symbol = self.scopes.find_symbol(callee).cloned();
        match symbol {
            None => Err(CompileError::new(
                DiagnosticCode::UndefinedName,
                format!("undefined name `{}`", callee),
            )),
            Some(Symbol::Value(_)) => Err(CompileError::new(
                DiagnosticCode::NotCallable,
                format!("`{}` isn't callable", callee),
            )),
            Some(Symbol::Function(decl)) => self.emit_function_call(&decl, values, span),
            Some(Symbol::Intrinsic(id)) => self.emit_intrinsic_call(id, values, span),
        }
    }

    // ---- user functions ------------------------------------------------

    pub(crate) fn emit_function_call(
        &mut self,
        decl: &Rc<FunctionDecl<'ctx>>,
        values: Vec<(Value<'ctx>, Span)>,
        span: Span,
    ) -> Result<Value<'ctx>, CompileError> {
        let name = decl.fn_value.get_name().to_string_lossy().into_owned();
        if values.len() != decl.params.len() {
            return Err(CompileError::new(
                DiagnosticCode::WrongArgCount,
                format!(
                    "`{}` called with {} argument(s), expecting {}",
                    name,
                    values.len(),
                    decl.params.len()
                ),
            )
            .with_span(span));
        }

        let mut call_args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(values.len());
        for ((value, value_span), (param_name, param_ty)) in
            values.into_iter().zip(&decl.params)
        {
            if param_ty.info.is_given_by_reference() {
                let ValueKind::LValue(ptr) = value.kind else {
                    return Err(CompileError::new(
                        DiagnosticCode::WrongArgType,
                        format!(
                            "parameter `{}` of `{}` is taken by reference and needs addressable storage",
                            param_name, name
                        ),
                    )
                    .with_span(value_span));
                };
                if value.ty != *param_ty {
                    return Err(CompileError::new(
                        DiagnosticCode::WrongArgType,
                        format!(
                            "parameter `{}` of `{}` expects `{}` but the argument is `{}`",
                            param_name, name, param_ty.info, value.ty.info
                        ),
                    )
                    .with_span(value_span));
                }
                call_args.push(ptr.into());
            } else {
                let casted = value
                    .load(self)?
                    .cast(self, param_ty)
                    .map_err(|e| Self::attach_span(e, value_span))?;
                call_args.push(casted.basic_value()?.into());
            }
        }

        let call = self.builder.build_call(decl.fn_value, &call_args, "")?;
        Ok(match call.try_as_basic_value().basic() {
            Some(result) => Value::rvalue(result, decl.return_type.clone()),
            None => Value {
                kind: ValueKind::Unit,
                ty: self.prims.void.clone(),
            },
        })
    }

    // ---- intrinsics ----------------------------------------------------

    fn emit_intrinsic_call(
        &mut self,
        id: IntrinsicId,
        values: Vec<(Value<'ctx>, Span)>,
        span: Span,
    ) -> Result<Value<'ctx>, CompileError> {
        if values.len() != id.arg_count() {
            return Err(CompileError::new(
                DiagnosticCode::WrongArgCount,
                format!(
                    "`{}` called with {} argument(s), expecting {}",
                    id.name(),
                    values.len(),
                    id.arg_count()
                ),
            )
            .with_span(span));
        }

        for (index, (value, value_span)) in values.iter().enumerate() {
            let policy = id.arg_policy(index);
            if policy != ArgPolicy::NONE && !policy.allows(&value.ty.info) {
                return Err(CompileError::new(
                    DiagnosticCode::WrongArgType,
                    format!(
                        "argument {} of `{}` has unsupported type `{}`",
                        index + 1,
                        id.name(),
                        value.ty.info
                    ),
                )
                .with_span(*value_span));
            }
        }

        // By-reference positions keep their storage; everything else loads.
        let mut args = Vec::with_capacity(values.len());
        for (index, (value, value_span)) in values.into_iter().enumerate() {
            if id.is_arg_by_reference(index) {
                args.push((value, value_span));
            } else {
                args.push((value.load(self)?, value_span));
            }
        }

        match id {
            IntrinsicId::Step => self.emit_step(),
            IntrinsicId::Len => self.emit_len(&args[0].0),
            IntrinsicId::Extract => self.emit_extract(&args[0].0, &args[1].0),
            IntrinsicId::Insert => self.emit_insert(&args[0].0, &args[1].0, &args[2].0),
            IntrinsicId::Select => self.emit_select(&args[0].0, &args[1].0, &args[2].0),
            IntrinsicId::Fmod => self.emit_fmod(&args[0].0, &args[1].0),
            IntrinsicId::Reverse => self.emit_reverse(&args[0].0),
            _ => self.emit_llvm_intrinsic(id, &args),
        }
    }

    /// Table-driven lowering through the matching LLVM intrinsic. All
    /// arguments are cast to the first argument's type, which also selects
    /// the overload.
    fn emit_llvm_intrinsic(
        &mut self,
        id: IntrinsicId,
        args: &[(Value<'ctx>, Span)],
    ) -> Result<Value<'ctx>, CompileError> {
        let internal = |msg: String| CompileError::new(DiagnosticCode::TypeMismatch, msg);

        let llvm_name = id
            .llvm_name()
            .ok_or_else(|| internal(format!("`{}` has no LLVM lowering", id.name())))?;
        let intrinsic = inkwell::intrinsics::Intrinsic::find(llvm_name)
            .ok_or_else(|| internal(format!("unknown LLVM intrinsic `{}`", llvm_name)))?;

        let target_ty = args[0].0.ty.clone();
        let overload = target_ty.llvm_type()?;
        let declaration = intrinsic
            .get_declaration(&self.module, &[overload])
            .ok_or_else(|| internal(format!("no declaration for `{}`", llvm_name)))?;

        let mut call_args: Vec<BasicMetadataValueEnum> = Vec::with_capacity(args.len());
        for (value, value_span) in args {
            let casted = value
                .cast(self, &target_ty)
                .map_err(|e| Self::attach_span(e, *value_span))?;
            call_args.push(casted.basic_value()?.into());
        }

        let call = self.builder.build_call(declaration, &call_args, "")?;
        let result = call
            .try_as_basic_value()
            .basic()
            .ok_or_else(|| internal(format!("`{}` returned no value", llvm_name)))?;
        Ok(Value::rvalue(result, target_ty))
    }

    /// `step()`: the constant vector `<0, 1, …, lanes-1>`.
    fn emit_step(&mut self) -> Result<Value<'ctx>, CompileError> {
        let items: Vec<IntValue> = (0..self.prims.lanes)
            .map(|i| self.context.i32_type().const_int(i as u64, false))
            .collect();
        let vector = inkwell::types::VectorType::const_vector(&items);
        Ok(Value::rvalue(vector.into(), self.prims.vint.clone()))
    }

    /// `len(x)`: array length and vector lane count fold to constants; a
    /// span reads its length field.
    fn emit_len(&mut self, value: &Value<'ctx>) -> Result<Value<'ctx>, CompileError> {
        match value.ty.kind() {
            TypeKind::Array => {
                let length = match value.ty.info.template_args.get(1) {
                    Some(TemplateArg::Int(length)) => *length,
                    _ => {
                        return Err(CompileError::new(
                            DiagnosticCode::TypeMismatch,
                            format!("array type `{}` has no length", value.ty.info),
                        ))
                    }
                };
                Ok(Value::rvalue(
                    self.context
                        .i32_type()
                        .const_int(length as i64 as u64, true)
                        .into(),
                    self.prims.int.clone(),
                ))
            }
            TypeKind::Span => {
                let loaded = value.basic_value()?.into_struct_value();
                let length = self.builder.build_extract_value(loaded, 1, "len")?;
                Ok(Value::rvalue(length, self.prims.int.clone()))
            }
            _ if value.ty.is_vector() => Ok(Value::rvalue(
                self.context
                    .i32_type()
                    .const_int(self.prims.lanes as u64, false)
                    .into(),
                self.prims.int.clone(),
            )),
            _ => Err(CompileError::new(
                DiagnosticCode::WrongArgType,
                format!("cannot take the length of `{}`", value.ty.info),
            )),
        }
    }

    fn emit_extract(
        &mut self,
        vector: &Value<'ctx>,
        index: &Value<'ctx>,
    ) -> Result<Value<'ctx>, CompileError> {
        let int_ty = self.prims.int.clone();
        let index = index.cast(self, &int_ty)?;
        let element = self.builder.build_extract_element(
            vector.basic_value()?.into_vector_value(),
            index.basic_value()?.into_int_value(),
            "extract",
        )?;
        let element_ty = self.scalar_of(vector.ty.info.scalar_kind());
        Ok(Value::rvalue(element, element_ty))
    }

    /// `insert(v, i, x)` writes lane `i` of the vector l-value `v`.
    fn emit_insert(
        &mut self,
        place: &Value<'ctx>,
        index: &Value<'ctx>,
        element: &Value<'ctx>,
    ) -> Result<Value<'ctx>, CompileError> {
        if !place.has_storage() {
            return Err(CompileError::new(
                DiagnosticCode::NotAnLValue,
                "`insert` requires a vector l-value as its first argument",
            ));
        }

        let int_ty = self.prims.int.clone();
        let index = index.cast(self, &int_ty)?;
        let scalar_ty = self.scalar_of(place.ty.info.scalar_kind());
        let element = element.load(self)?.cast(self, &scalar_ty)?;

        let loaded = place.load(self)?;
        let inserted = self.builder.build_insert_element(
            loaded.basic_value()?.into_vector_value(),
            element.basic_value()?,
            index.basic_value()?.into_int_value(),
            "insert",
        )?;
        place.store(self, &Value::rvalue(inserted.into(), place.ty.clone()))?;
        Ok(place.clone())
    }

    /// `select(c, a, b)` evaluates both arms unconditionally. A `bool`
    /// condition selects scalars; a `vbool` condition blends lanes, with
    /// scalar arms broadcast first.
    fn emit_select(
        &mut self,
        condition: &Value<'ctx>,
        then_value: &Value<'ctx>,
        else_value: &Value<'ctx>,
    ) -> Result<Value<'ctx>, CompileError> {
        let result = if condition.ty.kind() == TypeKind::Bool {
            let else_value = else_value.cast(self, &then_value.ty)?;
            let selected = self.builder.build_select(
                condition.basic_value()?.into_int_value(),
                then_value.basic_value()?,
                else_value.basic_value()?,
                "select",
            )?;
            Value::rvalue(selected, then_value.ty.clone())
        } else {
            let then_value = then_value.splat(self)?;
            let else_value = else_value.cast(self, &then_value.ty)?;
            let selected = self.builder.build_select(
                condition.basic_value()?.into_vector_value(),
                then_value.basic_value()?,
                else_value.basic_value()?,
                "select",
            )?;
            Value::rvalue(selected, then_value.ty.clone())
        };
        Ok(result)
    }

    fn emit_fmod(
        &mut self,
        lhs: &Value<'ctx>,
        rhs: &Value<'ctx>,
    ) -> Result<Value<'ctx>, CompileError> {
        let rhs = rhs.cast(self, &lhs.ty)?;
        let result: BasicValueEnum = if lhs.ty.is_vector() {
            self.builder
                .build_float_rem(
                    lhs.basic_value()?.into_vector_value(),
                    rhs.basic_value()?.into_vector_value(),
                    "fmod",
                )?
                .into()
        } else {
            self.builder
                .build_float_rem(
                    lhs.basic_value()?.into_float_value(),
                    rhs.basic_value()?.into_float_value(),
                    "fmod",
                )?
                .into()
        };
        Ok(Value::rvalue(result, lhs.ty.clone()))
    }

    /// Lane reversal through a constant shuffle mask.
    fn emit_reverse(&mut self, vector: &Value<'ctx>) -> Result<Value<'ctx>, CompileError> {
        let source = vector.basic_value()?.into_vector_value();
        let undef = source.get_type().get_undef();
        let mask_items: Vec<IntValue> = (0..self.prims.lanes)
            .rev()
            .map(|i| self.context.i32_type().const_int(i as u64, false))
            .collect();
        let mask = inkwell::types::VectorType::const_vector(&mask_items);
        let reversed = self
            .builder
            .build_shuffle_vector(source, undef, mask, "reverse")?;
        Ok(Value::rvalue(reversed.into(), vector.ty.clone()))
    }

    fn scalar_of(&self, kind: TypeKind) -> crate::types::Type<'ctx> {
        match kind {
            TypeKind::Float => self.prims.float.clone(),
            TypeKind::Bool => self.prims.bool_.clone(),
            _ => self.prims.int.clone(),
        }
    }
}
