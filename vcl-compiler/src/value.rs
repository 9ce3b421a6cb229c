// Typed IR handles. A value is either an SSA scalar (r-value), a pointer to
// storage (l-value), a not-yet-lowered aggregate, or the unit result of a
// void call. Load/Store/Cast/Splat implement the language's value
// semantics; arithmetic dispatch lives with the emitter.

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};
use std::rc::Rc;

use crate::codegen::CodeGen;
use crate::types::Type;
use crate::CompileError;
use vcl_ast::TypeKind;
use vcl_diagnostics::DiagnosticCode;

/// A named function: the LLVM symbol plus its semantic signature.
pub struct FunctionDecl<'ctx> {
    pub fn_value: FunctionValue<'ctx>,
    pub return_type: Type<'ctx>,
    pub params: Vec<(String, Type<'ctx>)>,
}

#[derive(Clone)]
pub enum ValueKind<'ctx> {
    RValue(BasicValueEnum<'ctx>),
    LValue(PointerValue<'ctx>),
    Aggregate {
        elements: Rc<Vec<Value<'ctx>>>,
        all_const: bool,
    },
    /// Result of calling a `void` function.
    Unit,
}

#[derive(Clone)]
pub struct Value<'ctx> {
    pub kind: ValueKind<'ctx>,
    pub ty: Type<'ctx>,
}

impl<'ctx> Value<'ctx> {
    pub fn rvalue(value: BasicValueEnum<'ctx>, ty: Type<'ctx>) -> Self {
        Self {
            kind: ValueKind::RValue(value),
            ty,
        }
    }

    pub fn lvalue(ptr: PointerValue<'ctx>, ty: Type<'ctx>) -> Self {
        Self {
            kind: ValueKind::LValue(ptr),
            ty,
        }
    }

    pub fn aggregate(elements: Vec<Value<'ctx>>, ty: Type<'ctx>) -> Self {
        let all_const = elements.iter().all(Value::is_constant);
        Self {
            kind: ValueKind::Aggregate {
                elements: Rc::new(elements),
                all_const,
            },
            ty,
        }
    }

    pub fn has_storage(&self) -> bool {
        matches!(self.kind, ValueKind::LValue(_))
    }

    pub fn is_constant(&self) -> bool {
        match &self.kind {
            ValueKind::RValue(v) => match v {
                BasicValueEnum::IntValue(v) => v.is_const(),
                BasicValueEnum::FloatValue(v) => v.is_const(),
                BasicValueEnum::VectorValue(v) => v.is_const(),
                BasicValueEnum::ArrayValue(v) => v.is_const(),
                BasicValueEnum::StructValue(v) => v.is_const(),
                _ => false,
            },
            ValueKind::Aggregate { all_const, .. } => *all_const,
            _ => false,
        }
    }

    /// The raw SSA value; errors for storage-backed or aggregate values.
    pub fn basic_value(&self) -> Result<BasicValueEnum<'ctx>, CompileError> {
        match &self.kind {
            ValueKind::RValue(v) => Ok(*v),
            _ => Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("value of type `{}` is not a loaded scalar", self.ty.info),
            )),
        }
    }

    /// Dereference storage-backed values; SSA scalars and aggregates pass
    /// through unchanged.
    pub fn load(&self, cx: &CodeGen<'ctx>) -> Result<Value<'ctx>, CompileError> {
        match &self.kind {
            ValueKind::LValue(ptr) => {
                let loaded = cx.builder.build_load(*ptr, "load")?;
                Ok(Value::rvalue(loaded, self.ty.clone()))
            }
            ValueKind::RValue(_) | ValueKind::Aggregate { .. } => Ok(self.clone()),
            ValueKind::Unit => Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                "cannot use the result of a `void` call as a value",
            )),
        }
    }

    /// Store into this value. The target must be a storage-backed l-value
    /// and not `const`.
    pub fn store(&self, cx: &CodeGen<'ctx>, value: &Value<'ctx>) -> Result<(), CompileError> {
        let ValueKind::LValue(ptr) = &self.kind else {
            return Err(CompileError::new(
                DiagnosticCode::NotAnLValue,
                "left-hand side of assignment must be a variable or a memory location (l-value)",
            ));
        };
        if self.ty.info.is_const() {
            return Err(CompileError::new(
                DiagnosticCode::AssignToConst,
                format!("cannot assign to `{}`: it is const", self.ty.info),
            ));
        }
        cx.builder.build_store(*ptr, value.basic_value()?)?;
        Ok(())
    }

    /// Broadcast a scalar numeric to the machine vector width. Non-scalar
    /// values are returned unchanged.
    pub fn splat(&self, cx: &CodeGen<'ctx>) -> Result<Value<'ctx>, CompileError> {
        let vector_ty = match self.ty.kind() {
            TypeKind::Float => &cx.prims.vfloat,
            TypeKind::Int => &cx.prims.vint,
            TypeKind::Bool => &cx.prims.vbool,
            _ => return Ok(self.clone()),
        };
        let scalar = self.basic_value()?;
        let splatted = cx.build_splat(scalar, vector_ty)?;
        Ok(Value::rvalue(splatted.into(), vector_ty.clone()))
    }

    /// Total cast on the permitted source/target pairs: identity,
    /// float/int/bool IEEE conversions (elementwise on vectors),
    /// scalar-to-vector broadcast, aggregate lowering. Everything else is
    /// an error; pointer-typed values never cast through scalars.
    pub fn cast(&self, cx: &CodeGen<'ctx>, target: &Type<'ctx>) -> Result<Value<'ctx>, CompileError> {
        if let ValueKind::Aggregate { .. } = self.kind {
            return self.aggregate_cast(cx, target);
        }

        if self.ty == *target {
            return Ok(Value {
                kind: self.kind.clone(),
                ty: target.clone(),
            });
        }

        if self.has_storage() {
            return Err(CompileError::new(
                DiagnosticCode::UnsupportedCast,
                "cannot cast a storage reference; load it first",
            ));
        }

        let unsupported = || {
            CompileError::new(
                DiagnosticCode::UnsupportedCast,
                format!(
                    "cannot cast value of type `{}` to type `{}`: cast not supported",
                    self.ty.info, target.info
                ),
            )
        };

        let target_kind = target.kind();

        // Scalar to vector: convert the element, then broadcast.
        if !self.ty.is_vector() && target.is_vector() {
            let element = match target_kind {
                TypeKind::VectorFloat => &cx.prims.float,
                TypeKind::VectorInt => &cx.prims.int,
                TypeKind::VectorBool => &cx.prims.bool_,
                _ => return Err(unsupported()),
            };
            let converted = self.cast(cx, element)?;
            let splatted = converted.splat(cx)?;
            return Ok(Value {
                kind: splatted.kind,
                ty: target.clone(),
            });
        }

        if self.ty.is_vector() && !target.is_vector() {
            return Err(unsupported());
        }

        let value = self.basic_value()?;
        let converted = cx.build_numeric_conversion(
            value,
            self.ty.info.scalar_kind(),
            target.info.scalar_kind(),
            self.ty.is_vector(),
            target,
        )?;
        match converted {
            Some(v) => Ok(Value::rvalue(v, target.clone())),
            None => Err(unsupported()),
        }
    }

    /// Lower an aggregate to a constant array or struct. Dynamic aggregates
    /// are not supported.
    fn aggregate_cast(
        &self,
        cx: &CodeGen<'ctx>,
        target: &Type<'ctx>,
    ) -> Result<Value<'ctx>, CompileError> {
        let ValueKind::Aggregate {
            elements,
            all_const,
        } = &self.kind
        else {
            return Err(CompileError::new(
                DiagnosticCode::UnsupportedAggregate,
                "not an aggregate value",
            ));
        };

        if target.kind() != TypeKind::Array && target.kind() != TypeKind::Custom {
            return Err(CompileError::new(
                DiagnosticCode::UnsupportedAggregate,
                format!("cannot cast aggregate value to `{}`", target.info),
            ));
        }
        if !all_const {
            return Err(CompileError::new(
                DiagnosticCode::UnsupportedAggregate,
                "aggregate with non-constant elements is not supported",
            ));
        }

        let llvm = target.llvm_type()?;
        let lowered = match llvm {
            BasicTypeEnum::ArrayType(array_ty) => {
                let expected = array_ty.len() as usize;
                if elements.len() != expected {
                    return Err(CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        format!(
                            "aggregate has {} element(s) but `{}` expects {}",
                            elements.len(),
                            target.info,
                            expected
                        ),
                    ));
                }
                let element_ty = array_ty.get_element_type();
                let mut values = Vec::with_capacity(elements.len());
                for element in elements.iter() {
                    values.push(constant_element(cx, element, element_ty)?);
                }
                const_array(element_ty, &values)?
            }
            BasicTypeEnum::StructType(struct_ty) => {
                let expected = struct_ty.count_fields() as usize;
                if elements.len() != expected {
                    return Err(CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        format!(
                            "aggregate has {} element(s) but `{}` expects {}",
                            elements.len(),
                            target.info,
                            expected
                        ),
                    ));
                }
                let mut values = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    let field_ty = struct_ty
                        .get_field_type_at_index(i as u32)
                        .ok_or_else(|| {
                            CompileError::new(
                                DiagnosticCode::TypeMismatch,
                                "aggregate field index out of range",
                            )
                        })?;
                    values.push(constant_element(cx, element, field_ty)?);
                }
                struct_ty.const_named_struct(&values).into()
            }
            _ => {
                return Err(CompileError::new(
                    DiagnosticCode::UnsupportedAggregate,
                    format!("cannot cast aggregate value to `{}`", target.info),
                ))
            }
        };

        Ok(Value::rvalue(lowered, target.clone()))
    }
}

/// Convert one constant aggregate element (or standalone constant) to the
/// given LLVM type, folding int<->float conversions on the constant.
pub(crate) fn constant_element<'ctx>(
    cx: &CodeGen<'ctx>,
    element: &Value<'ctx>,
    target_llvm: BasicTypeEnum<'ctx>,
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    // Nested aggregates lower against the nested LLVM type.
    if let ValueKind::Aggregate { .. } = element.kind {
        let mut info = (*element.ty.info).clone();
        info.kind = match target_llvm {
            BasicTypeEnum::ArrayType(_) => TypeKind::Array,
            BasicTypeEnum::StructType(_) => TypeKind::Custom,
            _ => info.kind,
        };
        let nested = Type::new(info, Some(target_llvm));
        return element.aggregate_cast_entry(cx, &nested);
    }

    let value = element.basic_value()?;
    let mismatch = || {
        CompileError::new(
            DiagnosticCode::TypeMismatch,
            "aggregate element type does not match the target element type",
        )
    };

    match (value, target_llvm) {
        (BasicValueEnum::IntValue(v), BasicTypeEnum::IntType(ty)) => {
            if v.get_type() == ty {
                Ok(v.into())
            } else {
                Err(mismatch())
            }
        }
        (BasicValueEnum::FloatValue(v), BasicTypeEnum::FloatType(ty)) => {
            if v.get_type() == ty {
                Ok(v.into())
            } else {
                Err(mismatch())
            }
        }
        (BasicValueEnum::IntValue(v), BasicTypeEnum::FloatType(ty)) => {
            let constant = v.get_sign_extended_constant().ok_or_else(mismatch)?;
            Ok(ty.const_float(constant as f64).into())
        }
        (BasicValueEnum::FloatValue(v), BasicTypeEnum::IntType(ty)) => {
            let (constant, _) = v.get_constant().ok_or_else(mismatch)?;
            Ok(ty.const_int(constant as i64 as u64, true).into())
        }
        (BasicValueEnum::VectorValue(v), BasicTypeEnum::VectorType(ty)) => {
            if v.get_type() == ty {
                Ok(v.into())
            } else {
                Err(mismatch())
            }
        }
        _ => Err(mismatch()),
    }
}

impl<'ctx> Value<'ctx> {
    /// Public entry used when lowering nested aggregates.
    fn aggregate_cast_entry(
        &self,
        cx: &CodeGen<'ctx>,
        target: &Type<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, CompileError> {
        let lowered = self.aggregate_cast(cx, target)?;
        lowered.basic_value()
    }
}

fn const_array<'ctx>(
    element_ty: BasicTypeEnum<'ctx>,
    values: &[BasicValueEnum<'ctx>],
) -> Result<BasicValueEnum<'ctx>, CompileError> {
    let mismatch = || {
        CompileError::new(
            DiagnosticCode::TypeMismatch,
            "aggregate element type does not match the target element type",
        )
    };
    let array = match element_ty {
        BasicTypeEnum::IntType(ty) => {
            let items: Vec<_> = values
                .iter()
                .map(|v| v.into_int_value())
                .collect();
            ty.const_array(&items)
        }
        BasicTypeEnum::FloatType(ty) => {
            let items: Vec<_> = values
                .iter()
                .map(|v| v.into_float_value())
                .collect();
            ty.const_array(&items)
        }
        BasicTypeEnum::VectorType(ty) => {
            let items: Vec<_> = values
                .iter()
                .map(|v| v.into_vector_value())
                .collect();
            ty.const_array(&items)
        }
        BasicTypeEnum::ArrayType(ty) => {
            let items: Vec<_> = values
                .iter()
                .map(|v| v.into_array_value())
                .collect();
            ty.const_array(&items)
        }
        BasicTypeEnum::StructType(ty) => {
            let items: Vec<_> = values
                .iter()
                .map(|v| v.into_struct_value())
                .collect();
            ty.const_array(&items)
        }
        _ => return Err(mismatch()),
    };
    Ok(array.into())
}
