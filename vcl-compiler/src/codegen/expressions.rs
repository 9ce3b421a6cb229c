// Expression lowering. Every rule loads operands first, applies the
// implicit cast policy, then dispatches on the element class: IEEE ops for
// float kinds, signed arithmetic and unsigned comparisons for int kinds.

use inkwell::values::BasicValueEnum;
use inkwell::{FloatPredicate, IntPredicate};

use super::CodeGen;
use crate::intrinsics::ArgPolicy;
use crate::scope::Symbol;
use crate::value::{Value, ValueKind};
use crate::CompileError;
use vcl_ast::{BinaryOp, Expr, ExprKind, PostfixOp, PrefixOp, TypeKind};
use vcl_diagnostics::{DiagnosticCode, Span};

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn emit_expression(&mut self, expr: &Expr) -> Result<Value<'ctx>, CompileError> {
        self.emit_expression_kind(expr)
            .map_err(|e| Self::attach_span(e, expr.span))
    }

    fn emit_expression_kind(&mut self, expr: &Expr) -> Result<Value<'ctx>, CompileError> {
        match &expr.kind {
            ExprKind::IntLiteral(value) => Ok(Value::rvalue(
                self.context
                    .i32_type()
                    .const_int(*value as i64 as u64, true)
                    .into(),
                self.prims.int.clone(),
            )),
            ExprKind::FloatLiteral(value) => Ok(Value::rvalue(
                self.context.f32_type().const_float(*value as f64).into(),
                self.prims.float.clone(),
            )),
            ExprKind::Identifier(name) => match self.scopes.find_symbol(name) {
                Some(Symbol::Value(value)) => Ok(value.clone()),
                Some(_) => Err(CompileError::new(
                    DiagnosticCode::TypeMismatch,
                    format!("`{}` is a function and can only be called", name),
                )),
                None => Err(CompileError::new(
                    DiagnosticCode::UndefinedName,
                    format!("undefined name `{}`", name),
                )),
            },
            ExprKind::Binary { op, lhs, rhs } => {
                if op.is_arithmetic() {
                    self.emit_arithmetic(*op, lhs, rhs, expr.span)
                } else if op.is_comparison() {
                    self.emit_comparison(*op, lhs, rhs, expr.span)
                } else {
                    self.emit_logical(*op, lhs, rhs)
                }
            }
            ExprKind::Assignment { lhs, rhs } => self.emit_assignment(lhs, rhs),
            ExprKind::Prefix { op, expr: operand } => self.emit_prefix(*op, operand),
            ExprKind::Postfix { op, expr: operand } => self.emit_postfix(*op, operand),
            ExprKind::FieldAccess { base, field } => self.emit_field_access(base, field),
            ExprKind::Subscript { base, index } => self.emit_subscript(base, index),
            ExprKind::Call {
                callee,
                template_args,
                args,
            } => self.emit_call(callee, template_args, args, expr.span),
            ExprKind::Aggregate(values) => self.emit_aggregate(values),
        }
    }

    // ---- binary --------------------------------------------------------

    fn emit_arithmetic(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Value<'ctx>, CompileError> {
        let left = self.emit_expression(lhs)?.load(self)?;
        let right = self.emit_expression(rhs)?.load(self)?;

        let policy = ArgPolicy::NUMERIC | ArgPolicy::VECTOR;
        if !policy.allows(&left.ty.info) || !policy.allows(&right.ty.info) {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "invalid operands to arithmetic operator `{}`: left operand is `{}`, right operand is `{}`",
                    op, left.ty.info, right.ty.info
                ),
            ));
        }

        let (left, right) = self.implicit_arithmetic_cast(left, right, span)?;
        let result = self.numeric_binop(op, &left, &right)?;
        Ok(Value::rvalue(result, left.ty.clone()))
    }

    fn emit_comparison(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Value<'ctx>, CompileError> {
        let left = self.emit_expression(lhs)?.load(self)?;
        let right = self.emit_expression(rhs)?.load(self)?;
        let (left, right) = self.implicit_arithmetic_cast(left, right, span)?;

        let vector = left.ty.is_vector();
        let name = op.symbol();
        let result: BasicValueEnum = match left.ty.info.scalar_kind() {
            TypeKind::Float => {
                let predicate = match op {
                    BinaryOp::Gt => FloatPredicate::OGT,
                    BinaryOp::Lt => FloatPredicate::OLT,
                    BinaryOp::Ge => FloatPredicate::OGE,
                    BinaryOp::Le => FloatPredicate::OLE,
                    BinaryOp::Eq => FloatPredicate::OEQ,
                    _ => FloatPredicate::ONE,
                };
                if vector {
                    self.builder
                        .build_float_compare(
                            predicate,
                            left.basic_value()?.into_vector_value(),
                            right.basic_value()?.into_vector_value(),
                            name,
                        )?
                        .into()
                } else {
                    self.builder
                        .build_float_compare(
                            predicate,
                            left.basic_value()?.into_float_value(),
                            right.basic_value()?.into_float_value(),
                            name,
                        )?
                        .into()
                }
            }
            TypeKind::Int | TypeKind::Bool => {
                let predicate = match op {
                    BinaryOp::Gt => IntPredicate::UGT,
                    BinaryOp::Lt => IntPredicate::ULT,
                    BinaryOp::Ge => IntPredicate::UGE,
                    BinaryOp::Le => IntPredicate::ULE,
                    BinaryOp::Eq => IntPredicate::EQ,
                    _ => IntPredicate::NE,
                };
                if vector {
                    self.builder
                        .build_int_compare(
                            predicate,
                            left.basic_value()?.into_vector_value(),
                            right.basic_value()?.into_vector_value(),
                            name,
                        )?
                        .into()
                } else {
                    self.builder
                        .build_int_compare(
                            predicate,
                            left.basic_value()?.into_int_value(),
                            right.basic_value()?.into_int_value(),
                            name,
                        )?
                        .into()
                }
            }
            _ => {
                return Err(CompileError::new(
                    DiagnosticCode::TypeMismatch,
                    format!(
                        "invalid operands to comparison operator `{}`: `{}` and `{}`",
                        op, left.ty.info, right.ty.info
                    ),
                ))
            }
        };

        let ty = if vector {
            self.prims.vbool.clone()
        } else {
            self.prims.bool_.clone()
        };
        Ok(Value::rvalue(result, ty))
    }

    fn emit_logical(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> Result<Value<'ctx>, CompileError> {
        let left = self.emit_expression(lhs)?.load(self)?;
        let right = self.emit_expression(rhs)?.load(self)?;

        let policy = ArgPolicy::CONDITION | ArgPolicy::MASK;
        if !policy.allows(&left.ty.info) || !policy.allows(&right.ty.info) {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "logical operator `{}` requires `bool` or `vbool` operands, but got `{}` and `{}`",
                    op, left.ty.info, right.ty.info
                ),
            ));
        }

        let right = right.cast(self, &left.ty)?;
        let vector = left.ty.is_vector();
        let result: BasicValueEnum = if vector {
            let l = left.basic_value()?.into_vector_value();
            let r = right.basic_value()?.into_vector_value();
            match op {
                BinaryOp::And => self.builder.build_and(l, r, "and")?.into(),
                _ => self.builder.build_or(l, r, "or")?.into(),
            }
        } else {
            let l = left.basic_value()?.into_int_value();
            let r = right.basic_value()?.into_int_value();
            match op {
                BinaryOp::And => self.builder.build_and(l, r, "and")?.into(),
                _ => self.builder.build_or(l, r, "or")?.into(),
            }
        };
        Ok(Value::rvalue(result, left.ty.clone()))
    }

    /// Pair two numeric operands under the implicit cast rule: the scalar
    /// side follows a vector side; among equal vectorness values promote
    /// toward float. Narrowing float to an integral type implicitly is a
    /// precision-loss error.
    pub(crate) fn implicit_arithmetic_cast(
        &mut self,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        span: Span,
    ) -> Result<(Value<'ctx>, Value<'ctx>), CompileError> {
        if lhs.ty == rhs.ty {
            return Ok((lhs, rhs));
        }

        let lhs_vector = lhs.ty.is_vector();
        let rhs_vector = rhs.ty.is_vector();
        let cast_lhs = if lhs_vector != rhs_vector {
            // The scalar side is broadcast toward the vector side.
            !lhs_vector
        } else {
            lhs.ty.info.scalar_kind() != TypeKind::Float
                && rhs.ty.info.scalar_kind() == TypeKind::Float
        };

        let (target, casted) = if cast_lhs {
            (rhs.ty.clone(), &lhs)
        } else {
            (lhs.ty.clone(), &rhs)
        };

        if casted.ty.info.scalar_kind() == TypeKind::Float
            && target.info.scalar_kind() != TypeKind::Float
        {
            return Err(CompileError::new(
                DiagnosticCode::ImplicitPrecisionLoss,
                format!(
                    "implicit conversion from `{}` to `{}` may lose precision",
                    casted.ty.info, target.info
                ),
            )
            .with_span(span));
        }

        let converted = casted.cast(self, &target)?;
        if cast_lhs {
            Ok((converted, rhs))
        } else {
            Ok((lhs, converted))
        }
    }

    /// Arithmetic dispatch on operands that already share a type.
    pub(crate) fn numeric_binop(
        &self,
        op: BinaryOp,
        lhs: &Value<'ctx>,
        rhs: &Value<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, CompileError> {
        let vector = lhs.ty.is_vector();
        let name = op.symbol();
        match lhs.ty.info.scalar_kind() {
            TypeKind::Float => {
                if op == BinaryOp::Rem {
                    return Err(CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        "`%` requires integer operands; use `fmod` for floats",
                    ));
                }
                if vector {
                    let l = lhs.basic_value()?.into_vector_value();
                    let r = rhs.basic_value()?.into_vector_value();
                    Ok(match op {
                        BinaryOp::Add => self.builder.build_float_add(l, r, name)?.into(),
                        BinaryOp::Sub => self.builder.build_float_sub(l, r, name)?.into(),
                        BinaryOp::Mul => self.builder.build_float_mul(l, r, name)?.into(),
                        _ => self.builder.build_float_div(l, r, name)?.into(),
                    })
                } else {
                    let l = lhs.basic_value()?.into_float_value();
                    let r = rhs.basic_value()?.into_float_value();
                    Ok(match op {
                        BinaryOp::Add => self.builder.build_float_add(l, r, name)?.into(),
                        BinaryOp::Sub => self.builder.build_float_sub(l, r, name)?.into(),
                        BinaryOp::Mul => self.builder.build_float_mul(l, r, name)?.into(),
                        _ => self.builder.build_float_div(l, r, name)?.into(),
                    })
                }
            }
            TypeKind::Int => {
                if vector {
                    let l = lhs.basic_value()?.into_vector_value();
                    let r = rhs.basic_value()?.into_vector_value();
                    Ok(match op {
                        BinaryOp::Add => self.builder.build_int_add(l, r, name)?.into(),
                        BinaryOp::Sub => self.builder.build_int_sub(l, r, name)?.into(),
                        BinaryOp::Mul => self.builder.build_int_mul(l, r, name)?.into(),
                        BinaryOp::Div => self.builder.build_int_signed_div(l, r, name)?.into(),
                        _ => self.builder.build_int_signed_rem(l, r, name)?.into(),
                    })
                } else {
                    let l = lhs.basic_value()?.into_int_value();
                    let r = rhs.basic_value()?.into_int_value();
                    Ok(match op {
                        BinaryOp::Add => self.builder.build_int_add(l, r, name)?.into(),
                        BinaryOp::Sub => self.builder.build_int_sub(l, r, name)?.into(),
                        BinaryOp::Mul => self.builder.build_int_mul(l, r, name)?.into(),
                        BinaryOp::Div => self.builder.build_int_signed_div(l, r, name)?.into(),
                        _ => self.builder.build_int_signed_rem(l, r, name)?.into(),
                    })
                }
            }
            other => Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("arithmetic is not defined on `{:?}` operands", other),
            )),
        }
    }

    // ---- assignment and unaries ---------------------------------------

    fn emit_assignment(&mut self, lhs: &Expr, rhs: &Expr) -> Result<Value<'ctx>, CompileError> {
        if !lhs.is_lvalue() {
            return Err(CompileError::new(
                DiagnosticCode::NotAnLValue,
                "left-hand side of assignment must be a variable or a memory location (l-value)",
            )
            .with_span(lhs.span));
        }

        let place = self.emit_expression(lhs)?;
        let value = self.emit_expression(rhs)?.load(self)?;
        let value = value
            .cast(self, &place.ty)
            .map_err(|e| Self::attach_span(e, rhs.span))?;
        place.store(self, &value)?;
        Ok(place)
    }

    fn emit_prefix(&mut self, op: PrefixOp, operand: &Expr) -> Result<Value<'ctx>, CompileError> {
        match op {
            PrefixOp::Plus => {
                let value = self.emit_expression(operand)?.load(self)?;
                self.require_numeric(&value, "+")?;
                Ok(value)
            }
            PrefixOp::Minus => {
                let value = self.emit_expression(operand)?.load(self)?;
                self.require_numeric(&value, "-")?;
                let vector = value.ty.is_vector();
                let result: BasicValueEnum = match value.ty.info.scalar_kind() {
                    TypeKind::Float => {
                        if vector {
                            self.builder
                                .build_float_neg(value.basic_value()?.into_vector_value(), "neg")?
                                .into()
                        } else {
                            self.builder
                                .build_float_neg(value.basic_value()?.into_float_value(), "neg")?
                                .into()
                        }
                    }
                    _ => {
                        if vector {
                            self.builder
                                .build_int_neg(value.basic_value()?.into_vector_value(), "neg")?
                                .into()
                        } else {
                            self.builder
                                .build_int_neg(value.basic_value()?.into_int_value(), "neg")?
                                .into()
                        }
                    }
                };
                Ok(Value::rvalue(result, value.ty.clone()))
            }
            PrefixOp::Not => {
                let value = self.emit_expression(operand)?.load(self)?;
                let policy = ArgPolicy::CONDITION | ArgPolicy::MASK;
                if !policy.allows(&value.ty.info) {
                    return Err(CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        format!(
                            "logical operator `!` expects a `bool` or `vbool` operand, but got `{}`",
                            value.ty.info
                        ),
                    ));
                }
                let result: BasicValueEnum = if value.ty.is_vector() {
                    self.builder
                        .build_not(value.basic_value()?.into_vector_value(), "not")?
                        .into()
                } else {
                    self.builder
                        .build_not(value.basic_value()?.into_int_value(), "not")?
                        .into()
                };
                Ok(Value::rvalue(result, value.ty.clone()))
            }
            PrefixOp::Increment => self.emit_increment(operand, BinaryOp::Add, true),
            PrefixOp::Decrement => self.emit_increment(operand, BinaryOp::Sub, true),
        }
    }

    fn emit_postfix(&mut self, op: PostfixOp, operand: &Expr) -> Result<Value<'ctx>, CompileError> {
        match op {
            PostfixOp::Increment => self.emit_increment(operand, BinaryOp::Add, false),
            PostfixOp::Decrement => self.emit_increment(operand, BinaryOp::Sub, false),
        }
    }

    /// `++`/`--` uniformly require a numeric l-value. Prefix forms yield
    /// the updated value, postfix forms the previous one; both store back.
    fn emit_increment(
        &mut self,
        operand: &Expr,
        op: BinaryOp,
        prefix: bool,
    ) -> Result<Value<'ctx>, CompileError> {
        let lvalue_error = || {
            CompileError::new(
                DiagnosticCode::NotAnLValue,
                "increment/decrement operator requires a numeric l-value",
            )
        };
        if !operand.is_lvalue() {
            return Err(lvalue_error());
        }

        let place = self.emit_expression(operand)?;
        if !place.has_storage() {
            return Err(lvalue_error());
        }
        self.require_numeric(&place, if op == BinaryOp::Add { "++" } else { "--" })?;

        let loaded = place.load(self)?;
        let one = Value::rvalue(
            self.context.i32_type().const_int(1, true).into(),
            self.prims.int.clone(),
        );
        let one = one.cast(self, &loaded.ty)?;
        let updated = Value::rvalue(self.numeric_binop(op, &loaded, &one)?, loaded.ty.clone());
        place.store(self, &updated)?;

        Ok(if prefix { updated } else { loaded })
    }

    fn require_numeric(&self, value: &Value<'ctx>, op: &str) -> Result<(), CompileError> {
        let policy = ArgPolicy::NUMERIC | ArgPolicy::VECTOR;
        if !policy.allows(&value.ty.info) {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "arithmetic operator `{}` expects a numeric operand, but got `{}`",
                    op, value.ty.info
                ),
            ));
        }
        Ok(())
    }

    // ---- aggregates, fields, subscripts --------------------------------

    fn emit_aggregate(&mut self, values: &[Expr]) -> Result<Value<'ctx>, CompileError> {
        let mut elements = Vec::with_capacity(values.len());
        for value in values {
            let element = self.emit_expression(value)?.load(self)?;
            elements.push(element);
        }
        let ty = crate::types::Type::new(
            vcl_ast::TypeInfo::simple(TypeKind::Aggregate),
            None,
        );
        Ok(Value::aggregate(elements, ty))
    }

    fn emit_field_access(
        &mut self,
        base: &Expr,
        field: &str,
    ) -> Result<Value<'ctx>, CompileError> {
        let value = self.emit_expression(base)?;
        if value.ty.kind() != TypeKind::Custom {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!(
                    "cannot access field `{}` on the non-struct type `{}`",
                    field, value.ty.info
                ),
            ));
        }
        let ValueKind::LValue(ptr) = value.kind else {
            return Err(CompileError::new(
                DiagnosticCode::NotAnLValue,
                format!("field `{}` can only be accessed through storage", field),
            ));
        };

        let struct_ty = value.ty.llvm_type()?.into_struct_type();
        let def = self.scopes.find_struct_by_llvm(struct_ty).ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::UndefinedName,
                format!("unknown struct type `{}`", value.ty.info),
            )
        })?;

        let index = def.field_index(field).ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("type `{}` has no member named `{}`", value.ty.info, field),
            )
        })?;
        let field_ty = def
            .field_type(index)
            .cloned()
            .ok_or_else(|| {
                CompileError::new(
                    DiagnosticCode::TypeMismatch,
                    format!("type `{}` has no member named `{}`", value.ty.info, field),
                )
            })?;

        let gep = self.builder.build_struct_gep(ptr, index, field)?;
        Ok(Value::lvalue(gep, field_ty))
    }

    fn emit_subscript(
        &mut self,
        base: &Expr,
        index: &Expr,
    ) -> Result<Value<'ctx>, CompileError> {
        let value = self.emit_expression(base)?;
        let int_ty = self.prims.int.clone();
        let index_value = self
            .emit_expression(index)?
            .load(self)?
            .cast(self, &int_ty)
            .map_err(|e| Self::attach_span(e, index.span))?;
        let index_int = index_value.basic_value()?.into_int_value();

        match value.ty.kind() {
            TypeKind::Array => {
                let element_info = match value.ty.info.template_args.first() {
                    Some(vcl_ast::TemplateArg::Typename(info)) => info.clone(),
                    _ => {
                        return Err(CompileError::new(
                            DiagnosticCode::TypeMismatch,
                            format!("array type `{}` has no element type", value.ty.info),
                        ))
                    }
                };
                let element_ty = self.create_type(&element_info)?;
                let ValueKind::LValue(ptr) = value.kind else {
                    return Err(CompileError::new(
                        DiagnosticCode::NotAnLValue,
                        "subscript requires addressable storage",
                    ));
                };
                let zero = self.context.i32_type().const_zero();
                // In-bounds per the language contract: out-of-range
                // subscripts are undefined behaviour at runtime.
                let gep = unsafe {
                    self.builder
                        .build_in_bounds_gep(ptr, &[zero, index_int], "elem")?
                };
                Ok(Value::lvalue(gep, element_ty))
            }
            TypeKind::Span => {
                let element_info = match value.ty.info.template_args.first() {
                    Some(vcl_ast::TemplateArg::Typename(info)) => info.clone(),
                    _ => {
                        return Err(CompileError::new(
                            DiagnosticCode::TypeMismatch,
                            format!("span type `{}` has no element type", value.ty.info),
                        ))
                    }
                };
                let element_ty = self.create_type(&element_info)?;

                let data_ptr = match value.kind {
                    ValueKind::LValue(ptr) => {
                        let slot = self.builder.build_struct_gep(ptr, 0, "span.data")?;
                        self.builder
                            .build_load(slot, "span.ptr")?
                            .into_pointer_value()
                    }
                    ValueKind::RValue(v) => self
                        .builder
                        .build_extract_value(v.into_struct_value(), 0, "span.ptr")?
                        .into_pointer_value(),
                    _ => {
                        return Err(CompileError::new(
                            DiagnosticCode::NotAnLValue,
                            "subscript requires addressable storage",
                        ))
                    }
                };

                let gep = unsafe {
                    self.builder
                        .build_in_bounds_gep(data_ptr, &[index_int], "elem")?
                };
                Ok(Value::lvalue(gep, element_ty))
            }
            _ => Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("cannot subscript a value of type `{}`", value.ty.info),
            )),
        }
    }
}
