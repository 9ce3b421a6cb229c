// Statement lowering: declarations, functions, structs, templates, and the
// three-/four-block control-flow expansions.

use inkwell::module::Linkage;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use std::rc::Rc;

use super::CodeGen;
use crate::scope::Symbol;
use crate::structs::{StructDefinition, StructTemplate};
use crate::target;
use crate::templates::CallableTemplate;
use crate::types::Type;
use crate::value::{constant_element, FunctionDecl, Value, ValueKind};
use crate::CompileError;
use vcl_ast::{
    Expr, FieldDecl, FunctionPrototype, Stmt, StmtKind, TemplateParam, TypeInfo,
};
use vcl_diagnostics::DiagnosticCode;

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn emit_statement_kind(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Compound(statements) => self.with_scope(None, |cx| {
                for statement in statements {
                    // Nothing after a terminator is reachable.
                    if cx.current_block_terminated() {
                        break;
                    }
                    cx.emit_statement(statement)?;
                }
                Ok(())
            }),
            StmtKind::VariableDeclaration {
                ty,
                name,
                initializer,
            } => self.emit_variable_declaration(ty, name, initializer.as_ref()),
            StmtKind::FunctionPrototype(prototype) => {
                self.emit_function_prototype(prototype)?;
                Ok(())
            }
            StmtKind::FunctionDeclaration { prototype, body } => {
                let saved = self.builder.get_insert_block();
                let decl = self.emit_function_prototype(prototype)?;
                let result = self.emit_function_body(&decl, body);
                match saved {
                    Some(block) if Some(block) != self.global_init_block() => {
                        self.builder.position_at_end(block)
                    }
                    _ => self.position_at_global_scope(),
                }
                result
            }
            StmtKind::StructDeclaration { name, fields } => {
                self.emit_struct_declaration(name, fields)
            }
            StmtKind::StructTemplateDeclaration {
                name,
                params,
                fields,
            } => self.emit_struct_template(name, params, fields),
            StmtKind::FunctionTemplateDeclaration {
                prototype,
                params,
                body,
            } => self.emit_function_template(prototype, params, body),
            StmtKind::Return(value) => self.emit_return(value.as_ref()),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.emit_if(condition, then_branch, else_branch.as_deref()),
            StmtKind::While { condition, body } => self.emit_while(condition, body),
            StmtKind::For {
                init,
                condition,
                step,
                body,
            } => self.emit_for(init, condition, step, body),
            StmtKind::Break => self.emit_break(),
            StmtKind::Directive(node) => self.run_directive(node, stmt.span),
            StmtKind::Expression(expr) => {
                self.emit_expression(expr)?;
                Ok(())
            }
        }
    }

    // ---- variables -----------------------------------------------------

    fn emit_variable_declaration(
        &mut self,
        ty_info: &TypeInfo,
        name: &str,
        initializer: Option<&Expr>,
    ) -> Result<(), CompileError> {
        let ty = self.create_type(ty_info)?;
        if ty.is_void() {
            return Err(CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("cannot declare `{}` with type `void`", name),
            ));
        }

        let initializer = match initializer {
            Some(expr) => Some((self.emit_expression(expr)?, expr.span)),
            None => None,
        };

        let value = if self.scopes.is_global() {
            self.create_global_variable(&ty, name, initializer)?
        } else {
            self.create_local_variable(&ty, name, initializer)?
        };

        if !self.scopes.insert_symbol(name, Symbol::Value(value)) {
            return Err(CompileError::new(
                DiagnosticCode::Redefinition,
                format!("redefinition of `{}`", name),
            ));
        }
        Ok(())
    }

    /// Globals: `in`/`out` means external linkage bound to host memory;
    /// private globals require constant initialisers and are otherwise
    /// zero-initialised. Everything is aligned to the vector width so
    /// vector loads stay aligned.
    fn create_global_variable(
        &mut self,
        ty: &Type<'ctx>,
        name: &str,
        initializer: Option<(Value<'ctx>, vcl_diagnostics::Span)>,
    ) -> Result<Value<'ctx>, CompileError> {
        let llvm = ty.llvm_type()?;
        let global = self.module.add_global(llvm, None, name);

        if ty.info.is_extern() {
            if initializer.is_some() {
                return Err(CompileError::new(
                    DiagnosticCode::NonConstantInitializer,
                    format!("`{}` is bound to host memory and cannot have an initializer", name),
                ));
            }
            global.set_linkage(Linkage::External);
        } else {
            global.set_linkage(Linkage::Private);
            match initializer {
                Some((value, span)) => {
                    if !value.is_constant() {
                        return Err(CompileError::new(
                            DiagnosticCode::NonConstantInitializer,
                            format!("initializer of global `{}` must be a constant expression", name),
                        )
                        .with_span(span));
                    }
                    let value = match value.kind {
                        ValueKind::Aggregate { .. } => value.cast(self, ty)?,
                        _ => value,
                    };
                    let constant = constant_element(self, &value, llvm)
                        .map_err(|e| Self::attach_span(e, span))?;
                    global.set_initializer(&constant);
                }
                None => global.set_initializer(&self.const_zero(llvm)),
            }
        }

        global.set_constant(ty.info.is_const());
        global.set_alignment(target::max_vector_byte_width());
        Ok(Value::lvalue(global.as_pointer_value(), ty.clone()))
    }

    /// Locals always get their storage in the function entry block.
    fn create_local_variable(
        &mut self,
        ty: &Type<'ctx>,
        name: &str,
        initializer: Option<(Value<'ctx>, vcl_diagnostics::Span)>,
    ) -> Result<Value<'ctx>, CompileError> {
        let slot = self.entry_alloca(ty.llvm_type()?, name)?;
        if let Some((value, span)) = initializer {
            let loaded = value.load(self)?;
            let casted = loaded
                .cast(self, ty)
                .map_err(|e| Self::attach_span(e, span))?;
            self.builder.build_store(slot, casted.basic_value()?)?;
        }
        Ok(Value::lvalue(slot, ty.clone()))
    }

    // ---- functions -----------------------------------------------------

    /// The prototype creates the symbol once; later prototypes of the same
    /// name resolve to the first.
    pub(crate) fn emit_function_prototype(
        &mut self,
        prototype: &FunctionPrototype,
    ) -> Result<Rc<FunctionDecl<'ctx>>, CompileError> {
        match self.scopes.find_symbol(&prototype.name) {
            Some(Symbol::Function(decl)) => return Ok(decl.clone()),
            Some(_) => {
                return Err(CompileError::new(
                    DiagnosticCode::Redefinition,
                    format!("redefinition of `{}`", prototype.name),
                )
                .with_span(prototype.span))
            }
            None => {}
        }

        let return_type = self.create_type(&prototype.return_type)?;
        let mut params = Vec::with_capacity(prototype.params.len());
        for param in &prototype.params {
            let ty = self.create_type(&param.ty)?;
            if ty.is_void() {
                return Err(CompileError::new(
                    DiagnosticCode::TypeMismatch,
                    format!("parameter `{}` cannot have type `void`", param.name),
                )
                .with_span(param.span));
            }
            params.push((param.name.clone(), ty));
        }

        let decl = self.declare_function(&prototype.name, return_type, params)?;
        self.scopes
            .insert_symbol(prototype.name.clone(), Symbol::Function(decl.clone()));
        Ok(decl)
    }

    /// Create the LLVM function symbol: by-reference parameters lower to
    /// pointers, everything else to its value type.
    pub(crate) fn declare_function(
        &mut self,
        name: &str,
        return_type: Type<'ctx>,
        params: Vec<(String, Type<'ctx>)>,
    ) -> Result<Rc<FunctionDecl<'ctx>>, CompileError> {
        let mut param_types: Vec<BasicMetadataTypeEnum> = Vec::with_capacity(params.len());
        for (_, ty) in &params {
            if ty.info.is_given_by_reference() {
                param_types.push(
                    ty.llvm_type()?
                        .ptr_type(inkwell::AddressSpace::default())
                        .into(),
                );
            } else {
                param_types.push(ty.llvm_type()?.into());
            }
        }

        let fn_type = if return_type.is_void() {
            self.context.void_type().fn_type(&param_types, false)
        } else {
            return_type.llvm_type()?.fn_type(&param_types, false)
        };
        let fn_value = self.module.add_function(name, fn_type, None);
        for (i, (param_name, _)) in params.iter().enumerate() {
            if let Some(param) = fn_value.get_nth_param(i as u32) {
                param.set_name(param_name);
            }
        }

        Ok(Rc::new(FunctionDecl {
            fn_value,
            return_type,
            params,
        }))
    }

    /// Emit a function body: entry block, argument binding (by-value
    /// arguments get entry-block storage), the body itself, then the
    /// terminator rule for every dangling block.
    pub(crate) fn emit_function_body(
        &mut self,
        decl: &Rc<FunctionDecl<'ctx>>,
        body: &Stmt,
    ) -> Result<(), CompileError> {
        let name = decl.fn_value.get_name().to_string_lossy().into_owned();
        if decl.fn_value.count_basic_blocks() > 0 {
            return Err(CompileError::new(
                DiagnosticCode::Redefinition,
                format!("function `{}` is already defined", name),
            ));
        }

        let entry = self.context.append_basic_block(decl.fn_value, "entry");
        self.builder.position_at_end(entry);

        let saved_function = self.current_function.replace(decl.fn_value);
        let saved_return = self.current_return_type.replace(decl.return_type.clone());

        let result = self.with_scope(None, |cx| {
            for (i, (param_name, ty)) in decl.params.iter().enumerate() {
                let param = decl.fn_value.get_nth_param(i as u32).ok_or_else(|| {
                    CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        format!("`{}`: missing parameter {}", name, i),
                    )
                })?;
                let bound = if ty.info.is_given_by_reference() {
                    Value::lvalue(param.into_pointer_value(), ty.clone())
                } else {
                    let slot = cx.entry_alloca(ty.llvm_type()?, param_name)?;
                    cx.builder.build_store(slot, param)?;
                    Value::lvalue(slot, ty.clone())
                };
                cx.scopes.insert_symbol(param_name, Symbol::Value(bound));
            }
            cx.emit_statement(body)
        });

        self.current_function = saved_function;
        self.current_return_type = saved_return;
        result?;

        for block in decl.fn_value.get_basic_blocks() {
            if block.get_terminator().is_some() {
                continue;
            }
            if decl.return_type.is_void() {
                self.builder.position_at_end(block);
                self.builder.build_return(None)?;
            } else {
                return Err(CompileError::new(
                    DiagnosticCode::MissingReturn,
                    format!("missing return statement in `{}`", name),
                ));
            }
        }

        if !decl.fn_value.verify(false) {
            log::debug!("LLVM rejected the body of `{}`", name);
        }
        Ok(())
    }

    fn emit_return(&mut self, value: Option<&Expr>) -> Result<(), CompileError> {
        let return_type = self.current_return_type.clone().ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::TypeMismatch,
                "`return` is only valid inside a function body",
            )
        })?;

        match value {
            None => {
                if !return_type.is_void() {
                    return Err(CompileError::new(
                        DiagnosticCode::MissingReturn,
                        format!(
                            "function returns `{}` but this `return` has no value",
                            return_type.info
                        ),
                    ));
                }
                self.builder.build_return(None)?;
            }
            Some(expr) => {
                if return_type.is_void() {
                    return Err(CompileError::new(
                        DiagnosticCode::TypeMismatch,
                        "a `void` function cannot return a value",
                    )
                    .with_span(expr.span));
                }
                let result = self
                    .emit_expression(expr)?
                    .load(self)?
                    .cast(self, &return_type)
                    .map_err(|e| Self::attach_span(e, expr.span))?;
                let basic = result.basic_value()?;
                self.builder.build_return(Some(&basic))?;
            }
        }
        Ok(())
    }

    // ---- structs & templates ------------------------------------------

    fn emit_struct_declaration(
        &mut self,
        name: &str,
        fields: &[FieldDecl],
    ) -> Result<(), CompileError> {
        let def = self.build_struct_definition(name, fields)?;
        if !self.scopes.insert_struct(name, Rc::new(def)) {
            return Err(CompileError::new(
                DiagnosticCode::Redefinition,
                format!("redefinition of `{}`", name),
            ));
        }
        Ok(())
    }

    pub(crate) fn build_struct_definition(
        &mut self,
        name: &str,
        fields: &[FieldDecl],
    ) -> Result<StructDefinition<'ctx>, CompileError> {
        let mut lowered = Vec::with_capacity(fields.len());
        let mut llvm_fields = Vec::with_capacity(fields.len());
        for field in fields {
            if lowered.iter().any(|(existing, _)| existing == &field.name) {
                return Err(CompileError::new(
                    DiagnosticCode::Redefinition,
                    format!("duplicate field `{}` in `{}`", field.name, name),
                )
                .with_span(field.span));
            }
            let ty = self.create_type(&field.ty)?;
            llvm_fields.push(ty.llvm_type().map_err(|e| Self::attach_span(e, field.span))?);
            lowered.push((field.name.clone(), ty));
        }

        let struct_ty = self.context.opaque_struct_type(name);
        struct_ty.set_body(&llvm_fields, false);
        Ok(StructDefinition::new(name.to_string(), struct_ty, lowered))
    }

    fn emit_struct_template(
        &mut self,
        name: &str,
        params: &[TemplateParam],
        fields: &[FieldDecl],
    ) -> Result<(), CompileError> {
        let template = StructTemplate {
            name: name.to_string(),
            params: params.to_vec(),
            fields: fields.to_vec(),
        };
        if !self.scopes.insert_struct_template(name, Rc::new(template)) {
            return Err(CompileError::new(
                DiagnosticCode::Redefinition,
                format!("redefinition of `{}`", name),
            ));
        }
        Ok(())
    }

    fn emit_function_template(
        &mut self,
        prototype: &FunctionPrototype,
        params: &[TemplateParam],
        body: &Stmt,
    ) -> Result<(), CompileError> {
        let template = CallableTemplate {
            name: prototype.name.clone(),
            return_type: prototype.return_type.clone(),
            params: prototype
                .params
                .iter()
                .map(|p| (p.name.clone(), p.ty.clone()))
                .collect(),
            template_params: params.to_vec(),
            body: Rc::new(body.clone()),
        };
        if !self
            .scopes
            .insert_callable_template(&prototype.name, Rc::new(template))
        {
            return Err(CompileError::new(
                DiagnosticCode::Redefinition,
                format!("redefinition of `{}`", prototype.name),
            )
            .with_span(prototype.span));
        }
        Ok(())
    }

    // ---- control flow --------------------------------------------------

    fn emit_if(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), CompileError> {
        let function = self.current_function()?;
        let cond = self.emit_condition(condition)?;

        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        let end_bb = self.context.append_basic_block(function, "end");

        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        self.emit_statement(then_branch)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(end_bb)?;
        }

        self.builder.position_at_end(else_bb);
        if let Some(else_branch) = else_branch {
            self.emit_statement(else_branch)?;
        }
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(end_bb)?;
        }

        self.builder.position_at_end(end_bb);
        Ok(())
    }

    fn emit_while(&mut self, condition: &Expr, body: &Stmt) -> Result<(), CompileError> {
        let function = self.current_function()?;
        let cond_bb = self.context.append_basic_block(function, "while.cond");
        let body_bb = self.context.append_basic_block(function, "while.body");
        let end_bb = self.context.append_basic_block(function, "while.end");

        self.with_scope(Some(end_bb), |cx| {
            cx.builder.build_unconditional_branch(cond_bb)?;

            cx.builder.position_at_end(cond_bb);
            let cond = cx.emit_condition(condition)?;
            cx.builder.build_conditional_branch(cond, body_bb, end_bb)?;

            cx.builder.position_at_end(body_bb);
            cx.emit_statement(body)?;
            if !cx.current_block_terminated() {
                cx.builder.build_unconditional_branch(cond_bb)?;
            }
            Ok(())
        })?;

        self.builder.position_at_end(end_bb);
        Ok(())
    }

    fn emit_for(
        &mut self,
        init: &Stmt,
        condition: &Expr,
        step: &Stmt,
        body: &Stmt,
    ) -> Result<(), CompileError> {
        let function = self.current_function()?;
        let cond_bb = self.context.append_basic_block(function, "for.cond");
        let body_bb = self.context.append_basic_block(function, "for.body");
        let end_bb = self.context.append_basic_block(function, "for.end");

        self.with_scope(Some(end_bb), |cx| {
            cx.emit_statement(init)?;
            cx.builder.build_unconditional_branch(cond_bb)?;

            cx.builder.position_at_end(cond_bb);
            let cond = cx.emit_condition(condition)?;
            cx.builder.build_conditional_branch(cond, body_bb, end_bb)?;

            cx.builder.position_at_end(body_bb);
            cx.emit_statement(body)?;
            if !cx.current_block_terminated() {
                cx.emit_statement(step)?;
                if !cx.current_block_terminated() {
                    cx.builder.build_unconditional_branch(cond_bb)?;
                }
            }
            Ok(())
        })?;

        self.builder.position_at_end(end_bb);
        Ok(())
    }

    fn emit_break(&mut self) -> Result<(), CompileError> {
        let target = self.scopes.transfer_control_block().ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::BreakOutsideLoop,
                "a break statement may only be used within a loop",
            )
        })?;
        self.builder.build_unconditional_branch(target)?;
        Ok(())
    }
}
