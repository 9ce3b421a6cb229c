// Monomorphisation. Struct templates substitute their bindings into each
// field and register the definition under the mangled name at the
// template's declaring frame. Callable templates additionally emit the
// concrete body with the emitter, saving and restoring the insert point so
// instantiation can happen mid-expression.

use std::rc::Rc;

use super::CodeGen;
use crate::scope::Symbol;
use crate::structs::{StructDefinition, StructTemplate};
use crate::templates::{CallableTemplate, TemplateArgumentMapper};
use crate::value::{FunctionDecl, Value};
use crate::CompileError;
use vcl_ast::{FieldDecl, TemplateArg};

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn resolve_struct_template(
        &mut self,
        template: &Rc<StructTemplate>,
        depth: usize,
        args: &[TemplateArg],
    ) -> Result<Rc<StructDefinition<'ctx>>, CompileError> {
        let mut mapper = TemplateArgumentMapper::new(&template.name);
        mapper.map(args, &template.params)?;
        mapper.check(&template.params)?;
        let mangled = mapper.mangle(&template.params);

        // A previous instantiation with the same bindings wins.
        if let Some(existing) = self.scopes.find_struct(&mangled) {
            return Ok(existing);
        }

        let mut fields = Vec::with_capacity(template.fields.len());
        for field in &template.fields {
            fields.push(FieldDecl {
                name: field.name.clone(),
                ty: mapper.resolve_type(&field.ty)?,
                span: field.span,
            });
        }

        let def = Rc::new(self.build_struct_definition(&mangled, &fields)?);
        self.scopes.insert_struct_at(depth, mangled, def.clone());
        Ok(def)
    }

    pub(crate) fn resolve_callable_template(
        &mut self,
        template: &Rc<CallableTemplate>,
        depth: usize,
        mapper: &TemplateArgumentMapper,
        mangled: &str,
    ) -> Result<Rc<FunctionDecl<'ctx>>, CompileError> {
        let saved_block = self.builder.get_insert_block();
        let saved_function = self.current_function.take();
        let saved_return = self.current_return_type.take();

        let result = self.with_scope(None, |cx| {
            // Typename parameters become aliases, int parameters constant
            // values, both visible throughout the instantiated body.
            for param in &template.template_params {
                match mapper.get(&param.name) {
                    Some(TemplateArg::Typename(info)) => {
                        cx.scopes.insert_alias(&param.name, info.clone());
                    }
                    Some(TemplateArg::Int(value)) => {
                        let mut qualifiers = vcl_ast::Qualifiers::default();
                        qualifiers.is_const = true;
                        let constant = Value::rvalue(
                            cx.context
                                .i32_type()
                                .const_int(*value as i64 as u64, true)
                                .into(),
                            cx.prims.int.requalified(qualifiers),
                        );
                        cx.scopes.insert_symbol(&param.name, Symbol::Value(constant));
                    }
                    None => {
                        return Err(CompileError::new(
                            vcl_diagnostics::DiagnosticCode::MissingTemplateArg,
                            format!(
                                "missing template parameter `{}` in `{}`",
                                param.name, template.name
                            ),
                        ))
                    }
                }
            }

            let return_type = cx.create_type(&mapper.resolve_type(&template.return_type)?)?;
            let mut params = Vec::with_capacity(template.params.len());
            for (name, info) in &template.params {
                let ty = cx.create_type(&mapper.resolve_type(info)?)?;
                params.push((name.clone(), ty));
            }

            let decl = cx.declare_function(mangled, return_type, params)?;
            // The instantiation outlives the call site: it lives where the
            // template was declared.
            cx.scopes
                .insert_symbol_at(depth, mangled, Symbol::Function(decl.clone()));

            cx.emit_function_body(&decl, &template.body)?;
            Ok(decl)
        });

        self.current_function = saved_function;
        self.current_return_type = saved_return;
        match saved_block {
            Some(block) if Some(block) != self.global_init_block() => {
                self.builder.position_at_end(block)
            }
            _ => self.position_at_global_scope(),
        }

        result
    }
}
