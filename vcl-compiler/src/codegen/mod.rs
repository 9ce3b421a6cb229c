// The IR emitter: a single-pass visitor over the typed AST that drives the
// inkwell builder and enforces the language's semantic rules.

mod calls;
mod expressions;
mod statements;
mod templates_impl;
mod types_impl;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::TargetData;
use inkwell::types::{BasicTypeEnum, VectorType};
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue, VectorValue};
use inkwell::IntPredicate;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::directives::{DirectiveRegistry, DirectiveState};
use crate::scope::ScopeManager;
use crate::target;
use crate::types::Type;
use crate::CompileError;
use vcl_ast::{Expr, Program, Stmt, TypeInfo, TypeKind};
use vcl_diagnostics::{DiagnosticCode, DiagnosticsEngine, SourceManager};

/// Pre-lowered builtin types, shared by every value operation so casts and
/// splats never need to consult the type cache.
pub struct Primitives<'ctx> {
    pub float: Type<'ctx>,
    pub int: Type<'ctx>,
    pub bool_: Type<'ctx>,
    pub void: Type<'ctx>,
    pub vfloat: Type<'ctx>,
    pub vbool: Type<'ctx>,
    pub vint: Type<'ctx>,
    pub lanes: u32,
}

pub struct CodeGen<'ctx> {
    pub(crate) context: &'ctx Context,
    pub module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) scopes: ScopeManager<'ctx>,
    pub(crate) prims: Primitives<'ctx>,
    pub(crate) type_cache: HashMap<String, Type<'ctx>>,
    pub(crate) target_data: TargetData,
    pub diagnostics: DiagnosticsEngine,
    /// Owns every source pulled in through `@import` so their spans stay
    /// resolvable for the lifetime of the module.
    pub sources: SourceManager,
    pub(crate) directive_state: DirectiveState,
    pub(crate) directive_registry: DirectiveRegistry,
    pub(crate) current_function: Option<FunctionValue<'ctx>>,
    pub(crate) current_return_type: Option<Type<'ctx>>,
    pub(crate) source_dir: Option<PathBuf>,
    /// Terminator of the synthetic global-init function. The builder parks
    /// in front of it while emitting at program scope, which lets constant
    /// initialiser expressions fold without touching any real function.
    global_init_ret: inkwell::values::InstructionValue<'ctx>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(context: &'ctx Context, name: &str) -> Result<Self, CompileError> {
        let module = context.create_module(name);
        let machine = target::host_target_machine()?;
        let target_data = machine.get_target_data();
        module.set_triple(&machine.get_triple());
        module.set_data_layout(&target_data.get_data_layout());

        let lanes = target::max_vector_element_width();
        let prims = Self::make_primitives(context, &target_data, lanes);

        let mut scopes = ScopeManager::new();
        crate::intrinsics::register_all(&mut scopes);

        let builder = context.create_builder();
        let init_fn = module.add_function(
            "vcl.global.init",
            context.void_type().fn_type(&[], false),
            Some(inkwell::module::Linkage::Private),
        );
        let init_block = context.append_basic_block(init_fn, "entry");
        builder.position_at_end(init_block);
        let global_init_ret = builder.build_return(None)?;
        builder.position_before(&global_init_ret);

        Ok(Self {
            context,
            module,
            builder,
            scopes,
            prims,
            type_cache: HashMap::new(),
            target_data,
            diagnostics: DiagnosticsEngine::default(),
            sources: SourceManager::new(),
            directive_state: DirectiveState::default(),
            directive_registry: DirectiveRegistry::default(),
            current_function: None,
            current_return_type: None,
            source_dir: None,
            global_init_ret,
        })
    }

    /// Park the builder back at the program-scope insert point.
    pub(crate) fn position_at_global_scope(&self) {
        self.builder.position_before(&self.global_init_ret);
    }

    pub(crate) fn global_init_block(&self) -> Option<inkwell::basic_block::BasicBlock<'ctx>> {
        self.global_init_ret.get_parent()
    }

    fn make_primitives(
        context: &'ctx Context,
        target_data: &TargetData,
        lanes: u32,
    ) -> Primitives<'ctx> {
        let layout = |ty: BasicTypeEnum<'ctx>| {
            (
                target_data.get_store_size(&ty),
                target_data.get_abi_alignment(&ty) as u64,
            )
        };

        let float_llvm: BasicTypeEnum = context.f32_type().into();
        let int_llvm: BasicTypeEnum = context.i32_type().into();
        let bool_llvm: BasicTypeEnum = context.bool_type().into();
        let vfloat_llvm: BasicTypeEnum = context.f32_type().vec_type(lanes).into();
        let vbool_llvm: BasicTypeEnum = context.bool_type().vec_type(lanes).into();
        let vint_llvm: BasicTypeEnum = context.i32_type().vec_type(lanes).into();

        let make = |kind: TypeKind, llvm: BasicTypeEnum<'ctx>| {
            let (size, align) = layout(llvm);
            Type::new(TypeInfo::simple(kind), Some(llvm)).with_layout(size, align)
        };

        Primitives {
            float: make(TypeKind::Float, float_llvm),
            int: make(TypeKind::Int, int_llvm),
            bool_: make(TypeKind::Bool, bool_llvm),
            void: Type::new(TypeInfo::simple(TypeKind::Void), None),
            vfloat: make(TypeKind::VectorFloat, vfloat_llvm),
            vbool: make(TypeKind::VectorBool, vbool_llvm),
            vint: make(TypeKind::VectorInt, vint_llvm),
            lanes,
        }
    }

    pub fn into_module(self) -> Module<'ctx> {
        self.module
    }

    pub fn set_source_dir(&mut self, dir: PathBuf) {
        self.source_dir = Some(dir);
    }

    /// Emit a whole program at the current (program) scope.
    pub fn emit_program(&mut self, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.emit_statement(stmt)?;
        }
        Ok(())
    }

    // ---- shared helpers -----------------------------------------------

    /// Run `f` inside a fresh scope frame; the frame is popped on every
    /// exit path.
    pub(crate) fn with_scope<T>(
        &mut self,
        break_target: Option<inkwell::basic_block::BasicBlock<'ctx>>,
        f: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        self.scopes.push_scope(break_target);
        let result = f(self);
        self.scopes.pop_scope();
        result
    }

    pub(crate) fn current_block_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .and_then(|block| block.get_terminator())
            .is_some()
    }

    pub(crate) fn current_function(&self) -> Result<FunctionValue<'ctx>, CompileError> {
        self.current_function.ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::TypeMismatch,
                "statement is only valid inside a function body",
            )
        })
    }

    /// Allocate storage in the entry block of the current function so every
    /// local lives for the whole call frame.
    pub(crate) fn entry_alloca(
        &self,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> Result<PointerValue<'ctx>, CompileError> {
        let function = self.current_function()?;
        let entry = function.get_first_basic_block().ok_or_else(|| {
            CompileError::new(
                DiagnosticCode::TypeMismatch,
                "function has no entry block",
            )
        })?;
        let temp = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => temp.position_before(&first),
            None => temp.position_at_end(entry),
        }
        Ok(temp.build_alloca(ty, name)?)
    }

    /// Lower a condition expression to an `i1`: cast to `bool` then compare
    /// against false.
    pub(crate) fn emit_condition(&mut self, expr: &Expr) -> Result<IntValue<'ctx>, CompileError> {
        let bool_ty = self.prims.bool_.clone();
        let value = self.emit_expression(expr)?;
        let condition = value.load(self)?.cast(self, &bool_ty).map_err(|e| {
            CompileError::new(
                DiagnosticCode::TypeMismatch,
                format!("condition must be `bool`: {}", e.message),
            )
            .with_span(expr.span)
        })?;
        let int_value = condition.basic_value()?.into_int_value();
        let zero = self.context.bool_type().const_zero();
        Ok(self
            .builder
            .build_int_compare(IntPredicate::NE, int_value, zero, "cond")?)
    }

    /// Broadcast a scalar to the machine vector width.
    pub(crate) fn build_splat(
        &self,
        scalar: BasicValueEnum<'ctx>,
        vector_ty: &Type<'ctx>,
    ) -> Result<VectorValue<'ctx>, CompileError> {
        let vector_llvm = vector_ty.llvm_type()?.into_vector_type();
        let undef = vector_llvm.get_undef();
        let index = self.context.i32_type().const_zero();
        let seeded = self
            .builder
            .build_insert_element(undef, scalar, index, "splat.seed")?;
        let zeros: Vec<IntValue> = (0..self.prims.lanes)
            .map(|_| self.context.i32_type().const_zero())
            .collect();
        let mask = VectorType::const_vector(&zeros);
        Ok(self
            .builder
            .build_shuffle_vector(seeded, undef, mask, "splat")?)
    }

    /// Elementwise numeric conversion between the scalar classes; `None`
    /// when the pair is not convertible.
    pub(crate) fn build_numeric_conversion(
        &self,
        value: BasicValueEnum<'ctx>,
        from: TypeKind,
        to: TypeKind,
        is_vector: bool,
        target: &Type<'ctx>,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CompileError> {
        let target_llvm = target.llvm_type()?;
        let out = if is_vector {
            let vector = value.into_vector_value();
            let vector_target = target_llvm.into_vector_type();
            match (from, to) {
                (TypeKind::Float, TypeKind::Int) | (TypeKind::Float, TypeKind::Bool) => Some(
                    self.builder
                        .build_float_to_signed_int(vector, vector_target, "cast")?
                        .into(),
                ),
                (TypeKind::Int, TypeKind::Float) => Some(
                    self.builder
                        .build_signed_int_to_float(vector, vector_target, "cast")?
                        .into(),
                ),
                (TypeKind::Bool, TypeKind::Float) => Some(
                    self.builder
                        .build_unsigned_int_to_float(vector, vector_target, "cast")?
                        .into(),
                ),
                (TypeKind::Int, TypeKind::Bool) => Some(
                    self.builder
                        .build_int_truncate(vector, vector_target, "cast")?
                        .into(),
                ),
                (TypeKind::Bool, TypeKind::Int) => Some(
                    self.builder
                        .build_int_z_extend(vector, vector_target, "cast")?
                        .into(),
                ),
                _ => None,
            }
        } else {
            match (from, to) {
                (TypeKind::Float, TypeKind::Int) | (TypeKind::Float, TypeKind::Bool) => Some(
                    self.builder
                        .build_float_to_signed_int(
                            value.into_float_value(),
                            target_llvm.into_int_type(),
                            "cast",
                        )?
                        .into(),
                ),
                (TypeKind::Int, TypeKind::Float) => Some(
                    self.builder
                        .build_signed_int_to_float(
                            value.into_int_value(),
                            target_llvm.into_float_type(),
                            "cast",
                        )?
                        .into(),
                ),
                (TypeKind::Bool, TypeKind::Float) => Some(
                    self.builder
                        .build_unsigned_int_to_float(
                            value.into_int_value(),
                            target_llvm.into_float_type(),
                            "cast",
                        )?
                        .into(),
                ),
                (TypeKind::Int, TypeKind::Bool) => Some(
                    self.builder
                        .build_int_truncate(
                            value.into_int_value(),
                            target_llvm.into_int_type(),
                            "cast",
                        )?
                        .into(),
                ),
                (TypeKind::Bool, TypeKind::Int) => Some(
                    self.builder
                        .build_int_z_extend(
                            value.into_int_value(),
                            target_llvm.into_int_type(),
                            "cast",
                        )?
                        .into(),
                ),
                _ => None,
            }
        };
        Ok(out)
    }

    /// Zero constant for any lowered type; used by private globals.
    pub(crate) fn const_zero(&self, ty: BasicTypeEnum<'ctx>) -> BasicValueEnum<'ctx> {
        match ty {
            BasicTypeEnum::IntType(t) => t.const_zero().into(),
            BasicTypeEnum::FloatType(t) => t.const_zero().into(),
            BasicTypeEnum::PointerType(t) => t.const_null().into(),
            BasicTypeEnum::StructType(t) => t.const_zero().into(),
            BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
            BasicTypeEnum::VectorType(t) => t.const_zero().into(),
            _ => self.context.i32_type().const_zero().into(),
        }
    }

    /// Attach a span to an error that does not carry one yet.
    pub(crate) fn attach_span(
        err: CompileError,
        span: vcl_diagnostics::Span,
    ) -> CompileError {
        if err.span.is_some() {
            err
        } else {
            err.with_span(span)
        }
    }

    /// Emit one statement; errors pick up the statement span when the
    /// failing operation did not set a narrower one.
    pub fn emit_statement(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.emit_statement_kind(stmt)
            .map_err(|e| Self::attach_span(e, stmt.span))
    }
}
