// The hand-off point to the in-process JIT. A session owns the compiled
// module and its execution engine; the host binds `in`/`out` globals to its
// own memory, then looks up entry points by name.

use inkwell::execution_engine::ExecutionEngine;
use inkwell::module::Module;
use inkwell::targets::FileType;
use inkwell::OptimizationLevel;
use std::path::{Path, PathBuf};

use crate::target;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("could not create the JIT engine: {0}")]
    EngineCreation(String),
    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),
    #[error("could not dump object file: {0}")]
    ObjectDump(String),
}

pub struct ExecutionSession<'ctx> {
    module: Module<'ctx>,
    engine: ExecutionEngine<'ctx>,
}

impl<'ctx> ExecutionSession<'ctx> {
    /// Take ownership of an emitted module and stand up the JIT for it.
    pub fn submit(module: Module<'ctx>) -> Result<Self, SessionError> {
        // Ensure the native target is ready before the engine exists.
        target::host_target_machine().map_err(|e| SessionError::EngineCreation(e.message))?;
        let engine = module
            .create_jit_execution_engine(OptimizationLevel::Default)
            .map_err(|e| SessionError::EngineCreation(e.to_string()))?;
        Ok(Self { module, engine })
    }

    /// Bind an `in`/`out` global to host memory. Must happen before the
    /// first `lookup` triggers compilation.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid (and suitably aligned for the symbol's type)
    /// for as long as compiled code may run.
    pub unsafe fn define_extern_symbol_ptr(
        &self,
        name: &str,
        ptr: *mut std::ffi::c_void,
    ) -> Result<(), SessionError> {
        let global = self
            .module
            .get_global(name)
            .ok_or_else(|| SessionError::UnknownSymbol(name.to_string()))?;
        self.engine.add_global_mapping(&global, ptr as usize);
        Ok(())
    }

    /// Address of a compiled entry point. The caller transmutes it to the
    /// matching `extern "C"` signature.
    pub fn lookup(&self, name: &str) -> Result<usize, SessionError> {
        self.engine
            .get_function_address(name)
            .map_err(|_| SessionError::UnknownSymbol(name.to_string()))
    }

    /// Write the compiled object file as `<dir>/<identifier>.o`.
    pub fn dump_object(&self, dir: &Path, identifier: &str) -> Result<PathBuf, SessionError> {
        let machine =
            target::host_target_machine().map_err(|e| SessionError::ObjectDump(e.message))?;
        let path = dir.join(format!("{}.o", identifier));
        machine
            .write_to_file(&self.module, FileType::Object, &path)
            .map_err(|e| SessionError::ObjectDump(e.to_string()))?;
        Ok(path)
    }

    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }
}
