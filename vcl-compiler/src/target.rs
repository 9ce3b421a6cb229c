// Native-target facts. The vector width is detected once per process from
// CPU features; the target machine provides layout facts and object
// emission for one module context.

use inkwell::targets::{
    CodeModel, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use std::sync::OnceLock;

use crate::CompileError;
use vcl_diagnostics::DiagnosticCode;

/// Widest SIMD register available on this machine, in bytes.
pub fn max_vector_byte_width() -> u32 {
    static WIDTH: OnceLock<u32> = OnceLock::new();
    *WIDTH.get_or_init(detect_vector_byte_width)
}

/// Lane count for `vfloat`/`vint`/`vbool` (element size is 4 bytes).
pub fn max_vector_element_width() -> u32 {
    max_vector_byte_width() / 4
}

#[cfg(target_arch = "x86_64")]
fn detect_vector_byte_width() -> u32 {
    if std::arch::is_x86_feature_detected!("avx512f") {
        64
    } else if std::arch::is_x86_feature_detected!("avx2") {
        32
    } else {
        16
    }
}

#[cfg(not(target_arch = "x86_64"))]
fn detect_vector_byte_width() -> u32 {
    16
}

/// Build a target machine for the host. Also initialises the native target,
/// which the JIT needs before an execution engine can be created.
pub fn host_target_machine() -> Result<TargetMachine, CompileError> {
    let internal = |msg: String| CompileError::new(DiagnosticCode::TypeMismatch, msg);

    Target::initialize_native(&InitializationConfig::default())
        .map_err(|e| internal(format!("native target initialisation failed: {}", e)))?;

    let triple = TargetMachine::get_default_triple();
    let target = Target::from_triple(&triple)
        .map_err(|e| internal(format!("no target for host triple: {}", e)))?;
    let cpu = TargetMachine::get_host_cpu_name().to_string();
    let features = TargetMachine::get_host_cpu_features().to_string();

    target
        .create_target_machine(
            &triple,
            &cpu,
            &features,
            OptimizationLevel::Default,
            RelocMode::Default,
            CodeModel::JITDefault,
        )
        .ok_or_else(|| internal("could not create host target machine".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_width_is_a_power_of_two_and_stable() {
        let width = max_vector_byte_width();
        assert!(width.is_power_of_two());
        assert!(width >= 16);
        assert_eq!(width, max_vector_byte_width());
        assert_eq!(max_vector_element_width(), width / 4);
    }
}
