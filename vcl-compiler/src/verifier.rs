// Post-emission verification: LLVM's own module verifier first, then a
// scan for `select` calls whose arms recurse into the enclosing function.
// `select` evaluates both arms unconditionally, so such code cannot
// terminate.

use inkwell::values::{AsValueRef, BasicValueEnum, InstructionOpcode, InstructionValue};
use std::collections::{HashMap, HashSet};

use crate::codegen::CodeGen;
use crate::CompileError;
use vcl_diagnostics::{Diagnostic, DiagnosticCode};

/// Bound on transitive call-graph exploration.
const RECURSION_SCAN_DEPTH: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct VerifierSettings {
    pub enable_select_recursion_check: bool,
    pub select_recursion_as_error: bool,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            enable_select_recursion_check: true,
            select_recursion_as_error: false,
        }
    }
}

pub fn verify_module(
    cx: &mut CodeGen,
    settings: VerifierSettings,
) -> Result<(), CompileError> {
    if let Err(message) = cx.module.verify() {
        let err = CompileError::new(
            DiagnosticCode::TypeMismatch,
            format!("module verification failed: {}", message),
        );
        cx.diagnostics.report(err.to_diagnostic());
        return Err(err);
    }

    if settings.enable_select_recursion_check {
        check_select_recursion(cx, settings.select_recursion_as_error)?;
    }
    Ok(())
}

fn instruction_of(value: BasicValueEnum) -> Option<InstructionValue> {
    match value {
        BasicValueEnum::IntValue(v) => v.as_instruction(),
        BasicValueEnum::FloatValue(v) => v.as_instruction(),
        BasicValueEnum::PointerValue(v) => v.as_instruction(),
        BasicValueEnum::VectorValue(v) => v.as_instruction(),
        BasicValueEnum::StructValue(v) => v.as_instruction(),
        BasicValueEnum::ArrayValue(v) => v.as_instruction(),
        _ => None,
    }
}

/// Name of the function a call instruction targets, when it is direct.
fn call_target(instruction: &InstructionValue) -> Option<String> {
    let operand_count = instruction.get_num_operands();
    if operand_count == 0 {
        return None;
    }
    let callee = instruction.get_operand(operand_count - 1)?.value()?;
    if let BasicValueEnum::PointerValue(ptr) = callee {
        let name = ptr.get_name().to_string_lossy().into_owned();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    } else {
        None
    }
}

fn check_select_recursion(cx: &mut CodeGen, as_error: bool) -> Result<(), CompileError> {
    // Direct call graph by function name.
    let mut graph: HashMap<String, HashSet<String>> = HashMap::new();
    for function in cx.module.get_functions() {
        let name = function.get_name().to_string_lossy().into_owned();
        let edges = graph.entry(name).or_default();
        for block in function.get_basic_blocks() {
            let mut cursor = block.get_first_instruction();
            while let Some(instruction) = cursor {
                if instruction.get_opcode() == InstructionOpcode::Call {
                    if let Some(target) = call_target(&instruction) {
                        edges.insert(target);
                    }
                }
                cursor = instruction.get_next_instruction();
            }
        }
    }

    let mut offenders: Vec<String> = Vec::new();
    for function in cx.module.get_functions() {
        let name = function.get_name().to_string_lossy().into_owned();
        for block in function.get_basic_blocks() {
            let mut cursor = block.get_first_instruction();
            while let Some(instruction) = cursor {
                if instruction.get_opcode() == InstructionOpcode::Select
                    && select_arm_recurses(&instruction, &name, &graph)
                {
                    offenders.push(name.clone());
                }
                cursor = instruction.get_next_instruction();
            }
        }
    }

    for name in offenders {
        let diagnostic = Diagnostic::new(
            if as_error {
                vcl_diagnostics::Severity::Error
            } else {
                vcl_diagnostics::Severity::Warning
            },
            DiagnosticCode::SelectRecursion,
            format!(
                "`select` in `{}` has a recursive arm; `select` always evaluates both arms, which will infinitely recurse",
                name
            ),
        );
        if !cx.diagnostics.report(diagnostic) {
            return Err(CompileError::new(
                DiagnosticCode::SelectRecursion,
                format!("`select` in `{}` has a recursive arm", name),
            ));
        }
    }
    Ok(())
}

/// True when either arm of the select is (or computes from) a call to a
/// function that can reach the enclosing function again.
fn select_arm_recurses(
    select: &InstructionValue,
    enclosing: &str,
    graph: &HashMap<String, HashSet<String>>,
) -> bool {
    for operand_index in [1u32, 2u32] {
        let Some(operand) = select.get_operand(operand_index) else {
            continue;
        };
        let Some(value) = operand.value() else {
            continue;
        };
        let mut visited: HashSet<usize> = HashSet::new();
        if value_recurses(value, enclosing, graph, &mut visited) {
            return true;
        }
    }
    false
}

fn value_recurses(
    value: BasicValueEnum,
    enclosing: &str,
    graph: &HashMap<String, HashSet<String>>,
    visited: &mut HashSet<usize>,
) -> bool {
    let Some(instruction) = instruction_of(value) else {
        return false;
    };
    if !visited.insert(instruction.as_value_ref() as usize) {
        return false;
    }

    if instruction.get_opcode() == InstructionOpcode::Call {
        if let Some(target) = call_target(&instruction) {
            if target == enclosing
                || reaches(&target, enclosing, graph, RECURSION_SCAN_DEPTH)
            {
                return true;
            }
        }
    }

    for index in 0..instruction.get_num_operands() {
        if let Some(operand) = instruction.get_operand(index).and_then(|o| o.value()) {
            if value_recurses(operand, enclosing, graph, visited) {
                return true;
            }
        }
    }
    false
}

fn reaches(
    from: &str,
    target: &str,
    graph: &HashMap<String, HashSet<String>>,
    depth: usize,
) -> bool {
    if depth == 0 {
        return false;
    }
    let Some(edges) = graph.get(from) else {
        return false;
    };
    if edges.contains(target) {
        return true;
    }
    edges
        .iter()
        .any(|next| reaches(next, target, graph, depth - 1))
}
