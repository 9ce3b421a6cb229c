// Built-in callables. Each intrinsic has a fixed arity and a per-position
// argument policy; most lower to the matching LLVM intrinsic, the rest are
// open-coded by the emitter.

use crate::scope::{ScopeManager, Symbol};
use vcl_ast::{TypeInfo, TypeKind};

/// Union of acceptable argument classes for one intrinsic position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgPolicy(u8);

impl ArgPolicy {
    pub const NONE: ArgPolicy = ArgPolicy(0);
    /// `float` or `int`.
    pub const NUMERIC: ArgPolicy = ArgPolicy(1 << 0);
    /// `vfloat` or `vint`.
    pub const VECTOR: ArgPolicy = ArgPolicy(1 << 1);
    /// `bool`.
    pub const CONDITION: ArgPolicy = ArgPolicy(1 << 2);
    /// `vbool`.
    pub const MASK: ArgPolicy = ArgPolicy(1 << 3);
    /// `array` or `span`.
    pub const BUFFER: ArgPolicy = ArgPolicy(1 << 4);
    /// `float` or `vfloat`.
    pub const FLOAT_ONLY: ArgPolicy = ArgPolicy(1 << 5);

    pub const fn union(self, other: ArgPolicy) -> ArgPolicy {
        ArgPolicy(self.0 | other.0)
    }

    fn contains(self, other: ArgPolicy) -> bool {
        self.0 & other.0 != 0
    }

    pub fn allows(self, info: &TypeInfo) -> bool {
        if self.contains(Self::NUMERIC)
            && matches!(info.kind, TypeKind::Float | TypeKind::Int)
        {
            return true;
        }
        if self.contains(Self::VECTOR)
            && matches!(info.kind, TypeKind::VectorFloat | TypeKind::VectorInt)
        {
            return true;
        }
        if self.contains(Self::CONDITION) && info.kind == TypeKind::Bool {
            return true;
        }
        if self.contains(Self::MASK) && info.kind == TypeKind::VectorBool {
            return true;
        }
        if self.contains(Self::BUFFER)
            && matches!(info.kind, TypeKind::Array | TypeKind::Span)
        {
            return true;
        }
        if self.contains(Self::FLOAT_ONLY)
            && matches!(info.kind, TypeKind::Float | TypeKind::VectorFloat)
        {
            return true;
        }
        false
    }
}

impl std::ops::BitOr for ArgPolicy {
    type Output = ArgPolicy;
    fn bitor(self, rhs: ArgPolicy) -> ArgPolicy {
        self.union(rhs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicId {
    Sqrt,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Log,
    Log10,
    Log2,
    Exp,
    Exp2,
    Fabs,
    Ceil,
    Floor,
    Round,
    Pow,
    Fma,
    Fmod,
    Select,
    Len,
    Extract,
    Insert,
    Step,
    Reverse,
}

impl IntrinsicId {
    pub const ALL: &'static [IntrinsicId] = &[
        IntrinsicId::Sqrt,
        IntrinsicId::Sin,
        IntrinsicId::Cos,
        IntrinsicId::Tan,
        IntrinsicId::Asin,
        IntrinsicId::Acos,
        IntrinsicId::Atan,
        IntrinsicId::Sinh,
        IntrinsicId::Cosh,
        IntrinsicId::Tanh,
        IntrinsicId::Log,
        IntrinsicId::Log10,
        IntrinsicId::Log2,
        IntrinsicId::Exp,
        IntrinsicId::Exp2,
        IntrinsicId::Fabs,
        IntrinsicId::Ceil,
        IntrinsicId::Floor,
        IntrinsicId::Round,
        IntrinsicId::Pow,
        IntrinsicId::Fma,
        IntrinsicId::Fmod,
        IntrinsicId::Select,
        IntrinsicId::Len,
        IntrinsicId::Extract,
        IntrinsicId::Insert,
        IntrinsicId::Step,
        IntrinsicId::Reverse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntrinsicId::Sqrt => "sqrt",
            IntrinsicId::Sin => "sin",
            IntrinsicId::Cos => "cos",
            IntrinsicId::Tan => "tan",
            IntrinsicId::Asin => "asin",
            IntrinsicId::Acos => "acos",
            IntrinsicId::Atan => "atan",
            IntrinsicId::Sinh => "sinh",
            IntrinsicId::Cosh => "cosh",
            IntrinsicId::Tanh => "tanh",
            IntrinsicId::Log => "log",
            IntrinsicId::Log10 => "log10",
            IntrinsicId::Log2 => "log2",
            IntrinsicId::Exp => "exp",
            IntrinsicId::Exp2 => "exp2",
            IntrinsicId::Fabs => "fabs",
            IntrinsicId::Ceil => "ceil",
            IntrinsicId::Floor => "floor",
            IntrinsicId::Round => "round",
            IntrinsicId::Pow => "pow",
            IntrinsicId::Fma => "fma",
            IntrinsicId::Fmod => "fmod",
            IntrinsicId::Select => "select",
            IntrinsicId::Len => "len",
            IntrinsicId::Extract => "extract",
            IntrinsicId::Insert => "insert",
            IntrinsicId::Step => "step",
            IntrinsicId::Reverse => "reverse",
        }
    }

    /// Name of the backing LLVM intrinsic for table-driven lowering, when
    /// there is one.
    pub fn llvm_name(self) -> Option<&'static str> {
        Some(match self {
            IntrinsicId::Sqrt => "llvm.sqrt",
            IntrinsicId::Sin => "llvm.sin",
            IntrinsicId::Cos => "llvm.cos",
            IntrinsicId::Tan => "llvm.tan",
            IntrinsicId::Asin => "llvm.asin",
            IntrinsicId::Acos => "llvm.acos",
            IntrinsicId::Atan => "llvm.atan",
            IntrinsicId::Sinh => "llvm.sinh",
            IntrinsicId::Cosh => "llvm.cosh",
            IntrinsicId::Tanh => "llvm.tanh",
            IntrinsicId::Log => "llvm.log",
            IntrinsicId::Log10 => "llvm.log10",
            IntrinsicId::Log2 => "llvm.log2",
            IntrinsicId::Exp => "llvm.exp",
            IntrinsicId::Exp2 => "llvm.exp2",
            IntrinsicId::Fabs => "llvm.fabs",
            IntrinsicId::Ceil => "llvm.ceil",
            IntrinsicId::Floor => "llvm.floor",
            IntrinsicId::Round => "llvm.round",
            IntrinsicId::Pow => "llvm.pow",
            IntrinsicId::Fma => "llvm.fma",
            _ => return None,
        })
    }

    pub fn arg_count(self) -> usize {
        match self {
            IntrinsicId::Step => 0,
            IntrinsicId::Pow | IntrinsicId::Fmod | IntrinsicId::Extract => 2,
            IntrinsicId::Fma | IntrinsicId::Select | IntrinsicId::Insert => 3,
            _ => 1,
        }
    }

    pub fn arg_policy(self, index: usize) -> ArgPolicy {
        match self {
            IntrinsicId::Pow | IntrinsicId::Fma | IntrinsicId::Fmod => {
                if index == 0 {
                    ArgPolicy::FLOAT_ONLY
                } else {
                    ArgPolicy::NUMERIC | ArgPolicy::VECTOR
                }
            }
            IntrinsicId::Select => {
                if index == 0 {
                    ArgPolicy::CONDITION | ArgPolicy::MASK
                } else {
                    ArgPolicy::NUMERIC | ArgPolicy::VECTOR
                }
            }
            IntrinsicId::Len => ArgPolicy::BUFFER | ArgPolicy::VECTOR | ArgPolicy::MASK,
            IntrinsicId::Extract => {
                if index == 0 {
                    ArgPolicy::VECTOR
                } else {
                    ArgPolicy::NUMERIC
                }
            }
            IntrinsicId::Insert => {
                if index == 0 {
                    ArgPolicy::VECTOR
                } else {
                    ArgPolicy::NUMERIC
                }
            }
            IntrinsicId::Step => ArgPolicy::NONE,
            IntrinsicId::Reverse => ArgPolicy::VECTOR | ArgPolicy::MASK,
            // Unary float table.
            _ => ArgPolicy::FLOAT_ONLY,
        }
    }

    /// `insert` mutates its vector in place; every other position is taken
    /// by value.
    pub fn is_arg_by_reference(self, index: usize) -> bool {
        self == IntrinsicId::Insert && index == 0
    }
}

/// Make every intrinsic visible in the program scope of a fresh module.
pub fn register_all(scopes: &mut ScopeManager) {
    for &id in IntrinsicId::ALL {
        scopes.insert_symbol(id.name(), Symbol::Intrinsic(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policies_match_type_classes() {
        let float = TypeInfo::simple(TypeKind::Float);
        let vfloat = TypeInfo::simple(TypeKind::VectorFloat);
        let vbool = TypeInfo::simple(TypeKind::VectorBool);
        let span = TypeInfo::simple(TypeKind::Span);

        assert!(ArgPolicy::FLOAT_ONLY.allows(&float));
        assert!(ArgPolicy::FLOAT_ONLY.allows(&vfloat));
        assert!(!ArgPolicy::FLOAT_ONLY.allows(&TypeInfo::simple(TypeKind::Int)));

        assert!((ArgPolicy::CONDITION | ArgPolicy::MASK).allows(&vbool));
        assert!(!(ArgPolicy::NUMERIC | ArgPolicy::VECTOR).allows(&vbool));

        assert!(ArgPolicy::BUFFER.allows(&span));
    }

    #[test]
    fn arities() {
        assert_eq!(IntrinsicId::Step.arg_count(), 0);
        assert_eq!(IntrinsicId::Sqrt.arg_count(), 1);
        assert_eq!(IntrinsicId::Pow.arg_count(), 2);
        assert_eq!(IntrinsicId::Select.arg_count(), 3);
    }

    #[test]
    fn insert_takes_its_vector_by_reference() {
        assert!(IntrinsicId::Insert.is_arg_by_reference(0));
        assert!(!IntrinsicId::Insert.is_arg_by_reference(1));
        assert!(!IntrinsicId::Sqrt.is_arg_by_reference(0));
    }
}
