// Template machinery: mapping explicit and inferred arguments onto
// parameters, name mangling, and type substitution. Resolution of the
// instantiated body lives with the emitter.

use std::collections::HashMap;
use std::rc::Rc;

use crate::CompileError;
use vcl_ast::{
    Stmt, TemplateArg, TemplateParam, TemplateParamKind, TypeInfo, TypeKind,
};
use vcl_diagnostics::DiagnosticCode;

/// The uninstantiated source of a generic function.
pub struct CallableTemplate {
    pub name: String,
    pub return_type: TypeInfo,
    pub params: Vec<(String, TypeInfo)>,
    pub template_params: Vec<TemplateParam>,
    pub body: Rc<Stmt>,
}

/// Binds template parameter names to arguments in three phases: `map`
/// explicit arguments, `infer` the rest from actual argument types, then
/// `check` that every parameter is bound.
pub struct TemplateArgumentMapper {
    name: String,
    bindings: HashMap<String, TemplateArg>,
}

impl TemplateArgumentMapper {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TemplateArg> {
        self.bindings.get(name)
    }

    /// Phase 1: explicit arguments in declaration order.
    pub fn map(
        &mut self,
        arguments: &[TemplateArg],
        params: &[TemplateParam],
    ) -> Result<(), CompileError> {
        if arguments.len() > params.len() {
            return Err(CompileError::new(
                DiagnosticCode::WrongArgCount,
                format!(
                    "in template `{}`, {} template argument(s) were given but at most {} expected",
                    self.name,
                    arguments.len(),
                    params.len()
                ),
            ));
        }
        for (argument, param) in arguments.iter().zip(params) {
            if argument.kind() != param.kind {
                return Err(CompileError::new(
                    DiagnosticCode::TemplateArgKindMismatch,
                    format!(
                        "template parameter `{}` of `{}` expects {} but the argument is {}",
                        param.name,
                        self.name,
                        param.kind,
                        argument.kind()
                    ),
                ));
            }
            self.bindings.insert(param.name.clone(), argument.clone());
        }
        Ok(())
    }

    /// Phase 2 (callables only): walk templated parameter types against the
    /// actual argument types, binding every unbound parameter reference
    /// found on the templated side.
    pub fn infer(
        &mut self,
        params: &[TemplateParam],
        templated: &[TypeInfo],
        actual: &[TypeInfo],
    ) -> Result<(), CompileError> {
        if templated.len() != actual.len() {
            return Err(CompileError::new(
                DiagnosticCode::InferenceFailure,
                format!(
                    "`{}` takes {} argument(s) but {} were given",
                    self.name,
                    templated.len(),
                    actual.len()
                ),
            ));
        }
        let kinds: HashMap<&str, TemplateParamKind> = params
            .iter()
            .map(|p| (p.name.as_str(), p.kind))
            .collect();
        for (templated, actual) in templated.iter().zip(actual) {
            self.infer_one(&kinds, templated, actual)?;
        }
        Ok(())
    }

    fn infer_one(
        &mut self,
        kinds: &HashMap<&str, TemplateParamKind>,
        templated: &TypeInfo,
        actual: &TypeInfo,
    ) -> Result<(), CompileError> {
        if templated.kind == TypeKind::Custom
            && kinds.get(templated.name.as_str()) == Some(&TemplateParamKind::Typename)
            && !self.bindings.contains_key(&templated.name)
        {
            // Bind without the call site's qualifiers.
            let mut bound = actual.clone();
            bound.qualifiers = Default::default();
            self.bindings
                .insert(templated.name.clone(), TemplateArg::Typename(bound));
        }

        if templated.template_args.len() > actual.template_args.len() {
            return Err(CompileError::new(
                DiagnosticCode::InferenceFailure,
                format!(
                    "argument type `{}` does not match the templated parameter `{}` of `{}`",
                    actual, templated, self.name
                ),
            ));
        }

        for (templated_arg, actual_arg) in
            templated.template_args.iter().zip(&actual.template_args)
        {
            match (templated_arg, actual_arg) {
                (TemplateArg::Typename(t), TemplateArg::Typename(a)) => {
                    // An identifier in argument position may name an int
                    // parameter; it parses as a custom typename.
                    if t.kind == TypeKind::Custom
                        && kinds.get(t.name.as_str()) == Some(&TemplateParamKind::Int)
                    {
                        continue;
                    }
                    self.infer_one(kinds, t, a)?;
                }
                (TemplateArg::Typename(t), TemplateArg::Int(v)) => {
                    if t.kind == TypeKind::Custom
                        && kinds.get(t.name.as_str()) == Some(&TemplateParamKind::Int)
                        && !self.bindings.contains_key(&t.name)
                    {
                        self.bindings.insert(t.name.clone(), TemplateArg::Int(*v));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Phase 3: every parameter must be bound.
    pub fn check(&self, params: &[TemplateParam]) -> Result<(), CompileError> {
        for param in params {
            if !self.bindings.contains_key(&param.name) {
                return Err(CompileError::new(
                    DiagnosticCode::MissingTemplateArg,
                    format!(
                        "missing template parameter `{}` in `{}`",
                        param.name, self.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Stable monomorphised symbol: `_<arg>` per parameter in declaration
    /// order.
    pub fn mangle(&self, params: &[TemplateParam]) -> String {
        let mut mangled = self.name.clone();
        for param in params {
            mangled.push('_');
            if let Some(binding) = self.bindings.get(&param.name) {
                mangled.push_str(&binding.mangle());
            }
        }
        mangled
    }

    /// Substitute bindings into a templated type tree.
    pub fn resolve_type(&self, info: &TypeInfo) -> Result<TypeInfo, CompileError> {
        let mut resolved = info.clone();

        if info.kind == TypeKind::Custom {
            if let Some(binding) = self.bindings.get(&info.name) {
                let TemplateArg::Typename(bound) = binding else {
                    return Err(CompileError::new(
                        DiagnosticCode::TemplateArgKindMismatch,
                        format!("template parameter `{}` is not a typename", info.name),
                    ));
                };
                resolved.kind = bound.kind;
                resolved.name = bound.name.clone();
                resolved.template_args = bound.template_args.clone();
                // The use site's qualifiers stay in effect.
            }
        }

        let args = std::mem::take(&mut resolved.template_args);
        resolved.template_args = args
            .into_iter()
            .map(|arg| self.resolve_template_arg(arg))
            .collect::<Result<_, _>>()?;

        Ok(resolved)
    }

    fn resolve_template_arg(&self, arg: TemplateArg) -> Result<TemplateArg, CompileError> {
        match arg {
            TemplateArg::Typename(info) => {
                // `N` in `array<T, N>` parses as a typename; an int binding
                // turns it back into a constant.
                if info.kind == TypeKind::Custom && info.template_args.is_empty() {
                    if let Some(TemplateArg::Int(value)) = self.bindings.get(&info.name) {
                        return Ok(TemplateArg::Int(*value));
                    }
                }
                Ok(TemplateArg::Typename(self.resolve_type(&info)?))
            }
            arg => Ok(arg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcl_ast::TemplateParamKind;

    fn typename_param(name: &str) -> TemplateParam {
        TemplateParam {
            name: name.to_string(),
            kind: TemplateParamKind::Typename,
        }
    }

    fn int_param(name: &str) -> TemplateParam {
        TemplateParam {
            name: name.to_string(),
            kind: TemplateParamKind::Int,
        }
    }

    #[test]
    fn explicit_mapping_and_mangling() {
        let params = vec![typename_param("T"), int_param("N")];
        let mut mapper = TemplateArgumentMapper::new("ring");
        mapper
            .map(
                &[
                    TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
                    TemplateArg::Int(8),
                ],
                &params,
            )
            .expect("map");
        mapper.check(&params).expect("check");
        assert_eq!(mapper.mangle(&params), "ring_float_8");
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let params = vec![int_param("N")];
        let mut mapper = TemplateArgumentMapper::new("ring");
        let err = mapper
            .map(
                &[TemplateArg::Typename(TypeInfo::simple(TypeKind::Float))],
                &params,
            )
            .unwrap_err();
        assert_eq!(err.code, DiagnosticCode::TemplateArgKindMismatch);
    }

    #[test]
    fn infers_from_actual_argument_types() {
        let params = vec![typename_param("T")];
        let mut mapper = TemplateArgumentMapper::new("max");
        let templated = vec![TypeInfo::custom("T"), TypeInfo::custom("T")];
        let actual = vec![
            TypeInfo::simple(TypeKind::Float),
            TypeInfo::simple(TypeKind::Float),
        ];
        mapper.infer(&params, &templated, &actual).expect("infer");
        mapper.check(&params).expect("all bound");
        assert_eq!(mapper.mangle(&params), "max_float");
    }

    #[test]
    fn infers_through_nested_template_arguments() {
        let params = vec![typename_param("T")];
        let mut mapper = TemplateArgumentMapper::new("sum");
        // span<T> against span<float>
        let templated = vec![TypeInfo::simple(TypeKind::Span)
            .with_args(vec![TemplateArg::Typename(TypeInfo::custom("T"))])];
        let actual = vec![TypeInfo::simple(TypeKind::Span)
            .with_args(vec![TemplateArg::Typename(TypeInfo::simple(TypeKind::Float))])];
        mapper.infer(&params, &templated, &actual).expect("infer");
        assert_eq!(mapper.mangle(&params), "sum_float");
    }

    #[test]
    fn missing_parameter_is_reported() {
        let params = vec![typename_param("T"), typename_param("U")];
        let mut mapper = TemplateArgumentMapper::new("pair");
        mapper
            .map(
                &[TemplateArg::Typename(TypeInfo::simple(TypeKind::Int))],
                &params,
            )
            .expect("map");
        let err = mapper.check(&params).unwrap_err();
        assert_eq!(err.code, DiagnosticCode::MissingTemplateArg);
        assert!(err.message.contains("`U`"));
    }

    #[test]
    fn substitutes_bindings_into_type_trees() {
        let params = vec![typename_param("T"), int_param("N")];
        let mut mapper = TemplateArgumentMapper::new("buf");
        mapper
            .map(
                &[
                    TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
                    TemplateArg::Int(4),
                ],
                &params,
            )
            .expect("map");

        // array<T, N> -> array<float, 4>
        let templated = TypeInfo::simple(TypeKind::Array).with_args(vec![
            TemplateArg::Typename(TypeInfo::custom("T")),
            TemplateArg::Typename(TypeInfo::custom("N")),
        ]);
        let resolved = mapper.resolve_type(&templated).expect("resolve");
        assert_eq!(
            resolved.template_args,
            vec![
                TemplateArg::Typename(TypeInfo::simple(TypeKind::Float)),
                TemplateArg::Int(4),
            ]
        );
    }
}
