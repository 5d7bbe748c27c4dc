// Scorch Script Context
// What the host exposes to a script: parameters, return type and callable functions

use crate::types::Type;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A value the host passes into every invocation (e.g. `_score`, `doc`, `params`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// Signature of a host function callable from scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub params: Vec<Type>,
    pub returns: Type,
}

impl FunctionSignature {
    pub fn new(params: Vec<Type>, returns: Type) -> Self {
        Self { params, returns }
    }
}

/// Host-side description of the unit being compiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptContext {
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub functions: FxHashMap<String, FunctionSignature>,
}

impl Default for ScriptContext {
    fn default() -> Self {
        Self {
            params: Vec::new(),
            return_type: Type::Def,
            functions: FxHashMap::default(),
        }
    }
}

impl ScriptContext {
    pub fn new(return_type: Type) -> Self {
        Self {
            return_type,
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.params.push(Parameter {
            name: name.into(),
            ty,
        });
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, signature: FunctionSignature) -> Self {
        self.functions.insert(name.into(), signature);
        self
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let context = ScriptContext::new(Type::Double)
            .with_param("_score", Type::Double)
            .with_param("doc", Type::Def)
            .with_function("log", FunctionSignature::new(vec![Type::Def], Type::Void));
        assert_eq!(context.params.len(), 2);
        assert_eq!(context.params[1].name, "doc");
        assert_eq!(context.function("log").map(|f| f.returns), Some(Type::Void));
        assert!(context.function("print").is_none());
    }

    #[test]
    fn test_deserialize_from_json() {
        let context: ScriptContext = serde_json::from_str(
            r#"{
                "params": [{"name": "_score", "type": "double"}],
                "return_type": "double",
                "functions": {"sqrt": {"params": ["double"], "returns": "double"}}
            }"#,
        )
        .unwrap();
        assert_eq!(context.return_type, Type::Double);
        assert_eq!(context.params[0].ty, Type::Double);
        assert_eq!(context.function("sqrt").unwrap().params, vec![Type::Double]);
    }
}
