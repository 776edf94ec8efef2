use serde_json::Value;
use thiserror::Error;

use forge_resource::{Resource, VisitError, Visitor};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script failed to compile")]
    Compile(#[from] Box<rhai::ParseError>),
    #[error("script does not export a `mutate` function")]
    MissingMutate,
    #[error("script runtime error")]
    Runtime(#[from] Box<rhai::EvalAltResult>),
}

/// Evaluates a small Rhai program that must define a `mutate(obj, config)`
/// function, and calls it with the resource's document and a frozen
/// configuration value. Any compile, lookup, or runtime error propagates.
pub struct Script {
    source: String,
    config: Value,
}

impl Script {
    pub fn new(source: impl Into<String>, config: Value) -> Self {
        Script {
            source: source.into(),
            config,
        }
    }
}

impl Visitor for Script {
    fn visit(&mut self, resource: &mut Resource) -> Result<(), VisitError> {
        run(&self.source, &self.config, resource.document())
            .map(|document| {
                *resource = Resource::new(document).unwrap_or_else(|_| resource.clone());
            })
            .map_err(|e| VisitError::Other(e.to_string()))
    }
}

fn run(source: &str, config: &Value, document: &Value) -> Result<Value, ScriptError> {
    let engine = rhai::Engine::new();
    let ast = engine.compile(source).map_err(Box::new)?;
    if !ast.iter_functions().any(|f| f.name == "mutate") {
        return Err(ScriptError::MissingMutate);
    }
    let obj: rhai::Dynamic = rhai::serde::to_dynamic(document)?;
    let conf: rhai::Dynamic = rhai::serde::to_dynamic(config)?;
    let result: rhai::Dynamic = engine.call_fn(&mut rhai::Scope::new(), &ast, "mutate", (obj, conf))?;
    Ok(rhai::serde::from_dynamic(&result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod() -> Resource {
        Resource::new(json!({
            "apiVersion": "v1", "kind": "Pod", "metadata": {"name": "x"},
        }))
        .unwrap()
    }

    #[test]
    fn mutate_function_can_add_a_label() {
        let mut r = pod();
        let source = r#"
            fn mutate(obj, config) {
                obj.metadata.labels = #{ "team": config.team };
                obj
            }
        "#;
        Script::new(source, json!({"team": "platform"})).visit(&mut r).unwrap();
        assert_eq!(r.labels().get("team").unwrap(), "platform");
    }

    #[test]
    fn missing_mutate_function_is_an_error() {
        let mut r = pod();
        let err = Script::new("fn other(obj, config) { obj }", json!({})).visit(&mut r).unwrap_err();
        assert!(matches!(err, VisitError::Other(_)));
    }
}
