use std::collections::BTreeMap;
use std::fs;

use forge_resource::{Resource, Tree, TreeError};
use serde_json::Value;

/// A plugin that produces a fresh [`Tree`] rather than mutating resources
/// already in one. Generators run after all mutations in a build and their
/// output is copied into the enclosing tree.
pub trait Generator {
    fn emit(&mut self) -> Result<Tree, GeneratorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("rendering template")]
    Render(#[from] handlebars::RenderError),
    #[error("decoding generated document stream")]
    Decode(#[from] serde_yaml::Error),
    #[error(transparent)]
    Resource(#[from] forge_resource::ResourceError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("reading template directory: {0}")]
    Io(#[from] std::io::Error),
}

fn parse_document_stream(stream: &str, tree: &mut Tree) -> Result<(), GeneratorError> {
    for document in serde_yaml::Deserializer::from_str(stream) {
        let value = Value::deserialize(document).map_err(GeneratorError::Decode)?;
        if value.is_null() {
            continue;
        }
        let resource = Resource::new(value)?;
        tree.insert(resource)?;
    }
    Ok(())
}

const SERVICE_TEMPLATE: &str = r#"---
apiVersion: v1
kind: Service
metadata:
  name: {{name}}
spec:
  selector:
    app: {{name}}
  ports:
    - port: 80
      targetPort: 8080
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: {{name}}
spec:
  selector:
    matchLabels:
      app: {{name}}
  template:
    metadata:
      labels:
        app: {{name}}
    spec:
      containers:
        - name: {{name}}
          image: {{image}}
"#;

/// Expands the engine's built-in Service+Deployment template with `{name,
/// image}` and parses the result into a fresh [`Tree`].
pub struct Service {
    pub name: String,
    pub image: String,
}

impl Generator for Service {
    fn emit(&mut self) -> Result<Tree, GeneratorError> {
        let mut handlebars = handlebars::Handlebars::new();
        handlebars.set_strict_mode(true);
        let rendered = handlebars.render_template(
            SERVICE_TEMPLATE,
            &serde_json::json!({"name": self.name, "image": self.image}),
        )?;
        let mut tree = Tree::new();
        parse_document_stream(&rendered, &mut tree)?;
        Ok(tree)
    }
}

/// Reads every template file in a directory, expands each against a shared
/// values map in strict mode (a missing key is an error), and parses the
/// concatenated output as a document stream.
pub struct Template {
    pub directory: std::path::PathBuf,
    pub values: BTreeMap<String, Value>,
}

impl Generator for Template {
    fn emit(&mut self) -> Result<Tree, GeneratorError> {
        let mut handlebars = handlebars::Handlebars::new();
        handlebars.set_strict_mode(true);

        let mut entries: Vec<_> = fs::read_dir(&self.directory)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|e| e.path().is_file())
            .collect();
        entries.sort_by_key(|e| e.path());

        let mut tree = Tree::new();
        for entry in entries {
            let source = fs::read_to_string(entry.path())?;
            let rendered = handlebars.render_template(&source, &self.values)?;
            parse_document_stream(&rendered, &mut tree)?;
        }
        Ok(tree)
    }
}

use serde::Deserialize;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_generator_emits_service_and_deployment() {
        let mut gen = Service { name: "web".into(), image: "web:1.0".into() };
        let mut tree = gen.emit().unwrap();
        let mut kinds = Vec::new();
        tree.visit(
            &mut (|r: &mut Resource| {
                kinds.push(r.kind());
                Ok(())
            }),
            &Default::default(),
        )
        .unwrap();
        kinds.sort();
        assert_eq!(kinds, vec!["Deployment".to_string(), "Service".to_string()]);
    }

    #[test]
    fn template_generator_errs_on_missing_value() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pod.yaml"),
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: {{name}}\n",
        )
        .unwrap();
        let mut gen = Template { directory: dir.path().to_path_buf(), values: BTreeMap::new() };
        assert!(gen.emit().is_err());
    }

    #[test]
    fn template_generator_expands_values() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("pod.yaml"),
            "apiVersion: v1\nkind: Pod\nmetadata:\n  name: {{name}}\n",
        )
        .unwrap();
        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::String("x".into()));
        let mut gen = Template { directory: dir.path().to_path_buf(), values };
        let mut tree = gen.emit().unwrap();
        let mut names = Vec::new();
        tree.visit(
            &mut (|r: &mut Resource| {
                names.push(r.name());
                Ok(())
            }),
            &Default::default(),
        )
        .unwrap();
        assert_eq!(names, vec!["x".to_string()]);
    }
}
