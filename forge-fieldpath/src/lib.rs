//! A compact expression language for addressing a node inside a nested
//! JSON-like document: `foo.bar[0].baz`, `foo['example.com/x']`,
//! `foo[name=main]`.
//!
//! [`FieldPath`] parses such an expression into an ordered list of
//! [`Index`]es, and [`FieldPath::set_value`] walks a [`serde_json::Value`]
//! document to assign a value at the addressed location.

mod lexer;
mod setvalue;

pub use lexer::{Index, Query, QueryOp};

use serde_json::Value;
use thiserror::Error;

/// Errors produced while parsing a field-path expression.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SyntaxError {
    #[error("quote {quote:?} at position {pos} is never closed")]
    UnterminatedQuote { quote: char, pos: usize },
    #[error("opening bracket at position {pos} is never closed")]
    UnterminatedBracket { pos: usize },
    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedCharacter { ch: char, pos: usize },
    #[error("unexpected end of input, expected more characters after position {pos}")]
    UnexpectedEof { pos: usize },
}

/// Errors produced while applying [`FieldPath::set_value`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ApplyError {
    #[error("expected a mapping at step {step}, found {found}")]
    ExpectedMapping { step: usize, found: &'static str },
    #[error("expected a sequence at step {step}, found {found}")]
    ExpectedSequence { step: usize, found: &'static str },
    #[error("array index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("invalid array index {index:?}")]
    InvalidArrayIndex { index: String },
    #[error("no match found for query {key}{op}{argument}")]
    NoMatch {
        key: String,
        op: QueryOp,
        argument: String,
    },
}

/// An ordered list of [`Index`]es addressing a node inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    indexes: Vec<Index>,
    source: String,
}

impl FieldPath {
    /// Parses a field-path expression.
    ///
    /// # Errors
    /// Returns a [`SyntaxError`] for malformed input, carrying the
    /// offending character and its byte position.
    pub fn parse(source: impl Into<String>) -> Result<Self, SyntaxError> {
        let source = source.into();
        let indexes = lexer::lex(&source)?;
        Ok(Self { indexes, source })
    }

    /// The list of indexes this path was parsed into.
    pub fn indexes(&self) -> &[Index] {
        &self.indexes
    }

    /// The original expression this path was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Sets `value` at the node addressed by this path inside `document`.
    ///
    /// Intermediate mappings or sequences are created on demand. On
    /// failure `document` is left unchanged: the walk runs against a clone
    /// which is only swapped in on success.
    ///
    /// # Errors
    /// Returns an [`ApplyError`] if the document's shape at any step
    /// doesn't match what the path expects (e.g. indexing into a mapping
    /// with an array index), if a `Query` index matches no element, or if
    /// an `ArrayIndex` falls outside the existing sequence (this
    /// implementation does not grow sequences past an `ArrayIndex`).
    pub fn set_value(&self, document: &mut Value, value: Value) -> Result<(), ApplyError> {
        if self.indexes.is_empty() {
            return Ok(());
        }
        let mut scratch = document.clone();
        setvalue::apply(&self.indexes, &mut scratch, value)?;
        *document = scratch;
        Ok(())
    }

    /// Reads the value at the node addressed by this path, or `None` if any
    /// step doesn't exist or doesn't match the document's shape.
    pub fn get_value<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        setvalue::get(&self.indexes, document)
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("foo.bar", &[Index::MapKey("foo".into()), Index::MapKey("bar".into())])]
    #[case("foo[0]", &[Index::MapKey("foo".into()), Index::ArrayIndex(0)])]
    #[case("foo[bar]", &[Index::MapKey("foo".into()), Index::MapKey("bar".into())])]
    #[case("foo['example.com/x']", &[Index::MapKey("foo".into()), Index::MapKey("example.com/x".into())])]
    #[case("foo[\"x\"]", &[Index::MapKey("foo".into()), Index::MapKey("x".into())])]
    fn parses_documented_examples(#[case] input: &str, #[case] expected: &[Index]) {
        let fp = FieldPath::parse(input).unwrap();
        assert_eq!(fp.indexes(), expected);
    }

    #[test]
    fn parses_query_selectors() {
        let fp = FieldPath::parse("foo[name=main]").unwrap();
        assert_eq!(
            fp.indexes(),
            &[
                Index::MapKey("foo".into()),
                Index::Query(Query {
                    key: "name".into(),
                    op: QueryOp::Eq,
                    argument: "main".into(),
                })
            ]
        );
    }

    #[test]
    fn parses_quoted_query_argument() {
        let fp = FieldPath::parse("foo[name='main']").unwrap();
        assert_eq!(
            fp.indexes()[1],
            Index::Query(Query {
                key: "name".into(),
                op: QueryOp::Eq,
                argument: "main".into(),
            })
        );
    }

    #[test]
    fn rejects_unterminated_quote() {
        let err = FieldPath::parse("foo['bar").unwrap_err();
        assert_eq!(
            err,
            SyntaxError::UnterminatedQuote {
                quote: '\'',
                pos: 4
            }
        );
    }

    #[test]
    fn rejects_unterminated_bracket() {
        let err = FieldPath::parse("foo[bar").unwrap_err();
        assert_eq!(err, SyntaxError::UnexpectedEof { pos: 7 });
    }

    #[test]
    fn rejects_bare_closing_bracket() {
        let err = FieldPath::parse("foo]").unwrap_err();
        assert_eq!(err, SyntaxError::UnexpectedCharacter { ch: ']', pos: 3 });
    }

    #[test]
    fn set_value_creates_intermediate_mappings() {
        let fp = FieldPath::parse("foo.bar").unwrap();
        let mut doc = json!({});
        fp.set_value(&mut doc, json!("baz")).unwrap();
        assert_eq!(doc, json!({"foo": {"bar": "baz"}}));
    }

    #[test]
    fn set_value_creates_intermediate_sequence_when_next_is_array_index() {
        let fp = FieldPath::parse("foo[0]").unwrap();
        let mut doc = json!({});
        fp.set_value(&mut doc, json!("x")).unwrap();
        assert_eq!(doc, json!({"foo": ["x"]}));
    }

    #[test]
    fn set_value_does_not_partially_apply_on_failure() {
        let fp = FieldPath::parse("foo[name=missing].bar").unwrap();
        let mut doc = json!({"foo": [{"name": "main"}]});
        let before = doc.clone();
        let err = fp.set_value(&mut doc, json!("x")).unwrap_err();
        assert!(matches!(err, ApplyError::NoMatch { .. }));
        assert_eq!(doc, before);
    }

    #[test]
    fn set_value_query_selects_matching_element() {
        let fp = FieldPath::parse("spec.containers[name=app].image").unwrap();
        let mut doc = json!({"spec": {"containers": [
            {"name": "sidecar", "image": "old"},
            {"name": "app", "image": "old"},
        ]}});
        fp.set_value(&mut doc, json!("new")).unwrap();
        assert_eq!(
            doc,
            json!({"spec": {"containers": [
                {"name": "sidecar", "image": "old"},
                {"name": "app", "image": "new"},
            ]}})
        );
    }

    #[test]
    fn get_value_reads_nested_and_queried_values() {
        let doc = json!({"spec": {"containers": [
            {"name": "sidecar", "image": "old"},
            {"name": "app", "image": "new"},
        ]}});
        let fp = FieldPath::parse("spec.containers[name=app].image").unwrap();
        assert_eq!(fp.get_value(&doc), Some(&json!("new")));
        let missing = FieldPath::parse("spec.containers[name=absent].image").unwrap();
        assert_eq!(missing.get_value(&doc), None);
    }

    #[test]
    fn set_value_rejects_array_index_out_of_range() {
        let fp = FieldPath::parse("foo[2]").unwrap();
        let mut doc = json!({"foo": ["a"]});
        let err = fp.set_value(&mut doc, json!("x")).unwrap_err();
        assert_eq!(err, ApplyError::IndexOutOfRange { index: 2, len: 1 });
    }
}
