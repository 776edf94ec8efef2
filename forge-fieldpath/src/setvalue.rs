use crate::{ApplyError, Index, QueryOp};
use serde_json::{Map, Value};

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn apply(indexes: &[Index], document: &mut Value, value: Value) -> Result<(), ApplyError> {
    walk(indexes, 0, document, value)
}

pub(crate) fn get<'a>(indexes: &[Index], mut current: &'a Value) -> Option<&'a Value> {
    for index in indexes {
        current = match index {
            Index::MapKey(key) => current.as_object()?.get(key)?,
            Index::ArrayIndex(i) => current.as_array()?.get(*i)?,
            Index::Query(query) => current.as_array()?.iter().find(|element| {
                element
                    .as_object()
                    .and_then(|m| m.get(&query.key))
                    .and_then(Value::as_str)
                    .map(|v| v == query.argument)
                    .unwrap_or(false)
            })?,
        };
    }
    Some(current)
}

fn walk(indexes: &[Index], step: usize, current: &mut Value, value: Value) -> Result<(), ApplyError> {
    let last = step + 1 == indexes.len();
    match &indexes[step] {
        Index::MapKey(key) => {
            if !current.is_object() {
                if matches!(current, Value::Null) {
                    *current = Value::Object(Map::new());
                } else {
                    return Err(ApplyError::ExpectedMapping {
                        step,
                        found: type_name(current),
                    });
                }
            }
            let obj = current.as_object_mut().expect("checked above");
            if last {
                obj.insert(key.clone(), value);
                return Ok(());
            }
            let next_array_len = match indexes.get(step + 1) {
                Some(Index::ArrayIndex(n)) => Some(*n + 1),
                _ => None,
            };
            let slot = obj.entry(key.clone()).or_insert_with(|| match next_array_len {
                Some(len) => Value::Array(vec![Value::Null; len]),
                None => Value::Object(Map::new()),
            });
            walk(indexes, step + 1, slot, value)
        }
        Index::ArrayIndex(index) => {
            if !current.is_array() {
                return Err(ApplyError::ExpectedSequence {
                    step,
                    found: type_name(current),
                });
            }
            let arr = current.as_array_mut().expect("checked above");
            if *index >= arr.len() {
                return Err(ApplyError::IndexOutOfRange {
                    index: *index,
                    len: arr.len(),
                });
            }
            if last {
                arr[*index] = value;
                return Ok(());
            }
            walk(indexes, step + 1, &mut arr[*index], value)
        }
        Index::Query(query) => {
            if !current.is_array() {
                return Err(ApplyError::ExpectedSequence {
                    step,
                    found: type_name(current),
                });
            }
            let arr = current.as_array_mut().expect("checked above");
            let found = arr.iter_mut().find(|element| {
                element
                    .as_object()
                    .and_then(|m| m.get(&query.key))
                    .and_then(Value::as_str)
                    .map(|v| v == query.argument)
                    .unwrap_or(false)
            });
            match found {
                Some(element) => {
                    if last {
                        *element = value;
                        Ok(())
                    } else {
                        walk(indexes, step + 1, element, value)
                    }
                }
                None => Err(ApplyError::NoMatch {
                    key: query.key.clone(),
                    op: QueryOp::Eq,
                    argument: query.argument.clone(),
                }),
            }
        }
    }
}
