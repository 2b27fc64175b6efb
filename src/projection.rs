//! フィールド値の平坦化
//!
//! 入れ子になったJSON値と [`Projection`] から、1列分の文字列を作る。
//! 数値の整形やエスケープは行わない（値中の `,` や `;` もそのまま出力する）。

use serde_json::{Map, Value};
use thiserror::Error;

use crate::field_rule::Projection;

const CASCADE_SEPARATOR: &str = " -> ";
const MULTI_SEPARATOR: &str = ",";

/// 宣言された shape / encoding と実際の値が合わない場合のエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("expected {expected}, found {found}")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing key '{key}'")]
    MissingKey { key: String },
}

/// 1フィールド分の生の値を文字列へ変換する
///
/// `None` と JSON の `null` はどちらも「値なし」として空文字列になる。
pub fn project(projection: &Projection, raw: Option<&Value>) -> Result<String, ProjectionError> {
    let raw = match raw {
        None | Some(Value::Null) => return Ok(String::new()),
        Some(value) => value,
    };

    match projection {
        Projection::SinglePlain => scalar_text(raw),
        Projection::SingleJson { key } => {
            let object = expect_object(raw)?;
            scalar_text(lookup(object, key)?)
        }
        Projection::MultiPlain => {
            let items = expect_array(raw)?;
            join(items.iter().map(scalar_text))
        }
        Projection::MultiJson { key } => {
            let items = expect_array(raw)?;
            join(
                items
                    .iter()
                    .map(|item| expect_object(item).and_then(|o| lookup(o, key)).and_then(scalar_text)),
            )
        }
        Projection::Cascade { key } => cascade(raw, key),
    }
}

fn cascade(raw: &Value, key: &str) -> Result<String, ProjectionError> {
    let object = expect_object(raw)?;
    let parent = scalar_text(lookup(object, key)?)?;
    if parent.is_empty() {
        return Ok(parent);
    }

    let child = match object.get("child") {
        None | Some(Value::Null) => return Ok(parent),
        Some(child) => expect_object(child)?,
    };

    match child.get("value") {
        None | Some(Value::Null) => Ok(parent),
        Some(value) => Ok(format!("{}{}{}", parent, CASCADE_SEPARATOR, scalar_text(value)?)),
    }
}

/// スカラー値の文字列表現。数値はJSON表記のまま
fn scalar_text(value: &Value) -> Result<String, ProjectionError> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ProjectionError::ShapeMismatch {
            expected: "scalar",
            found: kind_of(other),
        }),
    }
}

fn expect_object(value: &Value) -> Result<&Map<String, Value>, ProjectionError> {
    value.as_object().ok_or(ProjectionError::ShapeMismatch {
        expected: "object",
        found: kind_of(value),
    })
}

fn expect_array(value: &Value) -> Result<&Vec<Value>, ProjectionError> {
    value.as_array().ok_or(ProjectionError::ShapeMismatch {
        expected: "array",
        found: kind_of(value),
    })
}

fn lookup<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value, ProjectionError> {
    object.get(key).ok_or_else(|| ProjectionError::MissingKey {
        key: key.to_string(),
    })
}

fn join<I>(parts: I) -> Result<String, ProjectionError>
where
    I: Iterator<Item = Result<String, ProjectionError>>,
{
    Ok(parts.collect::<Result<Vec<_>, _>>()?.join(MULTI_SEPARATOR))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
