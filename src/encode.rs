//! 值编码：把单个标量渲染为 T-SQL 字面量。
//!
//! 安全警告：字符串字面量只依赖单引号加倍这一条转义规则；所有文本输出路径都必须经过 [`safe`]。

use crate::known_types::{KnownClass, KnownTypeRegistry};
use crate::script::ScriptError;
use crate::value::{FieldKind, ValueNode};
use std::any::Any;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

/// `YYYY-MM-DD HH:MM:SS`
pub const DATE_LONG: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
/// `YYYY-MM-DD`
pub const DATE_SHORT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// `YYYY-MM`
pub const MONTH_YEAR: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]");
/// `YYYY`
pub const YEAR: &[BorrowedFormatItem<'static>] = format_description!("[year]");

/// 转义 SQL 字符串值：`'` -> `''`。
pub fn safe(value: &str) -> String {
    value.replace('\'', "''")
}

/// 清洗列名：只保留 `[A-Za-z0-9_$]`。
pub fn safe_column_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

pub fn format_datetime(dt: time::PrimitiveDateTime) -> Result<String, time::error::Format> {
    dt.format(DATE_LONG)
}

/// 编码一个字段值。`field` 仅用于错误信息。
pub fn encode(
    field: &str,
    kind: &FieldKind,
    node: &ValueNode<'_>,
    registry: &KnownTypeRegistry,
) -> Result<String, ScriptError> {
    let mut out = String::new();
    encode_into(&mut out, field, kind, node, registry)?;
    Ok(out)
}

fn encode_into(
    out: &mut String,
    field: &str,
    kind: &FieldKind,
    node: &ValueNode<'_>,
    registry: &KnownTypeRegistry,
) -> Result<(), ScriptError> {
    match (kind, node) {
        (_, ValueNode::Null) | (FieldKind::Pointer(_), ValueNode::Pointer(None)) => {
            out.push_str("null")
        }
        (FieldKind::Pointer(inner), ValueNode::Pointer(Some(v))) => {
            encode_into(out, field, inner, v, registry)?
        }
        (FieldKind::Bool, v) => match truthy(v) {
            Some(b) => out.push_str(if b { "1" } else { "0" }),
            None => return Err(mismatch(field, kind, node)),
        },
        (FieldKind::SmallInt | FieldKind::Int | FieldKind::BigInt, ValueNode::Int(n)) => {
            out.push_str(&n.to_string())
        }
        (FieldKind::SmallInt | FieldKind::Int | FieldKind::BigInt, ValueNode::UInt(n)) => {
            out.push_str(&n.to_string())
        }
        (FieldKind::Float, ValueNode::F32(n)) => {
            if !n.is_finite() {
                return Err(ScriptError::NonFiniteNumber {
                    field: field.to_string(),
                });
            }
            out.push_str(&n.to_string());
        }
        (FieldKind::Float, ValueNode::F64(n)) => {
            if !n.is_finite() {
                return Err(ScriptError::NonFiniteNumber {
                    field: field.to_string(),
                });
            }
            out.push_str(&n.to_string());
        }
        (FieldKind::Text, ValueNode::Text(s)) => {
            out.push_str("N'");
            out.push_str(&safe(s));
            out.push('\'');
        }
        (FieldKind::Opaque(o), ValueNode::Opaque(v)) => {
            let v: &dyn Any = *v;
            if Any::type_id(v) != o.type_id {
                return Err(mismatch(field, kind, node));
            }
            let Some(known) = registry.lookup(o.type_id) else {
                return Err(ScriptError::UnsupportedFieldType {
                    field: field.to_string(),
                    type_name: o.type_name.to_string(),
                });
            };
            let text = known.render(v)?;
            match known.class {
                KnownClass::DateTime | KnownClass::Uuid => {
                    out.push('\'');
                    out.push_str(&safe(&text));
                    out.push('\'');
                }
            }
        }
        (FieldKind::Nested(_) | FieldKind::Collection(_) | FieldKind::Unsupported(_), _) => {
            return Err(ScriptError::UnsupportedFieldType {
                field: field.to_string(),
                type_name: kind.label(),
            });
        }
        _ => return Err(mismatch(field, kind, node)),
    }
    Ok(())
}

/// `true`/`"true"`/`1`/`"1"`/`1.0` 为真，其余为假；非布尔可解释的值返回 `None`。
fn truthy(node: &ValueNode<'_>) -> Option<bool> {
    match node {
        ValueNode::Bool(b) => Some(*b),
        ValueNode::Int(n) => Some(*n == 1),
        ValueNode::UInt(n) => Some(*n == 1),
        ValueNode::F32(n) => Some(*n == 1.0),
        ValueNode::F64(n) => Some(*n == 1.0),
        ValueNode::Text(s) => Some(s == "true" || s == "1"),
        _ => None,
    }
}

fn mismatch(field: &str, kind: &FieldKind, node: &ValueNode<'_>) -> ScriptError {
    ScriptError::TypeMismatch {
        field: field.to_string(),
        expected: kind.label(),
        actual: node.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScriptType;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;

    fn enc<T: ScriptType>(v: &T) -> Result<String, ScriptError> {
        encode("f", &T::field_kind(), &v.to_node(), &KnownTypeRegistry::standard())
    }

    #[test]
    fn safe_doubles_quotes() {
        assert_eq!(safe("O'Brien"), "O''Brien");
        assert_eq!(safe("''"), "''''");
        assert_eq!(safe("plain"), "plain");
    }

    #[test]
    fn safe_column_name_strips_invalid_chars() {
        assert_eq!(safe_column_name("Na me-1$_x"), "Name1$_x");
        assert_eq!(safe_column_name("名字ID"), "ID");
    }

    #[test]
    fn text_is_n_prefixed_and_escaped() {
        assert_eq!(enc(&"O'Brien".to_string()).unwrap(), "N'O''Brien'");
        assert_eq!(enc(&"'; drop table x; --".to_string()).unwrap(), "N'''; drop table x; --'");
        assert_eq!(enc(&'\'').unwrap(), "N''''");
    }

    #[test]
    fn escaped_payload_quotes_come_in_pairs() {
        for s in ["'", "a'b'c", "''x'''", "no quotes", "'start", "end'"] {
            let out = enc(&s.to_string()).unwrap();
            let payload = &out[2..out.len() - 1];
            assert_eq!(payload.matches('\'').count() % 2, 0, "{out}");
            assert!(!payload.replace("''", "").contains('\''), "{out}");
        }
    }

    #[test]
    fn numbers_and_bools() {
        assert_eq!(enc(&true).unwrap(), "1");
        assert_eq!(enc(&false).unwrap(), "0");
        assert_eq!(enc(&-12_i8).unwrap(), "-12");
        assert_eq!(enc(&u64::MAX).unwrap(), "18446744073709551615");
        assert_eq!(enc(&1.5_f64).unwrap(), "1.5");
        assert_eq!(enc(&0.1_f32).unwrap(), "0.1");
        assert_eq!(enc(&1e21_f64).unwrap(), "1000000000000000000000");
    }

    #[test]
    fn bool_accepts_true_like_inputs() {
        let reg = KnownTypeRegistry::new();
        let cases = vec![
            (ValueNode::Int(1), "1"),
            (ValueNode::UInt(0), "0"),
            (ValueNode::Text("true".into()), "1"),
            (ValueNode::Text("1".into()), "1"),
            (ValueNode::Text("yes".into()), "0"),
            (ValueNode::F64(1.0), "1"),
        ];
        for (node, expected) in cases {
            assert_eq!(encode("f", &FieldKind::Bool, &node, &reg).unwrap(), expected);
        }
    }

    #[test]
    fn non_finite_floats_fail() {
        assert_eq!(
            enc(&f64::NAN),
            Err(ScriptError::NonFiniteNumber {
                field: "f".to_string()
            })
        );
    }

    #[test]
    fn options_render_null_or_pointee() {
        assert_eq!(enc(&None::<String>).unwrap(), "null");
        assert_eq!(enc(&Some("x".to_string())).unwrap(), "N'x'");
        assert_eq!(enc(&Some(Some(3_i32))).unwrap(), "3");
    }

    #[test]
    fn datetime_uses_fixed_layout() {
        let dt = datetime!(2023-01-02 03:04:05.678 UTC);
        assert_eq!(enc(&dt).unwrap(), "'2023-01-02 03:04:05'");
        assert_eq!(enc(&Some(dt)).unwrap(), "'2023-01-02 03:04:05'");
    }

    #[test]
    fn unregistered_opaque_is_unsupported() {
        let dt = datetime!(2023-01-02 03:04:05 UTC);
        let err = encode(
            "Created",
            &time::OffsetDateTime::field_kind(),
            &dt.to_node(),
            &KnownTypeRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ScriptError::UnsupportedFieldType { ref field, .. } if field == "Created"));
    }

    #[test]
    fn mismatched_value_fails_fast() {
        let err = encode(
            "Age",
            &FieldKind::Int,
            &ValueNode::Text("12".into()),
            &KnownTypeRegistry::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ScriptError::TypeMismatch {
                field: "Age".to_string(),
                expected: "int".to_string(),
                actual: "text".to_string(),
            }
        );
    }
}
