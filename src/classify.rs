//! 类型分类：决定字段的 SQL 列类型，以及是否需要递归展开。

use crate::known_types::KnownTypeRegistry;
use crate::value::{FieldKind, Shape};

/// 字段在脚本中的角色。
#[derive(Debug, Clone)]
pub enum Classified {
    /// 标量列。
    Scalar(&'static str),
    /// 内嵌记录：列被展开进外层表。
    Nested(Shape),
    /// 记录集合：生成以字段名命名的独立表。
    Collection(Shape),
    Unsupported(String),
}

/// 标量字段的 SQL 类型；`Option<T>` 对类型透明。非标量或未注册的不透明类型返回 `None`。
pub fn sql_type_of(kind: &FieldKind, registry: &KnownTypeRegistry) -> Option<&'static str> {
    match kind {
        FieldKind::Bool => Some("bit"),
        FieldKind::SmallInt => Some("smallint"),
        FieldKind::Int => Some("int"),
        FieldKind::BigInt => Some("bigint"),
        FieldKind::Float => Some("numeric(38,12)"),
        FieldKind::Text => Some("nvarchar(max)"),
        FieldKind::Pointer(inner) => sql_type_of(inner, registry),
        FieldKind::Opaque(o) => registry.lookup(o.type_id).map(|k| k.class.sql_type()),
        FieldKind::Nested(_) | FieldKind::Collection(_) | FieldKind::Unsupported(_) => None,
    }
}

/// 是否为需要递归展开的记录类型（含其 `Option` 形式）。
///
/// 已注册的日期时间/UUID 类型是 `Opaque`，永远不会被视为记录。
pub fn is_nested_struct(kind: &FieldKind) -> bool {
    matches!(kind.unwrap_pointer(), FieldKind::Nested(_))
}

pub fn classify(kind: &FieldKind, registry: &KnownTypeRegistry) -> Classified {
    match kind.unwrap_pointer() {
        FieldKind::Nested(shape) => Classified::Nested(*shape),
        FieldKind::Collection(elem) => match elem.unwrap_pointer() {
            FieldKind::Nested(shape) => Classified::Collection(*shape),
            _ => Classified::Unsupported(kind.label()),
        },
        other => match sql_type_of(other, registry) {
            Some(sql_type) => Classified::Scalar(sql_type),
            None => Classified::Unsupported(other.label()),
        },
    }
}
