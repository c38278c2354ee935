//! halo-sql-script：把 struct/切片编译为 T-SQL 表变量脚本，并提供有界并发分发器。

pub mod classify;
pub mod dispatch;
pub mod encode;
pub mod known_types;
pub mod macros;
pub mod script;
mod string_builder;
pub mod value;
pub mod valuer;

pub use crate::classify::{Classified, classify, is_nested_struct, sql_type_of};
pub use crate::dispatch::{
    DispatchError, DispatchResult, run_bounded, run_bounded_indexed, run_first,
    run_func_threads, run_sync, run_value_threads,
};
pub use crate::encode::{encode, format_datetime, safe, safe_column_name};
pub use crate::known_types::{
    KnownClass, KnownType, KnownTypeRegistry, default_known_types, set_known_types,
    set_known_types_scoped,
};
pub use crate::script::{ScriptCompiler, ScriptError, to_sql_script};
pub use crate::value::{FieldDecl, FieldKind, FieldValue, OpaqueType, ScriptType, Shape, ValueNode};
pub use crate::valuer::{FnValuer, KnownValuer, ValuerError};

/// 推荐的便捷命名空间：允许 `use halo_space::sqlscript::{...}` 形式导入。
pub mod sqlscript {
    pub use crate::*;
}
