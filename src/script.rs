//! ScriptCompiler：把 struct / struct 切片编译为 T-SQL 表变量脚本。
//!
//! 输出由两部分组成，declare 全部位于 insert 之前：
//!
//! ```text
//! declare @$Model table ([ID] bigint,[Name] nvarchar(max))
//! insert into @$Model select 1,N'A''B'
//! ```
//!
//! - 集合字段生成独立的表，表名为字段名；每个元素一条 insert。
//! - 内嵌 struct 字段被展开为外层表的列。
//! - declare 与 insert 以相同的顺序和过滤规则遍历字段，保证列与值一一对应。
//! - 表名不做清洗，直接信任调用方与字段名；列名只保留 `[A-Za-z0-9_$]`。

use crate::classify::{Classified, classify};
use crate::encode::{encode, safe_column_name};
use crate::known_types::{KnownTypeRegistry, default_known_types};
use crate::string_builder::StringBuilder;
use crate::value::{ScriptType, Shape, ValueNode};
use crate::valuer::ValuerError;
use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    #[error("script unsupported field type: field `{field}` has type {type_name}")]
    UnsupportedFieldType { field: String, type_name: String },
    #[error("script type mismatch: field `{field}` declared as {expected} but value is {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },
    #[error("script invalid top-level shape: {type_name} is not a struct or a collection of structs")]
    InvalidTopLevelShape { type_name: String },
    #[error("script non-finite number in field `{field}`")]
    NonFiniteNumber { field: String },
    #[error("script table @${table} declared with conflicting columns")]
    TableConflict { table: String },
    #[error("script struct {shape} contains itself and cannot be flattened")]
    RecursiveShape { shape: String },
    #[error("script field `{field}` has no usable characters for a column name")]
    InvalidColumnName { field: String },
    #[error("{0}")]
    Valuer(#[from] ValuerError),
}

/// 脚本编译器。配置方法均返回 shadow copy，不修改原对象。
#[derive(Debug, Clone, Default)]
pub struct ScriptCompiler {
    ignore: HashSet<String>,
    known_types: Option<Arc<KnownTypeRegistry>>,
}

impl ScriptCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 忽略字段（按声明的字段名精确匹配，对所有嵌套层级生效）。
    pub fn ignore(&self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut c = self.clone();
        c.ignore.extend(fields.into_iter().map(Into::into));
        c
    }

    /// 使用指定的注册表，而不是进程级默认值。
    pub fn with_known_types(&self, registry: Arc<KnownTypeRegistry>) -> Self {
        let mut c = self.clone();
        c.known_types = Some(registry);
        c
    }

    /// 编译 `value`。`value` 必须是 struct、`Option<struct>` 或其集合。
    ///
    /// 出错时不返回任何部分脚本。
    pub fn compile<T: ScriptType + ?Sized>(
        &self,
        value: &T,
        table_name: &str,
    ) -> Result<String, ScriptError> {
        let registry = match &self.known_types {
            Some(r) => r.clone(),
            None => default_known_types(),
        };
        let kind = T::field_kind();
        let node = value.to_node();

        let mut cx = Compilation::new(&registry, &self.ignore);
        let mut declares = StringBuilder::new();
        let mut inserts = StringBuilder::new();

        match classify(&kind, &registry) {
            Classified::Collection(shape) => {
                cx.declare_table(shape, table_name, &mut declares)?;
                cx.data_list(shape, &node, table_name, &mut inserts)?;
            }
            Classified::Nested(shape) => {
                cx.declare_table(shape, table_name, &mut declares)?;
                if let Some(record) = node.deref_pointer() {
                    cx.data_table(shape, record, table_name, &mut inserts)?;
                }
            }
            Classified::Scalar(_) | Classified::Unsupported(_) => {
                return Err(ScriptError::InvalidTopLevelShape {
                    type_name: kind.label(),
                });
            }
        }

        declares.append(inserts);
        let script = declares.into_string();
        tracing::debug!(
            table = table_name,
            tables = cx.declared.len(),
            bytes = script.len(),
            "compiled sql script"
        );
        Ok(script)
    }
}

/// 便捷入口：使用默认注册表编译。
pub fn to_sql_script<T: ScriptType + ?Sized>(
    value: &T,
    table_name: &str,
    ignore_fields: &[&str],
) -> Result<String, ScriptError> {
    ScriptCompiler::new()
        .ignore(ignore_fields.iter().copied())
        .compile(value, table_name)
}

/// 单次编译的状态。
struct Compilation<'c> {
    registry: &'c KnownTypeRegistry,
    ignore: &'c HashSet<String>,
    /// 已输出 declare 的表 -> 列清单。
    declared: HashMap<String, String>,
    /// 正在 declare 的 (表, struct)。
    declaring: Vec<(String, TypeId)>,
    /// 当前表内正在展开的 struct。
    flattening: Vec<TypeId>,
}

impl<'c> Compilation<'c> {
    fn new(registry: &'c KnownTypeRegistry, ignore: &'c HashSet<String>) -> Self {
        Self {
            registry,
            ignore,
            declared: HashMap::new(),
            declaring: Vec::new(),
            flattening: Vec::new(),
        }
    }

    fn is_ignored(&self, field: &str) -> bool {
        self.ignore.contains(field)
    }

    fn declare_table(
        &mut self,
        shape: Shape,
        table: &str,
        out: &mut StringBuilder,
    ) -> Result<(), ScriptError> {
        if let Some((_, owner)) = self.declaring.iter().find(|(t, _)| t == table) {
            // 自引用集合（如树形结构）：表已在声明中
            if *owner == shape.type_id {
                return Ok(());
            }
            return Err(ScriptError::TableConflict {
                table: table.to_string(),
            });
        }

        self.declaring.push((table.to_string(), shape.type_id));
        let saved = std::mem::take(&mut self.flattening);
        let mut columns = Vec::new();
        let mut nested = StringBuilder::new();
        let result = self.declare_fields(shape, &mut columns, &mut nested);
        self.flattening = saved;
        self.declaring.pop();
        result?;

        out.append(nested);
        if columns.is_empty() {
            return Ok(());
        }

        let mut list = StringBuilder::new();
        list.write_joined(&columns, ",");
        let list = list.into_string();

        if let Some(existing) = self.declared.get(table) {
            if *existing == list {
                return Ok(());
            }
            return Err(ScriptError::TableConflict {
                table: table.to_string(),
            });
        }

        out.write_str("declare @$");
        out.write_str(table);
        out.write_str(" table (");
        out.write_str(&list);
        out.write_str(")\n");
        tracing::debug!(table, columns = columns.len(), "declared table variable");
        self.declared.insert(table.to_string(), list);
        Ok(())
    }

    fn declare_fields(
        &mut self,
        shape: Shape,
        columns: &mut Vec<String>,
        nested: &mut StringBuilder,
    ) -> Result<(), ScriptError> {
        if self.flattening.contains(&shape.type_id) {
            return Err(ScriptError::RecursiveShape {
                shape: shape.name.to_string(),
            });
        }
        self.flattening.push(shape.type_id);

        for decl in shape.fields() {
            if self.is_ignored(decl.name) {
                continue;
            }
            match classify(&decl.kind, self.registry) {
                Classified::Collection(elem) => self.declare_table(elem, decl.name, nested)?,
                Classified::Nested(inner) => self.declare_fields(inner, columns, nested)?,
                Classified::Scalar(sql_type) => {
                    let column = safe_column_name(decl.name);
                    if column.is_empty() {
                        return Err(ScriptError::InvalidColumnName {
                            field: decl.name.to_string(),
                        });
                    }
                    columns.push(format!("[{column}] {sql_type}"));
                }
                Classified::Unsupported(type_name) => {
                    return Err(ScriptError::UnsupportedFieldType {
                        field: decl.name.to_string(),
                        type_name,
                    });
                }
            }
        }

        self.flattening.pop();
        Ok(())
    }

    fn data_list(
        &mut self,
        shape: Shape,
        node: &ValueNode<'_>,
        table: &str,
        out: &mut StringBuilder,
    ) -> Result<(), ScriptError> {
        let Some(node) = node.deref_pointer() else {
            return Ok(());
        };
        let ValueNode::List(items) = node else {
            return Err(ScriptError::TypeMismatch {
                field: table.to_string(),
                expected: "collection".to_string(),
                actual: node.label().to_string(),
            });
        };

        for item in items {
            // None 元素不产生行
            if let Some(record) = item.deref_pointer() {
                self.data_table(shape, record, table, out)?;
            }
        }
        Ok(())
    }

    fn data_table(
        &mut self,
        shape: Shape,
        record: &ValueNode<'_>,
        table: &str,
        out: &mut StringBuilder,
    ) -> Result<(), ScriptError> {
        let mut values = Vec::new();
        let mut nested = StringBuilder::new();
        self.data_fields(shape, record, &mut values, &mut nested)?;

        out.append(nested);
        if values.is_empty() {
            return Ok(());
        }
        out.write_str("insert into @$");
        out.write_str(table);
        out.write_str(" select ");
        out.write_joined(&values, ",");
        out.write_char('\n');
        Ok(())
    }

    fn data_fields(
        &mut self,
        shape: Shape,
        record: &ValueNode<'_>,
        values: &mut Vec<String>,
        nested: &mut StringBuilder,
    ) -> Result<(), ScriptError> {
        let ValueNode::Record(items) = record else {
            return Err(ScriptError::TypeMismatch {
                field: shape.name.to_string(),
                expected: shape.name.to_string(),
                actual: record.label().to_string(),
            });
        };
        let decls = shape.fields();
        if decls.len() != items.len() {
            return Err(ScriptError::TypeMismatch {
                field: shape.name.to_string(),
                expected: format!("{} fields", decls.len()),
                actual: format!("{} fields", items.len()),
            });
        }

        for (decl, item) in decls.iter().zip(items) {
            if decl.name != item.name {
                return Err(ScriptError::TypeMismatch {
                    field: decl.name.to_string(),
                    expected: format!("field `{}`", decl.name),
                    actual: format!("field `{}`", item.name),
                });
            }
            if self.is_ignored(decl.name) {
                continue;
            }
            match classify(&decl.kind, self.registry) {
                Classified::Collection(elem) => {
                    self.data_list(elem, &item.node, decl.name, nested)?
                }
                Classified::Nested(inner) => match item.node.deref_pointer() {
                    Some(inner_record) => self.data_fields(inner, inner_record, values, nested)?,
                    None => self.null_fields(inner, values)?,
                },
                Classified::Scalar(_) => {
                    values.push(encode(decl.name, &decl.kind, &item.node, self.registry)?)
                }
                Classified::Unsupported(type_name) => {
                    return Err(ScriptError::UnsupportedFieldType {
                        field: decl.name.to_string(),
                        type_name,
                    });
                }
            }
        }
        Ok(())
    }

    /// 为值为 `None` 的内嵌 struct 填充 null，保持列对齐；其集合字段不产生行。
    fn null_fields(&self, shape: Shape, values: &mut Vec<String>) -> Result<(), ScriptError> {
        for decl in shape.fields() {
            if self.is_ignored(decl.name) {
                continue;
            }
            match classify(&decl.kind, self.registry) {
                Classified::Collection(_) => {}
                Classified::Nested(inner) => self.null_fields(inner, values)?,
                Classified::Scalar(_) => values.push("null".to_string()),
                Classified::Unsupported(type_name) => {
                    return Err(ScriptError::UnsupportedFieldType {
                        field: decl.name.to_string(),
                        type_name,
                    });
                }
            }
        }
        Ok(())
    }
}
