//! 脚本值模型：类型层的 `FieldKind` 与值层的 `ValueNode`。
//!
//! Rust 无运行时反射；类型通过实现 [`ScriptType`] 描述自身。业务 struct 使用
//! `sql_script!` 宏生成实现，外部不透明类型（时间、UUID 等）使用 `sql_script_opaque!`。

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

/// 不透明类型的身份（由 known-type 注册表决定如何分类与渲染）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpaqueType {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl OpaqueType {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// 记录类型（struct）的形状：名称 + 按声明顺序惰性枚举字段。
///
/// `name` 只用于展示；判断两个形状是否同一类型使用 `type_id`。
#[derive(Debug, Clone, Copy)]
pub struct Shape {
    pub name: &'static str,
    pub type_id: TypeId,
    pub fields: fn() -> Vec<FieldDecl>,
}

impl Shape {
    pub fn of<T: Any>(name: &'static str, fields: fn() -> Vec<FieldDecl>) -> Self {
        Self {
            name,
            type_id: TypeId::of::<T>(),
            fields,
        }
    }

    pub fn fields(&self) -> Vec<FieldDecl> {
        (self.fields)()
    }
}

/// 字段声明：逻辑字段名 + 声明类型。
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// 字段的声明类型（封闭的 tagged union）。
#[derive(Debug, Clone)]
pub enum FieldKind {
    Bool,
    /// 8/16 位整数（有符号或无符号）。
    SmallInt,
    /// 32 位整数与平台宽度整数。
    Int,
    /// 64 位整数。
    BigInt,
    Float,
    Text,
    Opaque(OpaqueType),
    Nested(Shape),
    Collection(Box<FieldKind>),
    /// 可空（`Option<T>`）。
    Pointer(Box<FieldKind>),
    Unsupported(&'static str),
}

impl FieldKind {
    /// 剥离所有 `Pointer` 层。
    pub fn unwrap_pointer(&self) -> &FieldKind {
        match self {
            Self::Pointer(inner) => inner.unwrap_pointer(),
            other => other,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Bool => "bool".to_string(),
            Self::SmallInt => "smallint".to_string(),
            Self::Int => "int".to_string(),
            Self::BigInt => "bigint".to_string(),
            Self::Float => "float".to_string(),
            Self::Text => "text".to_string(),
            Self::Opaque(o) => o.type_name.to_string(),
            Self::Nested(shape) => shape.name.to_string(),
            Self::Collection(elem) => format!("collection of {}", elem.label()),
            Self::Pointer(inner) => format!("option of {}", inner.label()),
            Self::Unsupported(name) => (*name).to_string(),
        }
    }
}

/// 运行时值节点。
#[derive(Debug, Clone)]
pub enum ValueNode<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Text(Cow<'a, str>),
    Opaque(&'a dyn Any),
    Record(Vec<FieldValue<'a>>),
    List(Vec<ValueNode<'a>>),
    Pointer(Option<Box<ValueNode<'a>>>),
}

impl<'a> ValueNode<'a> {
    /// 解引用所有 `Pointer` 层；`None` 指针与 `Null` 返回 `None`。
    pub fn deref_pointer(&self) -> Option<&ValueNode<'a>> {
        match self {
            Self::Null | Self::Pointer(None) => None,
            Self::Pointer(Some(inner)) => inner.deref_pointer(),
            other => Some(other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Opaque(_) => "opaque",
            Self::Record(_) => "record",
            Self::List(_) => "list",
            Self::Pointer(_) => "option",
        }
    }
}

/// 记录中的一个字段值。
#[derive(Debug, Clone)]
pub struct FieldValue<'a> {
    pub name: &'static str,
    pub node: ValueNode<'a>,
}

impl<'a> FieldValue<'a> {
    pub fn new(name: &'static str, node: ValueNode<'a>) -> Self {
        Self { name, node }
    }
}

/// 可被编译为 SQL 脚本的类型。
pub trait ScriptType {
    /// 类型层描述（declare 阶段使用，不需要实例）。
    fn field_kind() -> FieldKind;

    /// 值层描述（insert 阶段使用）。
    fn to_node(&self) -> ValueNode<'_>;
}

/// 宏内部 helper：通过字段投影闭包推断字段类型的 `FieldKind`。
#[doc(hidden)]
pub fn field_kind_of<S, T, F>(_project: F) -> FieldKind
where
    T: ScriptType + ?Sized,
    F: Fn(&S) -> &T,
{
    T::field_kind()
}

impl ScriptType for bool {
    fn field_kind() -> FieldKind {
        FieldKind::Bool
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Bool(*self)
    }
}

macro_rules! signed_script_type {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(impl ScriptType for $t {
            fn field_kind() -> FieldKind {
                FieldKind::$kind
            }

            fn to_node(&self) -> ValueNode<'_> {
                ValueNode::Int(*self as i64)
            }
        })+
    };
}

macro_rules! unsigned_script_type {
    ($($t:ty => $kind:ident),+ $(,)?) => {
        $(impl ScriptType for $t {
            fn field_kind() -> FieldKind {
                FieldKind::$kind
            }

            fn to_node(&self) -> ValueNode<'_> {
                ValueNode::UInt(*self as u64)
            }
        })+
    };
}

signed_script_type!(i8 => SmallInt, i16 => SmallInt, i32 => Int, isize => Int, i64 => BigInt);
unsigned_script_type!(u8 => SmallInt, u16 => SmallInt, u32 => Int, usize => Int, u64 => BigInt);

impl ScriptType for f32 {
    fn field_kind() -> FieldKind {
        FieldKind::Float
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::F32(*self)
    }
}

impl ScriptType for f64 {
    fn field_kind() -> FieldKind {
        FieldKind::Float
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::F64(*self)
    }
}

impl ScriptType for String {
    fn field_kind() -> FieldKind {
        FieldKind::Text
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Text(Cow::Borrowed(self.as_str()))
    }
}

impl ScriptType for str {
    fn field_kind() -> FieldKind {
        FieldKind::Text
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Text(Cow::Borrowed(self))
    }
}

impl ScriptType for Cow<'_, str> {
    fn field_kind() -> FieldKind {
        FieldKind::Text
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Text(Cow::Borrowed(self.as_ref()))
    }
}

impl ScriptType for char {
    fn field_kind() -> FieldKind {
        FieldKind::Text
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Text(Cow::Owned(self.to_string()))
    }
}

impl<T: ScriptType> ScriptType for Option<T> {
    fn field_kind() -> FieldKind {
        FieldKind::Pointer(Box::new(T::field_kind()))
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Pointer(self.as_ref().map(|v| Box::new(v.to_node())))
    }
}

macro_rules! transparent_script_type {
    ($($wrapper:ident),+ $(,)?) => {
        $(impl<T: ScriptType + ?Sized> ScriptType for $wrapper<T> {
            fn field_kind() -> FieldKind {
                T::field_kind()
            }

            fn to_node(&self) -> ValueNode<'_> {
                (**self).to_node()
            }
        })+
    };
}

transparent_script_type!(Box, Rc, Arc);

impl<T: ScriptType + ?Sized> ScriptType for &T {
    fn field_kind() -> FieldKind {
        T::field_kind()
    }

    fn to_node(&self) -> ValueNode<'_> {
        (**self).to_node()
    }
}

impl<T: ScriptType> ScriptType for [T] {
    fn field_kind() -> FieldKind {
        FieldKind::Collection(Box::new(T::field_kind()))
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::List(self.iter().map(ScriptType::to_node).collect())
    }
}

impl<T: ScriptType, const N: usize> ScriptType for [T; N] {
    fn field_kind() -> FieldKind {
        FieldKind::Collection(Box::new(T::field_kind()))
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::List(self.iter().map(ScriptType::to_node).collect())
    }
}

impl<T: ScriptType> ScriptType for Vec<T> {
    fn field_kind() -> FieldKind {
        FieldKind::Collection(Box::new(T::field_kind()))
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::List(self.iter().map(ScriptType::to_node).collect())
    }
}

impl<T: ScriptType> ScriptType for VecDeque<T> {
    fn field_kind() -> FieldKind {
        FieldKind::Collection(Box::new(T::field_kind()))
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::List(self.iter().map(ScriptType::to_node).collect())
    }
}

// map/set 没有确定的行结构，分类阶段直接报错。
impl<K, V, S> ScriptType for HashMap<K, V, S> {
    fn field_kind() -> FieldKind {
        FieldKind::Unsupported("map")
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Null
    }
}

impl<K, V> ScriptType for BTreeMap<K, V> {
    fn field_kind() -> FieldKind {
        FieldKind::Unsupported("map")
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Null
    }
}

impl<T, S> ScriptType for HashSet<T, S> {
    fn field_kind() -> FieldKind {
        FieldKind::Unsupported("set")
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Null
    }
}

impl<T> ScriptType for BTreeSet<T> {
    fn field_kind() -> FieldKind {
        FieldKind::Unsupported("set")
    }

    fn to_node(&self) -> ValueNode<'_> {
        ValueNode::Null
    }
}

crate::sql_script_opaque!(time::OffsetDateTime, time::PrimitiveDateTime, time::Date);

#[cfg(feature = "uuid")]
crate::sql_script_opaque!(uuid::Uuid);
