//! 宏集合：为业务 struct 生成 `ScriptType` 实现，并提供 Go 式的可变参数调用封装。

/// 为 struct 实现 `ScriptType`（记录类型，字段按书写顺序）。
///
/// 字段名默认取 Rust 标识符，可用 `field => "Name"` 指定脚本中的字段名；
/// 忽略列表与列名都按这个字段名匹配/生成。
///
/// ```ignore
/// struct Model { id: i64, name: String }
///
/// halo_space::sql_script! {
///     impl Model {
///         id => "ID",
///         name => "Name",
///     }
/// }
/// ```
#[macro_export]
macro_rules! sql_script {
    (
        impl $ty:ty {
            $( $field:ident $( => $name:literal )? ),* $(,)?
        }
    ) => {
        impl $crate::value::ScriptType for $ty {
            fn field_kind() -> $crate::value::FieldKind {
                fn fields() -> ::std::vec::Vec<$crate::value::FieldDecl> {
                    ::std::vec![
                        $(
                            $crate::value::FieldDecl::new(
                                $crate::__sql_script_name!(stringify!($field) $(, $name)?),
                                $crate::value::field_kind_of(|s: &$ty| &s.$field),
                            )
                        ),*
                    ]
                }

                $crate::value::FieldKind::Nested($crate::value::Shape::of::<$ty>(
                    stringify!($ty),
                    fields,
                ))
            }

            fn to_node(&self) -> $crate::value::ValueNode<'_> {
                $crate::value::ValueNode::Record(::std::vec![
                    $(
                        $crate::value::FieldValue::new(
                            $crate::__sql_script_name!(stringify!($field) $(, $name)?),
                            $crate::value::ScriptType::to_node(&self.$field),
                        )
                    ),*
                ])
            }
        }
    };
}
pub use crate::sql_script;

/// 宏内部 helper：支持 `=> "Name"` 的可选参数。
#[doc(hidden)]
#[macro_export]
macro_rules! __sql_script_name {
    ($default:expr) => {
        $default
    };
    ($default:expr, $custom:expr) => {
        $custom
    };
}

/// 为不透明类型实现 `ScriptType`；是否可用、如何渲染由 known-type 注册表决定。
#[macro_export]
macro_rules! sql_script_opaque {
    ($($ty:ty),+ $(,)?) => {
        $(impl $crate::value::ScriptType for $ty {
            fn field_kind() -> $crate::value::FieldKind {
                $crate::value::FieldKind::Opaque($crate::value::OpaqueType::of::<$ty>())
            }

            fn to_node(&self) -> $crate::value::ValueNode<'_> {
                $crate::value::ValueNode::Opaque(self)
            }
        })+
    };
}
pub use crate::sql_script_opaque;

/// 为 `ScriptCompiler::compile` 提供 Go 风格的可变参数忽略列表。
///
/// `to_sql_script!(&value, "Model", "Password", "Token")`
#[macro_export]
macro_rules! to_sql_script {
    ($value:expr, $table:expr $(, $ignore:expr)* $(,)?) => {
        $crate::script::ScriptCompiler::new()
            .ignore($crate::__collect_strings!($($ignore),*))
            .compile($value, $table)
    };
}
pub use crate::to_sql_script;

#[doc(hidden)]
#[macro_export]
macro_rules! __collect_strings {
    () => {
        ::std::vec::Vec::<::std::string::String>::new()
    };
    ($($value:expr),+ $(,)?) => {{
        let mut values = ::std::vec::Vec::<::std::string::String>::new();
        $(
            $crate::macros::extend_into_strings($value, &mut values);
        )*
        values
    }};
}

pub trait IntoStrings {
    fn extend_into_strings(self, dst: &mut Vec<String>);
}

impl IntoStrings for String {
    fn extend_into_strings(self, dst: &mut Vec<String>) {
        dst.push(self);
    }
}

impl IntoStrings for &str {
    fn extend_into_strings(self, dst: &mut Vec<String>) {
        dst.push(self.to_string());
    }
}

impl<const N: usize, T> IntoStrings for [T; N]
where
    T: Into<String>,
{
    fn extend_into_strings(self, dst: &mut Vec<String>) {
        dst.extend(self.into_iter().map(Into::into));
    }
}

impl<T> IntoStrings for &[T]
where
    T: Into<String> + Clone,
{
    fn extend_into_strings(self, dst: &mut Vec<String>) {
        dst.extend(self.iter().cloned().map(Into::into));
    }
}

impl<T> IntoStrings for Vec<T>
where
    T: Into<String>,
{
    fn extend_into_strings(self, dst: &mut Vec<String>) {
        dst.extend(self.into_iter().map(Into::into));
    }
}

#[doc(hidden)]
pub fn extend_into_strings<T>(value: T, dst: &mut Vec<String>)
where
    T: IntoStrings,
{
    value.extend_into_strings(dst);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    #[test]
    fn collect_strings_flattens_mixed_args() {
        let v: Vec<String> = crate::__collect_strings!("a", String::from("b"), ["c", "d"], vec!["e"]);
        assert_eq!(v, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn collect_strings_empty() {
        let v: Vec<String> = crate::__collect_strings!();
        assert!(v.is_empty());
    }
}
