//! KnownValuer：把注册表中的不透明值渲染为文本。
//!
//! 注册表不关心具体的时间/UUID 库；每个已注册类型都携带一个 valuer，
//! 在 insert 阶段通过 `&dyn Any` 取得文本表示。

use std::any::Any;
use std::fmt;

/// Valuer 错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("known type valuer error: {0}")]
pub struct ValuerError(pub String);

/// 可克隆的不透明值渲染器。
pub trait KnownValuer: dyn_clone::DynClone + fmt::Debug + Send + Sync {
    fn render(&self, value: &dyn Any) -> Result<String, ValuerError>;
}

dyn_clone::clone_trait_object!(KnownValuer);

/// 以函数指针实现的 valuer：先 downcast 到 `T`，再调用 `render`。
pub struct FnValuer<T: Any> {
    render: fn(&T) -> Result<String, ValuerError>,
}

impl<T: Any> FnValuer<T> {
    pub fn new(render: fn(&T) -> Result<String, ValuerError>) -> Self {
        Self { render }
    }
}

impl<T: Any> Clone for FnValuer<T> {
    fn clone(&self) -> Self {
        Self {
            render: self.render,
        }
    }
}

impl<T: Any> fmt::Debug for FnValuer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnValuer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Any> KnownValuer for FnValuer<T> {
    fn render(&self, value: &dyn Any) -> Result<String, ValuerError> {
        match value.downcast_ref::<T>() {
            Some(v) => (self.render)(v),
            None => Err(ValuerError(format!(
                "expected value of type {}",
                std::any::type_name::<T>()
            ))),
        }
    }
}
