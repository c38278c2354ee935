//! Known-type 注册表：决定哪些不透明类型是日期时间、哪些是 UUID。
//!
//! 编译器只通过注册表识别这些类型，不直接依赖具体的时间/UUID 库。
//! 进程级默认注册表在启动时写入一次，之后只读；测试可用 `set_known_types_scoped` 临时替换。

use crate::encode::format_datetime;
use crate::valuer::{KnownValuer, ValuerError};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, RwLock};

/// 已知类型的分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownClass {
    DateTime,
    Uuid,
}

impl KnownClass {
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::DateTime => "datetime",
            Self::Uuid => "uniqueidentifier",
        }
    }
}

#[derive(Debug, Clone)]
pub struct KnownType {
    pub class: KnownClass,
    pub type_name: &'static str,
    valuer: Box<dyn KnownValuer>,
}

impl KnownType {
    pub fn render(&self, value: &dyn Any) -> Result<String, ValuerError> {
        self.valuer.render(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct KnownTypeRegistry {
    types: HashMap<TypeId, KnownType>,
}

impl KnownTypeRegistry {
    /// 空注册表：所有不透明类型都视为不支持。
    pub fn new() -> Self {
        Self::default()
    }

    /// 内置注册：`time` 的日期时间类型，以及（feature `uuid`）`uuid::Uuid`。
    pub fn standard() -> Self {
        let reg = Self::new()
            .register_datetime::<time::OffsetDateTime>(|v| {
                time::PrimitiveDateTime::new(v.date(), v.time())
            })
            .register_datetime::<time::PrimitiveDateTime>(|v| *v)
            .register_datetime::<time::Date>(|v| v.midnight());

        #[cfg(feature = "uuid")]
        let reg = reg.register_uuid::<uuid::Uuid>(|v| v.hyphenated().to_string());

        reg
    }

    /// 注册一个类型及其 valuer，返回新的注册表（builder 风格）。
    pub fn register<T: Any>(
        mut self,
        class: KnownClass,
        valuer: impl KnownValuer + 'static,
    ) -> Self {
        self.types.insert(
            TypeId::of::<T>(),
            KnownType {
                class,
                type_name: std::any::type_name::<T>(),
                valuer: Box::new(valuer),
            },
        );
        self
    }

    /// 注册日期时间类型：`to_datetime` 给出本地墙钟时间，按固定布局输出。
    pub fn register_datetime<T: Any>(self, to_datetime: fn(&T) -> time::PrimitiveDateTime) -> Self {
        self.register::<T>(KnownClass::DateTime, DateTimeValuer { to_datetime })
    }

    /// 注册 UUID 类型：`to_text` 给出规范文本形式。
    pub fn register_uuid<T: Any>(self, to_text: fn(&T) -> String) -> Self {
        self.register::<T>(KnownClass::Uuid, UuidValuer { to_text })
    }

    pub fn lookup(&self, type_id: TypeId) -> Option<&KnownType> {
        self.types.get(&type_id)
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

struct DateTimeValuer<T: Any> {
    to_datetime: fn(&T) -> time::PrimitiveDateTime,
}

impl<T: Any> Clone for DateTimeValuer<T> {
    fn clone(&self) -> Self {
        Self {
            to_datetime: self.to_datetime,
        }
    }
}

impl<T: Any> std::fmt::Debug for DateTimeValuer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DateTimeValuer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Any> KnownValuer for DateTimeValuer<T> {
    fn render(&self, value: &dyn Any) -> Result<String, ValuerError> {
        match value.downcast_ref::<T>() {
            Some(v) => format_datetime((self.to_datetime)(v)).map_err(|e| ValuerError(e.to_string())),
            None => Err(ValuerError(format!(
                "expected value of type {}",
                std::any::type_name::<T>()
            ))),
        }
    }
}

struct UuidValuer<T: Any> {
    to_text: fn(&T) -> String,
}

impl<T: Any> Clone for UuidValuer<T> {
    fn clone(&self) -> Self {
        Self {
            to_text: self.to_text,
        }
    }
}

impl<T: Any> std::fmt::Debug for UuidValuer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UuidValuer")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Any> KnownValuer for UuidValuer<T> {
    fn render(&self, value: &dyn Any) -> Result<String, ValuerError> {
        match value.downcast_ref::<T>() {
            Some(v) => Ok((self.to_text)(v)),
            None => Err(ValuerError(format!(
                "expected value of type {}",
                std::any::type_name::<T>()
            ))),
        }
    }
}

static DEFAULT_KNOWN_TYPES: OnceLock<RwLock<Arc<KnownTypeRegistry>>> = OnceLock::new();
static DEFAULT_KNOWN_TYPES_LOCK: Mutex<()> = Mutex::new(());

fn registry_cell() -> &'static RwLock<Arc<KnownTypeRegistry>> {
    DEFAULT_KNOWN_TYPES.get_or_init(|| RwLock::new(Arc::new(KnownTypeRegistry::standard())))
}

/// 获取当前进程级默认注册表（首次访问时初始化为 `standard()`）。
pub fn default_known_types() -> Arc<KnownTypeRegistry> {
    registry_cell()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}

/// 设置进程级默认注册表，返回旧值。应在编译开始前调用一次。
pub fn set_known_types(registry: KnownTypeRegistry) -> Arc<KnownTypeRegistry> {
    let mut g = registry_cell().write().unwrap_or_else(|e| e.into_inner());
    tracing::debug!(types = registry.len(), "replacing default known-type registry");
    std::mem::replace(&mut *g, Arc::new(registry))
}

/// 修改默认注册表的 RAII guard（持有全局锁，避免并行测试互相干扰）。
pub struct KnownTypesGuard {
    _lock: MutexGuard<'static, ()>,
    old: Arc<KnownTypeRegistry>,
}

impl Drop for KnownTypesGuard {
    fn drop(&mut self) {
        let mut g = registry_cell().write().unwrap_or_else(|e| e.into_inner());
        *g = self.old.clone();
    }
}

/// 在一个作用域内临时替换默认注册表，退出作用域后自动恢复。
pub fn set_known_types_scoped(registry: KnownTypeRegistry) -> KnownTypesGuard {
    let lock = DEFAULT_KNOWN_TYPES_LOCK
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    let old = set_known_types(registry);
    KnownTypesGuard { _lock: lock, old }
}
