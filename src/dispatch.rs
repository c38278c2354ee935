//! 有界并发分发器：固定数量的 worker 从共享 FIFO 队列取任务，结果按输入下标回填。
//!
//! - worker 数量被限制在 `1..=items.len()`。
//! - 每个元素恰好执行一次；无取消、无重试。
//! - 调用方阻塞直到全部元素处理完毕。
//! - 单个元素的错误或 panic 只记录在对应下标，不影响其他元素。

use std::collections::VecDeque;
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError<E> {
    #[error("dispatch item {index} failed: {source}")]
    Failed { index: usize, source: E },
    #[error("dispatch item {index} panicked: {message}")]
    Panicked { index: usize, message: String },
}

impl<E> DispatchError<E> {
    pub fn index(&self) -> usize {
        match self {
            Self::Failed { index, .. } | Self::Panicked { index, .. } => *index,
        }
    }
}

pub type DispatchResult<R, E> = Result<R, DispatchError<E>>;

/// 对每个元素执行 `f`，最多 `max_workers` 个并发；返回与输入等长、按下标对应的错误列表。
pub fn run_bounded<T, E, F>(items: &[T], max_workers: usize, f: F) -> Vec<DispatchResult<(), E>>
where
    T: Sync,
    E: Send,
    F: Fn(&T) -> Result<(), E> + Sync,
{
    dispatch(items.iter().collect(), max_workers, |_, item| f(item))
}

/// 同 [`run_bounded`]，但 `f` 同时收到元素下标，并可返回值。
pub fn run_bounded_indexed<T, R, E, F>(
    items: &[T],
    max_workers: usize,
    f: F,
) -> Vec<DispatchResult<R, E>>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(usize, &T) -> Result<R, E> + Sync,
{
    dispatch(items.iter().collect(), max_workers, f)
}

/// 对每个元素计算一个值（值 + 错误），结果按下标对应。
pub fn run_value_threads<T, R, E, F>(
    items: &[T],
    max_workers: usize,
    f: F,
) -> Vec<DispatchResult<R, E>>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    dispatch(items.iter().collect(), max_workers, |_, item| f(item))
}

/// 以有界并发执行一组回调；返回值只报告 panic。
pub fn run_func_threads<F>(funcs: Vec<F>, max_workers: usize) -> Vec<DispatchResult<(), Infallible>>
where
    F: FnOnce() + Send,
{
    dispatch(funcs, max_workers, |_, func| {
        func();
        Ok(())
    })
}

/// 同时启动全部回调并等待全部完成。
pub fn run_sync<F>(callbacks: Vec<F>) -> Vec<DispatchResult<(), Infallible>>
where
    F: FnOnce() + Send,
{
    let n = callbacks.len();
    run_func_threads(callbacks, n)
}

/// 同时启动全部回调，返回最先完成者的下标；其余回调继续在后台运行。
///
/// 全部回调都 panic（或列表为空）时返回 `None`。
pub fn run_first<F>(callbacks: Vec<F>) -> Option<usize>
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    for (index, callback) in callbacks.into_iter().enumerate() {
        let tx = tx.clone();
        thread::spawn(move || {
            callback();
            // 接收端可能已返回
            let _ = tx.send(index);
        });
    }
    drop(tx);
    rx.recv().ok()
}

fn dispatch<T, R, E, F>(items: Vec<T>, max_workers: usize, f: F) -> Vec<DispatchResult<R, E>>
where
    T: Send,
    R: Send,
    E: Send,
    F: Fn(usize, T) -> Result<R, E> + Sync,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = max_workers.clamp(1, total);
    tracing::debug!(items = total, workers, "dispatching");

    let queue = Mutex::new(items.into_iter().enumerate().collect::<VecDeque<_>>());
    let mut slots: Vec<Option<DispatchResult<R, E>>> = (0..total).map(|_| None).collect();

    thread::scope(|scope| {
        let queue = &queue;
        let f = &f;
        let handles: Vec<_> = (0..workers)
            .map(|_| scope.spawn(move || worker(queue, f)))
            .collect();

        for handle in handles {
            // worker 内部已捕获 panic，join 失败只会来自分发器自身
            if let Ok(done) = handle.join() {
                for (index, result) in done {
                    slots[index] = Some(result);
                }
            }
        }
    });

    tracing::debug!(items = total, "dispatch finished");
    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                Err(DispatchError::Panicked {
                    index,
                    message: "worker exited before reporting".to_string(),
                })
            })
        })
        .collect()
}

fn worker<T, R, E, F>(
    queue: &Mutex<VecDeque<(usize, T)>>,
    f: &F,
) -> Vec<(usize, DispatchResult<R, E>)>
where
    F: Fn(usize, T) -> Result<R, E>,
{
    let mut done = Vec::new();
    loop {
        let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        let Some((index, item)) = next else {
            break;
        };

        let result = match panic::catch_unwind(AssertUnwindSafe(|| f(index, item))) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(DispatchError::Failed { index, source }),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(index, %message, "dispatch item panicked");
                Err(DispatchError::Panicked { index, message })
            }
        };
        done.push((index, result));
    }
    done
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
