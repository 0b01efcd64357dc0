//! ### English
//! Render worker runtime: the one thread that owns GPU state, and its message protocol.
//!
//! ### 中文
//! 渲染 worker 运行时：唯一持有 GPU 状态的线程及其消息协议。
mod command;
mod render_thread;
mod worker;

pub(crate) use command::WorkerMessage;
pub use worker::{DEFAULT_WORKER_NAME, RenderWorker};
