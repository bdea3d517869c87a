//! # Wren Session
//!
//! 单次引导冥想的会话状态机。
//!
//! ## 功能特性
//!
//! - **固定阶段顺序**：idle → intro → breathing → guidance → complete
//! - **脚本消息**：进入 intro / breathing / guidance 时追加一条引导者消息
//! - **压力读数**：会前/会后读数可选范围校验，缺失时使用默认值
//! - **会话快照**：读数和开始时间写入进行中会话快照，可在重启后恢复
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use wren_session::{MeditationSession, SessionOptions};
//! use wren_storage::LocalStore;
//!
//! let store = LocalStore::in_memory();
//! let mut session = MeditationSession::new(store.clone(), SessionOptions::default());
//!
//! session.record_stress_pre(4)?;
//! session.begin();
//! while session.advance() {}
//! session.record_stress_post(2)?;
//!
//! let summary = session.complete();
//! store.record_completion();
//! println!("{}", summary.feedback());
//! # Ok::<(), wren_session::SessionError>(())
//! ```

pub mod error;
pub mod message;
pub mod phase;
pub mod script;
pub mod session;
pub mod stress;

pub use error::{SessionError, SessionResult};
pub use message::{Message, Role};
pub use phase::Phase;
pub use script::script_for;
pub use session::{
    MeditationSession, SessionOptions, SessionSummary, FALLBACK_STRESS_POST, FALLBACK_STRESS_PRE,
};
pub use stress::{feedback_for_delta, StressScale, StressTrend};
