//! # Meditation Session
//!
//! 单次引导冥想的状态机。
//!
//! 这是唯一会修改会话状态的地方：
//! - 按固定顺序推进阶段，进入 intro / breathing / guidance 时追加一条脚本消息
//! - 记录会前/会后压力读数，并写入进行中会话快照
//! - 完成时计算时长、给出总结，但不更新连续天数（由调用者交给存储层）

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wren_storage::{Clock, LocalStore, Persistence, SessionSnapshot};

use crate::error::SessionResult;
use crate::message::{Message, Role};
use crate::phase::Phase;
use crate::script::script_for;
use crate::stress::{feedback_for_delta, StressScale, StressTrend};

/// 未记录会前读数时使用的值
pub const FALLBACK_STRESS_PRE: i32 = 3;
/// 未记录会后读数时使用的值
pub const FALLBACK_STRESS_POST: i32 = 2;

/// 会话选项
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// 压力量表
    pub stress_scale: StressScale,
    /// 是否在状态机内校验读数范围
    pub validate_stress: bool,
    pub fallback_stress_pre: i32,
    pub fallback_stress_post: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            stress_scale: StressScale::Five,
            validate_stress: true,
            fallback_stress_pre: FALLBACK_STRESS_PRE,
            fallback_stress_post: FALLBACK_STRESS_POST,
        }
    }
}

impl SessionOptions {
    /// 接受任意整数读数，由输入层负责校验
    pub fn permissive() -> Self {
        Self {
            validate_stress: false,
            ..Self::default()
        }
    }

    /// 设置量表
    pub fn with_scale(mut self, scale: StressScale) -> Self {
        self.stress_scale = scale;
        self
    }
}

/// 会话总结
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub stress_pre: i32,
    pub stress_post: i32,
    /// 时长（秒）
    pub duration: u64,
    pub completed_at: DateTime<Utc>,
}

impl SessionSummary {
    /// 会前 - 会后，正数表示压力下降；宽松模式下读数可为任意 i32，故用 i64
    pub fn stress_delta(&self) -> i64 {
        i64::from(self.stress_pre) - i64::from(self.stress_post)
    }

    pub fn trend(&self) -> StressTrend {
        StressTrend::from_delta(self.stress_delta())
    }

    /// 下降百分比（四舍五入）；会前读数为 0 时无意义
    pub fn improvement_percentage(&self) -> Option<i32> {
        if self.stress_pre == 0 {
            return None;
        }
        let ratio = self.stress_delta() as f64 / f64::from(self.stress_pre);
        // f64 -> i32 的 as 转换在越界时饱和
        Some((ratio * 100.0).round() as i32)
    }

    pub fn feedback(&self) -> &'static str {
        feedback_for_delta(self.stress_delta())
    }
}

/// 冥想会话状态机
#[derive(Debug)]
pub struct MeditationSession {
    phase: Phase,
    messages: Vec<Message>,
    stress_pre: Option<i32>,
    stress_post: Option<i32>,
    started_at: Option<DateTime<Utc>>,
    store: LocalStore,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
}

impl MeditationSession {
    /// 创建空闲会话，时钟取自存储
    pub fn new(store: LocalStore, options: SessionOptions) -> Self {
        let clock = store.clock();
        Self {
            phase: Phase::Idle,
            messages: Vec::new(),
            stress_pre: None,
            stress_post: None,
            started_at: None,
            store,
            clock,
            options,
        }
    }

    /// 从进行中会话快照恢复
    ///
    /// 阶段优先取会话阶段标记，其次取快照中的阶段；
    /// 已进入阶段的脚本消息会按顺序重新生成。没有快照时返回空闲会话。
    pub fn resume(store: LocalStore, options: SessionOptions) -> Self {
        let mut session = Self::new(store, options);
        let Some(snapshot) = session.store.read_in_progress_session() else {
            return session;
        };

        let flagged = session.store.read_session_flag().parse::<Phase>().ok();
        let recorded = snapshot.phase.as_deref().and_then(|p| p.parse::<Phase>().ok());
        let phase = match (flagged, recorded) {
            (Some(p), _) if !matches!(p, Phase::Idle | Phase::Complete) => p,
            (_, Some(p)) if p != Phase::Complete => p,
            _ if snapshot.started_at.is_some() => Phase::Intro,
            _ => Phase::Idle,
        };

        session.stress_pre = snapshot.stress_pre;
        session.stress_post = snapshot.stress_post;
        session.started_at = snapshot.started_at;

        let now = session.clock.now();
        for entered in Phase::SEQUENCE.into_iter().take_while(|p| *p <= phase) {
            if entered.announces_on_entry() {
                if let Some(text) = script_for(entered) {
                    session.messages.push(Message::assistant(text, now));
                }
            }
        }
        session.phase = phase;

        info!("Resumed session at phase {}", phase);
        session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn stress_pre(&self) -> Option<i32> {
        self.stress_pre
    }

    pub fn stress_post(&self) -> Option<i32> {
        self.stress_post
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    /// 直接设置阶段
    ///
    /// 进入 intro / breathing / guidance 时追加对应脚本消息；不写存储。
    pub fn set_phase(&mut self, target: Phase) {
        debug!("Session phase {} -> {}", self.phase, target);
        self.phase = target;
        if target.announces_on_entry() {
            if let Some(text) = script_for(target) {
                self.push_message(Role::Assistant, text);
            }
        }
    }

    /// 推进到下一阶段；已完成时什么也不做
    ///
    /// 返回是否发生了转换。
    pub fn advance(&mut self) -> bool {
        match self.phase.next() {
            Some(next) => {
                self.set_phase(next);
                true
            }
            None => {
                debug!("Session already complete, advance ignored");
                false
            }
        }
    }

    /// 追加一条消息
    pub fn add_message(&mut self, role: Role, text: impl Into<String>) -> &Message {
        self.push_message(role, text)
    }

    /// 追加一条用户消息
    pub fn add_user_message(&mut self, text: impl Into<String>) -> &Message {
        self.push_message(Role::User, text)
    }

    /// 当前阶段的文案（idle 为空串）
    pub fn current_step_message(&self) -> &'static str {
        script_for(self.phase).unwrap_or("")
    }

    /// 记录会前压力读数，并写入进行中会话快照
    pub fn record_stress_pre(&mut self, level: i32) -> SessionResult<Persistence> {
        let level = self.check_level(level)?;
        self.stress_pre = Some(level);
        Ok(self.write_snapshot())
    }

    /// 记录会后压力读数，并写入进行中会话快照
    pub fn record_stress_post(&mut self, level: i32) -> SessionResult<Persistence> {
        let level = self.check_level(level)?;
        self.stress_post = Some(level);
        Ok(self.write_snapshot())
    }

    /// 开始会话：记录开始时间、清空消息、进入 intro
    pub fn begin(&mut self) -> Persistence {
        self.started_at = Some(self.clock.now());
        self.messages.clear();
        self.set_phase(Phase::Intro);
        info!("Session started");
        self.write_snapshot()
    }

    /// 完成会话并返回总结
    ///
    /// 删除进行中会话快照；连续天数由调用者通过
    /// [`LocalStore::record_completion`] 更新。
    pub fn complete(&mut self) -> SessionSummary {
        let now = self.clock.now();
        let summary = SessionSummary {
            stress_pre: self.stress_pre.unwrap_or(self.options.fallback_stress_pre),
            stress_post: self.stress_post.unwrap_or(self.options.fallback_stress_post),
            duration: self.elapsed_secs(now),
            completed_at: now,
        };

        self.phase = Phase::Complete;
        self.store.clear_in_progress_session();

        info!(
            "Session complete after {}s, stress {} -> {}",
            summary.duration, summary.stress_pre, summary.stress_post
        );
        summary
    }

    /// 回到初始状态并删除进行中会话快照
    pub fn reset(&mut self) -> Persistence {
        self.phase = Phase::Idle;
        self.messages.clear();
        self.stress_pre = None;
        self.stress_post = None;
        self.started_at = None;
        debug!("Session reset");
        self.store.clear_in_progress_session()
    }

    /// 当前状态对应的快照
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            stress_pre: self.stress_pre,
            stress_post: self.stress_post,
            duration: self.started_at.map(|_| self.elapsed_secs(self.clock.now())),
            completed_at: None,
            started_at: self.started_at,
            phase: Some(self.phase.to_string()),
        }
    }

    fn check_level(&self, level: i32) -> SessionResult<i32> {
        if self.options.validate_stress {
            self.options.stress_scale.validate(level)
        } else {
            Ok(level)
        }
    }

    fn write_snapshot(&self) -> Persistence {
        self.store.write_in_progress_session(&self.snapshot())
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        self.started_at
            .map(|start| now.signed_duration_since(start).num_seconds().max(0) as u64)
            .unwrap_or(0)
    }

    fn push_message(&mut self, role: Role, text: impl Into<String>) -> &Message {
        let message = Message::new(role, text, self.clock.now());
        self.messages.push(message);
        &self.messages[self.messages.len() - 1]
    }
}
