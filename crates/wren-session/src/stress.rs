//! # Stress Readings
//!
//! 压力量表（1-5 或 1-10）、读数描述，以及会前/会后对比的反馈文案。

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// 压力量表
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressScale {
    /// 1-5
    #[default]
    Five,
    /// 1-10
    Ten,
}

impl StressScale {
    pub fn max(self) -> i32 {
        match self {
            StressScale::Five => 5,
            StressScale::Ten => 10,
        }
    }

    pub fn range(self) -> RangeInclusive<i32> {
        1..=self.max()
    }

    /// 输入控件的初始值
    pub fn default_level(self) -> i32 {
        match self {
            StressScale::Five => 3,
            StressScale::Ten => 5,
        }
    }

    /// 校验读数
    pub fn validate(self, level: i32) -> SessionResult<i32> {
        if self.range().contains(&level) {
            Ok(level)
        } else {
            Err(SessionError::StressOutOfRange {
                level,
                min: 1,
                max: self.max(),
            })
        }
    }

    /// 读数描述
    pub fn describe(self, level: i32) -> &'static str {
        match self {
            StressScale::Five => match level {
                1 => "Very Calm",
                2 => "Relaxed",
                3 => "Neutral",
                4 => "Stressed",
                5 => "Very Stressed",
                _ => "Unknown",
            },
            StressScale::Ten => match level {
                1..=3 => "You're feeling quite calm and relaxed.",
                4..=6 => "You're experiencing moderate stress levels.",
                7..=10 => "You're feeling quite stressed and overwhelmed.",
                _ => "Unknown",
            },
        }
    }
}

impl std::str::FromStr for StressScale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "5" | "five" => Ok(StressScale::Five),
            "10" | "ten" => Ok(StressScale::Ten),
            other => Err(format!("unknown stress scale: {}", other)),
        }
    }
}

/// 会前到会后的变化趋势
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressTrend {
    Improved,
    Unchanged,
    Worsened,
}

impl StressTrend {
    /// delta = 会前 - 会后，正数表示压力下降
    pub fn from_delta(delta: i64) -> Self {
        match delta {
            d if d > 0 => StressTrend::Improved,
            0 => StressTrend::Unchanged,
            _ => StressTrend::Worsened,
        }
    }
}

/// 根据变化给出反馈文案
pub fn feedback_for_delta(delta: i64) -> &'static str {
    match delta {
        d if d > 2 => "Excellent progress! You've made significant improvement.",
        d if d > 0 => "Great work! You've reduced your stress level.",
        0 => "You maintained your calm throughout the session.",
        _ => "Every session is valuable. Keep practicing for better results.",
    }
}
