//! # Streak Accounting
//!
//! 按日历日期（不是经过的小时数）推进连续天数。

use chrono::NaiveDate;

use crate::types::StreakRecord;

/// 在 `today` 完成一次会话后的新记录
///
/// 当天已经完成过时返回 `None`（同一天重复完成不改变任何字段）。
pub fn apply_completion(current: &StreakRecord, today: NaiveDate) -> Option<StreakRecord> {
    if current.last_completed_date == Some(today) {
        return None;
    }

    let yesterday = today.pred_opt();
    let count = if current.last_completed_date.is_some() && current.last_completed_date == yesterday
    {
        current.count.saturating_add(1)
    } else {
        1
    };

    Some(StreakRecord {
        count,
        last_completed_date: Some(today),
        total_sessions: current.total_sessions.saturating_add(1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_completion() {
        let record = apply_completion(&StreakRecord::zero(), date(2024, 1, 1)).unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.last_completed_date, Some(date(2024, 1, 1)));
        assert_eq!(record.total_sessions, 1);
    }

    #[test]
    fn test_same_day_is_noop() {
        let current = StreakRecord {
            count: 3,
            last_completed_date: Some(date(2024, 1, 1)),
            total_sessions: 9,
        };
        assert_eq!(apply_completion(&current, date(2024, 1, 1)), None);
    }

    #[test]
    fn test_consecutive_day_increments() {
        let current = StreakRecord {
            count: 3,
            last_completed_date: Some(date(2024, 2, 29)),
            total_sessions: 9,
        };
        let record = apply_completion(&current, date(2024, 3, 1)).unwrap();
        assert_eq!(record.count, 4);
        assert_eq!(record.total_sessions, 10);
    }

    #[test]
    fn test_gap_resets_count() {
        let current = StreakRecord {
            count: 5,
            last_completed_date: Some(date(2024, 1, 1)),
            total_sessions: 5,
        };
        let record = apply_completion(&current, date(2024, 1, 3)).unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.total_sessions, 6);
    }

    #[test]
    fn test_date_in_future_resets_count() {
        // 时钟被回拨时，上次日期在"今天"之后，也算断档
        let current = StreakRecord {
            count: 5,
            last_completed_date: Some(date(2024, 1, 10)),
            total_sessions: 5,
        };
        let record = apply_completion(&current, date(2024, 1, 9)).unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(record.total_sessions, 6);
    }
}
