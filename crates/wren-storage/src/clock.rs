//! # Clock
//!
//! 时间来源抽象。连续天数按"本地时区的日历日期"计算，
//! 测试中用 [`FixedClock`] 精确控制跨天边界。

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

/// 时间来源
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// 当前时刻
    fn now(&self) -> DateTime<Utc>;

    /// 当前时刻在本地时区的日历日期
    fn today(&self) -> NaiveDate;
}

/// 系统时钟，日期按进程所在的本地时区计算
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// 可手动拨动的时钟
///
/// 保存带偏移量的时间，偏移量即这个时钟的"本地时区"。
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl FixedClock {
    /// 固定在指定时刻
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 固定在某天的指定时分（UTC 偏移为 0）
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let offset = FixedOffset::east_opt(0).expect("zero offset is valid");
        let now = offset
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("invalid date for FixedClock");
        Self::new(now)
    }

    /// 固定在某天中午
    pub fn on_date(year: i32, month: u32, day: u32) -> Self {
        Self::at(year, month, day, 12, 0)
    }

    /// 重新设置时刻
    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock() = now;
    }

    /// 向前拨动
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// 向前拨动若干天
    pub fn advance_days(&self, days: i64) {
        self.advance(Duration::days(days));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().with_timezone(&Utc)
    }

    fn today(&self) -> NaiveDate {
        self.now.lock().date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_crosses_midnight() {
        let clock = FixedClock::at(2024, 1, 1, 23, 59);
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        clock.advance(Duration::minutes(2));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn test_fixed_clock_uses_its_own_offset() {
        // UTC 2024-01-01 23:30 在 +08:00 时区已经是 1 月 2 日
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 1, 2, 7, 30, 0).unwrap();
        let clock = FixedClock::new(local);

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(clock.now().date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }
}
