//! 交互式引导会话
//!
//! 读取终端输入驱动 [`MeditationSession`]：会前压力 → 各阶段引导 → 会后压力 → 总结。
//! 每次阶段变化都写入会话阶段标记，中途退出后下次运行可继续。

use std::io::{BufRead, Write};

use colored::Colorize;
use wren_session::{MeditationSession, Message, Phase, Role, SessionOptions, SessionSummary};
use wren_storage::{LocalStore, StreakRecord, StressSnapshotUpdate};

/// 会话结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Completed {
        summary: SessionSummary,
        streak: StreakRecord,
    },
    /// 用户中途退出，快照保留
    Paused { phase: Phase },
}

pub struct SessionFlow<R, W> {
    session: MeditationSession,
    input: R,
    output: W,
    shown: usize,
}

impl<R: BufRead, W: Write> SessionFlow<R, W> {
    /// 从存储中恢复或新建会话
    pub fn new(store: LocalStore, options: SessionOptions, input: R, output: W) -> Self {
        Self {
            session: MeditationSession::resume(store, options),
            input,
            output,
            shown: 0,
        }
    }

    pub fn run(mut self) -> anyhow::Result<FlowOutcome> {
        let streak = self.session.store().read_streak();
        writeln!(
            self.output,
            "{}",
            format!("🔥 Current streak: {} day(s), {}", streak.count, streak.tier()).cyan()
        )?;

        match self.session.phase() {
            Phase::Idle | Phase::Complete => {
                if self.session.phase() == Phase::Complete {
                    self.session.reset();
                }
                if self.session.stress_pre().is_none() {
                    match self.ask_stress("How stressed do you feel right now?")? {
                        Some(level) => self.record(level, true)?,
                        None => return self.pause(),
                    }
                }
                self.session.begin();
                self.mark_phase();
            }
            phase => {
                writeln!(
                    self.output,
                    "{}",
                    format!("↩️  Resuming your session at the {} step", phase).yellow()
                )?;
            }
        }

        while self.session.phase() != Phase::Complete {
            self.show_new_messages()?;
            let Some(label) = self.session.phase().next_step_label() else {
                break;
            };

            let prompt = format!("[Enter] {} · type to reply · 'quit' to pause", label);
            writeln!(self.output, "{}", prompt.dimmed())?;
            let Some(line) = self.read_line()? else {
                return self.pause();
            };
            match line.as_str() {
                "" => {
                    self.session.advance();
                    self.mark_phase();
                }
                "quit" | "exit" => return self.pause(),
                text => {
                    self.session.add_user_message(text);
                }
            }
        }

        self.show_new_messages()?;
        writeln!(
            self.output,
            "{}",
            format!("Wren: {}", self.session.current_step_message()).green()
        )?;

        if self.session.stress_post().is_none() {
            if let Some(level) = self.ask_stress("How stressed do you feel now?")? {
                self.record(level, false)?;
            }
        }

        let summary = self.session.complete();
        let store = self.session.store();
        store.write_session_flag(Phase::Complete.as_str());
        store.write_stress_snapshot(StressSnapshotUpdate {
            pre: Some(summary.stress_pre),
            post: Some(summary.stress_post),
            session_date: Some(summary.completed_at),
        });
        let outcome = store.record_completion();
        if !outcome.is_durable() {
            writeln!(
                self.output,
                "{}",
                "⚠️  Your streak could not be saved and will be lost when Wren exits".yellow()
            )?;
        }
        let streak = outcome.into_value();
        self.print_summary(&summary, &streak)?;

        Ok(FlowOutcome::Completed { summary, streak })
    }

    fn pause(&mut self) -> anyhow::Result<FlowOutcome> {
        writeln!(
            self.output,
            "{}",
            "⏸  Session paused. Run `wren session` to continue.".yellow()
        )?;
        Ok(FlowOutcome::Paused {
            phase: self.session.phase(),
        })
    }

    fn mark_phase(&self) {
        self.session
            .store()
            .write_session_flag(self.session.phase().as_str());
    }

    fn record(&mut self, level: i32, pre: bool) -> anyhow::Result<()> {
        let persistence = if pre {
            self.session.record_stress_pre(level)?
        } else {
            self.session.record_stress_post(level)?
        };
        if !persistence.is_durable() {
            tracing::warn!("Stress reading kept in memory only");
        }
        Ok(())
    }

    /// 读取压力读数；空输入取量表默认值，无效输入重新询问，EOF 或 quit 返回 None
    fn ask_stress(&mut self, question: &str) -> anyhow::Result<Option<i32>> {
        let options = self.session.options().clone();
        let scale = options.stress_scale;
        loop {
            write!(
                self.output,
                "{} (1-{}) [{}]: ",
                question.bold(),
                scale.max(),
                scale.default_level()
            )?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            if line == "quit" || line == "exit" {
                return Ok(None);
            }

            let level = if line.is_empty() {
                scale.default_level()
            } else {
                match line.parse::<i32>() {
                    Ok(level) => level,
                    Err(_) => {
                        writeln!(self.output, "{}", format!("❌ Not a number: {}", line).red())?;
                        continue;
                    }
                }
            };

            if options.validate_stress {
                if let Err(e) = scale.validate(level) {
                    writeln!(self.output, "{}", format!("❌ {}", e).red())?;
                    continue;
                }
            }

            writeln!(self.output, "{}", format!("   {}", scale.describe(level)).dimmed())?;
            return Ok(Some(level));
        }
    }

    fn read_line(&mut self) -> anyhow::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn show_new_messages(&mut self) -> anyhow::Result<()> {
        let messages: Vec<Message> = self.session.messages()[self.shown..].to_vec();
        for message in &messages {
            match message.role {
                Role::Assistant => writeln!(self.output, "{}", format!("Wren: {}", message.text).green())?,
                Role::User => writeln!(self.output, "{}", format!("You: {}", message.text).blue())?,
            }
        }
        self.shown = self.session.messages().len();
        Ok(())
    }

    fn print_summary(&mut self, summary: &SessionSummary, streak: &StreakRecord) -> anyhow::Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "{}", "📋 Session Summary".cyan().bold())?;
        writeln!(out, "{}", "─".repeat(40).dimmed())?;
        writeln!(out, "Stress before:  {}", summary.stress_pre)?;
        writeln!(out, "Stress after:   {}", summary.stress_post)?;
        if let Some(pct) = summary.improvement_percentage() {
            writeln!(out, "Improvement:    {}%", pct)?;
        }
        writeln!(out, "Duration:       {}m {}s", summary.duration / 60, summary.duration % 60)?;
        writeln!(out, "{}", summary.feedback().green())?;
        writeln!(out, "{}", "─".repeat(40).dimmed())?;
        writeln!(
            out,
            "{}",
            format!(
                "🔥 Streak: {} day(s) · {} session(s) total · {}",
                streak.count,
                streak.total_sessions,
                streak.tier()
            )
            .cyan()
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use wren_storage::{Clock, FixedClock};

    fn store_on(clock: &Arc<FixedClock>) -> LocalStore {
        LocalStore::in_memory().with_clock(Arc::clone(clock) as Arc<dyn Clock>)
    }

    fn run(store: &LocalStore, input: &str) -> (FlowOutcome, String) {
        colored::control::set_override(false);
        let mut output = Vec::new();
        let outcome = SessionFlow::new(
            store.clone(),
            SessionOptions::default(),
            Cursor::new(input.to_string()),
            &mut output,
        )
        .run()
        .unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_full_session_records_streak() {
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 8, 0));
        let store = store_on(&clock);

        let (outcome, output) = run(&store, "4\n\n\nfeeling calmer\n\n1\n");
        let FlowOutcome::Completed { summary, streak } = outcome else {
            panic!("session should complete");
        };

        assert_eq!(summary.stress_pre, 4);
        assert_eq!(summary.stress_post, 1);
        assert_eq!(streak.count, 1);
        assert!(output.contains("You: feeling calmer"));
        assert!(output.contains("Session Summary"));
        assert!(output.contains("Improvement:    75%"));
        assert_eq!(store.read_session_flag(), "complete");
        let stress = store.read_stress_snapshot().unwrap();
        assert_eq!((stress.pre, stress.post), (Some(4), Some(1)));
        assert_eq!(store.read_in_progress_session(), None);
    }

    #[test]
    fn test_invalid_stress_is_asked_again() {
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 8, 0));
        let store = store_on(&clock);

        let (outcome, output) = run(&store, "9\nabc\n2\n\n\n\n\n");
        assert!(output.contains("out of range"));
        assert!(output.contains("Not a number: abc"));
        let FlowOutcome::Completed { summary, .. } = outcome else {
            panic!("session should complete");
        };
        assert_eq!(summary.stress_pre, 2);
        assert_eq!(summary.stress_post, 3);
    }

    #[test]
    fn test_quit_pauses_and_next_run_resumes() {
        let clock = Arc::new(FixedClock::at(2024, 1, 1, 8, 0));
        let store = store_on(&clock);

        let (outcome, _) = run(&store, "5\n\nquit\n");
        assert_eq!(outcome, FlowOutcome::Paused { phase: Phase::Breathing });
        assert_eq!(store.read_session_flag(), "breathing");

        let (outcome, output) = run(&store.open_sibling(), "\n\n2\n");
        assert!(output.contains("Resuming your session at the breathing step"));
        let FlowOutcome::Completed { summary, .. } = outcome else {
            panic!("session should complete");
        };
        assert_eq!(summary.stress_pre, 5);
        assert_eq!(summary.stress_post, 2);
    }

    /// 终端关闭后写入 "paused" 提示时失败
    struct ClosedOnPause(Vec<u8>);

    impl Write for ClosedOnPause {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if String::from_utf8_lossy(buf).contains("paused") {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_pause_propagates_output_errors() {
        colored::control::set_override(false);
        let store = LocalStore::in_memory();
        let result = SessionFlow::new(
            store.clone(),
            SessionOptions::default(),
            Cursor::new("3\n\nquit\n".to_string()),
            ClosedOnPause(Vec::new()),
        )
        .run();

        let err = result.unwrap_err();
        let io_err = err.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io_err.kind(), std::io::ErrorKind::BrokenPipe);
        assert_eq!(store.read_session_flag(), "breathing");
    }

    #[test]
    fn test_end_of_input_pauses() {
        let store = LocalStore::in_memory();
        let (outcome, _) = run(&store, "");
        assert_eq!(outcome, FlowOutcome::Paused { phase: Phase::Idle });
        assert_eq!(store.read_streak().total_sessions, 0);
    }
}
