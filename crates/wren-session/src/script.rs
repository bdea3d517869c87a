//! 各阶段的固定引导文案

use crate::phase::Phase;

const INTRO: &str = "Hello! I'm Wren, your meditation guide. Let's begin with a gentle breathing exercise. Take a moment to get comfortable.";

const BREATHING: &str = "Perfect. Now, let's focus on your breath. Breathe in slowly for 4 counts... hold for 4... and breathe out for 6. Feel your body relaxing with each exhale.";

const GUIDANCE: &str = "Wonderful. As you continue breathing, imagine a warm, calming light surrounding you. This light represents peace and tranquility. Let it wash away any tension or stress.";

const COMPLETE: &str = "You've done beautifully. Take a moment to notice how you feel right now. When you're ready, we'll wrap up this session.";

/// 阶段对应的文案；idle 没有文案
///
/// `complete` 的文案只给总结页使用，进入该阶段时不会追加消息。
pub fn script_for(phase: Phase) -> Option<&'static str> {
    match phase {
        Phase::Idle => None,
        Phase::Intro => Some(INTRO),
        Phase::Breathing => Some(BREATHING),
        Phase::Guidance => Some(GUIDANCE),
        Phase::Complete => Some(COMPLETE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_phase_but_idle_has_script() {
        assert!(script_for(Phase::Idle).is_none());
        for phase in &Phase::SEQUENCE[1..] {
            assert!(script_for(*phase).is_some());
        }
    }
}
