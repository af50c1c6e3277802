//! Navigation cursor read by a dumb renderer.

/// Current screen. Transitions are driven by controller operations
/// (successful auth → `Dashboard`, `start_quiz` → `Quiz`, `finish_quiz`
/// → `Results`); the renderer itself never decides where to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Login,
    SignUp,
    Dashboard,
    SelectQuiz,
    Quiz,
    Results,
}

/// Recovery rule for stale navigation (e.g. a deep link into `Quiz` after
/// the settings were discarded): fall back to the screen that can rebuild
/// the missing state instead of crashing.
#[must_use]
pub fn resolve(view: View, has_settings: bool, has_summary: bool) -> View {
    match view {
        View::Quiz if !has_settings => View::SelectQuiz,
        View::Results if !has_summary => View::Dashboard,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_without_settings_falls_back_to_select() {
        assert_eq!(resolve(View::Quiz, false, false), View::SelectQuiz);
        assert_eq!(resolve(View::Quiz, true, false), View::Quiz);
    }

    #[test]
    fn results_without_summary_falls_back_to_dashboard() {
        assert_eq!(resolve(View::Results, false, false), View::Dashboard);
        assert_eq!(resolve(View::Results, false, true), View::Results);
    }

    #[test]
    fn other_views_pass_through() {
        for view in [View::Login, View::SignUp, View::Dashboard, View::SelectQuiz] {
            assert_eq!(resolve(view, false, false), view);
        }
    }
}
