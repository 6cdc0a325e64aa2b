use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use chrono::{DateTime, Duration, Utc};
use regex::Regex;

/// Sliding inactivity window for an admin-panel session.
const SESSION_EXPIRY_MINS: i64 = 30;

/// Single-shot admin actions: the next plain-text message from the admin is
/// the action's sole parameter, then the dialog state clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    BlockUser,
    UnblockUser,
    LookupUser,
    BroadcastText,
    BroadcastMedia,
    RemovePersonality,
    EditPersonality,
    AddCredentials,
    RemoveCredentials,
    AddAdmin,
    RemoveAdmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardStep {
    Name,
    Description,
    Prompt,
}

/// Collected fields for the three-step personality wizard. Each answered
/// step stores its field and advances; invalid input re-prompts in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardState {
    pub step: WizardStep,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// What the wizard decided about one admin answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    /// Input rejected; state unchanged, ask again.
    Reprompt(String),
    /// Field accepted; state advanced, ask for the next field.
    Advance(String),
    /// All fields collected. `prompt` is None when the admin skipped it
    /// and the registry should generate one from the description.
    Complete {
        name: String,
        description: String,
        prompt: Option<String>,
    },
}

fn name_charset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9 _-]+$").unwrap())
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Name,
            name: None,
            description: None,
        }
    }

    /// Feed one admin answer into the wizard. Pure transition: mutates the
    /// collected fields and step, never performs I/O.
    pub fn apply(&mut self, input: &str) -> WizardOutcome {
        match self.step {
            WizardStep::Name => {
                let name = input.trim().to_lowercase();
                let chars = name.chars().count();
                if chars < 2 || chars > 50 {
                    return WizardOutcome::Reprompt(
                        "❌ Name must be 2-50 characters. Try again:".to_string(),
                    );
                }
                if !name_charset().is_match(&name) {
                    return WizardOutcome::Reprompt(
                        "❌ Name may only contain letters, digits, spaces, '-' and '_'. Try again:"
                            .to_string(),
                    );
                }
                self.name = Some(name);
                self.step = WizardStep::Description;
                WizardOutcome::Advance(
                    "📝 Step 2/3: Send a short description (10-500 characters):".to_string(),
                )
            }
            WizardStep::Description => {
                let description = input.trim().to_string();
                let chars = description.chars().count();
                if chars < 10 || chars > 500 {
                    return WizardOutcome::Reprompt(
                        "❌ Description must be 10-500 characters. Try again:".to_string(),
                    );
                }
                self.description = Some(description);
                self.step = WizardStep::Prompt;
                WizardOutcome::Advance(
                    "📝 Step 3/3: Send the system prompt (10-2000 characters), or 'skip' to \
                     generate one from the description:"
                        .to_string(),
                )
            }
            WizardStep::Prompt => {
                let input = input.trim();
                let prompt = if input.eq_ignore_ascii_case("skip") {
                    None
                } else {
                    let chars = input.chars().count();
                    if chars < 10 || chars > 2000 {
                        return WizardOutcome::Reprompt(
                            "❌ Prompt must be 10-2000 characters, or 'skip'. Try again:"
                                .to_string(),
                        );
                    }
                    Some(input.to_string())
                };
                // Terminal step: fields are guaranteed present by the
                // earlier transitions.
                WizardOutcome::Complete {
                    name: self.name.clone().unwrap_or_default(),
                    description: self.description.clone().unwrap_or_default(),
                    prompt,
                }
            }
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

/// What the next plain-text message from an admin means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogState {
    SingleShot(AdminAction),
    Wizard(WizardState),
}

#[derive(Debug, Clone)]
struct Session {
    entered_at: DateTime<Utc>,
    dialog: Option<DialogState>,
}

/// Process-wide map from admin user id to panel session and dialog state.
/// Nothing here is persisted; a restart drops all in-flight wizards.
#[derive(Debug, Default)]
pub struct SessionTracker {
    sessions: Mutex<HashMap<i64, Session>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter_panel(&self, user_id: i64) {
        self.enter_panel_at(user_id, Utc::now());
    }

    fn enter_panel_at(&self, user_id: i64, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.entry(user_id).or_insert(Session {
            entered_at: now,
            dialog: None,
        });
        session.entered_at = now;
    }

    /// Refresh the session timestamp. Every admin-panel button press calls
    /// this so navigation keeps the panel alive without text messages.
    pub fn touch(&self, user_id: i64) {
        self.enter_panel(user_id);
    }

    pub fn exit_panel(&self, user_id: i64) {
        self.sessions.lock().unwrap().remove(&user_id);
    }

    /// A user has at most one dialog state; setting a new one replaces any
    /// previous action or wizard step.
    pub fn set_dialog(&self, user_id: i64, state: DialogState) {
        self.set_dialog_at(user_id, state, Utc::now());
    }

    fn set_dialog_at(&self, user_id: i64, state: DialogState, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.entry(user_id).or_insert(Session {
            entered_at: now,
            dialog: None,
        });
        session.entered_at = now;
        session.dialog = Some(state);
    }

    pub fn get_dialog(&self, user_id: i64) -> Option<DialogState> {
        self.get_dialog_at(user_id, Utc::now())
    }

    fn get_dialog_at(&self, user_id: i64, now: DateTime<Utc>) -> Option<DialogState> {
        self.sweep_at(now);
        let sessions = self.sessions.lock().unwrap();
        sessions.get(&user_id).and_then(|s| s.dialog.clone())
    }

    pub fn clear_dialog(&self, user_id: i64) {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(&user_id) {
            session.dialog = None;
        }
    }

    /// Expiry sweep then membership check. True while the user has a live
    /// panel session or dialog state; used as the admin/chat routing gate.
    pub fn is_in_admin_mode(&self, user_id: i64) -> bool {
        self.is_in_admin_mode_at(user_id, Utc::now())
    }

    fn is_in_admin_mode_at(&self, user_id: i64, now: DateTime<Utc>) -> bool {
        self.sweep_at(now);
        self.sessions.lock().unwrap().contains_key(&user_id)
    }

    /// Drop sessions past the inactivity window. Session and dialog state
    /// are stored together, so both go at once.
    fn sweep_at(&self, now: DateTime<Utc>) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .retain(|_, s| now - s.entered_at < Duration::minutes(SESSION_EXPIRY_MINS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panel_entry_makes_user_admin_mode() {
        let tracker = SessionTracker::new();
        assert!(!tracker.is_in_admin_mode(7));
        tracker.enter_panel(7);
        assert!(tracker.is_in_admin_mode(7));
        tracker.exit_panel(7);
        assert!(!tracker.is_in_admin_mode(7));
    }

    #[test]
    fn expired_session_is_purged_on_check() {
        let tracker = SessionTracker::new();
        let opened = Utc::now();
        tracker.enter_panel_at(7, opened);
        tracker.set_dialog_at(7, DialogState::SingleShot(AdminAction::BlockUser), opened);

        let later = opened + Duration::minutes(SESSION_EXPIRY_MINS + 1);
        assert!(!tracker.is_in_admin_mode_at(7, later));
        // The check itself removed the dialog state with the session.
        assert!(tracker.get_dialog_at(7, later).is_none());
    }

    #[test]
    fn touch_extends_the_session_window() {
        let tracker = SessionTracker::new();
        let opened = Utc::now();
        tracker.enter_panel_at(7, opened);

        let mid = opened + Duration::minutes(20);
        tracker.enter_panel_at(7, mid);

        let past_original_window = opened + Duration::minutes(SESSION_EXPIRY_MINS + 5);
        assert!(tracker.is_in_admin_mode_at(7, past_original_window));
    }

    #[test]
    fn clearing_a_dialog_keeps_the_panel_session() {
        let tracker = SessionTracker::new();
        tracker.enter_panel(7);
        tracker.set_dialog(7, DialogState::SingleShot(AdminAction::BroadcastText));

        // Cancelling back to the menu drops the armed action but the admin
        // stays inside the panel.
        tracker.clear_dialog(7);
        assert!(tracker.get_dialog(7).is_none());
        assert!(tracker.is_in_admin_mode(7));
    }

    #[test]
    fn setting_a_dialog_replaces_the_previous_one() {
        let tracker = SessionTracker::new();
        tracker.set_dialog(7, DialogState::SingleShot(AdminAction::BlockUser));
        tracker.set_dialog(7, DialogState::Wizard(WizardState::new()));
        match tracker.get_dialog(7) {
            Some(DialogState::Wizard(w)) => assert_eq!(w.step, WizardStep::Name),
            other => panic!("expected wizard state, got {other:?}"),
        }
    }

    #[test]
    fn wizard_advances_through_all_steps() {
        let mut wizard = WizardState::new();

        match wizard.apply("  Teacher  ") {
            WizardOutcome::Advance(_) => {}
            other => panic!("expected advance, got {other:?}"),
        }
        assert_eq!(wizard.step, WizardStep::Description);
        assert_eq!(wizard.name.as_deref(), Some("teacher"));

        match wizard.apply("Patient and encouraging tutor") {
            WizardOutcome::Advance(_) => {}
            other => panic!("expected advance, got {other:?}"),
        }
        assert_eq!(wizard.step, WizardStep::Prompt);

        match wizard.apply("You explain concepts step by step.") {
            WizardOutcome::Complete {
                name,
                description,
                prompt,
            } => {
                assert_eq!(name, "teacher");
                assert_eq!(description, "Patient and encouraging tutor");
                assert_eq!(prompt.as_deref(), Some("You explain concepts step by step."));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn invalid_name_reprompts_without_advancing() {
        let mut wizard = WizardState::new();
        match wizard.apply("x") {
            WizardOutcome::Reprompt(_) => {}
            other => panic!("expected reprompt, got {other:?}"),
        }
        assert_eq!(wizard.step, WizardStep::Name);
        assert!(wizard.name.is_none());

        match wizard.apply("Sp@ced!") {
            WizardOutcome::Reprompt(_) => {}
            other => panic!("expected reprompt, got {other:?}"),
        }
        assert_eq!(wizard.step, WizardStep::Name);
    }

    #[test]
    fn short_description_reprompts_in_place() {
        let mut wizard = WizardState::new();
        wizard.apply("teacher");
        match wizard.apply("too short") {
            WizardOutcome::Reprompt(_) => {}
            other => panic!("expected reprompt, got {other:?}"),
        }
        assert_eq!(wizard.step, WizardStep::Description);
        assert!(wizard.description.is_none());
    }

    #[test]
    fn wizard_bounds_count_characters_not_bytes() {
        let mut wizard = WizardState::new();
        wizard.apply("tutor");

        // 6 characters but 18 bytes of UTF-8.
        match wizard.apply("नमस्ते") {
            WizardOutcome::Reprompt(_) => {}
            other => panic!("expected reprompt, got {other:?}"),
        }

        // 400 characters but 1200 bytes.
        match wizard.apply(&"न".repeat(400)) {
            WizardOutcome::Advance(_) => {}
            other => panic!("expected advance, got {other:?}"),
        }
    }

    #[test]
    fn skip_leaves_prompt_for_generation() {
        let mut wizard = WizardState::new();
        wizard.apply("teacher");
        wizard.apply("Patient and encouraging tutor");
        match wizard.apply("SKIP") {
            WizardOutcome::Complete { prompt, .. } => assert!(prompt.is_none()),
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
