//! Input and notice chrome around the conversation.
//!
//! DESIGN
//! ======
//! Keeps presentation concerns (input box, send/stop buttons, notices,
//! settings route) out of the conversation so the query lifecycle can toggle
//! them in one place.

#[cfg(test)]
#[path = "ui_test.rs"]
mod ui_test;

const MAX_NOTICES: usize = 20;

/// Which primary view is shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Route {
    #[default]
    Chat,
    /// Connection settings, reached from the database guard card.
    ConnectionSettings,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient message shown next to the conversation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UiState {
    pub input_text: String,
    pub input_enabled: bool,
    pub send_visible: bool,
    pub stop_visible: bool,
    /// Last `status` event reported by the backend for the running query.
    pub status_badge: Option<String>,
    pub route: Route,
    pub notices: Vec<Notice>,
    next_notice_id: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            input_text: String::new(),
            input_enabled: true,
            send_visible: true,
            stop_visible: false,
            status_badge: None,
            route: Route::Chat,
            notices: Vec::new(),
            next_notice_id: 1,
        }
    }
}

impl UiState {
    /// Add a notice, dropping the oldest past the cap. Returns its id.
    pub fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) -> u64 {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices
            .push(Notice { id, level, message: message.into() });
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
        id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }

    /// Lock the input and swap send for stop while a query runs.
    pub fn enter_processing(&mut self) {
        self.input_text.clear();
        self.input_enabled = false;
        self.send_visible = false;
        self.stop_visible = true;
        self.status_badge = None;
    }

    pub fn leave_processing(&mut self) {
        self.input_enabled = true;
        self.send_visible = true;
        self.stop_visible = false;
        self.status_badge = None;
    }

    /// Put previously submitted text back into the input.
    pub fn restore_input(&mut self, text: &str) {
        self.input_text = text.to_owned();
    }
}
