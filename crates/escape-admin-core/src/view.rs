//! Dashboard view state and list markup.
//!
//! The controller keeps what the admin page would show: the active screen and
//! tab, one modal slot, the login error banner and the rendered markup of each
//! list. Lists are rebuilt from scratch from the latest fetched data.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{
    Id, MultipleChoiceForm, Puzzle, Room, Student, UserProfile, DEFAULT_PUZZLE_POINTS,
    DEFAULT_ROOM_MINUTES,
};

/// Placeholder shown for an empty room list.
pub const NO_ROOMS: &str = "No rooms yet. Create your first room!";

/// Placeholder shown for an empty puzzle list.
pub const NO_PUZZLES: &str = "No puzzles yet.";

/// Placeholder shown for an empty student list.
pub const NO_STUDENTS: &str = "No students yet.";

/// Leading option of the room select.
pub const SELECT_ROOM_PROMPT: &str = "Select a room...";

/// Top-level screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Login and registration.
    #[default]
    Login,
    /// The tabbed dashboard.
    Dashboard,
}

/// Dashboard tab; each tab owns one content panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    /// Room management.
    #[default]
    Rooms,
    /// Puzzles of the selected room.
    Puzzles,
    /// Student accounts.
    Students,
}

impl Tab {
    /// All tabs in display order.
    pub const ALL: [Self; 3] = [Self::Rooms, Self::Puzzles, Self::Students];

    /// Tab name, also used as the panel id prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rooms => "rooms",
            Self::Puzzles => "puzzles",
            Self::Students => "students",
        }
    }

    /// Id of the tab's content panel.
    #[must_use]
    pub fn panel_id(self) -> String {
        format!("{}-tab", self.as_str())
    }
}

impl std::fmt::Display for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contents of the shared modal overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    /// Heading.
    pub title: String,
    /// Body markup.
    pub body: String,
}

/// View state of the admin console.
#[derive(Debug, Clone, Default)]
pub struct ViewController {
    screen: Screen,
    active_tab: Tab,
    modal: Option<Modal>,
    login_error: Option<String>,
    user_name: Option<String>,
    rooms_html: String,
    puzzles_html: String,
    students_html: String,
    room_select_html: String,
}

impl ViewController {
    /// Creates a controller showing the login screen.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current screen.
    #[must_use]
    pub const fn screen(&self) -> Screen {
        self.screen
    }

    /// Active tab.
    #[must_use]
    pub const fn active_tab(&self) -> Tab {
        self.active_tab
    }

    /// Returns `true` if `tab` and its panel are the active ones.
    #[must_use]
    pub fn is_tab_active(&self, tab: Tab) -> bool {
        self.active_tab == tab
    }

    /// Name shown in the dashboard header.
    #[must_use]
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    /// Text of the login error banner, if shown.
    #[must_use]
    pub fn login_error(&self) -> Option<&str> {
        self.login_error.as_deref()
    }

    /// Rendered room list.
    #[must_use]
    pub fn rooms_html(&self) -> &str {
        &self.rooms_html
    }

    /// Rendered puzzle list.
    #[must_use]
    pub fn puzzles_html(&self) -> &str {
        &self.puzzles_html
    }

    /// Rendered student list.
    #[must_use]
    pub fn students_html(&self) -> &str {
        &self.students_html
    }

    /// Rendered room select options.
    #[must_use]
    pub fn room_select_html(&self) -> &str {
        &self.room_select_html
    }

    // ------------------------------------------------------------------------
    // Screens
    // ------------------------------------------------------------------------

    /// Shows the dashboard for `user` on the rooms tab.
    pub fn show_dashboard(&mut self, user: &UserProfile) {
        self.screen = Screen::Dashboard;
        self.user_name = Some(user.display_name().to_string());
        self.login_error = None;
        self.active_tab = Tab::Rooms;
    }

    /// Returns to an empty login screen, dropping all rendered data.
    pub fn show_login(&mut self) {
        *self = Self::default();
    }

    /// Shows `message` in the login error banner.
    pub fn show_login_error(&mut self, message: impl Into<String>) {
        self.login_error = Some(message.into());
    }

    /// Hides the login error banner.
    pub fn clear_login_error(&mut self) {
        self.login_error = None;
    }

    /// Activates `tab` and returns it as the list to reload.
    pub fn switch_tab(&mut self, tab: Tab) -> Tab {
        self.active_tab = tab;
        tab
    }

    // ------------------------------------------------------------------------
    // Modal
    // ------------------------------------------------------------------------

    /// Replaces the modal content and opens it.
    pub fn show_modal(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.modal = Some(Modal {
            title: title.into(),
            body: body.into(),
        });
    }

    /// Closes the modal.
    pub fn close_modal(&mut self) {
        self.modal = None;
    }

    /// The open modal, if any.
    #[must_use]
    pub const fn modal(&self) -> Option<&Modal> {
        self.modal.as_ref()
    }

    // ------------------------------------------------------------------------
    // Lists
    // ------------------------------------------------------------------------

    /// Rebuilds the room list.
    pub fn render_rooms(&mut self, rooms: &[Room]) {
        self.rooms_html = render_rooms(rooms);
    }

    /// Rebuilds the puzzle list.
    pub fn render_puzzles(&mut self, puzzles: &[Puzzle]) {
        self.puzzles_html = render_puzzles(puzzles);
    }

    /// Rebuilds the student list.
    pub fn render_students(&mut self, students: &[Student]) {
        self.students_html = render_students(students);
    }

    /// Rebuilds the room select, marking `selected` if it is still listed.
    pub fn render_room_select(&mut self, rooms: &[Room], selected: Option<Id>) {
        self.room_select_html = render_room_select(rooms, selected);
    }
}

// ============================================================================
// Markup
// ============================================================================

/// Escapes text for use in HTML content and attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn placeholder(text: &str) -> String {
    format!(r#"<p class="empty">{text}</p>"#)
}

/// Room cards, or the "no rooms" placeholder.
#[must_use]
pub fn render_rooms(rooms: &[Room]) -> String {
    if rooms.is_empty() {
        return placeholder(NO_ROOMS);
    }
    let mut html = String::new();
    for room in rooms {
        let (class, label, toggle) = if room.is_active {
            ("active", "Active", "Deactivate")
        } else {
            ("inactive", "Inactive", "Activate")
        };
        let description = room
            .description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .map_or_else(|| "No description".to_string(), escape_html);
        let _ = write!(
            html,
            r#"<div class="room-card" data-room-id="{id}"><h3>{name}</h3><span class="status {class}">{label}</span><p>{description}</p><p class="meta">{minutes} minutes</p><div class="actions"><button data-action="toggle">{toggle}</button><button data-action="edit">Edit</button><button data-action="delete">Delete</button></div></div>"#,
            id = room.id,
            name = escape_html(&room.name),
            minutes = room.time_limit_minutes,
        );
    }
    html
}

/// Puzzle cards, or the "no puzzles" placeholder.
#[must_use]
pub fn render_puzzles(puzzles: &[Puzzle]) -> String {
    if puzzles.is_empty() {
        return placeholder(NO_PUZZLES);
    }
    let mut html = String::new();
    for puzzle in puzzles {
        let preview = puzzle.h5p_content_id.as_deref().map_or_else(String::new, |id| {
            format!(
                r#"<button data-action="preview" data-content-id="{}">Preview</button>"#,
                escape_html(id)
            )
        });
        let _ = write!(
            html,
            r#"<div class="item-card" data-puzzle-id="{id}"><div class="item-info"><h4>{title}</h4><p>Type: {kind} | Points: {points} | Time: {seconds}s</p></div><div class="item-actions">{preview}<button data-action="delete">Delete</button></div></div>"#,
            id = puzzle.id,
            title = escape_html(&puzzle.title),
            kind = escape_html(&puzzle.puzzle_type),
            points = puzzle.points,
            seconds = puzzle.time_limit_seconds,
        );
    }
    html
}

/// Student cards, or the "no students" placeholder.
#[must_use]
pub fn render_students(students: &[Student]) -> String {
    if students.is_empty() {
        return placeholder(NO_STUDENTS);
    }
    let mut html = String::new();
    for student in students {
        let _ = write!(
            html,
            r#"<div class="item-card" data-student-id="{id}"><div class="item-info"><h4>{name}</h4><p>@{username}</p></div><div class="item-actions"><button data-action="delete">Delete</button></div></div>"#,
            id = student.id,
            name = escape_html(student.display_name()),
            username = escape_html(&student.username),
        );
    }
    html
}

/// `<option>` list with a leading prompt.
#[must_use]
pub fn render_room_select(rooms: &[Room], selected: Option<Id>) -> String {
    let mut html = format!(r#"<option value="">{SELECT_ROOM_PROMPT}</option>"#);
    for room in rooms {
        let marker = if selected == Some(room.id) { " selected" } else { "" };
        let _ = write!(
            html,
            r#"<option value="{id}"{marker}>{name}</option>"#,
            id = room.id,
            name = escape_html(&room.name),
        );
    }
    html
}

/// Create/edit form for a room, prefilled from `room` when editing.
#[must_use]
pub fn room_form(room: Option<&Room>) -> String {
    let name = room.map(|r| escape_html(&r.name)).unwrap_or_default();
    let description = room
        .and_then(|r| r.description.as_deref())
        .map(escape_html)
        .unwrap_or_default();
    let minutes = room.map_or(DEFAULT_ROOM_MINUTES, |r| r.time_limit_minutes);
    format!(
        r#"<form id="room-form"><label>Name <input type="text" name="name" value="{name}" required></label><label>Description <textarea name="description">{description}</textarea></label><label>Time limit (minutes) <input type="number" name="time_limit_minutes" value="{minutes}" min="1"></label><button type="submit">Save</button></form>"#
    )
}

/// Multiple-choice puzzle form with four answers, prefilled from `puzzle`
/// when editing.
#[must_use]
pub fn puzzle_form(puzzle: Option<&MultipleChoiceForm>) -> String {
    let title = puzzle.map(|p| escape_html(&p.title)).unwrap_or_default();
    let question = puzzle.map(|p| escape_html(&p.question)).unwrap_or_default();
    let options = puzzle.map(|p| p.options.clone()).unwrap_or_default();
    let mut answers = String::new();
    for (i, option) in options.iter().enumerate() {
        let value = escape_html(option);
        let _ = write!(
            answers,
            r#"<label>Answer {n} <input type="text" name="option{i}" value="{value}" required></label>"#,
            n = i + 1,
        );
    }
    let selected = puzzle.map_or(0, |p| p.correct);
    let mut correct = String::new();
    for i in 0..4 {
        let attr = if i == selected { " selected" } else { "" };
        let _ = write!(correct, r#"<option value="{i}"{attr}>Answer {}</option>"#, i + 1);
    }
    let points = puzzle.map_or(DEFAULT_PUZZLE_POINTS, |p| p.points);
    let submit = if puzzle.is_some() { "Save" } else { "Create" };
    format!(
        r#"<form id="puzzle-form"><label>Title <input type="text" name="title" value="{title}" required></label><label>Question <textarea name="question" required>{question}</textarea></label>{answers}<label>Correct answer <select name="correct">{correct}</select></label><label>Points <input type="number" name="points" value="{points}"></label><button type="submit">{submit}</button></form>"#
    )
}
