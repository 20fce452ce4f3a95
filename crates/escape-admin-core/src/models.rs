//! Wire types exchanged with the escape room REST backend.
//!
//! Rooms, puzzles and students are owned by the server; the console only
//! holds the latest fetched copy for rendering.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{AdminError, Result};

/// Server-assigned identifier of a user, room or puzzle.
pub type Id = i64;

/// Default time limit of a new room in minutes.
pub const DEFAULT_ROOM_MINUTES: u32 = 60;

/// Default points awarded for a puzzle.
pub const DEFAULT_PUZZLE_POINTS: i32 = 10;

/// Default puzzle time limit in seconds.
pub const DEFAULT_PUZZLE_SECONDS: u32 = 300;

// ============================================================================
// Users
// ============================================================================

/// Account role reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// A teacher; the only role allowed into the admin console.
    Teacher,
    /// A student account.
    Student,
    /// Any role string this client does not know about.
    Other(String),
}

impl Role {
    fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "teacher" => Self::Teacher,
            "student" => Self::Student,
            _ => Self::Other(s.to_string()),
        }
    }

    /// The role as sent on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Teacher => "teacher",
            Self::Student => "student",
            Self::Other(s) => s,
        }
    }

    /// Returns `true` for teacher accounts.
    #[must_use]
    pub const fn is_teacher(&self) -> bool {
        matches!(self, Self::Teacher)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str_case_insensitive(&s))
    }
}

impl Serialize for Role {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// The signed-in user's profile, persisted alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub id: Id,
    /// Login name.
    pub username: String,
    /// Display name, if the user provided one.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Account role.
    pub role: Role,
}

impl UserProfile {
    /// `full_name` when present and non-empty, otherwise `username`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(self.full_name.as_deref(), &self.username)
    }
}

/// A student account as listed on the students tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// User id.
    pub id: Id,
    /// Login name.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Student {
    /// `full_name` when present and non-empty, otherwise `username`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        display_name(self.full_name.as_deref(), &self.username)
    }
}

fn display_name<'a>(full_name: Option<&'a str>, username: &'a str) -> &'a str {
    match full_name {
        Some(name) if !name.trim().is_empty() => name,
        _ => username,
    }
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    /// Login name.
    pub username: &'a str,
    /// Plain-text password.
    pub password: &'a str,
}

/// Response of `POST /api/auth/login`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for subsequent calls.
    pub access_token: String,
    /// Token type, always `bearer`.
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// The authenticated user.
    pub user: UserProfile,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    /// Requested login name.
    pub username: &'a str,
    /// Plain-text password.
    pub password: &'a str,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<&'a str>,
    /// Requested role; the console only registers teachers.
    pub role: Role,
}

/// Response of `POST /api/admin/approve-teacher/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApprovalResponse {
    /// Human-readable result.
    #[serde(default)]
    pub message: String,
    /// `true` if the account was approved, `false` if it was rejected.
    pub approved: bool,
}

// ============================================================================
// Rooms
// ============================================================================

/// An escape room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Room id.
    pub id: Id,
    /// Room name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Time limit in minutes.
    pub time_limit_minutes: u32,
    /// Whether students can currently play the room.
    #[serde(default)]
    pub is_active: bool,
    /// Owning teacher.
    #[serde(default)]
    pub teacher_id: Option<Id>,
    /// Creation time.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/admin/rooms` and `PUT /api/admin/rooms/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewRoom {
    /// Room name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Time limit in minutes.
    pub time_limit_minutes: u32,
}

impl NewRoom {
    /// Creates a room draft with the default time limit.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            time_limit_minutes: DEFAULT_ROOM_MINUTES,
        }
    }

    /// Sets the description; blank text clears it.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = (!description.trim().is_empty()).then_some(description);
        self
    }

    /// Sets the time limit in minutes.
    #[must_use]
    pub const fn with_time_limit(mut self, minutes: u32) -> Self {
        self.time_limit_minutes = minutes;
        self
    }

    /// Checks the required fields before anything is sent.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AdminError::validation("name", "Room name is required"));
        }
        if self.time_limit_minutes == 0 {
            return Err(AdminError::validation(
                "time_limit_minutes",
                "Time limit must be at least one minute",
            ));
        }
        Ok(())
    }
}

/// Response of `POST /api/admin/rooms/{id}/activate`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ActivateResponse {
    /// The room's state after toggling.
    pub is_active: bool,
}

// ============================================================================
// Puzzles
// ============================================================================

/// A puzzle inside a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    /// Puzzle id.
    pub id: Id,
    /// Room the puzzle belongs to.
    pub room_id: Id,
    /// Title.
    pub title: String,
    /// Type tag such as `multiple_choice` or `h5p_multichoice`.
    pub puzzle_type: String,
    /// Points awarded for a correct answer.
    pub points: i32,
    /// Time limit in seconds.
    pub time_limit_seconds: u32,
    /// Content id of an uploaded H5P package.
    #[serde(default)]
    pub h5p_content_id: Option<String>,
    /// Position within the room.
    #[serde(default)]
    pub order_index: i32,
    /// Puzzle content; the server sends it as a JSON-encoded string.
    #[serde(default)]
    pub h5p_json: Option<JsonValue>,
}

/// Body of `POST /api/admin/puzzles`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPuzzle {
    /// Target room.
    pub room_id: Id,
    /// Title.
    pub title: String,
    /// Puzzle content.
    pub h5p_json: Option<JsonValue>,
    /// Type tag.
    pub puzzle_type: String,
    /// Points awarded for a correct answer.
    pub points: i32,
    /// Time limit in seconds.
    pub time_limit_seconds: u32,
    /// Position within the room.
    pub order_index: i32,
}

/// The multiple-choice authoring form: a question with four answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleChoiceForm {
    /// Puzzle title.
    pub title: String,
    /// The question text.
    pub question: String,
    /// Exactly four answer options.
    pub options: [String; 4],
    /// Index (0-3) of the correct option.
    pub correct: usize,
    /// Points awarded.
    pub points: i32,
}

impl MultipleChoiceForm {
    /// Prefills the form from an existing multiple-choice puzzle.
    ///
    /// Returns `None` if the puzzle content is not a four-answer question.
    #[must_use]
    pub fn from_puzzle(puzzle: &Puzzle) -> Option<Self> {
        let parsed;
        let content = match puzzle.h5p_json.as_ref()? {
            JsonValue::String(encoded) => {
                parsed = serde_json::from_str::<JsonValue>(encoded).ok()?;
                &parsed
            }
            other => other,
        };
        let question = content.get("question")?.as_str()?.to_string();
        let answers = content.get("options")?.as_array()?;
        if answers.len() != 4 {
            return None;
        }
        let mut options: [String; 4] = Default::default();
        for (slot, answer) in options.iter_mut().zip(answers) {
            answer.as_str()?.clone_into(slot);
        }
        let correct = usize::try_from(content.get("correct")?.as_u64()?).ok()?;

        Some(Self {
            title: puzzle.title.clone(),
            question,
            options,
            correct,
            points: puzzle.points,
        })
    }

    /// Validates the form and builds the request body for `room_id`.
    pub fn into_new_puzzle(self, room_id: Id) -> Result<NewPuzzle> {
        if self.title.trim().is_empty() {
            return Err(AdminError::validation("title", "Title is required"));
        }
        if self.question.trim().is_empty() {
            return Err(AdminError::validation("question", "Question is required"));
        }
        if let Some(blank) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(AdminError::validation(
                "options",
                format!("Answer {} is required", blank + 1),
            ));
        }
        if self.correct >= self.options.len() {
            return Err(AdminError::validation(
                "correct",
                "Correct answer must be between 0 and 3",
            ));
        }

        Ok(NewPuzzle {
            room_id,
            title: self.title,
            h5p_json: Some(serde_json::json!({
                "question": self.question,
                "options": self.options,
                "correct": self.correct,
            })),
            puzzle_type: "multiple_choice".to_string(),
            points: self.points,
            time_limit_seconds: DEFAULT_PUZZLE_SECONDS,
            order_index: 0,
        })
    }
}

// ============================================================================
// H5P
// ============================================================================

/// Response of `POST /api/admin/h5p/upload`.
#[derive(Debug, Clone, Deserialize)]
pub struct H5pUploadResponse {
    /// Whether the package was accepted.
    #[serde(default)]
    pub success: bool,
    /// The puzzle created for the package.
    pub puzzle_id: Id,
    /// Content id of the unpacked package.
    pub content_id: String,
    /// Server path of the unpacked content.
    pub content_path: String,
    /// Title taken from `h5p.json`.
    pub title: String,
    /// Puzzle type derived from the package's main library.
    #[serde(rename = "type")]
    pub puzzle_type: String,
}

/// Response of `GET /api/admin/h5p/content/{content_id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct H5pContent {
    /// Content id.
    pub content_id: String,
    /// Parsed `h5p.json` of the package.
    #[serde(default)]
    pub metadata: JsonValue,
    /// Server path of the unpacked content.
    pub content_path: String,
    /// Puzzle using this content.
    pub puzzle_id: Id,
}

impl H5pContent {
    /// Title from the package metadata, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(JsonValue::as_str)
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Accepts RFC 3339 timestamps and the naive ISO timestamps the server emits
/// (interpreted as UTC). Anything unparseable becomes `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }))
}
