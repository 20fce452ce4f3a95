//! The admin console: one object owning session, API client, auth state,
//! view state, room selection and the preview loader.
//!
//! Every handler takes `&mut self` and awaits at most its own network calls.
//! A 401 from any authenticated call clears the stored session and returns
//! the console to the login screen.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::{AuthStatus, LoginForm, RegisterForm, RegisterOutcome};
use crate::config::{Config, Features};
use crate::error::{AdminError, Result};
use crate::models::{
    H5pContent, H5pUploadResponse, Id, MultipleChoiceForm, NewRoom, Puzzle, Room, Student,
    UserProfile,
};
use crate::preview::{H5pViewer, LibraryLoader, PreviewLoader, PreviewState, StandalonePageViewer};
use crate::session::{FileStorage, Session, SessionStore, Storage};
use crate::view::{self, Tab, ViewController};

const LOGIN_FAILED_BANNER: &str = "Login failed. Please check your credentials.";
const NOT_TEACHER_BANNER: &str = "Only teachers can sign in here.";
const SESSION_EXPIRED_BANNER: &str = "Your session has expired. Please log in again.";

/// The escape room admin console.
#[derive(Debug)]
pub struct AdminConsole<S, V = StandalonePageViewer> {
    config: Config,
    api: ApiClient,
    sessions: SessionStore<S>,
    status: AuthStatus,
    user: Option<UserProfile>,
    view: ViewController,
    rooms: Vec<Room>,
    puzzles: Vec<Puzzle>,
    students: Vec<Student>,
    pending_teachers: Vec<UserProfile>,
    selected_room: Option<Id>,
    preview: PreviewLoader<V>,
}

impl AdminConsole<FileStorage, StandalonePageViewer> {
    /// Console persisting its session to `config.session_file` and writing
    /// previews as standalone pages.
    pub fn from_config(config: Config) -> Result<Self> {
        let storage = FileStorage::new(&config.session_file);
        let viewer = StandalonePageViewer::new(config.api_base.clone(), &config.preview);
        Self::new(config, storage, viewer)
    }
}

impl<S: Storage, V: H5pViewer> AdminConsole<S, V> {
    /// Creates a logged-out console.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` does not validate.
    pub fn new(config: Config, storage: S, viewer: V) -> Result<Self> {
        config.validate()?;
        let api = ApiClient::from_config(&config)?;
        let preview = PreviewLoader::new(viewer, &config.preview);
        Ok(Self {
            config,
            api,
            sessions: SessionStore::new(storage),
            status: AuthStatus::LoggedOut,
            user: None,
            view: ViewController::new(),
            rooms: Vec::new(),
            puzzles: Vec::new(),
            students: Vec::new(),
            pending_teachers: Vec::new(),
            selected_room: None,
            preview,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Active configuration.
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Enabled features.
    pub const fn features(&self) -> &Features {
        &self.config.features
    }

    /// Auth status.
    pub const fn status(&self) -> AuthStatus {
        self.status
    }

    /// The signed-in teacher.
    pub const fn user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    /// View state.
    pub const fn view(&self) -> &ViewController {
        &self.view
    }

    /// Rooms from the last load.
    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    /// Puzzles of the selected room from the last load.
    pub fn puzzles(&self) -> &[Puzzle] {
        &self.puzzles
    }

    /// Students from the last load.
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    /// Teacher registrations awaiting approval, from the last load.
    pub fn pending_teachers(&self) -> &[UserProfile] {
        &self.pending_teachers
    }

    /// Room selected on the puzzles tab.
    pub const fn selected_room(&self) -> Option<Id> {
        self.selected_room
    }

    /// The session store.
    pub const fn sessions(&self) -> &SessionStore<S> {
        &self.sessions
    }

    /// The preview loader.
    pub const fn preview(&self) -> &PreviewLoader<V> {
        &self.preview
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// Resumes a stored session without asking the server.
    ///
    /// Returns `true` if the console is now logged in.
    pub fn restore(&mut self) -> Result<bool> {
        if self.status == AuthStatus::LoggedIn {
            return Ok(true);
        }
        match self.sessions.restore()? {
            Some(session) => {
                self.status.transition(AuthStatus::LoggedIn)?;
                self.enter_dashboard(session);
                Ok(true)
            }
            None => {
                self.view.show_login();
                Ok(false)
            }
        }
    }

    /// Logs in a teacher.
    ///
    /// Empty fields are rejected before any request. Accounts whose role is
    /// not `teacher` are refused after the server answers and nothing is
    /// stored.
    pub async fn login(&mut self, form: &LoginForm) -> Result<&UserProfile> {
        self.view.clear_login_error();
        if let Err(e) = form.validate() {
            self.show_banner(&e);
            return Err(e);
        }
        self.status.transition(AuthStatus::LoggingIn)?;

        let response = match self.api.login(form.username.trim(), &form.password).await {
            Ok(response) => response,
            Err(e) => {
                self.status.transition(AuthStatus::LoggedOut)?;
                let e = match e.status() {
                    Some(400 | 401 | 403) => AdminError::LoginFailed,
                    _ => e,
                };
                self.show_banner(&e);
                return Err(e);
            }
        };

        if !response.user.role.is_teacher() {
            self.status.transition(AuthStatus::LoggedOut)?;
            warn!(username = %response.user.username, role = %response.user.role, "Rejected non-teacher login");
            let e = AdminError::NotTeacher {
                role: response.user.role.to_string(),
            };
            self.show_banner(&e);
            return Err(e);
        }

        let session = Session {
            token: response.access_token,
            user: response.user,
        };
        if let Err(e) = self.sessions.save(&session) {
            self.status.transition(AuthStatus::LoggedOut)?;
            return Err(e);
        }
        self.status.transition(AuthStatus::LoggedIn)?;
        info!(user_id = session.user.id, username = %session.user.username, "Logged in");
        self.enter_dashboard(session);
        self.user.as_ref().ok_or(AdminError::NotLoggedIn)
    }

    /// Registers a teacher account. The console stays logged out.
    pub async fn register(&mut self, form: &RegisterForm) -> Result<RegisterOutcome> {
        Features::require(self.config.features.registration, "registration")?;
        if let Err(e) = form.validate() {
            self.show_banner(&e);
            return Err(e);
        }
        self.status.transition(AuthStatus::Registering)?;

        let result = self.api.register(&form.to_request()).await;
        self.status.transition(AuthStatus::LoggedOut)?;

        let user = match result {
            Ok(user) => user,
            Err(e) => {
                self.show_banner(&e);
                return Err(e);
            }
        };
        info!(user_id = user.id, username = %user.username, "Registered teacher account");
        Ok(if self.config.features.registration_requires_approval {
            RegisterOutcome::PendingApproval
        } else {
            RegisterOutcome::Registered
        })
    }

    /// Clears the session and all loaded data and shows the login screen.
    pub async fn logout(&mut self) -> Result<()> {
        let closed = self.preview.close().await;
        let cleared = self.sessions.clear();
        self.reset_to_login();
        info!("Logged out");
        cleared.and(closed)
    }

    fn enter_dashboard(&mut self, session: Session) {
        self.api.set_token(Some(session.token));
        self.view.show_dashboard(&session.user);
        self.user = Some(session.user);
    }

    fn reset_to_login(&mut self) {
        self.api.set_token(None);
        self.user = None;
        self.rooms.clear();
        self.puzzles.clear();
        self.students.clear();
        self.pending_teachers.clear();
        self.selected_room = None;
        self.status = AuthStatus::LoggedOut;
        self.view.show_login();
    }

    fn show_banner(&mut self, error: &AdminError) {
        let text = match error {
            AdminError::Validation { message, .. } => message.as_str(),
            AdminError::NotTeacher { .. } => NOT_TEACHER_BANNER,
            AdminError::SessionExpired => SESSION_EXPIRED_BANNER,
            AdminError::Api {
                detail: Some(detail),
                ..
            } => detail.as_str(),
            _ => LOGIN_FAILED_BANNER,
        };
        self.view.show_login_error(text);
    }

    fn require_login(&self) -> Result<()> {
        if self.status == AuthStatus::LoggedIn {
            Ok(())
        } else {
            Err(AdminError::NotLoggedIn)
        }
    }

    /// Passes `result` through, except that a 401 ends the session.
    async fn check_auth<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if e.status() == Some(401) => {
                warn!(error = %e, "Server rejected the session token; logging out");
                if let Err(clear_err) = self.sessions.clear() {
                    warn!(error = %clear_err, "Failed to clear stored session");
                }
                if let Err(close_err) = self.preview.close().await {
                    warn!(error = %close_err, "Failed to close preview");
                }
                self.reset_to_login();
                let expired = AdminError::SessionExpired;
                self.show_banner(&expired);
                Err(expired)
            }
            other => other,
        }
    }

    // ------------------------------------------------------------------------
    // Tabs and modal
    // ------------------------------------------------------------------------

    /// Activates `tab` and reloads its list.
    pub async fn switch_tab(&mut self, tab: Tab) -> Result<()> {
        if tab == Tab::Students {
            Features::require(self.config.features.students, "students")?;
        }
        let reload = self.view.switch_tab(tab);
        debug!(tab = %reload, "Switched tab");
        match reload {
            Tab::Rooms => self.load_rooms().await.map(drop),
            Tab::Puzzles => self.load_puzzle_tab().await,
            Tab::Students => self.load_students().await.map(drop),
        }
    }

    /// Opens the room form, prefilled when editing `room_id`.
    pub fn show_room_form(&mut self, room_id: Option<Id>) {
        let room = room_id.and_then(|id| self.rooms.iter().find(|r| r.id == id));
        let title = if room.is_some() { "Edit room" } else { "New room" };
        let body = view::room_form(room);
        self.view.show_modal(title, body);
    }

    /// Opens the puzzle form, prefilled when `puzzle_id` names a loaded
    /// multiple-choice puzzle; a room has to be selected.
    pub fn show_puzzle_form(&mut self, puzzle_id: Option<Id>) -> Result<()> {
        self.selected_room.ok_or(AdminError::NoRoomSelected)?;
        let existing = puzzle_id
            .and_then(|id| self.puzzles.iter().find(|p| p.id == id))
            .and_then(MultipleChoiceForm::from_puzzle);
        let title = if existing.is_some() { "Edit puzzle" } else { "New puzzle" };
        self.view.show_modal(title, view::puzzle_form(existing.as_ref()));
        Ok(())
    }

    /// Closes the modal.
    pub fn close_modal(&mut self) {
        self.view.close_modal();
    }

    // ------------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------------

    /// Fetches and renders the room list.
    pub async fn load_rooms(&mut self) -> Result<&[Room]> {
        self.require_login()?;
        let result = self.api.list_rooms().await;
        let rooms = self.check_auth(result).await?;
        debug!(count = rooms.len(), "Loaded rooms");
        self.view.render_rooms(&rooms);
        self.rooms = rooms;
        Ok(&self.rooms)
    }

    /// Creates a room and reloads the list.
    pub async fn create_room(&mut self, room: &NewRoom) -> Result<Room> {
        room.validate()?;
        self.require_login()?;
        let result = self.api.create_room(room).await;
        let created = self.check_auth(result).await?;
        info!(room_id = created.id, name = %created.name, "Created room");
        self.view.close_modal();
        self.load_rooms().await?;
        Ok(created)
    }

    /// Replaces a room's name, description and time limit.
    pub async fn update_room(&mut self, room_id: Id, room: &NewRoom) -> Result<Room> {
        room.validate()?;
        self.require_login()?;
        let result = self.api.update_room(room_id, room).await;
        let updated = self.check_auth(result).await?;
        info!(room_id, "Updated room");
        self.view.close_modal();
        self.load_rooms().await?;
        Ok(updated)
    }

    /// Flips a room between active and inactive; returns the new state.
    pub async fn toggle_room(&mut self, room_id: Id) -> Result<bool> {
        self.require_login()?;
        let result = self.api.toggle_room(room_id).await;
        let response = self.check_auth(result).await?;
        info!(room_id, is_active = response.is_active, "Toggled room");
        self.load_rooms().await?;
        Ok(response.is_active)
    }

    /// Deletes a room.
    pub async fn delete_room(&mut self, room_id: Id) -> Result<()> {
        self.require_login()?;
        let result = self.api.delete_room(room_id).await;
        self.check_auth(result).await?;
        info!(room_id, "Deleted room");
        if self.selected_room == Some(room_id) {
            self.selected_room = None;
            self.puzzles.clear();
            self.view.render_puzzles(&[]);
        }
        self.load_rooms().await.map(drop)
    }

    // ------------------------------------------------------------------------
    // Puzzles
    // ------------------------------------------------------------------------

    /// Rebuilds the room select and the selected room's puzzles.
    async fn load_puzzle_tab(&mut self) -> Result<()> {
        self.require_login()?;
        let result = self.api.list_rooms().await;
        let rooms = self.check_auth(result).await?;
        if let Some(id) = self.selected_room {
            if !rooms.iter().any(|r| r.id == id) {
                self.selected_room = None;
            }
        }
        self.view.render_room_select(&rooms, self.selected_room);
        self.view.render_rooms(&rooms);
        self.rooms = rooms;

        if self.selected_room.is_some() {
            self.load_puzzles().await.map(drop)
        } else {
            self.puzzles.clear();
            self.view.render_puzzles(&[]);
            Ok(())
        }
    }

    /// Selects a room on the puzzles tab and loads its puzzles; `None`
    /// clears the selection.
    pub async fn select_room(&mut self, room_id: Option<Id>) -> Result<&[Puzzle]> {
        self.selected_room = room_id;
        self.view.render_room_select(&self.rooms, room_id);
        if room_id.is_none() {
            self.puzzles.clear();
            self.view.render_puzzles(&[]);
            return Ok(&self.puzzles);
        }
        self.load_puzzles().await
    }

    /// Fetches and renders the puzzles of the selected room.
    pub async fn load_puzzles(&mut self) -> Result<&[Puzzle]> {
        let room_id = self.selected_room.ok_or(AdminError::NoRoomSelected)?;
        self.require_login()?;
        let result = self.api.list_puzzles(room_id).await;
        let puzzles = self.check_auth(result).await?;
        debug!(room_id, count = puzzles.len(), "Loaded puzzles");
        self.view.render_puzzles(&puzzles);
        self.puzzles = puzzles;
        Ok(&self.puzzles)
    }

    /// Creates a multiple-choice puzzle in the selected room.
    pub async fn create_puzzle(&mut self, form: MultipleChoiceForm) -> Result<Puzzle> {
        let room_id = self.selected_room.ok_or(AdminError::NoRoomSelected)?;
        let puzzle = form.into_new_puzzle(room_id)?;
        self.require_login()?;
        let result = self.api.create_puzzle(&puzzle).await;
        let created = self.check_auth(result).await?;
        info!(puzzle_id = created.id, room_id, "Created puzzle");
        self.view.close_modal();
        self.load_puzzles().await?;
        Ok(created)
    }

    /// Replaces a multiple-choice puzzle of the selected room.
    ///
    /// Time limit and position are kept from the loaded puzzle.
    pub async fn update_puzzle(
        &mut self,
        puzzle_id: Id,
        form: MultipleChoiceForm,
    ) -> Result<Puzzle> {
        let room_id = self.selected_room.ok_or(AdminError::NoRoomSelected)?;
        let mut puzzle = form.into_new_puzzle(room_id)?;
        self.require_login()?;
        if let Some(existing) = self.puzzles.iter().find(|p| p.id == puzzle_id) {
            puzzle.time_limit_seconds = existing.time_limit_seconds;
            puzzle.order_index = existing.order_index;
        }
        let result = self.api.update_puzzle(puzzle_id, &puzzle).await;
        let updated = self.check_auth(result).await?;
        info!(puzzle_id, room_id, "Updated puzzle");
        self.view.close_modal();
        self.load_puzzles().await?;
        Ok(updated)
    }

    /// Deletes a puzzle.
    pub async fn delete_puzzle(&mut self, puzzle_id: Id) -> Result<()> {
        self.require_login()?;
        let result = self.api.delete_puzzle(puzzle_id).await;
        self.check_auth(result).await?;
        info!(puzzle_id, "Deleted puzzle");
        if self.selected_room.is_some() {
            self.load_puzzles().await?;
        } else {
            self.puzzles.retain(|p| p.id != puzzle_id);
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // H5P
    // ------------------------------------------------------------------------

    /// Uploads an `.h5p` package as a puzzle of the selected room.
    pub async fn upload_h5p(&mut self, path: &Path) -> Result<H5pUploadResponse> {
        Features::require(self.config.features.h5p_upload, "h5pUpload")?;
        let room_id = self.selected_room.ok_or(AdminError::NoRoomSelected)?;
        let is_h5p = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("h5p"));
        if !is_h5p {
            return Err(AdminError::validation("file", "Only .h5p files can be uploaded"));
        }
        self.require_login()?;

        let file_name = path
            .file_name()
            .map_or_else(|| "upload.h5p".to_string(), |n| n.to_string_lossy().into_owned());
        let bytes = tokio::fs::read(path).await?;
        info!(room_id, file = %file_name, bytes = bytes.len(), "Uploading H5P package");

        let result = self.api.upload_h5p(room_id, &file_name, bytes).await;
        let uploaded = self.check_auth(result).await?;
        info!(puzzle_id = uploaded.puzzle_id, content_id = %uploaded.content_id, "Uploaded H5P package");
        self.load_puzzles().await?;
        Ok(uploaded)
    }

    /// Deletes an uploaded package together with its puzzle.
    pub async fn delete_h5p_content(&mut self, puzzle_id: Id) -> Result<()> {
        Features::require(self.config.features.h5p_upload, "h5pUpload")?;
        self.require_login()?;
        let result = self.api.delete_h5p_content(puzzle_id).await;
        self.check_auth(result).await?;
        info!(puzzle_id, "Deleted H5P content");
        if self.selected_room.is_some() {
            self.load_puzzles().await?;
        } else {
            self.puzzles.retain(|p| p.id != puzzle_id);
        }
        Ok(())
    }

    /// Fetches the metadata of an uploaded package.
    pub async fn h5p_content(&mut self, content_id: &str) -> Result<H5pContent> {
        self.require_login()?;
        let result = self.api.h5p_content(content_id).await;
        self.check_auth(result).await
    }

    /// Opens a preview of an uploaded package once the player library has
    /// loaded.
    pub async fn preview_h5p(&mut self, content_id: &str) -> Result<&PreviewState> {
        Features::require(self.config.features.h5p_preview, "h5pPreview")?;
        let content = self.h5p_content(content_id).await?;
        let library =
            LibraryLoader::new(self.api.clone(), self.config.preview.library_path.clone()).spawn();
        self.preview.open(&content, library).await?;
        Ok(self.preview.state())
    }

    /// Closes the preview and resets the viewer.
    pub async fn close_preview(&mut self) -> Result<()> {
        self.preview.close().await
    }

    // ------------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------------

    /// Fetches and renders the student list.
    pub async fn load_students(&mut self) -> Result<&[Student]> {
        Features::require(self.config.features.students, "students")?;
        self.require_login()?;
        let result = self.api.list_students().await;
        let students = self.check_auth(result).await?;
        debug!(count = students.len(), "Loaded students");
        self.view.render_students(&students);
        self.students = students;
        Ok(&self.students)
    }

    /// Deletes a student account.
    pub async fn delete_student(&mut self, student_id: Id) -> Result<()> {
        Features::require(self.config.features.students, "students")?;
        self.require_login()?;
        let result = self.api.delete_student(student_id).await;
        self.check_auth(result).await?;
        info!(student_id, "Deleted student");
        self.load_students().await.map(drop)
    }

    // ------------------------------------------------------------------------
    // Teacher approval
    // ------------------------------------------------------------------------

    /// Fetches teacher registrations awaiting approval.
    pub async fn load_pending_teachers(&mut self) -> Result<&[UserProfile]> {
        Features::require(
            self.config.features.registration_requires_approval,
            "registrationRequiresApproval",
        )?;
        self.require_login()?;
        let result = self.api.pending_teachers().await;
        let pending = self.check_auth(result).await?;
        debug!(count = pending.len(), "Loaded pending teachers");
        self.pending_teachers = pending;
        Ok(&self.pending_teachers)
    }

    /// Approves a pending teacher, or rejects and deletes the registration
    /// when `approve` is `false`. Returns the server's message.
    pub async fn approve_teacher(&mut self, teacher_id: Id, approve: bool) -> Result<String> {
        Features::require(
            self.config.features.registration_requires_approval,
            "registrationRequiresApproval",
        )?;
        self.require_login()?;
        let result = self.api.approve_teacher(teacher_id, approve).await;
        let response = self.check_auth(result).await?;
        info!(teacher_id, approved = response.approved, "Decided teacher registration");
        self.pending_teachers.retain(|t| t.id != teacher_id);
        Ok(response.message)
    }
}
