//! Escape Room Admin Console
//!
//! Teacher-facing administration for the escape room quiz server: session
//! persistence, a typed client for the admin REST API, the login/register
//! flow, teacher approval, dashboard view state and H5P preview loading.

pub mod api;
pub mod auth;
pub mod config;
pub mod console;
pub mod error;
pub mod models;
pub mod preview;
pub mod session;
pub mod view;

pub use api::{ApiClient, RequestBody, RequestOptions};
pub use auth::{AuthStatus, LoginForm, RegisterForm, RegisterOutcome};
pub use config::{Config, Features, PreviewConfig};
pub use console::AdminConsole;
pub use error::{AdminError, Result};
pub use models::{
    ActivateResponse, ApprovalResponse, H5pContent, H5pUploadResponse, Id, MultipleChoiceForm,
    NewPuzzle, NewRoom, Puzzle, Role, Room, Student, TokenResponse, UserProfile,
};
pub use preview::{
    readiness, H5pViewer, LibraryHandle, LibraryLoader, PreviewLoader, PreviewState, Readiness,
    ReadinessSignal, StandalonePageViewer,
};
pub use session::{FileStorage, MemoryStorage, Session, SessionStore, Storage};
pub use view::{Modal, Screen, Tab, ViewController};
