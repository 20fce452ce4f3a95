//! HTTP client for the escape room admin API.
//!
//! [`ApiClient::request`] is the single place where requests are built: it
//! adds the bearer token when one is set, sends JSON unless the body is a
//! multipart form, and turns every non-2xx answer into [`AdminError::Api`]
//! carrying the status. There is no retry and no backoff; each call makes
//! exactly one attempt.
//!
//! # Endpoints
//!
//! - `POST /api/auth/login`, `POST /api/auth/register`
//! - `GET/POST /api/admin/rooms`, `PUT/DELETE /api/admin/rooms/{id}`,
//!   `POST /api/admin/rooms/{id}/activate`
//! - `GET /api/admin/rooms/{id}/puzzles`, `POST /api/admin/puzzles`,
//!   `PUT/DELETE /api/admin/puzzles/{id}`
//! - `POST /api/admin/h5p/upload?room_id=`, `GET /api/admin/h5p/content/{id}`,
//!   `DELETE /api/admin/h5p/content/{puzzle_id}`
//! - `GET /api/admin/students`, `DELETE /api/admin/students/{id}`
//! - `GET /api/admin/pending-teachers`,
//!   `POST /api/admin/approve-teacher/{id}?approve=`

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AdminError, Result};
use crate::models::{
    ActivateResponse, ApprovalResponse, H5pContent, H5pUploadResponse, Id, LoginRequest,
    NewPuzzle, NewRoom, Puzzle, RegisterRequest, Room, Student, TokenResponse, UserProfile,
};

// ============================================================================
// Request options
// ============================================================================

/// Request payload.
#[derive(Debug, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// A JSON document.
    Json(JsonValue),
    /// A multipart form; the content type is left to the form encoder.
    Multipart(Form),
}

/// Method, query and body of a single call.
#[derive(Debug)]
pub struct RequestOptions {
    /// HTTP method.
    pub method: Method,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
    /// Payload.
    pub body: RequestBody,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::get()
    }
}

impl RequestOptions {
    /// A bodiless `GET`.
    #[must_use]
    pub const fn get() -> Self {
        Self::method(Method::GET)
    }

    /// A bodiless request with the given method.
    #[must_use]
    pub const fn method(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// A request carrying `body` serialized as JSON.
    pub fn json(method: Method, body: &impl Serialize) -> Result<Self> {
        Ok(Self {
            body: RequestBody::Json(serde_json::to_value(body)?),
            ..Self::method(method)
        })
    }

    /// A request carrying a multipart form.
    #[must_use]
    pub fn multipart(method: Method, form: Form) -> Self {
        Self {
            body: RequestBody::Multipart(form),
            ..Self::method(method)
        }
    }

    /// Adds a query string pair.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for the admin REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client for the API rooted at `api_base`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` if `api_base` is not a URL.
    pub fn new(api_base: &str) -> Result<Self> {
        Self::with_http_client(api_base, reqwest::Client::new())
    }

    /// Creates a client from the console configuration, honouring the
    /// optional request timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Self::with_http_client(&config.api_base, builder.build()?)
    }

    /// Uses a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(api_base: &str, http: reqwest::Client) -> Result<Self> {
        Url::parse(api_base).map_err(|e| {
            AdminError::config_validation(
                format!("apiBase '{api_base}' is not a URL: {e}"),
                "Set apiBase to something like http://localhost:8000",
            )
        })?;
        Ok(Self {
            base: api_base.trim_end_matches('/').to_string(),
            http,
            token: None,
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Sets or clears the bearer token.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Returns `true` if requests carry a bearer token.
    #[must_use]
    pub const fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Absolute URL for a server path such as `/api/admin/rooms`.
    pub fn url(&self, endpoint: &str) -> Result<Url> {
        let joined = if endpoint.starts_with('/') {
            format!("{}{endpoint}", self.base)
        } else {
            format!("{}/{endpoint}", self.base)
        };
        Url::parse(&joined).map_err(|e| AdminError::api(endpoint, 0, Some(e.to_string())))
    }

    /// Sends one request and decodes the JSON response.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<T> {
        let response = self.send(endpoint, options).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Sends one request and discards the response body.
    pub async fn request_empty(&self, endpoint: &str, options: RequestOptions) -> Result<()> {
        self.send(endpoint, options).await.map(drop)
    }

    async fn send(&self, endpoint: &str, options: RequestOptions) -> Result<reqwest::Response> {
        let url = self.url(endpoint)?;
        debug!(method = %options.method, endpoint, "Sending request");

        let mut builder = self.http.request(options.method, url);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        builder = match options.body {
            RequestBody::Empty => builder.header(CONTENT_TYPE, "application/json"),
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await?;
        Self::ensure_success(response, endpoint).await
    }

    /// Returns the response on success, or an `Api` error with the status
    /// and the server's `detail` message when the body has one.
    async fn ensure_success(response: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            debug!(endpoint, status = status.as_u16(), "Request succeeded");
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = extract_detail(&body);
        warn!(endpoint, status = status.as_u16(), detail = ?detail, "Request failed");
        Err(AdminError::api(endpoint, status.as_u16(), detail))
    }

    // ------------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------------

    /// `POST /api/auth/login`.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse> {
        let body = LoginRequest { username, password };
        self.request("/api/auth/login", RequestOptions::json(Method::POST, &body)?)
            .await
    }

    /// `POST /api/auth/register`.
    pub async fn register(&self, request: &RegisterRequest<'_>) -> Result<UserProfile> {
        self.request("/api/auth/register", RequestOptions::json(Method::POST, request)?)
            .await
    }

    // ------------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------------

    /// `GET /api/admin/rooms`.
    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        self.request("/api/admin/rooms", RequestOptions::get()).await
    }

    /// `POST /api/admin/rooms`.
    pub async fn create_room(&self, room: &NewRoom) -> Result<Room> {
        self.request("/api/admin/rooms", RequestOptions::json(Method::POST, room)?)
            .await
    }

    /// `PUT /api/admin/rooms/{id}`.
    pub async fn update_room(&self, room_id: Id, room: &NewRoom) -> Result<Room> {
        self.request(
            &format!("/api/admin/rooms/{room_id}"),
            RequestOptions::json(Method::PUT, room)?,
        )
        .await
    }

    /// `POST /api/admin/rooms/{id}/activate`; flips the active flag.
    pub async fn toggle_room(&self, room_id: Id) -> Result<ActivateResponse> {
        self.request(
            &format!("/api/admin/rooms/{room_id}/activate"),
            RequestOptions::method(Method::POST),
        )
        .await
    }

    /// `DELETE /api/admin/rooms/{id}`.
    pub async fn delete_room(&self, room_id: Id) -> Result<()> {
        self.request_empty(
            &format!("/api/admin/rooms/{room_id}"),
            RequestOptions::method(Method::DELETE),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Puzzles
    // ------------------------------------------------------------------------

    /// `GET /api/admin/rooms/{id}/puzzles`.
    pub async fn list_puzzles(&self, room_id: Id) -> Result<Vec<Puzzle>> {
        self.request(
            &format!("/api/admin/rooms/{room_id}/puzzles"),
            RequestOptions::get(),
        )
        .await
    }

    /// `POST /api/admin/puzzles`.
    pub async fn create_puzzle(&self, puzzle: &NewPuzzle) -> Result<Puzzle> {
        self.request("/api/admin/puzzles", RequestOptions::json(Method::POST, puzzle)?)
            .await
    }

    /// `PUT /api/admin/puzzles/{id}`; replaces every field of the puzzle.
    pub async fn update_puzzle(&self, puzzle_id: Id, puzzle: &NewPuzzle) -> Result<Puzzle> {
        self.request(
            &format!("/api/admin/puzzles/{puzzle_id}"),
            RequestOptions::json(Method::PUT, puzzle)?,
        )
        .await
    }

    /// `DELETE /api/admin/puzzles/{id}`.
    pub async fn delete_puzzle(&self, puzzle_id: Id) -> Result<()> {
        self.request_empty(
            &format!("/api/admin/puzzles/{puzzle_id}"),
            RequestOptions::method(Method::DELETE),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // H5P
    // ------------------------------------------------------------------------

    /// `POST /api/admin/h5p/upload?room_id=` with the package as field `file`.
    pub async fn upload_h5p(
        &self,
        room_id: Id,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<H5pUploadResponse> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);
        self.request(
            "/api/admin/h5p/upload",
            RequestOptions::multipart(Method::POST, form).with_query("room_id", room_id),
        )
        .await
    }

    /// `GET /api/admin/h5p/content/{content_id}`.
    pub async fn h5p_content(&self, content_id: &str) -> Result<H5pContent> {
        self.request(
            &format!("/api/admin/h5p/content/{content_id}"),
            RequestOptions::get(),
        )
        .await
    }

    /// `DELETE /api/admin/h5p/content/{puzzle_id}`; removes the package and
    /// its puzzle.
    pub async fn delete_h5p_content(&self, puzzle_id: Id) -> Result<()> {
        self.request_empty(
            &format!("/api/admin/h5p/content/{puzzle_id}"),
            RequestOptions::method(Method::DELETE),
        )
        .await
    }

    /// Fetches a static asset (such as the H5P player bundle) as bytes.
    pub async fn fetch_asset(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.send(path, RequestOptions::get()).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ------------------------------------------------------------------------
    // Students
    // ------------------------------------------------------------------------

    /// `GET /api/admin/students`.
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        self.request("/api/admin/students", RequestOptions::get()).await
    }

    /// `DELETE /api/admin/students/{id}`.
    pub async fn delete_student(&self, student_id: Id) -> Result<()> {
        self.request_empty(
            &format!("/api/admin/students/{student_id}"),
            RequestOptions::method(Method::DELETE),
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Teacher approval
    // ------------------------------------------------------------------------

    /// `GET /api/admin/pending-teachers`.
    pub async fn pending_teachers(&self) -> Result<Vec<UserProfile>> {
        self.request("/api/admin/pending-teachers", RequestOptions::get())
            .await
    }

    /// `POST /api/admin/approve-teacher/{id}?approve=`; a rejected
    /// registration is deleted by the server.
    pub async fn approve_teacher(
        &self,
        teacher_id: Id,
        approve: bool,
    ) -> Result<ApprovalResponse> {
        self.request(
            &format!("/api/admin/approve-teacher/{teacher_id}"),
            RequestOptions::method(Method::POST).with_query("approve", approve),
        )
        .await
    }
}

/// Pulls the `detail` message out of an error body.
///
/// String details are returned as-is; structured ones (validation error
/// lists) are returned as compact JSON. Non-JSON bodies yield `None`.
fn extract_detail(body: &str) -> Option<String> {
    let value: JsonValue = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}
