//! Escape Admin CLI
//!
//! Command-line front end for the escape room admin console.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use escape_admin_core::{
    AdminConsole, AdminError, Config, FileStorage, LoginForm, MultipleChoiceForm, NewRoom,
    PreviewState, RegisterForm, StandalonePageViewer, Tab,
};
use tracing_subscriber::EnvFilter;

type Console = AdminConsole<FileStorage, StandalonePageViewer>;

/// Escape Admin - teacher console for the escape room quiz server
///
/// Manages rooms, puzzles, H5P content and student accounts through the
/// server's admin API. The login session is kept in a local file.
#[derive(Parser, Debug)]
#[command(name = "escape-admin")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: escape-admin.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Base URL of the admin API (overrides apiBase)
    #[arg(long, value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print list markup as HTML instead of plain text
    #[arg(long, global = true)]
    html: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in as a teacher
    Login {
        /// Username
        #[arg(short, long)]
        username: String,
        /// Password
        #[arg(short, long, env = "ESCAPE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new teacher account
    Register {
        /// Username (at least 3 characters)
        #[arg(short, long)]
        username: String,
        /// Password (at least 8 characters)
        #[arg(short, long, env = "ESCAPE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        /// Password confirmation
        #[arg(long)]
        confirm_password: String,
        /// Display name
        #[arg(long)]
        full_name: Option<String>,
    },
    /// Log out and forget the stored session
    Logout,
    /// Show the stored session
    Whoami,
    /// Manage rooms
    #[command(subcommand)]
    Rooms(RoomCommand),
    /// Manage puzzles
    #[command(subcommand)]
    Puzzles(PuzzleCommand),
    /// Manage student accounts
    #[command(subcommand)]
    Students(StudentCommand),
    /// Upload and preview H5P content
    #[command(subcommand)]
    H5p(H5pCommand),
    /// Review pending teacher registrations
    #[command(subcommand)]
    Teachers(TeacherCommand),
}

#[derive(Subcommand, Debug)]
enum RoomCommand {
    /// List rooms
    List,
    /// Create a room
    Create(RoomFields),
    /// Replace a room's name, description and time limit
    Update {
        /// Room id
        id: i64,
        #[command(flatten)]
        fields: RoomFields,
    },
    /// Activate or deactivate a room
    Toggle {
        /// Room id
        id: i64,
    },
    /// Delete a room
    Delete {
        /// Room id
        id: i64,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct RoomFields {
    /// Room name
    #[arg(short, long)]
    name: String,
    /// Description
    #[arg(short, long)]
    description: Option<String>,
    /// Time limit in minutes
    #[arg(short, long, default_value_t = escape_admin_core::models::DEFAULT_ROOM_MINUTES)]
    minutes: u32,
}

impl RoomFields {
    fn to_new_room(&self) -> NewRoom {
        let room = NewRoom::new(self.name.clone()).with_time_limit(self.minutes);
        match &self.description {
            Some(description) => room.with_description(description.clone()),
            None => room,
        }
    }
}

#[derive(Subcommand, Debug)]
enum PuzzleCommand {
    /// List the puzzles of a room
    List {
        /// Room id
        #[arg(short, long)]
        room: i64,
    },
    /// Create a multiple-choice puzzle
    Create {
        /// Room id
        #[arg(short, long)]
        room: i64,
        #[command(flatten)]
        fields: PuzzleFields,
    },
    /// Replace a multiple-choice puzzle
    Update {
        /// Puzzle id
        id: i64,
        /// Room the puzzle belongs to
        #[arg(short, long)]
        room: i64,
        #[command(flatten)]
        fields: PuzzleFields,
    },
    /// Delete a puzzle
    Delete {
        /// Puzzle id
        id: i64,
        /// Room the puzzle belongs to (reloads its list)
        #[arg(short, long)]
        room: Option<i64>,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args, Debug)]
struct PuzzleFields {
    /// Puzzle title
    #[arg(short, long)]
    title: String,
    /// Question text
    #[arg(short, long)]
    question: String,
    /// Answer option (exactly four)
    #[arg(short, long = "option", num_args = 1, required = true)]
    options: Vec<String>,
    /// Index (0-3) of the correct option
    #[arg(long)]
    correct: usize,
    /// Points awarded
    #[arg(short, long, default_value_t = escape_admin_core::models::DEFAULT_PUZZLE_POINTS)]
    points: i32,
}

impl PuzzleFields {
    fn into_form(self) -> anyhow::Result<MultipleChoiceForm> {
        let options: [String; 4] = self.options.try_into().map_err(|given: Vec<String>| {
            anyhow::anyhow!(
                "Expected exactly 4 answer options, got {}\n\nSuggestion: Pass --option four times",
                given.len()
            )
        })?;
        Ok(MultipleChoiceForm {
            title: self.title,
            question: self.question,
            options,
            correct: self.correct,
            points: self.points,
        })
    }
}

#[derive(Subcommand, Debug)]
enum StudentCommand {
    /// List students
    List,
    /// Delete a student account
    Delete {
        /// Student id
        id: i64,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum H5pCommand {
    /// Upload an .h5p package as a puzzle
    Upload {
        /// Room id
        #[arg(short, long)]
        room: i64,
        /// Path to the .h5p file
        file: PathBuf,
    },
    /// Show the metadata of uploaded content
    Info {
        /// Content id
        content_id: String,
    },
    /// Write a preview page for uploaded content
    Preview {
        /// Content id
        content_id: String,
    },
    /// Delete uploaded content together with its puzzle
    Delete {
        /// Puzzle id of the uploaded content
        puzzle_id: i64,
        /// Room the puzzle belongs to (reloads its list)
        #[arg(short, long)]
        room: Option<i64>,
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TeacherCommand {
    /// List teacher registrations awaiting approval
    Pending,
    /// Approve a pending teacher
    Approve {
        /// Teacher id
        id: i64,
    },
    /// Reject and delete a pending registration
    Reject {
        /// Teacher id
        id: i64,
        /// Confirm rejection
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?cli.config, api_base = ?cli.api_base, "Starting escape-admin");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(api_base) = cli.api_base {
        config.api_base = api_base;
    }
    config.validate()?;
    tracing::debug!(api_base = %config.api_base, session_file = %config.session_file, "Configuration loaded");

    let mut console = Console::from_config(config)?;
    let html = cli.html;

    match cli.command {
        Command::Login { username, password } => {
            let user = console.login(&LoginForm::new(username, password)).await?;
            println!("Logged in as {} ({})", user.display_name(), user.username);
        }
        Command::Register {
            username,
            password,
            confirm_password,
            full_name,
        } => {
            let form = RegisterForm {
                username,
                password,
                confirm_password,
                full_name,
            };
            let outcome = console.register(&form).await?;
            println!("{}", outcome.message());
        }
        Command::Logout => {
            console.restore()?;
            console.logout().await?;
            println!("Logged out");
        }
        Command::Whoami => {
            if console.restore()? {
                if let Some(user) = console.user() {
                    println!("Logged in as {} ({})", user.display_name(), user.username);
                    println!("  Role: {}", user.role);
                    println!("  Server: {}", console.config().api_base);
                }
            } else {
                println!("Not logged in");
            }
        }
        Command::Rooms(command) => {
            require_session(&mut console)?;
            run_rooms(&mut console, command, html).await?;
        }
        Command::Puzzles(command) => {
            require_session(&mut console)?;
            run_puzzles(&mut console, command, html).await?;
        }
        Command::Students(command) => {
            require_session(&mut console)?;
            run_students(&mut console, command, html).await?;
        }
        Command::H5p(command) => {
            require_session(&mut console)?;
            run_h5p(&mut console, command).await?;
        }
        Command::Teachers(command) => {
            require_session(&mut console)?;
            run_teachers(&mut console, command).await?;
        }
    }
    Ok(())
}

/// Loads configuration from the given file or from the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn require_session(console: &mut Console) -> anyhow::Result<()> {
    if console.restore()? {
        Ok(())
    } else {
        Err(AdminError::NotLoggedIn.into())
    }
}

fn confirm(yes: bool, what: &str) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("Refusing to delete {what} without confirmation\n\nSuggestion: Pass --yes to confirm");
    }
    Ok(())
}

async fn run_rooms(console: &mut Console, command: RoomCommand, html: bool) -> anyhow::Result<()> {
    match command {
        RoomCommand::List => {
            console.switch_tab(Tab::Rooms).await?;
            print_rooms(console, html);
        }
        RoomCommand::Create(fields) => {
            let room = console.create_room(&fields.to_new_room()).await?;
            println!("Created room {} ({})", room.name, room.id);
        }
        RoomCommand::Update { id, fields } => {
            let room = console.update_room(id, &fields.to_new_room()).await?;
            println!("Updated room {} ({})", room.name, room.id);
        }
        RoomCommand::Toggle { id } => {
            let active = console.toggle_room(id).await?;
            println!(
                "Room {id} is now {}",
                if active { "active" } else { "inactive" }
            );
        }
        RoomCommand::Delete { id, yes } => {
            confirm(yes, &format!("room {id}"))?;
            console.delete_room(id).await?;
            println!("Deleted room {id}");
        }
    }
    Ok(())
}

async fn run_puzzles(
    console: &mut Console,
    command: PuzzleCommand,
    html: bool,
) -> anyhow::Result<()> {
    match command {
        PuzzleCommand::List { room } => {
            console.switch_tab(Tab::Puzzles).await?;
            console.select_room(Some(room)).await?;
            print_puzzles(console, html);
        }
        PuzzleCommand::Create { room, fields } => {
            let form = fields.into_form()?;
            console.select_room(Some(room)).await?;
            let puzzle = console.create_puzzle(form).await?;
            println!("Created puzzle {} ({})", puzzle.title, puzzle.id);
        }
        PuzzleCommand::Update { id, room, fields } => {
            let form = fields.into_form()?;
            console.select_room(Some(room)).await?;
            let puzzle = console.update_puzzle(id, form).await?;
            println!("Updated puzzle {} ({})", puzzle.title, puzzle.id);
        }
        PuzzleCommand::Delete { id, room, yes } => {
            confirm(yes, &format!("puzzle {id}"))?;
            if room.is_some() {
                console.select_room(room).await?;
            }
            console.delete_puzzle(id).await?;
            println!("Deleted puzzle {id}");
        }
    }
    Ok(())
}

async fn run_students(
    console: &mut Console,
    command: StudentCommand,
    html: bool,
) -> anyhow::Result<()> {
    match command {
        StudentCommand::List => {
            console.switch_tab(Tab::Students).await?;
            print_students(console, html);
        }
        StudentCommand::Delete { id, yes } => {
            confirm(yes, &format!("student {id}"))?;
            console.delete_student(id).await?;
            println!("Deleted student {id}");
        }
    }
    Ok(())
}

async fn run_h5p(console: &mut Console, command: H5pCommand) -> anyhow::Result<()> {
    match command {
        H5pCommand::Upload { room, file } => {
            console.select_room(Some(room)).await?;
            let uploaded = console.upload_h5p(&file).await?;
            println!("Uploaded '{}' as puzzle {}", uploaded.title, uploaded.puzzle_id);
            println!("  Type: {}", uploaded.puzzle_type);
            println!("  Content id: {}", uploaded.content_id);
        }
        H5pCommand::Info { content_id } => {
            let content = console.h5p_content(&content_id).await?;
            println!("Content {}", content.content_id);
            println!("  Title: {}", content.title().unwrap_or("-"));
            println!("  Path: {}", content.content_path);
            println!("  Puzzle: {}", content.puzzle_id);
            println!("{}", serde_json::to_string_pretty(&content.metadata)?);
        }
        H5pCommand::Preview { content_id } => {
            let state = console.preview_h5p(&content_id).await?.clone();
            if let PreviewState::Ready { .. } = state {
                if let Some(page) = console.preview().viewer().mounted() {
                    println!("Preview written to {}", page.display());
                }
            }
        }
        H5pCommand::Delete {
            puzzle_id,
            room,
            yes,
        } => {
            confirm(yes, &format!("H5P content of puzzle {puzzle_id}"))?;
            if room.is_some() {
                console.select_room(room).await?;
            }
            console.delete_h5p_content(puzzle_id).await?;
            println!("Deleted H5P content of puzzle {puzzle_id}");
        }
    }
    Ok(())
}

async fn run_teachers(console: &mut Console, command: TeacherCommand) -> anyhow::Result<()> {
    match command {
        TeacherCommand::Pending => {
            let pending = console.load_pending_teachers().await?;
            if pending.is_empty() {
                println!("No pending registrations.");
            }
            for teacher in pending {
                println!(
                    "{:>5}  {:<30} @{}",
                    teacher.id,
                    teacher.display_name(),
                    teacher.username
                );
            }
        }
        TeacherCommand::Approve { id } => {
            println!("{}", console.approve_teacher(id, true).await?);
        }
        TeacherCommand::Reject { id, yes } => {
            if !yes {
                anyhow::bail!(
                    "Refusing to reject teacher {id} without confirmation\n\nSuggestion: Pass --yes to confirm"
                );
            }
            println!("{}", console.approve_teacher(id, false).await?);
        }
    }
    Ok(())
}

fn print_rooms(console: &Console, html: bool) {
    if html {
        println!("{}", console.view().rooms_html());
        return;
    }
    if console.rooms().is_empty() {
        println!("{}", escape_admin_core::view::NO_ROOMS);
        return;
    }
    for room in console.rooms() {
        let status = if room.is_active { "Active" } else { "Inactive" };
        println!(
            "{:>5}  {:<30} {:<8} {:>4} min",
            room.id, room.name, status, room.time_limit_minutes
        );
        if let Some(description) = room.description.as_deref() {
            println!("       {description}");
        }
    }
}

fn print_puzzles(console: &Console, html: bool) {
    if html {
        println!("{}", console.view().room_select_html());
        println!("{}", console.view().puzzles_html());
        return;
    }
    if console.puzzles().is_empty() {
        println!("{}", escape_admin_core::view::NO_PUZZLES);
        return;
    }
    for puzzle in console.puzzles() {
        println!(
            "{:>5}  {:<30} {:<18} {:>3} pts {:>4}s",
            puzzle.id, puzzle.title, puzzle.puzzle_type, puzzle.points, puzzle.time_limit_seconds
        );
        if let Some(content_id) = puzzle.h5p_content_id.as_deref() {
            println!("       H5P content: {content_id}");
        }
    }
}

fn print_students(console: &Console, html: bool) {
    if html {
        println!("{}", console.view().students_html());
        return;
    }
    if console.students().is_empty() {
        println!("{}", escape_admin_core::view::NO_STUDENTS);
        return;
    }
    for student in console.students() {
        println!(
            "{:>5}  {:<30} @{}",
            student.id,
            student.display_name(),
            student.username
        );
    }
}
