use std::path::PathBuf;
use std::sync::Arc;

use calcdesk::app::{App, AppError};
use calcdesk::config::{ClientConfig, ConfigError};
use calcdesk::net::types::{ApiError, CalculationRequest, Credentials, Operator};
use calcdesk::router::{Location, Navigation, Page, RouteError};
use calcdesk::storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    App(#[from] AppError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("operator: {0}")]
    Operator(ApiError),
    #[error("terminal io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "calcdesk", about = "Calculator client with guarded navigation")]
struct Cli {
    /// Backend origin; overrides `CALC_API_URL` from the environment or `.env`.
    #[arg(long, env = "CALC_API_URL")]
    base_url: Option<String>,

    /// JSON file holding persisted UI flags.
    #[arg(long, env = "CALC_STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Keep UI flags in memory only.
    #[arg(long, default_value_t = false)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

/// One line typed into `calcdesk shell`.
#[derive(Parser, Debug)]
#[command(name = "calcdesk", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a guarded navigation and print the page it settles on.
    Navigate { path: String },
    /// Ask the backend who is signed in.
    Me,
    Login(CredentialArgs),
    Register(CredentialArgs),
    Logout,
    Guest(GuestCommand),
    /// Evaluate `<a> <op> <b>` on the backend.
    #[command(allow_negative_numbers = true)]
    Calc {
        a: f64,
        op: String,
        b: f64,
        #[arg(long)]
        note: Option<String>,
    },
    History(HistoryCommand),
    /// Interactive session; cookies live as long as the session.
    Shell,
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long, env = "CALC_USERNAME")]
    username: String,
    #[arg(long, env = "CALC_PASSWORD", hide_env_values = true)]
    password: String,
}

#[derive(Args, Debug)]
struct GuestCommand {
    #[command(subcommand)]
    command: GuestSubcommand,
}

#[derive(Subcommand, Debug)]
enum GuestSubcommand {
    Enter,
    Exit,
}

#[derive(Args, Debug)]
struct HistoryCommand {
    #[command(subcommand)]
    command: HistorySubcommand,
}

#[derive(Subcommand, Debug)]
enum HistorySubcommand {
    List,
    Clear,
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_api_url(base_url)?;
    }
    if let Some(path) = cli.storage {
        config.storage_path = path;
    }

    let storage: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&config.storage_path)?)
    };
    let app = App::new(&config, storage)?;
    tracing::debug!(api = %app.api().api_base(), "client configured");

    let initial = match &cli.command {
        Command::Navigate { path } => path.parse::<Location>()?,
        _ => Location::new("/"),
    };
    let nav = match app.bootstrap_at(initial).await {
        Ok(nav) => Some(nav),
        Err(AppError::Api(ApiError::Unauthorized)) => None,
        Err(e) => return Err(e.into()),
    };

    match cli.command {
        Command::Navigate { .. } => {
            match nav {
                Some(nav) => print_navigation(&nav),
                None => print_session_expired(&app),
            }
            Ok(())
        }
        Command::Shell => run_shell(&app).await,
        command => run_command(&app, command).await,
    }
}

async fn run_command(app: &App, command: Command) -> Result<(), CliError> {
    match command {
        Command::Navigate { path } => {
            let nav = app.navigate(path.parse()?).await?;
            print_navigation(&nav);
        }
        Command::Me => {
            let status = app.me().await?;
            match status.username.filter(|_| status.is_authenticated) {
                Some(name) => println!("signed in as {name}"),
                None if app.is_guest() => println!("not signed in (guest mode)"),
                None => println!("not signed in"),
            }
        }
        Command::Login(args) => {
            let nav = app.login(&args.into_credentials()).await?;
            print_navigation(&nav);
        }
        Command::Register(args) => {
            let nav = app.register(&args.into_credentials()).await?;
            print_navigation(&nav);
        }
        Command::Logout => {
            let nav = app.logout().await?;
            print_navigation(&nav);
        }
        Command::Guest(guest) => {
            let nav = match guest.command {
                GuestSubcommand::Enter => app.enter_guest().await?,
                GuestSubcommand::Exit => app.exit_guest().await?,
            };
            print_navigation(&nav);
        }
        Command::Calc { a, op, b, note } => {
            let operator = op.parse::<Operator>().map_err(CliError::Operator)?;
            let request = CalculationRequest::new(a, operator, b, note.as_deref());
            let outcome = app.calculate(&request).await?;
            let saved = if outcome.saved { "" } else { "  (not saved)" };
            println!("{a} {operator} {b} = {}{saved}", outcome.result);
        }
        Command::History(history) => match history.command {
            HistorySubcommand::List => {
                let entries = app.history().await?;
                if entries.is_empty() {
                    println!("no history");
                }
                for entry in entries {
                    println!("{entry}");
                }
            }
            HistorySubcommand::Clear => println!("{}", app.clear_history().await?.message),
            HistorySubcommand::Delete { id } => println!("{}", app.delete_history_item(id).await?.message),
        },
        Command::Shell => println!("already in a shell"),
    }
    Ok(())
}

async fn run_shell(app: &App) -> Result<(), CliError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        let prompt = app.router().current().map_or_else(|| "/".to_owned(), |l| l.full_path());
        stdout.write_all(format!("{prompt}> ").as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.first().copied() {
            None => continue,
            Some("exit" | "quit") => return Ok(()),
            Some(_) => {}
        }

        match ShellLine::try_parse_from(words) {
            Ok(parsed) => {
                if let Err(e) = run_command(app, parsed.command).await {
                    eprintln!("error: {e}");
                }
            }
            Err(e) => eprintln!("{e}"),
        }
    }
}

impl CredentialArgs {
    fn into_credentials(self) -> Credentials {
        Credentials { username: self.username, password: self.password }
    }
}

fn print_session_expired(app: &App) {
    let at = app.router().current().map(|l| l.full_path()).unwrap_or_default();
    println!("{at} -> login (session expired, please sign in again)");
}

fn print_navigation(nav: &Navigation) {
    let page = match &nav.page {
        Page::Welcome => "welcome".to_owned(),
        Page::Login { session_expired: true, .. } => "login (session expired, please sign in again)".to_owned(),
        Page::Login { redirect: Some(to), .. } => format!("login (continue to {to})"),
        Page::Login { .. } => "login".to_owned(),
        Page::Register => "register".to_owned(),
        Page::Dashboard => "dashboard".to_owned(),
        Page::NotFound { path } => format!("not found: {path}"),
    };
    if nav.redirects > 0 {
        println!("{} -> {page} (after {} redirects)", nav.location, nav.redirects);
    } else {
        println!("{} -> {page}", nav.location);
    }
}
