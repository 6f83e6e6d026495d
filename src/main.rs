use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use mypick_admin::config::{AdminConfig, ConfigError};
use mypick_admin::guard::{GuardCommand, GuardView};
use mypick_admin::navigate::{HeadlessNavigator, Navigator};
use mypick_admin::net::client::Backend;
use mypick_admin::net::transport::{ApiRequest, HttpSend, TransportError};
use mypick_admin::session::store::FileTokenStore;
use mypick_admin::session::token;
use mypick_admin::state::AdminState;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("not signed in")]
    NotSignedIn,
}

#[derive(Parser, Debug)]
#[command(name = "mypick-admin", about = "myPick admin session and access CLI")]
struct Cli {
    /// Location reported to the guard; defaults to `ADMIN_APP_URL`.
    #[arg(long, env = "ADMIN_LOCATION")]
    location: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Restore the persisted session and run the access guard once.
    Guard,
    /// Sign in against the auth server.
    Login {
        #[arg(long, env = "ADMIN_EMAIL")]
        email: String,
        #[arg(long, env = "ADMIN_PASSWORD")]
        password: String,
    },
    /// Sign out and clear the persisted token.
    Logout,
    /// Print the signed-in user.
    Whoami,
    /// Refresh the persisted token.
    Refresh,
    /// Report whether a raw token is unexpired.
    Token { token: String },
    /// Send an authenticated request and print the JSON body.
    Request {
        backend: BackendArg,
        method: String,
        path: String,
        #[arg(long)]
        data: Option<String>,
        #[arg(long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum BackendArg {
    Auth,
    Pick,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Auth => Self::Auth,
            BackendArg::Pick => Self::Pick,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    if let Err(e) = dotenvy::dotenv() {
        // A missing .env is the common case.
        if !e.not_found() {
            eprintln!("warning: failed to load .env: {e}");
        }
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AdminConfig::from_env()?;
    let location = cli.location.unwrap_or_else(|| config.app_url.clone());
    debug!(environment = ?config.environment, %location, "starting");

    let navigator = Arc::new(HeadlessNavigator::new(location));
    let store = Arc::new(FileTokenStore::new(config.token_path.clone()));
    let state = AdminState::from_config(&config, store, navigator.clone())?;

    match cli.command {
        Command::Guard => run_guard(&state, &navigator).await,
        Command::Login { email, password } => run_login(&state, &email, &password).await,
        Command::Logout => run_logout(&state, navigator.as_ref()).await,
        Command::Whoami => run_whoami(&state).await,
        Command::Refresh => run_refresh(&state).await,
        Command::Token { token } => {
            run_token(&token);
            Ok(())
        }
        Command::Request { backend, method, path, data, query } => {
            run_request(&state, backend.into(), &method, path, data, query).await
        }
    }
}

async fn run_guard(state: &AdminState, navigator: &HeadlessNavigator) -> Result<(), CliError> {
    let signed_in = state.auth.bootstrap().await;
    let decision = state.guard().check();
    info!(signed_in, state = ?decision.state, "guard evaluated");

    println!("state: {:?}", decision.state);
    match decision.view {
        GuardView::Protected => println!("view: protected content"),
        GuardView::Loader { message } => println!("view: {message}"),
    }
    if let Some(GuardCommand::Navigate(url)) = decision.command {
        println!("redirect: {url}");
    } else if let Some(url) = navigator.last_visit() {
        println!("redirect: {url}");
    }
    Ok(())
}

async fn run_login(state: &AdminState, email: &str, password: &str) -> Result<(), CliError> {
    let user = state.auth.login(email, password).await?;
    let decision = state.guard().check();
    println!("signed in as {} <{}>", user.name, user.email);
    println!("state: {:?}", decision.state);
    Ok(())
}

async fn run_logout(state: &AdminState, navigator: &dyn Navigator) -> Result<(), CliError> {
    // Logout only clears credentials; the login redirect is the caller's job.
    let _login_required = state.auth.logout().await;
    let login = state.guard_config.login_url(&navigator.current_url());
    navigator.navigate(&login);
    println!("signed out");
    println!("redirect: {login}");
    Ok(())
}

async fn run_whoami(state: &AdminState) -> Result<(), CliError> {
    if !state.auth.bootstrap().await {
        return Err(CliError::NotSignedIn);
    }
    let snapshot = state.session.snapshot();
    let user = snapshot.user.ok_or(CliError::NotSignedIn)?;
    print_json(&serde_json::to_value(&user)?)
}

async fn run_refresh(state: &AdminState) -> Result<(), CliError> {
    if !state.auth.bootstrap().await {
        return Err(CliError::NotSignedIn);
    }
    state.auth.refresh_token().await?;
    println!("token refreshed");
    Ok(())
}

fn run_token(raw: &str) {
    match token::token_expiry(raw) {
        Some(exp) if token::is_token_valid(raw) => println!("valid (exp {exp})"),
        Some(exp) => println!("expired (exp {exp})"),
        None => println!("malformed"),
    }
}

async fn run_request(
    state: &AdminState,
    backend: Backend,
    method: &str,
    path: String,
    data: Option<String>,
    query: Vec<(String, String)>,
) -> Result<(), CliError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| CliError::InvalidMethod(method.to_owned()))?;

    let mut request = ApiRequest::new(method, path);
    for (key, value) in query {
        request = request.with_query(key, value);
    }
    if let Some(data) = data {
        request = request.with_json(serde_json::from_str::<Value>(&data)?);
    }

    let response = state.client.backend(backend).send(request).await?;
    let response = response.error_for_status()?;
    if response.body.is_empty() {
        println!("(empty response)");
        return Ok(());
    }
    print_json(&serde_json::from_str::<Value>(&response.body)?)
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
