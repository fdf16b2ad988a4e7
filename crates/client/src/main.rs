use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use userdesk_auth::{
    Affordances, CredentialStore, MenuEntry, Navigation, Route, Session, guarded,
};
use userdesk_client::{ClientConfig, ClientError, UserDesk};
use userdesk_core::{FilterCriteria, Pagination, SortDirection, SortOrder, UserDraft, UserId};
use userdesk_observability::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "userdesk")]
#[command(about = "Administrative front-end for the user directory API")]
#[command(version)]
struct Cli {
    /// Base URL of the API.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Credentials file (token and anti-forgery token).
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Log output format: pretty or json.
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session token.
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "USERDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the session token.
    Logout,
    /// Show the current session, menu and permitted actions.
    Whoami,
    /// Resolve a client route and print where navigation lands.
    Open { path: String },
    /// List users with optional filters.
    List(ListArgs),
    /// Look up one user by identifier.
    Get { id: String },
    Create(DraftArgs),
    Update {
        #[arg(value_name = "ID")]
        user_id: UserId,
        #[command(flatten)]
        draft: DraftArgs,
    },
    Delete { id: UserId },
    /// Bulk import users from a CSV file.
    Upload { file: PathBuf },
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Inclusive lower bound on creation date (yyyy-MM-dd).
    #[arg(long)]
    start_date: Option<NaiveDate>,
    /// Inclusive upper bound on creation date (yyyy-MM-dd).
    #[arg(long)]
    end_date: Option<NaiveDate>,
    #[arg(long)]
    profession: Option<String>,
    /// Zero-based page index.
    #[arg(long, default_value_t = 0)]
    page: u64,
    #[arg(long, default_value_t = Pagination::DEFAULT_LIMIT)]
    limit: u32,
    #[arg(long)]
    sort_by: Option<String>,
    #[arg(long, requires = "sort_by")]
    desc: bool,
}

#[derive(Args, Debug)]
struct DraftArgs {
    /// Identifier to request on create; ignored on update.
    #[arg(long)]
    id: Option<UserId>,
    #[arg(long)]
    firstname: String,
    #[arg(long)]
    lastname: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    profession: String,
    #[arg(long)]
    date_created: Option<NaiveDate>,
    #[arg(long)]
    country: String,
    #[arg(long)]
    city: String,
}

impl From<DraftArgs> for UserDraft {
    fn from(args: DraftArgs) -> Self {
        UserDraft {
            id: args.id,
            firstname: args.firstname,
            lastname: args.lastname,
            email: args.email,
            profession: args.profession,
            date_created: args.date_created,
            country: args.country,
            city: args.city,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(url) = &cli.api_url {
        config = config.with_api_url(url)?;
    }
    if let Some(path) = cli.credentials {
        config.credentials_path = Some(path);
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    userdesk_observability::init(config.log_format);
    tracing::debug!(api_url = %config.api_url, "starting");

    let store: Arc<dyn CredentialStore> =
        Arc::new(config.credential_store().context("cannot locate credentials file")?);
    let desk = UserDesk::connect(&config, store).map_err(surface)?;

    match cli.command {
        Command::Login { username, password } => {
            let session = desk.auth.authenticate(&username, &password).await.map_err(surface)?;
            print_json(&session_summary(&session))?;
        }
        Command::Logout => {
            desk.auth.sign_out().map_err(surface)?;
            print_json(&json!({ "authenticated": false }))?;
        }
        Command::Whoami => {
            print_json(&session_summary(&desk.session.snapshot()))?;
        }
        Command::Open { path } => {
            let session = desk.session.snapshot();
            let first = Navigation::resolve(&path, &session);
            let landed = Navigation::settle(&path, &session);
            print_json(&json!({ "requested": path, "first_step": first, "route": landed.path() }))?;
        }
        Command::List(args) => {
            enter(&desk, Route::Home)?;
            let filters = FilterCriteria::new(args.start_date, args.end_date, args.profession);
            let pagination = Pagination::new(args.limit)?.with_page(args.page)?;
            let direction = if args.desc { SortDirection::Desc } else { SortDirection::Asc };
            desk.directory
                .stage_sort(args.sort_by.map(|by| SortOrder { by, direction }));

            desk.directory.list(filters, pagination).await.map_err(surface)?;
            print_json(&desk.directory.view())?;
        }
        Command::Get { id } => {
            enter(&desk, Route::Home)?;
            match desk.directory.lookup(&id).await.map_err(surface)? {
                Some(record) => print_json(&record)?,
                None => bail!("no user with identifier '{}'", id.trim()),
            }
        }
        Command::Create(draft) => {
            enter(&desk, Route::Home)?;
            desk.directory.create(&draft.into()).await.map_err(surface)?;
            print_json(&desk.directory.view())?;
        }
        Command::Update { user_id, draft } => {
            enter(&desk, Route::Home)?;
            desk.directory.update(user_id, draft.into()).await.map_err(surface)?;
            print_json(&desk.directory.view())?;
        }
        Command::Delete { id } => {
            enter(&desk, Route::Home)?;
            desk.directory.delete(id).await.map_err(surface)?;
            print_json(&desk.directory.view())?;
        }
        Command::Upload { file } => {
            enter(&desk, Route::Admin)?;
            desk.directory.upload_csv_path(&file).await.map_err(surface)?;
            print_json(&json!({ "uploaded": file.display().to_string() }))?;
        }
    }

    Ok(())
}

/// Navigate to `route`; fail with the landing route when the guard redirects.
fn enter(desk: &UserDesk, route: Route) -> anyhow::Result<()> {
    let session = desk.session.snapshot();
    if let Err(denied) = guarded(&session, &route.requirement(), |_| ()) {
        let landed = Navigation::settle(route.path(), &session);
        bail!("{denied}; redirected to {landed}");
    }
    Ok(())
}

fn session_summary(session: &Session) -> serde_json::Value {
    json!({
        "authenticated": session.is_authenticated(),
        "roles": session.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "menu": MenuEntry::visible_to(session),
        "actions": Affordances::for_session(session),
        "landing": Navigation::settle("/", session).path(),
    })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn surface(err: ClientError) -> anyhow::Error {
    tracing::debug!(error = ?err, "command failed");
    anyhow::anyhow!(err.user_message())
}
