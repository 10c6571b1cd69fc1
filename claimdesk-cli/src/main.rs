use anyhow::{Context, Result};
use claimdesk::auth::{hash_password, password_strength_errors};
use claimdesk::queries::users::{self, NewUser};
use claimdesk::*;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config = matches.get_one::<String>("config").map(PathBuf::from);
    let settings = load_settings_from(config.as_deref()).await?;
    init_tracing(settings.debug);

    match matches.subcommand() {
        Some(("serve", _)) => serve_command(settings).await?,
        Some(("migrate", _)) => migrate_command(&settings).await?,
        Some(("load-claims", sub_matches)) => load_claims_command(&settings, sub_matches).await?,
        Some(("create-user", sub_matches)) => create_user_command(&settings, sub_matches).await?,
        _ => {
            build_cli().print_help()?;
            std::process::exit(1);
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if debug {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

fn build_cli() -> Command {
    Command::new("claimdesk")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Insurance claims review desk")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("YAML settings file (defaults to $CLAIMDESK_CONFIG)"),
        )
        .subcommand(Command::new("serve").about("Run the web server"))
        .subcommand(Command::new("migrate").about("Create or upgrade the database schema"))
        .subcommand(
            Command::new("load-claims")
                .about("Load claims from a CSV or JSON export")
                .arg(
                    Arg::new("file")
                        .value_name("FILE")
                        .help("Data file to load")
                        .required(true),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .value_parser(["csv", "json"])
                        .default_value("csv")
                        .help("Input format"),
                ),
        )
        .subcommand(
            Command::new("create-user")
                .about("Create a user account")
                .arg(Arg::new("username").value_name("USERNAME").required(true))
                .arg(Arg::new("email").value_name("EMAIL").required(true))
                .arg(
                    Arg::new("password")
                        .short('p')
                        .long("password")
                        .value_name("PASSWORD")
                        .required(true)
                        .help("Initial password"),
                )
                .arg(
                    Arg::new("staff")
                        .long("staff")
                        .action(ArgAction::SetTrue)
                        .help("Give the account staff access"),
                ),
        )
}

async fn serve_command(settings: Settings) -> Result<()> {
    let db = DatabaseConnection::open_and_migrate(&settings.database_url).await?;
    let state = AppState::new(db.into_pool(), settings, Arc::new(LogMailer));
    serve(state).await
}

async fn migrate_command(settings: &Settings) -> Result<()> {
    DatabaseConnection::open_and_migrate(&settings.database_url).await?;
    println!("✓ Database schema is up to date");
    Ok(())
}

async fn load_claims_command(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let file = matches
        .get_one::<String>("file")
        .context("missing data file")?;
    let format: DataFormat = matches
        .get_one::<String>("format")
        .map(String::as_str)
        .unwrap_or("csv")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let path = PathBuf::from(file);
    if !path.exists() {
        anyhow::bail!("Data file '{}' does not exist", path.display());
    }

    let db = DatabaseConnection::open_and_migrate(&settings.database_url).await?;
    let summary = load_file(db.pool(), &path, format).await?;

    println!("✓ Loaded {} ({})", path.display(), format);
    println!("  created: {}", summary.created);
    println!("  updated: {}", summary.updated);
    println!("  skipped: {}", summary.skipped);
    println!("  errors:  {}", summary.errors);
    for detail in &summary.error_details {
        println!("    - {}", detail);
    }
    Ok(())
}

async fn create_user_command(settings: &Settings, matches: &ArgMatches) -> Result<()> {
    let username = matches
        .get_one::<String>("username")
        .context("missing username")?;
    let email = matches.get_one::<String>("email").context("missing email")?;
    let password = matches
        .get_one::<String>("password")
        .context("missing password")?;
    let staff = matches.get_flag("staff");

    let problems = password_strength_errors(password);
    if !problems.is_empty() {
        anyhow::bail!("Password rejected: {}", problems.join(" "));
    }

    let db = DatabaseConnection::open_and_migrate(&settings.database_url).await?;
    if users::username_exists(db.pool(), username).await? {
        anyhow::bail!("Username '{}' is already taken", username);
    }

    let user = users::create_user(
        db.pool(),
        &NewUser {
            username: username.clone(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            is_staff: staff,
            ..NewUser::default()
        },
    )
    .await
    .with_context(|| format!("Failed to create user '{}'", username))?;

    info!(user_id = user.id, staff, "user created");
    println!(
        "✓ Created {} '{}'",
        if staff { "staff user" } else { "user" },
        user.username
    );
    Ok(())
}
