//! `orchid` - command line client for the orchid morphology database

mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use oc_auth::{ApiClient, ApiRequest, FileStore, LoginRequest, SessionEvent};
use oc_data::{Catalog, MorphologyQuery, Navigation, SpeciesQuery, UserQuery};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "orchid")]
#[command(author, version, about = "Client for the orchid morphology database", long_about = None)]
struct Cli {
    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "ORCHID_BASE_URL")]
    base_url: Option<String>,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long, env = "ORCHID_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the logged in user
    Whoami,

    /// Issue an authenticated GET and print the JSON answer
    Get {
        path: String,

        /// Query parameters as key=value, repeatable
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
    },

    /// Species records
    Species {
        #[command(subcommand)]
        action: SpeciesAction,
    },

    /// Flower measurements
    Flowers {
        /// Restrict to these species, repeatable
        #[arg(long = "species-id")]
        species_ids: Vec<i64>,

        #[arg(long)]
        page: Option<u64>,
    },

    /// List user accounts (admin)
    Users {
        #[arg(long)]
        username: Option<String>,
    },

    /// Show where the navigation guard sends the current session for a path
    Route { path: String },
}

#[derive(Subcommand)]
enum SpeciesAction {
    List {
        #[arg(long)]
        family: Option<String>,

        #[arg(long)]
        genus: Option<String>,

        #[arg(long)]
        page: Option<u64>,

        #[arg(long)]
        limit: Option<u64>,
    },
    Show {
        id: i64,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "orchid=debug,oc_auth=debug,oc_data=debug"
    } else {
        "orchid=info,oc_auth=info,oc_data=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_password() -> anyhow::Result<Zeroizing<String>> {
    eprint!("Password: ");
    let mut line = Zeroizing::new(String::new());
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(Zeroizing::new(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<ApiClient> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let app_config = AppConfig::load(&config_path).await?;
    let client_config = app_config.client_config(cli.base_url.as_deref())?;

    let storage_dir = app_config.storage_dir()?;
    let store = FileStore::new(&storage_dir)
        .await
        .with_context(|| format!("Failed to open session storage at {}", storage_dir.display()))?;

    let client = ApiClient::connect(client_config, Arc::new(store))
        .await
        .context("Failed to restore session")?;

    let mut events = client.session().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::LoggedOut => warn!("Session ended, run `orchid login` again"),
                SessionEvent::Refreshed => info!("Access token refreshed"),
                SessionEvent::LoggedIn(_) => {}
            }
        }
    });

    Ok(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let client = connect(&cli).await?;

    match cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(password) => Zeroizing::new(password),
                None => read_password()?,
            };
            let claims = client
                .login(&LoginRequest::new(username, password.as_str()))
                .await
                .context("Login failed")?;
            println!("Logged in as {} ({})", claims.name, claims.role);
        }
        Commands::Logout => {
            client.logout().await?;
            println!("Logged out");
        }
        Commands::Whoami => match client.session().current_identity() {
            Some(identity) => println!(
                "{} (id {}, role {})",
                identity.username, identity.user_id, identity.role
            ),
            None => println!("Not logged in"),
        },
        Commands::Get { path, query } => {
            let body: serde_json::Value = client
                .get_json(ApiRequest::get(path).query(query))
                .await?;
            print_json(&body)?;
        }
        Commands::Species { action } => {
            let catalog = Catalog::new(client);
            match action {
                SpeciesAction::List {
                    family,
                    genus,
                    page,
                    limit,
                } => {
                    let page = catalog
                        .species
                        .list(&SpeciesQuery {
                            family,
                            genus,
                            page,
                            limit,
                            ..Default::default()
                        })
                        .await?;
                    for species in &page.data {
                        println!(
                            "{:>5}  {:<32} {:<10} {}",
                            species.species_id,
                            species.scientific_name,
                            species.chinese_name,
                            species.conservation_status.label()
                        );
                    }
                    println!(
                        "page {}/{} ({} total)",
                        page.pagination.page, page.pagination.pages, page.pagination.total
                    );
                }
                SpeciesAction::Show { id } => print_json(&catalog.species.get(id).await?)?,
            }
        }
        Commands::Flowers { species_ids, page } => {
            let page = Catalog::new(client)
                .flowers
                .list(&MorphologyQuery {
                    species_ids,
                    page,
                    ..Default::default()
                })
                .await?;
            print_json(&page)?;
        }
        Commands::Users { username } => {
            let page = Catalog::new(client)
                .users
                .list(&UserQuery {
                    username,
                    role: None,
                })
                .await?;
            print_json(&page)?;
        }
        Commands::Route { path } => match oc_data::guard(&path, &client.session().snapshot()) {
            Navigation::Allow { title } => println!("allow: {}", title),
            Navigation::Redirect(to) => println!("redirect: {}", to),
        },
    }

    Ok(())
}
