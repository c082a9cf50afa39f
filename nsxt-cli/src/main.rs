//! nsxt: declarative NSX-T object management.
//!
//! Reads a JSON manifest of DHCP relay profiles, SpoofGuard switching
//! profiles and NS group lookups, and converges the NSX manager to it:
//! - `plan` shows what would change
//! - `apply` creates, updates and deletes objects and records them in the state file
//! - `refresh` re-reads recorded objects
//! - `destroy` deletes recorded objects
//! - `import` adopts an existing object for a manifest entry

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nsxt_reconciler::{NsxClient, NsxConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod manifest;
mod state;

use commands::{Remotes, Session};
use config::ConnectionArgs;
use manifest::Manifest;
use state::StateFile;

/// Declarative NSX-T object management
#[derive(Parser, Debug)]
#[command(name = "nsxt", version, about)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Manifest of desired objects
    #[arg(long, default_value = "nsxt.json")]
    manifest: PathBuf,

    /// State file recording applied objects
    #[arg(long, default_value = "nsxt.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show what apply would change
    Plan,

    /// Converge the manager to the manifest
    Apply,

    /// Re-read recorded objects and update the state file
    Refresh,

    /// Delete recorded objects
    Destroy {
        /// Only destroy this entry
        #[arg(long)]
        name: Option<String>,
    },

    /// Adopt an existing object for a declared resource
    Import {
        /// Manifest entry to record the object under
        #[arg(long)]
        name: String,

        /// Id of the existing object
        #[arg(long)]
        id: String,
    },

    /// Look up an existing object
    #[command(subcommand)]
    Lookup(LookupCommands),
}

#[derive(Subcommand, Debug)]
enum LookupCommands {
    /// Find an NS group by id or display name
    NsGroup(NsGroupLookup),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct NsGroupLookup {
    /// NS group id
    #[arg(long)]
    id: Option<String>,

    /// NS group display name
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nsxt=info,nsxt_reconciler=info,reqwest=warn,hyper=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = NsxConfig::from(&cli.connection);
    info!("NSX manager: {}", config.base_url());
    let client = NsxClient::new(&config).context("Failed to create NSX client")?;
    let session = Session::new(Remotes::nsx(client));

    match cli.command {
        Commands::Plan => {
            let manifest = Manifest::load(&cli.manifest)?;
            let state = StateFile::load(&cli.state)?;
            commands::plan(&session, &manifest, &state).await
        }
        Commands::Apply => {
            let manifest = Manifest::load(&cli.manifest)?;
            let mut state = StateFile::load(&cli.state)?;
            let result = commands::apply(&session, &manifest, &mut state).await;
            state.save(&cli.state)?;
            result
        }
        Commands::Refresh => {
            let mut state = StateFile::load(&cli.state)?;
            let result = commands::refresh(&session, &mut state).await;
            state.save(&cli.state)?;
            result
        }
        Commands::Destroy { name } => {
            let mut state = StateFile::load(&cli.state)?;
            let result = commands::destroy(&session, &mut state, name.as_deref()).await;
            state.save(&cli.state)?;
            result
        }
        Commands::Import { name, id } => {
            let manifest = Manifest::load(&cli.manifest)?;
            let mut state = StateFile::load(&cli.state)?;
            commands::import(&session, &manifest, &mut state, &name, &id).await?;
            state.save(&cli.state)
        }
        Commands::Lookup(LookupCommands::NsGroup(lookup)) => {
            commands::lookup_ns_group(&session, lookup.id.as_deref(), lookup.name.as_deref())
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION: [&str; 7] = [
        "nsxt",
        "--host",
        "nsx.lab",
        "--username",
        "admin",
        "--password",
        "secret",
    ];

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(CONNECTION.iter().chain(args))
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_paths() {
        let cli = parse(&["plan"]).unwrap();
        assert_eq!(cli.manifest, PathBuf::from("nsxt.json"));
        assert_eq!(cli.state, PathBuf::from("nsxt.state.json"));
        assert!(matches!(cli.command, Commands::Plan));
    }

    #[test]
    fn test_destroy_single_entry() {
        let cli = parse(&["--state", "lab.json", "destroy", "--name", "relay"]).unwrap();
        assert_eq!(cli.state, PathBuf::from("lab.json"));
        match cli.command {
            Commands::Destroy { name } => assert_eq!(name.as_deref(), Some("relay")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_import_needs_name_and_id() {
        assert!(parse(&["import", "--name", "relay"]).is_err());

        let cli = parse(&["import", "--name", "relay", "--id", "p1"]).unwrap();
        match cli.command {
            Commands::Import { name, id } => {
                assert_eq!(name, "relay");
                assert_eq!(id, "p1");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_lookup_requires_exactly_one_selector() {
        assert!(parse(&["lookup", "ns-group"]).is_err());
        assert!(parse(&["lookup", "ns-group", "--id", "g1", "--name", "web"]).is_err());

        let cli = parse(&["lookup", "ns-group", "--name", "web"]).unwrap();
        match cli.command {
            Commands::Lookup(LookupCommands::NsGroup(lookup)) => {
                assert_eq!(lookup.id, None);
                assert_eq!(lookup.name.as_deref(), Some("web"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
