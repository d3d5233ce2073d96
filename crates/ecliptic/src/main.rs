//! Ecliptic CLI: catalog bootstrap, MCP server, key administration.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ecliptic_logging::{ecliptic_home, init_logging, LogConfig};
use ecliptic_mcp::{McpServer, McpServerConfig};
use ecliptic_service::controllers::datastores::{self, CreateDatastoreInput};
use ecliptic_service::controllers::keys;
use ecliptic_service::{AppState, Ctx, EclipticConfig};

#[derive(Parser)]
#[command(name = "ecliptic", version, about = "Multi-tenant datastore service")]
struct Cli {
    /// Data directory (defaults to ECLIPTIC_HOME, then the working directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose console logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the catalog and seed a default organization
    Init {
        /// Organization name
        #[arg(long, default_value = "default")]
        organization: String,
        /// Administrative user email
        #[arg(long, default_value = "admin@localhost")]
        email: String,
    },
    /// Run the MCP server over stdio
    Mcp {
        /// MCP key token presented to the catalog
        #[arg(long, env = "ECLIPTIC_MCP_KEY")]
        key: String,
    },
    /// Manage MCP keys and their grants
    #[command(subcommand)]
    Key(KeyCommand),
    /// Manage datastores
    #[command(subcommand)]
    Datastore(DatastoreCommand),
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Create a key; the token is printed exactly once
    Create {
        #[arg(long)]
        name: String,
        /// Owning user email (created when missing)
        #[arg(long, default_value = "admin@localhost")]
        email: String,
    },
    /// List keys of the organization
    List,
    /// Revoke a key
    Revoke {
        #[arg(long)]
        id: String,
    },
    /// Grant an action on a target to a key
    Grant {
        #[arg(long)]
        key_id: String,
        /// Action name, e.g. datastore.table.row.select
        #[arg(long)]
        action: String,
        /// Target path, e.g. datastore:abc.table:users
        #[arg(long)]
        target: String,
    },
    /// Remove a grant by mapping id
    RevokeGrant {
        #[arg(long)]
        mapping_id: String,
    },
    /// List a key's grants
    Grants {
        #[arg(long)]
        key_id: String,
    },
}

#[derive(Subcommand)]
enum DatastoreCommand {
    /// List datastores of the organization
    List,
    /// Create a datastore
    Create {
        #[arg(long)]
        name: String,
    },
    /// Drop a datastore and its file
    Drop {
        #[arg(long)]
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig {
        app_name: "ecliptic",
        verbose: cli.verbose,
    })?;

    let data_dir = cli.data_dir.clone().unwrap_or_else(ecliptic_home);

    match cli.command {
        Command::Init {
            organization,
            email,
        } => init(&data_dir, &organization, &email).await,
        Command::Mcp { key } => {
            let mut server = McpServer::connect(McpServerConfig::new(&data_dir, key)).await?;
            server.run().await
        }
        Command::Key(command) => {
            let state = AppState::init(EclipticConfig::new(&data_dir)).await?;
            let ctx = default_ctx(&state).await?;
            let result = run_key_command(&state, &ctx, command).await;
            state.shutdown().await;
            result
        }
        Command::Datastore(command) => {
            let state = AppState::init(EclipticConfig::new(&data_dir)).await?;
            let ctx = default_ctx(&state).await?;
            let result = run_datastore_command(&state, &ctx, command).await;
            state.shutdown().await;
            result
        }
    }
}

async fn init(data_dir: &PathBuf, organization: &str, email: &str) -> Result<()> {
    let state = AppState::init(EclipticConfig::new(data_dir)).await?;
    if !state.catalog.organizations().await?.is_empty() {
        bail!("catalog at {} is already initialized", data_dir.display());
    }

    let org = state.catalog.create_organization(organization).await?;
    let user = state.catalog.create_user(email).await?;
    let session = state.catalog.create_session(&user.id, &org.id).await?;
    state.shutdown().await;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "organizationId": org.id,
            "userId": user.id,
            "sessionId": session.id,
            "dataDir": data_dir.display().to_string(),
        }))?
    );
    Ok(())
}

/// The CLI administers the catalog's sole organization; multi-organization
/// setups go through the HTTP surface instead.
async fn default_ctx(state: &AppState) -> Result<Ctx> {
    let organizations = state.catalog.organizations().await?;
    match organizations.as_slice() {
        [] => bail!("catalog is empty, run `ecliptic init` first"),
        [org] => Ok(Ctx::new(org.id.clone())),
        _ => bail!("multiple organizations present, the CLI refuses to guess"),
    }
}

async fn run_key_command(state: &AppState, ctx: &Ctx, command: KeyCommand) -> Result<()> {
    match command {
        KeyCommand::Create { name, email } => {
            let user = match state.catalog.user_by_email(&email).await? {
                Some(user) => user,
                None => state.catalog.create_user(&email).await?,
            };
            let key = keys::create_key(state, ctx, &user.id, &name).await?;
            print_json(&key)
        }
        KeyCommand::List => print_json(&keys::list_keys(state, ctx).await?),
        KeyCommand::Revoke { id } => {
            keys::revoke_key(state, ctx, &id).await?;
            print_json(&serde_json::json!({ "revoked": true }))
        }
        KeyCommand::Grant {
            key_id,
            action,
            target,
        } => print_json(&keys::grant(state, ctx, &key_id, &action, &target).await?),
        KeyCommand::RevokeGrant { mapping_id } => {
            keys::revoke_grant(state, ctx, &mapping_id).await?;
            print_json(&serde_json::json!({ "revoked": true }))
        }
        KeyCommand::Grants { key_id } => print_json(&keys::list_grants(state, ctx, &key_id).await?),
    }
}

async fn run_datastore_command(
    state: &AppState,
    ctx: &Ctx,
    command: DatastoreCommand,
) -> Result<()> {
    match command {
        DatastoreCommand::List => print_json(&datastores::list_datastores(state, ctx).await?),
        DatastoreCommand::Create { name } => print_json(
            &datastores::create_datastore(
                state,
                ctx,
                CreateDatastoreInput {
                    internal_name: name,
                    provider: "sqlite".to_string(),
                },
            )
            .await?,
        ),
        DatastoreCommand::Drop { id } => {
            datastores::drop_datastore(state, ctx, &id).await?;
            print_json(&serde_json::json!({ "deleted": true }))
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
