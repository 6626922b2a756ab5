use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use likeness_backends::Config;
use std::path::PathBuf;

mod admin;
mod client;

use admin::AdminCommand;

#[derive(Parser)]
#[command(name = "likeness", about = "Likeness identity resolution CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index every face in an image under one identity label
    Index {
        /// Identity label (e.g., "Ada Lovelace")
        #[arg(short, long)]
        label: String,
        image: PathBuf,
    },
    /// Resolve the faces in an image to identities
    Match {
        image: PathBuf,
        /// Print the result as a JSON array in match order
        #[arg(long)]
        json: bool,
    },
    /// Resolve faces and fetch one representative portrait
    MatchImage {
        image: PathBuf,
        /// Where to write the portrait
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Detect generic labels in an image
    Labels { image: PathBuf },
    /// Detect faces in an image without searching
    Faces { image: PathBuf },
    /// Upload a portrait for an identity
    Upload {
        /// Object key, normally the face id the portrait belongs to
        #[arg(short, long)]
        key: String,
        #[arg(short, long)]
        identity: String,
        image: PathBuf,
    },
    /// Show daemon status
    Status,
    /// Manage face collections
    #[command(subcommand)]
    Collection(CollectionCommand),
    /// Manage the identity table
    #[command(subcommand)]
    Table(TableCommand),
    /// Remove faces from the configured collection
    FacesDelete {
        #[arg(required = true)]
        face_ids: Vec<String>,
    },
    /// Manage identity records
    #[command(subcommand)]
    Record(RecordCommand),
    /// Inspect stored portraits
    #[command(subcommand)]
    Portrait(PortraitCommand),
}

#[derive(Subcommand, Debug)]
enum CollectionCommand {
    Create { name: String },
    Delete { name: String },
    List,
}

#[derive(Subcommand, Debug)]
enum TableCommand {
    /// Create the identity table (defaults to the configured name)
    Create { name: Option<String> },
    Delete { name: Option<String> },
    Exists { name: Option<String> },
}

#[derive(Subcommand, Debug)]
enum RecordCommand {
    Delete { face_id: String },
}

#[derive(Subcommand, Debug)]
enum PortraitCommand {
    /// Copy a portrait to a local path; a trailing `/` keeps the key as file name
    Download { key: String, destination: PathBuf },
    /// Print the metadata stored with a portrait
    Info { key: String },
}

impl Commands {
    /// Commands that run locally instead of through the daemon.
    fn into_admin(self) -> std::result::Result<AdminCommand, Self> {
        Ok(match self {
            Commands::Collection(CollectionCommand::Create { name }) => {
                AdminCommand::CreateCollection(name)
            }
            Commands::Collection(CollectionCommand::Delete { name }) => {
                AdminCommand::DeleteCollection(name)
            }
            Commands::Collection(CollectionCommand::List) => AdminCommand::ListCollections,
            Commands::Table(TableCommand::Create { name }) => AdminCommand::CreateTable(name),
            Commands::Table(TableCommand::Delete { name }) => AdminCommand::DeleteTable(name),
            Commands::Table(TableCommand::Exists { name }) => AdminCommand::TableExists(name),
            Commands::FacesDelete { face_ids } => AdminCommand::DeleteFaces(face_ids),
            Commands::Record(RecordCommand::Delete { face_id }) => {
                AdminCommand::DeleteRecord(face_id)
            }
            Commands::Portrait(PortraitCommand::Download { key, destination }) => {
                AdminCommand::DownloadPortrait { key, destination }
            }
            Commands::Portrait(PortraitCommand::Info { key }) => AdminCommand::PortraitInfo(key),
            other => return Err(other),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    let command = match cli.command.into_admin() {
        Ok(admin) => return admin::run(config, admin).await,
        Err(command) => command,
    };

    let proxy = client::connect(&config).await?;
    match command {
        Commands::Index { label, image } => client::index(&proxy, &image, &label).await?,
        Commands::Match { image, json } => client::match_faces(&proxy, &image, json).await?,
        Commands::MatchImage { image, output } => {
            client::match_with_image(&proxy, &image, output.as_deref()).await?
        }
        Commands::Labels { image } => client::labels(&proxy, &image).await?,
        Commands::Faces { image } => client::faces(&proxy, &image).await?,
        Commands::Upload {
            key,
            identity,
            image,
        } => client::upload(&proxy, &image, &key, &identity).await?,
        Commands::Status => client::status(&proxy).await?,
        local => bail!("{local:?} does not go through the daemon"),
    }

    Ok(())
}
