use std::future::Future;
use std::io;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::App;
use crate::error::{AppError, AppResult};
use crate::generator::ImageGenerator;
use crate::models::{DEFAULT_PER_PAGE, Style};

/// Prompt improvement, image generation and gallery bookkeeping
#[derive(Parser, Debug)]
#[command(name = "prompt-canvas")]
#[command(version)]
#[command(about = "Generate images from prompts and manage favorites and collections", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a user
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },

    /// Delete a user and everything they own
    DeleteUser {
        #[arg(long)]
        user_id: Uuid,
    },

    /// Improve a prompt, acquire an image and save it
    Generate {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        prompt: String,
        /// realistic, anime, painting, cartoon or minimalist
        #[arg(long, default_value = "realistic")]
        style: String,
    },

    /// List a user's images, newest first
    Images {
        #[arg(long)]
        user_id: Uuid,
        #[command(flatten)]
        paging: PageArgs,
    },

    /// Add an image to favorites
    Favorite {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        image_id: Uuid,
    },

    /// Remove an image from favorites
    Unfavorite {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        image_id: Uuid,
    },

    /// List favorites, newest first
    Favorites {
        #[arg(long)]
        user_id: Uuid,
        #[command(flatten)]
        paging: PageArgs,
    },

    /// Create a named collection
    CollectionCreate {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        public: bool,
    },

    /// Add an image to a collection
    CollectionAdd {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        collection_id: Uuid,
        #[arg(long)]
        image_id: Uuid,
    },

    /// Remove an image from a collection
    CollectionRemove {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        collection_id: Uuid,
        #[arg(long)]
        image_id: Uuid,
    },

    /// List a user's collections
    Collections {
        #[arg(long)]
        user_id: Uuid,
    },

    /// List the images in a collection
    CollectionImages {
        #[arg(long)]
        user_id: Uuid,
        #[arg(long)]
        collection_id: Uuid,
        #[command(flatten)]
        paging: PageArgs,
    },

    /// Image, favorite and collection counts
    Stats {
        #[arg(long)]
        user_id: Uuid,
    },

    /// Probe the external providers and print their availability
    Status,

    /// Keep re-probing unavailable providers until Ctrl-C
    Monitor,
}

fn to_json<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|err| AppError::Unexpected(err.into()))
}

/// Executes one command and returns its JSON result.
pub async fn execute(command: Commands, app: &App) -> AppResult<Value> {
    let repository = &app.repository;
    match command {
        Commands::Register { username, email } => {
            to_json(&repository.create_user(&username, &email).await?)
        }
        Commands::DeleteUser { user_id } => {
            repository.delete_user(user_id).await?;
            Ok(json!({"message": "User deleted"}))
        }
        Commands::Generate {
            user_id,
            prompt,
            style,
        } => {
            let style: Style = style.parse().map_err(AppError::Validation)?;
            ImageGenerator::validate_prompt(&prompt)?;
            app.monitor().initialize().await;
            to_json(&app.generator.generate(user_id, &prompt, style).await?)
        }
        Commands::Images { user_id, paging } => to_json(
            &repository
                .list_images(user_id, paging.page, paging.per_page)
                .await?,
        ),
        Commands::Favorite { user_id, image_id } => {
            to_json(&repository.add_favorite(user_id, image_id).await?)
        }
        Commands::Unfavorite { user_id, image_id } => {
            repository.remove_favorite(user_id, image_id).await?;
            Ok(json!({"message": "Removed from favorites"}))
        }
        Commands::Favorites { user_id, paging } => to_json(
            &repository
                .list_favorites(user_id, paging.page, paging.per_page)
                .await?,
        ),
        Commands::CollectionCreate {
            user_id,
            name,
            description,
            public,
        } => to_json(
            &repository
                .create_collection(user_id, &name, &description, public)
                .await?,
        ),
        Commands::CollectionAdd {
            user_id,
            collection_id,
            image_id,
        } => to_json(
            &repository
                .add_to_collection(user_id, collection_id, image_id)
                .await?,
        ),
        Commands::CollectionRemove {
            user_id,
            collection_id,
            image_id,
        } => {
            repository
                .remove_from_collection(user_id, collection_id, image_id)
                .await?;
            Ok(json!({"message": "Removed from collection"}))
        }
        Commands::Collections { user_id } => {
            to_json(&repository.list_collections(user_id).await?)
        }
        Commands::CollectionImages {
            user_id,
            collection_id,
            paging,
        } => to_json(
            &repository
                .list_collection_images(user_id, collection_id, paging.page, paging.per_page)
                .await?,
        ),
        Commands::Stats { user_id } => to_json(&repository.stats(user_id).await?),
        Commands::Status => {
            let monitor = app.monitor();
            monitor.initialize().await;
            to_json(&monitor.snapshots())
        }
        Commands::Monitor => run_monitor(app, tokio::signal::ctrl_c()).await,
    }
}

/// Probes once, then keeps the re-probe loop running until `shutdown`
/// resolves. Returns the snapshots taken after the startup probe.
pub async fn run_monitor<F>(app: &App, shutdown: F) -> AppResult<Value>
where
    F: Future<Output = io::Result<()>>,
{
    let monitor = app.monitor();
    monitor.initialize().await;
    let snapshots = to_json(&monitor.snapshots())?;
    let handle = monitor.spawn();
    info!("availability monitor running; press Ctrl-C to stop");
    if let Err(err) = shutdown.await {
        warn!("could not listen for shutdown signal, stopping monitor: {}", err);
    }
    handle.shutdown().await;
    Ok(snapshots)
}
