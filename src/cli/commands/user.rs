use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::models::User;
use crate::database::{DatabaseManager, PgStore, PlaceRepository, UserRepository};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user")]
    Add {
        #[arg(help = "Display name")]
        name: String,
    },

    #[command(about = "Show a user and the places it owns")]
    Show {
        #[arg(help = "User id")]
        id: Uuid,
    },
}

async fn open(config: &AppConfig) -> anyhow::Result<PgStore> {
    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("user commands need DATABASE_URL to point at the places database")?;
    DatabaseManager::migrate(&pool).await?;
    Ok(PgStore::new(pool))
}

pub async fn handle(cmd: UserCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let store = open(config).await?;

    match cmd {
        UserCommands::Add { name } => {
            let user = User::new(name);
            store.save_user(&user).await?;

            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string(&user)?),
                OutputFormat::Text => println!("Created user '{}' with id {}", user.name, user.id),
            }
        }
        UserCommands::Show { id } => {
            let user = store
                .find_user(id)
                .await?
                .with_context(|| format!("no user with id {id}"))?;
            let places = store.find_places_by_creator(id).await?;

            match output_format {
                OutputFormat::Json => println!("{}", json!({ "user": user, "places": places })),
                OutputFormat::Text => {
                    println!("{} ({})", user.name, user.id);
                    for place in places {
                        println!("  {}  {}  {}", place.id, place.title, place.address);
                    }
                }
            }
        }
    }
    Ok(())
}
