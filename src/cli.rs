// cli.rs - `pantry` admin binary: serve, migrate, seed accounts
use clap::{Parser, Subcommand};

use crate::app;
use crate::auth;
use crate::store::{CatalogStore, PgStore};

#[derive(Parser)]
#[command(name = "pantry")]
#[command(about = "Pantry CLI - operate the recipe catalog API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API server")]
    Serve,

    #[command(about = "Apply the database schema to DATABASE_URL")]
    Migrate,

    #[command(about = "Create an account directly in the database")]
    CreateUser {
        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve => app::serve().await,
        Commands::Migrate => migrate().await,
        Commands::CreateUser {
            email,
            name,
            password,
        } => create_user(email, name, password).await,
    }
}

async fn migrate() -> anyhow::Result<()> {
    let store = PgStore::connect_from_env().await?;
    store.migrate().await?;
    println!("Schema applied");
    Ok(())
}

async fn create_user(email: String, name: String, password: String) -> anyhow::Result<()> {
    if password.chars().count() < 5 {
        anyhow::bail!("password must be at least 5 characters");
    }
    let email = auth::normalize_email(&email);
    if !email.contains('@') {
        anyhow::bail!("email must contain '@'");
    }

    let store = PgStore::connect_from_env().await?;
    store.migrate().await?;

    let password_hash = auth::hash_password(&password)?;
    let user = store.create_user(&email, name.trim(), &password_hash).await?;
    println!("Created user {} <{}>", user.name, user.email);
    Ok(())
}
