use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{Engine, Role};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "stockroom_admin")]
#[command(about = "Admin utilities for Stockroom (bootstrap actors)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./stockroom.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Actor(Actor),
}

#[derive(Args, Debug)]
struct Actor {
    #[command(subcommand)]
    command: ActorCommand,
}

#[derive(Subcommand, Debug)]
enum ActorCommand {
    /// Register an actor, or change the name and role of an existing one.
    Create(ActorCreateArgs),
    List,
}

#[derive(Args, Debug)]
struct ActorCreateArgs {
    /// Id issued by the auth service; generated when missing.
    #[arg(long)]
    id: Option<Uuid>,
    #[arg(long)]
    name: String,
    /// One of admin, manager, employee.
    #[arg(long, default_value = "employee")]
    role: String,
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Actor(Actor {
            command: ActorCommand::Create(args),
        }) => {
            let role = match Role::try_from(args.role.as_str()) {
                Ok(role) => role,
                Err(err) => {
                    eprintln!("{err}");
                    std::process::exit(2);
                }
            };
            let id = args.id.unwrap_or_else(Uuid::new_v4);
            let actor = engine.upsert_actor(id, &args.name, role).await?;
            println!(
                "actor {} ({}) is {}",
                actor.name,
                actor.id,
                actor.role.as_str()
            );
        }
        Command::Actor(Actor {
            command: ActorCommand::List,
        }) => {
            for actor in engine.list_actors().await? {
                println!("{}\t{}\t{}", actor.id, actor.role.as_str(), actor.name);
            }
        }
    }

    Ok(())
}
