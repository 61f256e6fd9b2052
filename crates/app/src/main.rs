use engine::{AuthorityPolicy, Broadcaster, Engine, Role, broadcast::DEFAULT_CAPACITY};
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "stockroom={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.server.database).await?;

    // Keys may come back lowercased from environment overrides.
    let authority: Vec<(String, &Vec<String>)> = settings
        .authority
        .iter()
        .map(|(kind, roles)| (kind.to_ascii_uppercase(), roles))
        .collect();
    let policy = AuthorityPolicy::from_table(
        authority
            .iter()
            .map(|(kind, roles)| (kind.as_str(), roles.iter().map(String::as_str))),
    )?;

    let mut builder = Engine::builder()
        .database(db)
        .broadcaster(Broadcaster::new(
            settings.engine.broadcast_capacity.unwrap_or(DEFAULT_CAPACITY),
        ))
        .policy(policy)
        .require_funds(settings.engine.require_funds);
    if let Some(retries) = settings.engine.cas_retries {
        builder = builder.cas_retries(retries);
    }
    let engine = builder.build().await?;

    for seed in &settings.actors {
        let role = Role::try_from(seed.role.as_str())?;
        let actor = engine.upsert_actor(seed.id, &seed.name, role).await?;
        tracing::info!(actor = %actor.id, role = role.as_str(), "seeded actor {}", actor.name);
    }

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let addr = format!("{}:{}", bind, settings.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    server::run_with_listener(engine, listener).await?;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
