use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cqrs_engine::domain::user::{
    self, ChangeUserEmail, CreateUser, DeactivateUser, GetUser, ListActiveUsers, RenameUser,
    UserCommandHandler, UserDirectory,
};
use cqrs_engine::{
    AggregateRepository, CommandBus, EngineConfig, EventStore, InMemoryEventStore, Metrics,
    PostgresEventStore, ProjectorManager, QueryBus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cqrs_engine=debug")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(
        postgres = config.database_url.is_some(),
        stream_page_size = config.stream_page_size,
        conflict_retry_attempts = config.conflict_retry.max_attempts,
        "Starting event-sourcing engine demo"
    );

    // === 1. Event store ===
    let store: Arc<dyn EventStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to PostgreSQL event store...");
            let store = PostgresEventStore::connect(url, config.max_connections).await?;
            store.init_schema().await?;
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory event store");
            Arc::new(InMemoryEventStore::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);

    // === 3. Read side ===
    let directory = Arc::new(UserDirectory::new());
    let mut projectors = ProjectorManager::new(store.clone())
        .with_page_size(config.stream_page_size)
        .with_metrics(metrics.clone());
    projectors.register_projector(directory.clone())?;
    let projectors = Arc::new(projectors);

    // === 4. Write side and buses ===
    let repository = AggregateRepository::new(store.clone()).with_metrics(metrics.clone());
    let handler = UserCommandHandler::new(repository)
        .with_projectors(projectors.clone())
        .with_retry(config.conflict_retry.clone());

    let mut commands = CommandBus::new().with_metrics(metrics.clone());
    let mut queries = QueryBus::new().with_metrics(metrics.clone());
    user::register_handlers(&mut commands, &mut queries, handler, directory.clone())?;
    tracing::info!(
        commands = ?commands.registered_commands(),
        queries = ?queries.registered_queries(),
        "Buses ready"
    );

    // === 5. Demonstrate a user lifecycle ===
    let create = CreateUser::new("ada@example.com", "Ada");
    let user_id = create.user_id.clone();
    commands.dispatch(create).await?;
    tracing::info!(%user_id, "✅ User created");

    commands
        .dispatch(ChangeUserEmail {
            user_id: user_id.clone(),
            new_email: user::Email::new("ada@lovelace.dev"),
        })
        .await?;
    commands
        .dispatch(RenameUser {
            user_id: user_id.clone(),
            display_name: "Ada Lovelace".to_string(),
        })
        .await?;

    if let Err(err) = commands
        .dispatch(CreateUser::new("not-an-email", "Broken"))
        .await
    {
        tracing::info!(error = %err, "Rejected invalid command as expected");
    }

    let view = queries.dispatch(GetUser { user_id: user_id.clone() }).await?;
    tracing::info!(?view, "📖 Read model after updates");

    commands
        .dispatch(DeactivateUser {
            user_id: user_id.clone(),
            reason: "Demo finished".to_string(),
        })
        .await?;

    let active = queries.dispatch(ListActiveUsers { limit: 10 }).await?;
    tracing::info!(active = active.len(), "Active users after deactivation");

    // === 6. Rebuild the read model from the event log ===
    let report = projectors.rebuild_projections("user").await?;
    tracing::info!(
        scanned = report.events_scanned,
        projected = report.events_projected,
        clean = report.is_clean(),
        "🔁 Rebuilt projections"
    );

    tracing::info!(
        metric_families = metrics.registry().gather().len(),
        "🎉 Demo complete!"
    );

    Ok(())
}
