use mimalloc::MiMalloc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use yonkoma::{Config, GenerationClient, Store};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = Config::load()?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.basic.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.basic.database_url,
        loglevel = %cfg.basic.loglevel,
        base_url = %cfg.generation.base_url,
        proxy = %cfg.generation.proxy.as_ref().map_or("<none>", |u| u.as_str())
    );

    let store = Store::new(cfg.basic.database_url.as_str());
    store.initialize().await?;

    let projects = store.get_all_projects().await?;
    info!(count = projects.len(), "Projects loaded");
    for project in &projects {
        let characters = store.get_characters_by_project(&project.id).await?;
        let episodes = store.get_episodes_by_project(&project.id).await?;
        info!(
            id = %project.id,
            name = %project.name,
            art_style = %project.art_style,
            characters = characters.len(),
            episodes = episodes.len(),
            updated_at = %project.updated_at
        );
    }

    match GenerationClient::new(store.clone(), cfg.generation.clone()) {
        Ok(_) => info!(timeout_secs = cfg.generation.timeout_secs, "Generation client ready"),
        Err(e) => warn!(error = %e, "Generation client unavailable"),
    }
    Ok(())
}
