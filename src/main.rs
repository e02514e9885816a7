use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use comicvault::app::AppContext;
use comicvault::cli::{commands, Cli, Commands};
use comicvault::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Refresh => {
            commands::refresh(&ctx).await?;
        }
        Commands::List {
            favorites,
            search,
            sort,
            limit,
            offset,
        } => {
            commands::list_comics(&ctx, favorites, search, sort, limit, offset).await?;
        }
        Commands::Show { id } => {
            commands::show_comic(&ctx, id).await?;
        }
        Commands::Favorite { id, off } => {
            commands::set_favorite(&ctx, id, !off)?;
        }
        Commands::Note { id, text } => {
            commands::set_note(&ctx, id, &text)?;
        }
        Commands::History {
            limit,
            offset,
            clear,
        } => {
            commands::history(&ctx, limit, offset, clear).await?;
        }
        Commands::Explain { id } => {
            commands::explain(&ctx, id).await?;
        }
        Commands::Action { id, action } => {
            commands::run_action(&ctx, id, action).await?;
        }
    }

    Ok(())
}
