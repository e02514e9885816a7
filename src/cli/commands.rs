use futures::StreamExt;

use crate::actions::{ActionContext, ActionOutcome, ComicAction};
use crate::app::{AppContext, ComicError, Result};
use crate::domain::{ComicPair, ComicQuery, ComicSort, ListedComic};
use crate::store::SqliteStore;

pub async fn refresh(ctx: &AppContext) -> Result<()> {
    println!("Refreshing archive...");

    if ctx.repository.refresh_comics().await? {
        let total = first(ctx.repository.count_comics(ComicQuery::default())).await?;
        println!("Refresh complete: {} comics listed", total.unwrap_or(0));
    } else {
        println!("Archive unavailable, showing cached comics only");
    }
    Ok(())
}

pub async fn list_comics(
    ctx: &AppContext,
    favorites: bool,
    search: Option<String>,
    sort: Option<ComicSort>,
    limit: Option<u32>,
    offset: u32,
) -> Result<()> {
    let mut query = if favorites {
        ComicQuery::favorites()
    } else {
        ComicQuery::default()
    };
    if let Some(text) = search {
        query = query.with_text(text);
    }
    query = query
        .with_sort(sort.unwrap_or(ctx.config.listing.sort))
        .page(limit.unwrap_or(ctx.config.listing.page_size), offset);

    let total = first(ctx.repository.count_comics(query.clone())).await?.unwrap_or(0);
    let comics = first(ctx.repository.search_comics(query)).await?.unwrap_or_default();

    if comics.is_empty() {
        println!("No comics");
        return Ok(());
    }

    for comic in &comics {
        println!("{}", format_listed(comic));
    }
    println!("\n{} of {} comics", comics.len(), total);

    Ok(())
}

pub async fn show_comic(ctx: &AppContext, id: i64) -> Result<()> {
    let Some(pair) = load_comic(ctx, id).await? else {
        return Ok(());
    };

    ctx.repository.add_history_entry(id)?;

    println!("{}", format_listed(&pair.listed));
    println!("  {}", pair.cached.img_url);
    println!("  {}", pair.cached.mouseover);
    if !pair.listed.note.is_empty() {
        println!("  Note: {}", pair.listed.note);
    }
    if let Some(news) = &pair.cached.news_content {
        println!("  News: {}", news);
    }

    let action_ctx = action_context(ctx, pair);
    if action_ctx.needs_browser() {
        if let Some(exception) = ctx.resources.exceptions().get(id) {
            println!("  Best viewed in a browser: {}", exception.reason);
        }
    }

    let available: Vec<String> = ComicAction::ALL
        .iter()
        .filter(|action| action.is_available(&action_ctx))
        .map(|action| format!("[{}] {}", action.key(), action.label()))
        .collect();
    println!("\n{}", available.join("  "));

    Ok(())
}

pub fn set_favorite(ctx: &AppContext, id: i64, favorite: bool) -> Result<()> {
    let comic = ctx.repository.set_favorite_comic(id, favorite)?;
    if comic.favorite {
        println!("Marked favorite: {}", comic.title);
    } else {
        println!("Unmarked favorite: {}", comic.title);
    }
    Ok(())
}

pub fn set_note(ctx: &AppContext, id: i64, text: &str) -> Result<()> {
    let comic = ctx.repository.set_comic_note(id, text)?;
    println!("Saved note for {}", comic.title);
    Ok(())
}

pub async fn history(ctx: &AppContext, limit: Option<u32>, offset: u32, clear: bool) -> Result<()> {
    if clear {
        ctx.repository.delete_history()?;
        println!("History cleared");
        return Ok(());
    }

    let total = first(ctx.repository.count_history_entries()).await?.unwrap_or(0);
    let records = first(ctx.repository.history_page(limit, offset))
        .await?
        .unwrap_or_default();

    if records.is_empty() {
        println!("No history");
        return Ok(());
    }

    for record in &records {
        let viewed = record
            .entry
            .viewed_at()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "                ".to_string());
        println!("{} {:>5} {}", viewed, record.comic.id, record.comic.title);
    }
    println!("\n{} of {} views", records.len(), total);

    Ok(())
}

pub async fn explain(ctx: &AppContext, id: i64) -> Result<()> {
    match ctx.repository.get_comic_explanation(id).await {
        Ok(Some(html)) => println!("{}", html),
        Ok(None) => println!("No explanation found for comic {}", id),
        Err(e) if e.is_transport() => eprintln!("Could not fetch explanation: {}", e),
        Err(e) => return Err(e),
    }
    Ok(())
}

pub async fn run_action(ctx: &AppContext, id: i64, action: ComicAction) -> Result<()> {
    let Some(pair) = load_comic(ctx, id).await? else {
        return Ok(());
    };

    let action_ctx = action_context(ctx, pair);
    if !action.is_available(&action_ctx) {
        println!("{} is not available for comic {}", action.label(), id);
        return Ok(());
    }

    match action.execute(&action_ctx).await? {
        ActionOutcome::FavoriteChanged(true) => println!("Marked favorite"),
        ActionOutcome::FavoriteChanged(false) => println!("Unmarked favorite"),
        ActionOutcome::Explanation(Some(html)) => println!("{}", html),
        ActionOutcome::Explanation(None) => println!("No explanation found for comic {}", id),
        ActionOutcome::Text(text) => println!("{}", text),
        ActionOutcome::OpenUrl(url) => println!("{}", url),
    }

    Ok(())
}

/// First emission of the merged comic view. Transport failures are reported
/// and yield `None`.
async fn load_comic(ctx: &AppContext, id: i64) -> Result<Option<ComicPair>> {
    let mut subscription = ctx.repository.get_comic_from_id(id);
    match subscription.next().await {
        Some(Ok(pair)) => Ok(Some(pair)),
        Some(Err(e)) if e.is_transport() => {
            eprintln!("Could not fetch comic {}: {}", id, e);
            Ok(None)
        }
        Some(Err(ComicError::ComicNotFound(_))) | None => {
            println!("Comic {} not found", id);
            Ok(None)
        }
        Some(Err(e)) => Err(e),
    }
}

fn action_context(ctx: &AppContext, pair: ComicPair) -> ActionContext<'_, SqliteStore> {
    ActionContext {
        repository: &ctx.repository,
        pair,
        comic_base_url: &ctx.comic_base_url,
        resources: &ctx.resources,
    }
}

async fn first<T, S>(mut stream: S) -> Result<Option<T>>
where
    S: futures::Stream<Item = Result<T>> + Unpin,
{
    stream.next().await.transpose()
}

fn format_listed(comic: &ListedComic) -> String {
    let marker = if comic.favorite { "★" } else { " " };
    let date = comic
        .parsed_date()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| comic.date.clone());
    format!("{} {:>5} {:<10} {}", marker, comic.id, date, comic.title)
}
