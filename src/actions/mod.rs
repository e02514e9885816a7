//! Things a viewer can do with the comic on screen.

use clap::ValueEnum;
use url::Url;

use crate::app::Result;
use crate::domain::ComicPair;
use crate::repository::ComicRepository;
use crate::resources::ResourceCache;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ComicAction {
    ToggleFavorite,
    Explain,
    ShowTranscript,
    OpenLink,
    OpenInBrowser,
    Share,
}

/// Everything an action may read or change.
pub struct ActionContext<'a, S> {
    pub repository: &'a ComicRepository<S>,
    pub pair: ComicPair,
    pub comic_base_url: &'a Url,
    pub resources: &'a ResourceCache,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    FavoriteChanged(bool),
    Explanation(Option<String>),
    Text(String),
    OpenUrl(Url),
}

impl<S> ActionContext<'_, S> {
    /// Page of the comic on the original site.
    pub fn comic_url(&self) -> Result<Url> {
        Ok(self.comic_base_url.join(&format!("{}/", self.pair.id()))?)
    }

    /// Whether the comic only renders properly on the original site.
    pub fn needs_browser(&self) -> bool {
        self.resources.exceptions().contains(self.pair.id())
    }
}

impl ComicAction {
    pub const ALL: [ComicAction; 6] = [
        ComicAction::ToggleFavorite,
        ComicAction::Explain,
        ComicAction::ShowTranscript,
        ComicAction::OpenLink,
        ComicAction::OpenInBrowser,
        ComicAction::Share,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ComicAction::ToggleFavorite => "Toggle favorite",
            ComicAction::Explain => "Explain",
            ComicAction::ShowTranscript => "Transcript",
            ComicAction::OpenLink => "Open link",
            ComicAction::OpenInBrowser => "Open in browser",
            ComicAction::Share => "Share",
        }
    }

    pub fn key(self) -> char {
        match self {
            ComicAction::ToggleFavorite => 'f',
            ComicAction::Explain => 'e',
            ComicAction::ShowTranscript => 't',
            ComicAction::OpenLink => 'l',
            ComicAction::OpenInBrowser => 'o',
            ComicAction::Share => 's',
        }
    }

    pub fn is_available<S>(self, ctx: &ActionContext<'_, S>) -> bool {
        match self {
            ComicAction::ShowTranscript => ctx.pair.cached.transcript.is_some(),
            ComicAction::OpenLink => ctx.pair.cached.link.is_some(),
            _ => true,
        }
    }

    pub async fn execute<S>(self, ctx: &ActionContext<'_, S>) -> Result<ActionOutcome>
    where
        S: Store + Send + Sync + 'static,
    {
        let comic = &ctx.pair;
        tracing::debug!("Running {:?} on comic {}", self, comic.id());

        let outcome = match self {
            ComicAction::ToggleFavorite => {
                let listed = ctx
                    .repository
                    .set_favorite_comic(comic.id(), !comic.listed.favorite)?;
                ActionOutcome::FavoriteChanged(listed.favorite)
            }
            ComicAction::Explain => {
                ActionOutcome::Explanation(ctx.repository.get_comic_explanation(comic.id()).await?)
            }
            ComicAction::ShowTranscript => {
                ActionOutcome::Text(comic.cached.transcript.clone().unwrap_or_default())
            }
            ComicAction::OpenLink => match &comic.cached.link {
                // Links are sometimes relative to the comic site.
                Some(link) => ActionOutcome::OpenUrl(ctx.comic_base_url.join(link)?),
                None => ActionOutcome::OpenUrl(ctx.comic_url()?),
            },
            ComicAction::OpenInBrowser => ActionOutcome::OpenUrl(ctx.comic_url()?),
            ComicAction::Share => ActionOutcome::Text(format!(
                "{}: {} {}",
                comic.id(),
                comic.listed.title,
                ctx.comic_url()?
            )),
        };

        Ok(outcome)
    }
}
