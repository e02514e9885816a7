use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::app::error::{ComicError, Result};
use crate::config::Config;
use crate::fetcher::http::base_url;
use crate::fetcher::{ExplainWikiFetcher, HttpClient, XkcdArchiveFetcher, XkcdComicFetcher};
use crate::repository::ComicRepository;
use crate::resources::ResourceCache;
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub comic_base_url: Url,
    pub store: Arc<SqliteStore>,
    pub repository: ComicRepository<SqliteStore>,
    pub resources: ResourceCache,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.storage.db_path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let http = HttpClient::new(&config.remote)?;
        let comic_base_url = base_url(&config.remote.comic_base_url)?;
        let explain_base_url = base_url(&config.remote.explain_base_url)?;

        let repository = ComicRepository::new(
            store.clone(),
            Arc::new(XkcdComicFetcher::new(http.clone(), comic_base_url.clone())),
            Arc::new(XkcdArchiveFetcher::new(http.clone(), comic_base_url.clone())?),
            Arc::new(ExplainWikiFetcher::new(http, explain_base_url)),
        );

        Ok(Self {
            config,
            comic_base_url,
            store,
            repository,
            resources: ResourceCache::new(),
        })
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| ComicError::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("comicvault");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("comicvault.db"))
    }
}
