//! # comicvault
//!
//! An offline-first xkcd reader that keeps a local SQLite cache of the comic
//! archive and fills it lazily from the network.
//!
//! ## Architecture
//!
//! ```text
//! Fetchers → Repository → Store → CLI
//!                 ↑          │
//!                 └─ streams ┘
//! ```
//!
//! - [`fetcher`]: comic JSON, archive page and explanation wiki clients
//! - [`store`]: SQLite persistence with change notifications
//! - [`repository`]: reactive reads and fetch-on-miss synchronization
//!
//! ## Quick Start
//!
//! ```bash
//! # List every comic from the archive
//! comicvault refresh
//!
//! # Read one (fetched and cached on first view)
//! comicvault show 500
//!
//! # Mark it and find it again later
//! comicvault favorite 500
//! comicvault list --favorites
//! ```

/// Per-comic actions (favorite, explain, transcript, links, share).
pub mod actions;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// the fetchers and the repository.
pub mod app;

/// Command-line interface using clap.
///
/// - `refresh` - List new comics from the archive
/// - `list` - Browse, search and page listed comics
/// - `show <id>` - View a comic and record it in the history
/// - `favorite`, `note` - Edit user state
/// - `history`, `explain`, `action`
pub mod cli;

/// Configuration loaded from `~/.config/comicvault/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`ListedComic`](domain::ListedComic): archive metadata plus user state
/// - [`CachedComic`](domain::CachedComic): fetched comic content
/// - [`HistoryEntry`](domain::HistoryEntry): one recorded view
pub mod domain;

/// Remote clients.
///
/// - [`ComicFetcher`](fetcher::ComicFetcher), [`ArchiveFetcher`](fetcher::ArchiveFetcher),
///   [`ExplanationFetcher`](fetcher::ExplanationFetcher): async traits
/// - [`HttpClient`](fetcher::HttpClient): shared reqwest client
pub mod fetcher;

/// Synchronization repository and the merged per-comic stream.
pub mod repository;

/// Bundled data such as the browser-only comic list.
pub mod resources;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;
