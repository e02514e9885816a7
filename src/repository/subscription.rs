//! Merged, self-filling view of a single comic.
//!
//! Two producer tasks observe the listed and cached rows for one id and feed
//! a merge task over a channel. The merge task keeps the last known value of
//! each half and emits a [`ComicPair`] whenever both are known and the pair
//! changed. When the cached half is absent, or the content is cached without
//! a listing row, it fetches the comic, persists it and feeds the result back in.

use std::pin::Pin;
use std::slice;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::app::{ComicError, Result};
use crate::domain::{CachedComic, ComicPair, ListedComic};
use crate::fetcher::ComicFetcher;
use crate::store::{observe, Store, Table};

const CHANNEL_CAPACITY: usize = 16;

enum Half {
    Listed(Option<ListedComic>),
    Cached(Option<CachedComic>),
    Failed(ComicError),
}

#[derive(Default)]
struct LatestPair {
    listed: Option<ListedComic>,
    cached: Option<CachedComic>,
}

impl LatestPair {
    fn complete(&self) -> Option<ComicPair> {
        Some(ComicPair {
            cached: self.cached.clone()?,
            listed: self.listed.clone()?,
        })
    }
}

/// Stream of merged comic views for one id.
///
/// Yields `Ok(pair)` each time either half changes once both are known, and
/// `Err(..)` when a store query or the fetch-on-miss fails. Dropping the
/// subscription stops both observers and abandons any in-flight fetch.
pub struct ComicSubscription {
    id: i64,
    rx: mpsc::Receiver<Result<ComicPair>>,
    _tasks: JoinSet<()>,
}

impl ComicSubscription {
    pub(crate) fn spawn<S>(id: i64, store: Arc<S>, fetcher: Arc<dyn ComicFetcher + Send + Sync>) -> Self
    where
        S: Store + Send + Sync + 'static,
    {
        let (half_tx, half_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let mut tasks = JoinSet::new();

        let listed = observe(store.clone(), &[Table::ListedComics], move |s: &S| {
            s.get_listed_comic(id)
        });
        let cached = observe(store.clone(), &[Table::CachedComics], move |s: &S| {
            s.get_cached_comic(id)
        });

        tasks.spawn(forward(listed, half_tx.clone(), Half::Listed));
        tasks.spawn(forward(cached, half_tx, Half::Cached));
        tasks.spawn(merge(id, half_rx, tx, store, fetcher));

        Self {
            id,
            rx,
            _tasks: tasks,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl Stream for ComicSubscription {
    type Item = Result<ComicPair>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

async fn forward<T>(
    mut stream: BoxStream<'static, Result<T>>,
    tx: mpsc::Sender<Half>,
    wrap: fn(T) -> Half,
) where
    T: Send + 'static,
{
    while let Some(item) = stream.next().await {
        let half = match item {
            Ok(value) => wrap(value),
            Err(e) => Half::Failed(e),
        };
        if tx.send(half).await.is_err() {
            break;
        }
    }
}

async fn merge<S>(
    id: i64,
    mut halves: mpsc::Receiver<Half>,
    tx: mpsc::Sender<Result<ComicPair>>,
    store: Arc<S>,
    fetcher: Arc<dyn ComicFetcher + Send + Sync>,
) where
    S: Store + Send + Sync + 'static,
{
    let mut latest = LatestPair::default();
    let mut last_emitted: Option<ComicPair> = None;
    let mut in_flight: Option<BoxFuture<'static, Result<Option<ComicPair>>>> = None;
    let mut listed_missing = false;
    let mut attempted = false;

    loop {
        tokio::select! {
            half = halves.recv() => {
                let Some(half) = half else { break };
                match half {
                    Half::Listed(listed) => {
                        listed_missing = listed.is_none();
                        latest.listed = listed;
                    }
                    Half::Cached(Some(cached)) => latest.cached = Some(cached),
                    Half::Cached(None) => {
                        latest.cached = None;
                        if in_flight.is_none() {
                            tracing::debug!("Comic {} is not cached, fetching", id);
                            attempted = true;
                            in_flight = Some(fetch_on_miss(id, store.clone(), fetcher.clone()).boxed());
                        }
                    }
                    Half::Failed(e) => {
                        tracing::error!("Store query for comic {} failed: {}", id, e);
                        if tx.send(Err(e)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            fetched = poll_in_flight(&mut in_flight), if in_flight.is_some() => {
                in_flight = None;
                let failure = match fetched {
                    Ok(Some(pair)) => {
                        latest.cached = Some(pair.cached);
                        latest.listed = Some(pair.listed);
                        listed_missing = false;
                        None
                    }
                    Ok(None) => Some(ComicError::ComicNotFound(id)),
                    Err(e) => Some(e),
                };
                if let Some(e) = failure {
                    tracing::warn!("Fetching comic {} failed: {}", id, e);
                    if tx.send(Err(e)).await.is_err() {
                        break;
                    }
                }
            }
        }

        // Content left behind by an interrupted fetch never gets a listing
        // row on its own.
        if listed_missing && latest.cached.is_some() && in_flight.is_none() && !attempted {
            tracing::debug!("Comic {} is cached but not listed, fetching", id);
            attempted = true;
            in_flight = Some(fetch_on_miss(id, store.clone(), fetcher.clone()).boxed());
        }

        if let Some(pair) = latest.complete() {
            if last_emitted.as_ref() != Some(&pair) {
                last_emitted = Some(pair.clone());
                if tx.send(Ok(pair)).await.is_err() {
                    break;
                }
            }
        }
    }
}

async fn poll_in_flight(
    in_flight: &mut Option<BoxFuture<'static, Result<Option<ComicPair>>>>,
) -> Result<Option<ComicPair>> {
    match in_flight {
        Some(fetch) => fetch.await,
        None => std::future::pending().await,
    }
}

/// Fetch one comic and persist both halves: the listing row is only inserted
/// when missing so favorite and note survive, then the content is replaced.
/// Listing goes first so an interrupted fetch leaves a comic that still reads
/// as not cached.
async fn fetch_on_miss<S>(
    id: i64,
    store: Arc<S>,
    fetcher: Arc<dyn ComicFetcher + Send + Sync>,
) -> Result<Option<ComicPair>>
where
    S: Store + Send + Sync + 'static,
{
    let Some(document) = fetcher.fetch_comic(id).await? else {
        return Ok(None);
    };
    if document.num != id {
        tracing::warn!("Requested comic {} but received {}", id, document.num);
        return Ok(None);
    }

    let cached = document.to_cached_comic();
    let fetched_listing = document.to_listed_comic();
    store.insert_listed_comics(slice::from_ref(&fetched_listing))?;
    store.upsert_cached_comics(slice::from_ref(&cached))?;

    let listed = store.get_listed_comic(id)?.unwrap_or(fetched_listing);
    Ok(Some(ComicPair { cached, listed }))
}
