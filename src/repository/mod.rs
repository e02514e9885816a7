//! Synchronization repository: reactive reads over the local cache plus the
//! mutations the viewer performs, with remote fetching on cache misses.

mod subscription;

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};

use crate::app::{ComicError, Result};
use crate::domain::{CachedComic, ComicQuery, HistoryEntry, HistoryRecord, ListedComic};
use crate::fetcher::{ArchiveFetcher, ComicFetcher, ExplanationFetcher};
use crate::store::{observe, Store, Table};

pub use subscription::ComicSubscription;

pub struct ComicRepository<S> {
    store: Arc<S>,
    comics: Arc<dyn ComicFetcher + Send + Sync>,
    archive: Arc<dyn ArchiveFetcher + Send + Sync>,
    explanations: Arc<dyn ExplanationFetcher + Send + Sync>,
}

impl<S> ComicRepository<S>
where
    S: Store + Send + Sync + 'static,
{
    pub fn new(
        store: Arc<S>,
        comics: Arc<dyn ComicFetcher + Send + Sync>,
        archive: Arc<dyn ArchiveFetcher + Send + Sync>,
        explanations: Arc<dyn ExplanationFetcher + Send + Sync>,
    ) -> Self {
        Self {
            store,
            comics,
            archive,
            explanations,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // Streams

    pub fn all_comics(&self) -> BoxStream<'static, Result<Vec<ListedComic>>> {
        self.search_comics(ComicQuery::default())
    }

    pub fn favorite_comics(&self) -> BoxStream<'static, Result<Vec<ListedComic>>> {
        self.search_comics(ComicQuery::favorites())
    }

    pub fn search_comics(&self, query: ComicQuery) -> BoxStream<'static, Result<Vec<ListedComic>>> {
        observe(self.store.clone(), &[Table::ListedComics], move |s: &S| {
            s.search_listed_comics(&query)
        })
    }

    /// Total matches for `query`, ignoring its page.
    pub fn count_comics(&self, query: ComicQuery) -> BoxStream<'static, Result<i64>> {
        observe(self.store.clone(), &[Table::ListedComics], move |s: &S| {
            s.count_listed_comics(&query)
        })
    }

    pub fn listed_comic(&self, id: i64) -> BoxStream<'static, Result<Option<ListedComic>>> {
        observe(self.store.clone(), &[Table::ListedComics], move |s: &S| {
            s.get_listed_comic(id)
        })
    }

    pub fn cached_comic(&self, id: i64) -> BoxStream<'static, Result<Option<CachedComic>>> {
        observe(self.store.clone(), &[Table::CachedComics], move |s: &S| {
            s.get_cached_comic(id)
        })
    }

    pub fn history_entries(&self) -> BoxStream<'static, Result<Vec<HistoryRecord>>> {
        self.history_page(None, 0)
    }

    pub fn history_page(
        &self,
        limit: Option<u32>,
        offset: u32,
    ) -> BoxStream<'static, Result<Vec<HistoryRecord>>> {
        observe(
            self.store.clone(),
            &[Table::History, Table::ListedComics],
            move |s: &S| s.get_history_records(limit, offset),
        )
    }

    pub fn history_for_comic(&self, comic_id: i64) -> BoxStream<'static, Result<Vec<HistoryEntry>>> {
        observe(self.store.clone(), &[Table::History], move |s: &S| {
            s.get_history_for_comic(comic_id)
        })
    }

    pub fn count_history_entries(&self) -> BoxStream<'static, Result<i64>> {
        observe(self.store.clone(), &[Table::History], |s: &S| {
            s.count_history_entries()
        })
    }

    /// Merged, continuously updated view of one comic, fetching it from the
    /// remote when it is not cached yet.
    pub fn get_comic_from_id(&self, id: i64) -> ComicSubscription {
        ComicSubscription::spawn(id, self.store.clone(), self.comics.clone())
    }

    // Mutations

    pub fn add_history_entry(&self, comic_id: i64) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        self.store.add_history_entry(comic_id, now)?;
        Ok(())
    }

    /// Read-modify-write of the listing row. Concurrent callers on the same
    /// id race; the last write wins.
    pub fn set_favorite_comic(&self, comic_id: i64, favorite: bool) -> Result<ListedComic> {
        self.update_listed_comic(comic_id, |comic| comic.favorite = favorite)
    }

    pub fn set_comic_note(&self, comic_id: i64, note: impl Into<String>) -> Result<ListedComic> {
        let note = note.into();
        self.update_listed_comic(comic_id, move |comic| comic.note = note)
    }

    fn update_listed_comic(
        &self,
        comic_id: i64,
        change: impl FnOnce(&mut ListedComic),
    ) -> Result<ListedComic> {
        let mut comic = self
            .store
            .get_listed_comic(comic_id)?
            .ok_or(ComicError::ComicNotFound(comic_id))?;

        change(&mut comic);
        self.store.replace_listed_comic(&comic)?;
        Ok(comic)
    }

    pub fn delete_history(&self) -> Result<()> {
        self.store.clear_history()?;
        Ok(())
    }

    /// Pull the archive index and list every comic not known yet.
    ///
    /// `Ok(false)` when the remote could not be reached or listed nothing;
    /// a malformed archive is an error.
    pub async fn refresh_comics(&self) -> Result<bool> {
        let entries = match self.archive.fetch_archive().await {
            Ok(entries) => entries,
            Err(e) if e.is_transport() => {
                tracing::warn!("Archive refresh failed: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if entries.is_empty() {
            tracing::warn!("Archive refresh returned no comics");
            return Ok(false);
        }

        let comics: Vec<ListedComic> = entries.into_iter().map(ListedComic::from).collect();
        let inserted = self.store.insert_listed_comics(&comics)?;
        tracing::info!("Archive lists {} comics, {} new", comics.len(), inserted);

        Ok(true)
    }

    /// Explanation page for a comic, fetched fresh on every call.
    pub async fn get_comic_explanation(&self, comic_id: i64) -> Result<Option<String>> {
        let pair = {
            let mut subscription = self.get_comic_from_id(comic_id);
            match subscription.next().await {
                Some(pair) => pair?,
                None => return Ok(None),
            }
        };

        self.explanations
            .fetch_explanation(&pair.listed.explanation_page())
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{ArchiveEntry, ComicPair};
    use crate::fetcher::ComicDocument;
    use crate::store::SqliteStore;

    #[derive(Clone, Copy, PartialEq)]
    enum Failure {
        None,
        Transport,
        Malformed,
    }

    fn transport_error() -> ComicError {
        serde_json::from_str::<ComicDocument>("<html>")
            .unwrap_err()
            .into()
    }

    struct FakeRemote {
        comics: Mutex<HashMap<i64, ComicDocument>>,
        comic_failure: Mutex<Failure>,
        comic_requests: AtomicUsize,
        comic_delay: Mutex<Duration>,
        completed_fetches: AtomicUsize,
        archive: Mutex<Vec<ArchiveEntry>>,
        archive_failure: Mutex<Failure>,
        explanations: Mutex<HashMap<String, String>>,
        explanation_requests: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        fn new() -> Self {
            Self {
                comics: Mutex::new(HashMap::new()),
                comic_failure: Mutex::new(Failure::None),
                comic_requests: AtomicUsize::new(0),
                comic_delay: Mutex::new(Duration::ZERO),
                completed_fetches: AtomicUsize::new(0),
                archive: Mutex::new(Vec::new()),
                archive_failure: Mutex::new(Failure::None),
                explanations: Mutex::new(HashMap::new()),
                explanation_requests: Mutex::new(Vec::new()),
            }
        }

        fn with_comic(self, document: ComicDocument) -> Self {
            self.comics.lock().unwrap().insert(document.num, document);
            self
        }

        fn requests(&self) -> usize {
            self.comic_requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ComicFetcher for FakeRemote {
        async fn fetch_comic(&self, id: i64) -> Result<Option<ComicDocument>> {
            self.comic_requests.fetch_add(1, Ordering::SeqCst);
            let delay = *self.comic_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.completed_fetches.fetch_add(1, Ordering::SeqCst);
            if *self.comic_failure.lock().unwrap() != Failure::None {
                return Err(transport_error());
            }
            Ok(self.comics.lock().unwrap().get(&id).cloned())
        }
    }

    #[async_trait]
    impl ArchiveFetcher for FakeRemote {
        async fn fetch_archive(&self) -> Result<Vec<ArchiveEntry>> {
            match *self.archive_failure.lock().unwrap() {
                Failure::Transport => Err(transport_error()),
                Failure::Malformed => Err(ComicError::ArchiveParse("invalid comic id".into())),
                Failure::None => Ok(self.archive.lock().unwrap().clone()),
            }
        }
    }

    #[async_trait]
    impl ExplanationFetcher for FakeRemote {
        async fn fetch_explanation(&self, page: &str) -> Result<Option<String>> {
            self.explanation_requests.lock().unwrap().push(page.to_string());
            Ok(self.explanations.lock().unwrap().get(page).cloned())
        }
    }

    fn document(num: i64, safe_title: &str) -> ComicDocument {
        ComicDocument {
            num,
            safe_title: safe_title.into(),
            title: safe_title.into(),
            year: "2008".into(),
            month: "12".into(),
            day: "3".into(),
            alt: "hover".into(),
            img: format!("http://x/{}.png", num),
            ..Default::default()
        }
    }

    fn archive_entry(id: i64, date: &str, title: &str) -> ArchiveEntry {
        ArchiveEntry {
            id,
            date: date.into(),
            title: title.into(),
        }
    }

    fn setup(remote: FakeRemote) -> (ComicRepository<SqliteStore>, Arc<SqliteStore>, Arc<FakeRemote>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let remote = Arc::new(remote);
        let repository = ComicRepository::new(
            store.clone(),
            remote.clone(),
            remote.clone(),
            remote.clone(),
        );
        (repository, store, remote)
    }

    async fn next_item<T, St>(stream: &mut St) -> Result<T>
    where
        St: futures::Stream<Item = Result<T>> + Unpin,
    {
        tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .expect("stream did not emit")
            .expect("stream ended")
    }

    #[tokio::test]
    async fn test_get_comic_from_id_fetches_on_miss() {
        let (repository, store, remote) = setup(FakeRemote::new().with_comic(document(500, "A")));

        let mut subscription = repository.get_comic_from_id(500);
        let pair = next_item(&mut subscription).await.unwrap();

        assert_eq!(
            pair,
            ComicPair {
                cached: CachedComic {
                    id: 500,
                    mouseover: "hover".into(),
                    img_url: "http://x/500.png".into(),
                    transcript: None,
                    dynamic_html: None,
                    news_content: None,
                    link: None,
                },
                listed: ListedComic::new(500, "A", "2008-12-3"),
            }
        );
        assert_eq!(remote.requests(), 1);
        assert_eq!(store.get_cached_comic(500).unwrap(), Some(pair.cached.clone()));
        assert_eq!(store.get_listed_comic(500).unwrap(), Some(pair.listed));
    }

    #[tokio::test]
    async fn test_get_comic_from_id_serves_cache() {
        let (repository, store, remote) = setup(FakeRemote::new());
        let doc = document(500, "A");
        store.upsert_cached_comics(&[doc.to_cached_comic()]).unwrap();
        store.insert_listed_comics(&[doc.to_listed_comic()]).unwrap();

        let mut subscription = repository.get_comic_from_id(500);
        let pair = next_item(&mut subscription).await.unwrap();

        assert_eq!(pair.id(), 500);
        assert_eq!(pair.cached.id, 500);
        assert_eq!(remote.requests(), 0);
    }

    #[tokio::test]
    async fn test_favorite_toggle_reemits_without_refetch() {
        let (repository, _store, remote) = setup(FakeRemote::new().with_comic(document(500, "A")));

        let mut subscription = repository.get_comic_from_id(500);
        let first = next_item(&mut subscription).await.unwrap();
        assert!(!first.listed.favorite);

        repository.set_favorite_comic(500, true).unwrap();
        let second = next_item(&mut subscription).await.unwrap();

        assert!(second.listed.favorite);
        assert_eq!(second.cached, first.cached);
        assert_eq!(remote.requests(), 1);
    }

    #[tokio::test]
    async fn test_fetch_on_miss_preserves_user_state() {
        let (repository, store, remote) = setup(FakeRemote::new().with_comic(document(500, "A")));
        let mut existing = ListedComic::new(500, "A", "2008-12-3");
        existing.favorite = true;
        existing.note = "keep me".into();
        store.insert_listed_comics(&[existing.clone()]).unwrap();

        let mut subscription = repository.get_comic_from_id(500);
        let pair = next_item(&mut subscription).await.unwrap();

        assert_eq!(pair.listed, existing);
        assert_eq!(store.get_listed_comic(500).unwrap(), Some(existing));
        assert_eq!(remote.requests(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_reports_error_without_pair() {
        let remote = FakeRemote::new().with_comic(document(500, "A"));
        *remote.comic_failure.lock().unwrap() = Failure::Transport;
        let (repository, store, remote) = setup(remote);

        let mut subscription = repository.get_comic_from_id(500);
        let err = next_item(&mut subscription).await.unwrap_err();
        assert!(err.is_transport());

        let nothing = tokio::time::timeout(Duration::from_millis(200), subscription.next()).await;
        assert!(nothing.is_err(), "no pair should follow a failed fetch");
        assert_eq!(remote.requests(), 1);
        assert!(store.get_cached_comic(500).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_remote_comic_is_not_found() {
        let (repository, _store, _remote) = setup(FakeRemote::new());

        let mut subscription = repository.get_comic_from_id(404);
        let err = next_item(&mut subscription).await.unwrap_err();
        assert!(matches!(err, ComicError::ComicNotFound(404)));
    }

    #[tokio::test]
    async fn test_refresh_comics_preserves_user_state() {
        let remote = FakeRemote::new();
        *remote.archive.lock().unwrap() = vec![
            archive_entry(501, "2008-11-5", "Mission"),
            archive_entry(500, "2008-11-3", "Election"),
        ];
        let (repository, store, _remote) = setup(remote);

        assert!(repository.refresh_comics().await.unwrap());
        repository.set_favorite_comic(500, true).unwrap();
        repository.set_comic_note(500, "first vote").unwrap();

        assert!(repository.refresh_comics().await.unwrap());

        let comic = store.get_listed_comic(500).unwrap().unwrap();
        assert!(comic.favorite);
        assert_eq!(comic.note, "first vote");
        assert_eq!(store.count_listed_comics(&ComicQuery::default()).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_refresh_transport_failure_returns_false() {
        let remote = FakeRemote::new();
        *remote.archive.lock().unwrap() = vec![archive_entry(500, "2008-11-3", "Election")];
        *remote.archive_failure.lock().unwrap() = Failure::Transport;
        let (repository, store, _remote) = setup(remote);

        assert!(!repository.refresh_comics().await.unwrap());
        assert_eq!(store.count_listed_comics(&ComicQuery::default()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_refresh_empty_archive_returns_false() {
        let (repository, _store, _remote) = setup(FakeRemote::new());
        assert!(!repository.refresh_comics().await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_malformed_archive_is_error() {
        let remote = FakeRemote::new();
        *remote.archive_failure.lock().unwrap() = Failure::Malformed;
        let (repository, _store, _remote) = setup(remote);

        let err = repository.refresh_comics().await.unwrap_err();
        assert!(matches!(err, ComicError::ArchiveParse(_)));
    }

    #[test]
    fn test_set_favorite_round_trip() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        let mut comic = ListedComic::new(500, "Election", "2008-11-3");
        comic.note = "note".into();
        store.insert_listed_comics(&[comic.clone()]).unwrap();

        assert!(repository.set_favorite_comic(500, true).unwrap().favorite);
        repository.set_favorite_comic(500, false).unwrap();

        assert_eq!(store.get_listed_comic(500).unwrap(), Some(comic));
    }

    #[test]
    fn test_set_favorite_unknown_comic_is_not_found() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        let mut rx = store.subscribe();

        let err = repository.set_favorite_comic(999, true).unwrap_err();

        assert!(matches!(err, ComicError::ComicNotFound(999)));
        assert!(store.get_listed_comic(999).unwrap().is_none());
        assert!(rx.try_recv().is_err(), "no write should happen");
    }

    #[tokio::test]
    async fn test_history_is_append_only() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        store
            .insert_listed_comics(&[ListedComic::new(500, "Election", "2008-11-3")])
            .unwrap();

        for _ in 0..3 {
            repository.add_history_entry(500).unwrap();
        }

        let mut entries = repository.history_for_comic(500);
        assert_eq!(next_item(&mut entries).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_history() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        store
            .insert_listed_comics(&[
                ListedComic::new(500, "Election", "2008-11-3"),
                ListedComic::new(501, "Mission", "2008-11-5"),
            ])
            .unwrap();
        repository.add_history_entry(500).unwrap();
        repository.add_history_entry(501).unwrap();

        let mut count = repository.count_history_entries();
        assert_eq!(next_item(&mut count).await.unwrap(), 2);

        repository.delete_history().unwrap();

        assert_eq!(next_item(&mut count).await.unwrap(), 0);
        let mut records = repository.history_entries();
        assert!(next_item(&mut records).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_history_entries_follow_new_views() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        store
            .insert_listed_comics(&[ListedComic::new(500, "Election", "2008-11-3")])
            .unwrap();

        let mut records = repository.history_entries();
        assert!(next_item(&mut records).await.unwrap().is_empty());

        repository.add_history_entry(500).unwrap();
        let records = next_item(&mut records).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].comic.title, "Election");
    }

    #[tokio::test]
    async fn test_favorite_comics_stream() {
        let (repository, store, _remote) = setup(FakeRemote::new());
        store
            .insert_listed_comics(&[
                ListedComic::new(500, "Election", "2008-11-3"),
                ListedComic::new(501, "Mission", "2008-11-5"),
            ])
            .unwrap();

        let mut all = repository.all_comics();
        assert_eq!(next_item(&mut all).await.unwrap().len(), 2);

        let mut favorites = repository.favorite_comics();
        assert!(next_item(&mut favorites).await.unwrap().is_empty());

        repository.set_favorite_comic(501, true).unwrap();
        let favorites = next_item(&mut favorites).await.unwrap();
        assert_eq!(favorites.len(), 1);
        assert_eq!(favorites[0].id, 501);
    }

    #[tokio::test]
    async fn test_single_row_streams() {
        let (repository, store, _remote) = setup(FakeRemote::new());

        let mut listed = repository.listed_comic(500);
        let mut cached = repository.cached_comic(500);
        assert_eq!(next_item(&mut listed).await.unwrap(), None);
        assert_eq!(next_item(&mut cached).await.unwrap(), None);

        let doc = document(500, "A");
        store.upsert_cached_comics(&[doc.to_cached_comic()]).unwrap();
        assert_eq!(next_item(&mut cached).await.unwrap(), Some(doc.to_cached_comic()));

        store.insert_listed_comics(&[doc.to_listed_comic()]).unwrap();
        assert_eq!(next_item(&mut listed).await.unwrap(), Some(doc.to_listed_comic()));
    }

    #[tokio::test]
    async fn test_get_comic_explanation() {
        let remote = FakeRemote::new().with_comic(document(500, "Election Night"));
        remote
            .explanations
            .lock()
            .unwrap()
            .insert("500:_Election_Night".into(), "<p>Explained.</p>".into());
        let (repository, _store, remote) = setup(remote);

        let explanation = repository.get_comic_explanation(500).await.unwrap();

        assert_eq!(explanation.as_deref(), Some("<p>Explained.</p>"));
        assert_eq!(
            *remote.explanation_requests.lock().unwrap(),
            vec!["500:_Election_Night".to_string()]
        );
    }

    #[tokio::test]
    async fn test_get_comic_explanation_is_never_cached() {
        let (repository, _store, remote) = setup(FakeRemote::new().with_comic(document(500, "A")));

        assert_eq!(repository.get_comic_explanation(500).await.unwrap(), None);
        assert_eq!(repository.get_comic_explanation(500).await.unwrap(), None);
        assert_eq!(remote.explanation_requests.lock().unwrap().len(), 2);
        // The comic itself was fetched once and then served from the cache.
        assert_eq!(remote.requests(), 1);
    }

    #[test]
    fn test_dropping_subscription_abandons_fetch() {
        tokio_test::block_on(async {
            let remote = FakeRemote::new().with_comic(document(500, "A"));
            *remote.comic_delay.lock().unwrap() = Duration::from_millis(300);
            let (repository, store, remote) = setup(remote);

            let subscription = repository.get_comic_from_id(500);
            assert_eq!(subscription.id(), 500);
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert_eq!(remote.requests(), 1);

            drop(subscription);
            tokio::time::sleep(Duration::from_millis(500)).await;

            assert_eq!(remote.completed_fetches.load(Ordering::SeqCst), 0);
            assert!(store.get_cached_comic(500).unwrap().is_none());
            assert!(store.get_listed_comic(500).unwrap().is_none());
        });
    }

    #[tokio::test]
    async fn test_cached_without_listing_is_repaired() {
        let (repository, store, remote) = setup(FakeRemote::new().with_comic(document(500, "A")));
        store
            .upsert_cached_comics(&[document(500, "A").to_cached_comic()])
            .unwrap();

        let mut subscription = repository.get_comic_from_id(500);
        let pair = next_item(&mut subscription).await.unwrap();

        assert_eq!(pair.listed, ListedComic::new(500, "A", "2008-12-3"));
        assert_eq!(remote.requests(), 1);
        assert!(store.get_listed_comic(500).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fetch_on_miss_lists_before_caching() {
        let (repository, store, _remote) = setup(FakeRemote::new().with_comic(document(500, "A")));
        let mut rx = store.subscribe();

        let mut subscription = repository.get_comic_from_id(500);
        next_item(&mut subscription).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), Table::ListedComics);
        assert_eq!(rx.recv().await.unwrap(), Table::CachedComics);
    }
}
