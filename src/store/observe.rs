//! Reactive queries over a [`Store`].
//!
//! An observer runs its query once up front and again after every write to
//! one of the tables it depends on, emitting only when the result changed.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::app::Result;
use crate::store::{Store, Table};

struct Observer<S, T, F> {
    store: Arc<S>,
    tables: &'static [Table],
    rx: broadcast::Receiver<Table>,
    query: F,
    last: Option<T>,
    primed: bool,
}

/// Stream of `query` results, re-run whenever one of `tables` changes.
///
/// The stream ends once the store's invalidation channel closes.
pub fn observe<S, T, F>(store: Arc<S>, tables: &'static [Table], query: F) -> BoxStream<'static, Result<T>>
where
    S: Store + Send + Sync + 'static,
    T: Clone + PartialEq + Send + 'static,
    F: Fn(&S) -> Result<T> + Send + 'static,
{
    // Subscribe before the first query so no write can slip in between.
    let rx = store.subscribe();
    let observer = Observer {
        store,
        tables,
        rx,
        query,
        last: None,
        primed: false,
    };

    stream::unfold(observer, |mut observer| async move {
        loop {
            if observer.primed && !wait_for_change(&mut observer.rx, observer.tables).await {
                return None;
            }
            observer.primed = true;

            match (observer.query)(observer.store.as_ref()) {
                Ok(value) => {
                    if observer.last.as_ref() == Some(&value) {
                        continue;
                    }
                    observer.last = Some(value.clone());
                    return Some((Ok(value), observer));
                }
                Err(e) => return Some((Err(e), observer)),
            }
        }
    })
    .boxed()
}

async fn wait_for_change(rx: &mut broadcast::Receiver<Table>, tables: &[Table]) -> bool {
    loop {
        match rx.recv().await {
            Ok(table) if tables.contains(&table) => return true,
            Ok(_) => continue,
            // Missed messages may have touched our tables.
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Observer lagged by {} invalidations", skipped);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
