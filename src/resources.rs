//! Bundled data loaded once per process and shared by reference.

use std::sync::OnceLock;

use serde::Deserialize;

use crate::app::Result;

const EXCEPTIONS_JSON: &str = include_str!("../resources/exceptions.json");

/// Comics whose interactive content only works on the original site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExceptionList {
    pub comics: Vec<ComicException>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComicException {
    pub id: i64,
    pub reason: String,
}

impl ExceptionList {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn get(&self, id: i64) -> Option<&ComicException> {
        self.comics.iter().find(|comic| comic.id == id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.get(id).is_some()
    }
}

#[derive(Debug, Default)]
pub struct ResourceCache {
    exceptions: OnceLock<ExceptionList>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exceptions(&self) -> &ExceptionList {
        self.exceptions.get_or_init(|| {
            ExceptionList::parse(EXCEPTIONS_JSON).unwrap_or_else(|e| {
                tracing::error!("Bundled exception list is invalid: {}", e);
                ExceptionList::default()
            })
        })
    }
}
