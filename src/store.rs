//! Open tabs and their documents
//!
//! The store owns every open tab, the content last fetched from the server,
//! the unsaved draft overlay and the dirty and saving flags. It is a cheap
//! cloneable handle; clones share state.
//!
//! Remote calls are made without holding the state lock. A fetch whose tab was
//! closed while it was in flight is discarded when it completes. A save
//! outlives its tab: it keeps blocking further saves of the same id until it
//! completes, but its result only lands on the document it started from.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::file_ref::FileRef;
use crate::gateway::{GatewayError, RemoteGateway, routes};
use crate::widget::ScrollPosition;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} is not open")]
    NotOpen(FileRef),

    #[error("a save for {0} is already in progress")]
    SaveInFlight(FileRef),

    #[error("failed to open {file}: {source}")]
    Fetch {
        file: FileRef,
        #[source]
        source: GatewayError,
    },

    #[error("failed to save {file}: {source}")]
    Save {
        file: FileRef,
        #[source]
        source: GatewayError,
    },

    #[error("cannot save {file}: {reason}")]
    InvalidTarget { file: FileRef, reason: String },
}

/// One open tab
#[derive(Debug, Clone, PartialEq)]
pub struct OpenDocument {
    pub id: FileRef,
    /// Content as last fetched from or saved to the server
    pub original_content: String,
    /// Unsaved edits, if any
    pub draft_content: Option<String>,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub scroll_position: Option<ScrollPosition>,
}

impl OpenDocument {
    fn new(id: FileRef, original_content: String) -> Self {
        Self {
            id,
            original_content,
            draft_content: None,
            is_dirty: false,
            is_saving: false,
            scroll_position: None,
        }
    }

    /// Draft if present, otherwise the original content
    pub fn content(&self) -> &str {
        self.draft_content
            .as_deref()
            .unwrap_or(&self.original_content)
    }
}

/// Result of [`DocumentStore::open_file`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// Content was fetched and a new tab created
    Opened,
    /// The tab was already open and is now active
    Activated,
    /// A fetch for this id is already in flight
    AlreadyPending,
    /// The tab was closed before the fetch completed
    Discarded,
}

#[derive(Default)]
struct StoreState {
    tabs: Vec<FileRef>,
    documents: HashMap<FileRef, OpenDocument>,
    active: Option<FileRef>,
    /// Fetches in flight, keyed by id, with the ticket that started them
    pending: HashMap<FileRef, u64>,
    /// Ticket of the fetch that created each open document
    generations: HashMap<FileRef, u64>,
    /// Ids with a save in flight, whether or not their tab is still open
    saving: HashSet<FileRef>,
    next_ticket: u64,
}

impl StoreState {
    fn document_mut(&mut self, id: &FileRef) -> Result<&mut OpenDocument, StoreError> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| StoreError::NotOpen(id.clone()))
    }
}

/// Shared handle to the open tabs
#[derive(Clone)]
pub struct DocumentStore {
    state: Arc<Mutex<StoreState>>,
    gateway: Arc<dyn RemoteGateway>,
}

impl DocumentStore {
    pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            gateway,
        }
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn gateway(&self) -> Arc<dyn RemoteGateway> {
        Arc::clone(&self.gateway)
    }

    /// Open a tab for `id`, fetching its content if it is not open yet.
    ///
    /// An open tab is simply activated. On fetch failure nothing changes.
    pub async fn open_file(&self, id: &FileRef) -> Result<OpenOutcome, StoreError> {
        let ticket = {
            let mut state = self.state();
            if state.documents.contains_key(id) {
                state.active = Some(id.clone());
                return Ok(OpenOutcome::Activated);
            }
            if state.pending.contains_key(id) {
                return Ok(OpenOutcome::AlreadyPending);
            }
            state.next_ticket += 1;
            let ticket = state.next_ticket;
            state.pending.insert(id.clone(), ticket);
            ticket
        };

        tracing::debug!("Fetching {}", id);
        let result = self.gateway.read_file(id).await;

        let mut state = self.state();
        if state.pending.get(id) != Some(&ticket) {
            tracing::debug!("Discarding late fetch for closed tab {}", id);
            return Ok(OpenOutcome::Discarded);
        }
        state.pending.remove(id);

        let content = result.map_err(|source| {
            tracing::warn!("Failed to fetch {}: {}", id, source);
            StoreError::Fetch {
                file: id.clone(),
                source,
            }
        })?;

        let mut doc = OpenDocument::new(id.clone(), content);
        doc.is_saving = state.saving.contains(id);
        state.tabs.push(id.clone());
        state.documents.insert(id.clone(), doc);
        state.generations.insert(id.clone(), ticket);
        state.active = Some(id.clone());
        tracing::info!("Opened {}", id);
        Ok(OpenOutcome::Opened)
    }

    /// Refetch the original content of an open tab.
    ///
    /// Draft and dirty state are left alone. Returns `false` when the tab was
    /// closed while the fetch was in flight.
    pub async fn refresh_file(&self, id: &FileRef) -> Result<bool, StoreError> {
        if !self.is_open(id) {
            return Err(StoreError::NotOpen(id.clone()));
        }

        let content = self
            .gateway
            .read_file(id)
            .await
            .map_err(|source| StoreError::Fetch {
                file: id.clone(),
                source,
            })?;

        let mut state = self.state();
        match state.documents.get_mut(id) {
            Some(doc) => {
                doc.original_content = content;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close a tab, dropping its draft. Also cancels a pending open.
    ///
    /// Returns `true` if anything was closed or cancelled.
    pub fn close_tab(&self, id: &FileRef) -> bool {
        let mut state = self.state();
        let cancelled = state.pending.remove(id).is_some();
        let closed = state.documents.remove(id).is_some();
        state.generations.remove(id);
        state.tabs.retain(|tab| tab != id);

        if state.active.as_ref() == Some(id) {
            state.active = state.tabs.last().cloned();
        }
        if closed {
            tracing::debug!("Closed {}", id);
        }
        closed || cancelled
    }

    pub fn close_all(&self) {
        let mut state = self.state();
        state.tabs.clear();
        state.documents.clear();
        state.generations.clear();
        state.pending.clear();
        state.active = None;
    }

    pub fn set_active_tab(&self, id: &FileRef) -> Result<(), StoreError> {
        let mut state = self.state();
        if !state.documents.contains_key(id) {
            return Err(StoreError::NotOpen(id.clone()));
        }
        state.active = Some(id.clone());
        Ok(())
    }

    /// Draft if present, otherwise the original content
    pub fn get_content(&self, id: &FileRef) -> Option<String> {
        self.state()
            .documents
            .get(id)
            .map(|doc| doc.content().to_string())
    }

    pub fn original_content(&self, id: &FileRef) -> Option<String> {
        self.state()
            .documents
            .get(id)
            .map(|doc| doc.original_content.clone())
    }

    pub fn set_draft_content(&self, id: &FileRef, content: &str) -> Result<(), StoreError> {
        self.state().document_mut(id)?.draft_content = Some(content.to_string());
        Ok(())
    }

    pub fn clear_draft(&self, id: &FileRef) -> Result<(), StoreError> {
        self.state().document_mut(id)?.draft_content = None;
        Ok(())
    }

    /// Drop the draft and replace the original content
    pub fn reset_document(&self, id: &FileRef, original: String) -> Result<(), StoreError> {
        let mut state = self.state();
        let doc = state.document_mut(id)?;
        doc.original_content = original;
        doc.draft_content = None;
        doc.is_dirty = false;
        Ok(())
    }

    pub fn set_dirty(&self, id: &FileRef, dirty: bool) -> Result<(), StoreError> {
        self.state().document_mut(id)?.is_dirty = dirty;
        Ok(())
    }

    pub fn is_dirty(&self, id: &FileRef) -> bool {
        self.state().documents.get(id).is_some_and(|d| d.is_dirty)
    }

    /// Dirty tabs in tab-strip order
    pub fn dirty_tabs(&self) -> Vec<FileRef> {
        let state = self.state();
        state
            .tabs
            .iter()
            .filter(|id| state.documents.get(*id).is_some_and(|d| d.is_dirty))
            .cloned()
            .collect()
    }

    pub fn has_dirty(&self) -> bool {
        self.state().documents.values().any(|d| d.is_dirty)
    }

    pub fn set_scroll_position(
        &self,
        id: &FileRef,
        position: ScrollPosition,
    ) -> Result<(), StoreError> {
        self.state().document_mut(id)?.scroll_position = Some(position);
        Ok(())
    }

    pub fn scroll_position(&self, id: &FileRef) -> Option<ScrollPosition> {
        self.state()
            .documents
            .get(id)
            .and_then(|d| d.scroll_position)
    }

    /// Persist `content` for `id`.
    ///
    /// Only one save per id may be in flight, even across closing and
    /// reopening its tab. On success the content becomes the new original and
    /// the draft and dirty flag are cleared. On failure the draft and dirty
    /// flag are kept. A result whose tab was closed in the meantime is not
    /// applied to the document.
    pub async fn save(&self, id: &FileRef, content: &str) -> Result<(), StoreError> {
        if let Err(e) = routes::write_path(id) {
            tracing::error!("Refusing to save {}: {}", id, e);
            return Err(StoreError::InvalidTarget {
                file: id.clone(),
                reason: e.to_string(),
            });
        }

        let generation = {
            let mut state = self.state();
            let generation = match state.generations.get(id) {
                Some(generation) => *generation,
                None => return Err(StoreError::NotOpen(id.clone())),
            };
            if !state.saving.insert(id.clone()) {
                return Err(StoreError::SaveInFlight(id.clone()));
            }
            state.document_mut(id)?.is_saving = true;
            generation
        };

        let result = self.gateway.write_file(id, content).await;

        let mut state = self.state();
        state.saving.remove(id);
        let same_document = state.generations.get(id) == Some(&generation);
        let Some(doc) = state.documents.get_mut(id) else {
            tracing::debug!("{} was closed while saving", id);
            return result.map_err(|source| StoreError::Save {
                file: id.clone(),
                source,
            });
        };
        doc.is_saving = false;
        if !same_document {
            tracing::debug!("{} was reopened while saving, keeping the new content", id);
            return result.map_err(|source| StoreError::Save {
                file: id.clone(),
                source,
            });
        }

        match result {
            Ok(()) => {
                doc.original_content = content.to_string();
                doc.draft_content = None;
                doc.is_dirty = false;
                tracing::info!("Saved {}", id);
                Ok(())
            }
            Err(source) => {
                tracing::warn!("Failed to save {}: {}", id, source);
                Err(StoreError::Save {
                    file: id.clone(),
                    source,
                })
            }
        }
    }

    pub fn tabs(&self) -> Vec<FileRef> {
        self.state().tabs.clone()
    }

    pub fn active_tab(&self) -> Option<FileRef> {
        self.state().active.clone()
    }

    pub fn document(&self, id: &FileRef) -> Option<OpenDocument> {
        self.state().documents.get(id).cloned()
    }

    pub fn is_open(&self, id: &FileRef) -> bool {
        self.state().documents.contains_key(id)
    }

    pub fn is_pending(&self, id: &FileRef) -> bool {
        self.state().pending.contains_key(id)
    }

    /// Whether a save for `id` is in flight, even if its tab was closed
    pub fn is_saving(&self, id: &FileRef) -> bool {
        self.state().saving.contains(id)
    }
}
