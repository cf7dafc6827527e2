//! Keeps the single editing widget in step with the active tab
//!
//! The controller is the only owner of widget models. Whenever the active tab
//! changes it flushes pending edits of the old tab, disposes every model that
//! does not belong to the new tab and binds the widget to the new one, so at
//! most one model is alive after each transition.
//!
//! Edits are recorded into the store after a quiet period (see
//! [`debounce::Debouncer`]). A tab is dirty when the widget content differs
//! from the baseline captured when the tab was bound.

pub mod debounce;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::file_ref::FileRef;
use crate::keymap::{self, Command, KeyChord};
use crate::notify::{ConfirmPrompt, Confirmer, Notifications};
use crate::store::{DocumentStore, OpenOutcome, StoreError};
use crate::widget::{ChangeListener, EditorWidget, ModelId, SubscriptionId};
use debounce::Debouncer;

/// Whether a key press was consumed by the workbench
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The caller must suppress the default action
    Handled(Command),
    Ignored,
}

/// Result of asking to leave the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    Stayed,
}

/// Widget state for the tab it currently shows
struct BoundDocument {
    id: FileRef,
    model: ModelId,
    subscription: SubscriptionId,
    /// Content the live session compares against
    baseline: Arc<Mutex<String>>,
}

enum Binding {
    Unbound,
    Bound(BoundDocument),
}

fn lock(baseline: &Mutex<String>) -> MutexGuard<'_, String> {
    baseline.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Apply a settled edit to the store
fn record_change(store: &DocumentStore, id: &FileRef, baseline: &Mutex<String>, content: &str) {
    if !store.is_open(id) {
        tracing::debug!("Dropping edit for closed tab {}", id);
        return;
    }

    let differs = *lock(baseline) != content;
    let result = if differs {
        store
            .set_draft_content(id, content)
            .and_then(|()| store.set_dirty(id, true))
    } else {
        store.set_dirty(id, false)
    };
    if let Err(e) = result {
        tracing::debug!("Edit for {} not recorded: {}", id, e);
    }
}

pub struct LifecycleController<W: EditorWidget> {
    store: DocumentStore,
    widget: W,
    notifications: Notifications,
    debouncer: Arc<Debouncer<FileRef>>,
    binding: Binding,
    save_error: Option<String>,
}

impl<W: EditorWidget> LifecycleController<W> {
    pub fn new(
        store: DocumentStore,
        widget: W,
        notifications: Notifications,
        debounce: Duration,
    ) -> Self {
        Self {
            store,
            widget,
            notifications,
            debouncer: Arc::new(Debouncer::new(debounce)),
            binding: Binding::Unbound,
            save_error: None,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    /// Tab the widget is bound to
    pub fn bound_tab(&self) -> Option<&FileRef> {
        match &self.binding {
            Binding::Bound(bound) => Some(&bound.id),
            Binding::Unbound => None,
        }
    }

    /// Error of the last failed save, shown until the next successful save
    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    pub fn dismiss_save_error(&mut self) {
        self.save_error = None;
    }

    /// Number of widget models currently alive
    pub fn live_model_count(&self) -> usize {
        self.widget.models().len()
    }

    /// Whether an edit of `id` is waiting for the quiet period to end
    pub fn has_pending_edit(&self, id: &FileRef) -> bool {
        self.debouncer.is_pending(id)
    }

    /// Open a tab and show it
    pub async fn open(&mut self, id: &FileRef) -> Result<OpenOutcome, StoreError> {
        let result = self.store.open_file(id).await;
        if let Err(e) = &result {
            self.notifications.error(e.to_string());
        }
        self.sync_binding();
        result
    }

    pub fn activate(&mut self, id: &FileRef) -> Result<(), StoreError> {
        self.store.set_active_tab(id)?;
        self.sync_binding();
        Ok(())
    }

    pub fn close(&mut self, id: &FileRef) -> bool {
        let closed = self.store.close_tab(id);
        self.sync_binding();
        self.debouncer.cancel(id);
        closed
    }

    pub fn close_all(&mut self) {
        self.store.close_all();
        self.sync_binding();
        self.debouncer.cancel_all();
    }

    /// Bring the widget binding in line with the store's active tab
    pub fn sync_binding(&mut self) {
        let active = self.store.active_tab();
        if let (Binding::Bound(bound), Some(id)) = (&self.binding, &active)
            && bound.id == *id
            && !self.widget.is_disposed(bound.model)
        {
            return;
        }

        self.release();
        match active {
            Some(id) => self.bind(id),
            None => {
                self.dispose_except(None);
                self.widget.unbind();
                tracing::debug!("Widget unbound");
            }
        }
    }

    /// Flush and detach the current binding, leaving models alive
    fn release(&mut self) {
        let Binding::Bound(bound) = std::mem::replace(&mut self.binding, Binding::Unbound) else {
            return;
        };

        if self.debouncer.cancel(&bound.id)
            && let Some(content) = self.widget.value(bound.model)
        {
            record_change(&self.store, &bound.id, &bound.baseline, &content);
        }
        self.widget.unsubscribe(bound.subscription);

        if self.store.is_open(&bound.id) {
            let position = self.widget.scroll_position();
            if let Err(e) = self.store.set_scroll_position(&bound.id, position) {
                tracing::debug!("Scroll position for {} not kept: {}", bound.id, e);
            }
        }
    }

    fn dispose_except(&mut self, keep: Option<ModelId>) {
        for model in self.widget.models() {
            if Some(model) != keep {
                self.widget.dispose_model(model);
            }
        }
    }

    fn bind(&mut self, id: FileRef) {
        let (Some(content), Some(original)) =
            (self.store.get_content(&id), self.store.original_content(&id))
        else {
            self.dispose_except(None);
            self.widget.unbind();
            return;
        };

        let uri = id.to_string();
        let existing = self
            .widget
            .get_model(&uri)
            .filter(|model| !self.widget.is_disposed(*model));
        self.dispose_except(existing);

        let model = match existing {
            Some(model) => {
                self.widget.set_value(model, &content);
                model
            }
            None => self.widget.create_model(&content, id.language(), &uri),
        };

        self.widget.bind(model);
        self.widget
            .set_scroll_position(self.store.scroll_position(&id).unwrap_or_default());

        let baseline = Arc::new(Mutex::new(original));
        let subscription = self
            .widget
            .subscribe(model, self.change_listener(&id, &baseline));

        tracing::debug!("Widget bound to {}", id);
        self.binding = Binding::Bound(BoundDocument {
            id,
            model,
            subscription,
            baseline,
        });
    }

    fn change_listener(&self, id: &FileRef, baseline: &Arc<Mutex<String>>) -> ChangeListener {
        let store = self.store.clone();
        let debouncer = Arc::clone(&self.debouncer);
        let baseline = Arc::clone(baseline);
        let id = id.clone();

        Arc::new(move |content: &str| {
            let store = store.clone();
            let baseline = Arc::clone(&baseline);
            let target = id.clone();
            let content = content.to_string();
            debouncer.schedule(id.clone(), move || {
                record_change(&store, &target, &baseline, &content);
            });
        })
    }

    /// Save the active tab with the widget's current content.
    ///
    /// A failure is kept in [`save_error`](Self::save_error) and the draft is
    /// preserved. Nothing happens when no tab is active.
    pub async fn save_active(&mut self) -> Result<(), StoreError> {
        let Binding::Bound(bound) = &self.binding else {
            return Ok(());
        };
        let id = bound.id.clone();
        let model = bound.model;
        let baseline = Arc::clone(&bound.baseline);

        let Some(content) = self
            .widget
            .value(model)
            .or_else(|| self.store.get_content(&id))
        else {
            return Err(StoreError::NotOpen(id));
        };
        self.debouncer.cancel(&id);

        match self.store.save(&id, &content).await {
            Ok(()) => {
                *lock(&baseline) = content.clone();
                self.save_error = None;
                self.notifications
                    .success(format!("Saved {}", id.display_name()));

                // Edits made while the request was in flight stay unsaved
                if let Some(live) = self.widget.value(model)
                    && live != content
                {
                    self.debouncer.cancel(&id);
                    record_change(&self.store, &id, &baseline, &live);
                }
                Ok(())
            }
            Err(e @ StoreError::SaveInFlight(_)) => {
                tracing::debug!("{}", e);
                Err(e)
            }
            Err(e) => {
                self.save_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Handle a key press. Save shortcuts trigger a save of the active tab.
    pub async fn handle_key(&mut self, chord: &KeyChord) -> KeyOutcome {
        match keymap::resolve(chord) {
            Some(Command::Save) => {
                if let Err(e) = self.save_active().await {
                    tracing::debug!("Shortcut save failed: {}", e);
                }
                KeyOutcome::Handled(Command::Save)
            }
            Some(command) => KeyOutcome::Handled(command),
            None => KeyOutcome::Ignored,
        }
    }

    /// Discard the active tab's draft and show the server's content.
    ///
    /// Falls back to the last fetched content when the server cannot be
    /// reached. Returns `false` when nothing was reloaded.
    pub async fn reload_active(&mut self, confirmer: &dyn Confirmer) -> bool {
        let Binding::Bound(bound) = &self.binding else {
            return false;
        };
        let id = bound.id.clone();
        let model = bound.model;
        let baseline = Arc::clone(&bound.baseline);

        let prompt = ConfirmPrompt::Reload {
            file: id.display_name(),
        };
        if !confirmer.confirm(&prompt) {
            return false;
        }
        self.debouncer.cancel(&id);

        let original = match self.store.gateway().read_file(&id).await {
            Ok(content) => content,
            Err(e) => {
                self.notifications
                    .error(format!("Failed to reload {}: {}", id.display_name(), e));
                match self.store.original_content(&id) {
                    Some(content) => content,
                    None => return false,
                }
            }
        };

        if let Err(e) = self.store.reset_document(&id, original.clone()) {
            tracing::debug!("Reload of {} dropped: {}", id, e);
            return false;
        }
        *lock(&baseline) = original.clone();
        self.widget.set_value(model, &original);
        self.debouncer.cancel(&id);
        self.save_error = None;
        tracing::info!("Reloaded {}", id);
        true
    }

    /// Close everything unless unsaved tabs exist and the user declines
    pub fn request_leave(&mut self, confirmer: &dyn Confirmer) -> LeaveOutcome {
        if let Binding::Bound(bound) = &self.binding
            && self.debouncer.cancel(&bound.id)
            && let Some(content) = self.widget.value(bound.model)
        {
            record_change(&self.store, &bound.id, &bound.baseline, &content);
        }

        let dirty = self.store.dirty_tabs();
        if !dirty.is_empty() {
            let prompt = ConfirmPrompt::LeaveWithUnsaved {
                dirty: dirty.iter().map(FileRef::display_name).collect(),
            };
            if !confirmer.confirm(&prompt) {
                return LeaveOutcome::Stayed;
            }
        }

        self.close_all();
        LeaveOutcome::Left
    }
}

impl<W: EditorWidget> Drop for LifecycleController<W> {
    fn drop(&mut self) {
        self.debouncer.cancel_all();
    }
}
