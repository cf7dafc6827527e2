//! Editing widget capability
//!
//! The workspace drives exactly one editing surface. The surface owns backing
//! models (text, undo history, decorations) and is rebound to a different
//! model whenever the active tab changes. Only the lifecycle controller creates
//! and disposes models.
//!
//! [`MemoryWidget`] is a headless implementation used by the CLI and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Handle to a backing model owned by the widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(u64);

/// Handle to a content-change subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Viewport offset in pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollPosition {
    pub top: f64,
    pub left: f64,
}

impl ScrollPosition {
    pub fn new(top: f64, left: f64) -> Self {
        Self { top, left }
    }
}

/// Callback invoked with a model's full content after every change
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Operations the workspace needs from an editing widget
pub trait EditorWidget: Send {
    /// Create a model with the given content, language and uri
    fn create_model(&mut self, content: &str, language: &str, uri: &str) -> ModelId;

    /// Find a live model by uri
    fn get_model(&self, uri: &str) -> Option<ModelId>;

    fn is_disposed(&self, model: ModelId) -> bool;

    /// Dispose a model, dropping its history and subscriptions
    fn dispose_model(&mut self, model: ModelId);

    /// Show `model` in the widget
    fn bind(&mut self, model: ModelId);

    /// Detach the widget from any model
    fn unbind(&mut self);

    fn bound_model(&self) -> Option<ModelId>;

    fn subscribe(&mut self, model: ModelId, listener: ChangeListener) -> SubscriptionId;

    fn unsubscribe(&mut self, subscription: SubscriptionId);

    /// Current text of a live model
    fn value(&self, model: ModelId) -> Option<String>;

    /// Replace a model's text. Fires change listeners.
    fn set_value(&mut self, model: ModelId, content: &str);

    fn scroll_position(&self) -> ScrollPosition;

    fn set_scroll_position(&mut self, position: ScrollPosition);

    /// All live (not disposed) models
    fn models(&self) -> Vec<ModelId>;
}

struct MemoryModel {
    uri: String,
    language: String,
    value: String,
    history: Vec<String>,
}

#[derive(Default)]
struct MemoryWidgetState {
    next_id: u64,
    models: BTreeMap<ModelId, MemoryModel>,
    subscriptions: HashMap<SubscriptionId, (ModelId, ChangeListener)>,
    bound: Option<ModelId>,
    scroll: ScrollPosition,
    created: usize,
    disposed: usize,
}

/// Headless widget keeping models in memory
///
/// Clones share the same state, so a caller can keep a handle to simulate
/// typing while the controller owns another.
#[derive(Clone, Default)]
pub struct MemoryWidget {
    state: Arc<Mutex<MemoryWidgetState>>,
}

impl MemoryWidget {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryWidgetState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the bound model's text as if the user typed it
    pub fn type_text(&self, content: &str) {
        let Some(model) = self.bound_model() else {
            return;
        };
        self.apply(model, content.to_string(), true);
    }

    /// Undo the last change of the bound model
    pub fn undo(&self) {
        let mut state = self.state();
        let Some(model) = state.bound else {
            return;
        };
        let Some(previous) = state.models.get_mut(&model).and_then(|m| m.history.pop()) else {
            return;
        };
        drop(state);
        self.apply(model, previous, false);
    }

    /// Text currently shown, if a model is bound
    pub fn displayed(&self) -> Option<String> {
        let state = self.state();
        state
            .bound
            .and_then(|id| state.models.get(&id))
            .map(|m| m.value.clone())
    }

    pub fn bound_uri(&self) -> Option<String> {
        let state = self.state();
        state
            .bound
            .and_then(|id| state.models.get(&id))
            .map(|m| m.uri.clone())
    }

    pub fn language(&self, model: ModelId) -> Option<String> {
        self.state().models.get(&model).map(|m| m.language.clone())
    }

    /// Undo depth of a model
    pub fn history_len(&self, model: ModelId) -> usize {
        self.state()
            .models
            .get(&model)
            .map_or(0, |m| m.history.len())
    }

    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }

    /// Total models created and disposed over the widget's lifetime
    pub fn lifetime_counts(&self) -> (usize, usize) {
        let state = self.state();
        (state.created, state.disposed)
    }

    fn apply(&self, model: ModelId, content: String, record_history: bool) {
        let listeners: Vec<ChangeListener> = {
            let mut state = self.state();
            let Some(entry) = state.models.get_mut(&model) else {
                return;
            };
            if entry.value == content {
                return;
            }
            let previous = std::mem::replace(&mut entry.value, content.clone());
            if record_history {
                entry.history.push(previous);
            }
            state
                .subscriptions
                .values()
                .filter(|(target, _)| *target == model)
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };

        for listener in listeners {
            listener(&content);
        }
    }
}

impl EditorWidget for MemoryWidget {
    fn create_model(&mut self, content: &str, language: &str, uri: &str) -> ModelId {
        let mut state = self.state();
        state.next_id += 1;
        state.created += 1;
        let id = ModelId(state.next_id);
        state.models.insert(
            id,
            MemoryModel {
                uri: uri.to_string(),
                language: language.to_string(),
                value: content.to_string(),
                history: Vec::new(),
            },
        );
        id
    }

    fn get_model(&self, uri: &str) -> Option<ModelId> {
        self.state()
            .models
            .iter()
            .find(|(_, m)| m.uri == uri)
            .map(|(id, _)| *id)
    }

    fn is_disposed(&self, model: ModelId) -> bool {
        !self.state().models.contains_key(&model)
    }

    fn dispose_model(&mut self, model: ModelId) {
        let mut state = self.state();
        if state.models.remove(&model).is_none() {
            return;
        }
        state.disposed += 1;
        state.subscriptions.retain(|_, (target, _)| *target != model);
        if state.bound == Some(model) {
            state.bound = None;
        }
    }

    fn bind(&mut self, model: ModelId) {
        let mut state = self.state();
        if state.models.contains_key(&model) {
            state.bound = Some(model);
        }
    }

    fn unbind(&mut self) {
        self.state().bound = None;
    }

    fn bound_model(&self) -> Option<ModelId> {
        self.state().bound
    }

    fn subscribe(&mut self, model: ModelId, listener: ChangeListener) -> SubscriptionId {
        let mut state = self.state();
        state.next_id += 1;
        let id = SubscriptionId(state.next_id);
        state.subscriptions.insert(id, (model, listener));
        id
    }

    fn unsubscribe(&mut self, subscription: SubscriptionId) {
        self.state().subscriptions.remove(&subscription);
    }

    fn value(&self, model: ModelId) -> Option<String> {
        self.state().models.get(&model).map(|m| m.value.clone())
    }

    fn set_value(&mut self, model: ModelId, content: &str) {
        self.apply(model, content.to_string(), false);
        if let Some(entry) = self.state().models.get_mut(&model) {
            entry.history.clear();
        }
    }

    fn scroll_position(&self) -> ScrollPosition {
        self.state().scroll
    }

    fn set_scroll_position(&mut self, position: ScrollPosition) {
        self.state().scroll = position;
    }

    fn models(&self) -> Vec<ModelId> {
        self.state().models.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_create_bind_and_type() {
        let mut widget = MemoryWidget::new();
        let model = widget.create_model("a", "php", "core-Bootstrap");
        widget.bind(model);

        widget.type_text("ab");
        assert_eq!(widget.displayed().as_deref(), Some("ab"));
        assert_eq!(widget.history_len(model), 1);
        assert_eq!(widget.get_model("core-Bootstrap"), Some(model));
        assert_eq!(widget.language(model).as_deref(), Some("php"));
    }

    #[test]
    fn test_listeners_fire_on_change_only() {
        let mut widget = MemoryWidget::new();
        let model = widget.create_model("a", "php", "core-A");
        widget.bind(model);

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let subscription = widget.subscribe(
            model,
            Arc::new(move |_: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        widget.type_text("b");
        widget.type_text("b");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        widget.unsubscribe(subscription);
        widget.type_text("c");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_undo_restores_previous_value() {
        let mut widget = MemoryWidget::new();
        let model = widget.create_model("one", "php", "core-A");
        widget.bind(model);
        widget.type_text("two");
        widget.undo();
        assert_eq!(widget.value(model).as_deref(), Some("one"));
        assert_eq!(widget.history_len(model), 0);
    }

    #[test]
    fn test_dispose_drops_model_binding_and_subscriptions() {
        let mut widget = MemoryWidget::new();
        let model = widget.create_model("x", "html", "blade-login");
        widget.bind(model);
        widget.subscribe(model, Arc::new(|_: &str| {}));

        widget.dispose_model(model);
        assert!(widget.is_disposed(model));
        assert_eq!(widget.bound_model(), None);
        assert_eq!(widget.subscription_count(), 0);
        assert!(widget.models().is_empty());
        assert_eq!(widget.lifetime_counts(), (1, 1));
    }

    #[test]
    fn test_set_value_resets_history() {
        let mut widget = MemoryWidget::new();
        let model = widget.create_model("x", "php", "core-A");
        widget.bind(model);
        widget.type_text("y");
        widget.set_value(model, "z");
        assert_eq!(widget.value(model).as_deref(), Some("z"));
        assert_eq!(widget.history_len(model), 0);
    }
}
