//! Typed notification channel from the UI into the state store
//!
//! Selection events mutate the store; the remaining events are hook points
//! and are only logged here.

use crate::error::RelayClosed;
use crate::store::{SelectionContext, StateStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Layout change requested by the cluster view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub cluster_num: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    SelectModel(String),
    SelectState(String),
    SelectLayer(usize),
    ChangeLayout(Layout),
    EvaluateSentence(String),
    /// (row, column) coordinates of the selected units
    SelectUnit(Vec<(usize, usize)>),
    SelectWord(Vec<String>),
}

/// An event together with the view it originated from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(flatten)]
    pub event: Event,
    #[serde(rename = "compare", with = "compare_flag")]
    pub context: SelectionContext,
}

impl Notification {
    pub fn new(event: Event, context: SelectionContext) -> Self {
        Self { event, context }
    }

    pub fn primary(event: Event) -> Self {
        Self::new(event, SelectionContext::Primary)
    }

    pub fn comparison(event: Event) -> Self {
        Self::new(event, SelectionContext::Comparison)
    }
}

/// The wire format carries the context as a boolean `compare` flag
mod compare_flag {
    use crate::store::SelectionContext;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(context: &SelectionContext, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bool(*context == SelectionContext::Comparison)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SelectionContext, D::Error> {
        Ok(SelectionContext::from(bool::deserialize(d)?))
    }
}

/// Sending side, held by UI components
#[derive(Debug, Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<Notification>,
}

impl RelayHandle {
    pub async fn send(&self, notification: Notification) -> Result<(), RelayClosed> {
        self.tx.send(notification).await.map_err(|_| RelayClosed)
    }

    pub async fn select_model(
        &self,
        model: impl Into<String>,
        context: SelectionContext,
    ) -> Result<(), RelayClosed> {
        self.send(Notification::new(Event::SelectModel(model.into()), context))
            .await
    }

    pub async fn select_state(
        &self,
        state: impl Into<String>,
        context: SelectionContext,
    ) -> Result<(), RelayClosed> {
        self.send(Notification::new(Event::SelectState(state.into()), context))
            .await
    }

    pub async fn select_layer(
        &self,
        layer: usize,
        context: SelectionContext,
    ) -> Result<(), RelayClosed> {
        self.send(Notification::new(Event::SelectLayer(layer), context))
            .await
    }
}

/// Receiving side, applies notifications to the store in arrival order
pub struct NotificationRelay {
    store: Arc<StateStore>,
    rx: mpsc::Receiver<Notification>,
}

impl NotificationRelay {
    /// A `capacity` of zero is raised to one
    pub fn channel(store: Arc<StateStore>, capacity: usize) -> (RelayHandle, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (RelayHandle { tx }, Self { store, rx })
    }

    /// Process notifications until every handle is dropped
    pub async fn run(mut self) {
        tracing::debug!("Notification relay started");

        while let Some(notification) = self.rx.recv().await {
            Self::apply(&self.store, &notification);
        }

        tracing::debug!("All relay handles dropped, stopping notification relay");
    }

    /// Apply a single notification to the store
    pub fn apply(store: &StateStore, notification: &Notification) {
        let context = notification.context;

        match &notification.event {
            Event::SelectModel(model) => {
                tracing::debug!(model = %model, context = ?context, "Model selected");
                store.select_model(context, model.clone());
            }
            Event::SelectState(state) => {
                tracing::debug!(state = %state, context = ?context, "State selected");
                store.select_state(context, state.clone());
            }
            Event::SelectLayer(layer) => {
                tracing::debug!(layer = layer, context = ?context, "Layer selected");
                store.select_layer(context, *layer);
            }
            Event::ChangeLayout(layout) => {
                tracing::info!(cluster_num = layout.cluster_num, "Layout changed");
            }
            Event::EvaluateSentence(sentence) => {
                let selection = store.selection();
                tracing::info!(
                    model = ?selection.get(context).model,
                    sentence = %sentence,
                    "Evaluating model on sentence"
                );
            }
            Event::SelectUnit(units) => {
                tracing::info!(count = units.len(), "Units selected");
            }
            Event::SelectWord(words) => {
                tracing::info!(count = words.len(), words = ?words, "Words selected");
            }
        }
    }
}
