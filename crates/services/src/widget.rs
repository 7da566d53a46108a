//! Contracts for the embedded widget's runtime.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::WidgetError;

/// Identifies one registered listener on a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// The widget's internal event bus.
pub trait EventDispatcher: Send + Sync {
    /// Register `sink` for `event_name`; every statement is forwarded in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `WidgetError` if the dispatcher cannot accept listeners yet.
    fn on(
        &self,
        event_name: &str,
        sink: UnboundedSender<Value>,
    ) -> Result<ListenerId, WidgetError>;

    /// Remove a listener registered with `on`.
    fn off(&self, listener: ListenerId);
}

/// The widget's integration object holding the learner's user-state slot.
pub trait UserStateSlot: Send + Sync {
    /// Current in-progress state, if the widget has any.
    ///
    /// # Errors
    ///
    /// Returns `WidgetError` if the state cannot be read.
    fn read_state(&self) -> Result<Option<Value>, WidgetError>;

    /// Overwrite the state the widget will read on start. `None` injects empty state.
    fn write_state(&self, state: Option<Value>);
}

/// Handle to one embedded widget instance, scoped to a single session.
///
/// Both parts must exist before the widget counts as ready.
pub trait WidgetRuntime: Send + Sync {
    /// # Errors
    ///
    /// Returns `WidgetError` when the widget document cannot be accessed yet.
    fn dispatcher(&self) -> Result<Option<Arc<dyn EventDispatcher>>, WidgetError>;

    /// # Errors
    ///
    /// Returns `WidgetError` when the widget document cannot be accessed yet.
    fn integration(&self) -> Result<Option<Arc<dyn UserStateSlot>>, WidgetError>;
}

/// Both halves of a ready widget.
#[derive(Clone)]
pub(crate) struct ReadyWidget {
    pub dispatcher: Arc<dyn EventDispatcher>,
    pub slot: Arc<dyn UserStateSlot>,
}

/// One readiness probe. Errors count as "not ready yet".
pub(crate) fn probe(widget: &dyn WidgetRuntime) -> Result<Option<ReadyWidget>, WidgetError> {
    let Some(dispatcher) = widget.dispatcher()? else {
        return Ok(None);
    };
    let Some(slot) = widget.integration()? else {
        return Ok(None);
    };
    Ok(Some(ReadyWidget { dispatcher, slot }))
}
