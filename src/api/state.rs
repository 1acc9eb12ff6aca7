//! API shared state

use std::sync::Arc;

use crate::actors::EvaluatorHandle;
use crate::alerts::AlertManager;
use crate::dispatcher::Dispatcher;
use crate::storage::AlertStore;

/// Shared state passed to all API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Store, for health and stats
    pub store: Arc<dyn AlertStore>,

    /// Thresholds, breach listing and acknowledgement
    pub alerts: AlertManager,

    /// Notification delivery and push subscriptions
    pub dispatcher: Dispatcher,

    /// Handle to the evaluator actor; `None` when it was not started
    pub evaluator: Option<EvaluatorHandle>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn AlertStore>,
        dispatcher: Dispatcher,
        evaluator: Option<EvaluatorHandle>,
    ) -> Self {
        Self {
            alerts: AlertManager::new(store.clone()),
            store,
            dispatcher,
            evaluator,
        }
    }
}
