use super::{CamwatchOrchestrator, Component, ComponentState};
use std::collections::BTreeMap;
use tracing::{debug, warn};

impl CamwatchOrchestrator {
    pub async fn set_component_state(&self, component: Component, state: ComponentState) {
        if let ComponentState::Failed { reason } = &state {
            warn!("Component {} failed: {}", component, reason);
        } else {
            debug!("Component {} is now {:?}", component, state);
        }
        self.component_states.lock().await.insert(component, state);
    }

    pub async fn get_component_state(&self, component: Component) -> Option<ComponentState> {
        self.component_states.lock().await.get(&component).cloned()
    }

    /// Lifecycle state of every registered component
    pub async fn component_states(&self) -> BTreeMap<Component, ComponentState> {
        self.component_states.lock().await.clone()
    }

    /// Whether any component has failed
    pub async fn has_failed_component(&self) -> bool {
        self.component_states
            .lock()
            .await
            .values()
            .any(ComponentState::is_failed)
    }
}
