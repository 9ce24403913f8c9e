//! Republishes registry changes as bus events.

use std::sync::Arc;

use serde::Serialize;

use hubcore_domain::event::{Event, types};
use hubcore_domain::id::ListenerId;
use hubcore_domain::identifiable::Identifiable;

use crate::event_bus::EventBus;

use super::{ProviderChangeListener, Registry};

/// Posts `hubcore/<kind>/<uid>/added|updated|removed` for every visible
/// change of a registry.
///
/// Payloads are the element as JSON; updates carry `[new, old]`.
pub struct RegistryEventForwarder {
    kind: &'static str,
    bus: Arc<EventBus>,
}

impl RegistryEventForwarder {
    #[must_use]
    pub fn new(kind: &'static str, bus: Arc<EventBus>) -> Self {
        Self { kind, bus }
    }

    /// Forward every change of `registry` to `bus`.
    pub fn attach<E>(registry: &Registry<E>, bus: Arc<EventBus>) -> ListenerId
    where
        E: Identifiable + Clone + Serialize + Send + Sync + 'static,
    {
        registry.add_listener(Arc::new(Self::new(registry.kind(), bus)))
    }

    fn post<E, P>(&self, element: &E, event_type: &str, payload: &P)
    where
        E: Identifiable,
        P: Serialize + ?Sized,
    {
        let uid = element.uid().to_string();
        match serde_json::to_string(payload) {
            Ok(payload) => {
                self.bus
                    .post(&Event::element_changed(self.kind, &uid, event_type, payload));
            }
            Err(err) => {
                tracing::warn!(kind = self.kind, %uid, error = %err, "couldn't serialize registry change");
            }
        }
    }
}

impl<E> ProviderChangeListener<E> for RegistryEventForwarder
where
    E: Identifiable + Serialize,
{
    fn added(&self, element: &E) {
        self.post(element, types::ELEMENT_ADDED, element);
    }

    fn updated(&self, old: &E, new: &E) {
        self.post(new, types::ELEMENT_UPDATED, &[new, old]);
    }

    fn removed(&self, element: &E) {
        self.post(element, types::ELEMENT_REMOVED, element);
    }
}
