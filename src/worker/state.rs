//! Worker lifecycle state machine.
//!
//! The lifecycle (`installing → waiting → activating → activated`) is a
//! pure transition function over explicit events: each event maps to the
//! next state plus a list of cache side effects for the worker task to
//! perform. Keeping transitions pure makes the lifecycle testable without
//! a browser-like host environment.

use serde::{Deserialize, Serialize};

/// Lifecycle states of the offline cache worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Pre-populating critical routes into the static cache.
    Installing,
    /// Installed, waiting to be told to take control.
    Waiting,
    /// Taking control; stale cache generations are being deleted.
    Activating,
    /// In control, intercepting requests.
    Activated,
}

/// Control messages posted from the main thread to the worker context.
///
/// These are the only mutation entry points available to the rest of the
/// application; nothing outside the worker's own fetch interception
/// writes to its caches directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Activate the waiting version immediately.
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
    /// Pre-populate the runtime cache with the given URLs.
    #[serde(rename = "CACHE_URLS")]
    CacheUrls { urls: Vec<String> },
    /// Delete every named cache (user-triggered hard reset).
    #[serde(rename = "CLEAR_CACHE")]
    ClearCache,
}

/// Events driving the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// Static precache finished (successfully or not — install failures
    /// are tolerated, the worker still becomes functional).
    InstallComplete,
    /// Take control of interception.
    Activate,
    /// Stale-generation cleanup finished.
    ActivateComplete,
    /// A control message arrived from the main thread.
    Message(ControlMessage),
}

/// Cache side effects a transition asks the worker task to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Fetch the configured critical routes into the static cache.
    PrecacheStatic,
    /// Delete every cache generation not matching the current version.
    /// The sole garbage-collection mechanism for old generations.
    DeleteStaleGenerations,
    /// Fetch the given URLs into the runtime cache.
    PrecacheRuntime(Vec<String>),
    /// Delete every named cache.
    DeleteAllCaches,
}

/// Map an event in a state to the next state and its side effects.
///
/// Events that make no sense in the current state are ignored (same
/// state, no actions) rather than treated as errors.
pub fn transition(state: WorkerState, event: &WorkerEvent) -> (WorkerState, Vec<CacheAction>) {
    use WorkerEvent::*;
    use WorkerState::*;

    match (state, event) {
        (Installing, InstallComplete) => (Waiting, vec![]),
        (Waiting, Activate) | (Waiting, Message(ControlMessage::SkipWaiting)) => {
            (Activating, vec![CacheAction::DeleteStaleGenerations])
        }
        (Activating, ActivateComplete) => (Activated, vec![]),
        (state, Message(ControlMessage::CacheUrls { urls })) => {
            (state, vec![CacheAction::PrecacheRuntime(urls.clone())])
        }
        (state, Message(ControlMessage::ClearCache)) => {
            (state, vec![CacheAction::DeleteAllCaches])
        }
        (state, _) => (state, vec![]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_then_activate_lifecycle() {
        let (state, actions) = transition(WorkerState::Installing, &WorkerEvent::InstallComplete);
        assert_eq!(state, WorkerState::Waiting);
        assert!(actions.is_empty());

        let (state, actions) = transition(state, &WorkerEvent::Activate);
        assert_eq!(state, WorkerState::Activating);
        assert_eq!(actions, vec![CacheAction::DeleteStaleGenerations]);

        let (state, actions) = transition(state, &WorkerEvent::ActivateComplete);
        assert_eq!(state, WorkerState::Activated);
        assert!(actions.is_empty());
    }

    #[test]
    fn skip_waiting_short_circuits_the_wait() {
        let (state, actions) = transition(
            WorkerState::Waiting,
            &WorkerEvent::Message(ControlMessage::SkipWaiting),
        );
        assert_eq!(state, WorkerState::Activating);
        assert_eq!(actions, vec![CacheAction::DeleteStaleGenerations]);
    }

    #[test]
    fn skip_waiting_is_a_noop_once_activated() {
        let (state, actions) = transition(
            WorkerState::Activated,
            &WorkerEvent::Message(ControlMessage::SkipWaiting),
        );
        assert_eq!(state, WorkerState::Activated);
        assert!(actions.is_empty());
    }

    #[test]
    fn cache_urls_works_in_any_state() {
        let urls = vec!["/viewer".to_string()];
        let (state, actions) = transition(
            WorkerState::Activated,
            &WorkerEvent::Message(ControlMessage::CacheUrls { urls: urls.clone() }),
        );
        assert_eq!(state, WorkerState::Activated);
        assert_eq!(actions, vec![CacheAction::PrecacheRuntime(urls)]);
    }

    #[test]
    fn clear_cache_deletes_everything() {
        let (_, actions) = transition(
            WorkerState::Activated,
            &WorkerEvent::Message(ControlMessage::ClearCache),
        );
        assert_eq!(actions, vec![CacheAction::DeleteAllCaches]);
    }

    #[test]
    fn control_messages_round_trip_the_wire_shape() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"type":"CACHE_URLS","urls":["/a","/b"]}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::CacheUrls {
                urls: vec!["/a".into(), "/b".into()]
            }
        );

        let encoded = serde_json::to_string(&ControlMessage::SkipWaiting).unwrap();
        assert_eq!(encoded, r#"{"type":"SKIP_WAITING"}"#);
    }
}
