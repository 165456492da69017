use serde::Serialize;
use std::sync::Arc;

use crate::intake::SessionState;

/// Published on every session state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionActivity {
    /// True while a matched group is held and leaving would abandon it.
    pub active: bool,
    pub state: SessionState,
    pub tracking_number: Option<String>,
}

/// Shell-side subscriber, e.g. a navigation guard that warns before leaving an open session.
pub trait SessionObserver: Send + Sync {
    fn on_session_activity(&self, activity: &SessionActivity);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionActivity) + Send + Sync,
{
    fn on_session_activity(&self, activity: &SessionActivity) {
        self(activity)
    }
}

/// Observers registered on one engine.
#[derive(Clone, Default)]
pub struct SessionObservers {
    observers: Vec<Arc<dyn SessionObserver>>,
}

impl SessionObservers {
    pub fn register(&mut self, observer: Arc<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn publish(&self, activity: &SessionActivity) {
        for observer in &self.observers {
            observer.on_session_activity(activity);
        }
    }
}

impl std::fmt::Debug for SessionObservers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionObservers")
            .field("count", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn closures_receive_published_activity() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut observers = SessionObservers::default();
        observers.register(Arc::new(move |activity: &SessionActivity| {
            sink.lock().unwrap().push(activity.active);
        }));

        observers.publish(&SessionActivity {
            active: true,
            state: SessionState::AwaitingLpn,
            tracking_number: Some("TRK1".into()),
        });
        observers.publish(&SessionActivity {
            active: false,
            state: SessionState::Idle,
            tracking_number: None,
        });

        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }
}
