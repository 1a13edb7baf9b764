use std::{sync::Arc, time::Duration};

use menu::MenuStateMachine;
use storage::SessionStore;

use crate::session_gate::SessionGate;

pub(crate) struct AppState {
    pub(crate) menu: MenuStateMachine,
    pub(crate) sessions: Arc<dyn SessionStore>,
    pub(crate) session_ttl: Duration,
    /// Budget for one `/ussd` exchange, store round-trips included.
    pub(crate) request_timeout: Duration,
    pub(crate) gate: SessionGate,
}
