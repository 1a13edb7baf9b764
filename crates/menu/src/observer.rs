use gateway::BackendOperation;
use shared::{domain::MenuState, error::BackendError};
use tracing::{debug, error, info, warn};

/// Something worth reporting while a single input is handled. Reporting never
/// changes the reply.
#[derive(Debug, Clone, Copy)]
pub enum MenuEvent<'a> {
    Input {
        session_id: &'a str,
        state: MenuState,
        input: Option<&'a str>,
    },
    Transition {
        session_id: &'a str,
        from: MenuState,
        to: MenuState,
    },
    PositionSkipped {
        session_id: &'a str,
        position_id: &'a str,
        title: &'a str,
    },
    BackendFailure {
        session_id: &'a str,
        operation: BackendOperation,
        error: &'a BackendError,
    },
    Anomaly {
        session_id: &'a str,
        state: MenuState,
        detail: &'a str,
    },
}

pub trait MenuObserver: Send + Sync {
    fn record(&self, event: &MenuEvent<'_>);
}

/// Forwards menu events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MenuObserver for TracingObserver {
    fn record(&self, event: &MenuEvent<'_>) {
        match *event {
            MenuEvent::Input {
                session_id,
                state,
                input,
            } => {
                // Verification codes stay out of the logs.
                let input = match (state, input) {
                    (MenuState::VerifyCode, Some(_)) => Some("<redacted>"),
                    (_, input) => input,
                };
                debug!(%session_id, %state, ?input, "menu input");
            }
            MenuEvent::Transition {
                session_id,
                from,
                to,
            } => info!(%session_id, %from, %to, "menu transition"),
            MenuEvent::PositionSkipped {
                session_id,
                position_id,
                title,
            } => warn!(%session_id, %position_id, %title, "skipping position without candidates"),
            MenuEvent::BackendFailure {
                session_id,
                operation,
                error,
            } => warn!(%session_id, %operation, code = ?error.code, message = ?error.message, "backend call failed"),
            MenuEvent::Anomaly {
                session_id,
                state,
                detail,
            } => error!(%session_id, %state, %detail, "menu anomaly"),
        }
    }
}
