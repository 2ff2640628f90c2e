use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::response::Response;

/// The terminal state an asynchronous request reached during a drain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SettledState {
    /// The transport answered and the response was normalized.
    Resolved,
    /// The transport failed and the fallback supplied the response.
    Recovered,
    /// The request failed and nothing recovered it.
    Failed,
}

/// Outcome of one atomic key after a drain.
#[derive(Debug)]
pub enum Settled {
    Resolved(Response),
    Recovered(Response),
    Failed(Error),
}

impl Settled {
    pub fn state(&self) -> SettledState {
        match self {
            Settled::Resolved(_) => SettledState::Resolved,
            Settled::Recovered(_) => SettledState::Recovered,
            Settled::Failed(_) => SettledState::Failed,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == SettledState::Resolved
    }

    pub fn is_recovered(&self) -> bool {
        self.state() == SettledState::Recovered
    }

    pub fn is_failed(&self) -> bool {
        self.state() == SettledState::Failed
    }

    /// The response, whether it came from the transport or a fallback.
    pub fn response(&self) -> Option<&Response> {
        match self {
            Settled::Resolved(response) | Settled::Recovered(response) => Some(response),
            Settled::Failed(_) => None,
        }
    }

    pub fn into_result(self) -> Result<Response, Error> {
        match self {
            Settled::Resolved(response) | Settled::Recovered(response) => Ok(response),
            Settled::Failed(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    #[test]
    fn settled_resolved() {
        let settled = Settled::Resolved(Response::with_status(200, "ok"));
        assert!(settled.is_resolved());
        assert!(!settled.is_recovered());
        assert!(!settled.is_failed());
        assert_eq!(settled.response().map(Response::status), Some(200));
    }

    #[test]
    fn settled_recovered() {
        let settled = Settled::Recovered(Response::with_status(203, "cached"));
        assert!(settled.is_recovered());
        assert_eq!(settled.state(), SettledState::Recovered);
        assert_eq!(settled.into_result().unwrap().text(), "cached");
    }

    #[test]
    fn settled_failed() {
        let settled = Settled::Failed(Error::Transport(TransportError::Connect {
            message: "connection refused".to_string(),
        }));
        assert!(settled.is_failed());
        assert!(settled.response().is_none());
        assert!(matches!(
            settled.into_result(),
            Err(Error::Transport(TransportError::Connect { .. }))
        ));
    }

    #[test]
    fn settled_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(SettledState::Recovered).unwrap(),
            serde_json::json!("recovered")
        );
    }
}
