use std::io;

use thiserror::Error;

/// Erreurs remontées par les ports de transport (UDP multicast, TCP).
///
/// Un délai dépassé est toujours distinct d'une fin de flux : `Timeout` signifie
/// "rien n'est arrivé à temps", `Closed` signifie "le pair a fermé".
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("operation timed out")]
    Timeout,
    #[error("connection closed by peer")]
    Closed,
    #[error("not connected")]
    NotConnected,
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Io(err),
        }
    }
}

/// Erreurs de l'API publique du client IGD.
///
/// Aucune n'est fatale : elles sont destinées à la boucle d'ordonnancement de
/// l'appelant, qui rappellera `update` à son rythme.
#[derive(Error, Debug)]
pub enum IgdError {
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("No UPnP port mapping was registered")]
    EmptyConfig,
    #[error("Port mapping '{0}' could not be verified after {1} attempts")]
    VerificationFailed(String, u32),
}

impl IgdError {
    pub fn timeout(context: &str) -> Self {
        IgdError::Timeout(context.to_string())
    }

    pub fn network(context: &str) -> Self {
        IgdError::Network(context.to_string())
    }

    /// Replie une erreur de transport dans la taxonomie publique.
    pub fn from_transport(context: &str, err: TransportError) -> Self {
        match err {
            TransportError::Timeout => IgdError::Timeout(context.to_string()),
            other => IgdError::Network(format!("{}: {}", context, other)),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, IgdError::Timeout(_))
    }
}

pub type IgdResult<T> = Result<T, IgdError>;
