use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Tells whether and how the server speaks FTPS.
///
/// The engine does not build TLS configurations itself; the embedder hands it
/// a ready [`rustls::ServerConfig`] (certificates, key, protocol versions,
/// client auth policy) and the engine only drives the `AUTH`/`PBSZ`/`PROT`
/// upgrade dance with it.
#[derive(Clone)]
pub enum FtpsConfig {
    /// FTPS is off; `AUTH TLS` answers 502.
    Off,
    /// FTPS is on with the given TLS configuration.
    On {
        /// The TLS configuration used for control and data channel upgrades.
        tls_config: Arc<rustls::ServerConfig>,
    },
}

impl FtpsConfig {
    pub(crate) fn acceptor(&self) -> Option<TlsAcceptor> {
        match self {
            FtpsConfig::Off => None,
            FtpsConfig::On { tls_config } => Some(TlsAcceptor::from(tls_config.clone())),
        }
    }

    pub(crate) fn is_on(&self) -> bool {
        matches!(self, FtpsConfig::On { .. })
    }
}

impl Debug for FtpsConfig {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            FtpsConfig::Off => write!(f, "FtpsConfig::Off"),
            FtpsConfig::On { .. } => write!(f, "FtpsConfig::On"),
        }
    }
}
