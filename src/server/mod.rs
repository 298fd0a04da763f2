pub(crate) mod backend;
pub(crate) mod chancomms;
pub(crate) mod controlchan;
pub(crate) mod datachan;
pub(crate) mod ftpserver;
pub(crate) mod portpool;
pub(crate) mod session;
pub(crate) mod shutdown;
pub(crate) mod tls;
