pub mod host;
pub mod rpc;

pub use host::KodiHost;
