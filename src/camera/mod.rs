// Camera domain — device backends, identities, discovery.

pub mod backend;
pub mod discovery;
pub mod dummy;
pub mod error;
#[cfg(feature = "native")]
pub mod native;
pub mod types;
