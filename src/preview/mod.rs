// Preview output — canvas encoding and the timed live-preview loop.

pub mod encode;
pub mod session;
