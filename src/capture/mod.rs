// Background acquisition — one thread per camera, latest-frame slots.

pub mod bank;
pub mod slot;
pub mod source;
