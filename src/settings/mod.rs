// Mesh config persistence — file model and store.

pub mod store;
pub mod types;
