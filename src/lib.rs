pub mod backoff;
pub mod config;
pub mod data_plane;
pub mod memnet;
pub mod message;
pub mod node;
pub mod state;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod test_utils;
