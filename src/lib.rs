// Library exports for the binaries and tests
pub mod config;
pub mod constants;
pub mod debounce;
pub mod error;
pub mod listener;
pub mod logging;
pub mod paths;
pub mod server;
pub mod sound;
pub mod startup;
pub mod state;
