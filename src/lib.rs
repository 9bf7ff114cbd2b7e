// Library surface for the binary and for headless integration tests.
pub mod app_dirs;
pub mod audio;
pub mod autoplay;
pub mod backend;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod runtime;
pub mod scheduler;
pub mod step;
pub mod timing;
pub mod wordbook;
