pub mod badge;
mod controller;
pub mod scanner;
pub mod watcher;

pub use controller::MarkerController;
