/*
[INPUT]:  Public API exports for tribeca-dashboard crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod app;
pub mod config;
pub mod console;
pub mod order;
pub mod pair;
pub mod theme;
pub mod window;

// Re-export main types for convenience
pub use app::App;
pub use config::DashboardConfig;
pub use console::ConsoleCommand;
pub use order::DisplayOrder;
pub use pair::{DisplayPair, PairView};
pub use theme::{Theme, ThemeState};
pub use window::{MainWindow, WindowView, bytes_to_size};
