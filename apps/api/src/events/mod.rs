// Event log: interaction records written by the public site and read back
// per reporting window by the dashboard.

pub mod handlers;
pub mod reader;
pub mod recorder;
pub mod window;

pub use reader::EventLogReader;
pub use window::WindowPreset;
