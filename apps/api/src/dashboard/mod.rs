// Admin dashboard: window-scoped snapshots, the overview landing page and
// the poller that keeps a live snapshot current.

pub mod compose;
pub mod handlers;
pub mod loader;
pub mod overview;
pub mod poller;

pub use loader::DashboardLoader;
pub use poller::DashboardPoller;
