mod app_router;
pub mod inbox;
pub mod inventory;
pub mod monitoring;

pub use app_router::AppRouter;
