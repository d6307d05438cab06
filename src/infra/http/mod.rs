mod admin;
mod context;
mod detail;
mod middleware;
mod public;

pub use admin::{AdminState, build_admin_router};
pub use context::Storefront;
pub use detail::BlogDetailHandler;
pub use public::{HttpState, build_router};
