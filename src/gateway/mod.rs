//! Employee gateway: composition root, HTTP surface and server

mod router;
mod server;
mod service;

pub use router::{ApiError, AppState, create_router};
pub use server::Server;
pub use service::{EmployeeGateway, FailurePolicy};
