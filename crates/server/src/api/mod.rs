pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod routes;
pub mod stream;
pub mod tokens;
pub mod videos;

pub use routes::create_router;
