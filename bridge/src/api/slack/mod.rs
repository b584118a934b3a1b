pub mod handlers;

pub use handlers::handle_event;
