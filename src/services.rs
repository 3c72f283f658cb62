pub mod auth;
pub use auth::AuthService;
pub mod batch_status;
pub mod customer_filter;
pub mod customer_service;
pub use customer_service::CustomerService;
pub mod overdue;
