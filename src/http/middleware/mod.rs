//! Request middleware.

pub mod authenticate;

pub use authenticate::authenticate_middleware;
