pub mod circuit_breaker;
pub mod gateway;
pub mod health;
pub mod log;
pub mod message;
pub mod retry;
pub mod status;
pub mod validation;
