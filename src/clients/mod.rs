pub mod circuit_breaker;
pub mod database;
pub mod gateway;
pub mod health;
pub mod rbmq;
pub mod redis;
pub mod status;
