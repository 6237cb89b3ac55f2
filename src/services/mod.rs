pub mod handlers;
pub mod queue;
pub mod retry;
pub mod signature;
pub mod timestamp;
pub mod webhook_service;
pub mod worker;
