pub mod error;
pub mod event_type;
pub mod id;
pub mod integration;
pub mod job;
pub mod payload;
pub mod ports;
pub mod priority;
pub mod records;
pub mod webhook_event;
