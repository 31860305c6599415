//! Infrastructure layer - storage, crypto and delivery implementations

pub mod auth;
pub mod logging;
pub mod notification;
pub mod storage;
pub mod user;
