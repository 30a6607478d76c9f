pub mod activity;
pub mod config;
pub mod contact;
pub mod lease;
