pub mod api;
pub mod app;
pub mod cli;
