pub mod agent;
pub mod ai;
pub mod api;
pub mod calendar;
pub mod cli;
pub mod core;
pub mod google;
pub mod openai;
pub mod time;
