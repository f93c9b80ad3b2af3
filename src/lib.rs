#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod api;
pub mod app;
pub mod classification;
pub mod clients;
pub mod config;
pub mod observability;
pub mod pipeline;
pub mod queue;
pub mod schema;
pub mod store;
pub mod util;
