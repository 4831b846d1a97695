pub mod db;
pub mod pipeline;
pub mod server;
pub mod services;
pub mod web;
