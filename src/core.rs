pub mod battery;
pub mod cache;
pub mod config;
pub mod controller;
pub mod cycle;
pub mod deficit;
pub mod demand;
pub mod error;
pub mod forecast;
pub mod inverter;
pub mod scheduler;
pub mod solar;
pub mod source;
pub mod status;
pub mod window;
