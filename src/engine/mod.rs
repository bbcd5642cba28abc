pub mod errors;
pub mod models;
pub mod plugin;
pub mod rules;
pub mod timer;
pub mod arena;
pub mod bot_strategy;
