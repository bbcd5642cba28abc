pub mod plugin;

pub use plugin::RedDragonVariant;
