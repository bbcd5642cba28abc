pub mod fans;
pub mod plugin;

pub use plugin::ClassicVariant;
