pub mod classic;
pub mod mahjong;
pub mod red_dragon;

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::plugin::MahjongVariant;

/// Registry of available rule variants.
pub struct VariantRegistry {
    variants: HashMap<String, Arc<dyn MahjongVariant>>,
}

impl VariantRegistry {
    pub fn new() -> Self {
        Self {
            variants: HashMap::new(),
        }
    }

    /// Registry with every built-in variant.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(classic::ClassicVariant));
        registry.register(Arc::new(red_dragon::RedDragonVariant));
        registry
    }

    pub fn register(&mut self, variant: Arc<dyn MahjongVariant>) {
        let id = variant.game_id().to_string();
        self.variants.insert(id, variant);
    }

    pub fn get(&self, game_id: &str) -> Option<Arc<dyn MahjongVariant>> {
        self.variants.get(game_id).cloned()
    }

    pub fn list_game_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.variants.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
