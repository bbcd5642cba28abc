//! Per-title rule profiles (`PlayConf`) loaded from TOML.
//! Every field has a default so a profile only lists what it changes.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::errors::{EngineError, EngineResult};
use crate::games::mahjong::scoring::{ScoreType, SettleMode};
use crate::games::mahjong::tiles::{parse_tiles, Tile, TileSet};

/// Who deals the next round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankerPolicy {
    /// Winner deals next; the banker keeps the seat on a drawn round.
    Winner,
    /// Banker keeps the seat while winning, otherwise the seat after it deals.
    Rotate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayConf {
    /// Variant this profile applies to.
    pub variant: String,
    pub description: Option<String>,
    /// Concealed tiles dealt to each non-banker seat (13 or 16).
    pub hand_count: usize,
    pub tile_set: TileSet,
    /// Wildcard tiles in text notation, e.g. `"1d"`.
    pub wildcards: String,

    pub must_hu: bool,
    pub must_hu_if_only_wild: bool,
    /// Minimum multiplier before a win may be declared.
    pub min_multiple: i64,
    /// Multiplier cap, 0 for none.
    pub max_multiple: i64,
    pub only_zimo: bool,
    /// A declined win on a tile stays blocked until the seat's next turn.
    pub hu_pass: bool,
    /// A declined pong on a tile stays blocked until the seat's next turn.
    pub pon_pass: bool,
    pub no_pon_leaving_only_wild: bool,
    pub can_chow: bool,
    pub tian_ting: bool,
    pub seven_pairs: bool,
    pub thirteen_orphans: bool,

    pub score_type: ScoreType,
    pub settle_mode: SettleMode,
    /// Currency per multiplier point.
    pub score_base: i64,
    pub kon_scores: bool,
    pub an_kon_multiple: i64,
    pub bu_kon_multiple: i64,
    pub zhi_kon_multiple: i64,
    /// An upgrade kong right after the pong scores as an exposed kong.
    pub kon_after_pon_as_zhi: bool,
    /// A self-drawn win on a kong replacement pays only the seat that fed the kong.
    pub feeder_pays_kon_bloom: bool,
    /// On an exhausted wall, seats without a ready hand pay ready seats.
    pub cha_jiao: bool,
    /// Seats whose balance drops to zero or below stop playing.
    pub eliminate_broke: bool,
    pub banker_policy: BankerPolicy,
    /// Casual tables wait for every human seat to press ready.
    pub require_ready: bool,

    pub self_timeout_secs: u64,
    pub claim_timeout_secs: u64,
    pub trust_timeout_secs: u64,
}

impl Default for PlayConf {
    fn default() -> Self {
        Self {
            variant: "classic".into(),
            description: None,
            hand_count: 13,
            tile_set: TileSet::default(),
            wildcards: String::new(),
            must_hu: false,
            must_hu_if_only_wild: false,
            min_multiple: 1,
            max_multiple: 0,
            only_zimo: false,
            hu_pass: true,
            pon_pass: true,
            no_pon_leaving_only_wild: false,
            can_chow: true,
            tian_ting: false,
            seven_pairs: true,
            thirteen_orphans: true,
            score_type: ScoreType::Natural,
            settle_mode: SettleMode::Immediate,
            score_base: 1,
            kon_scores: true,
            an_kon_multiple: 2,
            bu_kon_multiple: 1,
            zhi_kon_multiple: 3,
            kon_after_pon_as_zhi: true,
            feeder_pays_kon_bloom: true,
            cha_jiao: false,
            eliminate_broke: false,
            banker_policy: BankerPolicy::Winner,
            require_ready: false,
            self_timeout_secs: 15,
            claim_timeout_secs: 8,
            trust_timeout_secs: 1,
        }
    }
}

impl PlayConf {
    /// Multiplier after applying the cap.
    pub fn real_multiple(&self, multiple: i64) -> i64 {
        if self.max_multiple > 0 {
            multiple.min(self.max_multiple)
        } else {
            multiple
        }
    }

    pub fn is_capped(&self, multiple: i64) -> bool {
        self.max_multiple > 0 && multiple >= self.max_multiple
    }

    pub fn wildcard_tiles(&self) -> EngineResult<Vec<Tile>> {
        parse_tiles(&self.wildcards)
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> EngineResult<()> {
        if self.hand_count != 13 && self.hand_count != 16 {
            return Err(EngineError::Config(format!(
                "hand_count must be 13 or 16, got {}",
                self.hand_count
            )));
        }
        let wild = self.wildcard_tiles()?;
        if wild.iter().any(|t| t.is_bonus()) {
            return Err(EngineError::Config("bonus tiles cannot be wildcards".into()));
        }
        if self.score_base <= 0 {
            return Err(EngineError::Config("score_base must be positive".into()));
        }
        if self.min_multiple < 0 || self.max_multiple < 0 {
            return Err(EngineError::Config("multiples must be non-negative".into()));
        }
        Ok(())
    }
}

/// Top-level TOML file structure.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RuleCatalog {
    #[serde(default)]
    pub profiles: HashMap<String, PlayConf>,
}

impl RuleCatalog {
    pub fn get(&self, name: &str) -> Option<&PlayConf> {
        self.profiles.get(name)
    }

    /// Add profiles that are not already present.
    pub fn merge_missing(&mut self, defaults: impl IntoIterator<Item = (String, PlayConf)>) {
        for (name, conf) in defaults {
            self.profiles.entry(name).or_insert(conf);
        }
    }
}

/// Load a rule catalog from a TOML file at the given path.
pub fn load_rules(path: &Path) -> Result<RuleCatalog, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    let catalog: RuleCatalog =
        toml::from_str(&content).map_err(|e| format!("Failed to parse {}: {}", path.display(), e))?;
    for (name, conf) in &catalog.profiles {
        conf.validate()
            .map_err(|e| format!("Invalid profile '{}' in {}: {}", name, path.display(), e))?;
    }
    Ok(catalog)
}

/// Default profile of every built-in variant, keyed by variant id.
pub fn builtin_profiles() -> Vec<(String, PlayConf)> {
    let registry = crate::games::VariantRegistry::with_builtin();
    registry
        .list_game_ids()
        .into_iter()
        .filter_map(|id| registry.get(&id).map(|v| (id, v.default_rules())))
        .collect()
}

/// Try to load rules from well-known paths. Built-in variant profiles fill in
/// any name the file does not define.
pub fn load_default_rules() -> RuleCatalog {
    let candidates = ["rules.toml", "../rules.toml", "/etc/mahjong/rules.toml"];
    let mut catalog = RuleCatalog::default();
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_rules(p) {
                Ok(loaded) => {
                    tracing::info!(path = %p.display(), count = loaded.profiles.len(), "loaded rule catalog");
                    catalog = loaded;
                    break;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load rule catalog");
                }
            }
        }
    }
    if catalog.profiles.is_empty() {
        tracing::info!("no rules.toml found, using built-in profiles");
    }
    catalog.merge_missing(builtin_profiles());
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_rules_with_partial_profile() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[profiles.fast]
variant = "classic"
min_multiple = 2
max_multiple = 8
settle_mode = "round_end"
score_type = "min_score"

[profiles.wild]
variant = "red_dragon"
wildcards = "1d"
can_chow = false
"#
        )
        .unwrap();

        let catalog = load_rules(file.path()).unwrap();
        let fast = catalog.get("fast").unwrap();
        assert_eq!(fast.min_multiple, 2);
        assert_eq!(fast.real_multiple(20), 8);
        assert!(fast.is_capped(8));
        assert_eq!(fast.settle_mode, SettleMode::RoundEnd);
        assert_eq!(fast.score_type, ScoreType::MinScore);
        assert_eq!(fast.hand_count, 13);

        let wild = catalog.get("wild").unwrap();
        assert_eq!(wild.wildcard_tiles().unwrap().len(), 1);
        assert!(!wild.can_chow);
    }

    #[test]
    fn test_load_rules_rejects_bad_hand_count() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[profiles.bad]\nhand_count = 10\n").unwrap();
        let err = load_rules(file.path()).unwrap_err();
        assert!(err.contains("hand_count"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_rules(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.starts_with("Failed to read"));
    }

    #[test]
    fn test_merge_missing_keeps_loaded_profiles() {
        let mut catalog = RuleCatalog::default();
        catalog.profiles.insert("classic".into(), PlayConf { min_multiple: 5, ..PlayConf::default() });
        catalog.merge_missing(vec![
            ("classic".to_string(), PlayConf::default()),
            ("other".to_string(), PlayConf::default()),
        ]);
        assert_eq!(catalog.get("classic").unwrap().min_multiple, 5);
        assert!(catalog.get("other").is_some());
    }

    #[test]
    fn test_builtin_profiles_cover_every_variant() {
        let profiles: HashMap<String, PlayConf> = builtin_profiles().into_iter().collect();
        assert_eq!(profiles["classic"].variant, "classic");
        let red = &profiles["red_dragon"];
        assert_eq!(red.variant, "red_dragon");
        assert!(!red.can_chow);
        assert!(red.validate().is_ok());
    }
}
