/// What FX55 and FX65 do to the index register once the block transfer is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// `I` ends up one past the last byte transferred (`I + X + 1`).
    #[default]
    Advance,
    /// `I` is left where it was.
    Fixed,
}

/// Knobs for behaviour that differs between CHIP-8 interpreters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub index_mode: IndexMode,
    /// Seed for the CXNN random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Config {
    pub fn with_index_mode(mut self, index_mode: IndexMode) -> Self {
        self.index_mode = index_mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_advances_index_and_is_unseeded() {
        let config = Config::default();
        assert_eq!(config.index_mode, IndexMode::Advance);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn builders_set_fields() {
        let config = Config::default().with_index_mode(IndexMode::Fixed).with_seed(7);
        assert_eq!(config.index_mode, IndexMode::Fixed);
        assert_eq!(config.seed, Some(7));
    }
}
