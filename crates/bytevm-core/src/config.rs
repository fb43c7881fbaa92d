use crate::memory::{MappingMode, ROM_START};

/// Default IP at construction and reset: the first byte of the active bank.
pub const DEFAULT_ENTRY_POINT: u16 = ROM_START;

/// Top-level immutable configuration for an engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// How the ROM file backs the bank window.
    pub mapping_mode: MappingMode,
    /// IP loaded at construction and on reset.
    pub entry_point: u16,
    /// Emits a `trace`-level event for every retired instruction.
    pub trace_instructions: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            mapping_mode: MappingMode::Preloaded,
            entry_point: DEFAULT_ENTRY_POINT,
            trace_instructions: false,
        }
    }
}

impl CoreConfig {
    /// Returns a copy using `mode`.
    #[must_use]
    pub const fn with_mapping_mode(mut self, mode: MappingMode) -> Self {
        self.mapping_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DEFAULT_ENTRY_POINT};
    use crate::memory::MappingMode;

    #[test]
    fn default_config_boots_preloaded_at_rom_start() {
        let config = CoreConfig::default();
        assert_eq!(config.mapping_mode, MappingMode::Preloaded);
        assert_eq!(config.entry_point, 0x8000);
        assert_eq!(DEFAULT_ENTRY_POINT, 0x8000);
        assert!(!config.trace_instructions);
    }

    #[test]
    fn mapping_mode_override_keeps_other_fields() {
        let config = CoreConfig {
            trace_instructions: true,
            ..CoreConfig::default()
        }
        .with_mapping_mode(MappingMode::Streaming);
        assert_eq!(config.mapping_mode, MappingMode::Streaming);
        assert!(config.trace_instructions);
    }
}
