//! ZX81 machine configuration.

use sinclair_zx81_ula::{UlaConfig, VideoVariant};

/// Port the zxnDMA answers on when fitted.
pub const DEFAULT_DMA_PORT: u16 = 0x006B;

/// RAM fitted to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RamSize {
    /// Stock machine: 1K at $4000, mirrored up to $7FFF.
    K1,
    /// 16K RAM pack.
    #[default]
    K16,
    /// 16K plus 32K at $8000-$FFFF (data only, see `Zx81Memory`).
    K48,
}

/// Configuration for creating a ZX81 instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Zx81Config {
    /// ROM image (8K; mirrored through $0000-$3FFF). Supplied by the host,
    /// never read from a settings file.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub rom: Vec<u8>,
    pub ram: RamSize,
    pub video: VideoVariant,
    pub ula: UlaConfig,
    /// zxnDMA control port, `None` for no DMA.
    pub dma_port: Option<u16>,
}

impl Default for Zx81Config {
    fn default() -> Self {
        Self {
            rom: Vec::new(),
            ram: RamSize::K16,
            video: VideoVariant::Bus,
            ula: UlaConfig::default(),
            dma_port: Some(DEFAULT_DMA_PORT),
        }
    }
}
