//! Terminal colour policy.

use crate::evidence::Band;
use colored::*;
use std::env;
use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
    /// Colour when stdout is a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_use_color(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => detect_color_support(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormattingConfig {
    pub color: ColorMode,
}

impl FormattingConfig {
    pub fn new(color: ColorMode) -> Self {
        Self { color }
    }

    /// Honor `NO_COLOR`, `CLICOLOR=0` and `CLICOLOR_FORCE=1`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if env::var("NO_COLOR").is_ok() {
            config.color = ColorMode::Never;
        }
        if let Ok(val) = env::var("CLICOLOR") {
            if val == "0" {
                config.color = ColorMode::Never;
            }
        }
        if let Ok(val) = env::var("CLICOLOR_FORCE") {
            if val == "1" {
                config.color = ColorMode::Always;
            }
        }

        config
    }

    /// An explicit mode wins over the environment.
    pub fn with_override(self, color: Option<ColorMode>) -> Self {
        match color {
            Some(color) => Self { color },
            None => self,
        }
    }

    /// Set the process-wide `colored` override.
    pub fn apply(&self) {
        colored::control::set_override(self.color.should_use_color());
    }
}

/// Band label coloured by urgency.
pub fn paint_band(band: Band) -> ColoredString {
    match band {
        Band::P0 => band.as_str().red().bold(),
        Band::P1 => band.as_str().yellow().bold(),
        Band::P2 => band.as_str().cyan(),
        Band::P3 => band.as_str().dimmed(),
    }
}

fn detect_color_support() -> bool {
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }
    std::io::stdout().is_terminal()
}
