//! Structured logging setup shared by `psmd` and `psmctl`

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events the verbosity flag controls.
const CRATES: &[&str] = &[
    "psmd",
    "psmctl",
    "powershelf_service",
    "powershelf_firmware",
    "powershelf_registry",
    "powershelf_credentials",
    "powershelf_redfish",
    "powershelf_db",
];

/// Logging options.
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig {
    /// Base level for the workspace crates
    pub level: tracing::Level,
    /// Include event targets in the output
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Level for a `-v` count on top of `base`: one step up per flag.
    pub fn from_verbosity(base: tracing::Level, verbose: u8) -> Self {
        const LADDER: [tracing::Level; 5] = [
            tracing::Level::ERROR,
            tracing::Level::WARN,
            tracing::Level::INFO,
            tracing::Level::DEBUG,
            tracing::Level::TRACE,
        ];
        let start = LADDER.iter().position(|l| *l == base).unwrap_or(2);
        let level = LADDER
            .get(start.saturating_add(usize::from(verbose)))
            .copied()
            .unwrap_or(tracing::Level::TRACE);
        Self {
            level,
            ..Self::default()
        }
    }

    /// Directive string used when `RUST_LOG` is unset.
    pub fn directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = String::from("warn");
        for krate in CRATES {
            directives.push_str(&format!(",{krate}={level}"));
        }
        directives
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `config` when set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_unset| EnvFilter::new(config.directives()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(config.with_target))
        .try_init()
}
