use std::str::FromStr;

use tracing::metadata::LevelFilter;
use tracing_subscriber::{
    Layer, Registry, filter::FilterFn, fmt::time::ChronoUtc,
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Emit an event inside a span named after the direction of the traffic.
#[macro_export]
macro_rules! log {
    ($level:expr, $span:expr, $($arg:tt)+) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($arg)+)
    }};
}

/// Traffic heading to the remote submission API.
#[macro_export]
macro_rules! outgoing {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!($crate::tracing::Level::$level, "outgoing", $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::outgoing!(level = TRACE, $($arg)+)
    };
}

/// Responses coming back from the remote submission API.
#[macro_export]
macro_rules! incoming {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!($crate::tracing::Level::$level, "incoming", $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::incoming!(level = TRACE, $($arg)+)
    };
}

/// Scheduler and transport bookkeeping.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($arg:tt)+) => {
        $crate::log!($crate::tracing::Level::$level, "internal", $($arg)+)
    };

    ($($arg:tt)+) => {
        $crate::internal!(level = TRACE, $($arg)+)
    };
}

/// Output format selected through `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {other}")),
        }
    }
}

fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Install the global subscriber.
///
/// `LOG_LEVEL` picks the verbosity and `LOG_FORMAT` (`compact` or `json`) the
/// layout. Only events emitted from `sesmail` crates are kept. Calling this
/// more than once is harmless; later calls leave the first subscriber in place.
pub fn init() {
    let default = default_level();

    let level = std::env::var("LOG_LEVEL").map_or(default, |level| {
        LevelFilter::from_str(level.as_str()).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    });

    let format = std::env::var("LOG_FORMAT").map_or(LogFormat::default(), |format| {
        format.parse().unwrap_or_else(|err| {
            eprintln!("{err}, defaulting to compact output");
            LogFormat::default()
        })
    });

    init_with(level, format);
}

/// Install the global subscriber with an explicit level and format.
pub fn init_with(level: LevelFilter, format: LogFormat) {
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_ansi(true)
            .with_timer(ChronoUtc::rfc_3339())
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_timer(ChronoUtc::rfc_3339())
            .boxed(),
    };

    let installed = tracing_subscriber::Registry::default()
        .with(
            layer
                .with_filter(level)
                .with_filter(FilterFn::new(|metadata| {
                    metadata.target().starts_with("sesmail")
                })),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}
