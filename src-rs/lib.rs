#![deny(clippy::all)]

pub mod config;
pub mod cons;
pub mod driver;
pub mod error;
pub mod host;
pub mod llm;


use log::{LevelFilter, Record};
use log4rs::filter::{Filter, Response};
use std::sync::Once;

static INIT: Once = Once::new();

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {t} - {m}{n}";

/// Passes only `Debug` and `Trace` records, so the debug sink never repeats
/// what the console already shows.
#[derive(Debug, Default)]
pub struct DebugOnlyFilter;

impl Filter for DebugOnlyFilter {
    fn filter(&self, record: &Record) -> Response {
        if record.level() >= log::Level::Debug {
            Response::Neutral
        } else {
            Response::Reject
        }
    }
}

pub fn init_logger() {
    INIT.call_once(|| {
        use log4rs::append::console::{ConsoleAppender, Target};
        use log4rs::config::{Appender, Config, Logger, Root};
        use log4rs::encode::pattern::PatternEncoder;
        use log4rs::filter::threshold::ThresholdFilter;

        // An explicit log4rs file takes over completely
        if let Ok(config_path) = std::env::var("LOG4RS_CONFIG") {
            match log4rs::init_file(&config_path, Default::default()) {
                Ok(_) => {
                    log::debug!("Logger initialized from {}", config_path);
                    return;
                }
                Err(e) => eprintln!("[INIT] Failed to load {}, falling back to default config: {}", config_path, e),
            }
        }

        let console = ConsoleAppender::builder()
            .target(Target::Stdout)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        let debug = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();

        let config = match Config::builder()
            .appender(
                Appender::builder()
                    .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                    .build("console", Box::new(console)),
            )
            .appender(
                Appender::builder()
                    .filter(Box::new(DebugOnlyFilter))
                    .build("debug", Box::new(debug)),
            )
            // HTTP stack internals are noise even at debug level
            .logger(Logger::builder().build("hyper", LevelFilter::Warn))
            .logger(Logger::builder().build("reqwest", LevelFilter::Warn))
            .logger(Logger::builder().build("mio", LevelFilter::Warn))
            .logger(Logger::builder().build("want", LevelFilter::Warn))
            .build(Root::builder().appender("console").appender("debug").build(LevelFilter::Trace))
        {
            Ok(c) => c,
            Err(e) => {
                eprintln!("[INIT] Failed to build logger config: {}", e);
                return;
            }
        };

        match log4rs::init_config(config) {
            Ok(_) => log::set_max_level(LevelFilter::Info),
            Err(e) => eprintln!("[INIT] Failed to initialize logger: {}", e),
        }
    });
}

/// Apply `Logging:LogLevel:Default` once configuration is loaded.
pub fn set_log_level(level: LevelFilter) {
    log::set_max_level(level);
}
