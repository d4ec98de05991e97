//! Logging bootstrapper for the renderer and its host binaries.

use env_logger::Env;
use serde_json::json;
use std::env;
use std::io::Write;
use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

const FORMAT_ENV: &str = "IGNITION_LUKS_LOG_FORMAT";
const LEVEL_ENV: &str = "IGNITION_LUKS_LOG_LEVEL";

/// Initialize the global logger.
///
/// The first caller wins; later calls are no-ops. `RUST_LOG` takes precedence,
/// then `IGNITION_LUKS_LOG_LEVEL`, then `default_level`. Output is one JSON
/// object per line unless `IGNITION_LUKS_LOG_FORMAT=plain`.
pub fn init(default_level: &str) {
    let _ = INIT.get_or_init(|| configure(default_level));
}

fn configure(default_level: &str) {
    let level = env::var(LEVEL_ENV).unwrap_or_else(|_| default_level.to_string());
    let env = Env::default().default_filter_or(level);

    let format = env::var(FORMAT_ENV)
        .unwrap_or_else(|_| String::from("json"))
        .to_lowercase();

    let mut builder = env_logger::Builder::from_env(env);
    // stdout carries rendered documents; keep logs off it.
    builder.target(env_logger::Target::Stderr);
    if format == "json" {
        builder.format(|buf, record| {
            let payload = json!({
                "timestamp": buf.timestamp().to_string(),
                "level": record.level().to_string().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", payload)
        });
    } else {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} {} {} - {}",
                buf.timestamp(),
                record.level().to_string().to_lowercase(),
                record.target(),
                record.args()
            )
        });
    }

    if let Err(err) = builder.try_init() {
        eprintln!("failed to initialize logger: {}", err);
    }
}
