//! Инициализация логирования для хостов и демо

use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

/// Фильтр по умолчанию, если `RUST_LOG` не задан
pub const DEFAULT_FILTER: &str = "warn,lesson_sync=info";

pub fn init_logger() {
    // Базовый фильтр, переопределяемый через RUST_LOG
    let env = Env::default().filter_or("RUST_LOG", DEFAULT_FILTER);

    let mut builder = Builder::from_env(env);

    builder
        .filter_module("tokio", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // Повторная инициализация (например, в тестах) не считается ошибкой
    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
}
