use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Sets up the process-wide `tracing` subscriber. `RUST_LOG`, when set,
/// always wins; otherwise the effective level is the config file's
/// `log.level` (defaulting to `info`), nudged up or down by repeated
/// `-v`/`-q` command-line flags.
pub fn init(configured_level: Option<&str>, verbose: u8, quiet: u8, json: bool) {
    let level = adjusted_level(configured_level.unwrap_or("info"), verbose, quiet);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn adjusted_level(base: &str, verbose: u8, quiet: u8) -> Level {
    let mut level = base.parse().unwrap_or(Level::INFO);
    for _ in 0..verbose {
        level = bump(level, 1);
    }
    for _ in 0..quiet {
        level = bump(level, -1);
    }
    level
}

/// Steps `level` one notch towards `TRACE` (`direction > 0`) or `ERROR`
/// (`direction < 0`), saturating at either end.
fn bump(level: Level, direction: i8) -> Level {
    const ORDER: [Level; 5] = [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE];
    let pos = ORDER.iter().position(|&l| l == level).unwrap_or(2);
    let next = (pos as i8 + direction).clamp(0, ORDER.len() as i8 - 1);
    ORDER[next as usize]
}
