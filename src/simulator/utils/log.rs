use log::LevelFilter;

/// Installs the global logger once. Defaults to `info` unless `RUST_LOG` says
/// otherwise; `quiet` caps the level at `warn`. Safe to call repeatedly, later
/// calls only adjust the cap.
pub fn init_log(quiet: bool) {
  let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
    .format_timestamp(None)
    .format_target(false)
    .try_init();

  if quiet {
    log::set_max_level(LevelFilter::Warn);
  }
}
