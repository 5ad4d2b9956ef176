use scheduler_core::config::AppConfig;

/// Initializes the global tracing subscriber at the level configured in `config`.
pub fn init_tracing(config: &AppConfig) {
	let filter = config.tracing_level.get_level();

	tracing_subscriber::fmt()
		.with_max_level(filter)
		.with_target(true)
		.init();
}
