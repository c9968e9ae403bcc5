mod args;
mod config;
mod error;
mod overlay;
mod server;
mod stack;
mod style;
mod types;

#[async_std::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config = config::load().unwrap_or_else(|e| {
		log::warn!("{}, using the default settings", e);
		config::Config::default()
	});

	server::main(config).await
}
