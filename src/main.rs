use clap::Parser;
use shopfront::TransportKind;
use shopfront::core::config;
use shopfront::shell;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use tokio::task::LocalSet;

#[derive(Parser)]
#[command(name = "shopfront", about = "Storefront presentation framework demo")]
struct Args {
    /// Backend transport to use
    #[arg(short, long, value_enum)]
    transport: Option<TransportKind>,

    /// REST base URL for the http transport
    #[arg(short, long)]
    base_url: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let config = match config::load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            config::ShopConfig::default()
        }
    };
    let resolved = config::resolve(
        &config,
        args.transport.as_ref().map(TransportKind::as_str),
        args.base_url.as_deref(),
    );

    // File logger; the terminal stays free for the shell.
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    if let Ok(log_file) = File::create(&resolved.log_file) {
        let _ = WriteLogger::init(LevelFilter::Debug, log_config, log_file);
    }
    log::info!("shopfront starting with transport: {}", resolved.transport);

    // The whole runtime is single threaded; services hold Rc handles.
    LocalSet::new().run_until(shell::run(resolved)).await
}
