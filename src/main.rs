use clap::Parser;

use visitor_counter::cli::{Cli, Commands};
use visitor_counter::config::{get_config, init_config, replace_config};
use visitor_counter::runtime::modes::{self, Mode};
use visitor_counter::system::init_logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // .env 优先加载，之后的配置读取才能看到其中的变量
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_config(cli.config.as_deref());

    let command = cli.command_or_default();
    let mode = modes::detect_mode(&command);

    let mut config = (*get_config()).clone();
    match (&command, &mode) {
        (Commands::Serve { host, port }, _) => {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        // 命令输出走 stdout，日志只保留警告以上
        (_, Mode::Cli) if config.logging.file.is_none() => {
            config.logging.level = "warn".to_string();
        }
        _ => {}
    }
    replace_config(config.clone());

    let _guard = init_logging(&config.logging);

    match mode {
        Mode::Server => modes::run_server(&config).await,
        Mode::Cli => modes::run_cli(command, &config).await,
    }
}
