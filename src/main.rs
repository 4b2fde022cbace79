use std::error::Error;

use clap::ArgMatches;
use v::{get_global_config_manager, info};
use vgo_admin::conf::AppConfig;
use vgo_admin::error::AppError;
use vgo_admin::{apply_server_args, build_app, init_logging, AppBootstrap};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let matches: ArgMatches = build_app().get_matches();

    match matches.subcommand() {
        Some(("server", sub_matches)) => {
            handle_server_command(sub_matches).await?;
        }
        Some(("version", _)) => {
            println!("vgo-admin {}", env!("CARGO_PKG_VERSION"));
        }
        _ => {
            // subcommand_required(true) 保证不会到达这里
            eprintln!("未知命令，请使用 --help 查看可用命令");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn handle_server_command(matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let config_manager = get_global_config_manager()?;
    let config = AppConfig::from_manager(&config_manager).map_err(AppError::from)?;
    let config = apply_server_args(config, matches);

    init_logging(config.log_format)?;
    config_manager.log_sources();
    info!(debug = config.debug, memory = config.memory, "配置加载完成");

    AppBootstrap::new().with_config(config).run().await?;
    Ok(())
}
