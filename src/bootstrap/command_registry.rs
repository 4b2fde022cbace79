use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::conf::AppConfig;

/// 构建命令行应用
pub fn build_app() -> Command {
    Command::new("vgo-admin")
        .version(env!("CARGO_PKG_VERSION"))
        .about("后台系统用户管理服务 / admin user management service")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("server")
                .about("启动 Web 服务器")
                .arg(
                    Arg::new("host")
                        .long("host")
                        .value_name("HOST")
                        .help("设置服务器主机地址"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .value_parser(clap::value_parser!(u16))
                        .help("设置服务器端口"),
                )
                .arg(
                    Arg::new("workers")
                        .short('w')
                        .long("workers")
                        .value_name("WORKERS")
                        .value_parser(clap::value_parser!(usize))
                        .help("设置工作线程数"),
                )
                .arg(
                    Arg::new("memory")
                        .long("memory")
                        .help("使用内存存储并写入初始数据")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("debug")
                        .short('d')
                        .long("debug")
                        .help("启用调试模式")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("version").about("显示版本信息"))
}

/// 命令行参数覆盖配置文件 / command line flags override the config file
pub fn apply_server_args(mut config: AppConfig, matches: &ArgMatches) -> AppConfig {
    if let Some(host) = matches.get_one::<String>("host") {
        config.host = host.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.workers = Some(*workers).filter(|w| *w > 0);
    }
    config.memory |= matches.get_flag("memory");
    config.debug |= matches.get_flag("debug");
    config
}
