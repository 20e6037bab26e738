use log::{debug, warn};

use pipesh::shell::Shell;
use pipesh::utils::config::Config;
use pipesh::utils::log::init_logger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::new();
    init_logger(&config);
    if let Err(e) = config.ensure_dirs() {
        warn!("无法创建配置目录: {}", e);
    }
    debug!("配置加载成功 {}", config.history_file.display());

    let mut shell = Shell::new(&config)?;
    shell.run()
}
