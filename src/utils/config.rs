use dotenv::dotenv;
use rustyline::EditMode;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub theme: String,
    pub history_file: PathBuf,
    pub editor_mode: String,
    pub logger_level: String,
    pub logger_dir: PathBuf,
}

impl Config {
    fn get_config_dir(home: Option<String>) -> PathBuf {
        match home {
            Some(home) => PathBuf::from(home).join(".config/pipesh"),
            None => env::temp_dir().join("pipesh"),
        }
    }

    pub fn new() -> Self {
        // 优先加载环境变量
        if cfg!(debug_assertions) {
            dotenv::from_filename(".env.development").ok();
        } else {
            dotenv().ok();
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 通过查找函数构建配置，便于测试时不依赖真实环境变量
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = Self::get_config_dir(lookup("HOME"));

        // 默认配置
        let mut config = Config {
            name: String::from("pipesh"),
            theme: String::from("default"),
            history_file: config_dir.join(".pipesh_history"),
            editor_mode: String::from("vi"),
            logger_level: String::from("warn"),
            logger_dir: config_dir.join("logs"),
        };

        if let Some(theme) = lookup("PIPESH_THEME") {
            config.theme = theme;
        }

        if let Some(editor) = lookup("PIPESH_EDITOR") {
            config.editor_mode = editor;
        }

        if let Some(history) = lookup("PIPESH_HISTORY") {
            config.history_file = PathBuf::from(history);
        }

        if let Some(level) = lookup("PIPESH_LOG_LEVEL") {
            config.logger_level = level;
        }

        if let Some(dir) = lookup("PIPESH_LOG_DIR") {
            config.logger_dir = PathBuf::from(dir);
        }

        config
    }

    /// 确保历史文件目录存在
    pub fn ensure_dirs(&self) -> io::Result<()> {
        if let Some(parent) = self.history_file.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn get_edit_mode(&self) -> EditMode {
        match self.editor_mode.to_lowercase().as_str() {
            "emacs" => EditMode::Emacs,
            _ => EditMode::Vi,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
