use colored::Colorize;
use std::collections::HashMap;

type Style = Box<dyn Fn(String) -> String>;

pub struct Theme {
    pub prompt_style: Style,
    pub success_style: Style,
    pub warning_style: Style,
    pub error_style: Style,
    messages: HashMap<&'static str, &'static str>,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            prompt_style: Box::new(|s| s.bright_cyan().to_string()),
            success_style: Box::new(|s| s.bright_magenta().to_string()),
            warning_style: Box::new(|s| s.yellow().to_string()),
            error_style: Box::new(|s| s.bright_red().to_string()),
            messages: Self::default_messages(),
        }
    }
}

impl Theme {
    fn default_messages() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("welcome", "pipesh ready, type `help` for internal commands"),
            ("prompt", "pipesh"),
            ("eof_signal", "bye"),
            ("error", "pipesh"),
            ("error_symbol", "✗"),
            ("garbage", "trailing input after the pipeline was ignored"),
            ("unrecognized", "unrecognized input, ignored"),
            ("background_done", "[done]"),
        ])
    }

    pub fn load_theme(theme_name: &str) -> Theme {
        match theme_name {
            "dark" => Theme {
                prompt_style: Box::new(|s| s.bright_purple().to_string()),
                success_style: Box::new(|s| s.magenta().to_string()),
                warning_style: Box::new(|s| s.bright_yellow().to_string()),
                error_style: Box::new(|s| s.red().to_string()),
                messages: Self::default_messages(),
            },
            "plain" => {
                colored::control::set_override(false);
                Theme {
                    prompt_style: Box::new(|s| s),
                    success_style: Box::new(|s| s),
                    warning_style: Box::new(|s| s),
                    error_style: Box::new(|s| s),
                    messages: Self::default_messages(),
                }
            }
            _ => Theme::default(),
        }
    }

    pub fn get_message(&self, key: &str) -> String {
        self.messages.get(key).copied().unwrap_or(key).to_string()
    }
}
