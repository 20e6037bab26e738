use std::borrow::Cow;
use std::env;

use log::error;

pub fn basename(path: &str) -> Cow<'_, str> {
    if path == "/" {
        return path.into();
    }
    let mut pieces = path.trim_end_matches('/').rsplit('/');
    match pieces.next() {
        Some(p) => p.into(),
        None => path.into(),
    }
}

pub fn current_dir() -> String {
    let current_dir = match env::current_dir() {
        Ok(x) => x,
        Err(e) => {
            error!("pipesh: PROMPT: env current_dir error: {}", e);
            return String::new();
        }
    };

    match current_dir.to_str() {
        Some(x) => x.to_string(),
        None => {
            error!("pipesh: PROMPT: to_str error");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename() {
        assert_eq!(basename("/usr/local/bin"), "bin");
        assert_eq!(basename("/home/zako/"), "zako");
        assert_eq!(basename("relative"), "relative");
        assert_eq!(basename("/"), "/");
        assert_eq!(basename(""), "");
    }
}
