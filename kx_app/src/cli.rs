pub const CONFIG_ENV: &str = "KX_CONFIG";

/// Config file path: first command-line argument, then `KX_CONFIG`, then `default`
pub fn config_path(default: &str) -> String {
    resolve_config_path(std::env::args().nth(1), std::env::var(CONFIG_ENV).ok(), default)
}

fn resolve_config_path(arg: Option<String>, env: Option<String>, default: &str) -> String {
    arg.or(env).filter(|path| !path.is_empty()).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        assert_eq!(resolve_config_path(Some("a.toml".into()), Some("b.toml".into()), "c.toml"), "a.toml");
        assert_eq!(resolve_config_path(None, Some("b.toml".into()), "c.toml"), "b.toml");
        assert_eq!(resolve_config_path(None, None, "c.toml"), "c.toml");
        assert_eq!(resolve_config_path(None, Some(String::new()), "c.toml"), "c.toml");
    }
}
