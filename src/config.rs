//! Application configuration, loaded from environment variables at startup.

use std::path::PathBuf;

use crate::model::DEFAULT_OUTPUT_TEMPLATE;

/// Runtime configuration for the converter app.
///
/// Every field has a default, so the app runs without any variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where converted files land (`V2MP3_OUTPUT_DIR`). Defaults to the
    /// user's download folder, then `<cache>/mp3`, then `./downloads`.
    pub output_dir: PathBuf,

    /// Filename pattern expanded by yt-dlp (`V2MP3_OUTPUT_TEMPLATE`).
    pub output_template: String,

    /// Explicit yt-dlp executable (`V2MP3_YTDLP`). When unset the bundled
    /// binary is used, then `yt-dlp` from `PATH`.
    pub converter_path: Option<PathBuf>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,eframe=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            output_dir: non_empty("V2MP3_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_output_dir),
            output_template: non_empty("V2MP3_OUTPUT_TEMPLATE")
                .unwrap_or_else(|| DEFAULT_OUTPUT_TEMPLATE.to_owned()),
            converter_path: non_empty("V2MP3_YTDLP").map(PathBuf::from),
            log_level: non_empty("V2MP3_LOG").unwrap_or_else(|| "info".to_owned()),
            log_json: non_empty("V2MP3_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::cache_dir().map(|cache| cache.join("mp3")))
        .unwrap_or_else(|| PathBuf::from("./downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = config_with(&[]);
        assert_eq!(cfg.output_template, "%(title)s.%(ext)s");
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
        assert!(cfg.converter_path.is_none());
        assert_eq!(cfg.output_dir, default_output_dir());
    }

    #[test]
    fn variables_override_defaults() {
        let cfg = config_with(&[
            ("V2MP3_OUTPUT_DIR", "/srv/music"),
            ("V2MP3_OUTPUT_TEMPLATE", "%(id)s.%(ext)s"),
            ("V2MP3_YTDLP", "/opt/yt-dlp"),
            ("V2MP3_LOG", "debug"),
            ("V2MP3_LOG_JSON", "TRUE"),
        ]);
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/music"));
        assert_eq!(cfg.output_template, "%(id)s.%(ext)s");
        assert_eq!(cfg.converter_path, Some(PathBuf::from("/opt/yt-dlp")));
        assert_eq!(cfg.log_level, "debug");
        assert!(cfg.log_json);
    }

    #[test]
    fn blank_values_fall_back() {
        let cfg = config_with(&[("V2MP3_YTDLP", "  "), ("V2MP3_LOG", "")]);
        assert!(cfg.converter_path.is_none());
        assert_eq!(cfg.log_level, "info");
    }
}
