/// Prefix yt-dlp puts in front of each progress line, set through
/// `--progress-template`.
pub const PROGRESS_PREFIX: &str = "progress:";

/// `--progress-template` value producing lines like `progress: 42.5%`.
pub const PROGRESS_TEMPLATE: &str = "download:progress:%(progress._percent_str)s";

/// Parses one converter stdout line into a fraction in `0.0..=1.0`.
pub fn parse_progress_from_line(line: &str) -> Option<f32> {
    let rest = strip_ansi(line);
    let rest = rest.trim().strip_prefix(PROGRESS_PREFIX)?;
    let number = rest.trim().strip_suffix('%')?;
    let value = number.trim().parse::<f32>().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some((value / 100.0).clamp(0.0, 1.0))
}

// yt-dlp colours the percent string when it thinks it's on a terminal
fn strip_ansi(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for c in chars.by_ref() {
                if c.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_padded_percentage() {
        assert_eq!(parse_progress_from_line("progress:  42.0%"), Some(0.42));
    }

    #[test]
    fn parses_coloured_percentage() {
        let line = "progress:\u{1b}[0;94m 50.0%\u{1b}[0m";
        assert_eq!(parse_progress_from_line(line), Some(0.5));
    }

    #[test]
    fn clamps_out_of_range_values() {
        assert_eq!(parse_progress_from_line("progress:100.4%"), Some(1.0));
    }

    #[test]
    fn ignores_other_output() {
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line("progress:N/A"), None);
        assert_eq!(parse_progress_from_line("progress:nan%"), None);
        assert_eq!(parse_progress_from_line(""), None);
    }
}
