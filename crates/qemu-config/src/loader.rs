use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::source::{ConfigSource, RawConfig};

/// Read an INI file into a [`RawConfig`].
///
/// Fails with [`ConfigError::ConfigNotFound`] unless `path` is a regular file.
pub fn load(path: &Path) -> Result<RawConfig> {
    let is_file = std::fs::metadata(path).is_ok_and(|m| m.is_file());
    if !is_file {
        return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = parse(&text)?;
    debug!(path = %path.display(), sections = raw.sections().len(), "config loaded");
    Ok(raw)
}

/// Parse INI text.
///
/// Keys are lower-cased, section names are kept verbatim. Indented lines
/// continue the previous value.
pub fn parse(text: &str) -> Result<RawConfig> {
    let mut raw = RawConfig::new();
    let mut current: Option<String> = None;
    let mut last_key: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }

        if line.starts_with(char::is_whitespace)
            && let (Some(section), Some(key)) = (&current, &last_key)
        {
            let section = raw.section_mut(section);
            let value = match section.get(key) {
                Some(prev) if !prev.is_empty() => format!("{prev}\n{trimmed}"),
                _ => trimmed.to_string(),
            };
            section.set(key.clone(), value);
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .map(str::trim)
                .ok_or_else(|| syntax(lineno, "unterminated section header"))?;
            if name.is_empty() {
                return Err(syntax(lineno, "empty section name"));
            }
            if raw.has_section(name) {
                return Err(ConfigError::DuplicateSection {
                    section: name.to_string(),
                    line: lineno,
                });
            }
            raw.section_mut(name);
            current = Some(name.to_string());
            last_key = None;
            continue;
        }

        let Some(section) = &current else {
            return Err(syntax(lineno, "option outside of any section"));
        };
        let (key, value) = trimmed
            .split_once(['=', ':'])
            .ok_or_else(|| syntax(lineno, "expected `key = value`"))?;
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            return Err(syntax(lineno, "empty option name"));
        }
        raw.section_mut(section).set(key.clone(), value.trim());
        last_key = Some(key);
    }

    Ok(raw)
}

fn syntax(line: usize, message: &str) -> ConfigError {
    ConfigError::Syntax {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sections_and_options() {
        let raw = parse(
            "[env]\nvm_nb = 2\n\n[global]\nimage=/img/a.qcow2\nmemory: 4G\n\n[web]\ncpu = host\n",
        )
        .unwrap();
        assert_eq!(raw.sections(), vec!["env", "global", "web"]);
        assert_eq!(raw.get("env", "vm_nb"), Some("2"));
        assert_eq!(raw.get("global", "image"), Some("/img/a.qcow2"));
        assert_eq!(raw.get("global", "memory"), Some("4G"));
        assert_eq!(raw.get("web", "cpu"), Some("host"));
    }

    #[test]
    fn keys_are_lowercased_sections_are_not() {
        let raw = parse("[Web]\nVNC_Port = 7\n").unwrap();
        assert_eq!(raw.get("Web", "vnc_port"), Some("7"));
        assert!(!raw.has_section("web"));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let raw = parse("# top\n[global]\n; note\n  # indented comment\nimage = x\n\n").unwrap();
        assert_eq!(raw.items("global"), vec![("image", "x")]);
    }

    #[test]
    fn value_may_contain_separators() {
        let raw = parse("[vm]\nsmp = cores=2,threads=1,sockets=1\nextra = -serial mon:stdio\n")
            .unwrap();
        assert_eq!(raw.get("vm", "smp"), Some("cores=2,threads=1,sockets=1"));
        assert_eq!(raw.get("vm", "extra"), Some("-serial mon:stdio"));
    }

    #[test]
    fn empty_value_is_kept() {
        let raw = parse("[vm]\nvnc_port =\n").unwrap();
        assert_eq!(raw.get("vm", "vnc_port"), Some(""));
    }

    #[test]
    fn indented_lines_continue_previous_value() {
        let raw = parse("[vm]\nextra = -usb\n    -device usb-tablet\nmemory = 1G\n").unwrap();
        assert_eq!(raw.get("vm", "extra"), Some("-usb\n-device usb-tablet"));
        assert_eq!(raw.get("vm", "memory"), Some("1G"));
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let raw = parse("[vm]\ncpu = a\nmemory = 1G\ncpu = b\n").unwrap();
        assert_eq!(raw.items("vm"), vec![("cpu", "b"), ("memory", "1G")]);
    }

    #[test]
    fn duplicate_section_is_rejected() {
        let err = parse("[vm]\n[global]\n[vm]\n").unwrap_err();
        assert!(
            matches!(err, ConfigError::DuplicateSection { ref section, line: 3 } if section == "vm"),
            "got: {err}"
        );
    }

    #[test]
    fn option_before_section_is_rejected() {
        let err = parse("image = x\n[global]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 1, .. }), "got: {err}");
    }

    #[test]
    fn line_without_separator_is_rejected() {
        let err = parse("[global]\nimage\n").unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { line: 2, .. }), "got: {err}");
    }

    #[test]
    fn unterminated_header_is_rejected() {
        let err = parse("[global\n").unwrap_err();
        assert!(err.to_string().contains("unterminated"), "got: {err}");
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("vm.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound(_)), "got: {err}");
    }

    #[test]
    fn load_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ConfigNotFound(_)), "got: {err}");
    }

    #[test]
    fn load_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vm.ini");
        std::fs::write(&path, "[global]\nimage = /img/a.qcow2\n").unwrap();
        let raw = load(&path).unwrap();
        assert_eq!(raw.get("global", "image"), Some("/img/a.qcow2"));
    }
}
