/// Read access to a sectioned key/value config.
///
/// The resolver only ever talks to this trait, so fixtures can be built in
/// memory without going through the INI loader.
pub trait ConfigSource {
    /// Section names in declaration order.
    fn sections(&self) -> Vec<&str>;
    /// Key/value pairs of `section` in declaration order, empty if absent.
    fn items(&self, section: &str) -> Vec<(&str, &str)>;
    fn get(&self, section: &str, key: &str) -> Option<&str>;

    fn has_section(&self, section: &str) -> bool {
        self.sections().contains(&section)
    }

    fn has(&self, section: &str, key: &str) -> bool {
        self.get(section, key).is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Set `key`, keeping the original position if it was already present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Ordered section → key → value text, exactly as read from disk.
///
/// No type coercion happens here; everything is a string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfig {
    sections: Vec<Section>,
}

impl RawConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section, or return the existing one with the same name.
    #[allow(clippy::indexing_slicing)] // pos was just found or pushed
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        let pos = match self.sections.iter().position(|s| s.name == name) {
            Some(pos) => pos,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[pos]
    }

    /// Builder-style helper for tests and programmatic configs.
    pub fn with(mut self, section: &str, key: &str, value: &str) -> Self {
        self.section_mut(section).set(key, value);
        self
    }

    /// Builder-style helper that declares an empty section.
    pub fn with_section(mut self, section: &str) -> Self {
        self.section_mut(section);
        self
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }
}

impl ConfigSource for RawConfig {
    fn sections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    fn items(&self, section: &str) -> Vec<(&str, &str)> {
        self.section(section)
            .map(|s| {
                s.entries
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_keep_declaration_order() {
        let raw = RawConfig::new()
            .with("global", "image", "/a.qcow2")
            .with("zeta", "memory", "1G")
            .with("alpha", "memory", "4G");
        assert_eq!(raw.sections(), vec!["global", "zeta", "alpha"]);
    }

    #[test]
    fn set_overwrites_in_place() {
        let raw = RawConfig::new()
            .with("vm", "cpu", "host")
            .with("vm", "memory", "1G")
            .with("vm", "cpu", "qemu64");
        assert_eq!(raw.items("vm"), vec![("cpu", "qemu64"), ("memory", "1G")]);
    }

    #[test]
    fn missing_section_and_key() {
        let raw = RawConfig::new().with_section("global");
        assert!(raw.has_section("global"));
        assert!(!raw.has_section("env"));
        assert!(!raw.has("global", "image"));
        assert_eq!(raw.get("nope", "image"), None);
        assert!(raw.items("nope").is_empty());
    }

    #[test]
    fn section_names_are_case_sensitive() {
        let raw = RawConfig::new().with_section("Global");
        assert!(!raw.has_section("global"));
    }
}
