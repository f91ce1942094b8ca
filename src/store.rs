//! In-memory model of the shared credentials file, read and written through `rust-ini`
//!
//! - Keys before the first header belong to the general section, written back without a header.
//! - A duplicated key within a section is last-write-wins; the key keeps its first position.
//! - A duplicated section header continues the earlier section of the same name.
//! - Indented lines right after a key continue its value (nested settings such as `s3 =`) and
//!   are written back with their indentation.
//! - Comments and sections without keys are not written back; spacing becomes `key = value`.

/// Stands in for a folded line break while a value goes through the ini parser.
const CONTINUATION: char = '\u{1}';

fn parse_option() -> ini::ParseOption {
    ini::ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..Default::default()
    }
}

fn write_option() -> ini::WriteOption {
    ini::WriteOption {
        escape_policy: ini::EscapePolicy::Nothing,
        kv_separator: " = ",
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite `key` in place, or append it when absent.
    pub fn set(&mut self, key: &str, value: &str) {
        set_in(&mut self.entries, key, value)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CredentialStore {
    general: Vec<(String, String)>,
    sections: Vec<Section>,
}

fn parse_error(line: usize, reason: &str) -> crate::error::Error {
    crate::error::Error::ParseError {
        line,
        reason: reason.to_owned(),
    }
}

fn set_in(entries: &mut Vec<(String, String)>, key: &str, value: &str) {
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some((_, v)) => *v = value.to_owned(),
        None => entries.push((key.to_owned(), value.to_owned())),
    }
}

/// Check the shape of every line and join continuation lines onto their key line, so the ini
/// parser sees one line per entry. Returns the folded text and the last input line number.
fn fold(input: &str) -> Result<(String, usize), crate::error::Error> {
    let mut folded = String::with_capacity(input.len());
    let mut after_pair = false;
    let mut lineno = 0;

    for (idx, raw) in input.lines().enumerate() {
        lineno = idx + 1;
        if raw.contains(CONTINUATION) {
            return Err(parse_error(lineno, "unexpected control character"));
        }
        let line = raw.trim();
        if line.is_empty() {
            after_pair = false;
            continue;
        }
        if line.starts_with(['#', ';']) {
            continue;
        }

        if after_pair && raw.starts_with([' ', '\t']) {
            folded.pop();
            folded.push(CONTINUATION);
            folded.push_str(raw.trim_end());
            folded.push('\n');
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .strip_suffix(']')
                .ok_or_else(|| parse_error(lineno, "unterminated section header"))?
                .trim();
            if name.is_empty() {
                return Err(parse_error(lineno, "empty section name"));
            }
            folded.push('[');
            folded.push_str(name);
            folded.push(']');
            after_pair = false;
        } else {
            let delimiter = line
                .find(['=', ':'])
                .ok_or_else(|| parse_error(lineno, "key-value delimiter not found"))?;
            if line[..delimiter].trim().is_empty() {
                return Err(parse_error(lineno, "empty key"));
            }
            folded.push_str(line);
            after_pair = true;
        }
        folded.push('\n');
    }

    Ok((folded, lineno))
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(input: &str) -> Result<Self, crate::error::Error> {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let (folded, last_line) = fold(input)?;
        let ini = ini::Ini::load_from_str_opt(&folded, parse_option())
            .map_err(|e| parse_error(last_line.max(1), &e.to_string()))?;

        let mut store = Self::new();
        for (name, properties) in ini.iter() {
            let entries = match name {
                Some(name) => &mut store.section_mut(name.trim()).entries,
                None => &mut store.general,
            };
            for (key, value) in properties.iter() {
                set_in(entries, key, &value.replace(CONTINUATION, "\n"));
            }
        }
        Ok(store)
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Returns the named section, appending an empty one when absent.
    pub fn section_mut(&mut self, name: &str) -> &mut Section {
        let idx = match self.sections.iter().position(|s| s.name == name) {
            Some(idx) => idx,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[idx]
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    fn to_ini(&self) -> ini::Ini {
        let mut ini = ini::Ini::new();
        {
            let mut general = ini.with_section(None::<String>);
            for (key, value) in &self.general {
                general.set(key.as_str(), value.as_str());
            }
        }
        for section in &self.sections {
            let mut setter = ini.with_section(Some(section.name.as_str()));
            for (key, value) in &section.entries {
                setter.set(key.as_str(), value.as_str());
            }
        }
        ini
    }
}

impl std::fmt::Display for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut buf = zeroize::Zeroizing::new(Vec::new());
        self.to_ini()
            .write_to_opt(&mut *buf, write_option())
            .map_err(|_| std::fmt::Error)?;
        f.write_str(std::str::from_utf8(&buf).map_err(|_| std::fmt::Error)?)
    }
}
