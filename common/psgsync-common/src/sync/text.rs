//! Line-oriented text medium.
//!
//! ```text
//! [SN76489]
//!   volume 15 15 15 15
//!   noise_white false
//! [/SN76489]
//! Frame 120
//! ```
//!
//! Each line is a section header, a section footer, or `key value...`. Keys are unique within a
//! section; arrays are written as space-separated values after the key.

use crate::sync::{StateCorruption, StateSerializer, SyncResult, SyncValue};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

const INDENT: &str = "  ";

fn is_valid_key(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('[') && !name.contains(char::is_whitespace)
}

/// Saving serializer for the text medium.
#[derive(Debug, Default)]
pub struct TextWriter {
    output: String,
    sections: Vec<String>,
}

impl TextWriter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify that all sections were closed and return the text.
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption::UnclosedSections`] if sections are still open.
    pub fn finish(self) -> SyncResult<String> {
        if !self.sections.is_empty() {
            return Err(StateCorruption::UnclosedSections(self.sections.len()).into());
        }

        Ok(self.output)
    }

    fn push_line(&mut self, line: &str) {
        for _ in 0..self.sections.len() {
            self.output.push_str(INDENT);
        }
        self.output.push_str(line);
        self.output.push('\n');
    }
}

impl StateSerializer for TextWriter {
    fn is_loading(&self) -> bool {
        false
    }

    fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        debug_assert!(is_valid_key(name), "invalid state key '{name}'");

        self.push_line(&format!("{name} {value}"));
        Ok(())
    }

    fn sync_array<T: SyncValue>(
        &mut self,
        name: &str,
        values: &mut [T],
        _use_compression: bool,
    ) -> SyncResult<()> {
        debug_assert!(is_valid_key(name), "invalid state key '{name}'");

        let mut line = String::from(name);
        for value in values.iter() {
            line.push(' ');
            line.push_str(&value.to_string());
        }
        self.push_line(&line);

        Ok(())
    }

    fn begin_section(&mut self, name: &str) -> SyncResult<()> {
        debug_assert!(is_valid_key(name), "invalid section name '{name}'");

        self.push_line(&format!("[{name}]"));
        self.sections.push(name.into());
        Ok(())
    }

    fn end_section(&mut self) -> SyncResult<()> {
        let Some(name) = self.sections.pop() else {
            return Err(StateCorruption::UnbalancedEnd.into());
        };

        self.push_line(&format!("[/{name}]"));
        Ok(())
    }
}

#[derive(Debug)]
struct TextSection {
    name: String,
    values: HashMap<String, String>,
    children: Vec<usize>,
    entered: bool,
}

impl TextSection {
    fn new(name: String) -> Self {
        Self { name, values: HashMap::new(), children: Vec::new(), entered: false }
    }
}

/// Loading serializer for the text medium.
///
/// The whole input is parsed up front into a section tree; values are then looked up by key in the
/// current section, and sibling sections with the same name are entered in order.
#[derive(Debug)]
pub struct TextReader {
    sections: Vec<TextSection>,
    stack: Vec<usize>,
}

impl TextReader {
    /// Parse text produced by [`TextWriter`].
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption`] if section headers and footers do not pair up or if a key is
    /// repeated within one section.
    pub fn new(text: &str) -> SyncResult<Self> {
        let mut sections = vec![TextSection::new(String::new())];
        let mut open = vec![0_usize];

        for (i, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }

            let line_number = i + 1;
            let current = open[open.len() - 1];

            if let Some(name) = line.strip_prefix("[/").and_then(|rest| rest.strip_suffix(']')) {
                if open.len() == 1 {
                    return Err(StateCorruption::Malformed {
                        line: line_number,
                        message: format!("end of section '{name}' with no open section"),
                    }
                    .into());
                }

                if sections[current].name != name {
                    return Err(StateCorruption::Malformed {
                        line: line_number,
                        message: format!(
                            "end of section '{name}' while '{}' is open",
                            sections[current].name
                        ),
                    }
                    .into());
                }

                open.pop();
            } else if let Some(name) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']'))
            {
                let index = sections.len();
                sections.push(TextSection::new(name.into()));
                sections[current].children.push(index);
                open.push(index);
            } else {
                let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
                match sections[current].values.entry(key.into()) {
                    Entry::Occupied(_) => {
                        return Err(StateCorruption::DuplicateKey {
                            section: sections[current].name.clone(),
                            name: key.into(),
                        }
                        .into());
                    }
                    Entry::Vacant(entry) => {
                        entry.insert(value.trim().into());
                    }
                }
            }
        }

        if open.len() > 1 {
            return Err(StateCorruption::UnclosedSections(open.len() - 1).into());
        }

        Ok(Self { sections, stack: vec![0] })
    }

    /// Verify that every section entered during the load was closed again.
    ///
    /// # Errors
    ///
    /// Returns [`StateCorruption::UnclosedSections`] if sections are still open.
    pub fn finish(self) -> SyncResult<()> {
        if self.stack.len() > 1 {
            return Err(StateCorruption::UnclosedSections(self.stack.len() - 1).into());
        }

        Ok(())
    }

    fn current(&self) -> &TextSection {
        &self.sections[self.stack[self.stack.len() - 1]]
    }

    fn lookup(&self, name: &str) -> SyncResult<&str> {
        let section = self.current();
        section.values.get(name).map(String::as_str).ok_or_else(|| {
            StateCorruption::MissingKey { section: section.name.clone(), name: name.into() }.into()
        })
    }
}

fn parse_value<T: SyncValue>(name: &str, raw: &str) -> Result<T, StateCorruption> {
    raw.parse()
        .map_err(|_| StateCorruption::InvalidValue { name: name.into(), value: raw.into() })
}

impl StateSerializer for TextReader {
    fn is_loading(&self) -> bool {
        true
    }

    fn sync<T: SyncValue>(&mut self, name: &str, value: &mut T) -> SyncResult<()> {
        let raw = self.lookup(name)?;
        *value = parse_value(name, raw)?;
        Ok(())
    }

    fn sync_array<T: SyncValue>(
        &mut self,
        name: &str,
        values: &mut [T],
        _use_compression: bool,
    ) -> SyncResult<()> {
        let raw = self.lookup(name)?;

        let actual = raw.split_whitespace().count();
        if actual != values.len() {
            return Err(StateCorruption::LengthMismatch {
                name: name.into(),
                expected: values.len(),
                actual,
            }
            .into());
        }

        for (value, raw_value) in values.iter_mut().zip(raw.split_whitespace()) {
            *value = parse_value(name, raw_value)?;
        }

        Ok(())
    }

    fn begin_section(&mut self, name: &str) -> SyncResult<()> {
        let next = self
            .current()
            .children
            .iter()
            .copied()
            .find(|&child| !self.sections[child].entered && self.sections[child].name == name);

        let Some(child) = next else {
            return Err(StateCorruption::MissingSection(name.into()).into());
        };

        self.sections[child].entered = true;
        self.stack.push(child);
        Ok(())
    }

    fn end_section(&mut self) -> SyncResult<()> {
        if self.stack.len() == 1 {
            return Err(StateCorruption::UnbalancedEnd.into());
        }

        self.stack.pop();
        Ok(())
    }
}
