//! Per-stream resource side-tables.
//!
//! Push records reference fonts, styles, icons, shaders, and link targets
//! by interned `i16` handle instead of embedding names. Each table dedups
//! on name, so interning the same name twice returns the same handle and a
//! relayout of the same text keeps handles stable.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::font::FontFamily;
use crate::registry::IconSize;
use crate::source::{SourceId, SourceText};
use crate::style::Style;

/// A side-table of named entries with stable `i16` handles.
#[derive(Clone, Debug)]
struct NamedTable<T> {
    entries: Vec<(String, T)>,
    by_name: HashMap<String, i16>,
}

// Manual impl: the empty table must not require `T: Default`.
impl<T> Default for NamedTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> NamedTable<T> {
    fn intern(&mut self, name: &str, value: impl FnOnce() -> T) -> Result<i16> {
        if let Some(&handle) = self.by_name.get(name) {
            return Ok(handle);
        }
        if self.entries.len() > i16::MAX as usize {
            return Err(Error::RegistryFull {
                capacity: i16::MAX as usize,
            });
        }
        let handle = self.entries.len() as i16;
        self.entries.push((name.to_string(), value()));
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    fn get(&self, handle: i16) -> Option<&(String, T)> {
        usize::try_from(handle).ok().and_then(|i| self.entries.get(i))
    }

    fn find(&self, name: &str) -> Option<i16> {
        self.by_name.get(name).copied()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.by_name.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// All side-tables of one command stream.
#[derive(Clone, Debug, Default)]
pub(crate) struct ResourceTable {
    strings: Vec<SourceText>,
    strings_by_id: HashMap<SourceId, i16>,
    fonts: NamedTable<FontFamily>,
    styles: NamedTable<Style>,
    icons: NamedTable<IconSize>,
    shaders: NamedTable<()>,
    links: NamedTable<()>,
}

impl ResourceTable {
    pub fn intern_source(&mut self, source: &SourceText) -> Result<i16> {
        if let Some(&handle) = self.strings_by_id.get(&source.id()) {
            // Same text object, possibly edited since the last layout:
            // refresh the snapshot, keep the handle.
            self.strings[handle as usize] = source.clone();
            return Ok(handle);
        }
        if self.strings.len() > i16::MAX as usize {
            return Err(Error::RegistryFull {
                capacity: i16::MAX as usize,
            });
        }
        let handle = self.strings.len() as i16;
        self.strings.push(source.clone());
        self.strings_by_id.insert(source.id(), handle);
        Ok(handle)
    }

    pub fn source(&self, handle: i16) -> Option<&SourceText> {
        usize::try_from(handle).ok().and_then(|i| self.strings.get(i))
    }

    pub fn intern_font(&mut self, name: &str, family: &FontFamily) -> Result<i16> {
        self.fonts.intern(name, || family.clone())
    }

    pub fn font(&self, handle: i16) -> Option<&FontFamily> {
        self.fonts.get(handle).map(|(_, f)| f)
    }

    pub fn font_handle(&self, name: &str) -> Option<i16> {
        self.fonts.find(name)
    }

    pub fn intern_style(&mut self, name: &str, style: &Style) -> Result<i16> {
        self.styles.intern(name, || style.clone())
    }

    pub fn style(&self, handle: i16) -> Option<&Style> {
        self.styles.get(handle).map(|(_, s)| s)
    }

    pub fn style_handle(&self, name: &str) -> Option<i16> {
        self.styles.find(name)
    }

    pub fn intern_icon(&mut self, name: &str, size: IconSize) -> Result<i16> {
        self.icons.intern(name, || size)
    }

    pub fn icon(&self, handle: i16) -> Option<(&str, IconSize)> {
        self.icons.get(handle).map(|(name, size)| (name.as_str(), *size))
    }

    pub fn intern_shader(&mut self, name: &str) -> Result<i16> {
        self.shaders.intern(name, || ())
    }

    pub fn shader_name(&self, handle: i16) -> Option<&str> {
        self.shaders.get(handle).map(|(name, ())| name.as_str())
    }

    pub fn intern_link(&mut self, target: &str) -> Result<i16> {
        self.links.intern(target, || ())
    }

    pub fn link_target(&self, handle: i16) -> Option<&str> {
        self.links.get(handle).map(|(name, ())| name.as_str())
    }

    pub fn clear(&mut self) {
        self.strings.clear();
        self.strings_by_id.clear();
        self.fonts.clear();
        self.styles.clear();
        self.icons.clear();
        self.shaders.clear();
        self.links.clear();
    }

    #[cfg(test)]
    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }
}
