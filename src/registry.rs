//! Caller-owned registries: named resources and custom commands.
//!
//! Nothing here is global. A [`ResourceRegistry`] travels into layout calls
//! and a [`CommandRegistry`] into parse calls, so tests and embedders can
//! compose independent registration sets.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::font::FontFamily;
use crate::style::Style;

/// Display size of a registered icon, in layout units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IconSize {
    pub width: i16,
    pub height: i16,
}

impl IconSize {
    #[must_use]
    pub const fn new(width: i16, height: i16) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct IconEntry {
    /// Configured size; `None` means the icon takes its native size, a
    /// line-height square of the active font.
    pub size: Option<IconSize>,
}

/// Named resources the layout engine resolves markup against.
///
/// Later registrations under the same name replace earlier ones.
#[derive(Clone, Debug, Default)]
pub struct ResourceRegistry {
    fonts: HashMap<String, FontFamily>,
    styles: HashMap<String, Style>,
    icons: HashMap<String, IconEntry>,
    shaders: HashMap<String, ()>,
}

impl ResourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a font family under a name.
    pub fn register_font(&mut self, name: impl Into<String>, family: FontFamily) {
        self.fonts.insert(name.into(), family);
    }

    /// Look up a font family.
    #[must_use]
    pub fn font(&self, name: &str) -> Option<&FontFamily> {
        self.fonts.get(name)
    }

    /// Register a preset style under a name.
    pub fn register_style(&mut self, name: impl Into<String>, style: Style) {
        self.styles.insert(name.into(), style);
    }

    /// Look up a preset style.
    #[must_use]
    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// Register an icon. `size` of `None` means native size (a line-height
    /// square of the font active where the icon appears).
    pub fn register_icon(&mut self, name: impl Into<String>, size: Option<IconSize>) {
        self.icons.insert(name.into(), IconEntry { size });
    }

    /// Look up an icon's configured size. Outer `None`: not registered.
    pub(crate) fn icon(&self, name: &str) -> Option<&IconEntry> {
        self.icons.get(name)
    }

    /// Check whether an icon is registered.
    #[must_use]
    pub fn has_icon(&self, name: &str) -> bool {
        self.icons.contains_key(name)
    }

    /// Register a glyph shader name. The crate treats shaders as opaque;
    /// the renderer maps interned names back to programs.
    pub fn register_glyph_shader(&mut self, name: impl Into<String>) {
        self.shaders.insert(name.into(), ());
    }

    /// Check whether a glyph shader is registered.
    #[must_use]
    pub fn has_glyph_shader(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }
}

/// Number of built-in semantic token kinds. Custom command ids share one
/// byte of tag space with them.
pub const BUILTIN_KIND_COUNT: usize = 15;

/// Maximum number of registrable custom commands.
pub const CUSTOM_COMMAND_CAPACITY: usize = 255 - BUILTIN_KIND_COUNT;

/// Registry of user-defined `|name|` / `|name:value|` commands.
///
/// Ids are assigned sequentially from zero. Registering a name twice
/// returns the existing id.
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    names: Vec<String>,
    by_name: HashMap<String, u8>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command name, returning its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistryFull`] once [`CUSTOM_COMMAND_CAPACITY`]
    /// distinct names are registered.
    pub fn register(&mut self, name: &str) -> Result<u8> {
        if let Some(&id) = self.by_name.get(name) {
            return Ok(id);
        }
        if self.names.len() >= CUSTOM_COMMAND_CAPACITY {
            return Err(Error::RegistryFull {
                capacity: CUSTOM_COMMAND_CAPACITY,
            });
        }
        let id = self.names.len() as u8;
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Id for a registered name.
    #[must_use]
    pub fn id(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    /// Name for a registered id.
    #[must_use]
    pub fn name(&self, id: u8) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
