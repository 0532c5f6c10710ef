//! Read and layout options
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! preserve_signed_registers = false
//! sort_all_items = true
//! in_place = false
//! verify_integrity = true
//! ```

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How sections are ordered during placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayoutPolicy {
    /// Impose a full canonical order on every sortable data section.
    pub sort_all_items: bool,

    /// Keep every section in its current (as-read) order.
    ///
    /// Only meaningful for a file read from bytes and left unmodified.
    /// Takes precedence over `sort_all_items` when both are set.
    pub in_place: bool,
}

impl LayoutPolicy {
    /// Whether data sections get sorted during placement.
    pub fn sorts(&self) -> bool {
        self.sort_all_items && !self.in_place
    }

    /// Whether class definitions get dependency-ordered during placement.
    pub fn reorders_class_defs(&self) -> bool {
        !self.in_place
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DexOptions {
    /// Remember debug-info registers that were written in the legacy signed
    /// LEB128 form and write them back the same way. Only affects decoding.
    pub preserve_signed_registers: bool,

    pub sort_all_items: bool,

    pub in_place: bool,

    /// Check the stored checksum and signature before decoding.
    pub verify_integrity: bool,
}

impl Default for DexOptions {
    fn default() -> Self {
        DexOptions {
            preserve_signed_registers: true,
            sort_all_items: false,
            in_place: false,
            verify_integrity: false,
        }
    }
}

impl DexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preserve_signed_registers(mut self, value: bool) -> Self {
        self.preserve_signed_registers = value;
        self
    }

    pub fn sort_all_items(mut self, value: bool) -> Self {
        self.sort_all_items = value;
        self
    }

    pub fn in_place(mut self, value: bool) -> Self {
        self.in_place = value;
        self
    }

    pub fn verify_integrity(mut self, value: bool) -> Self {
        self.verify_integrity = value;
        self
    }

    pub fn layout_policy(&self) -> LayoutPolicy {
        LayoutPolicy {
            sort_all_items: self.sort_all_items,
            in_place: self.in_place,
        }
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DexError;

    #[test]
    fn test_defaults() {
        let options = DexOptions::default();
        assert!(options.preserve_signed_registers);
        assert!(!options.sort_all_items);
        assert!(!options.in_place);
        assert!(!options.layout_policy().sorts());
    }

    #[test]
    fn test_in_place_wins_over_sort() {
        let policy = DexOptions::new()
            .sort_all_items(true)
            .in_place(true)
            .layout_policy();
        assert!(policy.sort_all_items);
        assert!(policy.in_place);
        assert!(!policy.sorts());
        assert!(!policy.reorders_class_defs());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let options = DexOptions::from_toml_str("sort_all_items = true").unwrap();
        assert!(options.sort_all_items);
        assert!(options.preserve_signed_registers);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            DexOptions::from_toml_str("in_place = \"yes\""),
            Err(DexError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dex.toml");
        std::fs::write(&path, "in_place = true\nverify_integrity = true\n").unwrap();
        let options = DexOptions::load(&path).unwrap();
        assert!(options.in_place);
        assert!(options.verify_integrity);
    }
}
