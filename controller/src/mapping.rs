//! Gesture-to-action mapping stores.
//!
//! A mapping is a flat property list from gesture name to action name:
//!
//! ```text
//! (:v-gest move-cursor :fist drag :mid left-click :index right-click
//!  :two-finger-closed double-click :pinch-minor scroll :pinch-major volume
//!  :palm noop)
//! ```
//!
//! The file store re-reads its file on every lookup so edits apply on the
//! next frame without a restart.

use std::path::{Path, PathBuf};

use anyhow::Context;
use lexpr::Value;

use crate::control::PointerAction;
use crate::error::MappingError;
use crate::gesture::code::normalize_name;
use crate::gesture::GestureCode;
use crate::sexp::{atom_to_string, list_items};

/// Source of gesture-to-action bindings.
pub trait ActionMappingStore {
    /// Action identifier bound to `gesture`, or `None` when unmapped.
    fn action_for(&self, gesture: &str) -> Result<Option<String>, MappingError>;

    /// Short description for diagnostics.
    fn describe(&self) -> String;
}

// ── Table ──────────────────────────────────────────────────

/// Parsed mapping, in file order.  Gesture names are normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<(String, String)>,
}

impl MappingTable {
    /// Bindings shipped with the binary.
    pub fn default_table() -> Self {
        let entries = [
            (GestureCode::VGest, PointerAction::MoveCursor),
            (GestureCode::Fist, PointerAction::Drag),
            (GestureCode::Mid, PointerAction::LeftClick),
            (GestureCode::Index, PointerAction::RightClick),
            (GestureCode::TwoFingerClosed, PointerAction::DoubleClick),
            (GestureCode::PinchMinor, PointerAction::Scroll),
            (GestureCode::PinchMajor, PointerAction::Volume),
            (GestureCode::Palm, PointerAction::Noop),
        ];
        Self {
            entries: entries
                .iter()
                .map(|(g, a)| (g.as_str().to_string(), a.as_str().to_string()))
                .collect(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, MappingError> {
        let value = lexpr::from_str(text).map_err(|e| MappingError::Parse(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, MappingError> {
        let items = list_items(value)
            .ok_or_else(|| MappingError::Malformed("expected a property list".to_string()))?;
        if items.len() % 2 != 0 {
            return Err(MappingError::Malformed(format!(
                "odd number of elements ({})",
                items.len()
            )));
        }

        let mut table = Self::default();
        for pair in items.chunks(2) {
            let gesture = atom_to_string(pair[0])
                .ok_or_else(|| MappingError::Malformed(format!("bad gesture key {}", pair[0])))?;
            let action = atom_to_string(pair[1]).ok_or_else(|| {
                MappingError::Malformed(format!("bad action for {gesture}: {}", pair[1]))
            })?;
            table.insert(&gesture, &action);
        }
        Ok(table)
    }

    /// Bind `gesture` to `action`, replacing an earlier binding.
    pub fn insert(&mut self, gesture: &str, action: &str) {
        let key = normalize_name(gesture);
        match self.entries.iter_mut().find(|(g, _)| *g == key) {
            Some(entry) => entry.1 = action.to_string(),
            None => self.entries.push((key, action.to_string())),
        }
    }

    pub fn get(&self, gesture: &str) -> Option<&str> {
        let key = normalize_name(gesture);
        self.entries
            .iter()
            .find(|(g, _)| *g == key)
            .map(|(_, a)| a.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Problems with the bindings: unknown gesture names and actions the
    /// controller cannot perform.  Empty when the table is clean.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (gesture, action) in &self.entries {
            if GestureCode::from_name(gesture).is_none() {
                problems.push(format!("unknown gesture {gesture}"));
            }
            if PointerAction::from_identifier(action).is_none() {
                problems.push(format!("unknown action {action} for {gesture}"));
            }
        }
        problems
    }

    pub fn to_sexp(&self) -> String {
        let body = self
            .entries
            .iter()
            .map(|(g, a)| format!(":{g} {a}"))
            .collect::<Vec<_>>()
            .join("\n ");
        format!("({body})")
    }
}

impl ActionMappingStore for MappingTable {
    fn action_for(&self, gesture: &str) -> Result<Option<String>, MappingError> {
        Ok(self.get(gesture).map(str::to_string))
    }

    fn describe(&self) -> String {
        format!("in-memory table ({} entries)", self.len())
    }
}

// ── File store ─────────────────────────────────────────────

/// Mapping file, read fresh on every lookup.
#[derive(Debug, Clone)]
pub struct FileMappingStore {
    path: PathBuf,
}

impl FileMappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<MappingTable, MappingError> {
        let text = std::fs::read_to_string(&self.path).map_err(|source| MappingError::Io {
            path: self.path.clone(),
            source,
        })?;
        MappingTable::parse(&text)
    }

    /// Load and log every problem.  Used once at startup and by the
    /// `mapping-check` command; never fatal.
    pub fn check(&self) -> Result<Vec<String>, MappingError> {
        let table = self.load()?;
        let problems = table.validate();
        for problem in &problems {
            tracing::warn!(path = %self.path.display(), "mapping: {}", problem);
        }
        if problems.is_empty() {
            tracing::info!(path = %self.path.display(), entries = table.len(), "mapping ok");
        }
        Ok(problems)
    }

    /// Write the default bindings to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let text = format!("{}\n", MappingTable::default_table().to_sexp());
        std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote default mapping");
        Ok(())
    }
}

impl ActionMappingStore for FileMappingStore {
    fn action_for(&self, gesture: &str) -> Result<Option<String>, MappingError> {
        Ok(self.load()?.get(gesture).map(str::to_string))
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gesture-pointer-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_parse_plist() {
        let table = MappingTable::parse("(:v-gest move-cursor :fist drag)").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get("v-gest"), Some("move-cursor"));
        assert_eq!(table.get("V_GEST"), Some("move-cursor"));
        assert_eq!(table.get("fist"), Some("drag"));
        assert_eq!(table.get("palm"), None);
    }

    #[test]
    fn test_parse_legacy_names() {
        let table = MappingTable::parse("(\"V_GEST\" \"move_mouse\" \"PINCH_MAJOR\" \"handle_system_volume\")")
            .unwrap();
        assert_eq!(table.get("v-gest"), Some("move_mouse"));
        assert_eq!(table.get("pinch-major"), Some("handle_system_volume"));
        assert!(table.validate().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(MappingTable::parse("(:fist"), Err(MappingError::Parse(_))));
        assert!(matches!(
            MappingTable::parse("(:fist drag :palm)"),
            Err(MappingError::Malformed(_))
        ));
        assert!(matches!(MappingTable::parse("42"), Err(MappingError::Malformed(_))));
    }

    #[test]
    fn test_later_binding_wins() {
        let table = MappingTable::parse("(:fist drag :fist left-click)").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("fist"), Some("left-click"));
    }

    #[test]
    fn test_default_table_is_clean() {
        let table = MappingTable::default_table();
        assert!(table.validate().is_empty());
        assert_eq!(table.get("pinch-minor"), Some("scroll"));
        let reparsed = MappingTable::parse(&table.to_sexp()).unwrap();
        assert_eq!(reparsed, table);
    }

    #[test]
    fn test_validate_reports_problems() {
        let table = MappingTable::parse("(:wave drag :fist launch-rockets)").unwrap();
        let problems = table.validate();
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("wave"));
        assert!(problems[1].contains("launch-rockets"));
    }

    #[test]
    fn test_file_store_missing_file() {
        let store = FileMappingStore::new(temp_path("missing.sexp"));
        assert!(matches!(store.action_for("fist"), Err(MappingError::Io { .. })));
    }

    #[test]
    fn test_file_store_rereads() {
        let path = temp_path("reread.sexp");
        FileMappingStore::write_default(&path).unwrap();
        let store = FileMappingStore::new(&path);
        assert_eq!(store.action_for("fist").unwrap().as_deref(), Some("drag"));
        assert!(store.check().unwrap().is_empty());

        std::fs::write(&path, "(:fist left-click)").unwrap();
        assert_eq!(store.action_for("fist").unwrap().as_deref(), Some("left-click"));
        assert_eq!(store.action_for("palm").unwrap(), None);
        std::fs::remove_file(&path).unwrap();
    }
}
