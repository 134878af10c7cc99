//! Run-at-startup registration
//!
//! The OS keeps a single named value under the current user's run-on-login
//! key, holding the quoted path of the executable. Registration counts as
//! enabled when that value mentions the current executable path
//! (case-insensitive), so a stale entry left by a moved install reads as
//! disabled.

use crate::error::RegistryError;
use std::path::{Path, PathBuf};

/// Name of the value under the run key
pub const RUN_VALUE_NAME: &str = "ClipboardImageLogger";

/// Access to the run-on-login registration point
pub trait RunKeyStore {
    /// Read a string value, `Ok(None)` when absent
    fn read(&self, name: &str) -> Result<Option<String>, RegistryError>;
    fn write(&mut self, name: &str, value: &str) -> Result<(), RegistryError>;
    /// Removing an absent value is not an error
    fn delete(&mut self, name: &str) -> Result<(), RegistryError>;
}

/// Which side wins when the stored setting and the OS registration disagree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileDirection {
    /// The OS registration is the truth; the setting is corrected to match
    AdoptSystem,
    /// The stored setting is the truth; the registration is rewritten to match
    PushSetting,
}

pub struct Autostart<S: RunKeyStore> {
    store: S,
    executable: PathBuf,
}

impl<S: RunKeyStore> Autostart<S> {
    pub fn new(store: S, executable: impl Into<PathBuf>) -> Self {
        Self {
            store,
            executable: executable.into(),
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Whether the OS will launch this executable on login
    pub fn is_enabled(&self) -> bool {
        let value = match self.store.read(RUN_VALUE_NAME) {
            Ok(Some(value)) => value,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("Could not read autostart registration: {}", e);
                return false;
            }
        };

        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            return false;
        }

        let exe = self.executable.to_string_lossy().to_lowercase();
        value.to_lowercase().contains(&exe)
    }

    /// Write or remove the registration. Failures are logged and swallowed.
    pub fn set_enabled(&mut self, enable: bool) {
        let result = if enable {
            let value = format!("\"{}\"", self.executable.display());
            self.store.write(RUN_VALUE_NAME, &value)
        } else {
            self.store.delete(RUN_VALUE_NAME)
        };

        match result {
            Ok(()) => tracing::info!(
                "Autostart registration {}",
                if enable { "written" } else { "removed" }
            ),
            Err(e) => tracing::warn!("Autostart registration not updated: {}", e),
        }
    }

    /// Apply a user toggle and report the state the OS actually ended up in
    pub fn apply_toggle(&mut self, enable: bool) -> bool {
        self.set_enabled(enable);
        self.is_enabled()
    }

    /// Bring the stored setting and the OS registration into agreement.
    /// Returns the value the setting should hold afterwards.
    pub fn reconcile(&mut self, stored: bool, direction: ReconcileDirection) -> bool {
        match direction {
            ReconcileDirection::AdoptSystem => {
                let actual = self.is_enabled();
                if actual != stored {
                    tracing::info!(
                        "Run at startup setting was {}, registration says {}; adopting registration",
                        stored,
                        actual
                    );
                }
                actual
            }
            ReconcileDirection::PushSetting => {
                self.set_enabled(stored);
                stored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryRunKey {
        values: HashMap<String, String>,
        read_only: bool,
    }

    impl RunKeyStore for MemoryRunKey {
        fn read(&self, name: &str) -> Result<Option<String>, RegistryError> {
            Ok(self.values.get(name).cloned())
        }

        fn write(&mut self, name: &str, value: &str) -> Result<(), RegistryError> {
            if self.read_only {
                return Err(RegistryError::Write(5));
            }
            self.values.insert(name.to_string(), value.to_string());
            Ok(())
        }

        fn delete(&mut self, name: &str) -> Result<(), RegistryError> {
            if self.read_only {
                return Err(RegistryError::Delete(5));
            }
            self.values.remove(name);
            Ok(())
        }
    }

    const EXE: &str = r"C:\Tools\ClipboardImageLogger\clipboard_image_logger.exe";

    #[test]
    fn test_enable_writes_quoted_path() {
        let mut autostart = Autostart::new(MemoryRunKey::default(), EXE);
        assert!(!autostart.is_enabled());

        assert!(autostart.apply_toggle(true));
        assert_eq!(
            autostart.store.values.get(RUN_VALUE_NAME).unwrap(),
            &format!("\"{}\"", EXE)
        );

        assert!(!autostart.apply_toggle(false));
        assert!(autostart.store.values.is_empty());
    }

    #[test]
    fn test_path_match_is_case_insensitive() {
        let mut store = MemoryRunKey::default();
        store.values.insert(
            RUN_VALUE_NAME.to_string(),
            format!("  \"{}\" ", EXE.to_uppercase()),
        );
        let autostart = Autostart::new(store, EXE);
        assert!(autostart.is_enabled());
    }

    #[test]
    fn test_entry_for_other_path_is_disabled() {
        let mut store = MemoryRunKey::default();
        store.values.insert(
            RUN_VALUE_NAME.to_string(),
            r#""D:\old\clipboard_image_logger.exe""#.to_string(),
        );
        let autostart = Autostart::new(store, EXE);
        assert!(!autostart.is_enabled());
    }

    #[test]
    fn test_toggle_reports_actual_state_on_failure() {
        let store = MemoryRunKey {
            read_only: true,
            ..Default::default()
        };
        let mut autostart = Autostart::new(store, EXE);
        assert!(!autostart.apply_toggle(true));
    }

    #[test]
    fn test_adopt_system_does_not_recreate_removed_entry() {
        let mut autostart = Autostart::new(MemoryRunKey::default(), EXE);
        let setting = autostart.reconcile(true, ReconcileDirection::AdoptSystem);
        assert!(!setting);
        assert!(autostart.store.values.is_empty());
    }

    #[test]
    fn test_push_setting_rewrites_registration() {
        let mut autostart = Autostart::new(MemoryRunKey::default(), EXE);
        assert!(autostart.reconcile(true, ReconcileDirection::PushSetting));
        assert!(autostart.is_enabled());

        assert!(!autostart.reconcile(false, ReconcileDirection::PushSetting));
        assert!(!autostart.is_enabled());
    }
}
