//! Registry of loaded extensions.

use ahash::AHashMap;
use std::sync::Arc;

use super::classify::ClassifyTarget;
use super::mangle::MangleTarget;
use super::standard::{is_standard_label, StandardTarget, STANDARD_TARGET};
use super::{Extension, ExtensionKind};
use crate::compiler::ALIGN;
use crate::error::RegistrationError;
use crate::namespace::WINDOW_SIZE;

#[derive(Default)]
struct Table {
    list: Vec<Arc<dyn Extension>>,
    by_name: AHashMap<String, usize>,
}

impl Table {
    fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.list[i]))
    }
}

/// Maps extension names to implementations, keeping registration order.
#[derive(Default)]
pub struct ExtensionRegistry {
    targets: Table,
    matches: Table,
}

impl ExtensionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the targets shipped with the crate:
    /// `standard`, `mangle` and `CLASSIFY`.
    pub fn with_builtins() -> Result<Self, RegistrationError> {
        let mut registry = Self::new();
        registry.register_target(Arc::new(StandardTarget))?;
        registry.register_target(Arc::new(MangleTarget))?;
        registry.register_target(Arc::new(ClassifyTarget))?;
        Ok(registry)
    }

    /// Register a target extension.
    pub fn register_target(&mut self, ext: Arc<dyn Extension>) -> Result<(), RegistrationError> {
        Self::register(&mut self.targets, ExtensionKind::Target, ext)
    }

    /// Register a match extension.
    pub fn register_match(&mut self, ext: Arc<dyn Extension>) -> Result<(), RegistrationError> {
        Self::register(&mut self.matches, ExtensionKind::Match, ext)
    }

    fn register(
        table: &mut Table,
        kind: ExtensionKind,
        ext: Arc<dyn Extension>,
    ) -> Result<(), RegistrationError> {
        let name = ext.name().to_string();
        let kind_str = kind.as_str();

        if ext.version() != crate::VERSION {
            return Err(RegistrationError::VersionMismatch {
                kind: kind_str,
                name,
                found: ext.version().to_string(),
                expected: crate::VERSION.to_string(),
            });
        }
        if table.by_name.contains_key(&name) {
            return Err(RegistrationError::Duplicate { kind: kind_str, name });
        }
        if ext.size() % ALIGN != 0 || ext.userspace_size() > ext.size() {
            return Err(RegistrationError::InvalidSize {
                kind: kind_str,
                name,
                size: ext.size(),
            });
        }
        if let Some(opt) = ext.options().iter().find(|o| o.code >= WINDOW_SIZE) {
            return Err(RegistrationError::InvalidOptionCode {
                kind: kind_str,
                name,
                option: opt.name.to_string(),
                code: opt.code,
            });
        }

        log::debug!("registered {} `{}'", kind_str, name);
        table.by_name.insert(name, table.list.len());
        table.list.push(ext);
        Ok(())
    }

    /// Look up a target; the built-in verdicts resolve to `standard`.
    pub fn find_target(&self, name: &str) -> Option<Arc<dyn Extension>> {
        let name = if is_standard_label(name) {
            STANDARD_TARGET
        } else {
            name
        };
        self.targets.get(name)
    }

    /// The standard target.
    pub fn standard_target(&self) -> Option<Arc<dyn Extension>> {
        self.targets.get(STANDARD_TARGET)
    }

    /// Look up a match.
    pub fn find_match(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.matches.get(name)
    }

    /// Position of a match in registration order.
    pub fn match_order(&self, name: &str) -> Option<usize> {
        self.matches.by_name.get(name).copied()
    }

    /// Registered targets in registration order.
    pub fn targets(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.targets.list.iter()
    }

    /// Registered matches in registration order.
    pub fn matches(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.matches.list.iter()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |t: &Table| t.list.iter().map(|e| e.name().to_string()).collect::<Vec<_>>();
        f.debug_struct("ExtensionRegistry")
            .field("targets", &names(&self.targets))
            .field("matches", &names(&self.matches))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{ExtOption, ExtensionData, OptionCall};
    use crate::rule_spec::RuleSpec;

    struct Fake {
        name: &'static str,
        version: &'static str,
        size: usize,
        options: Vec<ExtOption>,
    }

    impl Fake {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                version: crate::VERSION,
                size: 8,
                options: vec![ExtOption::with_arg("fake-opt", 1)],
            }
        }
    }

    #[derive(Debug)]
    struct FakeData;

    impl ExtensionData for FakeData {
        fn parse(&mut self, _: &OptionCall<'_>, _: &mut u32, _: &mut RuleSpec) -> crate::Result<bool> {
            Ok(false)
        }
        fn encode(&self, _: &mut [u8]) {}
    }

    impl Extension for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn version(&self) -> &str {
            self.version
        }
        fn size(&self) -> usize {
            self.size
        }
        fn options(&self) -> &[ExtOption] {
            &self.options
        }
        fn init(&self, _: &str) -> Box<dyn ExtensionData> {
            Box::new(FakeData)
        }
    }

    #[test]
    fn test_builtins() {
        let registry = ExtensionRegistry::with_builtins().unwrap();
        assert_eq!(registry.find_target("ACCEPT").unwrap().name(), "standard");
        assert_eq!(registry.find_target("").unwrap().name(), "standard");
        assert_eq!(registry.find_target("mangle").unwrap().name(), "mangle");
        assert!(registry.find_target("CLASSIFY").is_some());
        assert!(registry.find_target("mychain").is_none());
        assert_eq!(registry.targets().count(), 3);
        assert_eq!(registry.matches().count(), 0);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ExtensionRegistry::new();
        registry.register_match(Arc::new(Fake::new("dup"))).unwrap();
        let err = registry.register_match(Arc::new(Fake::new("dup"))).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::Duplicate {
                kind: "match",
                name: "dup".into()
            }
        );
        // Same name under the other kind is fine
        registry.register_target(Arc::new(Fake::new("dup"))).unwrap();
    }

    #[test]
    fn test_version_mismatch() {
        let mut registry = ExtensionRegistry::new();
        let mut fake = Fake::new("old");
        fake.version = "0.0.0-old";
        let err = registry.register_target(Arc::new(fake)).unwrap_err();
        assert!(matches!(err, RegistrationError::VersionMismatch { .. }));
    }

    #[test]
    fn test_unaligned_size() {
        let mut registry = ExtensionRegistry::new();
        let mut fake = Fake::new("odd");
        fake.size = 12;
        let err = registry.register_match(Arc::new(fake)).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidSize { size: 12, .. }));
    }

    #[test]
    fn test_option_code_outside_window() {
        let mut registry = ExtensionRegistry::new();
        let mut fake = Fake::new("wide");
        fake.options = vec![ExtOption::with_arg("wide-opt", 256)];
        let err = registry.register_match(Arc::new(fake)).unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidOptionCode { code: 256, .. }));
    }

    #[test]
    fn test_match_order() {
        let mut registry = ExtensionRegistry::new();
        registry.register_match(Arc::new(Fake::new("first"))).unwrap();
        registry.register_match(Arc::new(Fake::new("second"))).unwrap();
        assert_eq!(registry.match_order("first"), Some(0));
        assert_eq!(registry.match_order("second"), Some(1));
    }
}
