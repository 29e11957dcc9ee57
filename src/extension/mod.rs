//! Match and target extensions.
//!
//! An extension contributes its own long options, parses them into a
//! private data block and serializes that block into the compiled rule.
//! Extensions are registered once in an [`ExtensionRegistry`]; every
//! rule parse creates fresh [`ExtensionInstance`]s so nothing carries
//! over between invocations.

pub mod classify;
pub mod mangle;
mod registry;
pub mod standard;

pub use registry::ExtensionRegistry;

use std::fmt;
use std::sync::Arc;

use crate::address::Resolver;
use crate::rule_spec::{ArpSpec, RuleSpec};
use crate::Result;

/// Whether an extension contributes match criteria or an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtensionKind {
    Match,
    Target,
}

impl ExtensionKind {
    /// Name used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionKind::Match => "match",
            ExtensionKind::Target => "target",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A long option declared by an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtOption {
    /// Long name without the leading `--`
    pub name: &'static str,
    /// Whether the option takes an argument
    pub has_arg: bool,
    /// Extension-local code, below the namespace window size
    pub code: u32,
}

impl ExtOption {
    /// An option that requires an argument.
    pub const fn with_arg(name: &'static str, code: u32) -> Self {
        Self {
            name,
            has_arg: true,
            code,
        }
    }
}

/// One option occurrence forwarded to an extension.
pub struct OptionCall<'a> {
    /// Extension-local option code
    pub code: u32,
    /// Option argument, if the option takes one
    pub arg: Option<&'a str>,
    /// Whether a `!` preceded the option or its argument
    pub invert: bool,
    /// Name services for options that take addresses
    pub resolver: &'a dyn Resolver,
}

impl OptionCall<'_> {
    /// The argument, or an empty string for flag options.
    pub fn arg(&self) -> &str {
        self.arg.unwrap_or("")
    }
}

/// Extension defines the registration-time contract of a match or
/// target plug-in.
pub trait Extension: Send + Sync {
    /// Name used with `-j` or `-m`.
    fn name(&self) -> &str;

    /// Release the extension was built for.
    ///
    /// Registration fails unless this equals the crate version.
    fn version(&self) -> &str {
        crate::VERSION
    }

    /// Revision written into the block header.
    fn revision(&self) -> u8 {
        0
    }

    /// Size in bytes of the private data block; a multiple of
    /// [`crate::compiler::ALIGN`].
    fn size(&self) -> usize;

    /// Leading bytes of the data block that identify a rule when
    /// deleting by content.
    fn userspace_size(&self) -> usize {
        self.size()
    }

    /// Long options contributed to the parser.
    fn options(&self) -> &[ExtOption];

    /// Create zeroed per-rule data.
    ///
    /// # Arguments
    /// * `label` - Name written into the block header (the `-j`
    ///   argument for targets)
    fn init(&self, label: &str) -> Box<dyn ExtensionData>;

    /// Render a compiled data block in command-line form.
    ///
    /// # Returns
    /// Option text with a trailing space per option, or an empty string.
    fn print(&self, _data: &[u8], _arp: &ArpSpec, _numeric: bool) -> String {
        String::new()
    }
}

/// Per-rule private state of an extension.
pub trait ExtensionData: Send + fmt::Debug {
    /// Parse one of the extension's options.
    ///
    /// # Returns
    /// `Ok(false)` when the code is not one of this extension's options.
    fn parse(&mut self, call: &OptionCall<'_>, flags: &mut u32, spec: &mut RuleSpec) -> Result<bool>;

    /// Cross-option validation once every argument was consumed.
    fn finalize(&self, _flags: u32) -> Result<()> {
        Ok(())
    }

    /// Serialize into `out`, which is exactly [`Extension::size`] bytes
    /// and zero-filled.
    fn encode(&self, out: &mut [u8]);
}

/// An extension in use by one rule parse.
pub struct ExtensionInstance {
    extension: Arc<dyn Extension>,
    label: String,
    data: Box<dyn ExtensionData>,
    flags: u32,
}

impl ExtensionInstance {
    /// Initialize fresh data for `extension`.
    pub fn new(extension: Arc<dyn Extension>, label: &str) -> Self {
        let data = extension.init(label);
        Self {
            extension,
            label: label.to_string(),
            data,
            flags: 0,
        }
    }

    /// The registered extension.
    pub fn extension(&self) -> &Arc<dyn Extension> {
        &self.extension
    }

    /// Extension name.
    pub fn name(&self) -> &str {
        self.extension.name()
    }

    /// Name written into the block header.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Extension-private option flags collected so far.
    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Forward an option to the extension.
    pub fn parse(&mut self, call: &OptionCall<'_>, spec: &mut RuleSpec) -> Result<bool> {
        self.data.parse(call, &mut self.flags, spec)
    }

    /// Run the extension's final check.
    pub fn finalize(&self) -> Result<()> {
        self.data.finalize(self.flags)
    }

    /// Serialize the data block.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.extension.size()];
        self.data.encode(&mut out);
        out
    }
}

impl fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("name", &self.extension.name())
            .field("label", &self.label)
            .field("flags", &self.flags)
            .field("data", &self.data)
            .finish()
    }
}
