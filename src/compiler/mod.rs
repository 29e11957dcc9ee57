//! Compilation of parsed rules into binary records.
//!
//! - [`format`]: record layout and header codecs
//! - [`builder`]: block-by-block record assembly
//! - [`reader`]: record decoding

mod builder;
pub mod format;
mod reader;


pub use builder::{CompiledRule, RecordOffsets, RuleBuilder};
pub use format::{align, BlockHeader, EntryHeader, ALIGN, BLOCK_HEADER_SIZE, ENTRY_SIZE};
pub use reader::{records, BlockView, RuleView};

use crate::extension::{ExtensionInstance, ExtensionRegistry};
use crate::rule_spec::RuleSpec;
use crate::Result;

/// Assembles a rule specification and its extensions into one record.
pub struct RuleCompiler<'a> {
    registry: &'a ExtensionRegistry,
}

impl<'a> RuleCompiler<'a> {
    /// Create a compiler ordering matches by `registry`.
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Compile `spec` with the used matches and the target.
    ///
    /// Match blocks are laid out in registration order regardless of
    /// the order they appeared on the command line.
    pub fn compile(
        &self,
        spec: &RuleSpec,
        matches: &[ExtensionInstance],
        target: &ExtensionInstance,
    ) -> Result<CompiledRule> {
        let mut ordered: Vec<&ExtensionInstance> = matches.iter().collect();
        ordered.sort_by_key(|m| self.registry.match_order(m.name()).unwrap_or(usize::MAX));

        let mut builder = RuleBuilder::new(spec);
        for m in ordered {
            let ext = m.extension();
            builder.push_match(m.name(), ext.revision(), &m.encode(), ext.userspace_size())?;
        }

        let ext = target.extension();
        let (rule, offsets) = builder.finish(
            target.label(),
            ext.revision(),
            &target.encode(),
            ext.userspace_size(),
        )?;
        log::debug!(
            "compiled rule: target `{}' at {}, {} bytes",
            target.label(),
            offsets.target_offset,
            offsets.next_offset
        );
        Ok(rule)
    }
}
