//! Table engines: where compiled rules are stored.
//!
//! The command dispatcher only talks to a [`TableEngine`]. The crate
//! ships an in-process [`MemoryEngine`], optionally persisted to a
//! snapshot file, and [`SharedEngine`] for hosts that share one engine
//! between threads.

mod memory;
pub mod snapshot;
mod shared;

pub use memory::MemoryEngine;
pub use shared::SharedEngine;

use crate::compiler::CompiledRule;
use crate::error::EngineError;
use crate::rule_spec::Counters;

/// Result of a single table engine operation.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Built-in chains of the `filter` table, in listing order.
pub const FILTER_CHAINS: [&str; 3] = ["INPUT", "OUTPUT", "FORWARD"];

/// Policy and counters of a built-in chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPolicy {
    pub policy: String,
    pub counters: Counters,
}

/// Storage and query interface of a rule table.
///
/// Rule positions are 0-based. Operations that modify the table take
/// effect in the engine right away; [`TableEngine::commit`] makes them
/// durable.
pub trait TableEngine {
    /// Name of the table this engine manages.
    fn table(&self) -> &str;

    /// All chains, built-ins first.
    fn chains(&self) -> Vec<String>;

    /// Whether `name` is an existing chain.
    fn is_chain(&self, name: &str) -> bool;

    /// Whether `chain` is a built-in chain.
    fn is_builtin(&self, chain: &str) -> bool;

    /// Rules of a chain in evaluation order.
    fn rules(&self, chain: &str) -> EngineResult<Vec<CompiledRule>>;

    /// Policy of a built-in chain; `None` for user-defined chains.
    fn policy(&self, chain: &str) -> EngineResult<Option<ChainPolicy>>;

    /// Number of rules jumping to `chain`.
    fn references(&self, chain: &str) -> EngineResult<u32>;

    fn set_policy(&mut self, chain: &str, policy: &str) -> EngineResult<()>;

    fn append(&mut self, chain: &str, rule: &CompiledRule) -> EngineResult<()>;

    /// Insert so the rule ends up at `index`.
    fn insert(&mut self, chain: &str, rule: &CompiledRule, index: u32) -> EngineResult<()>;

    fn replace(&mut self, chain: &str, rule: &CompiledRule, index: u32) -> EngineResult<()>;

    /// Delete the first rule equal to `rule` under `mask`.
    fn delete(&mut self, chain: &str, rule: &CompiledRule, mask: &[u8]) -> EngineResult<()>;

    fn delete_num(&mut self, chain: &str, index: u32) -> EngineResult<()>;

    /// Succeed when a rule equal to `rule` under `mask` exists.
    fn check(&self, chain: &str, rule: &CompiledRule, mask: &[u8]) -> EngineResult<()>;

    fn create_chain(&mut self, chain: &str) -> EngineResult<()>;

    /// Delete an empty, unreferenced user-defined chain.
    fn delete_chain(&mut self, chain: &str) -> EngineResult<()>;

    /// Rename a user-defined chain, moving every jump to it.
    fn rename_chain(&mut self, old: &str, new: &str) -> EngineResult<()>;

    fn flush(&mut self, chain: &str) -> EngineResult<()>;

    /// Reset rule and policy counters of a chain.
    fn zero(&mut self, chain: &str) -> EngineResult<()>;

    /// Make all changes durable.
    fn commit(&mut self) -> crate::Result<()>;
}
