//! arprule - compiler for arptables-style ARP filtering rules.
//!
//! This crate turns command lines such as
//! `-A INPUT -s 10.0.0.0/8 --opcode Request -j DROP` into binary rule
//! records and applies them to a rule table.
//!
//! # Pipeline
//!
//! 1. [`RuleSpecParser`] scans the arguments, checks them against the
//!    command/option [`LegalityMatrix`] and resolves host names, MAC
//!    addresses and header fields into a [`RuleSpec`].
//! 2. [`RuleCompiler`] lays the rule out as one record: a fixed entry
//!    header, match blocks and a target block.
//! 3. [`CommandDispatcher`] runs the command against a [`TableEngine`],
//!    expanding the record once per source/destination address pair.
//!
//! # Quick Start
//!
//! ```ignore
//! use arprule::{
//!     CommandDispatcher, ExtensionRegistry, Invocation, MemoryEngine, RuleSpecParser,
//!     SystemResolver,
//! };
//!
//! let registry = ExtensionRegistry::with_builtins()?;
//! let resolver = SystemResolver::new();
//! let mut engine = MemoryEngine::new("filter")?;
//!
//! let mut parser = RuleSpecParser::new(&registry, &resolver);
//! if let Invocation::Command(cmd) = parser.parse(&["-A", "INPUT", "-j", "DROP"])? {
//!     let outcome = CommandDispatcher::new(&registry).dispatch(cmd, &mut engine)?;
//!     assert!(outcome.success);
//! }
//! ```
//!
//! # Extensions
//!
//! Targets and matches implement [`extension::Extension`]. The crate
//! ships the `standard` verdict target (`ACCEPT`, `DROP`, `QUEUE`,
//! `RETURN` and chain jumps), `mangle` and `CLASSIFY`.

mod error;

pub mod address;
pub mod command;
pub mod compiler;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod extension;
pub mod legality;
pub mod namespace;
pub mod options;
pub mod parser;
pub mod print;
pub mod rule_spec;

/// Crate release; extensions must be built for the same one.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export core types
pub use error::{EngineError, Error, RegistrationError, Result};

pub use address::{Resolver, StaticResolver, SystemResolver};
pub use command::{Command, CommandSet};
pub use compiler::{CompiledRule, RuleCompiler};
pub use config::Config;
pub use dispatch::{CommandDispatcher, Outcome};
pub use engine::{MemoryEngine, SharedEngine, TableEngine};
pub use extension::ExtensionRegistry;
pub use legality::LegalityMatrix;
pub use parser::{Invocation, ParsedCommand, RuleSpecParser};
pub use print::{help_text, ListFormat, Listing};
pub use rule_spec::RuleSpec;
