//! Execution of parsed commands against a table engine.

use std::net::Ipv4Addr;

use crate::address::HostSpec;
use crate::command::{Command, CommandSet};
use crate::compiler::{CompiledRule, RuleCompiler};
use crate::engine::{EngineResult, TableEngine};
use crate::error::{EngineError, Error, Result};
use crate::extension::{ExtensionInstance, ExtensionRegistry};
use crate::parser::ParsedCommand;
use crate::print::{format_rule, ListFormat, Listing};

/// What a dispatched command did.
#[derive(Debug)]
pub struct Outcome {
    /// False when any table engine call failed
    pub success: bool,
    /// Failures in the order they happened
    pub errors: Vec<EngineError>,
    /// Output of `-L`
    pub listing: Option<Listing>,
}

impl Outcome {
    fn new() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            listing: None,
        }
    }

    fn record(&mut self, result: EngineResult<()>) {
        if let Err(err) = result {
            log::debug!("table engine call failed: {}", err);
            self.success = false;
            self.errors.push(err);
        }
    }
}

/// Maps parsed commands onto table engine operations.
pub struct CommandDispatcher<'a> {
    registry: &'a ExtensionRegistry,
}

impl<'a> CommandDispatcher<'a> {
    pub fn new(registry: &'a ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Run one command.
    ///
    /// Parameter problems and an unusable table abort with `Err` before
    /// the engine is touched. Failures of individual engine calls are
    /// collected in the returned [`Outcome`] and do not stop the
    /// remaining calls.
    pub fn dispatch<E: TableEngine + ?Sized>(
        &self,
        mut cmd: ParsedCommand,
        engine: &mut E,
    ) -> Result<Outcome> {
        if let Some(table) = &cmd.table {
            if table != engine.table() {
                return Err(Error::Version(format!(
                    "can't initialize arptables table `{}': Table does not exist (do you need to insmod?)",
                    table
                )));
            }
        }

        let verbose = cmd.verbose > 0;
        let mut outcome = Outcome::new();

        if cmd.commands == CommandSet::LIST | CommandSet::ZERO {
            outcome.listing = Some(self.list(&cmd, engine)?);
            self.for_chains(engine, cmd.chain.as_deref(), true, verbose, "Zeroing", &mut outcome, |e, c| e.zero(c));
            return Ok(self.finish(&cmd, engine, outcome));
        }

        let command = cmd
            .commands
            .single()
            .ok_or_else(|| Error::param("no command specified"))?;

        if command.takes_rule() {
            let rule = self.compile(&mut cmd, engine)?;
            self.run_rule_command(command, &cmd, &rule, engine, &mut outcome)?;
            return Ok(self.finish(&cmd, engine, outcome));
        }

        match command {
            Command::DeleteByNumber => {
                let chain = required_chain(&cmd)?;
                outcome.record(engine.delete_num(chain, cmd.rulenum.saturating_sub(1)));
            }
            Command::List => {
                outcome.listing = Some(self.list(&cmd, engine)?);
            }
            Command::Flush => {
                self.for_chains(engine, cmd.chain.as_deref(), true, verbose, "Flushing", &mut outcome, |e, c| e.flush(c));
            }
            Command::Zero => {
                self.for_chains(engine, cmd.chain.as_deref(), true, verbose, "Zeroing", &mut outcome, |e, c| e.zero(c));
            }
            Command::NewChain => {
                outcome.record(engine.create_chain(required_chain(&cmd)?));
            }
            Command::DeleteChain => {
                self.for_chains(engine, cmd.chain.as_deref(), false, verbose, "Deleting", &mut outcome, |e, c| e.delete_chain(c));
            }
            Command::RenameChain => {
                let new_name = cmd
                    .new_name
                    .as_deref()
                    .ok_or_else(|| Error::param("-E requires old-chain-name and new-chain-name"))?;
                outcome.record(engine.rename_chain(required_chain(&cmd)?, new_name));
            }
            Command::SetPolicy => {
                let policy = cmd
                    .policy
                    .as_deref()
                    .ok_or_else(|| Error::param("-P requires a chain and a policy"))?;
                outcome.record(engine.set_policy(required_chain(&cmd)?, policy));
            }
            _ => return Err(Error::param(format!("unhandled command {}", command))),
        }

        Ok(self.finish(&cmd, engine, outcome))
    }

    /// Pick the target and compile the rule template.
    fn compile<E: TableEngine + ?Sized>(&self, cmd: &mut ParsedCommand, engine: &E) -> Result<CompiledRule> {
        let jumps_to_chain = engine.is_chain(&cmd.jumpto);
        let mut target = cmd.target.take();

        if target.is_some() && jumps_to_chain {
            log::warn!("using chain {}, not extension", cmd.jumpto);
            target = None;
        }

        let target = match target {
            Some(target) => target,
            None if cmd.jumpto.is_empty() || jumps_to_chain => {
                let ext = self
                    .registry
                    .standard_target()
                    .ok_or_else(|| Error::param("Couldn't find target `standard'"))?;
                ExtensionInstance::new(ext, &cmd.jumpto)
            }
            None => {
                return Err(Error::param(format!("Couldn't find target `{}'", cmd.jumpto)));
            }
        };

        RuleCompiler::new(self.registry).compile(&cmd.spec, &cmd.matches, &target)
    }

    fn run_rule_command<E: TableEngine + ?Sized>(
        &self,
        command: Command,
        cmd: &ParsedCommand,
        rule: &CompiledRule,
        engine: &mut E,
        outcome: &mut Outcome,
    ) -> Result<()> {
        let chain = required_chain(cmd)?;
        let srcs = addresses(cmd.src.as_ref());
        let dsts = addresses(cmd.dst.as_ref());
        let index = cmd.rulenum.saturating_sub(1);

        if command == Command::Replace {
            if srcs.len() != 1 || dsts.len() != 1 {
                return Err(Error::param("Replacement rule does not specify a unique address"));
            }
            let rule = rule.with_addresses(srcs[0], dsts[0]);
            self.echo(cmd, &rule, engine)?;
            outcome.record(engine.replace(chain, &rule, index));
            return Ok(());
        }

        let mask = rule.delete_mask().to_vec();
        for &src in &srcs {
            for &dst in &dsts {
                let expanded = rule.with_addresses(src, dst);
                self.echo(cmd, &expanded, engine)?;
                let result = match command {
                    Command::Append => engine.append(chain, &expanded),
                    Command::Insert => engine.insert(chain, &expanded, index),
                    Command::Delete => engine.delete(chain, &expanded, &mask),
                    Command::Check => engine.check(chain, &expanded, &mask),
                    _ => return Err(Error::param(format!("unhandled command {}", command))),
                };
                outcome.record(result);
            }
        }
        Ok(())
    }

    /// Log a rule about to be sent to the engine in verbose mode.
    fn echo<E: TableEngine + ?Sized>(&self, cmd: &ParsedCommand, rule: &CompiledRule, engine: &E) -> Result<()> {
        if cmd.verbose > 0 {
            let is_chain = |label: &str| engine.is_chain(label);
            let line = format_rule(rule, self.registry, &is_chain, ListFormat::rule_line(), 0)?;
            log::info!("{}", line);
        }
        Ok(())
    }

    fn list<E: TableEngine + ?Sized>(&self, cmd: &ParsedCommand, engine: &E) -> Result<Listing> {
        let format = ListFormat::listing(cmd.verbose > 0, cmd.numeric(), cmd.exact, cmd.line_numbers());
        Listing::collect(engine, self.registry, cmd.chain.as_deref(), format)
    }

    /// Apply `op` to `chain`, or to every chain when none was named.
    #[allow(clippy::too_many_arguments)]
    fn for_chains<E: TableEngine + ?Sized>(
        &self,
        engine: &mut E,
        chain: Option<&str>,
        builtins_too: bool,
        verbose: bool,
        action: &str,
        outcome: &mut Outcome,
        mut op: impl FnMut(&mut E, &str) -> EngineResult<()>,
    ) {
        let chains = match chain {
            Some(chain) => vec![chain.to_string()],
            None => engine
                .chains()
                .into_iter()
                .filter(|c| builtins_too || !engine.is_builtin(c))
                .collect(),
        };
        for chain in chains {
            if verbose {
                log::info!("{} chain `{}'", action, chain);
            }
            outcome.record(op(engine, &chain));
        }
    }

    fn finish<E: TableEngine + ?Sized>(&self, cmd: &ParsedCommand, engine: &E, outcome: Outcome) -> Outcome {
        if cmd.verbose > 1 && log::log_enabled!(log::Level::Debug) {
            let format = ListFormat::listing(true, true, true, false);
            match Listing::collect(engine, self.registry, None, format) {
                Ok(listing) => log::debug!("table `{}' now holds:\n{}", engine.table(), listing),
                Err(err) => log::debug!("could not dump table `{}': {}", engine.table(), err),
            }
        }
        outcome
    }
}

fn required_chain(cmd: &ParsedCommand) -> Result<&str> {
    cmd.chain
        .as_deref()
        .ok_or_else(|| Error::param("no chain specified"))
}

fn addresses(spec: Option<&HostSpec>) -> Vec<Ipv4Addr> {
    match spec {
        Some(spec) if !spec.addrs.is_empty() => spec.addrs.clone(),
        _ => vec![Ipv4Addr::UNSPECIFIED],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::StaticResolver;
    use crate::engine::MemoryEngine;
    use crate::parser::{Invocation, RuleSpecParser};

    fn run(engine: &mut MemoryEngine, args: &[&str]) -> Result<Outcome> {
        let registry = ExtensionRegistry::with_builtins().unwrap();
        let resolver = StaticResolver::new()
            .with_host("pair", &[Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);
        let mut parser = RuleSpecParser::new(&registry, &resolver);
        let cmd = match parser.parse(args)? {
            Invocation::Command(cmd) => cmd,
            other => panic!("not a command: {:?}", other),
        };
        CommandDispatcher::new(&registry).dispatch(cmd, engine)
    }

    #[test]
    fn test_append_expands_addresses() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        let outcome = run(&mut engine, &["-A", "INPUT", "-s", "pair", "-j", "DROP"]).unwrap();
        assert!(outcome.success);
        let rules = engine.rules("INPUT").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].addresses().0, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(rules[1].addresses().0, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn test_unknown_target() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        let err = run(&mut engine, &["-A", "INPUT", "-j", "nowhere"]).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find target `nowhere'");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_jump_to_user_chain() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        run(&mut engine, &["-N", "mine"]).unwrap();
        run(&mut engine, &["-A", "INPUT", "-j", "mine"]).unwrap();
        assert_eq!(engine.rules("INPUT").unwrap()[0].target_label(), "mine");
        assert_eq!(engine.references("mine").unwrap(), 1);
    }

    #[test]
    fn test_chain_named_like_target_wins() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        engine.create_chain("CLASSIFY").unwrap();
        let outcome = run(&mut engine, &["-A", "INPUT", "-j", "CLASSIFY", "--set-class", "1:1"]).unwrap();
        assert!(outcome.success);
        let rule = &engine.rules("INPUT").unwrap()[0];
        assert_eq!(rule.target_label(), "CLASSIFY");
        // Standard jump verdict, not the class handle
        assert_eq!(
            crate::extension::standard::decode_verdict(rule.target_data()),
            Some(crate::extension::standard::VERDICT_JUMP)
        );
    }

    #[test]
    fn test_failures_are_collected() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        let outcome = run(&mut engine, &["-D", "INPUT", "-s", "pair"]).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.errors, vec![EngineError::NoMatchingRule; 2]);
    }

    #[test]
    fn test_delete_chain_skips_builtins() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        run(&mut engine, &["-N", "a"]).unwrap();
        run(&mut engine, &["-N", "b"]).unwrap();
        let outcome = run(&mut engine, &["-X"]).unwrap();
        assert!(outcome.success);
        assert_eq!(engine.chains(), vec!["INPUT", "OUTPUT", "FORWARD"]);
    }

    #[test]
    fn test_list_and_zero() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        run(&mut engine, &["-A", "INPUT", "-c", "5", "100"]).unwrap();
        let outcome = run(&mut engine, &["-L", "INPUT", "-Z", "-v", "-x"]).unwrap();
        let listing = outcome.listing.unwrap();
        assert!(listing.chains()[0].rules[0].contains("pcnt=       5"));
        assert_eq!(
            engine.rules("INPUT").unwrap()[0].counters(),
            crate::rule_spec::Counters::default()
        );
    }

    #[test]
    fn test_table_mismatch() {
        let mut engine = MemoryEngine::new("filter").unwrap();
        let err = run(&mut engine, &["-t", "nat", "-L"]).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
