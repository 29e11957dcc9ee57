//! Command-line rule parser.
//!
//! [`RuleSpecParser::parse`] walks the arguments left to right, selecting
//! the command, filling a [`RuleSpec`] and handing extension options to
//! the extension that contributed them. Every call runs in a fresh
//! [`ParseSession`]: loaded extensions, their flags and the merged option
//! table never outlive one invocation.

mod scanner;

#[cfg(test)]
mod tests;

pub use scanner::{Scanner, Token};

use crate::address::{
    parse_hostnetworkmask, parse_hw_type, parse_interface, parse_length, parse_mac_option,
    parse_opcode, parse_proto_type, string_to_number, HostSpec, Resolver,
};
use crate::command::{Command, CommandSet};
use crate::error::{Error, Result};
use crate::extension::{ExtensionInstance, ExtensionRegistry, OptionCall};
use crate::legality::LegalityMatrix;
use crate::namespace::{OptionNamespace, OptionOwner};
use crate::options::{CoreOpt, InvFlags, OptionSet};
use crate::rule_spec::{DevAddr, RuleSpec};

/// Longest chain name accepted.
pub const CHAIN_NAME_MAX: usize = 30;

/// Longest target name accepted.
pub const TARGET_NAME_MAX: usize = 31;

const BUILTIN_INPUT_CHAINS: [&str; 2] = ["INPUT", "PREROUTING"];
const BUILTIN_OUTPUT_CHAINS: [&str; 2] = ["OUTPUT", "POSTROUTING"];

/// Outcome of parsing one command line.
#[derive(Debug)]
pub enum Invocation {
    /// `-h`, with the optional topic that followed it
    Help(Option<String>),
    /// `-V`; `inverted` when written as `! -V`
    Version { inverted: bool },
    /// A table command
    Command(ParsedCommand),
}

/// A fully validated command and its rule.
#[derive(Debug)]
pub struct ParsedCommand {
    /// Selected commands; two only for `-L -Z`
    pub commands: CommandSet,
    /// Core options used
    pub options: OptionSet,
    /// Table named with `-t`
    pub table: Option<String>,
    pub chain: Option<String>,
    /// 1-based rule position for `-I`, `-R` and `-D num`
    pub rulenum: u32,
    /// New name for `-E`
    pub new_name: Option<String>,
    /// Policy for `-P`
    pub policy: Option<String>,
    /// Argument of `-j`, empty when absent
    pub jumpto: String,
    /// Number of `-v` flags
    pub verbose: u32,
    /// Print exact counter values
    pub exact: bool,
    pub spec: RuleSpec,
    /// Source addresses, present for rule commands and when `-s` was given
    pub src: Option<HostSpec>,
    /// Target addresses, present for rule commands and when `-d` was given
    pub dst: Option<HostSpec>,
    /// Target extension selected with `-j`, if `-j` named one
    pub target: Option<ExtensionInstance>,
    /// Match extensions loaded with `-m`, in command-line order
    pub matches: Vec<ExtensionInstance>,
}

impl ParsedCommand {
    fn new() -> Self {
        Self {
            commands: CommandSet::empty(),
            options: OptionSet::empty(),
            table: None,
            chain: None,
            rulenum: 0,
            new_name: None,
            policy: None,
            jumpto: String::new(),
            verbose: 0,
            exact: false,
            spec: RuleSpec::new(),
            src: None,
            dst: None,
            target: None,
            matches: Vec::new(),
        }
    }

    /// Whether addresses are printed without name lookups.
    pub fn numeric(&self) -> bool {
        self.options.contains(OptionSet::NUMERIC)
    }

    /// Whether listings are prefixed with rule numbers.
    pub fn line_numbers(&self) -> bool {
        self.options.contains(OptionSet::LINE_NUMBERS)
    }
}

/// Parses command lines against a registry of extensions.
pub struct RuleSpecParser<'a> {
    registry: &'a ExtensionRegistry,
    resolver: &'a dyn Resolver,
    matrix: LegalityMatrix,
    namespace: OptionNamespace,
}

impl<'a> RuleSpecParser<'a> {
    /// Create a parser using the standard legality matrix.
    pub fn new(registry: &'a ExtensionRegistry, resolver: &'a dyn Resolver) -> Self {
        Self {
            registry,
            resolver,
            matrix: LegalityMatrix::standard(),
            namespace: OptionNamespace::new(),
        }
    }

    /// Replace the legality matrix.
    pub fn with_matrix(mut self, matrix: LegalityMatrix) -> Self {
        self.matrix = matrix;
        self
    }

    /// Parse one command line (without the program name).
    pub fn parse<S: AsRef<str>>(&mut self, args: &[S]) -> Result<Invocation> {
        let args: Vec<String> = args.iter().map(|a| a.as_ref().to_string()).collect();
        self.namespace.reset();

        let session = ParseSession {
            registry: self.registry,
            resolver: self.resolver,
            matrix: &self.matrix,
            namespace: &mut self.namespace,
            invert: false,
            cmd: ParsedCommand::new(),
            src_text: None,
            dst_text: None,
        };
        session.run(&args)
    }

    /// The option table as left by the last parse.
    pub fn namespace(&self) -> &OptionNamespace {
        &self.namespace
    }
}

/// State of one parse invocation.
pub struct ParseSession<'p> {
    registry: &'p ExtensionRegistry,
    resolver: &'p dyn Resolver,
    matrix: &'p LegalityMatrix,
    namespace: &'p mut OptionNamespace,
    /// Latched by a bare `!`, cleared after the next option
    invert: bool,
    cmd: ParsedCommand,
    src_text: Option<String>,
    dst_text: Option<String>,
}

fn parse_rulenumber(text: &str) -> Result<u32> {
    string_to_number(text, 1, i32::MAX as u64)
        .map(|n| n as u32)
        .ok_or_else(|| Error::param(format!("Invalid rule number `{}'", text)))
}

fn parse_target(name: &str) -> Result<&str> {
    if name.is_empty() {
        return Err(Error::param("Invalid target name (too short)"));
    }
    if name.len() > TARGET_NAME_MAX {
        return Err(Error::param(format!(
            "Invalid target name `{}' ({} chars max)",
            name, TARGET_NAME_MAX
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(Error::param(format!("Invalid target name `{}'", name)));
    }
    Ok(name)
}

fn parse_counter(text: &str, what: &str) -> Result<u64> {
    text.trim()
        .parse()
        .map_err(|_| Error::param(format!("-c {} counter not numeric", what)))
}

impl<'p> ParseSession<'p> {
    fn run(mut self, args: &[String]) -> Result<Invocation> {
        let mut scanner = Scanner::new(args);

        while let Some(token) = scanner.next_token(self.namespace) {
            match token? {
                Token::Positional(text) => {
                    if text != "!" {
                        return Err(Error::param(format!("Bad argument `{}'", text)));
                    }
                    if self.invert {
                        return Err(Error::param("multiple consecutive ! not allowed"));
                    }
                    self.invert = true;
                    continue;
                }
                Token::Opt {
                    owner: OptionOwner::Core(opt),
                    arg,
                    ..
                } => {
                    if let Some(early) = self.core_option(opt, arg, &mut scanner)? {
                        return Ok(early);
                    }
                }
                Token::Opt {
                    owner,
                    code,
                    name,
                    arg,
                } => self.extension_option(owner, code, &name, arg, &mut scanner)?,
            }
            self.invert = false;
        }

        if let Some(target) = &self.cmd.target {
            target.finalize()?;
        }
        for m in &self.cmd.matches {
            m.finalize()?;
        }

        if !scanner.remaining().is_empty() {
            return Err(Error::param("unknown arguments found on commandline"));
        }
        self.finish().map(Invocation::Command)
    }

    fn add_command(&mut self, cmd: Command, compatible: CommandSet) -> Result<()> {
        self.cmd.commands.add(cmd, compatible, self.invert)
    }

    fn set_option(&mut self, option: OptionSet) -> Result<()> {
        self.cmd
            .options
            .set_option(option, &mut self.cmd.spec.arp.invflags, self.invert)
    }

    /// Fail when `!` is latched before a flag that cannot be inverted.
    fn refuse_invert(&self, flag: &str) -> Result<()> {
        if self.invert {
            return Err(Error::param(format!("cannot have ! before {}", flag)));
        }
        Ok(())
    }

    /// Record the optional chain of `-L`, `-F`, `-Z` or `-X`.
    ///
    /// `-L` and `-Z` share one chain, so naming two different ones fails.
    fn set_optional_chain(&mut self, chain: Option<String>) -> Result<()> {
        let Some(chain) = chain else {
            return Ok(());
        };
        match &self.cmd.chain {
            Some(prev) if *prev != chain => Err(Error::param(format!(
                "only one chain may be given, got `{}' and `{}'",
                prev, chain
            ))),
            _ => {
                self.cmd.chain = Some(chain);
                Ok(())
            }
        }
    }

    /// An option argument, where `!` latches inversion and the real
    /// argument follows it.
    fn inverse_arg(&mut self, arg: Option<String>, scanner: &mut Scanner<'_>) -> Result<String> {
        let arg = arg.unwrap_or_default();
        if arg != "!" {
            return Ok(arg);
        }
        if self.invert {
            return Err(Error::param("Multiple `!' flags not allowed"));
        }
        self.invert = true;
        scanner
            .take_next()
            .ok_or_else(|| Error::param("no argument following `!'"))
    }

    fn core_option(
        &mut self,
        opt: CoreOpt,
        arg: Option<String>,
        scanner: &mut Scanner<'_>,
    ) -> Result<Option<Invocation>> {
        match opt {
            CoreOpt::Append => {
                self.add_command(Command::Append, CommandSet::empty())?;
                self.cmd.chain = arg;
            }
            CoreOpt::Delete => {
                self.add_command(Command::Delete, CommandSet::empty())?;
                self.cmd.chain = arg;
                if let Some(num) = scanner.peek_positional() {
                    self.cmd.rulenum = parse_rulenumber(&num)?;
                    self.cmd.commands.set_only(Command::DeleteByNumber);
                }
            }
            CoreOpt::Replace => {
                self.add_command(Command::Replace, CommandSet::empty())?;
                self.cmd.chain = arg;
                let num = scanner
                    .peek_positional()
                    .ok_or_else(|| Error::param("-R requires a rule number"))?;
                self.cmd.rulenum = parse_rulenumber(&num)?;
            }
            CoreOpt::Insert => {
                self.add_command(Command::Insert, CommandSet::empty())?;
                self.cmd.chain = arg;
                self.cmd.rulenum = match scanner.peek_positional() {
                    Some(num) => parse_rulenumber(&num)?,
                    None => 1,
                };
            }
            CoreOpt::List => {
                self.add_command(Command::List, CommandSet::ZERO)?;
                self.set_optional_chain(arg.or_else(|| scanner.peek_positional()))?;
            }
            CoreOpt::Flush => {
                self.add_command(Command::Flush, CommandSet::empty())?;
                self.set_optional_chain(arg.or_else(|| scanner.peek_positional()))?;
            }
            CoreOpt::Zero => {
                self.add_command(Command::Zero, CommandSet::LIST)?;
                self.set_optional_chain(arg.or_else(|| scanner.peek_positional()))?;
            }
            CoreOpt::NewChain => {
                let name = arg.unwrap_or_default();
                if name.starts_with('-') {
                    return Err(Error::param("chain name not allowed to start with `-'"));
                }
                if self.registry.find_target(&name).is_some() {
                    return Err(Error::param("chain name may not clash with target name"));
                }
                self.add_command(Command::NewChain, CommandSet::empty())?;
                self.cmd.chain = Some(name);
            }
            CoreOpt::DeleteChain => {
                self.add_command(Command::DeleteChain, CommandSet::empty())?;
                self.set_optional_chain(arg.or_else(|| scanner.peek_positional()))?;
            }
            CoreOpt::RenameChain => {
                self.add_command(Command::RenameChain, CommandSet::empty())?;
                self.cmd.chain = arg;
                self.cmd.new_name = Some(scanner.peek_positional().ok_or_else(|| {
                    Error::param("-E requires old-chain-name and new-chain-name")
                })?);
            }
            CoreOpt::Policy => {
                self.add_command(Command::SetPolicy, CommandSet::empty())?;
                self.cmd.chain = arg;
                self.cmd.policy = Some(
                    scanner
                        .peek_positional()
                        .ok_or_else(|| Error::param("-P requires a chain and a policy"))?,
                );
            }
            CoreOpt::Check => {
                self.add_command(Command::Check, CommandSet::empty())?;
                self.cmd.chain = arg;
            }
            CoreOpt::Help => {
                self.refuse_invert("-h")?;
                return Ok(Some(Invocation::Help(
                    arg.or_else(|| scanner.peek_positional()),
                )));
            }
            CoreOpt::Version => {
                return Ok(Some(Invocation::Version {
                    inverted: self.invert,
                }));
            }
            CoreOpt::SourceIp => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::SOURCE_IP)?;
                self.src_text = Some(text);
            }
            CoreOpt::DestIp => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::DEST_IP)?;
                self.dst_text = Some(text);
            }
            CoreOpt::SourceMac => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::SOURCE_MAC)?;
                let (mac, mask) = parse_mac_option(&text, "source mac")?;
                self.cmd.spec.arp.src_devaddr = DevAddr::from_mac(mac, mask);
            }
            CoreOpt::DestMac => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::DEST_MAC)?;
                let (mac, mask) = parse_mac_option(&text, "destination mac")?;
                self.cmd.spec.arp.tgt_devaddr = DevAddr::from_mac(mac, mask);
            }
            CoreOpt::HLength => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::H_LENGTH)?;
                let (len, mask) = parse_length(&text)?;
                self.cmd.spec.arp.arhln = len;
                self.cmd.spec.arp.arhln_mask = mask;
            }
            CoreOpt::PLength => {
                return Err(Error::param("not supported"));
            }
            CoreOpt::Opcode => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::OPCODE)?;
                let (value, mask) = parse_opcode(&text)?;
                self.cmd.spec.arp.arpop = value;
                self.cmd.spec.arp.arpop_mask = mask;
            }
            CoreOpt::HType => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::H_TYPE)?;
                let (value, mask) = parse_hw_type(&text)?;
                self.cmd.spec.arp.arhrd = value;
                self.cmd.spec.arp.arhrd_mask = mask;
            }
            CoreOpt::ProtoType => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::P_TYPE)?;
                let (value, mask) = parse_proto_type(&text)?;
                self.cmd.spec.arp.arpro = value;
                self.cmd.spec.arp.arpro_mask = mask;
            }
            CoreOpt::InIface => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::IN_IFACE)?;
                self.cmd.spec.arp.iniface = parse_interface(&text)?;
            }
            CoreOpt::OutIface => {
                let text = self.inverse_arg(arg, scanner)?;
                self.set_option(OptionSet::OUT_IFACE)?;
                self.cmd.spec.arp.outiface = parse_interface(&text)?;
            }
            CoreOpt::Jump => {
                self.set_option(OptionSet::JUMP)?;
                let jumpto = parse_target(arg.as_deref().unwrap_or(""))?.to_string();
                // A name that is not a loaded target may still be a chain
                if let Some(ext) = self.registry.find_target(&jumpto) {
                    self.namespace.contribute(OptionOwner::Target, ext.options());
                    self.cmd.target = Some(ExtensionInstance::new(ext, &jumpto));
                }
                self.cmd.jumpto = jumpto;
            }
            CoreOpt::Match => {
                if self.invert {
                    return Err(Error::param("unexpected ! flag before --match"));
                }
                let name = arg.unwrap_or_default();
                let ext = self
                    .registry
                    .find_match(&name)
                    .ok_or_else(|| Error::param(format!("Couldn't load match `{}'", name)))?;
                if self.cmd.matches.iter().any(|m| m.name() == ext.name()) {
                    return Err(Error::param(format!("match `{}' already loaded", name)));
                }
                let index = self.cmd.matches.len();
                self.namespace.contribute(OptionOwner::Match(index), ext.options());
                self.cmd.matches.push(ExtensionInstance::new(ext, &name));
            }
            CoreOpt::Numeric => self.set_option(OptionSet::NUMERIC)?,
            CoreOpt::Verbose => {
                if self.cmd.verbose == 0 {
                    self.set_option(OptionSet::VERBOSE)?;
                } else {
                    self.refuse_invert("-v")?;
                }
                self.cmd.verbose += 1;
            }
            CoreOpt::Exact => {
                self.refuse_invert("-x")?;
                self.cmd.exact = true;
            }
            CoreOpt::LineNumbers => self.set_option(OptionSet::LINE_NUMBERS)?,
            CoreOpt::Table => {
                if self.invert {
                    return Err(Error::param("unexpected ! flag before --table"));
                }
                self.cmd.table = arg;
            }
            CoreOpt::Modprobe => {
                self.refuse_invert("-M")?;
                log::debug!("ignoring --modprobe {}", arg.unwrap_or_default());
            }
            CoreOpt::SetCounters => {
                self.set_option(OptionSet::COUNTERS)?;
                let pcnt = arg.unwrap_or_default();
                let bcnt = scanner
                    .peek_positional()
                    .ok_or_else(|| Error::param("-c requires packet and byte counter"))?;
                self.cmd.spec.counters.pcnt = parse_counter(&pcnt, "packet")?;
                self.cmd.spec.counters.bcnt = parse_counter(&bcnt, "byte")?;
            }
        }
        Ok(None)
    }

    fn extension_option(
        &mut self,
        owner: OptionOwner,
        code: u32,
        name: &str,
        arg: Option<String>,
        scanner: &mut Scanner<'_>,
    ) -> Result<()> {
        let arg = match arg {
            Some(text) => Some(self.inverse_arg(Some(text), scanner)?),
            None => None,
        };
        let call = OptionCall {
            code,
            arg: arg.as_deref(),
            invert: self.invert,
            resolver: self.resolver,
        };

        let instance = match owner {
            OptionOwner::Target => self.cmd.target.as_mut(),
            OptionOwner::Match(index) => self.cmd.matches.get_mut(index),
            OptionOwner::Core(_) => None,
        };
        let handled = match instance {
            Some(instance) => instance.parse(&call, &mut self.cmd.spec)?,
            None => false,
        };
        if !handled {
            return Err(Error::param(format!("Unknown arg `--{}'", name)));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<ParsedCommand> {
        let commands = self.cmd.commands;
        if commands.is_empty() {
            return Err(Error::param("no command specified"));
        }
        if self.invert {
            return Err(Error::param("nothing appropriate following !"));
        }

        let rule_commands = CommandSet::REPLACE
            | CommandSet::INSERT
            | CommandSet::DELETE
            | CommandSet::APPEND
            | CommandSet::CHECK;
        if commands.intersects(rule_commands) {
            if self.src_text.is_none() {
                self.src_text = Some("0.0.0.0/0".to_string());
            }
            if self.dst_text.is_none() {
                self.dst_text = Some("0.0.0.0/0".to_string());
            }
        }

        let src = match &self.src_text {
            Some(text) => Some(parse_hostnetworkmask(text, self.resolver)?),
            None => None,
        };
        let dst = match &self.dst_text {
            Some(text) => Some(parse_hostnetworkmask(text, self.resolver)?),
            None => None,
        };
        if let Some(src) = &src {
            self.cmd.spec.arp.smsk = src.mask;
        }
        if let Some(dst) = &dst {
            self.cmd.spec.arp.tmsk = dst.mask;
        }

        let nsaddrs = src.as_ref().map_or(0, HostSpec::count);
        let ndaddrs = dst.as_ref().map_or(0, HostSpec::count);
        if (nsaddrs > 1 || ndaddrs > 1)
            && self
                .cmd
                .spec
                .arp
                .invflags
                .intersects(InvFlags::SRC_IP | InvFlags::TGT_IP)
        {
            return Err(Error::param(
                "! not allowed with multiple source or destination IP addresses",
            ));
        }
        if commands == CommandSet::REPLACE && (nsaddrs != 1 || ndaddrs != 1) {
            return Err(Error::param(
                "Replacement rule does not specify a unique address",
            ));
        }

        self.matrix.check(commands, self.cmd.options)?;

        if let Some(chain) = &self.cmd.chain {
            if chain.len() > CHAIN_NAME_MAX {
                return Err(Error::param(format!(
                    "chain name `{}' too long (must be under {} chars)",
                    chain, CHAIN_NAME_MAX
                )));
            }
        }

        if commands.intersects(rule_commands) {
            let chain = self.cmd.chain.as_deref().unwrap_or("");
            let options = self.cmd.options;
            if BUILTIN_INPUT_CHAINS.contains(&chain) && options.contains(OptionSet::OUT_IFACE) {
                return Err(Error::param(format!("Can't use -o with {}", chain)));
            }
            if BUILTIN_OUTPUT_CHAINS.contains(&chain) && options.contains(OptionSet::IN_IFACE) {
                return Err(Error::param(format!("Can't use -i with {}", chain)));
            }
        }

        self.cmd.src = src;
        self.cmd.dst = dst;
        Ok(self.cmd)
    }
}
