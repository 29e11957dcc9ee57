//! Rule listing and help output.

use std::fmt;
use std::net::Ipv4Addr;

use crate::address::field::{opcode_name, HW_TYPE_ETHERNET, OPCODE_NAMES, PROTO_TYPE_IPV4};
use crate::address::Interface;
use crate::compiler::{BlockView, CompiledRule};
use crate::engine::{ChainPolicy, TableEngine};
use crate::error::{EngineError, Result};
use crate::extension::{Extension, ExtensionRegistry};
use crate::options::InvFlags;
use crate::rule_spec::{ArpSpec, DevAddr};

/// How rules and counters are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFormat {
    /// Print packet and byte counters
    pub counts: bool,
    /// Print interfaces even when they match anything
    pub via: bool,
    /// Skip symbolic names
    pub numeric: bool,
    /// Abbreviate counters with K/M/G/T
    pub abbreviate: bool,
    /// Prefix rules with their 1-based position
    pub line_numbers: bool,
}

impl ListFormat {
    /// Format used by `-L`.
    pub fn listing(verbose: bool, numeric: bool, exact: bool, line_numbers: bool) -> Self {
        Self {
            counts: verbose,
            via: verbose,
            numeric,
            abbreviate: !exact,
            line_numbers,
        }
    }

    /// Format of the one-line echo printed before each change in
    /// verbose mode.
    pub fn rule_line() -> Self {
        Self {
            counts: false,
            via: true,
            numeric: true,
            abbreviate: true,
            line_numbers: false,
        }
    }
}

/// Render a counter followed by a space.
///
/// `table` pads the number to a fixed column width.
pub fn format_num(number: u64, format: ListFormat, table: bool) -> String {
    if !format.abbreviate {
        return if table {
            format!("{:8} ", number)
        } else {
            format!("{} ", number)
        };
    }
    if number <= 99999 {
        return if table {
            format!("{:5} ", number)
        } else {
            format!("{} ", number)
        };
    }

    let units = ['K', 'M', 'G', 'T'];
    let mut value = (number + 500) / 1000;
    let mut unit = 0;
    while value > 9999 && unit < units.len() - 1 {
        value = (value + 500) / 1000;
        unit += 1;
    }
    if table {
        format!("{:4}{} ", value, units[unit])
    } else {
        format!("{}{} ", value, units[unit])
    }
}

/// Render a netmask as the suffix of an address.
///
/// A host mask renders as nothing, a prefix mask as `/N`, anything
/// else in dotted form.
pub fn mask_to_dotted(mask: Ipv4Addr) -> String {
    let bits = u32::from(mask);
    if bits == u32::MAX {
        return String::new();
    }
    if bits.leading_ones() + bits.trailing_zeros() == 32 {
        format!("/{}", bits.leading_ones())
    } else {
        format!("/{}", mask)
    }
}

fn bang(invflags: InvFlags, flag: InvFlags) -> &'static str {
    if invflags.contains(flag) {
        "! "
    } else {
        ""
    }
}

fn push_iface(out: &mut String, opt: char, iface: &Interface, inverted: &str, format: ListFormat) {
    let name = iface.name_str();
    let shown = if !name.is_empty() {
        name
    } else if format.via {
        if format.numeric { "*" } else { "any" }.to_string()
    } else {
        return;
    };
    out.push_str(&format!("{}-{} {} ", inverted, opt, shown));
}

fn push_devaddr(out: &mut String, opt: &str, dev: &DevAddr, inverted: &str) {
    if !dev.is_set() {
        return;
    }
    out.push_str(&format!("{}--{} {}", inverted, opt, dev.mac()));
    let mask = dev.mac_mask();
    if mask.octets().iter().any(|&b| b != 0xff) {
        out.push_str(&format!("/{}", mask));
    }
    out.push(' ');
}

/// Render the match fields of a rule header in command-line form.
pub fn format_arp(arp: &ArpSpec, format: ListFormat) -> String {
    let inv = arp.invflags;
    let mut out = String::new();

    push_iface(&mut out, 'i', &arp.iniface, bang(inv, InvFlags::VIA_IN), format);
    push_iface(&mut out, 'o', &arp.outiface, bang(inv, InvFlags::VIA_OUT), format);

    if !arp.smsk.is_unspecified() {
        out.push_str(&format!(
            "{}-s {}{} ",
            bang(inv, InvFlags::SRC_IP),
            arp.src,
            mask_to_dotted(arp.smsk)
        ));
    }
    push_devaddr(&mut out, "src-mac", &arp.src_devaddr, bang(inv, InvFlags::SRC_DEVADDR));

    if !arp.tmsk.is_unspecified() {
        out.push_str(&format!(
            "{}-d {}{} ",
            bang(inv, InvFlags::TGT_IP),
            arp.tgt,
            mask_to_dotted(arp.tmsk)
        ));
    }
    push_devaddr(&mut out, "dst-mac", &arp.tgt_devaddr, bang(inv, InvFlags::TGT_DEVADDR));

    if arp.arhln_mask != 0 {
        out.push_str(&format!("{}--h-length {}", bang(inv, InvFlags::ARPHLN), arp.arhln));
        if arp.arhln_mask != u8::MAX {
            out.push_str(&format!("/{}", arp.arhln_mask));
        }
        out.push(' ');
    }

    if arp.arpop_mask != 0 {
        out.push_str(bang(inv, InvFlags::ARPOP));
        match opcode_name(arp.arpop).filter(|_| !format.numeric) {
            Some(name) => out.push_str(&format!("--opcode {}", name)),
            None => out.push_str(&format!("--opcode {}", arp.arpop)),
        }
        if arp.arpop_mask != u16::MAX {
            out.push_str(&format!("/{}", arp.arpop_mask));
        }
        out.push(' ');
    }

    if arp.arhrd_mask != 0 {
        out.push_str(bang(inv, InvFlags::ARPHRD));
        if arp.arhrd == HW_TYPE_ETHERNET && !format.numeric {
            out.push_str("--h-type Ethernet");
        } else {
            out.push_str(&format!("--h-type {}", arp.arhrd));
        }
        if arp.arhrd_mask != u16::MAX {
            out.push_str(&format!("/{}", arp.arhrd_mask));
        }
        out.push(' ');
    }

    if arp.arpro_mask != 0 {
        out.push_str(bang(inv, InvFlags::ARPPRO));
        if arp.arpro == PROTO_TYPE_IPV4 && !format.numeric {
            out.push_str("--proto-type IPv4");
        } else {
            out.push_str(&format!("--proto-type 0x{:x}", arp.arpro));
        }
        if arp.arpro_mask != u16::MAX {
            out.push_str(&format!("/{:x}", arp.arpro_mask));
        }
        out.push(' ');
    }

    out
}

fn block_text(ext: Option<std::sync::Arc<dyn Extension>>, block: &BlockView, arp: &ArpSpec, numeric: bool, kind: &str) -> String {
    match ext {
        Some(ext) => ext.print(&block.data, arp, numeric),
        None if kind == "match" => format!("UNKNOWN match `{}' ", block.name),
        None if block.data.is_empty() => String::new(),
        None => format!("[{} bytes of unknown target data] ", block.data.len()),
    }
}

/// Render one rule on a single line, without the trailing newline.
///
/// `num` is the 0-based position, printed 1-based with line numbers on.
/// `is_chain` tells jumps to chains apart from target extensions.
pub fn format_rule(
    rule: &CompiledRule,
    registry: &ExtensionRegistry,
    is_chain: &dyn Fn(&str) -> bool,
    format: ListFormat,
    num: usize,
) -> Result<String> {
    let view = rule.view()?;
    let arp = &view.header.arp;
    let label = &view.target.name;
    let mut out = String::new();

    if format.line_numbers {
        out.push_str(&format!("{} ", num + 1));
    }
    if !label.is_empty() {
        out.push_str(&format!("-j {} ", label));
    }

    out.push_str(&format_arp(arp, format));

    for block in &view.matches {
        out.push_str(&block_text(registry.find_match(&block.name), block, arp, format.numeric, "match"));
    }

    let target = if is_chain(label) {
        registry.standard_target()
    } else {
        registry.find_target(label)
    };
    out.push_str(&block_text(target, &view.target, arp, format.numeric, "target"));

    if format.counts {
        let counters = view.header.counters;
        out.push_str(", pcnt=");
        out.push_str(&format_num(counters.pcnt, format, true));
        out.push_str("-- bcnt=");
        out.push_str(&format_num(counters.bcnt, format, true));
    }
    Ok(out)
}

/// One chain of a [`Listing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainListing {
    pub name: String,
    /// Policy and counters of a built-in chain
    pub policy: Option<ChainPolicy>,
    /// Jumps into a user-defined chain
    pub references: u32,
    /// Rendered rules in chain order
    pub rules: Vec<String>,
}

/// Result of `-L`: the selected chains rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    format: ListFormat,
    chains: Vec<ChainListing>,
}

impl Listing {
    /// List `chain`, or every chain when `None`.
    pub fn collect<E: TableEngine + ?Sized>(
        engine: &E,
        registry: &ExtensionRegistry,
        chain: Option<&str>,
        format: ListFormat,
    ) -> Result<Self> {
        let names = match chain {
            Some(name) if engine.is_chain(name) => vec![name.to_string()],
            Some(name) => return Err(EngineError::NoSuchChain(name.to_string()).into()),
            None => engine.chains(),
        };

        let is_chain = |label: &str| engine.is_chain(label);
        let mut chains = Vec::with_capacity(names.len());
        for name in names {
            let policy = engine.policy(&name)?;
            let references = if policy.is_some() { 0 } else { engine.references(&name)? };
            let rules = engine
                .rules(&name)?
                .iter()
                .enumerate()
                .map(|(num, rule)| format_rule(rule, registry, &is_chain, format, num))
                .collect::<Result<Vec<_>>>()?;
            chains.push(ChainListing {
                name,
                policy,
                references,
                rules,
            });
        }
        Ok(Self { format, chains })
    }

    pub fn chains(&self) -> &[ChainListing] {
        &self.chains
    }
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "Chain {}", chain.name)?;
            match &chain.policy {
                Some(policy) => {
                    write!(f, " (policy {}", policy.policy)?;
                    if self.format.counts {
                        write!(
                            f,
                            " {}packets, {}bytes",
                            format_num(policy.counters.pcnt, self.format, false),
                            format_num(policy.counters.bcnt, self.format, false)
                        )?;
                    }
                    writeln!(f, ")")?;
                }
                None => writeln!(f, " ({} references)", chain.references)?,
            }
            for rule in &chain.rules {
                writeln!(f, "{}", rule)?;
            }
        }
        Ok(())
    }
}

const USAGE: &str = "\
Usage: arprule -[AD] chain rule-specification [options]
       arprule -[RI] chain rulenum rule-specification [options]
       arprule -D chain rulenum [options]
       arprule -[LFZ] [chain] [options]
       arprule -[NX] chain
       arprule -E old-chain-name new-chain-name
       arprule -P chain target [options]
       arprule -h (print this help information)

Commands:
Either long or short options are allowed.
  --append  -A chain            Append to chain
  --check   -C chain            Check for the existence of a rule
  --delete  -D chain            Delete matching rule from chain
  --delete  -D chain rulenum
                                Delete rule rulenum (1 = first) from chain
  --insert  -I chain [rulenum]
                                Insert in chain as rulenum (default 1=first)
  --replace -R chain rulenum
                                Replace rule rulenum (1 = first) in chain
  --list    -L [chain]          List the rules in a chain or all chains
  --flush   -F [chain]          Delete all rules in  chain or all chains
  --zero    -Z [chain]          Zero counters in chain or all chains
  --new     -N chain            Create a new user-defined chain
  --delete-chain
            -X [chain]          Delete a user-defined chain
  --policy  -P chain target
                                Change policy on chain to target
  --rename-chain
            -E old-chain new-chain
                                Change chain name, (moving any references)
Options:
  --source-ip   -s [!] address[/mask]
                                source specification
  --destination-ip -d [!] address[/mask]
                                destination specification
  --source-mac [!] address[/mask]
  --destination-mac [!] address[/mask]
  --h-length   -l   length[/mask] hardware length (nr of bytes)
  --opcode code[/mask] operation code (2 bytes)
  --h-type   type[/mask]  hardware type (2 bytes, hexadecimal)
  --proto-type   type[/mask]  protocol type (2 bytes)
  --in-interface -i [!] input name[+]
                                network interface name ([+] for wildcard)
  --out-interface -o [!] output name[+]
                                network interface name ([+] for wildcard)
  --jump        -j target
                                target for rule (may load target extension)
  --match       -m match
                                extended match (may load extension)
  --numeric     -n              numeric output of addresses and ports
  --table       -t table        table to manipulate (default: `filter')
  --verbose     -v              verbose mode
  --line-numbers                print line numbers when listing
  --exact       -x              expand numbers (display exact values)
  --modprobe=<command>          try to insert modules using this command
  --set-counters -c PKTS BYTES  set the counter during insert/append
[!] --version   -V              print package version.
";

fn extension_help(kind: &str, ext: &dyn Extension) -> String {
    let mut out = format!("{} {} options:\n", ext.name(), kind);
    for opt in ext.options() {
        if opt.has_arg {
            out.push_str(&format!("  --{} value\n", opt.name));
        } else {
            out.push_str(&format!("  --{}\n", opt.name));
        }
    }
    out
}

/// Help text; `topic` narrows it to one registered extension.
pub fn help_text(registry: &ExtensionRegistry, topic: Option<&str>) -> String {
    if let Some(topic) = topic {
        if let Some(ext) = registry.targets().find(|t| t.name() == topic) {
            return extension_help("target", ext.as_ref());
        }
        if let Some(ext) = registry.matches().find(|m| m.name() == topic) {
            return extension_help("match", ext.as_ref());
        }
    }

    let mut out = format!("arprule v{}\n\n{}", crate::VERSION, USAGE);
    out.push_str(" opcode strings: \n");
    for (i, name) in OPCODE_NAMES.iter().enumerate() {
        out.push_str(&format!(" {} = {}\n", i + 1, name));
    }
    out.push_str(" hardware type string: 1 = Ethernet\n");
    out.push_str(" protocol type string: 0x800 = IPv4\n");

    for ext in registry.targets() {
        if ext.options().is_empty() {
            continue;
        }
        out.push('\n');
        out.push_str(&extension_help("target", ext.as_ref()));
    }
    for ext in registry.matches() {
        out.push('\n');
        out.push_str(&extension_help("match", ext.as_ref()));
    }
    out
}
