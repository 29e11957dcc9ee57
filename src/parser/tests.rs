//! Tests for command-line parsing.

use std::net::Ipv4Addr;
use std::sync::Arc;

use super::*;
use crate::address::StaticResolver;
use crate::extension::{ExtOption, Extension, ExtensionData};
use crate::namespace::WINDOW_SIZE;

// ============================================================================
// Helpers
// ============================================================================

/// Match extension with one option, `--byte-value N`, which is required.
struct ByteMatch;

static BYTE_OPTIONS: [ExtOption; 1] = [ExtOption::with_arg("byte-value", 1)];

#[derive(Debug, Default)]
struct ByteData {
    value: u8,
}

impl ExtensionData for ByteData {
    fn parse(&mut self, call: &OptionCall<'_>, flags: &mut u32, _spec: &mut RuleSpec) -> Result<bool> {
        if call.code != 1 {
            return Ok(false);
        }
        self.value = call
            .arg()
            .parse()
            .map_err(|_| Error::param(format!("bad byte `{}'", call.arg())))?;
        *flags |= 1;
        Ok(true)
    }

    fn finalize(&self, flags: u32) -> Result<()> {
        if flags == 0 {
            return Err(Error::param("byte: --byte-value is required"));
        }
        Ok(())
    }

    fn encode(&self, out: &mut [u8]) {
        out[0] = self.value;
    }
}

impl Extension for ByteMatch {
    fn name(&self) -> &str {
        "byte"
    }
    fn size(&self) -> usize {
        8
    }
    fn options(&self) -> &[ExtOption] {
        &BYTE_OPTIONS
    }
    fn init(&self, _label: &str) -> Box<dyn ExtensionData> {
        Box::new(ByteData::default())
    }
}

fn registry() -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::with_builtins().unwrap();
    registry.register_match(Arc::new(ByteMatch)).unwrap();
    registry
}

fn resolver() -> StaticResolver {
    StaticResolver::new()
        .with_host(
            "pair",
            &[Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)],
        )
        .with_host("single", &[Ipv4Addr::new(192, 168, 1, 1)])
}

fn parse(args: &[&str]) -> Result<Invocation> {
    let registry = registry();
    let resolver = resolver();
    let mut parser = RuleSpecParser::new(&registry, &resolver);
    parser.parse(args)
}

fn command(args: &[&str]) -> ParsedCommand {
    match parse(args).unwrap() {
        Invocation::Command(cmd) => cmd,
        other => panic!("expected a command, got {:?}", other),
    }
}

fn error(args: &[&str]) -> String {
    match parse(args) {
        Ok(inv) => panic!("expected an error, got {:?}", inv),
        Err(e) => e.to_string(),
    }
}

// ============================================================================
// Command Selection Tests
// ============================================================================

#[test]
fn test_append_defaults_addresses() {
    let cmd = command(&["-A", "INPUT", "-j", "DROP"]);
    assert_eq!(cmd.commands, CommandSet::APPEND);
    assert_eq!(cmd.chain.as_deref(), Some("INPUT"));
    assert_eq!(cmd.src, Some(HostSpec::any()));
    assert_eq!(cmd.dst, Some(HostSpec::any()));
    assert_eq!(cmd.spec.arp.smsk, Ipv4Addr::UNSPECIFIED);
    assert_eq!(cmd.jumpto, "DROP");
    let target = cmd.target.as_ref().unwrap();
    assert_eq!(target.name(), "standard");
    assert_eq!(target.label(), "DROP");
}

#[test]
fn test_delete_with_number() {
    let cmd = command(&["-D", "INPUT", "3"]);
    assert_eq!(cmd.commands, CommandSet::DELETE_NUM);
    assert_eq!(cmd.rulenum, 3);
    assert!(cmd.src.is_none());
}

#[test]
fn test_delete_by_content() {
    let cmd = command(&["-D", "INPUT", "-s", "1.2.3.4"]);
    assert_eq!(cmd.commands, CommandSet::DELETE);
    assert_eq!(cmd.src.unwrap().addrs, vec![Ipv4Addr::new(1, 2, 3, 4)]);
}

#[test]
fn test_insert_default_position() {
    assert_eq!(command(&["-I", "INPUT"]).rulenum, 1);
    assert_eq!(command(&["-I", "INPUT", "0x10"]).rulenum, 16);
}

#[test]
fn test_replace_requires_number() {
    assert_eq!(error(&["-R", "INPUT"]), "-R requires a rule number");
    assert_eq!(error(&["-R", "INPUT", "0"]), "Invalid rule number `0'");
    assert_eq!(command(&["-R", "INPUT", "2"]).rulenum, 2);
}

#[test]
fn test_list_and_zero_combine() {
    let cmd = command(&["-L", "-Z", "-v"]);
    assert_eq!(cmd.commands, CommandSet::LIST | CommandSet::ZERO);
    assert_eq!(cmd.verbose, 1);

    // A later -Z without a chain keeps the one given to -L
    let cmd = command(&["-L", "INPUT", "-Z"]);
    assert_eq!(cmd.chain.as_deref(), Some("INPUT"));

    // Naming the same chain twice is harmless, two different ones are not
    let cmd = command(&["-L", "INPUT", "-Z", "INPUT"]);
    assert_eq!(cmd.chain.as_deref(), Some("INPUT"));
    assert_eq!(
        error(&["-L", "INPUT", "-Z", "OUTPUT"]),
        "only one chain may be given, got `INPUT' and `OUTPUT'"
    );

    let cmd = command(&["-LINPUT", "-n", "--line-numbers", "-x"]);
    assert_eq!(cmd.chain.as_deref(), Some("INPUT"));
    assert!(cmd.numeric());
    assert!(cmd.line_numbers());
    assert!(cmd.exact);
}

#[test]
fn test_incompatible_commands() {
    assert_eq!(error(&["-A", "INPUT", "-D", "INPUT"]), "Can't use -D with -A");
    assert_eq!(error(&["-F", "-L"]), "Can't use -L with -F");
}

#[test]
fn test_no_command() {
    assert_eq!(error(&["-s", "1.2.3.4"]), "no command specified");
}

#[test]
fn test_rename_and_policy_need_second_argument() {
    assert_eq!(
        error(&["-E", "old"]),
        "-E requires old-chain-name and new-chain-name"
    );
    let cmd = command(&["-E", "old", "new"]);
    assert_eq!(cmd.new_name.as_deref(), Some("new"));

    assert_eq!(error(&["-P", "INPUT"]), "-P requires a chain and a policy");
    let cmd = command(&["-P", "INPUT", "DROP"]);
    assert_eq!(cmd.policy.as_deref(), Some("DROP"));
}

#[test]
fn test_new_chain_names() {
    assert_eq!(error(&["-N", "-foo"]), "chain name not allowed to start with `-'");
    assert_eq!(error(&["-N", "mangle"]), "chain name may not clash with target name");
    assert_eq!(error(&["-N", "ACCEPT"]), "chain name may not clash with target name");
    let long = "c".repeat(CHAIN_NAME_MAX + 1);
    assert!(error(&["-N", &long]).contains("too long"));
    assert_eq!(command(&["-N", "mine"]).commands, CommandSet::NEW_CHAIN);
}

#[test]
fn test_help_and_version_exit_early() {
    assert!(matches!(parse(&["-h"]).unwrap(), Invocation::Help(None)));
    assert!(matches!(
        parse(&["-h", "mangle"]).unwrap(),
        Invocation::Help(Some(topic)) if topic == "mangle"
    ));
    assert!(matches!(
        parse(&["-V"]).unwrap(),
        Invocation::Version { inverted: false }
    ));
    assert!(matches!(
        parse(&["!", "-V"]).unwrap(),
        Invocation::Version { inverted: true }
    ));
}

// ============================================================================
// Inversion Tests
// ============================================================================

#[test]
fn test_bang_before_option() {
    let cmd = command(&["-A", "INPUT", "!", "-s", "1.2.3.4"]);
    assert!(cmd.spec.arp.invflags.contains(InvFlags::SRC_IP));
}

#[test]
fn test_bang_as_argument() {
    let cmd = command(&["-A", "INPUT", "-d", "!", "1.2.3.4", "-i", "eth0"]);
    assert_eq!(cmd.spec.arp.invflags, InvFlags::TGT_IP);
    assert_eq!(cmd.dst.unwrap().addrs, vec![Ipv4Addr::new(1, 2, 3, 4)]);
}

#[test]
fn test_bang_errors() {
    assert_eq!(
        error(&["-A", "INPUT", "!", "!", "-s", "1.2.3.4"]),
        "multiple consecutive ! not allowed"
    );
    assert_eq!(
        error(&["-A", "INPUT", "!", "-s", "!", "1.2.3.4"]),
        "Multiple `!' flags not allowed"
    );
    assert_eq!(error(&["-A", "INPUT", "-s", "!"]), "no argument following `!'");
    assert_eq!(error(&["-A", "INPUT", "!"]), "nothing appropriate following !");
    assert_eq!(error(&["-A", "INPUT", "!", "-j", "DROP"]), "cannot have ! before -j");
    assert_eq!(error(&["!", "-A", "INPUT"]), "unexpected ! flag");
    assert_eq!(
        error(&["-L", "!", "-t", "filter"]),
        "unexpected ! flag before --table"
    );
}

#[test]
fn test_bang_before_plain_flags() {
    assert_eq!(error(&["-L", "!", "-x"]), "cannot have ! before -x");
    assert_eq!(error(&["-L", "!", "-M", "modprobe"]), "cannot have ! before -M");
    assert_eq!(error(&["!", "-h"]), "cannot have ! before -h");
    assert_eq!(error(&["-L", "!", "-v"]), "cannot have ! before -v");
    assert_eq!(error(&["-L", "-v", "!", "-v"]), "cannot have ! before -v");

    let cmd = command(&["-L", "-v", "-v"]);
    assert_eq!(cmd.verbose, 2);
}

#[test]
fn test_bang_rejected_with_multiple_addresses() {
    assert_eq!(
        error(&["-A", "INPUT", "!", "-s", "pair"]),
        "! not allowed with multiple source or destination IP addresses"
    );
    // Masking down to one address is fine
    let cmd = command(&["-A", "INPUT", "!", "-s", "pair/24"]);
    assert_eq!(cmd.src.unwrap().addrs, vec![Ipv4Addr::new(10, 0, 0, 0)]);
}

// ============================================================================
// Rule Option Tests
// ============================================================================

#[test]
fn test_rule_fields() {
    let cmd = command(&[
        "-A",
        "FORWARD",
        "--src-mac",
        "00:11:22:33:44:55",
        "--dst-mac",
        "Broadcast",
        "-l",
        "6",
        "--opcode",
        "Reply",
        "--h-type",
        "Ethernet",
        "--proto-type",
        "0x800/0xff00",
        "-i",
        "eth+",
        "-o",
        "wlan0",
        "-c",
        "10",
        "2048",
    ]);
    let arp = &cmd.spec.arp;
    assert_eq!(&arp.src_devaddr.addr[..6], &[0, 0x11, 0x22, 0x33, 0x44, 0x55]);
    assert_eq!(&arp.tgt_devaddr.mask[..6], &[0xff; 6]);
    assert_eq!((arp.arhln, arp.arhln_mask), (6, 255));
    assert_eq!((arp.arpop, arp.arpop_mask), (2, 0xffff));
    assert_eq!((arp.arhrd, arp.arhrd_mask), (1, 0xffff));
    assert_eq!((arp.arpro, arp.arpro_mask), (0x800, 0xff00));
    assert_eq!(arp.iniface.name_str(), "eth+");
    assert_eq!(&arp.iniface.mask[..4], &[0xff, 0xff, 0xff, 0]);
    assert_eq!(arp.outiface.name_str(), "wlan0");
    assert_eq!(cmd.spec.counters.pcnt, 10);
    assert_eq!(cmd.spec.counters.bcnt, 2048);
}

#[test]
fn test_duplicate_option() {
    assert_eq!(
        error(&["-A", "INPUT", "-s", "1.1.1.1", "-s", "2.2.2.2"]),
        "multiple -s flags not allowed"
    );
}

#[test]
fn test_p_length_not_supported() {
    assert_eq!(error(&["-A", "INPUT", "--p-length", "4"]), "not supported");
}

#[test]
fn test_bad_values() {
    assert_eq!(
        error(&["-A", "INPUT", "--opcode", "Nonsense"]),
        "Problem with specified opcode"
    );
    assert_eq!(
        error(&["-A", "INPUT", "--src-mac", "zz"]),
        "Problem with specified source mac"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-s", "nowhere"]),
        "host/network `nowhere' not found"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-c", "x", "1"]),
        "-c packet counter not numeric"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-c", "1"]),
        "-c requires packet and byte counter"
    );
}

#[test]
fn test_stray_argument() {
    assert_eq!(error(&["-A", "INPUT", "extra"]), "Bad argument `extra'");
    assert_eq!(
        error(&["-A", "INPUT", "--", "extra"]),
        "unknown arguments found on commandline"
    );
}

#[test]
fn test_interface_direction() {
    assert_eq!(error(&["-A", "INPUT", "-o", "eth0"]), "Can't use -o with INPUT");
    assert_eq!(error(&["-A", "OUTPUT", "-i", "eth0"]), "Can't use -i with OUTPUT");
    command(&["-A", "FORWARD", "-i", "eth0", "-o", "eth1"]);
}

#[test]
fn test_legality_enforced() {
    assert_eq!(
        error(&["-L", "-s", "1.2.3.4"]),
        "Illegal option `-s' with this command"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-n"]),
        "Illegal option `-n' with this command"
    );
}

#[test]
fn test_replace_needs_unique_addresses() {
    assert_eq!(
        error(&["-R", "INPUT", "1", "-s", "pair"]),
        "Replacement rule does not specify a unique address"
    );
    command(&["-R", "INPUT", "1", "-s", "single"]);
}

#[test]
fn test_target_names() {
    let long = "t".repeat(TARGET_NAME_MAX + 1);
    assert_eq!(
        error(&["-A", "INPUT", "-j", &long]),
        format!("Invalid target name `{}' (31 chars max)", long)
    );
    assert_eq!(
        error(&["-A", "INPUT", "-j", "a b"]),
        "Invalid target name `a b'"
    );
    assert_eq!(error(&["-A", "INPUT", "-j", ""]), "Invalid target name (too short)");

    // Unknown names may be chains; resolution happens at dispatch
    let cmd = command(&["-A", "INPUT", "-j", "mychain"]);
    assert!(cmd.target.is_none());
    assert_eq!(cmd.jumpto, "mychain");
}

// ============================================================================
// Extension Tests
// ============================================================================

#[test]
fn test_target_options_only_after_jump() {
    assert_eq!(
        error(&["-A", "INPUT", "--mangle-ip-s", "1.2.3.4", "-j", "mangle"]),
        "unrecognized option `--mangle-ip-s'"
    );

    let cmd = command(&["-A", "INPUT", "-j", "mangle", "--mangle-ip-s", "1.2.3.4"]);
    let target = cmd.target.unwrap();
    assert_eq!(target.name(), "mangle");
    assert_eq!(target.flags(), 1);
}

#[test]
fn test_target_option_prefix() {
    let cmd = command(&["-A", "INPUT", "-j", "mangle", "--mangle-t", "DROP"]);
    assert!(cmd.target.is_some());
}

#[test]
fn test_target_option_ambiguous_prefix() {
    // --mangle-ip-s and --mangle-ip-d share one owner
    assert_eq!(
        error(&["-A", "INPUT", "-j", "mangle", "--mangle-ip", "1.2.3.4"]),
        "option `--mangle-ip' is ambiguous"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-j", "mangle", "--mangle-mac", "00:11:22:33:44:55"]),
        "option `--mangle-mac' is ambiguous"
    );
    assert_eq!(
        error(&["-A", "INPUT", "-j", "mangle", "--mangle", "DROP"]),
        "option `--mangle' is ambiguous"
    );

    let cmd = command(&["-A", "INPUT", "-j", "mangle", "--mangle-ip-d", "1.2.3.4"]);
    assert_eq!(cmd.target.unwrap().flags(), 2);
}

#[test]
fn test_target_finalize_runs() {
    assert_eq!(
        error(&["-A", "INPUT", "-j", "CLASSIFY"]),
        "CLASSIFY: Parameter --set-class is required"
    );
    command(&["-A", "INPUT", "-j", "CLASSIFY", "--set-class", "1:10"]);
}

#[test]
fn test_match_extension() {
    let cmd = command(&["-A", "INPUT", "-m", "byte", "--byte-value", "7"]);
    assert_eq!(cmd.matches.len(), 1);
    assert_eq!(cmd.matches[0].encode()[0], 7);

    assert_eq!(
        error(&["-A", "INPUT", "-m", "byte"]),
        "byte: --byte-value is required"
    );
    assert_eq!(error(&["-A", "INPUT", "-m", "nope"]), "Couldn't load match `nope'");
    assert_eq!(
        error(&["-A", "INPUT", "!", "-m", "byte"]),
        "unexpected ! flag before --match"
    );
    assert!(error(&["-A", "INPUT", "-m", "byte", "-m", "byte"]).contains("already loaded"));
}

#[test]
fn test_sessions_do_not_leak() {
    let registry = registry();
    let resolver = resolver();
    let mut parser = RuleSpecParser::new(&registry, &resolver);

    parser
        .parse(&["-A", "INPUT", "-j", "mangle", "--mangle-ip-d", "1.1.1.1"])
        .unwrap();
    let first = parser
        .namespace()
        .lookup("mangle-ip-d")
        .unwrap()
        .window;
    assert_eq!(first, WINDOW_SIZE);

    // The next parse starts from the core table only
    let err = parser
        .parse(&["-A", "INPUT", "--mangle-ip-d", "1.1.1.1"])
        .unwrap_err();
    assert_eq!(err.to_string(), "unrecognized option `--mangle-ip-d'");

    // Windows are never handed out twice
    parser.parse(&["-A", "INPUT", "-j", "mangle"]).unwrap();
    let second = parser
        .namespace()
        .lookup("mangle-ip-d")
        .unwrap()
        .window;
    assert!(second > first);
}

#[test]
fn test_ambiguous_prefix() {
    // --de matches delete, delete-chain and destination-*
    assert_eq!(error(&["--de", "INPUT"]), "option `--de' is ambiguous");
    assert_eq!(
        error(&["-A", "INPUT", "--dst", "1.2.3.4"]),
        "option `--dst' is ambiguous"
    );
    assert_eq!(
        error(&["-A", "INPUT", "--source", "1.2.3.4"]),
        "option `--source' is ambiguous"
    );

    // Prefixes shared only by aliases of one option resolve
    let cmd = command(&["-A", "INPUT", "--dst-i", "1.2.3.4"]);
    assert!(cmd.options.contains(OptionSet::DEST_IP));
}
