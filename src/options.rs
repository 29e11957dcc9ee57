//! Core option flags, inversion bits and the core option table.

use bitflags::bitflags;

use crate::error::{Error, Result};

bitflags! {
    /// Set of core options used in one invocation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionSet: u32 {
        const NUMERIC = 0x0001;
        const SOURCE_IP = 0x0002;
        const DEST_IP = 0x0004;
        const SOURCE_MAC = 0x0008;
        const DEST_MAC = 0x0010;
        const H_LENGTH = 0x0020;
        const P_LENGTH = 0x0040;
        const OPCODE = 0x0080;
        const H_TYPE = 0x0100;
        const P_TYPE = 0x0200;
        const JUMP = 0x0400;
        const VERBOSE = 0x0800;
        const IN_IFACE = 0x1000;
        const OUT_IFACE = 0x2000;
        const LINE_NUMBERS = 0x4000;
        const COUNTERS = 0x8000;
    }
}

bitflags! {
    /// Fields whose match result is negated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvFlags: u16 {
        const VIA_IN = 0x0001;
        const VIA_OUT = 0x0002;
        const SRC_IP = 0x0004;
        const TGT_IP = 0x0008;
        const SRC_DEVADDR = 0x0010;
        const TGT_DEVADDR = 0x0020;
        const ARPOP = 0x0040;
        const ARPHRD = 0x0080;
        const ARPPRO = 0x0100;
        const ARPHLN = 0x0200;
    }
}

/// Number of core option flags (matrix columns).
pub const NUMBER_OF_OPT: usize = 16;

impl OptionSet {
    /// All single flags in matrix column order.
    pub fn each() -> impl Iterator<Item = OptionSet> {
        (0..NUMBER_OF_OPT).map(|i| OptionSet::from_bits_retain(1 << i))
    }

    /// Column index of a single flag.
    pub fn index(self) -> usize {
        self.bits().trailing_zeros() as usize
    }

    /// How the flag is spelled in messages: the short form when one
    /// exists, the long form otherwise.
    pub fn display_flag(self) -> &'static str {
        match self {
            OptionSet::NUMERIC => "-n",
            OptionSet::SOURCE_IP => "-s",
            OptionSet::DEST_IP => "-d",
            OptionSet::SOURCE_MAC => "--source-mac",
            OptionSet::DEST_MAC => "--destination-mac",
            OptionSet::H_LENGTH => "-l",
            OptionSet::P_LENGTH => "--p-length",
            OptionSet::OPCODE => "--opcode",
            OptionSet::H_TYPE => "--h-type",
            OptionSet::P_TYPE => "--proto-type",
            OptionSet::JUMP => "-j",
            OptionSet::VERBOSE => "-v",
            OptionSet::IN_IFACE => "-i",
            OptionSet::OUT_IFACE => "-o",
            OptionSet::LINE_NUMBERS => "--line-numbers",
            OptionSet::COUNTERS => "-c",
            _ => "?",
        }
    }

    /// Inversion bit for a single flag, if the option may be negated.
    pub fn inversion(self) -> Option<InvFlags> {
        match self {
            OptionSet::SOURCE_IP => Some(InvFlags::SRC_IP),
            OptionSet::DEST_IP => Some(InvFlags::TGT_IP),
            OptionSet::SOURCE_MAC => Some(InvFlags::SRC_DEVADDR),
            OptionSet::DEST_MAC => Some(InvFlags::TGT_DEVADDR),
            OptionSet::H_LENGTH => Some(InvFlags::ARPHLN),
            OptionSet::OPCODE => Some(InvFlags::ARPOP),
            OptionSet::H_TYPE => Some(InvFlags::ARPHRD),
            OptionSet::P_TYPE => Some(InvFlags::ARPPRO),
            OptionSet::IN_IFACE => Some(InvFlags::VIA_IN),
            OptionSet::OUT_IFACE => Some(InvFlags::VIA_OUT),
            _ => None,
        }
    }

    /// Record one use of `option`, ORing its inversion bit into `inv`
    /// when `invert` is latched.
    pub fn set_option(&mut self, option: OptionSet, inv: &mut InvFlags, invert: bool) -> Result<()> {
        if self.intersects(option) {
            return Err(Error::param(format!(
                "multiple {} flags not allowed",
                option.display_flag()
            )));
        }
        self.insert(option);

        if invert {
            let bit = option.inversion().ok_or_else(|| {
                Error::param(format!("cannot have ! before {}", option.display_flag()))
            })?;
            inv.insert(bit);
        }
        Ok(())
    }
}

/// Whether an option takes an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasArg {
    No,
    Required,
    Optional,
}

/// Options understood by the core parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreOpt {
    Append,
    Delete,
    Insert,
    Replace,
    List,
    Flush,
    Zero,
    NewChain,
    DeleteChain,
    RenameChain,
    Policy,
    Check,
    SourceIp,
    DestIp,
    SourceMac,
    DestMac,
    HLength,
    PLength,
    Opcode,
    HType,
    ProtoType,
    InIface,
    OutIface,
    Jump,
    Table,
    Match,
    Numeric,
    Verbose,
    Exact,
    Version,
    Help,
    LineNumbers,
    Modprobe,
    SetCounters,
}

/// Long option names of the core parser; several names may share one
/// option.
pub const CORE_LONG_OPTIONS: &[(&str, HasArg, CoreOpt)] = &[
    ("append", HasArg::Required, CoreOpt::Append),
    ("delete", HasArg::Required, CoreOpt::Delete),
    ("insert", HasArg::Required, CoreOpt::Insert),
    ("replace", HasArg::Required, CoreOpt::Replace),
    ("list", HasArg::Optional, CoreOpt::List),
    ("flush", HasArg::Optional, CoreOpt::Flush),
    ("zero", HasArg::Optional, CoreOpt::Zero),
    ("new-chain", HasArg::Required, CoreOpt::NewChain),
    ("delete-chain", HasArg::Optional, CoreOpt::DeleteChain),
    ("rename-chain", HasArg::Required, CoreOpt::RenameChain),
    ("policy", HasArg::Required, CoreOpt::Policy),
    ("check", HasArg::Required, CoreOpt::Check),
    ("source-ip", HasArg::Required, CoreOpt::SourceIp),
    ("destination-ip", HasArg::Required, CoreOpt::DestIp),
    ("src-ip", HasArg::Required, CoreOpt::SourceIp),
    ("dst-ip", HasArg::Required, CoreOpt::DestIp),
    ("source-mac", HasArg::Required, CoreOpt::SourceMac),
    ("destination-mac", HasArg::Required, CoreOpt::DestMac),
    ("src-mac", HasArg::Required, CoreOpt::SourceMac),
    ("dst-mac", HasArg::Required, CoreOpt::DestMac),
    ("h-length", HasArg::Required, CoreOpt::HLength),
    ("p-length", HasArg::Required, CoreOpt::PLength),
    ("opcode", HasArg::Required, CoreOpt::Opcode),
    ("h-type", HasArg::Required, CoreOpt::HType),
    ("proto-type", HasArg::Required, CoreOpt::ProtoType),
    ("in-interface", HasArg::Required, CoreOpt::InIface),
    ("jump", HasArg::Required, CoreOpt::Jump),
    ("table", HasArg::Required, CoreOpt::Table),
    ("match", HasArg::Required, CoreOpt::Match),
    ("numeric", HasArg::No, CoreOpt::Numeric),
    ("out-interface", HasArg::Required, CoreOpt::OutIface),
    ("verbose", HasArg::No, CoreOpt::Verbose),
    ("exact", HasArg::No, CoreOpt::Exact),
    ("version", HasArg::No, CoreOpt::Version),
    ("help", HasArg::Optional, CoreOpt::Help),
    ("line-numbers", HasArg::No, CoreOpt::LineNumbers),
    ("modprobe", HasArg::Required, CoreOpt::Modprobe),
    ("set-counters", HasArg::Required, CoreOpt::SetCounters),
];

impl CoreOpt {
    /// Numeric code of the option; always below one namespace window.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Short option letter and its argument mode.
    pub fn from_short(c: char) -> Option<(CoreOpt, HasArg)> {
        let opt = match c {
            'A' => (CoreOpt::Append, HasArg::Required),
            'D' => (CoreOpt::Delete, HasArg::Required),
            'R' => (CoreOpt::Replace, HasArg::Required),
            'I' => (CoreOpt::Insert, HasArg::Required),
            'L' => (CoreOpt::List, HasArg::Optional),
            'M' => (CoreOpt::Modprobe, HasArg::Required),
            'F' => (CoreOpt::Flush, HasArg::Optional),
            'Z' => (CoreOpt::Zero, HasArg::Optional),
            'N' => (CoreOpt::NewChain, HasArg::Required),
            'X' => (CoreOpt::DeleteChain, HasArg::Optional),
            'E' => (CoreOpt::RenameChain, HasArg::Required),
            'P' => (CoreOpt::Policy, HasArg::Required),
            'C' => (CoreOpt::Check, HasArg::Required),
            'V' => (CoreOpt::Version, HasArg::No),
            'h' => (CoreOpt::Help, HasArg::Optional),
            'o' => (CoreOpt::OutIface, HasArg::Required),
            's' => (CoreOpt::SourceIp, HasArg::Required),
            'd' => (CoreOpt::DestIp, HasArg::Required),
            'j' => (CoreOpt::Jump, HasArg::Required),
            'l' => (CoreOpt::HLength, HasArg::Required),
            'i' => (CoreOpt::InIface, HasArg::Required),
            'v' => (CoreOpt::Verbose, HasArg::No),
            'n' => (CoreOpt::Numeric, HasArg::No),
            't' => (CoreOpt::Table, HasArg::Required),
            'm' => (CoreOpt::Match, HasArg::Required),
            'c' => (CoreOpt::SetCounters, HasArg::Required),
            'x' => (CoreOpt::Exact, HasArg::No),
            _ => return None,
        };
        Some(opt)
    }
}
