//! Command/option legality matrix.
//!
//! Each cell says whether an option is compulsory, optional or illegal
//! for a command. When several commands are selected (only `-L` with
//! `-Z` in practice) an option is accepted if *any* of them allows it.

use crate::command::{Command, CommandSet};
use crate::error::{Error, Result};
use crate::options::{OptionSet, NUMBER_OF_OPT};

/// Legality of one option under one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    /// Must be given
    Compulsory,
    /// May be given
    Optional,
    /// Must not be given
    Illegal,
}

impl Legality {
    fn from_char(c: u8) -> Self {
        match c {
            b'+' => Legality::Compulsory,
            b'x' => Legality::Illegal,
            _ => Legality::Optional,
        }
    }
}

type Row = [Legality; NUMBER_OF_OPT];

// Columns: -n -s -d --src-mac --dst-mac -l --p-length --opcode --h-type
// --proto-type -j -v -i -o --line-numbers -c
const STANDARD: [&[u8; NUMBER_OF_OPT]; 13] = [
    /* INSERT */ b"x             x ",
    /* DELETE */ b"x             xx",
    /* DELETE_NUM */ b"xxxxxxxxxxx xxxx",
    /* REPLACE */ b"x             x ",
    /* APPEND */ b"x             x ",
    /* LIST */ b" xxxxxxxxxx xx x",
    /* FLUSH */ b"xxxxxxxxxxx xxxx",
    /* ZERO */ b"xxxxxxxxxxx xxxx",
    /* NEW_CHAIN */ b"xxxxxxxxxxx xxxx",
    /* DELETE_CHAIN */ b"xxxxxxxxxxx xxxx",
    /* SET_POLICY */ b"xxxxxxxxxxx xxx ",
    /* CHECK */ b"x             xx",
    /* RENAME_CHAIN */ b"xxxxxxxxxxx xxxx",
];

/// Table of legal command/option combinations.
#[derive(Debug, Clone)]
pub struct LegalityMatrix {
    rows: [Row; 13],
}

impl LegalityMatrix {
    /// Build a matrix from one row per command, in `Command::ALL` order.
    ///
    /// Each row is a string of `+` (compulsory), `x` (illegal) or any
    /// other byte (optional), one per option column.
    pub fn from_rows(rows: [&[u8; NUMBER_OF_OPT]; 13]) -> Self {
        let mut out = [[Legality::Optional; NUMBER_OF_OPT]; 13];
        for (row, text) in out.iter_mut().zip(rows.iter()) {
            for (cell, c) in row.iter_mut().zip(text.iter()) {
                *cell = Legality::from_char(*c);
            }
        }
        Self { rows: out }
    }

    /// The matrix used by the command-line front-end.
    pub fn standard() -> Self {
        Self::from_rows(STANDARD)
    }

    /// Legality of `option` (a single flag) under `cmd`.
    pub fn cell(&self, cmd: Command, option: OptionSet) -> Legality {
        self.rows[cmd.index()][option.index()]
    }

    /// Validate the options used against the selected commands.
    pub fn check(&self, commands: CommandSet, options: OptionSet) -> Result<()> {
        for option in OptionSet::each() {
            // None: undecided, Some(true): legal, Some(false): illegal
            let mut legal: Option<bool> = None;

            for cmd in commands.commands() {
                let cell = self.cell(cmd, option);
                if !options.contains(option) {
                    if cell == Legality::Compulsory {
                        return Err(Error::param(format!(
                            "You need to supply the `{}' option for this command",
                            option.display_flag()
                        )));
                    }
                } else if cell != Legality::Illegal {
                    legal = Some(true);
                } else if legal.is_none() {
                    legal = Some(false);
                }
            }

            if legal == Some(false) {
                return Err(Error::param(format!(
                    "Illegal option `{}' with this command",
                    option.display_flag()
                )));
            }
        }
        Ok(())
    }
}

impl Default for LegalityMatrix {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_options() -> OptionSet {
        OptionSet::SOURCE_IP
            | OptionSet::DEST_IP
            | OptionSet::SOURCE_MAC
            | OptionSet::DEST_MAC
            | OptionSet::H_LENGTH
            | OptionSet::OPCODE
            | OptionSet::H_TYPE
            | OptionSet::P_TYPE
            | OptionSet::JUMP
            | OptionSet::IN_IFACE
            | OptionSet::OUT_IFACE
    }

    #[test]
    fn test_append_accepts_rule_options() {
        let matrix = LegalityMatrix::standard();
        let opts = rule_options() | OptionSet::VERBOSE | OptionSet::COUNTERS;
        assert!(matrix.check(CommandSet::APPEND, opts).is_ok());
        assert!(matrix.check(CommandSet::INSERT, opts).is_ok());
        assert!(matrix.check(CommandSet::REPLACE, opts).is_ok());
    }

    #[test]
    fn test_delete_rejects_counters() {
        let matrix = LegalityMatrix::standard();
        let err = matrix
            .check(CommandSet::DELETE, OptionSet::COUNTERS)
            .unwrap_err();
        assert_eq!(err.to_string(), "Illegal option `-c' with this command");
    }

    #[test]
    fn test_flush_rejects_rule_options() {
        let matrix = LegalityMatrix::standard();
        for option in rule_options().iter() {
            assert!(matrix.check(CommandSet::FLUSH, option).is_err());
        }
        assert!(matrix.check(CommandSet::FLUSH, OptionSet::VERBOSE).is_ok());
    }

    #[test]
    fn test_numeric_only_with_list() {
        let matrix = LegalityMatrix::standard();
        assert!(matrix.check(CommandSet::LIST, OptionSet::NUMERIC).is_ok());
        assert!(matrix.check(CommandSet::ZERO, OptionSet::NUMERIC).is_err());
        assert!(matrix.check(CommandSet::APPEND, OptionSet::NUMERIC).is_err());
    }

    #[test]
    fn test_list_zero_is_logical_or() {
        let matrix = LegalityMatrix::standard();
        let both = CommandSet::LIST | CommandSet::ZERO;
        // Legal under List only
        assert!(matrix.check(both, OptionSet::NUMERIC).is_ok());
        assert!(matrix.check(both, OptionSet::LINE_NUMBERS).is_ok());
        // Illegal under both
        assert!(matrix.check(both, OptionSet::SOURCE_IP).is_err());
    }

    #[test]
    fn test_every_single_command_rejects_iff_illegal() {
        let matrix = LegalityMatrix::standard();
        for cmd in Command::ALL {
            for option in OptionSet::each() {
                let result = matrix.check(cmd.flag(), option);
                let illegal = matrix.cell(cmd, option) == Legality::Illegal;
                assert_eq!(result.is_err(), illegal, "{} {:?}", cmd, option);
            }
        }
    }

    #[test]
    fn test_compulsory_option_missing() {
        let mut rows = STANDARD;
        rows[Command::SetPolicy.index()] = b"xxxxxxxxxx+ xxx ";
        let matrix = LegalityMatrix::from_rows(rows);
        let err = matrix
            .check(CommandSet::SET_POLICY, OptionSet::empty())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You need to supply the `-j' option for this command"
        );
        assert!(matrix.check(CommandSet::SET_POLICY, OptionSet::JUMP).is_ok());
    }

    #[test]
    fn test_unselected_commands_ignored() {
        let matrix = LegalityMatrix::standard();
        assert!(matrix.check(CommandSet::empty(), OptionSet::all()).is_ok());
    }
}
