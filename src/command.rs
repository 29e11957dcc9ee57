//! Administrative command definitions.

use bitflags::bitflags;
use std::fmt;

use crate::error::{Error, Result};

/// Command represents one administrative operation on a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Insert a rule at a position
    Insert,
    /// Delete a rule by content
    Delete,
    /// Delete a rule by position
    DeleteByNumber,
    /// Replace the rule at a position
    Replace,
    /// Append a rule to a chain
    Append,
    /// List chains and rules
    List,
    /// Remove every rule of a chain
    Flush,
    /// Reset counters of a chain
    Zero,
    /// Create a user-defined chain
    NewChain,
    /// Delete a user-defined chain
    DeleteChain,
    /// Set the policy of a built-in chain
    SetPolicy,
    /// Check whether a rule exists
    Check,
    /// Rename a user-defined chain
    RenameChain,
}

impl Command {
    /// All commands in matrix row order.
    pub const ALL: [Command; 13] = [
        Command::Insert,
        Command::Delete,
        Command::DeleteByNumber,
        Command::Replace,
        Command::Append,
        Command::List,
        Command::Flush,
        Command::Zero,
        Command::NewChain,
        Command::DeleteChain,
        Command::SetPolicy,
        Command::Check,
        Command::RenameChain,
    ];

    /// The single-bit set for this command.
    pub fn flag(self) -> CommandSet {
        match self {
            Command::Insert => CommandSet::INSERT,
            Command::Delete => CommandSet::DELETE,
            Command::DeleteByNumber => CommandSet::DELETE_NUM,
            Command::Replace => CommandSet::REPLACE,
            Command::Append => CommandSet::APPEND,
            Command::List => CommandSet::LIST,
            Command::Flush => CommandSet::FLUSH,
            Command::Zero => CommandSet::ZERO,
            Command::NewChain => CommandSet::NEW_CHAIN,
            Command::DeleteChain => CommandSet::DELETE_CHAIN,
            Command::SetPolicy => CommandSet::SET_POLICY,
            Command::Check => CommandSet::CHECK,
            Command::RenameChain => CommandSet::RENAME_CHAIN,
        }
    }

    /// Row index in the legality matrix.
    pub fn index(self) -> usize {
        self.flag().bits().trailing_zeros() as usize
    }

    /// Short flag used on the command line.
    pub fn short_flag(self) -> char {
        match self {
            Command::Insert => 'I',
            Command::Delete | Command::DeleteByNumber => 'D',
            Command::Replace => 'R',
            Command::Append => 'A',
            Command::List => 'L',
            Command::Flush => 'F',
            Command::Zero => 'Z',
            Command::NewChain => 'N',
            Command::DeleteChain => 'X',
            Command::SetPolicy => 'P',
            Command::Check => 'C',
            Command::RenameChain => 'E',
        }
    }

    /// Whether the command carries a rule specification.
    pub fn takes_rule(self) -> bool {
        matches!(
            self,
            Command::Append | Command::Insert | Command::Replace | Command::Delete | Command::Check
        )
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.short_flag())
    }
}

bitflags! {
    /// Set of selected commands.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandSet: u32 {
        const INSERT = 0x0001;
        const DELETE = 0x0002;
        const DELETE_NUM = 0x0004;
        const REPLACE = 0x0008;
        const APPEND = 0x0010;
        const LIST = 0x0020;
        const FLUSH = 0x0040;
        const ZERO = 0x0080;
        const NEW_CHAIN = 0x0100;
        const DELETE_CHAIN = 0x0200;
        const SET_POLICY = 0x0400;
        const CHECK = 0x0800;
        const RENAME_CHAIN = 0x1000;
    }
}

impl CommandSet {
    /// Iterate the commands present in this set.
    pub fn commands(self) -> impl Iterator<Item = Command> {
        Command::ALL
            .into_iter()
            .filter(move |cmd| self.contains(cmd.flag()))
    }

    /// The only command in the set, if exactly one is selected.
    pub fn single(self) -> Option<Command> {
        let mut iter = self.commands();
        match (iter.next(), iter.next()) {
            (Some(cmd), None) => Some(cmd),
            _ => None,
        }
    }

    /// Add a command, allowing it to coexist only with `compatible`.
    ///
    /// Selection is monotonic: once a command is chosen, choosing one
    /// outside `compatible` fails.
    pub fn add(&mut self, cmd: Command, compatible: CommandSet, invert: bool) -> Result<()> {
        if invert {
            return Err(Error::param("unexpected ! flag"));
        }
        let clash = self.difference(compatible);
        if let Some(existing) = clash.commands().next() {
            return Err(Error::param(format!(
                "Can't use -{} with -{}",
                cmd.short_flag(),
                existing.short_flag()
            )));
        }
        self.insert(cmd.flag());
        Ok(())
    }

    /// Replace the selection with a single command.
    ///
    /// Used when a trailing rule number turns `-D` into delete-by-number.
    pub fn set_only(&mut self, cmd: Command) {
        *self = cmd.flag();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_row_order() {
        for (i, cmd) in Command::ALL.iter().enumerate() {
            assert_eq!(cmd.index(), i);
        }
    }

    #[test]
    fn test_add_single_command() {
        let mut set = CommandSet::empty();
        set.add(Command::Append, CommandSet::empty(), false).unwrap();
        assert_eq!(set.single(), Some(Command::Append));
    }

    #[test]
    fn test_add_incompatible_command_fails() {
        let mut set = CommandSet::empty();
        set.add(Command::Append, CommandSet::empty(), false).unwrap();
        let err = set.add(Command::Flush, CommandSet::empty(), false).unwrap_err();
        assert_eq!(err.to_string(), "Can't use -F with -A");
        assert_eq!(set, CommandSet::APPEND);
    }

    #[test]
    fn test_list_and_zero_combine() {
        let mut set = CommandSet::empty();
        set.add(Command::List, CommandSet::ZERO, false).unwrap();
        set.add(Command::Zero, CommandSet::LIST, false).unwrap();
        assert_eq!(set, CommandSet::LIST | CommandSet::ZERO);
        assert_eq!(set.single(), None);
    }

    #[test]
    fn test_list_does_not_combine_with_append() {
        let mut set = CommandSet::empty();
        set.add(Command::Append, CommandSet::empty(), false).unwrap();
        assert!(set.add(Command::List, CommandSet::ZERO, false).is_err());
    }

    #[test]
    fn test_inverted_command_rejected() {
        let mut set = CommandSet::empty();
        let err = set.add(Command::Append, CommandSet::empty(), true).unwrap_err();
        assert_eq!(err.to_string(), "unexpected ! flag");
    }
}
