//! Argument scanner.
//!
//! Works like `getopt_long` in "return in order" mode: options come back
//! one at a time, anything that is not an option comes back as
//! [`Token::Positional`] so `!` can be seen where it appears. Long names
//! are resolved through the caller's [`OptionNamespace`] on every call,
//! so options merged mid-scan are recognized from the next argument on.

use crate::error::{Error, Result};
use crate::namespace::{OptionNamespace, OptionOwner};
use crate::options::{CoreOpt, HasArg};

/// One scanned argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A recognized option and its argument
    Opt {
        owner: OptionOwner,
        code: u32,
        /// Spelling used in messages (long name or short letter)
        name: String,
        arg: Option<String>,
    },
    /// An argument that is not an option
    Positional(String),
}

/// Cursor over the command-line arguments.
pub struct Scanner<'a> {
    args: &'a [String],
    index: usize,
    /// Byte position inside a cluster of short options, 0 when none
    cluster: usize,
    /// Set once `--` was seen
    stopped: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(args: &'a [String]) -> Self {
        Self {
            args,
            index: 0,
            cluster: 0,
            stopped: false,
        }
    }

    /// Arguments not consumed yet.
    pub fn remaining(&self) -> &'a [String] {
        let args = self.args;
        &args[self.index.min(args.len())..]
    }

    /// Scan the next token.
    pub fn next_token(&mut self, namespace: &OptionNamespace) -> Option<Result<Token>> {
        if self.cluster > 0 {
            return Some(self.short());
        }
        if self.stopped {
            return None;
        }

        let args = self.args;
        let arg = args.get(self.index)?;
        if arg == "--" {
            self.index += 1;
            self.stopped = true;
            return None;
        }
        if arg == "-" || !arg.starts_with('-') {
            self.index += 1;
            return Some(Ok(Token::Positional(arg.clone())));
        }
        if let Some(body) = arg.strip_prefix("--") {
            self.index += 1;
            return Some(self.long(body, namespace));
        }

        self.cluster = 1;
        Some(self.short())
    }

    /// Consume the next argument if it does not look like an option or `!`.
    pub fn peek_positional(&mut self) -> Option<String> {
        if self.cluster > 0 || self.stopped {
            return None;
        }
        let arg = self.args.get(self.index)?;
        if arg.starts_with('-') || arg.starts_with('!') {
            return None;
        }
        self.index += 1;
        Some(arg.clone())
    }

    /// Consume the next argument unconditionally.
    pub fn take_next(&mut self) -> Option<String> {
        if self.cluster > 0 {
            return None;
        }
        let arg = self.args.get(self.index)?;
        self.index += 1;
        Some(arg.clone())
    }

    fn long(&mut self, body: &str, namespace: &OptionNamespace) -> Result<Token> {
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };
        let option = namespace.lookup(name)?;

        let arg = match option.has_arg {
            HasArg::No => {
                if inline.is_some() {
                    return Err(Error::param(format!(
                        "option `--{}' doesn't allow an argument",
                        option.name
                    )));
                }
                None
            }
            HasArg::Optional => inline.map(str::to_string),
            HasArg::Required => match inline {
                Some(value) => Some(value.to_string()),
                None => Some(self.take_next().ok_or_else(|| {
                    Error::param(format!("option `--{}' requires an argument", option.name))
                })?),
            },
        };

        Ok(Token::Opt {
            owner: option.owner,
            code: option.code,
            name: option.name.clone(),
            arg,
        })
    }

    fn short(&mut self) -> Result<Token> {
        let args = self.args;
        let arg = &args[self.index];
        let rest = &arg[self.cluster..];
        let Some(c) = rest.chars().next() else {
            self.end_cluster();
            return Err(Error::param(format!("Bad argument `{}'", arg)));
        };
        let after = &rest[c.len_utf8()..];

        let Some((opt, has_arg)) = CoreOpt::from_short(c) else {
            self.end_cluster();
            return Err(Error::param(format!("Unknown arg `-{}'", c)));
        };

        let arg = match has_arg {
            HasArg::No => {
                if after.is_empty() {
                    self.end_cluster();
                } else {
                    self.cluster += c.len_utf8();
                }
                None
            }
            HasArg::Optional => {
                self.end_cluster();
                (!after.is_empty()).then(|| after.to_string())
            }
            HasArg::Required => {
                self.end_cluster();
                if after.is_empty() {
                    Some(self.take_next().ok_or_else(|| {
                        Error::param(format!("option requires an argument -- '{}'", c))
                    })?)
                } else {
                    Some(after.to_string())
                }
            }
        };

        Ok(Token::Opt {
            owner: OptionOwner::Core(opt),
            code: opt.code(),
            name: c.to_string(),
            arg,
        })
    }

    fn end_cluster(&mut self) {
        self.cluster = 0;
        self.index += 1;
    }
}
