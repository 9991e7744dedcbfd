//! Splits the command line into a profile, a filter sequence and a command.
//!
//! Tokens come in three optional groups, always in this order:
//!
//! ```text
//! ssorepeat [--profile PROFILE] [FILTERS...] [list | creds | exec ARGS...]
//! ```
//!
//! `--help` is the odd one out. It is the program's own help only when it
//! appears before `exec` or right after it; anywhere else it belongs to the
//! command being repeated.

use crate::error::{Error, Result};
use std::ffi::OsString;

const HELP: &str = "--help";
const PROFILE: &str = "--profile";
const EXEC: &str = "exec";
const LIST: &str = "list";
const CREDS: &str = "creds";

/// Filter flags that take a parameter.
const FILTERS_WITH_PARAMETER: [&str; 3] = ["--include-only", "--exclude", "--assoc"];
/// Filter flags that stand alone.
const FILTERS_WITHOUT_PARAMETER: [&str; 2] = ["--assoc-default", "--reset"];

/// What to do with the selected associations.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub enum Command {
    #[default]
    List,
    Creds,
    /// The program and its arguments, passed on untouched.
    Exec(Vec<OsString>),
}

#[derive(Debug, PartialEq, Eq, Default, Clone)]
pub struct Arguments {
    pub show_help: bool,
    pub profile: Option<String>,
    pub filters: Vec<String>,
    pub command: Command,
}

impl Arguments {
    /// Parses `argv`, program name included.
    ///
    /// Only the tokens after `exec` may be invalid unicode; they belong to
    /// the repeated command.
    pub fn parse<I, S>(argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        // the first token is the program name
        let argv: Vec<OsString> = argv.into_iter().skip(1).map(Into::into).collect();

        if wants_help(&argv) {
            return Ok(Self {
                show_help: true,
                ..Self::default()
            });
        }

        let mut consumed = 0;

        let (consume, profile) = parse_profile(&argv)?;
        consumed += consume;

        let (consume, filters) = parse_filters(&argv, consumed)?;
        consumed += consume;

        let (consume, command) = parse_command(&argv[consumed..])?;
        consumed += consume;

        // leftovers are mistakes
        if let Some(arg) = argv.get(consumed) {
            return Err(invalid_argument(arg, consumed));
        }

        Ok(Self {
            show_help: false,
            profile,
            filters,
            command,
        })
    }
}

fn invalid_argument(arg: &OsString, index: usize) -> Error {
    Error::InvalidArgument {
        arg: arg.to_string_lossy().into_owned(),
        pos: index + 1,
    }
}

/// The token at `index` as text; a non-unicode token is an invalid argument.
fn text(argv: &[OsString], index: usize) -> Result<&str> {
    argv[index]
        .to_str()
        .ok_or_else(|| invalid_argument(&argv[index], index))
}

fn wants_help(argv: &[OsString]) -> bool {
    let Some(help_pos) = argv.iter().position(|arg| arg == HELP) else {
        return false;
    };
    match argv[..help_pos].iter().position(|arg| arg == EXEC) {
        Some(exec_pos) => exec_pos + 1 == help_pos,
        None => true,
    }
}

fn parse_profile(argv: &[OsString]) -> Result<(usize, Option<String>)> {
    match argv {
        [first] if first == PROFILE => Err(Error::MissingArgumentParameter(PROFILE.to_string())),
        [first, ..] if first == PROFILE => Ok((2, Some(text(argv, 1)?.to_string()))),
        _ => Ok((0, None)),
    }
}

fn parse_filters(argv: &[OsString], start: usize) -> Result<(usize, Vec<String>)> {
    let mut filters = Vec::new();
    let mut index = start;
    while let Some(flag) = argv.get(index).and_then(|arg| arg.to_str()) {
        if FILTERS_WITH_PARAMETER.contains(&flag) {
            if index + 1 == argv.len() {
                return Err(Error::MissingArgumentParameter(flag.to_string()));
            }
            filters.push(flag.to_string());
            filters.push(text(argv, index + 1)?.to_string());
            index += 2;
        } else if FILTERS_WITHOUT_PARAMETER.contains(&flag) {
            filters.push(flag.to_string());
            index += 1;
        } else {
            break;
        }
    }
    Ok((index - start, filters))
}

fn parse_command(argv: &[OsString]) -> Result<(usize, Command)> {
    match argv.first().and_then(|arg| arg.to_str()) {
        // everything after exec belongs to the repeated command
        Some(EXEC) if argv.len() == 1 => Err(Error::EmptyCommand),
        Some(EXEC) => Ok((argv.len(), Command::Exec(argv[1..].to_vec()))),
        Some(LIST) => Ok((1, Command::List)),
        Some(CREDS) => Ok((1, Command::Creds)),
        _ => Ok((0, Command::List)),
    }
}
