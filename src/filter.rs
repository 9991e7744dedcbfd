//! Turns a filter sequence into a list of account/role associations.
//!
//! Filters work on a buffer of accounts, much like the expressions of GNU
//! `find`: `--include-only` and `--exclude` narrow the buffer, `--assoc` and
//! `--assoc-default` move every account left in the buffer into the result
//! (one association per role) and empty the buffer, `--reset` refills it with
//! every account. An `--assoc-default` always closes the sequence.
//!
//! The associations produced here are candidates only: the role may not exist
//! on the account. The executor validates them.

use crate::aws_sso::{Account, Association};
use crate::error::{Error, Result};
use regex::Regex;
use tracing::debug;

#[derive(Debug, Clone)]
pub enum FilterOp {
    Reset,
    IncludeOnly(Regex),
    Exclude(Regex),
    Assoc(Vec<String>),
    AssocDefault,
}

impl FilterOp {
    /// Parses filter tokens, compiling every pattern up front.
    pub fn parse_all(tokens: &[String]) -> Result<Vec<FilterOp>> {
        let mut ops = Vec::new();
        let mut argv = tokens;
        while let Some((flag, rest)) = argv.split_first() {
            let (op, consumed) = match flag.as_str() {
                "--reset" => (FilterOp::Reset, 1),
                "--assoc-default" => (FilterOp::AssocDefault, 1),
                "--include-only" => (FilterOp::IncludeOnly(compile(parameter(flag, rest)?)?), 2),
                "--exclude" => (FilterOp::Exclude(compile(parameter(flag, rest)?)?), 2),
                "--assoc" => {
                    let roles = parameter(flag, rest)?.split(',').map(String::from).collect();
                    (FilterOp::Assoc(roles), 2)
                }
                other => return Err(Error::UnexpectedFilterArgument(other.to_string())),
            };
            ops.push(op);
            argv = &argv[consumed..];
        }
        Ok(ops)
    }
}

fn parameter<'a>(flag: &str, rest: &'a [String]) -> Result<&'a str> {
    rest.first()
        .map(String::as_str)
        .ok_or_else(|| Error::MissingFilterParameter(flag.to_string()))
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Working state of the pipeline.
struct Pipeline<'a> {
    accounts: &'a [Account],
    buffer: Vec<&'a Account>,
    result: Vec<Association>,
}

impl<'a> Pipeline<'a> {
    fn new(accounts: &'a [Account]) -> Self {
        Self {
            accounts,
            buffer: accounts.iter().collect(),
            result: Vec::new(),
        }
    }

    fn apply(mut self, op: &FilterOp, default_role: &str) -> Self {
        match op {
            FilterOp::Reset => self.buffer = self.accounts.iter().collect(),
            FilterOp::IncludeOnly(regex) => {
                self.buffer.retain(|account| regex.is_match(&account.account_name))
            }
            FilterOp::Exclude(regex) => {
                self.buffer.retain(|account| !regex.is_match(&account.account_name))
            }
            FilterOp::Assoc(roles) => self.associate(roles.as_slice()),
            FilterOp::AssocDefault => self.associate(&[default_role]),
        }
        self
    }

    fn associate<S: AsRef<str>>(&mut self, roles: &[S]) {
        for account in self.buffer.drain(..) {
            for role in roles {
                self.result.push(Association::new(account, role.as_ref()));
            }
        }
    }
}

/// Interprets filters left to right, closing with an implicit `--assoc-default`.
pub fn apply_filters(
    ops: &[FilterOp],
    accounts: &[Account],
    default_role: &str,
) -> Vec<Association> {
    let pipeline = ops
        .iter()
        .chain(std::iter::once(&FilterOp::AssocDefault))
        .fold(Pipeline::new(accounts), |pipeline, op| {
            pipeline.apply(op, default_role)
        });
    debug!(
        "{} accounts yield {} candidate associations",
        accounts.len(),
        pipeline.result.len()
    );
    pipeline.result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts() -> Vec<Account> {
        vec![
            Account::new("111111111111", "prod-payments"),
            Account::new("222222222222", "staging-payments"),
            Account::new("333333333333", "prod-search"),
            Account::new("444444444444", "playground"),
        ]
    }

    fn filter_accounts(
        tokens: &[String],
        accounts: &[Account],
        default_role: &str,
    ) -> Result<Vec<Association>> {
        let ops = FilterOp::parse_all(tokens)?;
        Ok(apply_filters(&ops, accounts, default_role))
    }

    fn tokens(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    fn pairs(associations: &[Association]) -> Vec<(&str, &str)> {
        associations
            .iter()
            .map(|a| (a.account_name.as_str(), a.role.as_str()))
            .collect()
    }

    #[test]
    fn test_no_filters_selects_every_account_with_default_role() {
        let accounts = accounts();
        let result = filter_accounts(&[], &accounts, "R").unwrap();
        assert_eq!(result.len(), accounts.len());
        for (association, account) in result.iter().zip(&accounts) {
            assert_eq!(association.account_id, account.account_id);
            assert_eq!(association.account_name, account.account_name);
            assert_eq!(association.role, "R");
        }
    }

    #[test]
    fn test_include_only_searches_anywhere() {
        let accounts = accounts();
        let result =
            filter_accounts(&tokens(&["--include-only", "payments"]), &accounts, "R").unwrap();
        assert_eq!(
            pairs(&result),
            vec![("prod-payments", "R"), ("staging-payments", "R")]
        );
    }

    #[test]
    fn test_include_then_exclude() {
        let accounts = accounts();
        let forward = filter_accounts(
            &tokens(&["--include-only", "^prod", "--exclude", "search"]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(pairs(&forward), vec![("prod-payments", "R")]);

        // narrowing by predicates commutes
        let reversed = filter_accounts(
            &tokens(&["--exclude", "search", "--include-only", "^prod"]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(pairs(&forward), pairs(&reversed));
    }

    #[test]
    fn test_assoc_multiple_roles_keeps_order() {
        let accounts = accounts();
        let result = filter_accounts(
            &tokens(&["--include-only", "payments", "--assoc", "A,B"]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(
            pairs(&result),
            vec![
                ("prod-payments", "A"),
                ("prod-payments", "B"),
                ("staging-payments", "A"),
                ("staging-payments", "B"),
            ]
        );
    }

    #[test]
    fn test_assoc_exhausts_buffer() {
        let accounts = accounts();
        let result = filter_accounts(
            &tokens(&["--assoc", "A", "--include-only", "prod", "--assoc", "B"]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(result.len(), accounts.len());
        assert!(result.iter().all(|a| a.role == "A"));
    }

    #[test]
    fn test_reset_restores_original_accounts() {
        let accounts = accounts();
        let result = filter_accounts(
            &tokens(&[
                "--include-only",
                "playground",
                "--assoc",
                "Sandbox",
                "--reset",
                "--include-only",
                "prod",
            ]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(
            pairs(&result),
            vec![
                ("playground", "Sandbox"),
                ("prod-payments", "R"),
                ("prod-search", "R"),
            ]
        );
    }

    #[test]
    fn test_reset_ignores_earlier_narrowing() {
        let accounts = accounts();
        let result = filter_accounts(
            &tokens(&["--exclude", "prod", "--reset"]),
            &accounts,
            "R",
        )
        .unwrap();
        assert_eq!(result.len(), accounts.len());
    }

    #[test]
    fn test_assoc_default_uses_default_role() {
        let accounts = accounts();
        let result = filter_accounts(
            &tokens(&["--include-only", "search", "--assoc-default"]),
            &accounts,
            "ReadOnly",
        )
        .unwrap();
        assert_eq!(pairs(&result), vec![("prod-search", "ReadOnly")]);
    }

    #[test]
    fn test_missing_filter_parameter() {
        let err = filter_accounts(&tokens(&["--exclude"]), &accounts(), "R").unwrap_err();
        assert!(matches!(err, Error::MissingFilterParameter(ref arg) if arg == "--exclude"));
    }

    #[test]
    fn test_unexpected_filter_argument() {
        let err = filter_accounts(&tokens(&["--bogus"]), &accounts(), "R").unwrap_err();
        assert!(matches!(err, Error::UnexpectedFilterArgument(ref arg) if arg == "--bogus"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err =
            filter_accounts(&tokens(&["--include-only", "prod("]), &accounts(), "R").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "prod("));
    }
}
