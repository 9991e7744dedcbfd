//! Runs the selected command over candidate associations.
//!
//! Associations are handled one at a time, in order, and every result is
//! written as soon as it is known: the output is a single JSON array that
//! grows while the work progresses. Associations that turn out not to exist
//! are skipped silently; any other failure aborts the run and leaves the
//! array unterminated.

use crate::aws_sso::{Association, Credentials, Role, SsoProvider};
use crate::error::Result;
use crate::output::JsonArrayWriter;
use crate::process;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsString;
use std::io::Write;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsItem<'a> {
    #[serde(flatten)]
    association: &'a Association,
    access_key_id: &'a str,
    secret_access_key: &'a str,
    session_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecItem<'a> {
    #[serde(flatten)]
    association: &'a Association,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

pub struct Executor<'a, P> {
    session: &'a P,
    // roles per account id, fetched on first use
    roles: HashMap<String, Vec<Role>>,
}

impl<'a, P: SsoProvider> Executor<'a, P> {
    pub fn new(session: &'a P) -> Self {
        Self {
            session,
            roles: HashMap::new(),
        }
    }

    async fn account_roles(&mut self, account_id: &str) -> Result<&[Role]> {
        match self.roles.entry(String::from(account_id)) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_slice()),
            Entry::Vacant(entry) => {
                let roles = self.session.list_account_roles(account_id).await?;
                Ok(entry.insert(roles).as_slice())
            }
        }
    }

    async fn credentials(&self, assoc: &Association) -> Result<Option<Credentials>> {
        let credentials = self
            .session
            .get_credentials(&assoc.account_id, &assoc.role)
            .await?;
        match &credentials {
            Some(credentials) => debug!(
                "Credentials for `{}` as `{}` expire at {:?}",
                assoc.account_name, assoc.role, credentials.expiration
            ),
            None => debug!(
                "Skipping `{}` ({}): role `{}` is not available",
                assoc.account_name, assoc.account_id, assoc.role
            ),
        }
        Ok(credentials)
    }

    /// Writes the associations whose role exists in the account.
    pub async fn list_associations<W: Write>(
        &mut self,
        associations: &[Association],
        out: W,
    ) -> Result<W> {
        let mut array = JsonArrayWriter::new(out)?;
        for assoc in associations {
            let roles = self.account_roles(&assoc.account_id).await?;
            if !roles.iter().any(|role| role.role_name == assoc.role) {
                debug!(
                    "Skipping `{}` ({}): no role `{}`",
                    assoc.account_name, assoc.account_id, assoc.role
                );
                continue;
            }
            array.push(assoc)?;
        }
        array.finish()
    }

    /// Writes temporary credentials for each valid association.
    pub async fn fetch_credentials<W: Write>(
        &self,
        associations: &[Association],
        out: W,
    ) -> Result<W> {
        let mut array = JsonArrayWriter::new(out)?;
        for assoc in associations {
            let Some(credentials) = self.credentials(assoc).await? else {
                continue;
            };
            array.push(&CredentialsItem {
                association: assoc,
                access_key_id: &credentials.access_key_id,
                secret_access_key: &credentials.secret_access_key,
                session_token: &credentials.session_token,
            })?;
        }
        array.finish()
    }

    /// Runs `command` once per valid association with its credentials in
    /// the environment, writing the exit code and captured output of each run.
    pub async fn run_sequence<W: Write>(
        &self,
        command: &[OsString],
        associations: &[Association],
        out: W,
    ) -> Result<W> {
        let mut array = JsonArrayWriter::new(out)?;
        for assoc in associations {
            let Some(credentials) = self.credentials(assoc).await? else {
                continue;
            };
            let output = process::run(command, &credentials.env()).await?;
            debug!(
                "`{}` as `{}` exited with {}",
                assoc.account_name, assoc.role, output.exit_code
            );
            array.push(&ExecItem {
                association: assoc,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            })?;
        }
        array.finish()
    }
}
