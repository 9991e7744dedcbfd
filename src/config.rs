use crate::error::{Error, Result};
use aws_config::SdkConfig;
use aws_sdk_sso::config::Region;
use ini::{Ini, Properties};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_PROFILE: &str = "default";

/// The `[sso-session NAME]` section a profile points at.
#[derive(Debug, PartialEq, Clone)]
pub struct SsoSessionConfig {
    pub name: String,
    pub start_url: String,
    pub region: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Profile {
    pub name: String,
    pub sso_role_name: String,
    pub sso_session: SsoSessionConfig,
}

pub struct Config {
    config: Ini,
    aws_sso_cache_path: PathBuf,
}

impl Config {
    pub fn load_from_env() -> Result<Self> {
        let home = std::env::var("HOME")
            .or(std::env::var("USERPROFILE"))
            .map_err(|_| Error::HomeNotFound)?;
        let aws_path = PathBuf::from(home).join(".aws");
        let config_file = match std::env::var("AWS_CONFIG_FILE") {
            Ok(cfg_file) => PathBuf::from(cfg_file),
            Err(_) => aws_path.join("config"),
        };
        let config = Ini::load_from_file(&config_file).unwrap_or_else(|err| {
            debug!("Unable to read {}: {}", config_file.display(), err);
            Ini::new()
        });
        Ok(Self::new(config, aws_path.join("sso/cache")))
    }

    pub fn new(config: Ini, aws_sso_cache_path: PathBuf) -> Self {
        Self {
            config,
            aws_sso_cache_path,
        }
    }

    /// Resolves `name`, `$AWS_PROFILE` or `default` to an SSO profile.
    pub fn profile(&self, name: Option<&str>) -> Result<Profile> {
        let name = match name {
            Some(name) => String::from(name),
            None => std::env::var("AWS_PROFILE").unwrap_or(String::from(DEFAULT_PROFILE)),
        };
        let section = self
            .profile_section(&name)
            .ok_or_else(|| Error::ProfileNotFound(name.clone()))?;
        let sso_session = required(section, &name, "sso_session")?;
        let sso_role_name = required(section, &name, "sso_role_name")?;

        let session_section = self
            .config
            .section(Some(format!("sso-session {}", sso_session)))
            .ok_or_else(|| Error::InvalidSsoProfile {
                profile: name.clone(),
                field: format!("sso-session {}", sso_session),
            })?;
        let sso_session = SsoSessionConfig {
            start_url: required(session_section, &name, "sso_start_url")?,
            region: required(session_section, &name, "sso_region")?,
            name: sso_session,
        };
        Ok(Profile {
            name,
            sso_role_name,
            sso_session,
        })
    }

    fn profile_section(&self, name: &str) -> Option<&Properties> {
        let section = self.config.section(Some(format!("profile {}", name)));
        if name == DEFAULT_PROFILE {
            return self.config.section(Some(DEFAULT_PROFILE)).or(section);
        }
        section
    }

    fn cache_file(&self, name: &str) -> PathBuf {
        let mut hasher = Sha1::new();
        hasher.update(name.as_bytes());
        self.aws_sso_cache_path
            .join(format!("{:x}.json", hasher.finalize()))
    }

    pub fn load_sso_cache<T>(&self, name: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let path = self.cache_file(name);
        let file = File::open(&path).ok()?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("Ignoring token cache {}: {}", path.display(), err);
                None
            }
        }
    }

    pub fn write_sso_cache<T>(&self, name: &str, data: &T) -> Result<()>
    where
        T: Serialize,
    {
        create_dir_all(&self.aws_sso_cache_path)?;
        let file = File::create(self.cache_file(name))?;
        let write = BufWriter::new(file);
        serde_json::to_writer_pretty(write, data)?;
        Ok(())
    }

    pub async fn load_sdk_config(&self, region: &str) -> SdkConfig {
        // https://github.com/awslabs/aws-sdk-rust/issues/699
        let old_var = std::env::var("AWS_CONFIG_FILE").ok();
        std::env::set_var("AWS_CONFIG_FILE", "WORKAROUND_ISSUE_699");
        let aws_config = aws_config::from_env()
            .region(Region::new(String::from(region)))
            .load()
            .await;
        match old_var {
            Some(cfg_file) => std::env::set_var("AWS_CONFIG_FILE", cfg_file),
            None => std::env::remove_var("AWS_CONFIG_FILE"),
        }
        aws_config
    }
}

fn required(section: &Properties, profile: &str, field: &str) -> Result<String> {
    section
        .get(field)
        .map(String::from)
        .ok_or_else(|| Error::InvalidSsoProfile {
            profile: String::from(profile),
            field: String::from(field),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::path::Path;

    const CONFIG: &str = r#"
[default]
sso_session = corp
sso_account_id = 1234567890
sso_role_name = Default
region = us-east-1

[profile example]
sso_session = corp
sso_account_id = 1234567890
sso_role_name = ReadOnly
region = us-east-1

[profile no-role]
sso_session = corp

[profile legacy]
aws_access_key_id = AKID

[profile dangling]
sso_session = missing
sso_role_name = ReadOnly

[sso-session corp]
sso_start_url = https://x-abcdef0123.awsapps.com/start
sso_region = eu-west-1
sso_registration_scopes = sso:account:access
        "#;

    fn config(cache: &Path) -> Config {
        Config::new(Ini::load_from_str(CONFIG).unwrap(), cache.to_path_buf())
    }

    #[test]
    fn test_load_profile() {
        let dir = tempfile::tempdir().unwrap();
        let profile = config(dir.path()).profile(Some("example")).unwrap();
        assert_eq!(
            profile,
            Profile {
                name: String::from("example"),
                sso_role_name: String::from("ReadOnly"),
                sso_session: SsoSessionConfig {
                    name: String::from("corp"),
                    start_url: String::from("https://x-abcdef0123.awsapps.com/start"),
                    region: String::from("eu-west-1"),
                },
            }
        );
    }

    #[test]
    fn test_default_profile_section() {
        let dir = tempfile::tempdir().unwrap();
        let profile = config(dir.path()).profile(Some("default")).unwrap();
        assert_eq!(profile.sso_role_name, "Default");
    }

    #[test]
    fn test_profile_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let err = config.profile(Some("nope")).unwrap_err();
        assert!(matches!(err, Error::ProfileNotFound(ref name) if name == "nope"));

        let err = config.profile(Some("legacy")).unwrap_err();
        assert!(matches!(err, Error::InvalidSsoProfile { ref field, .. } if field == "sso_session"));

        let err = config.profile(Some("no-role")).unwrap_err();
        assert!(
            matches!(err, Error::InvalidSsoProfile { ref field, .. } if field == "sso_role_name")
        );

        let err = config.profile(Some("dangling")).unwrap_err();
        assert!(
            matches!(err, Error::InvalidSsoProfile { ref field, .. } if field == "sso-session missing")
        );
    }

    #[test]
    fn test_sso_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("sso/cache");
        let config = config(&cache_dir);
        assert_eq!(config.load_sso_cache::<Value>("corp"), None);

        let cache = json!({"startUrl": "https://x-abcdef0123.awsapps.com/start"});
        config.write_sso_cache("corp", &cache).unwrap();
        assert_eq!(config.load_sso_cache::<Value>("corp"), Some(cache));

        // file name is the sha1 of the session name, as the aws cli does
        assert!(cache_dir
            .join("ee0bfd2552fbd840c02cc48b6e823320543c450f.json")
            .exists());
    }
}
