//! Profile file authentication (`~/.databrickscfg`)
//!
//! A machine without the file simply has nothing to offer, so a missing
//! file declines. A file that exists but does not describe the selected
//! profile completely is treated as a user error.

use super::chain::Authenticator;
use super::signer::{encode_basic_auth, HeaderSigner};
use super::types::Signer;
use crate::config::{ClientConfig, DEFAULT_CONFIG_FILE, DEFAULT_PROFILE};
use crate::error::{Error, Result};
use crate::types::{non_empty, AuthKind};
use async_trait::async_trait;
use ini::{Ini, Properties};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

/// Reads credentials from an ini-style profile file
#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileAuth;

#[async_trait]
impl Authenticator for ProfileAuth {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn resolve(&self, config: &mut ClientConfig) -> Result<Option<Signer>> {
        let config_file = non_empty(&config.config_file).unwrap_or(DEFAULT_CONFIG_FILE);
        let path = expand_home(config_file)?;
        let path_str = path.display().to_string();

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("{path_str} not found on current host");
                return Ok(None);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let ini = Ini::load_from_str(&content)
            .map_err(|e| Error::config(format!("cannot parse {path_str}: {e}")))?;

        let profile = match non_empty(&config.profile) {
            Some(profile) => profile.to_string(),
            None => {
                info!("Using {DEFAULT_PROFILE} profile from {path_str}");
                config.profile = Some(DEFAULT_PROFILE.to_string());
                DEFAULT_PROFILE.to_string()
            }
        };

        let section = match profile_section(&ini, &profile) {
            Some(section) if !section.is_empty() => section,
            _ => {
                return Err(Error::ProfileNotFound {
                    path: path_str,
                    profile,
                })
            }
        };
        let corrupt = |field: &str| Error::CorruptProfile {
            path: path_str.clone(),
            profile: profile.clone(),
            field: field.to_string(),
        };

        let host = section
            .get("host")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| corrupt("host"))?;
        config.host = Some(host.clone());

        let (kind, credential) = match (section.get("username"), section.get("password")) {
            (Some(username), Some(password)) => {
                (AuthKind::Basic, encode_basic_auth(username, password))
            }
            _ => (
                AuthKind::Bearer,
                section.get("token").cloned().unwrap_or_default(),
            ),
        };
        if credential.is_empty() {
            return Err(corrupt("token"));
        }

        info!("Using {kind} authentication from {path_str}");
        let signer = HeaderSigner::authorization(kind.scheme(), &credential)?;
        Ok(Some(Signer::new(kind, signer)))
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: &str) -> Result<PathBuf> {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(path));
    };

    let home = dirs::home_dir()
        .ok_or_else(|| Error::config(format!("cannot expand {path}: home directory is unknown")))?;
    Ok(home.join(rest))
}

/// Keys of a profile section.
///
/// Keys that appear before the first section header belong to `DEFAULT`.
fn profile_section(ini: &Ini, profile: &str) -> Option<HashMap<String, String>> {
    let mut values: HashMap<String, String> = HashMap::new();
    let mut found = false;

    if profile == DEFAULT_PROFILE {
        collect(ini.general_section(), &mut values);
    }
    if let Some(section) = ini.section(Some(profile)) {
        found = true;
        collect(section, &mut values);
    }

    (found || !values.is_empty()).then_some(values)
}

fn collect(properties: &Properties, into: &mut HashMap<String, String>) {
    for (key, value) in properties.iter() {
        into.insert(key.to_string(), value.to_string());
    }
}
