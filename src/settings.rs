// Copyright (c) 2022 Octavian Oncescu
// Copyright (c) 2022 The Purplecoin Core developers
// Licensed under the Apache License, Version 2.0 see LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0 or the MIT license, see
// LICENSE-MIT or http://opensource.org/licenses/MIT

use crate::consensus::NETWORK_NAMES;
use config::{Config, ConfigError, File};
use log::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, metadata, File as FsFile};
use std::io::Write;
use std::path::{Path, PathBuf};
use struct_field_names_as_array::FieldNamesAsArray;

const ENV_PREFIX: &str = "coinvalidator";
const APP_DIR: &str = "CoinValidator";

#[derive(Debug, Serialize, Deserialize, Default, FieldNamesAsArray)]
pub struct Settings {
    /// Node settings.
    pub node: Node,

    /// Infraction registry settings.
    pub validator: Validator,
}

impl Settings {
    /// Reads settings from `config.toml` in the user configuration directory,
    /// writing a default one on first run, with environment overrides.
    pub fn new() -> Result<Self, ConfigError> {
        let mut config_path = dirs::config_dir()
            .ok_or_else(|| ConfigError::Message("no configuration directory".to_owned()))?;
        config_path.push(APP_DIR);
        config_path.push("config.toml");

        if metadata(&config_path).is_err() {
            write_default_config(&config_path);
        }

        Self::from_sources(&config_path, std::env::vars())
    }

    /// Builds settings from defaults, the optional configuration file at
    /// `config_path` and the given environment variables, in that order of
    /// precedence.
    pub fn from_sources<I>(config_path: &Path, env_source: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let default_settings = Settings::default();
        let mut s = Config::builder()
            .add_source(File::from(config_path.to_path_buf()).required(false));

        // Set defaults
        let defaults: HashMap<String, HashMap<String, DynamicConfVal>> =
            serde_yaml::from_value(
                serde_yaml::to_value(&default_settings)
                    .map_err(|err| ConfigError::Foreign(Box::new(err)))?,
            )
            .map_err(|err| ConfigError::Foreign(Box::new(err)))?;
        for (k1, inner) in &defaults {
            for (k2, v) in inner {
                match v {
                    DynamicConfVal::String(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.as_str())?;
                    }

                    DynamicConfVal::Bool(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.to_string())?;
                    }

                    DynamicConfVal::U64(v) => {
                        s = s.set_default(format!("{k1}.{k2}"), v.to_string())?;
                    }

                    DynamicConfVal::Option(v) => {
                        if let Some(v) = v {
                            s = s.set_default(format!("{k1}.{k2}"), v.as_str())?;
                        }
                    }
                }
            }
        }

        // Make sure to list these in order
        let settings_modules: Vec<_> = vec![
            Node::FIELD_NAMES_AS_ARRAY,
            Validator::FIELD_NAMES_AS_ARRAY,
        ];

        // Gather all possible settings keys
        let possible_keys: HashMap<String, &str> = Settings::FIELD_NAMES_AS_ARRAY
            .iter()
            .enumerate()
            .flat_map(|(i, field)| {
                settings_modules[i].iter().map(move |nested| {
                    (
                        format!(
                            "{}_{}_{}",
                            ENV_PREFIX,
                            field,
                            nested.split('_').collect::<Vec<_>>().join("")
                        ),
                        *nested,
                    )
                })
            })
            .collect();

        // Parse env vars manually and set overrides if they exist as the
        // config package `Environment` module seems to behave poorly.
        for (k, v) in env_source {
            let k = k.to_lowercase();

            if let Some(k_postfix) = possible_keys.get(&k) {
                // Filter empty values
                if v.is_empty() {
                    continue;
                }

                let mut k: Vec<_> = k.split('_').filter(|x| x != &ENV_PREFIX).collect();
                if let Some(last) = k.last_mut() {
                    *last = *k_postfix;
                }
                let k = k.join(".");

                s = s.set_override(k, v)?;
            }
        }

        s.build()?.try_deserialize()
    }

    /// Location of the infractions record file.
    ///
    /// Relative paths are resolved against `<data_dir>/<network_name>`.
    pub fn infractions_path(&self) -> PathBuf {
        let file = PathBuf::from(&self.validator.infractions_file);

        if file.is_absolute() {
            return file;
        }

        let mut path = PathBuf::from(&self.node.data_dir);
        path.push(&self.node.network_name);
        path.push(file);
        path
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if !NETWORK_NAMES.contains(&self.node.network_name.as_str()) {
            return Err("invalid network name");
        }

        if self.validator.infractions_file.is_empty() {
            return Err("empty infractions file name");
        }

        if let Some(checksum) = self.validator.infractions_checksum.as_ref() {
            if checksum.len() != 64 || hex::decode(checksum).is_err() {
                return Err("infractions checksum must be 32 bytes of hex");
            }
        }

        Ok(())
    }
}

fn write_default_config(config_path: &Path) {
    let settings_str = match toml::ser::to_string_pretty(&Settings::default()) {
        Ok(s) => s,
        Err(err) => {
            error!("Failed to serialize default configuration! Reason: {:#?}", err);
            return;
        }
    };

    if let Some(parent) = config_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            error!(
                "Failed to create configuration directory! Reason: {:#?}",
                err
            );
        }
    }

    // Create configuration file
    match FsFile::create(config_path) {
        Ok(mut file) => {
            file.write_all(settings_str.as_bytes()).unwrap_or(());
        }
        Err(err) => {
            // If this fails, do nothing and fall back to envionment variables
            error!("Failed to create configuration! Reason: {:#?}", err);
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Node {
    /// The network name the node is running on.
    #[serde(alias = "networkname")]
    pub network_name: String,

    /// Node data directory
    #[serde(alias = "datadir")]
    pub data_dir: String,
}

impl Default for Node {
    fn default() -> Self {
        let path = dirs::data_dir()
            .map(|mut path| {
                path.push(APP_DIR);
                path
            })
            .unwrap_or_else(|| PathBuf::from(APP_DIR));

        Self {
            network_name: "testnet".to_owned(), // Use testnet as default for now
            data_dir: path.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FieldNamesAsArray)]
pub struct Validator {
    /// Enable infraction checks. When disabled the registry is never loaded
    /// and every coin is considered valid.
    pub enabled: bool,

    /// Infractions record file. Relative to the network data directory
    /// unless absolute.
    #[serde(alias = "infractionsfile")]
    pub infractions_file: String,

    /// Block height up to which infractions are loaded at startup.
    #[serde(alias = "loadheight")]
    pub load_height: u64,

    /// If present, the record file must match this hex checksum.
    #[serde(alias = "infractionschecksum")]
    pub infractions_checksum: Option<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            enabled: true,
            infractions_file: "infractions.txt".to_owned(),
            load_height: u64::from(u32::MAX),
            infractions_checksum: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DynamicConfVal {
    String(String),
    Option(Option<String>),
    Bool(bool),
    U64(u64),
}
