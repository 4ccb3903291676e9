//! Server configuration (spec §6): a flat set of `redis.conf`-style knobs
//! loaded from a file via `confy`, with the same "missing file means
//! defaults" behavior the teacher's CLI config used.

use kv_rs::database::DatabaseOptions;
use kv_rs::persistence::AofOnError;
use serde_derive::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub dir: String,
    pub maxmemory: i64,
    pub maxmemory_policy: String,
    pub appendonly: bool,
    pub appendfilename: String,
    pub aof_on_error: String,
    pub dbfilename: String,
    pub requirepass: String,
    pub loglevel: String,
    pub logfile: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 6379,
            dir: ".".to_string(),
            maxmemory: 0,
            maxmemory_policy: "noeviction".to_string(),
            appendonly: false,
            appendfilename: "appendonly.aof".to_string(),
            aof_on_error: "log".to_string(),
            dbfilename: "dump.rdb".to_string(),
            requirepass: String::new(),
            loglevel: "info".to_string(),
            logfile: String::new(),
        }
    }
}

impl ServerConfig {
    /// Loads `path`, falling back to defaults if it doesn't exist yet — the
    /// same tolerant behavior the teacher's `ConfigLoad::new` had for a
    /// first-run CLI.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let file = PathBuf::from(path);
        if !file.exists() {
            return Ok(Self::default());
        }
        Ok(confy::load_path(&file)?)
    }

    fn dir(&self) -> PathBuf {
        PathBuf::from(&self.dir)
    }

    pub fn aof_path(&self) -> PathBuf {
        self.dir().join(&self.appendfilename)
    }

    pub fn rdb_path(&self) -> PathBuf {
        self.dir().join(&self.dbfilename)
    }

    pub fn to_database_options(&self) -> DatabaseOptions {
        DatabaseOptions {
            maxmemory: self.maxmemory,
            maxmemory_policy: self.maxmemory_policy.clone(),
            aof_enabled: self.appendonly,
            aof_path: Some(self.aof_path()),
            aof_on_error: AofOnError::from_config(&self.aof_on_error),
            rdb_path: Some(self.rdb_path()),
            requirepass: self.requirepass.clone(),
            ..DatabaseOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ServerConfig::load("/nonexistent/path/kv-server.toml").unwrap();
        assert_eq!(cfg.port, 6379);
        assert_eq!(cfg.bind, "127.0.0.1");
    }

    #[test]
    fn database_options_carry_persistence_paths() {
        let mut cfg = ServerConfig::default();
        cfg.dir = "/var/lib/kv-rs".to_string();
        let opts = cfg.to_database_options();
        assert_eq!(opts.aof_path, Some(PathBuf::from("/var/lib/kv-rs/appendonly.aof")));
        assert_eq!(opts.rdb_path, Some(PathBuf::from("/var/lib/kv-rs/dump.rdb")));
    }
}
