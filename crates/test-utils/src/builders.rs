use std::fs;
use std::path::{Path, PathBuf};

use rcmd::config::ConfigFile;
use serde_json::{json, Map, Value};
use tempfile::TempDir;

/// Builder for inbound command messages.
pub struct RequestBuilder {
    token: String,
    msg_type: Option<String>,
    attrs: Map<String, Value>,
}

impl RequestBuilder {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            msg_type: Some("cmd".to_string()),
            attrs: Map::new(),
        }
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.attrs.insert("username".into(), json!(username));
        self.attrs.insert("password".into(), json!(password));
        self
    }

    pub fn cmd(mut self, cmd: &str) -> Self {
        self.attrs.insert("cmd".into(), json!(cmd));
        self
    }

    pub fn params(mut self, params: &[&str]) -> Self {
        self.attrs.insert("params".into(), json!(params));
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        let env = self
            .attrs
            .entry("env")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = env {
            map.insert(key.to_string(), json!(value));
        }
        self
    }

    pub fn msg_type(mut self, msg_type: Option<&str>) -> Self {
        self.msg_type = msg_type.map(str::to_string);
        self
    }

    pub fn build(self) -> Value {
        let mut msg = Map::new();
        if let Some(t) = self.msg_type {
            msg.insert("type".into(), json!(t));
        }
        msg.insert("token".into(), json!(self.token));
        msg.insert("attrs".into(), Value::Object(self.attrs));
        Value::Object(msg)
    }
}

/// A shadow-format credential file in a temporary directory.
pub struct ShadowFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl ShadowFixture {
    /// Users with SHA-512 crypt hashes of their passwords.
    pub fn with_users(users: &[(&str, &str)]) -> Self {
        let mut contents = String::from("# test shadow\n");
        for (user, password) in users {
            let hash = pwhash::sha512_crypt::hash(password).expect("hashing test password");
            contents.push_str(&format!("{user}:{hash}:19000:0:99999:7:::\n"));
        }
        Self::with_contents(&contents)
    }

    pub fn with_contents(contents: &str) -> Self {
        let dir = tempfile::tempdir().expect("creating temp dir");
        let path = dir.path().join("shadow");
        fs::write(&path, contents).expect("writing shadow fixture");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default config pointing at this shadow file.
    pub fn config(&self) -> ConfigFile {
        let mut cfg = ConfigFile::default();
        cfg.auth.shadow_path = self.path.clone();
        cfg
    }
}
