// src/vm/realm.rs
//! Execution realms

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which engine an instruction is executed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Realm {
    Local = 1,
    Remote = 2,
}

impl Realm {
    pub const ALL: [Realm; 2] = [Realm::Local, Realm::Remote];

    pub fn as_str(&self) -> &'static str {
        match self {
            Realm::Local => "local",
            Realm::Remote => "remote",
        }
    }
}

impl fmt::Display for Realm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_names() {
        let realm: Realm = serde_yaml::from_str("remote").unwrap();
        assert_eq!(realm, Realm::Remote);
        assert_eq!(serde_json::to_string(&Realm::Local).unwrap(), "\"local\"");
        assert_eq!(Realm::Remote.to_string(), "remote");
    }
}
