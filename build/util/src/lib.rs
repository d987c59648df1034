// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the board description to build for.
pub const BOARD_VAR: &str = "AMP_BOARD_CONFIG";

///
/// Pulls the board description for purposes of a build task. The path comes
/// from `$AMP_BOARD_CONFIG` if it is set, and is otherwise `default`
/// (normally the evaluation board file checked in under `boards/`).
///
/// As with any Serde target, `T` need only contain the tables a particular
/// build script cares about. Don't put `deny_unknown_fields` on `T` itself,
/// though the per-table types inside it should have it.
///
pub fn board_config<T: DeserializeOwned>(default: &Path) -> Result<T> {
    let path = board_path(default);
    println!("cargo:rerun-if-changed={}", path.display());

    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading board config {}", path.display()))?;
    println!("--- board config {} ---", path.display());
    println!("{}", text);

    toml_from_str(&text)
        .with_context(|| format!("parsing board config {}", path.display()))
}

/// Returns the board file that `board_config` would read.
pub fn board_path(default: &Path) -> PathBuf {
    // Emit this whether or not the variable is present, so that we'll be
    // re-run if it becomes present.
    println!("cargo:rerun-if-env-changed={}", BOARD_VAR);

    match env::var_os(BOARD_VAR) {
        Some(p) => PathBuf::from(p),
        None => {
            println!("--- ${} not present, using default ---", BOARD_VAR);
            default.to_owned()
        }
    }
}

/// Parses a TOML document into `T`.
pub fn toml_from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    struct Small {
        base_addr: u64,
        channels: u8,
    }

    #[test]
    fn parses_kebab_case() {
        let s: Small =
            toml_from_str("base-addr = 0x4000_0000\nchannels = 8\n").unwrap();
        assert_eq!(s.base_addr, 0x4000_0000);
        assert_eq!(s.channels, 8);
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "kebab-case", deny_unknown_fields)]
    struct Board {
        hwsem: Small,
    }

    #[test]
    fn rejects_misspelled_tables() {
        let good = "[hwsem]\nbase-addr = 1\nchannels = 2\n";
        let b: Board = toml_from_str(good).unwrap();
        assert_eq!(b.hwsem.channels, 2);

        let typo = "[hwsem]\nbase-addr = 1\nchannels = 2\n[hwsem2]\nx = 1\n";
        let r: Result<Board> = toml_from_str(typo);
        assert!(r.is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let r: Result<Small> =
            toml_from_str("base-addr = 1\nchannels = 2\nextra = 3\n");
        assert!(r.is_err());
    }
}
