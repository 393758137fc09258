//! Generates the list of `ZULIP_ARCHIVE_*` variables the binary actually reads,
//! so `status` can flag unknown keys in the environment.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

const QUOTED_PREFIX: &str = "\"ZULIP_ARCHIVE_";

fn walk_sources(dir: &Path, keys: &mut BTreeSet<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk_sources(&path, keys)?;
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            scan_literals(&fs::read_to_string(&path)?, keys);
        }
    }
    Ok(())
}

/// Only whole string literals count, so keys mentioned in docs or help text
/// never land on the allowlist.
fn scan_literals(source: &str, keys: &mut BTreeSet<String>) {
    for (start, _) in source.match_indices(QUOTED_PREFIX) {
        let rest = &source[start + 1..];
        let Some(end) = rest.find('"') else {
            continue;
        };
        let key = &rest[..end];
        let suffix = &key[QUOTED_PREFIX.len() - 1..];
        if !suffix.is_empty()
            && suffix
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
        {
            keys.insert(key.to_string());
        }
    }
}

fn main() {
    let mut keys = BTreeSet::new();
    walk_sources(Path::new("src"), &mut keys).expect("failed to scan src for env keys");

    let body = keys
        .iter()
        .map(|key| format!("    {key:?},\n"))
        .collect::<String>();
    let generated = format!("pub const GENERATED_ENV_ALLOWLIST: &[&str] = &[\n{body}];\n");
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(Path::new(&out_dir).join("zulip_archive_env_allowlist.rs"), generated)
        .expect("failed to write env allowlist");

    let stamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default();
    println!(
        "cargo:rustc-env=BUILD_UUID={:x}-{:x}",
        stamp.as_secs(),
        stamp.subsec_nanos()
    );
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=src");
}
