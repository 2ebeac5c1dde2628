#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests for the Yappr client.
//!
//! These tests verify that `Cargo.toml` keeps the project's panic-free lint
//! policy, feature layout and demo wiring. If any test fails, the manifest has
//! drifted from the agreed-upon standards.
//!
//! All checks are synchronous filesystem reads — no network access or async
//! runtime needed.

use std::path::PathBuf;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

/// Reads a file relative to the project root and returns its contents.
fn read_project_file(relative_path: &str) -> String {
    let path = project_root().join(relative_path);
    std::fs::read_to_string(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to read '{}': {}. This file is required by project policy.",
            path.display(),
            e
        )
    })
}

/// Parsed `Cargo.toml`.
fn manifest() -> toml::Table {
    read_project_file("Cargo.toml")
        .parse::<toml::Table>()
        .expect("Cargo.toml must be valid TOML")
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: panic_policy
// ─────────────────────────────────────────────────────────────────────────────

mod panic_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_has_all_panic_free_lints() {
        let manifest = manifest();
        let clippy = manifest["lints"]["clippy"]
            .as_table()
            .expect("Cargo.toml is missing [lints.clippy]");

        for lint in REQUIRED_DENY_LINTS {
            assert_eq!(
                clippy.get(*lint).and_then(|v| v.as_str()),
                Some("deny"),
                "Cargo.toml must set `{lint} = \"deny\"` in [lints.clippy]. \
                 All panic-prone lints must be set to deny level to enforce \
                 the project's panic-free policy in library code."
            );
        }
    }

    #[test]
    fn msrv_is_declared() {
        let manifest = manifest();
        let msrv = manifest["package"]["rust-version"]
            .as_str()
            .expect("package.rust-version must be set");
        assert!(
            msrv.split('.').count() == 3,
            "rust-version should be a full MAJOR.MINOR.PATCH version, got {msrv}"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: feature_layout
// ─────────────────────────────────────────────────────────────────────────────

mod feature_layout {
    use super::*;

    fn feature(name: &str) -> Vec<String> {
        let manifest = manifest();
        manifest["features"][name]
            .as_array()
            .unwrap_or_else(|| panic!("feature `{name}` is missing"))
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn websocket_transport_is_default() {
        assert_eq!(feature("default"), vec!["transport-websocket"]);
    }

    #[test]
    fn optional_stacks_are_feature_gated() {
        let manifest = manifest();
        let deps = manifest["dependencies"].as_table().unwrap();
        for dep in ["tokio-tungstenite", "futures-util", "reqwest"] {
            assert_eq!(
                deps[dep].get("optional").and_then(|v| v.as_bool()),
                Some(true),
                "`{dep}` must stay optional so the core builds without it"
            );
        }

        assert!(feature("transport-websocket").contains(&"dep:tokio-tungstenite".to_string()));
        assert!(feature("http-directory").contains(&"dep:reqwest".to_string()));
    }

    #[test]
    fn core_does_not_enable_full_tokio() {
        let manifest = manifest();
        let tokio_features: Vec<&str> = manifest["dependencies"]["tokio"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(
            !tokio_features.contains(&"full"),
            "library code must pick tokio features explicitly"
        );
        assert!(tokio_features.contains(&"time"), "reconnect timers need tokio/time");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: demos
// ─────────────────────────────────────────────────────────────────────────────

mod demos {
    use super::*;

    #[test]
    fn every_declared_demo_exists() {
        let manifest = manifest();
        let examples = manifest["example"].as_array().expect("[[example]] entries");
        assert!(!examples.is_empty());

        for example in examples {
            let path = example["path"].as_str().expect("example path");
            assert!(
                project_root().join(path).is_file(),
                "declared demo `{path}` does not exist"
            );
        }
    }

    #[test]
    fn demos_live_outside_examples_dir() {
        let manifest = manifest();
        for example in manifest["example"].as_array().unwrap() {
            let path = example["path"].as_str().unwrap();
            assert!(path.starts_with("demos/"), "demo `{path}` must live in demos/");
        }
    }
}
