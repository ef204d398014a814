use std::process::Command;

use anyhow::{Context, Result};

/// Feature sets of `dealflow-domain` that must compile.
const FEATURE_COMBINATIONS: &[&[&str]] = &[&[], &["ts-gen"]];

/// Check that all required feature combinations compile successfully.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} dealflow-domain feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, features) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        let label = if features.is_empty() { "default".to_string() } else { joined.clone() };

        let step = index + 1;
        let total = FEATURE_COMBINATIONS.len();
        println!("\n[{step}/{total}] cargo check -p dealflow-domain ({label})");

        let mut command = Command::new("cargo");
        command.args(["check", "-p", "dealflow-domain", "--no-default-features"]);
        if !features.is_empty() {
            command.arg("--features").arg(&joined);
        }

        let status = command
            .status()
            .with_context(|| format!("Failed to run cargo check for '{label}'"))?;
        if !status.success() {
            anyhow::bail!("Feature combination '{label}' failed to compile");
        }

        println!("✅ Features '{label}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());
    Ok(())
}
