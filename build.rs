use std::env;
use std::process::Command;

fn git(args: &[&str]) -> String {
    Command::new("git")
        .args(args)
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .unwrap_or_else(|| "unknown".to_string())
        .trim()
        .to_string()
}

fn main() {
    #[cfg(feature = "esp-idf")]
    embuild::espidf::sysenv::output();

    // Build information
    let ts = time_format::now()
        .ok()
        .and_then(|now| time_format::strftime_local("%Y-%m-%d %H:%M:%S %Z", now).ok())
        .unwrap_or_else(|| "unknown".to_string());
    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]);
    let short_hash = git(&["rev-parse", "--short", "HEAD"]);

    println!("cargo:rustc-env=BUILD_TS={ts}");
    println!("cargo:rustc-env=BUILD_BRANCH={branch}");
    println!("cargo:rustc-env=BUILD_HASH={short_hash}");
    println!(
        "cargo:rustc-env=BUILD_PROFILE={}",
        env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())
    );
}
