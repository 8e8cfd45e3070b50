use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::Command;

const APP_PACKAGE: &str = "hudless_app";
const APPLE_TARGETS: [&str; 2] = ["aarch64-apple-darwin", "x86_64-apple-darwin"];
const DEFAULT_IDENTIFIER: &str = "dev.hudless.app";
// Ad-hoc signature.
const DEFAULT_IDENTITY: &str = "-";

/// Accessibility trust is granted to a code signature, so every build is
/// signed with the same identifier unless `--no-sign` is given.
#[derive(Debug, Clone, PartialEq)]
struct Options {
    targets: Vec<String>,
    release: bool,
    sign: bool,
    identifier: String,
    identity: String,
    app_args: Vec<String>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            targets: vec![],
            release: true,
            sign: true,
            identifier: DEFAULT_IDENTIFIER.to_string(),
            identity: DEFAULT_IDENTITY.to_string(),
            app_args: vec![],
        }
    }
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_default();
    let rest: Vec<String> = args.collect();
    match command.as_str() {
        "build-macos" => {
            let mut options = parse_options(rest)?;
            if options.targets.is_empty() {
                options.targets = APPLE_TARGETS.map(String::from).to_vec();
            }
            for target in &options.targets {
                build(target, &options)?;
            }
            Ok(())
        }
        "run-macos" => {
            let mut options = parse_options(rest)?;
            if options.targets.is_empty() {
                options.targets.push(host_target()?.to_string());
            }
            let [target] = options.targets.as_slice() else {
                bail!("run-macos takes a single --target");
            };
            let binary = build(target, &options)?;
            exec(Command::new(&binary).args(&options.app_args), &binary.display().to_string())
        }
        "reset-permission" => {
            let options = parse_options(rest)?;
            ensure_macos("reset-permission")?;
            exec(
                Command::new("tccutil").args(["reset", "Accessibility", &options.identifier]),
                "tccutil reset",
            )
        }
        "" | "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command: {other}");
        }
    }
}

fn parse_options(args: Vec<String>) -> Result<Options> {
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--target" => options.targets.push(value(&mut args, &arg)?),
            "--bundle-id" => options.identifier = value(&mut args, &arg)?,
            "--codesign-identity" => options.identity = value(&mut args, &arg)?,
            "--debug" => options.release = false,
            "--no-sign" => options.sign = false,
            "--" => {
                options.app_args = args.by_ref().collect();
                break;
            }
            other => bail!("unknown option: {other}"),
        }
    }
    if options.identifier.is_empty() || options.identifier.contains(char::is_whitespace) {
        bail!("invalid --bundle-id: {:?}", options.identifier);
    }
    Ok(options)
}

fn value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next().with_context(|| format!("missing value for {flag}"))
}

fn host_target() -> Result<&'static str> {
    ensure_macos("run-macos")?;
    match std::env::consts::ARCH {
        "aarch64" => Ok("aarch64-apple-darwin"),
        "x86_64" => Ok("x86_64-apple-darwin"),
        arch => bail!("unsupported macOS architecture: {arch}"),
    }
}

fn ensure_macos(command: &str) -> Result<()> {
    if !cfg!(target_os = "macos") {
        bail!("{command} only works when xtask runs on macOS");
    }
    Ok(())
}

fn exec(command: &mut Command, what: &str) -> Result<()> {
    let status = command.status().with_context(|| format!("failed to launch {what}"))?;
    if !status.success() {
        bail!("{what} exited with {status}");
    }
    Ok(())
}

fn binary_path(target: &str, release: bool) -> PathBuf {
    let profile = if release { "release" } else { "debug" };
    ["target", target, profile, APP_PACKAGE].iter().collect()
}

/// Builds one target and signs it; returns the binary path.
fn build(target: &str, options: &Options) -> Result<PathBuf> {
    let mut cargo = Command::new("cargo");
    cargo.args(["build", "--locked", "-p", APP_PACKAGE, "--target", target]);
    if options.release {
        cargo.arg("--release");
    }
    exec(&mut cargo, &format!("cargo build ({target})"))?;

    let binary = binary_path(target, options.release);
    if options.sign {
        ensure_macos("codesign")?;
        exec(
            Command::new("codesign")
                .args(["--force", "--sign", &options.identity, "--identifier", &options.identifier])
                .arg(&binary),
            "codesign",
        )?;
    }
    Ok(binary)
}

fn print_usage() {
    println!("usage: cargo run -p xtask -- <command> [options] [-- <app args>]");
    println!();
    println!("commands:");
    println!("  build-macos         build (and sign) each --target");
    println!("  run-macos           build, sign and run for one target (default: host)");
    println!("  reset-permission    forget the Accessibility grant for --bundle-id");
    println!();
    println!("options:");
    println!("  --target <triple>            repeatable (build-macos default: both Apple targets)");
    println!("  --debug                      debug profile (default: release)");
    println!("  --bundle-id <id>             signing identifier (default: {DEFAULT_IDENTIFIER})");
    println!("  --codesign-identity <id>     default: {DEFAULT_IDENTITY} (ad-hoc)");
    println!("  --no-sign                    skip codesign; Accessibility trust will not persist");
}
