// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Path to a formula file
fn formula_arg() -> Arg {
    Arg::new("formula")
        .required(true)
        .value_name("FORMULA")
        .help("Path to the formula file")
}

/// Common argument: installation root
fn root_arg() -> Arg {
    Arg::new("root")
        .short('r')
        .long("root")
        .default_value("/opt/formulary")
        .help("Installation root")
}

/// Options shared by commands that touch the installation root
fn kitchen_args() -> Vec<Arg> {
    vec![
        root_arg(),
        Arg::new("source_cache")
            .long("source-cache")
            .value_name("DIR")
            .help("Directory for cached sources and bottles (default: <root>/cache/sources)"),
        Arg::new("jobs")
            .short('j')
            .long("jobs")
            .value_name("N")
            .help("Number of parallel build jobs (default: available CPUs)"),
        Arg::new("platform")
            .long("platform")
            .value_name("TAG")
            .help("Platform tag used to pick a bottle (default: host platform)"),
        Arg::new("service_format")
            .long("service-format")
            .visible_alias("format")
            .value_parser(["launchd", "systemd"])
            .help("Service descriptor format (default: host supervisor)"),
    ]
}

fn flag(id: &'static str, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .long(long)
        .action(clap::ArgAction::SetTrue)
        .help(help)
}

fn build_cli() -> Command {
    Command::new("formulary")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Formulary Contributors")
        .about("Verify, build and install software from declarative formulas")
        .subcommand_required(false)
        .subcommand(
            Command::new("cook")
                .about("Cook a formula: verify, build or pour, and install it")
                .arg(formula_arg())
                .args(kitchen_args())
                .arg(
                    flag(
                        "build_from_source",
                        "build-from-source",
                        "Ignore bottles and always build from source",
                    )
                    .short('s'),
                )
                .arg(flag(
                    "inherit_env",
                    "inherit-env",
                    "Start build steps from the full ambient environment",
                ))
                .arg(
                    Arg::new("step_timeout")
                        .long("step-timeout")
                        .value_name("SECONDS")
                        .help("Abort any single step after this many seconds"),
                )
                .arg(flag(
                    "keep_builddir",
                    "keep-builddir",
                    "Keep the build directory after completion",
                ))
                .arg(
                    flag("verbose", "verbose", "Print the captured build log after a successful install")
                        .short('v'),
                ),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch and verify a formula's source and matching bottle")
                .arg(formula_arg())
                .args(kitchen_args()),
        )
        .subcommand(
            Command::new("verify")
                .about("Verify a local file against a checksum")
                .arg(Arg::new("file").required(true).help("File to check"))
                .arg(
                    Arg::new("checksum")
                        .required(true)
                        .help("Expected checksum, e.g. sha256:<hex>"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Parse and validate a formula without cooking it")
                .arg(formula_arg()),
        )
        .subcommand(
            Command::new("deps")
                .about("Show a formula's dependencies")
                .arg(formula_arg())
                .arg(
                    Arg::new("scope")
                        .long("scope")
                        .value_parser(["build", "runtime"])
                        .help("Only show build or runtime dependencies"),
                ),
        )
        .subcommand(
            Command::new("service")
                .about("Print the service descriptor a formula would install")
                .arg(formula_arg())
                .args(kitchen_args()),
        )
        .subcommand(
            Command::new("caveats")
                .about("Print a formula's post-install caveats")
                .arg(formula_arg())
                .args(kitchen_args()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("formulary.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
        return;
    }

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
