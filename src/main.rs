use jclassfile::jvm::class_file::ClassFile;
use jclassfile::jvm::code::{flow, OpcodeCounter};
use jclassfile::jvm::Error;

use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;
use walkdir::WalkDir;

fn main() {
    let matches = Command::new("jclassfile")
        .version(crate_version!())
        .about("Inspect JVM class files and check that they re-encode byte for byte")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Log at debug level (unless RUST_LOG is set)"),
        )
        .subcommand(
            Command::new("count")
                .about("Print a histogram of the opcodes used by every method")
                .arg(path_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Parse and re-encode classes, reporting any that do not round-trip")
                .arg(path_arg()),
        )
        .get_matches();

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let failures = match matches.subcommand() {
        Some(("count", sub_matches)) => count(&class_files(sub_matches)),
        Some(("verify", sub_matches)) => verify(&class_files(sub_matches)),
        _ => unreachable!("a subcommand is required"),
    };

    exit(if failures > 0 { 1 } else { 0 })
}

fn path_arg() -> Arg {
    Arg::new("PATH")
        .help("Class files, or directories to search for class files")
        .required(true)
        .num_args(1..)
        .value_parser(value_parser!(PathBuf))
}

/// Expand the input paths into class files, walking directories recursively
fn class_files(matches: &ArgMatches) -> Vec<PathBuf> {
    let mut files = vec![];
    for path in matches.get_many::<PathBuf>("PATH").into_iter().flatten() {
        if path.is_file() {
            files.push(path.clone());
        } else {
            files.extend(
                WalkDir::new(path)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .map(|e| e.into_path())
                    .filter(|e| e.is_file() && e.extension().map_or(false, |ex| ex == "class")),
            );
        }
    }
    log::info!("Found {} class files", files.len());
    files
}

fn read_class(path: &Path) -> Result<(Vec<u8>, ClassFile), Error> {
    let bytes = fs::read(path)?;
    let class = ClassFile::parse(&bytes)?;
    Ok((bytes, class))
}

/// Returns the number of files that could not be counted
fn count(files: &[PathBuf]) -> usize {
    let mut counter = OpcodeCounter::new();
    let mut failures = 0;
    for file in files {
        let result = read_class(file).and_then(|(_, class)| counter.count_class(&class));
        if let Err(err) = result {
            log::error!("{}: {}", file.display(), err);
            failures += 1;
        }
    }
    print!("{}", counter);
    failures
}

enum Outcome {
    Ok,
    Mismatch { offset: usize, expected: usize, actual: usize },
    Error(Error),
}

fn verify_one(file: &Path) -> Outcome {
    let (bytes, class) = match read_class(file) {
        Ok(read) => read,
        Err(err) => return Outcome::Error(err),
    };

    for method in &class.methods {
        let code = match method.code() {
            Some(code) => code,
            None => continue,
        };
        let name = class.constants.utf8(method.name).unwrap_or("<invalid>");
        match flow::instruction_starts(&code.code, &class.constants) {
            Ok(starts) => {
                for handler in flow::misaligned_handlers(code, &starts) {
                    log::warn!(
                        "{}: method {} has an exception handler off instruction boundaries: {:?}",
                        file.display(),
                        name,
                        handler
                    );
                }
            }
            Err(err) => return Outcome::Error(err),
        }
    }

    let encoded = match class.to_bytes() {
        Ok(encoded) => encoded,
        Err(err) => return Outcome::Error(err),
    };
    if encoded == bytes {
        return Outcome::Ok;
    }
    let offset = bytes
        .iter()
        .zip(&encoded)
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| bytes.len().min(encoded.len()));
    Outcome::Mismatch {
        offset,
        expected: bytes.len(),
        actual: encoded.len(),
    }
}

/// Returns the number of files that do not round-trip
fn verify(files: &[PathBuf]) -> usize {
    let mut failures = 0;
    for file in files {
        match verify_one(file) {
            Outcome::Ok => log::debug!("{}: OK", file.display()),
            Outcome::Mismatch {
                offset,
                expected,
                actual,
            } => {
                failures += 1;
                println!(
                    "{}: re-encoded class differs at byte {} ({} bytes read, {} bytes written)",
                    file.display(),
                    offset,
                    expected,
                    actual
                );
            }
            Outcome::Error(err) => {
                failures += 1;
                println!("{}: {}", file.display(), err);
            }
        }
    }
    log::info!(
        "{} of {} classes round-trip",
        files.len() - failures,
        files.len()
    );
    failures
}
