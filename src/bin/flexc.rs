use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flexc::Compilation;
use flexc::flexc_core::{CompilerConfig, Diagnostic, DiagnosticKind, LocalizationManager};

/// Compile ABC blocks and resource bundles into a class table.
#[derive(Parser, Debug)]
#[command(name = "flexc", version, about, long_about = None)]
struct Cli {
    /// `.abc` and `.properties` files to compile
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Skip the check of constant initializers against their declared types
    #[arg(long)]
    no_strict: bool,

    /// Locale used for messages and unqualified bundles
    #[arg(long, default_value = flexc::flexc_core::l10n::DEFAULT_LOCALE)]
    locale: String,

    /// Hide warnings
    #[arg(long)]
    no_warnings: bool,

    /// Treat style conflicts as errors
    #[arg(long)]
    strict_styles: bool,

    /// Target Flash Player major version
    #[arg(long, value_name = "MAJOR", default_value_t = 10)]
    target_player: u32,

    /// Print the names of the registered classes
    #[arg(long)]
    list_classes: bool,

    /// Write the bytecode of every unit into this directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> CompilerConfig {
        let styles = if self.strict_styles {
            DiagnosticKind::Error
        } else {
            DiagnosticKind::Warning
        };
        CompilerConfig::new()
            .with_strict(!self.no_strict)
            .with_locale(self.locale.clone())
            .with_show_warnings(!self.no_warnings)
            .with_style_conflict_severity(styles)
            .with_target_player_major(self.target_player)
    }
}

fn report(diagnostics: &[Diagnostic], l10n: &LocalizationManager) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostic.render(l10n));
    }
}

fn main() -> ExitCode {
    if let Ok(filter) = EnvFilter::try_from_env("FLEXC_LOG") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    }

    let cli = Cli::parse();
    let l10n = LocalizationManager::new(cli.locale.clone());

    let mut compilation = Compilation::new(cli.config());
    for file in &cli.files {
        compilation.add_path(file);
    }

    let succeeded = match compilation.build() {
        Ok(build) => {
            report(&build.diagnostics, &l10n);
            if cli.list_classes {
                for name in build.classes.keys() {
                    println!("{name}");
                }
            }
            match &cli.output {
                Some(dir) => write_bytecode(dir, &build.bytecode),
                None => true,
            }
        }
        Err(err) => {
            report(err.diagnostics(), &l10n);
            eprintln!("error: {err}");
            false
        }
    };

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_bytecode(dir: &std::path::Path, bytecode: &indexmap::IndexMap<String, Vec<u8>>) -> bool {
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("error: cannot create '{}': {err}", dir.display());
        return false;
    }
    for (name, bytes) in bytecode.iter().filter(|(_, b)| !b.is_empty()) {
        let stem = std::path::Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        let path = dir.join(format!("{stem}.abc"));
        if let Err(err) = std::fs::write(&path, bytes) {
            eprintln!("error: cannot write '{}': {err}", path.display());
            return false;
        }
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote bytecode");
    }
    true
}
