use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flowcalc::{Editor, Format, LoadReport, summary};

#[derive(Parser)]
#[command(name = "flowcalc", about = "Inspect, evaluate and convert flow diagram documents")]
struct Cli {
    /// Input format (detected from the file contents if not provided)
    #[arg(long, short = 'f', global = true)]
    format: Option<Format>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate the diagram and print the result
    Eval { file: PathBuf },
    /// Rewrite a document in another format
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Output format (taken from the output extension if not provided)
        #[arg(long)]
        to: Option<Format>,
    },
    /// List the nodes and edges of a document
    Show { file: PathBuf },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("FLOWCALC_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut editor = Editor::default();

    match cli.command {
        Command::Eval { file } => {
            open(&mut editor, &file, cli.format);
            match editor.evaluate() {
                Ok(result) => println!("{result}"),
                Err(e) => fail(e),
            }
        }
        Command::Convert { input, output, to } => {
            open(&mut editor, &input, cli.format);
            let format = to.unwrap_or_else(|| Format::from_path(&output));
            if let Err(e) = editor.save(&output, format) {
                fail(format!("failed to write {}: {e}", output.display()));
            }
        }
        Command::Show { file } => {
            open(&mut editor, &file, cli.format);
            print!("{}", summary::render(editor.store()));
        }
    }
}

fn open(editor: &mut Editor, path: &Path, format: Option<Format>) {
    let loaded: flowcalc::Result<LoadReport> = match format {
        Some(format) => editor.load(path, format),
        None => editor.load_auto(path),
    };
    match loaded {
        Ok(report) => {
            for dropped in &report.dropped {
                eprintln!("WARNING: {dropped}");
            }
        }
        Err(e) => fail(format!("failed to read {}: {e}", path.display())),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {message}");
    std::process::exit(1);
}
