use clap::{Parser as ClapParser, Subcommand, ValueEnum};
use md_tom::Parser;
use std::io::Read;
use std::path::PathBuf;

#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parses a message source and prints it in the chosen format
    Render {
        #[arg(long, value_enum, default_value_t = Format::Api)]
        format: Format,
        /// Source file; stdin when omitted
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Text plus entities as JSON
    Api,
    Html,
    Markdown,
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Render { format, file } => render_command(*format, file.as_ref()),
    }
}

fn read_source(file: Option<&PathBuf>) -> std::io::Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            Ok(source)
        }
    }
}

fn render_command(format: Format, file: Option<&PathBuf>) {
    let source = match read_source(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    };
    let source = source.strip_suffix('\n').unwrap_or(&source);
    let doc = Parser::parse(source);

    match format {
        Format::Api => match serde_json::to_string_pretty(&doc.api_text()) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("Error: {err}");
                std::process::exit(1);
            }
        },
        Format::Html => println!("{}", doc.html()),
        Format::Markdown => println!("{}", doc.markdown()),
    }
}
