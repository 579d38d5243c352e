use clap::{Parser, Subcommand};
use hsdarc::archive::{build_from_layout_file, BuildOptions};
use hsdarc::cipher::XorKey;
use hsdarc::header::{HsdArcHeader, HEADER_SIZE};
use hsdarc::layout::LayoutError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hsdarc", about = "Build HSDArc asset containers")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON layout into an HSDArc file
    Build {
        layout: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Write only the data section, without header or relocation table
        #[arg(long)]
        data_only: bool,
        /// Cipher for strings that do not name one (id, msg, ...)
        #[arg(short, long)]
        cipher: Option<String>,
    },
    /// Print named cipher tables as hex
    Cipher {
        name: Option<String>,
    },
    /// Show the header of an HSDArc file
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Build ────────────────────────────────────────────────────────────
        Commands::Build { layout, output, data_only, cipher } => {
            let opts = BuildOptions {
                header:         !data_only,
                default_cipher: cipher.as_deref().map(parse_cipher).transpose()?,
            };
            let info = build_from_layout_file(&layout, &output, &opts)?;
            println!("Created: {}", output.display());
            println!("  Size         {} B", info.size);
            println!("  Relocations  {}", info.relocation_count);
            println!("  BLAKE3       {}", info.digest_hex());
        }

        // ── Cipher ───────────────────────────────────────────────────────────
        Commands::Cipher { name } => {
            let keys = match name {
                Some(name) => vec![parse_cipher(&name)?],
                None       => XorKey::ALL.to_vec(),
            };
            for key in keys {
                println!("{:<11} {:>3} B  {}", key.name(), key.cipher().len(), key.description());
                println!("    {}", hex::encode(key.cipher()));
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let bytes = std::fs::read(&input)?;
            let header = HsdArcHeader::from_file_bytes(&bytes)?;

            println!("── HSDArc ───────────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  File size      {} B", header.file_size);
            println!("  Data section   {} B at {:#x}", header.data_len(), HEADER_SIZE);
            println!("  Relocations    {}", header.reloc_count);
            println!("  Table offset   {:#x}", header.reloc_offset);
            println!("  Tail           {:?}", header.tail);
            println!("  BLAKE3         {}", blake3::hash(&bytes).to_hex());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_cipher(s: &str) -> Result<XorKey, LayoutError> {
    XorKey::from_name(s).ok_or_else(|| LayoutError::UnknownCipher(s.to_owned()))
}
