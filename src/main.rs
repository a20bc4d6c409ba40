use clap::{Parser, Subcommand};
use hcadecrypt::cipher::{build_for_header, key::parse_u64, CipherScheme, KeyCode};
use hcadecrypt::decrypt::{decrypt_file, DecryptOptions};
use hcadecrypt::frame::verify_frames;
use hcadecrypt::header::{HcaHeader, HeaderSummary};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hcadecrypt", version, about = "Rewrite ciphered HCA audio as plain HCA")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a ciphered HCA file with cipher 0
    Decrypt {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Keycode, decimal or 0x-prefixed hex
        #[arg(short, long, value_parser = parse_u64)]
        key: u64,
        /// Optional subkey (low 16 bits are used)
        #[arg(short, long, value_parser = parse_u64)]
        subkey: Option<u64>,
        /// Check every rewritten frame before writing
        #[arg(long)]
        verify_frames: bool,
    },
    /// Show header fields
    Info {
        input: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the header and every frame checksum
    Verify {
        input: PathBuf,
    },
    /// Dump a cipher table as hex rows
    Table {
        /// none, fixed, keyed, or a numeric id
        #[arg(long, default_value = "keyed")]
        scheme: String,
        #[arg(short, long, value_parser = parse_u64, default_value = "0")]
        key: u64,
        #[arg(short, long, value_parser = parse_u64)]
        subkey: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    match Cli::parse().command {

        // ── Decrypt ──────────────────────────────────────────────────────────
        Commands::Decrypt { input, output, key, subkey, verify_frames } => {
            let opts = DecryptOptions { key, subkey, verify_frames };
            let written = decrypt_file(&input, &output, &opts)?;
            println!("Wrote {} ({} bytes)", output.display(), written);
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let data    = std::fs::read(&input)?;
            let header  = HcaHeader::parse(&data)?;
            let summary = HeaderSummary::from(&header);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(&input, &summary);
            }
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { input } => {
            let data   = std::fs::read(&input)?;
            let header = HcaHeader::parse(&data)?;
            let report = verify_frames(&data, &header);
            println!("Header OK ({} bytes)", header.header_size);
            println!("{}", report.summary());
            for (index, health) in &report.problems {
                println!("  frame {index:>6}  {health:?}");
            }
            if !report.is_clean() {
                return Err(format!("{} corrupt frame(s)", report.corrupt).into());
            }
        }

        // ── Table ────────────────────────────────────────────────────────────
        Commands::Table { scheme, key, subkey } => {
            let scheme = CipherScheme::from_name(&scheme)
                .ok_or_else(|| format!("Unknown cipher scheme '{scheme}'"))?;
            let key   = KeyCode::derive(key, subkey);
            let table = build_for_header(scheme.id(), key.value())?;
            println!("# {scheme}, key {key}");
            for (row, chunk) in table.as_bytes().chunks(16).enumerate() {
                println!("{:02x}: {}", row * 16, hex::encode(chunk));
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn print_summary(path: &std::path::Path, s: &HeaderSummary) {
    println!("── HCA ──────────────────────────────────────────────────");
    println!("  Path            {}", path.display());
    println!("  Version         {}", s.version);
    println!("  Header size     {} B", s.header_size);
    println!("  Channels        {}", s.channels);
    println!("  Sample rate     {} Hz", s.sample_rate);
    println!("  Frames          {} x {} B ({})", s.frame_count, s.frame_size, s.geometry_chunk);
    println!("  Delay / padding {} / {}", s.encoder_delay, s.encoder_padding);
    println!("  Resolution      {}..{}", s.min_resolution, s.max_resolution);
    println!("  Tracks / config {} / {}", s.track_count, s.channel_config);
    println!("  Bands           total {} base {} stereo {}",
             s.total_band_count, s.base_band_count, s.stereo_band_count);
    if let Some(st) = s.stereo_type {
        println!("  Stereo type     {st}");
    }
    if let Some(v) = &s.vbr {
        println!("  VBR             max {} B, noise {}", v.max_frame_size, v.noise_level);
    }
    println!("  ATH type        {}", s.ath_type);
    if let Some(l) = &s.loop_info {
        println!("  Loop            frames {}..{} (delay {}, padding {})",
                 l.start_frame, l.end_frame, l.start_delay, l.end_padding);
    }
    println!("  Cipher          {} ({})", s.cipher_name, s.cipher_type);
    if let Some(v) = s.rva_volume {
        println!("  Volume          {v}");
    }
    if let Some(c) = &s.comment {
        println!("  Comment         {c}");
    }
    println!("  Data offset     {} B", s.data_offset);
}
