//! Key generation tool for the veilpick pickup circuit.
//!
//! Usage:
//!   cargo run --bin keygen -- generate --output ./zk-keys
//!   cargo run --bin keygen -- verify --keys-dir ./zk-keys --expected-digest <hex>
//!   cargo run --bin keygen -- info --keys-dir ./zk-keys

use clap::{Parser, Subcommand};
use rand::thread_rng;
use std::path::PathBuf;
use std::process::ExitCode;

use veilpick_crypto::keys::{CircuitArtifacts, CIRCUIT_VERSION};

#[derive(Parser)]
#[command(name = "keygen")]
#[command(about = "Generate Groth16 proving and verifying keys for the pickup circuit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new proving/verifying key pair.
    Generate {
        /// Output directory for keys.
        #[arg(short, long, default_value = "./zk-keys")]
        output: PathBuf,
    },

    /// Verify that stored keys match an expected verifying-key digest.
    Verify {
        /// Directory containing keys.
        #[arg(short, long, default_value = "./zk-keys")]
        keys_dir: PathBuf,

        /// Expected verifying-key digest (hex).
        #[arg(short, long)]
        expected_digest: Option<String>,
    },

    /// Show information about existing keys.
    Info {
        /// Directory containing keys.
        #[arg(short, long, default_value = "./zk-keys")]
        keys_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { output } => generate(&output),
        Commands::Verify {
            keys_dir,
            expected_digest,
        } => verify(&keys_dir, expected_digest.as_deref()),
        Commands::Info { keys_dir } => info(&keys_dir),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate(output: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("Generating keys for circuit version {}...", CIRCUIT_VERSION);
    println!("This performs a circuit-specific trusted setup and may take a while.");

    let artifacts = CircuitArtifacts::generate(&mut thread_rng())?;
    artifacts.save(output)?;

    println!("Keys written to {}", output.display());
    println!("VK digest: {}", artifacts.vk_digest()?);
    Ok(())
}

fn verify(keys_dir: &PathBuf, expected_digest: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let artifacts = CircuitArtifacts::load(keys_dir)?;
    let digest = artifacts.vk_digest()?;
    println!("VK digest: {}", digest);

    if let Some(expected) = expected_digest {
        if expected != digest {
            return Err(format!(
                "digest mismatch: expected {}, found {}",
                expected, digest
            )
            .into());
        }
        println!("Digest matches.");
    }
    Ok(())
}

fn info(keys_dir: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let metadata = CircuitArtifacts::load_metadata(keys_dir)?;
    println!("Circuit version: {}", metadata.circuit_version);
    println!("VK digest:       {}", metadata.vk_digest);
    println!("Generated at:    {}", metadata.generated_at.to_rfc3339());
    Ok(())
}
