//! Compute the Poseidon zero-hash table for the commitment tree
//!
//! Prints the table as a Rust constant or as hex, and optionally checks the
//! engine against light-poseidon's reference hasher and the pinned table.

use anyhow::{bail, Context, Result};
use ark_bn254::Fr;
use ark_ff::PrimeField;
use clap::{Parser, ValueEnum};
use light_poseidon::{Poseidon, PoseidonHasher};
use shielded_core::crypto::{FieldElement, HashEngine};
use shielded_core::tree::{ZeroHashes, DEFAULT_TREE_DEPTH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// `pub const ZERO_HASHES_DEPTH_N: [[u8; 32]; N + 1]`
    Rust,
    /// One `level: 0x...` line per level
    Hex,
}

#[derive(Parser)]
#[command(name = "compute-zero-hashes")]
#[command(about = "Compute empty-subtree Poseidon hashes for the commitment tree")]
struct Cli {
    /// Tree depth
    #[arg(short, long, default_value_t = DEFAULT_TREE_DEPTH)]
    depth: usize,

    #[arg(short, long, value_enum, default_value_t = Format::Rust)]
    format: Format,

    /// Recompute every level with light-poseidon and compare against the pinned table
    #[arg(long)]
    verify: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let engine = HashEngine::new().context("Failed to load Poseidon parameters")?;
    let zeros = ZeroHashes::compute(&engine, cli.depth)?;

    if cli.verify {
        cross_check(&zeros)?;
        zeros.verify_against_constants()?;
        info!(depth = cli.depth, "zero hashes match the reference hasher and pinned table");
    }

    match cli.format {
        Format::Rust => print_rust(&zeros),
        Format::Hex => {
            for (level, hash) in zeros.as_slice().iter().enumerate() {
                println!("{:>2}: {}", level, hash);
            }
        }
    }
    Ok(())
}

/// Recompute each level with a fresh circom hasher
fn cross_check(zeros: &ZeroHashes) -> Result<()> {
    let mut current = Fr::from(0u64);
    for level in 1..=zeros.depth() {
        let mut hasher = Poseidon::<Fr>::new_circom(2)?;
        current = hasher.hash(&[current, current])?;

        let expected = FieldElement::from(current);
        if zeros.at(level) != expected {
            bail!("level {}: engine {} but reference {}", level, zeros.at(level), expected);
        }
    }

    let root = Fr::from_be_bytes_mod_order(&zeros.empty_root().to_be_bytes());
    if root != current {
        bail!("empty root differs from the reference chain");
    }
    Ok(())
}

fn print_rust(zeros: &ZeroHashes) {
    let depth = zeros.depth();
    println!("pub const ZERO_HASHES_DEPTH_{}: [[u8; 32]; {}] = [", depth, depth + 1);
    for (level, hash) in zeros.as_slice().iter().enumerate() {
        println!("    // Level {}", level);
        println!("    [");
        for row in hash.to_be_bytes().chunks(8) {
            let bytes: Vec<String> = row.iter().map(|b| format!("0x{:02x}", b)).collect();
            println!("        {},", bytes.join(", "));
        }
        println!("    ],");
    }
    println!("];");
}
