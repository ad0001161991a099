//! Dev certificate generator - run with `cargo run --manifest-path scripts/Cargo.toml`
//!
//! Writes a self-signed localhost certificate to `certs/` next to the server
//! crate, where the server looks for it when TLS_CERT_PATH is unset.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use ring::digest::{digest, SHA256};
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Browsers refuse `serverCertificateHashes` certs valid for longer than this
const VALIDITY: Duration = Duration::from_secs(14 * 24 * 60 * 60);

fn cert_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("..").join("certs")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = cert_dir();
    let cert_file = dir.join("cert.pem");
    let key_file = dir.join("key.pem");
    let force = std::env::args().any(|a| a == "--force");

    if cert_file.exists() && key_file.exists() && !force {
        println!("Certificates already exist in {}", dir.display());
        println!("Pass --force to regenerate (they expire after 14 days).");
        print_hash(&fs::read_to_string(&cert_file)?)?;
        return Ok(());
    }

    println!("Generating development certificate for localhost...\n");
    fs::create_dir_all(&dir)?;

    let mut params = CertificateParams::new(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "::1".to_string(),
    ])?;
    params.distinguished_name = DistinguishedName::new();
    params
        .distinguished_name
        .push(DnType::CommonName, "Cellbrawl Dev");

    let now = SystemTime::now();
    params.not_before = now.into();
    params.not_after = (now + VALIDITY).into();

    let key_pair = KeyPair::generate()?;
    let cert = params.self_signed(&key_pair)?;

    fs::write(&cert_file, cert.pem())?;
    fs::write(&key_file, key_pair.serialize_pem())?;

    println!("Certificate saved to {}", cert_file.display());
    println!("Private key saved to {}\n", key_file.display());

    print_hash(&cert.pem())
}

fn print_hash(cert_pem: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pem = pem::parse(cert_pem)?;
    let hash = STANDARD.encode(digest(&SHA256, pem.contents()).as_ref());

    println!("WebTransport serverCertificateHashes value:");
    println!("  CERT_HASH={}\n", hash);
    println!("The server logs the same hash on startup.");
    Ok(())
}
