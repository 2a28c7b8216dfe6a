use std::{error::Error, fs::File, io, path::PathBuf};

use clap::Parser;
use gpgbind::{Context, Protocol, SignatureSummary, VerificationResult};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
struct Cli {
    /// Use the CMS protocol
    #[arg(long)]
    cms: bool,
    /// The signature, or the signed message when no data file is given
    sigfile: PathBuf,
    /// The signed data for a detached signature
    filename: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let args = Cli::parse();
    let proto = if args.cms {
        Protocol::Cms
    } else {
        Protocol::OpenPgp
    };

    let mut ctx = Context::from_protocol(proto)?;
    let sigfile = &args.sigfile;
    let mut signature =
        File::open(sigfile).map_err(|e| format!("can't open '{}': {e}", sigfile.display()))?;
    let result = if let Some(filename) = args.filename.as_ref() {
        let mut signed = File::open(filename)
            .map_err(|e| format!("can't open '{}': {e}", filename.display()))?;
        ctx.verify_detached(&mut signature, &mut signed)?
    } else {
        ctx.verify_opaque(&mut signature, &mut Vec::new())?
    };

    print_result(&result);
    Ok(())
}

fn print_summary(summary: SignatureSummary) {
    for (flag, name) in [
        (SignatureSummary::VALID, "valid"),
        (SignatureSummary::GREEN, "green"),
        (SignatureSummary::RED, "red"),
        (SignatureSummary::KEY_REVOKED, "revoked"),
        (SignatureSummary::KEY_EXPIRED, "key-expired"),
        (SignatureSummary::SIG_EXPIRED, "sig-expired"),
        (SignatureSummary::KEY_MISSING, "key-missing"),
        (SignatureSummary::CRL_MISSING, "crl-missing"),
        (SignatureSummary::CRL_TOO_OLD, "crl-too-old"),
        (SignatureSummary::BAD_POLICY, "bad-policy"),
        (SignatureSummary::SYS_ERROR, "sys-error"),
    ] {
        if summary.contains(flag) {
            print!(" {name}");
        }
    }
}

fn print_result(result: &VerificationResult) {
    println!(
        "Original file name: {}",
        result.file_name().unwrap_or("[none]")
    );
    for (i, sig) in result.signatures().enumerate() {
        println!("Signature {i}");
        println!("  status ....: {}", sig.status());
        println!("  native ....: {}", sig.status_code());
        print!("  summary ...:");
        print_summary(sig.summary());
        println!();
        println!("  fingerprint: {}", sig.fingerprint().unwrap_or("[none]"));
        println!("  created ...: {:?}", sig.creation_time());
        println!("  expires ...: {:?}", sig.expiration_time());
        println!("  validity ..: {}", sig.validity());
        println!("  val.reason : {:?}", sig.nonvalidity_reason());
        println!("  pubkey algo: {}", sig.key_algorithm());
        println!("  digest algo: {}", sig.hash_algorithm());
        println!(
            "  other flags:{}{}",
            if sig.is_wrong_key_usage() {
                " wrong-key-usage"
            } else {
                ""
            },
            if sig.verified_by_chain() {
                " chain-model"
            } else {
                ""
            }
        );
    }
}
