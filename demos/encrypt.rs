use std::{error::Error, fs::File, io, path::PathBuf};

use clap::Parser;
use gpgbind::{Context, Data, Protocol};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
struct Cli {
    /// Use the CMS protocol
    #[arg(long)]
    cms: bool,
    /// Fingerprint of a key to encrypt for
    #[arg(short, long = "recipient", required = true)]
    recipients: Vec<String>,
    /// File to encrypt; a fixed greeting is used when omitted
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
    ctx.set_armor(true);

    let keys = args
        .recipients
        .iter()
        .map(|fpr| ctx.get_key(fpr.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut output = Data::stdout()?;
    match &args.filename {
        Some(filename) => {
            let mut input = File::open(filename)
                .map_err(|e| format!("can't open file `{}': {e}", filename.display()))?;
            ctx.encrypt(&keys, &mut input, &mut output)?;
        }
        None => {
            ctx.encrypt(&keys, "Hello World\n", &mut output)?;
        }
    }
    Ok(())
}
