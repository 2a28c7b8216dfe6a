#![allow(dead_code)]
use std::{
    env, fs,
    path::Path,
    process::{Command, Stdio},
};

use gpgbind::{Context, CreateKeyFlags, Key, NativeError, PinentryMode, Protocol};
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;
use zeroize::Zeroizing;

pub const PASSPHRASE: &[u8] = b"abc";

pub fn passphrase_provider(
    _hint: Option<&str>, _prior_attempt_failed: bool,
) -> Result<Zeroizing<Vec<u8>>, NativeError> {
    Ok(Zeroizing::new(PASSPHRASE.to_vec()))
}

fn setup_agent(dir: &Path) {
    env::set_var("GNUPGHOME", dir);
    env::set_var("GPG_AGENT_INFO", "");
    fs::write(
        dir.join("gpg-agent.conf"),
        "ignore-invalid-option allow-loopback-pinentry\n\
         allow-loopback-pinentry\n\
         default-cache-ttl 0\n\
         max-cache-ttl 0\n",
    )
    .unwrap();
}

fn kill_agent() {
    let status = Command::new("gpgconf")
        .arg("--kill")
        .arg("gpg-agent")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(err) = status {
        println!("Unable to kill agent: {}", err);
    }
}

struct Harness {
    _homedir: TempDir,
}

impl Drop for Harness {
    fn drop(&mut self) {
        kill_agent();
    }
}

/// Runs `f` against a fresh, empty key ring. Meant to be called from a `#[sealed_test]`,
/// which gives every test its own process and therefore its own `GNUPGHOME`.
pub fn with_test_harness(f: impl FnOnce()) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let homedir = tempfile::Builder::new()
        .prefix("gpgbind")
        .tempdir()
        .unwrap();
    setup_agent(homedir.path());
    let _harness = Harness { _homedir: homedir };
    f();
}

pub fn create_context() -> Context {
    let mut ctx = Context::from_protocol(Protocol::OpenPgp).unwrap();
    ctx.set_pinentry_mode(PinentryMode::Loopback).unwrap();
    ctx
}

pub fn create_key(ctx: &mut Context, userid: &str, algo: &str, flags: CreateKeyFlags) -> Key {
    let result = ctx
        .create_key(userid, algo, None, flags | CreateKeyFlags::NOEXPIRE)
        .unwrap();
    assert!(result.has_primary_key());
    let fpr = result.fingerprint().unwrap().to_owned();
    ctx.get_key(fpr.as_str()).unwrap()
}

/// An unprotected key able to sign and encrypt.
pub fn alfa(ctx: &mut Context) -> Key {
    create_key(
        ctx,
        "Alfa Test (demo key) <alfa@example.net>",
        "future-default",
        CreateKeyFlags::NOPASSWD,
    )
}

/// A key protected by [`PASSPHRASE`], able to sign and encrypt.
pub fn bravo(ctx: &mut Context) -> Key {
    ctx.with_passphrase_provider(passphrase_provider, |ctx| {
        create_key(
            ctx,
            "Bravo Test (demo key) <bravo@example.net>",
            "future-default",
            CreateKeyFlags::empty(),
        )
    })
}

/// A key that can only certify.
pub fn charlie(ctx: &mut Context) -> Key {
    create_key(
        ctx,
        "Charlie Test (demo key) <charlie@example.net>",
        "ed25519",
        CreateKeyFlags::CERT | CreateKeyFlags::NOPASSWD,
    )
}
