use gpgbind::{Context, KeyListMode, PinentryMode, Protocol};
use sealed_test::prelude::*;

mod common;

#[sealed_test]
fn test_configuration_round_trips() {
    common::with_test_harness(|| {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp).unwrap();
        assert_eq!(ctx.protocol(), Protocol::OpenPgp);
        assert!(!ctx.armor());
        assert!(!ctx.text_mode());

        ctx.set_armor(true);
        ctx.set_text_mode(true);
        assert!(ctx.armor());
        assert!(ctx.text_mode());

        ctx.set_armor(false);
        assert!(!ctx.armor());
        assert!(ctx.text_mode());
    })
}

#[sealed_test]
fn test_pinentry_mode() {
    common::with_test_harness(|| {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp).unwrap();
        assert_eq!(ctx.pinentry_mode(), PinentryMode::Default);
        ctx.set_pinentry_mode(PinentryMode::Loopback).unwrap();
        assert_eq!(Context::pinentry_mode(&ctx), PinentryMode::Loopback);
    })
}

#[sealed_test]
fn test_passphrase_provider_selects_loopback() {
    common::with_test_harness(|| {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp).unwrap();
        ctx.set_passphrase_provider(common::passphrase_provider)
            .unwrap();
        assert_eq!(ctx.pinentry_mode(), PinentryMode::Loopback);
        assert!(ctx.clear_passphrase_provider().is_some());
        assert!(ctx.clear_passphrase_provider().is_none());
    })
}

#[sealed_test]
fn test_scoped_provider_restores_pinentry_mode() {
    common::with_test_harness(|| {
        let mut ctx = Context::from_protocol(Protocol::OpenPgp).unwrap();
        let inside = ctx.with_passphrase_provider(common::passphrase_provider, |ctx| {
            ctx.pinentry_mode()
        });
        assert_eq!(inside, PinentryMode::Loopback);
        assert_eq!(ctx.pinentry_mode(), PinentryMode::Default);
        assert!(ctx.clear_passphrase_provider().is_none());
    })
}

#[sealed_test]
fn test_key_list_mode() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        ctx.set_key_list_mode(KeyListMode::LOCAL).unwrap();
        assert!(ctx.key_list_mode().contains(KeyListMode::LOCAL));
        assert!(!ctx.key_list_mode().contains(KeyListMode::SIGS));

        ctx.add_key_list_mode(KeyListMode::SIGS).unwrap();
        assert!(ctx
            .key_list_mode()
            .contains(KeyListMode::LOCAL | KeyListMode::SIGS));
    })
}

#[sealed_test]
fn test_engine_info() {
    common::with_test_harness(|| {
        let gpgme = gpgbind::init().unwrap();
        assert!(!gpgme.version().is_empty());
        gpgme.check_engine_version(Protocol::OpenPgp).unwrap();
        assert!(gpgme
            .engine_info()
            .unwrap()
            .any(|e| e.protocol() == Protocol::OpenPgp));

        let homedir = std::env::var("GNUPGHOME").unwrap();
        let mut ctx = common::create_context();
        ctx.set_engine_home_dir(homedir.as_str()).unwrap();
        let engine = ctx
            .engine_info()
            .find(|e| e.protocol() == Protocol::OpenPgp)
            .unwrap();
        assert_eq!(engine.home_dir(), Ok(homedir.as_str()));
        assert!(engine.path().is_ok());
    })
}

#[sealed_test]
fn test_context_flags() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        ctx.set_flag("full-status", "1").unwrap();
        assert_eq!(ctx.get_flag("full-status"), Ok("1"));
        assert!(ctx.set_flag("full\0status", "1").is_err());
    })
}

#[sealed_test]
fn test_set_locale() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        ctx.set_locale(libc::LC_CTYPE, Some("C")).unwrap();
        ctx.set_locale(libc::LC_MESSAGES, Some("C")).unwrap();
        ctx.set_locale(libc::LC_MESSAGES, None::<&str>).unwrap();
        assert_eq!(
            ctx.set_locale(libc::LC_CTYPE, Some("C\0UTF-8"))
                .unwrap_err()
                .native(),
            Some(gpgbind::NativeError::INV_VALUE)
        );

        let alfa = common::alfa(&mut ctx);
        assert!(ctx.get_key(alfa.fingerprint().unwrap()).is_ok());
    })
}
