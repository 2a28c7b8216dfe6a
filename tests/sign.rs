use gpgbind::{Error, NativeError, SignMode, SigningFailure, SigningResult};
use sealed_test::prelude::*;
use zeroize::Zeroizing;

mod common;

fn check_result(result: &SigningResult, mode: SignMode, fpr: &str) {
    if let Some(signer) = result.invalid_signers().next() {
        panic!(
            "Invalid signer found: {}",
            signer.fingerprint().unwrap_or("[no fingerprint]")
        );
    }
    assert_eq!(result.new_signatures().count(), 1);
    let signature = result.new_signatures().next().unwrap();
    assert_eq!(signature.mode(), mode);
    assert_eq!(signature.fingerprint(), Ok(fpr));
    assert!(signature.creation_time().is_some());
}

#[sealed_test]
fn test_sign_modes() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let fpr = alfa.fingerprint().unwrap().to_owned();
        ctx.set_armor(true);
        ctx.set_text_mode(true);
        ctx.add_signer(&alfa).unwrap();

        let mut output = Vec::new();
        let result = ctx.sign_normal("Hallo Leute\n", &mut output).unwrap();
        check_result(&result, SignMode::Normal, &fpr);
        assert!(output.starts_with(b"-----BEGIN PGP MESSAGE-----"));

        let mut output = Vec::new();
        let result = ctx.sign_detached("Hallo Leute\n", &mut output).unwrap();
        check_result(&result, SignMode::Detached, &fpr);
        assert!(output.starts_with(b"-----BEGIN PGP SIGNATURE-----"));

        let mut output = Vec::new();
        let result = ctx.sign_clear("Hallo Leute\n", &mut output).unwrap();
        check_result(&result, SignMode::Clear, &fpr);
        assert!(output.starts_with(b"-----BEGIN PGP SIGNED MESSAGE-----"));
    })
}

#[sealed_test]
fn test_signers() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let bravo = common::bravo(&mut ctx);
        assert_eq!(ctx.signers().count(), 0);

        ctx.add_signer(&alfa).unwrap();
        ctx.add_signer(&bravo).unwrap();
        let signers: Vec<_> = ctx.signers().collect();
        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].fingerprint(), alfa.fingerprint());
        assert_eq!(signers[1].fingerprint(), bravo.fingerprint());

        ctx.clear_signers();
        assert_eq!(ctx.signers().count(), 0);
    })
}

#[sealed_test]
fn test_signer_without_signing_capability() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let charlie = common::charlie(&mut ctx);
        match ctx.add_signer(&charlie) {
            Err(Error::Signing {
                reason,
                invalid_signers,
                ..
            }) => {
                assert_eq!(reason, SigningFailure::UnusableSigner);
                assert_eq!(invalid_signers.len(), 1);
                assert_eq!(
                    invalid_signers[0].fingerprint.as_deref(),
                    charlie.fingerprint().ok()
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(ctx.signers().count(), 0);
    })
}

#[sealed_test]
fn test_provider_error_aborts_signing() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let bravo = common::bravo(&mut ctx);
        ctx.add_signer(&bravo).unwrap();
        ctx.set_passphrase_provider(
            |_: Option<&str>, _: bool| -> Result<Zeroizing<Vec<u8>>, NativeError> {
                Err(NativeError::CANCELED)
            },
        )
        .unwrap();

        let mut output = Vec::new();
        match ctx.sign_detached("Hallo Leute\n", &mut output) {
            Err(Error::Signing { reason, source, .. }) => {
                assert_eq!(reason, SigningFailure::PassphraseCallback);
                assert_eq!(source, NativeError::CANCELED);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    })
}

#[sealed_test]
fn test_signing_without_secret_keys_fails() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        assert_eq!(ctx.signers().count(), 0);

        let mut output = Vec::new();
        match ctx.sign_detached("Hallo Leute\n", &mut output) {
            Err(Error::Signing { reason, .. }) => assert_ne!(
                reason,
                SigningFailure::PassphraseCallback,
                "no provider was installed"
            ),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(output.is_empty());
    })
}
