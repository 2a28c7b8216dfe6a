use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use gpgbind::{DecryptionFailure, Error, NativeError};
use sealed_test::prelude::*;
use zeroize::Zeroizing;

mod common;

#[sealed_test]
fn test_protected_key_round_trip() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let bravo = common::bravo(&mut ctx);
        ctx.set_armor(true);

        let mut ciphertext = Vec::new();
        ctx.encrypt(Some(&bravo), "Hello World\n", &mut ciphertext)
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut plaintext = Vec::new();
        ctx.with_passphrase_provider(
            move |hint: Option<&str>, retry: bool| -> Result<Zeroizing<Vec<u8>>, NativeError> {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(hint.is_some());
                assert!(!retry);
                Ok(Zeroizing::new(common::PASSPHRASE.to_vec()))
            },
            |ctx| ctx.decrypt(&ciphertext, &mut plaintext).unwrap(),
        );
        assert_eq!(plaintext, b"Hello World\n");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    })
}

#[sealed_test]
fn test_provider_error_aborts_decryption() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let bravo = common::bravo(&mut ctx);

        let mut ciphertext = Vec::new();
        ctx.encrypt(Some(&bravo), "Hello World\n", &mut ciphertext)
            .unwrap();

        ctx.set_passphrase_provider(
            |_: Option<&str>, _: bool| -> Result<Zeroizing<Vec<u8>>, NativeError> {
                Err(NativeError::NO_PASSPHRASE)
            },
        )
        .unwrap();
        let mut plaintext = Vec::new();
        match ctx.decrypt(&ciphertext, &mut plaintext) {
            Err(Error::Decryption { reason, source }) => {
                assert_eq!(reason, DecryptionFailure::PassphraseCallback);
                assert_eq!(source, NativeError::NO_PASSPHRASE);
            }
            other => panic!("unexpected decryption result: {other:?}"),
        }
        assert!(plaintext.is_empty());

        ctx.set_passphrase_provider(common::passphrase_provider)
            .unwrap();
        ctx.decrypt(&ciphertext, &mut plaintext).unwrap();
        assert_eq!(plaintext, b"Hello World\n");
    })
}

#[sealed_test]
fn test_wrong_passphrase() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let bravo = common::bravo(&mut ctx);

        let mut ciphertext = Vec::new();
        ctx.encrypt(Some(&bravo), "Hello World\n", &mut ciphertext)
            .unwrap();

        let attempts = Arc::new(Mutex::new(Vec::new()));
        let seen = attempts.clone();
        ctx.set_passphrase_provider(
            move |_: Option<&str>, retry: bool| -> Result<Zeroizing<Vec<u8>>, NativeError> {
                seen.lock().unwrap().push(retry);
                Ok(Zeroizing::new(b"wrong".to_vec()))
            },
        )
        .unwrap();
        let mut plaintext = Vec::new();
        match ctx.decrypt(&ciphertext, &mut plaintext) {
            Err(Error::Decryption { reason, .. }) => {
                assert_eq!(reason, DecryptionFailure::BadPassphrase)
            }
            other => panic!("unexpected decryption result: {other:?}"),
        }
        assert!(plaintext.is_empty());

        // Every attempt after the first is flagged as a retry.
        let attempts = attempts.lock().unwrap();
        assert_eq!(attempts.first(), Some(&false));
        assert!(attempts[1..].iter().all(|&retry| retry));
    })
}

#[sealed_test]
fn test_provider_panic_reaches_caller() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let bravo = common::bravo(&mut ctx);

        let mut ciphertext = Vec::new();
        ctx.encrypt(Some(&bravo), "Hello World\n", &mut ciphertext)
            .unwrap();

        ctx.set_passphrase_provider(|_: Option<&str>, _: bool| -> Result<Zeroizing<Vec<u8>>, NativeError> {
            panic!("provider failed")
        })
        .unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut plaintext = Vec::new();
            let _ = ctx.decrypt(&ciphertext, &mut plaintext);
        }));
        assert!(result.is_err());
    })
}

#[sealed_test]
fn test_missing_secret_key() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);

        let mut ciphertext = Vec::new();
        ctx.encrypt(Some(&alfa), "Hello World\n", &mut ciphertext)
            .unwrap();
        ctx.delete_secret_key(&alfa).unwrap();

        let mut plaintext = Vec::new();
        match ctx.decrypt(&ciphertext, &mut plaintext) {
            Err(Error::Decryption { reason, .. }) => {
                assert_eq!(reason, DecryptionFailure::NoSecretKey)
            }
            other => panic!("unexpected decryption result: {other:?}"),
        }
    })
}

#[sealed_test]
fn test_malformed_input() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let mut plaintext = Vec::new();
        match ctx.decrypt("this is not an OpenPGP message", &mut plaintext) {
            Err(Error::Decryption { reason, .. }) => {
                assert_eq!(reason, DecryptionFailure::MalformedData)
            }
            other => panic!("unexpected decryption result: {other:?}"),
        }
        assert!(plaintext.is_empty());
    })
}
