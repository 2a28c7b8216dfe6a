use gpgbind::{CreateKeyFlags, Error, ErrorKind, KeyListMode};
use sealed_test::prelude::*;

mod common;

#[sealed_test]
fn test_get_key_ignores_fingerprint_case() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let fpr = alfa.fingerprint().unwrap().to_owned();

        let key = ctx.get_key(fpr.to_lowercase().as_str()).unwrap();
        assert!(key.matches_fingerprint(&fpr));
        assert!(key.matches_fingerprint(fpr.to_lowercase()));
        assert_eq!(key.fingerprint(), Ok(fpr.as_str()));
        assert!(key.can_encrypt());
        assert!(key.can_sign());

        let uid = key.user_ids().next().unwrap();
        assert_eq!(uid.email(), Ok("alfa@example.net"));
        assert_eq!(uid.name(), Ok("Alfa Test"));
        assert!(key.subkeys().count() >= 2);
    })
}

#[sealed_test]
fn test_missing_fingerprint_is_key_not_found() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        common::alfa(&mut ctx);
        let missing = "0123456789ABCDEF0123456789ABCDEF01234567";
        match ctx.get_key(missing) {
            Err(Error::KeyNotFound(pattern)) => assert_eq!(pattern, missing),
            other => panic!("unexpected lookup result: {other:?}"),
        }
        assert_eq!(
            ctx.get_secret_key(missing).unwrap_err().kind(),
            ErrorKind::KeyNotFound
        );
    })
}

#[sealed_test]
fn test_shared_user_id_is_ambiguous() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        common::alfa(&mut ctx);
        common::create_key(
            &mut ctx,
            "Alfa Test (demo key) <alfa@example.net>",
            "ed25519",
            CreateKeyFlags::NOPASSWD | CreateKeyFlags::FORCE,
        );
        assert_eq!(
            ctx.get_key("alfa@example.net").unwrap_err().kind(),
            ErrorKind::AmbiguousKey
        );
    })
}

#[sealed_test]
fn test_find_keys() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        common::charlie(&mut ctx);

        let mut keys = ctx.find_keys(Some("alfa@example.net")).unwrap();
        let found = keys.by_ref().collect::<Result<Vec<_>, _>>().unwrap();
        let result = keys.finish().unwrap();
        assert!(!result.is_truncated());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].fingerprint(), alfa.fingerprint());

        assert_eq!(ctx.keys().unwrap().count(), 2);
        assert_eq!(
            ctx.find_keys(["alfa@example.net", "charlie@example.net"])
                .unwrap()
                .count(),
            2
        );
        assert_eq!(ctx.secret_keys().unwrap().count(), 2);
        assert_eq!(ctx.find_keys(Some("nobody@example.net")).unwrap().count(), 0);
    })
}

#[sealed_test]
fn test_signatures_listed_on_request() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let fpr = alfa.fingerprint().unwrap().to_owned();
        ctx.add_key_list_mode(KeyListMode::SIGS).unwrap();

        let key = ctx.get_key(fpr.as_str()).unwrap();
        assert!(key.key_list_mode().contains(KeyListMode::SIGS));
        let uid = key.user_ids().next().unwrap();
        let self_sig = uid.signatures().next().unwrap();
        assert_eq!(self_sig.signer_key_id(), alfa.id());
    })
}

#[sealed_test]
fn test_updated_keeps_snapshot_list_mode() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        assert!(!alfa.key_list_mode().contains(KeyListMode::SIGS));
        ctx.add_key_list_mode(KeyListMode::SIGS).unwrap();

        let refreshed = alfa.updated().unwrap();
        assert_eq!(refreshed.key_list_mode(), alfa.key_list_mode());
        assert_eq!(refreshed.fingerprint(), alfa.fingerprint());
        let uid = refreshed.user_ids().next().unwrap();
        assert_eq!(uid.signatures().count(), 0);
    })
}
