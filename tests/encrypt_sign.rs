use gpgbind::{SignMode, SignatureStatus};
use sealed_test::prelude::*;

mod common;

#[sealed_test]
fn test_sign_and_encrypt_round_trip() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let bravo = common::bravo(&mut ctx);
        ctx.set_armor(true);
        ctx.add_signer(&alfa).unwrap();

        let mut ciphertext = Vec::new();
        let (encryption, signing) = ctx
            .sign_and_encrypt([&alfa, &bravo], "Hallo Leute\n", &mut ciphertext)
            .unwrap();
        assert_eq!(encryption.invalid_recipients().count(), 0);
        assert_eq!(signing.invalid_signers().count(), 0);
        let new_sig = signing.new_signatures().next().unwrap();
        assert_eq!(new_sig.mode(), SignMode::Normal);
        assert_eq!(new_sig.fingerprint(), alfa.fingerprint());

        let mut plaintext = Vec::new();
        let (decryption, verification) = ctx
            .decrypt_and_verify(&ciphertext, &mut plaintext)
            .unwrap();
        assert_eq!(plaintext, b"Hallo Leute\n");
        assert_eq!(decryption.recipients().count(), 2);
        assert_eq!(verification.signatures().count(), 1);
        let sig = verification.signatures().next().unwrap();
        assert_eq!(sig.status(), SignatureStatus::Good);
        assert_eq!(sig.fingerprint(), alfa.fingerprint());
    })
}
