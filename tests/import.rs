use gpgbind::{ExportMode, ImportFlags};
use sealed_test::prelude::*;

mod common;

#[sealed_test]
fn test_export_then_import() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let fpr = alfa.fingerprint().unwrap().to_owned();
        ctx.set_armor(true);

        let mut exported = Vec::new();
        ctx.export(Some("alfa@example.net"), ExportMode::empty(), &mut exported)
            .unwrap();
        assert!(exported.starts_with(b"-----BEGIN PGP PUBLIC KEY BLOCK-----"));

        ctx.delete_secret_key(&alfa).unwrap();
        assert!(ctx.get_key(fpr.as_str()).is_err());

        let result = ctx.import(&exported).unwrap();
        assert_eq!(result.considered(), 1);
        assert_eq!(result.imported(), 1);
        assert_eq!(result.secret_imported(), 0);
        let import = result.imports().next().unwrap();
        assert_eq!(import.fingerprint(), Ok(fpr.as_str()));
        assert!(import.result().is_ok());
        assert!(import.status().contains(ImportFlags::NEW));
        assert_eq!(result.added().count(), 1);

        let key = ctx.get_key(fpr.as_str()).unwrap();
        assert!(!key.has_secret());

        let result = ctx.import(&exported).unwrap();
        assert_eq!(result.unchanged(), 1);
        assert_eq!(result.imported(), 0);
        assert_eq!(result.added().count(), 0);
    })
}

#[sealed_test]
fn test_export_selected_keys() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        let alfa = common::alfa(&mut ctx);
        let charlie = common::charlie(&mut ctx);

        let mut one = Vec::new();
        ctx.export_keys(Some(&alfa), ExportMode::MINIMAL, &mut one)
            .unwrap();
        let mut both = Vec::new();
        ctx.export_keys([&alfa, &charlie], ExportMode::empty(), &mut both)
            .unwrap();
        let mut all = Vec::new();
        ctx.export_all(ExportMode::empty(), &mut all).unwrap();
        assert!(!one.is_empty());
        assert!(both.len() > one.len());
        assert_eq!(all.len(), both.len());
    })
}

#[sealed_test]
fn test_import_garbage() {
    common::with_test_harness(|| {
        let mut ctx = common::create_context();
        match ctx.import("not a key") {
            Ok(result) => assert_eq!(result.imported(), 0),
            Err(err) => assert!(err.native().is_some()),
        }
    })
}
