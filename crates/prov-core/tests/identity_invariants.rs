use prov_core::{CodeIdentity, Dependency, VcsKind, VersionOrigin};
use proptest::prelude::*;

#[test]
fn clean_identity_is_not_dirty() {
    let identity = CodeIdentity::versioned(VcsKind::Git, "abc123", "", "/work").expect("valid");
    assert!(!identity.dirty());
    assert_eq!(identity.revision_id(), Some("abc123"));
}

#[test]
fn versioned_identity_requires_revision() {
    assert!(CodeIdentity::versioned(VcsKind::Mercurial, "  ", "", "/work").is_err());
}

#[test]
fn unversioned_identity_has_no_revision() {
    let identity = CodeIdentity::unversioned("/work");
    assert_eq!(identity.vcs_type(), VcsKind::None);
    assert_eq!(identity.revision_id(), None);
    assert!(!identity.dirty());
}

#[test]
fn inconsistent_json_is_rejected() {
    let json = r#"{"vcs_type":"git","revision_id":"abc","working_copy_diff":"","dirty":true}"#;
    assert!(serde_json::from_str::<CodeIdentity>(json).is_err());
    let json = r#"{"vcs_type":"none","revision_id":"abc","working_copy_diff":"","dirty":false}"#;
    assert!(serde_json::from_str::<CodeIdentity>(json).is_err());
}

#[test]
fn vcs_kind_parses_aliases() {
    assert_eq!("Mercurial".parse::<VcsKind>().expect("hg"), VcsKind::Mercurial);
    assert_eq!("svn".parse::<VcsKind>().expect("svn"), VcsKind::Subversion);
    assert!("cvs".parse::<VcsKind>().is_err());
}

#[test]
fn origin_confidence_orders_sources() {
    assert!(VersionOrigin::Local.confidence() > VersionOrigin::DistributionMetadata.confidence());
    assert!(
        VersionOrigin::DistributionMetadata.confidence()
            > VersionOrigin::VersionAttribute.confidence()
    );
    assert!(VersionOrigin::Registry.confidence() > VersionOrigin::Unknown.confidence());
    assert!(!Dependency::unresolved("numpy", None).has_version());
}

proptest! {
    #[test]
    fn dirty_tracks_diff(diff in ".{0,64}") {
        let identity = CodeIdentity::versioned(VcsKind::Git, "deadbeef", diff.clone(), "/work")
            .expect("valid identity");
        prop_assert_eq!(identity.dirty(), !diff.is_empty());
        let json = serde_json::to_string(&identity).expect("serialize");
        let back: CodeIdentity = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, identity);
    }
}
