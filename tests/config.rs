use import_plan::import::{CombineMode, ExportStrategy, ImportConfig, UnownedRemoteHandling};

#[test]
fn config_json_round_trip() {
    let cfg = ImportConfig {
        debug: true,
        unowned_remotes: UnownedRemoteHandling::Error,
        export_strategy: ExportStrategy::FromSends,
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: ImportConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn missing_fields_take_defaults() {
    let cfg: ImportConfig = serde_json::from_str(r#"{"debug": true}"#).unwrap();
    assert!(cfg.debug);
    assert_eq!(cfg.unowned_remotes, UnownedRemoteHandling::Warn);
    assert_eq!(cfg.export_strategy, ExportStrategy::FromRecvs);

    let cfg: ImportConfig = serde_json::from_str(r#"{"unowned_remotes": "Ignore"}"#).unwrap();
    assert!(!cfg.debug);
    assert_eq!(cfg.unowned_remotes, UnownedRemoteHandling::Ignore);
}

#[test]
fn unknown_variant_is_rejected() {
    let res: Result<ImportConfig, _> = serde_json::from_str(r#"{"export_strategy": "Broadcast"}"#);
    assert!(res.is_err());
}

#[test]
fn combine_mode_serializes_by_name() {
    assert_eq!(serde_json::to_string(&CombineMode::Add).unwrap(), r#""Add""#);
}
