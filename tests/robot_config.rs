use airdrop_robots::config::{generate_default_config, load_robot_configs, ConfigPlacement, RobotConfig};
use std::path::PathBuf;

#[test]
fn generate_then_load_empty_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("nested").join("config.json");

    let placement = ConfigPlacement::prepare(Some(config_path.to_str().unwrap())).unwrap();
    assert!(!placement.config_dir_exists);
    assert!(!placement.config_exists);

    generate_default_config(&placement).unwrap();

    let refreshed = ConfigPlacement::prepare(Some(config_path.to_str().unwrap())).unwrap();
    assert!(refreshed.config_dir_exists);
    assert!(refreshed.config_exists);
    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "[]");
    assert!(load_robot_configs(&config_path).unwrap().is_empty());
}

#[test]
fn generate_keeps_existing_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(&config_path, "[{\"keep\": true}]").unwrap();

    let placement = ConfigPlacement::prepare(Some(config_path.to_str().unwrap())).unwrap();
    generate_default_config(&placement).unwrap();

    assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "[{\"keep\": true}]");
}

#[test]
fn load_multiple_robots() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"[
            {
                "collection_id": "c-polygon",
                "signer_keyfile_name": "polygon.json",
                "signer_password_file_name": "polygon.pass",
                "terminus_pool_id": 12,
                "value_to_claim": 10,
                "blockchain": "polygon"
            },
            {
                "collection_id": "c-caldera",
                "signer_keyfile_name": "caldera.json",
                "signer_password_file_name": "caldera.pass",
                "terminus_pool_id": 3,
                "value_to_claim": 1,
                "blockchain": "caldera"
            }
        ]"#,
    )
    .unwrap();

    let configs = load_robot_configs(&config_path).unwrap();
    assert_eq!(configs.len(), 2);
    assert_eq!(
        configs[1],
        RobotConfig {
            collection_id: "c-caldera".to_string(),
            signer_keyfile_name: "caldera.json".to_string(),
            signer_password_file_name: "caldera.pass".to_string(),
            terminus_pool_id: 3,
            value_to_claim: 1,
            blockchain: "caldera".to_string(),
        }
    );
}

#[test]
fn load_rejects_zero_claim_value() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"[{
            "collection_id": "c1",
            "signer_keyfile_name": "k.json",
            "signer_password_file_name": "k.pass",
            "terminus_pool_id": 1,
            "value_to_claim": 0,
            "blockchain": "polygon"
        }]"#,
    )
    .unwrap();

    assert!(load_robot_configs(&config_path).is_err());
}

#[test]
fn bare_file_name_lives_in_working_directory() {
    let placement = ConfigPlacement::prepare(Some("robots.json")).unwrap();
    assert_eq!(placement.config_dir_path, PathBuf::from("."));
    assert_eq!(placement.config_path, PathBuf::from("robots.json"));
}
