use std::time::Duration;
use taskload_core::{RampKind, RunConfig};

#[test]
fn bundled_scenario_matches_the_defaults() {
    let path = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../taskload/scenarios/maintenance.yaml"
    );
    let config = RunConfig::from_file(path).unwrap();
    let defaults = RunConfig::default();

    assert_eq!(config.base_url, defaults.base_url);
    assert_eq!(config.stages, defaults.stages);
    assert_eq!(config.ramp, RampKind::Linear);
    assert_eq!(config.thresholds, defaults.thresholds);
    assert_eq!(config.payload, defaults.payload);
    assert_eq!(config.accounts, defaults.accounts);
    assert_eq!(config.iteration_sleep, Duration::from_secs(1));
    assert_eq!(config.validate().unwrap().len(), 5);
}
