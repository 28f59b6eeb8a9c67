use std::io::Write;

use boxnet_core::scenario::{ScenarioError, load_scenario};
use boxnet_core::world::WorldKind;
use boxnet_core::{ActionPlan, execute_plan, parse_plan};
use tempfile::NamedTempFile;

const CORNER_SCENARIO: &str = r#"{
    "world": "corner",
    "rows": 1,
    "cols": 2,
    "boxes": [
        {"color": "red", "corner": {"row": 0, "col": 0, "label": "SE"}}
    ],
    "goals": {"red": [{"row": 0, "col": 1}]},
    "agents": [{"row": 0, "col": 0}, {"row": 0, "col": 1}]
}"#;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_and_plays_corner_scenario() {
    let file = write_temp(CORNER_SCENARIO);
    let mut world = load_scenario(file.path()).unwrap().build().unwrap();
    assert_eq!(world.kind(), WorldKind::Corner);
    assert_eq!(world.agent_count(), 2);

    // (0, 1) is the point shared by both cells.
    let plan: ActionPlan = parse_plan(
        "Agent 0: move red box to corner (0, 1, SE)\nAgent 1: move red box to goal (0, 1)",
    )
    .plan;
    let report = execute_plan(world.as_mut(), &plan);
    assert!(report.success, "{report:?}");
    assert!(world.is_complete());
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let err = load_scenario(&path).unwrap_err();
    assert!(matches!(err, ScenarioError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn malformed_file_is_a_json_error() {
    let file = write_temp(r#"{"world": "hex", "rows": 2}"#);
    assert!(matches!(
        load_scenario(file.path()),
        Err(ScenarioError::Json(_))
    ));
}
