//! Episodes and task runs against an on-disk domain layout.
//!
//! Every test writes the smart home sample fixture plus a task list into a
//! temporary data root, then drives the environment the way the eval harness
//! or an agent loop would.

use registry::domains::{Domain, TRANSFER_TOOL};
use registry::env::{Environment, RESPOND_ACTION};
use registry::run::agent::ScriptedAgent;
use registry::run::{Divergence, Mode, TaskRunner};
use registry::task::{Action, Task};
use registry::test_support::{action, env_config, smart_home_store, task, temp_domain};
use serde_json::json;

fn scene_task() -> Task {
    task(
        vec![
            action("create_scene", json!({ "name": "Movie Night" })),
            action("add_device_to_scene", json!({ "scene_id": "1", "device_id": "1" })),
        ],
        &["Movie Night"],
    )
}

fn lights_task() -> Task {
    task(
        vec![
            action("search_devices", json!({ "room_id": "1", "device_type": "light" })),
            action(
                "update_device_state",
                json!({ "device_id": "1", "power": "on", "brightness": 60 }),
            ),
        ],
        &["Pendant"],
    )
}

fn respond(content: &str) -> Action {
    action(RESPOND_ACTION, json!({ "content": content }))
}

fn load(tasks: &[Task]) -> (tempfile::TempDir, Environment) {
    let (temp, config) = temp_domain(Domain::SmartHome, tasks);
    let env = Environment::load(&config).expect("load environment");
    (temp, env)
}

#[test]
fn load_reads_fixture_tasks_and_prompt() {
    let (_temp, env) = load(&[scene_task(), lights_task()]);
    assert_eq!(env.domain(), Domain::SmartHome);
    assert_eq!(env.tasks().len(), 2);
    assert_eq!(env.fixture(), &smart_home_store());
    assert_eq!(env.terminate_tools(), [TRANSFER_TOOL.to_string()]);

    let prompt = env.system_prompt().expect("prompt");
    assert!(prompt.contains("update_device_state"));
    assert!(prompt.contains(TRANSFER_TOOL));
    assert!(env.task(2).is_err());
}

#[test]
fn missing_data_directory_fails_to_load() {
    let temp = tempfile::tempdir().expect("tempdir");
    let config = env_config(temp.path(), Domain::Airline);
    assert!(Environment::load(&config).is_err());
}

#[test]
fn reset_starts_each_episode_from_the_fixture() {
    let (_temp, mut env) = load(&[scene_task()]);
    assert!(env.step(&respond("hello")).is_err());

    let reset = env.reset(0).expect("reset");
    assert_eq!(reset.observation, reset.task.instruction);
    env.step(&action("create_scene", json!({ "name": "Movie Night" })))
        .expect("step");
    assert!(env.store().get("scenes", "1").is_some());
    assert_eq!(env.actions().len(), 1);

    env.reset(0).expect("second reset");
    assert_eq!(env.store(), env.fixture());
    assert!(env.actions().is_empty());
}

#[test]
fn tool_failures_are_observations() {
    let (_temp, mut env) = load(&[scene_task()]);
    env.reset(0).expect("reset");

    let response = env
        .step(&action("get_device", json!({ "device_id": "99" })))
        .expect("step");
    assert_eq!(response.observation, "Error: Device 99 not found");
    assert!(response.info.failed);
    assert!(!response.done);
    assert_eq!(response.info.source, "get_device");

    let response = env
        .step(&action("no_such_tool", json!({})))
        .expect("step");
    assert!(response.info.failed);
    assert!(response.observation.contains("Unknown tool: no_such_tool"));
}

#[test]
fn responding_ends_the_episode_with_a_reward() {
    let (_temp, mut env) = load(&[scene_task()]);
    env.reset(0).expect("reset");
    env.step(&action("create_scene", json!({ "name": "Movie Night" })))
        .expect("create");
    env.step(&action(
        "add_device_to_scene",
        json!({ "scene_id": "1", "device_id": "1" }),
    ))
    .expect("link");

    let response = env.step(&respond("Created Movie Night.")).expect("respond");
    assert!(response.done);
    assert_eq!(response.info.source, "user");
    assert_eq!(response.reward, 1.0);
    let reward_info = response.info.reward_info.expect("reward info");
    assert!(reward_info.store_diff.is_empty());
    assert_eq!(reward_info.expected_fingerprint, reward_info.actual_fingerprint);

    assert!(env.is_done());
    assert!(env.step(&respond("anything else?")).is_err());
}

#[test]
fn incomplete_work_scores_zero() {
    let (_temp, mut env) = load(&[scene_task()]);
    env.reset(0).expect("reset");
    env.step(&action("create_scene", json!({ "name": "Movie Night" })))
        .expect("create");

    let response = env.step(&respond("Done.")).expect("respond");
    assert!(response.done);
    assert_eq!(response.reward, 0.0);
    let reward_info = response.info.reward_info.expect("reward info");
    assert_eq!(reward_info.store_diff, vec!["scene_devices/1".to_string()]);
    assert_eq!(reward_info.missing_outputs, vec!["Movie Night".to_string()]);
}

#[test]
fn transfer_tool_terminates() {
    let transfer = task(
        vec![action(TRANSFER_TOOL, json!({ "summary": "wants a refund" }))],
        &[],
    );
    let (_temp, mut env) = load(&[transfer]);
    env.reset(0).expect("reset");

    let response = env
        .step(&action(TRANSFER_TOOL, json!({ "summary": "wants a refund" })))
        .expect("transfer");
    assert!(response.done);
    assert!(!response.info.failed);
    assert_eq!(response.reward, 1.0);
}

#[test]
fn step_limit_ends_the_episode() {
    let (_temp, mut config) = temp_domain(Domain::SmartHome, &[lights_task()]);
    config.max_steps = 2;
    let mut env = Environment::load(&config).expect("load");
    env.reset(0).expect("reset");

    let probe = action("get_device", json!({ "device_id": "1" }));
    assert!(!env.step(&probe).expect("first").done);
    let response = env.step(&probe).expect("second");
    assert!(response.done);
    assert!(response.info.reward_info.is_some());
}

#[test]
fn replay_of_a_clean_script_passes() {
    let (_temp, mut env) = load(&[lights_task()]);
    let gold = env.gold_store(0).expect("gold");
    let report = TaskRunner::new(&mut env).replay(0).expect("replay");

    assert_eq!(report.mode, Mode::Replay);
    assert!(report.passed, "{:?}", report.divergences);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(report.failed_calls(), 0);
    assert_eq!(report.reward, 1.0);
    assert_eq!(report.fingerprint, gold.fingerprint());
    assert_eq!(
        gold.get("devices", "1").expect("device")["brightness"],
        60
    );
}

#[test]
fn replay_reports_failed_calls_and_missing_outputs() {
    let broken = task(
        vec![
            action("get_device", json!({ "device_id": "99" })),
            action("create_scene", json!({ "name": "Evening" })),
        ],
        &["Morning"],
    );
    let (_temp, mut env) = load(&[broken]);
    let report = TaskRunner::new(&mut env).replay(0).expect("replay");

    assert!(!report.passed);
    assert_eq!(report.failed_calls(), 1);
    assert_eq!(
        report.divergences,
        vec![
            Divergence::CallFailed {
                step: 0,
                name: "get_device".to_string(),
                observation: "Error: Device 99 not found".to_string(),
            },
            Divergence::OutputMissing {
                output: "Morning".to_string(),
            },
        ]
    );
    assert!(report.steps[1].observation.contains("Evening"));
}

#[test]
fn replay_cut_short_by_a_terminate_tool_reports_the_rest() {
    let create = action("create_scene", json!({ "name": "Movie Night" }));
    let transfer = action(TRANSFER_TOOL, json!({ "summary": "needs a human" }));
    let late = action("create_scene", json!({ "name": "Reading" }));
    let script = task(vec![create, transfer, late.clone()], &[]);
    let (_temp, mut env) = load(&[script]);

    let report = TaskRunner::new(&mut env).replay(0).expect("replay");
    assert!(!report.passed);
    assert_eq!(report.steps.len(), 2);
    assert_eq!(
        report.divergences,
        vec![Divergence::MissingCall {
            position: 2,
            expected: late,
        }]
    );
}

#[test]
fn replay_past_the_step_limit_reports_the_rest() {
    let (_temp, mut config) = temp_domain(Domain::SmartHome, &[lights_task()]);
    config.max_steps = 1;
    let mut env = Environment::load(&config).expect("load");

    let report = TaskRunner::new(&mut env).replay(0).expect("replay");
    assert!(!report.passed);
    assert_eq!(report.steps.len(), 1);
    assert!(report.divergences.iter().any(|divergence| matches!(
        divergence,
        Divergence::MissingCall { position: 1, .. }
    )));
}

#[test]
fn replay_is_deterministic_across_runs() {
    let (_temp, mut env) = load(&[scene_task(), lights_task()]);
    let mut runner = TaskRunner::new(&mut env);
    let first: Vec<String> = (0..2)
        .map(|index| runner.replay(index).expect("replay").fingerprint)
        .collect();
    let second: Vec<String> = (0..2)
        .map(|index| runner.replay(index).expect("replay").fingerprint)
        .collect();
    assert_eq!(first, second);
    assert_ne!(first[0], first[1]);
}

#[test]
fn driving_the_script_with_an_answer_passes() {
    let scripted = scene_task();
    let mut actions = scripted.actions.clone();
    actions.push(respond("Your Movie Night scene is ready."));
    let (_temp, mut env) = load(&[scripted]);

    let mut agent = ScriptedAgent::new(actions);
    let report = TaskRunner::new(&mut env)
        .drive(0, &mut agent)
        .expect("drive");
    assert_eq!(report.mode, Mode::Drive);
    assert!(report.passed, "{:?}", report.divergences);
    assert_eq!(report.steps.len(), 3);
    assert_eq!(report.reward, 1.0);
}

#[test]
fn driving_detects_divergent_calls() {
    let (_temp, mut env) = load(&[lights_task()]);
    let mut agent = ScriptedAgent::new(vec![action(
        "update_device_state",
        json!({ "device_id": "1", "power": "on", "brightness": 10 }),
    )]);
    let report = TaskRunner::new(&mut env)
        .drive(0, &mut agent)
        .expect("drive");

    assert!(!report.passed);
    assert_eq!(report.reward, 0.0);
    assert!(report.divergences.iter().any(|divergence| matches!(
        divergence,
        Divergence::UnexpectedCall { position: 0, .. }
    )));
    assert!(report.divergences.iter().any(|divergence| matches!(
        divergence,
        Divergence::MissingCall { position: 1, .. }
    )));
    assert!(report.divergences.contains(&Divergence::StoreMismatch {
        paths: vec!["devices/1".to_string()],
    }));
    assert!(report.divergences.contains(&Divergence::OutputMissing {
        output: "Pendant".to_string(),
    }));
}

#[test]
fn driving_past_the_step_limit_is_a_divergence() {
    let (_temp, mut config) = temp_domain(Domain::SmartHome, &[lights_task()]);
    config.max_steps = 1;
    let mut env = Environment::load(&config).expect("load");
    let mut agent = ScriptedAgent::new(lights_task().actions);

    let report = TaskRunner::new(&mut env)
        .drive(0, &mut agent)
        .expect("drive");
    assert_eq!(report.steps.len(), 1);
    assert!(report
        .divergences
        .contains(&Divergence::StepLimit { max_steps: 1 }));
}
