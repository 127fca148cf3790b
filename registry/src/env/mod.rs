//! The environment an agent is evaluated in.
//!
//! An [`Environment`] binds one domain catalog (in one interface variant) to
//! its fixture data, a task list, prompt material and a user simulator. Each
//! episode starts from a fresh copy of the fixture; tool calls and user
//! responses are dispatched through [`Environment::step`].

pub mod prompt;
pub mod reward;
pub mod user;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::contract::is_failure_envelope;
use crate::core::clock::Clock;
use crate::core::store::Store;
use crate::domains::Domain;
use crate::io::config::EnvConfig;
use crate::io::fixtures::load_store;
use crate::io::paths::{DomainPaths, read_optional_text};
use crate::io::tasks::load_tasks;
use crate::task::{Action, Task};

use self::reward::RewardInfo;
use self::user::{STOP, UserSimulator, load_user};

/// Action name that sends text to the user instead of calling a tool.
pub const RESPOND_ACTION: &str = "respond";

#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    /// The user's opening message.
    pub observation: String,
    pub task_index: usize,
    pub task: Task,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepResponse {
    pub observation: String,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StepInfo {
    /// Tool name, or `user` for responses.
    pub source: String,
    /// The tool raised or returned a failure envelope.
    pub failed: bool,
    /// Present on the step that ends the episode.
    pub reward_info: Option<RewardInfo>,
}

#[derive(Debug, Default)]
struct Episode {
    task_index: usize,
    steps: u32,
    done: bool,
    actions: Vec<Action>,
    responses: Vec<String>,
}

pub struct Environment {
    domain: Domain,
    catalog: Catalog,
    clock: Clock,
    fixture: Store,
    store: Store,
    tasks: Vec<Task>,
    rules: String,
    wiki: String,
    user: Box<dyn UserSimulator>,
    terminate_tools: Vec<String>,
    max_steps: u32,
    episode: Option<Episode>,
}

impl Environment {
    /// Build from files under `config.data_root`.
    pub fn load(config: &EnvConfig) -> Result<Self> {
        config.validate()?;
        let paths = DomainPaths::new(&config.data_root, config.domain);
        let fixture = load_store(&paths.data_dir())?;
        let tasks = load_tasks(&paths.tasks_file(config.split))?;
        let rules = read_optional_text(&paths.rules_file())?;
        let wiki = read_optional_text(&paths.wiki_file())?;
        Self::from_parts(config, fixture, tasks, rules, wiki)
    }

    /// Build from in-memory parts; `config.data_root` and `config.split` are unused.
    pub fn from_parts(
        config: &EnvConfig,
        fixture: Store,
        tasks: Vec<Task>,
        rules: String,
        wiki: String,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = config
            .domain
            .catalog(config.interface)
            .with_context(|| format!("build {} catalog", config.domain))?;
        let clock = config.clock()?;
        let user = load_user(&config.user_strategy)?;
        info!(
            domain = %config.domain,
            interface = config.interface.number(),
            tools = catalog.len(),
            tasks = tasks.len(),
            records = fixture.record_count(),
            "environment ready"
        );
        Ok(Self {
            domain: config.domain,
            catalog,
            clock,
            store: fixture.clone(),
            fixture,
            tasks,
            rules,
            wiki,
            user,
            terminate_tools: config.domain.terminate_tools(),
            max_steps: config.max_steps,
            episode: None,
        })
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The pristine fixture every episode starts from.
    pub fn fixture(&self) -> &Store {
        &self.fixture
    }

    /// The current episode's store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, task_index: usize) -> Result<&Task> {
        match self.tasks.get(task_index) {
            Some(task) => Ok(task),
            None => bail!(
                "task index {task_index} out of range ({} tasks)",
                self.tasks.len()
            ),
        }
    }

    pub fn terminate_tools(&self) -> &[String] {
        &self.terminate_tools
    }

    pub fn max_steps(&self) -> u32 {
        self.max_steps
    }

    pub fn is_done(&self) -> bool {
        self.episode.as_ref().is_some_and(|episode| episode.done)
    }

    /// Actions taken so far in the current episode.
    pub fn actions(&self) -> &[Action] {
        self.episode
            .as_ref()
            .map(|episode| episode.actions.as_slice())
            .unwrap_or_default()
    }

    pub fn system_prompt(&self) -> Result<String> {
        prompt::render_system_prompt(self.domain, &self.catalog, &self.rules, &self.wiki)
    }

    /// Start an episode: fresh store copy, empty action log.
    pub fn reset(&mut self, task_index: usize) -> Result<ResetResponse> {
        let task = self.task(task_index)?.clone();
        self.store = self.fixture.clone();
        self.episode = Some(Episode {
            task_index,
            ..Episode::default()
        });
        let observation = self.user.reset(&task.instruction);
        debug!(task_index, "episode reset");
        Ok(ResetResponse {
            observation,
            task_index,
            task,
        })
    }

    /// Dispatch one action.
    ///
    /// Tool failures are observations, not errors: raised failures read
    /// `Error: <message>` and envelopes are passed through. The episode ends on
    /// a terminate tool, a user stop, or the step limit; that step carries the
    /// reward.
    pub fn step(&mut self, action: &Action) -> Result<StepResponse> {
        let Some(episode) = self.episode.as_mut() else {
            bail!("reset must be called before step");
        };
        if episode.done {
            bail!("episode is done; call reset");
        }
        episode.steps += 1;
        episode.actions.push(action.clone());

        let (observation, source, failed, mut done) = if action.name == RESPOND_ACTION {
            let content = action
                .kwargs
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let reply = self.user.step(&content);
            episode.responses.push(content);
            let stop = reply.contains(STOP);
            (reply, "user".to_string(), false, stop)
        } else {
            let outcome = self
                .catalog
                .invoke(&action.name, &mut self.store, &self.clock, &action.kwargs_value());
            let (observation, failed) = match outcome {
                Ok(body) => {
                    let failed = is_failure_envelope(&body);
                    (body, failed)
                }
                Err(err) => (format!("Error: {err}"), true),
            };
            let terminal = self.terminate_tools.contains(&action.name);
            (observation, action.name.clone(), failed, terminal)
        };
        if episode.steps >= self.max_steps {
            done = true;
        }
        debug!(step = episode.steps, source = %source, failed, done, "step");

        let mut info = StepInfo {
            source,
            failed,
            reward_info: None,
        };
        let mut reward = 0.0;
        if done {
            episode.done = true;
            let task = self
                .tasks
                .get(episode.task_index)
                .context("episode task missing")?;
            let scored = reward::calculate(
                &self.catalog,
                &self.fixture,
                &self.clock,
                task,
                &self.store,
                &episode.responses,
            );
            info!(task_index = episode.task_index, reward = scored.reward, "episode finished");
            reward = scored.reward;
            info.reward_info = Some(scored);
        }
        Ok(StepResponse {
            observation,
            reward,
            done,
            info,
        })
    }

    /// Score the current store against the gold script, treating `observed`
    /// as the texts expected outputs must appear in.
    pub fn score(&self, observed: &[String]) -> Result<RewardInfo> {
        let episode = self
            .episode
            .as_ref()
            .context("reset must be called before scoring")?;
        let task = self.task(episode.task_index)?;
        Ok(reward::calculate(
            &self.catalog,
            &self.fixture,
            &self.clock,
            task,
            &self.store,
            observed,
        ))
    }

    /// The store the gold script produces for `task_index`.
    pub fn gold_store(&self, task_index: usize) -> Result<Store> {
        let task = self.task(task_index)?;
        Ok(reward::gold_store(
            &self.catalog,
            &self.fixture,
            &self.clock,
            &task.actions,
        ))
    }
}
