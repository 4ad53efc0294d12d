use chrono::NaiveDate;
use uuid::Uuid;
use wbs::config::OutlineConfig;
use wbs::coordinator::Coordinator;
use wbs::events::EventSink;
use wbs::hierarchy::HierarchyNumber;
use wbs::store::{MemoryStore, ProjectId};
use wbs::task::{Task, TaskId};

pub fn h(raw: &str) -> HierarchyNumber {
    raw.parse().expect("valid hierarchy number")
}

pub fn d(raw: &str) -> NaiveDate {
    raw.parse().expect("valid date")
}

/// A seeded project with a coordinator reading from an in-memory store.
pub struct Fixture {
    pub project: ProjectId,
    pub coordinator: Coordinator<MemoryStore>,
}

impl Fixture {
    pub fn seeded(tasks: Vec<Task>) -> Self {
        Self::seeded_with_config(tasks, OutlineConfig::default())
    }

    /// Like `seeded`, with a buffering event sink and a fixed actor.
    pub fn seeded_observed(tasks: Vec<Task>) -> Self {
        let project = Uuid::new_v4();
        let mut store = MemoryStore::new();
        store.seed(project, tasks);
        let mut coordinator = Coordinator::new(store, project)
            .with_sink(EventSink::buffer())
            .with_actor("pm");
        coordinator
            .refresh()
            .expect("seeded store always lists tasks");
        Self {
            project,
            coordinator,
        }
    }

    pub fn seeded_with_config(tasks: Vec<Task>, config: OutlineConfig) -> Self {
        let project = Uuid::new_v4();
        let mut store = MemoryStore::new();
        store.seed(project, tasks);
        let mut coordinator = Coordinator::new(store, project).with_config(config);
        coordinator
            .refresh()
            .expect("seeded store always lists tasks");
        Self {
            project,
            coordinator,
        }
    }

    /// Id of the seeded task named `name`.
    pub fn id_of(&self, name: &str) -> TaskId {
        self.coordinator
            .outline()
            .iter()
            .find(|task| task.name == name)
            .map(|task| task.id)
            .expect("fixture task exists")
    }

    /// The authoritative number of `name` in the store, as a string.
    pub fn stored_number(&self, name: &str) -> String {
        self.stored(name)
            .hierarchy
            .expect("fixture task is positioned")
            .to_string()
    }

    /// The authoritative predecessor list of `name`, as strings.
    pub fn stored_predecessors(&self, name: &str) -> Vec<String> {
        self.stored(name)
            .predecessors
            .iter()
            .map(|number| number.to_string())
            .collect()
    }

    pub fn stored(&self, name: &str) -> Task {
        self.coordinator
            .store()
            .tasks(self.project)
            .into_iter()
            .find(|task| task.name == name)
            .expect("fixture task exists in store")
    }
}

/// A positioned task with no schedule data.
pub fn task(name: &str, number: &str) -> Task {
    Task::new(name).at(h(number))
}

/// A positioned task with predecessor references.
pub fn task_after(name: &str, number: &str, predecessors: &[&str]) -> Task {
    Task::new(name)
        .at(h(number))
        .with_predecessors(predecessors.iter().map(|raw| h(raw)).collect())
}

/// A positioned task with dates, inclusive duration, and progress.
pub fn scheduled(name: &str, number: &str, start: &str, end: &str, progress: f64) -> Task {
    let start = d(start);
    let end = d(end);
    let mut task = Task::new(name).at(h(number));
    task.start = Some(start);
    task.end = Some(end);
    task.duration = Some((end - start).num_days() + 1);
    task.progress = progress;
    task
}
