use tokio::task::JoinHandle;

type StopHook = Box<dyn Fn() + Send + Sync>;

/// Handle on the background tasks of a running indexer.
/// Dropping it leaves them running; `stop` ends them.
#[derive(Default)]
pub struct NodeTask {
    subtasks: Vec<JoinHandle<()>>,
    stop_hooks: Vec<StopHook>,
}

impl NodeTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subtask(&mut self, subtask: JoinHandle<()>) {
        self.subtasks.push(subtask);
    }

    /// Runs when the node stops, after its subtasks are aborted.
    pub fn on_stop(&mut self, hook: impl Fn() + Send + Sync + 'static) {
        self.stop_hooks.push(Box::new(hook));
    }

    pub fn is_finished(&self) -> bool {
        self.subtasks.iter().all(|subtask| subtask.is_finished())
    }

    pub fn stop(&self) {
        for subtask in self.subtasks.iter() {
            subtask.abort();
        }

        for hook in self.stop_hooks.iter() {
            hook();
        }
    }
}

impl std::fmt::Debug for NodeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeTask")
            .field("subtasks", &self.subtasks.len())
            .field("stop_hooks", &self.stop_hooks.len())
            .finish()
    }
}
