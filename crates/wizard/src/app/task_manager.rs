//! Background execution of backend requests.
//!
//! The wizard hands out a [`Request`] per remote operation; the manager runs
//! it on its own tokio task with a clone of the HTTP client and sends the
//! [`Reply`] back to the app loop, which feeds it to `RegistrationWizard::finish`.
//! At most one task per [`Control`] is active. Tasks are aborted on shutdown.

use std::collections::HashMap;

use registration::{Control, HttpApi, Reply, Request};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

pub struct TaskManager {
    api: HttpApi,
    reply_tx: mpsc::UnboundedSender<Reply>,
    active: HashMap<Control, JoinHandle<()>>,
}

impl TaskManager {
    /// Create the manager and the receiving end for finished requests.
    pub fn new(api: HttpApi) -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let manager = Self {
            api,
            reply_tx,
            active: HashMap::new(),
        };
        (manager, reply_rx)
    }

    pub fn spawn(&mut self, request: Request) {
        let control = request.control();
        debug!(%control, "request started");
        let api = self.api.clone();
        let tx = self.reply_tx.clone();
        let handle = tokio::spawn(async move {
            let reply = request.run(&api).await;
            if tx.send(reply).is_err() {
                debug!(%control, "reply dropped: app loop is gone");
            }
        });
        if let Some(previous) = self.active.insert(control, handle) {
            warn!(%control, "replacing a request that was still running");
            previous.abort();
        }
    }

    /// Forget the task behind `control` once its reply arrived.
    pub fn finished(&mut self, control: Control) {
        self.active.remove(&control);
    }

    pub fn is_running(&self, control: Control) -> bool {
        self.active.contains_key(&control)
    }

    pub fn shutdown(&mut self) {
        if !self.active.is_empty() {
            debug!(count = self.active.len(), "aborting running requests");
        }
        for (_, handle) in self.active.drain() {
            handle.abort();
        }
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration::BackendConfig;

    fn offline_api() -> HttpApi {
        HttpApi::new(BackendConfig {
            base_url: "http://127.0.0.1:9".into(),
            request_timeout_secs: 2,
            ..BackendConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn reply_comes_back_through_the_channel() {
        let (mut tasks, mut replies) = TaskManager::new(offline_api());
        tasks.spawn(Request::Departments);
        assert!(tasks.is_running(Control::Departments));

        let reply = replies.recv().await.unwrap();
        assert_eq!(reply.control(), Control::Departments);
        assert!(matches!(reply, Reply::Departments(Err(_))));
        tasks.finished(Control::Departments);
        assert!(!tasks.is_running(Control::Departments));
    }

    #[tokio::test]
    async fn shutdown_aborts_running_requests() {
        let (mut tasks, mut replies) = TaskManager::new(offline_api());
        tasks.spawn(Request::Departments);
        tasks.shutdown();
        assert!(!tasks.is_running(Control::Departments));
        drop(tasks);
        assert!(replies.recv().await.is_none());
    }
}
