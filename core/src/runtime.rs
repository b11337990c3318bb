/// Async handle over a session: a driver task fires timers as their
/// deadlines pass, callers mutate through the handle
use crate::clock::ClockSource;
use crate::config::MessagingConfig;
use crate::directory::{ConnectionsDirectory, LocalUser};
use crate::error::{MessagingError, Result};
use crate::ids::IdGenerator;
use crate::messenger_types::{Conversation, ConversationSummary, Message, MessageKind, MessengerEvent};
use crate::session::{MessagingSession, SessionBootstrap};
use crate::view_mode::ViewState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<RwLock<Option<MessagingSession>>>,
    clock: Arc<dyn ClockSource>,
    events: broadcast::Sender<MessengerEvent>,
    wake: Arc<Notify>,
    shutdown: Arc<watch::Sender<bool>>,
    driver: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SessionHandle {
    /// Log in and spawn the driver. Must be called inside a tokio runtime.
    pub fn start(
        user: LocalUser,
        directory: Arc<dyn ConnectionsDirectory>,
        bootstrap: SessionBootstrap,
        config: MessagingConfig,
        clock: Arc<dyn ClockSource>,
        ids: Box<dyn IdGenerator>,
    ) -> Result<Self> {
        let session =
            MessagingSession::login(user, directory, bootstrap, config, clock.clone(), ids)?;
        let events = session.event_sender();
        let session = Arc::new(RwLock::new(Some(session)));
        let wake = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let driver = {
            let session = session.clone();
            let clock = clock.clone();
            let wake = wake.clone();
            tokio::spawn(async move { run_driver(session, clock, wake, shutdown_rx).await })
        };

        Ok(Self {
            session,
            clock,
            events,
            wake,
            shutdown: Arc::new(shutdown),
            driver: Arc::new(Mutex::new(Some(driver))),
        })
    }

    async fn write<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut MessagingSession) -> Result<R>,
    {
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(MessagingError::SessionClosed)?;
        let out = f(session);
        // New timers may be due sooner than the driver's current sleep
        self.wake.notify_one();
        out
    }

    async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&MessagingSession) -> R,
    {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(MessagingError::SessionClosed)?;
        Ok(f(session))
    }

    pub async fn start_conversation(&self, participant_id: &str) -> Result<String> {
        self.write(|s| s.start_conversation(participant_id)).await
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<bool> {
        self.write(|s| Ok(s.delete_conversation(conversation_id))).await
    }

    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<String> {
        self.write(|s| s.send_message(conversation_id, content, kind))
            .await
    }

    pub async fn send_to_active(&self, content: &str, kind: MessageKind) -> Result<String> {
        self.write(|s| s.send_to_active(content, kind)).await
    }

    pub async fn mark_as_read(&self, conversation_id: &str) -> Result<bool> {
        self.write(|s| Ok(s.mark_as_read(conversation_id))).await
    }

    pub async fn select_conversation(&self, conversation_id: &str) -> Result<()> {
        self.write(|s| s.select_conversation(conversation_id)).await
    }

    pub async fn handle_mobile_back(&self) -> Result<bool> {
        self.write(|s| Ok(s.handle_mobile_back())).await
    }

    pub async fn viewport_resized(&self, width: u32) -> Result<()> {
        self.write(|s| {
            s.viewport_resized(width);
            Ok(())
        })
        .await
    }

    pub async fn total_unread(&self) -> Result<u32> {
        self.read(|s| s.total_unread()).await
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.read(|s| s.conversations().to_vec()).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>> {
        self.read(|s| s.messages(conversation_id).to_vec()).await
    }

    pub async fn conversation_summaries(&self) -> Result<Vec<ConversationSummary>> {
        self.read(|s| s.conversation_summaries()).await
    }

    pub async fn view_state(&self) -> Result<ViewState> {
        self.read(|s| s.view_state().clone()).await
    }

    pub async fn typing_in(&self, conversation_id: &str) -> Result<Vec<String>> {
        self.read(|s| s.typing_in(conversation_id)).await
    }

    pub async fn pending_timers(&self) -> Result<usize> {
        self.read(|s| s.pending_timers()).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MessengerEvent> {
        self.events.subscribe()
    }

    pub fn clock(&self) -> Arc<dyn ClockSource> {
        self.clock.clone()
    }

    /// Stop the driver and dispose of the session.
    /// A second call returns `SessionClosed`.
    pub async fn logout(&self) -> Result<()> {
        let _ = self.shutdown.send(true);
        if let Some(driver) = self.driver.lock().await.take() {
            let _ = driver.await;
        }
        match self.session.write().await.take() {
            Some(session) => {
                let cancelled = session.logout();
                debug!("Logout cancelled {} pending timers", cancelled);
                Ok(())
            }
            None => Err(MessagingError::SessionClosed),
        }
    }
}

async fn run_driver(
    session: Arc<RwLock<Option<MessagingSession>>>,
    clock: Arc<dyn ClockSource>,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Session driver started");
    loop {
        let next = match session.read().await.as_ref() {
            Some(s) => s.next_deadline(),
            None => break,
        };
        let wait = next.map(|at| (at - clock.now()).to_std().unwrap_or(Duration::ZERO));

        tokio::select! {
            _ = sleep_or_park(wait) => {
                if let Some(s) = session.write().await.as_mut() {
                    let fired = s.run_due();
                    if fired > 0 {
                        debug!("Fired {} timers", fired);
                    }
                }
            }
            _ = wake.notified() => {}
            _ = shutdown.changed() => break,
        }
    }
    info!("Session driver stopped");
}

async fn sleep_or_park(wait: Option<Duration>) {
    match wait {
        Some(d) => sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}
