use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::catalog::{Catalog, CatalogStore, QuestionLoader};
use super::connection::{ConnectionId, Transport};
use super::evaluator::{self, Submission};
use super::room::{Binding, Departure, RoomRegistry};
use super::session::{Advance, QuizPhase, SessionTable, Started};
use super::signaling::ServerMessage;
use crate::config::QuizTiming;
use crate::error::{QuizError, Result};

/// Owns room membership, quiz sessions and the question catalog, and turns
/// client events into broadcasts.
///
/// Lock order: `registry` before `sessions`; the countdown task only ever
/// takes `sessions`. Broadcasts that must stay ordered with a state change are issued while
/// the lock guarding that state is held.
pub struct QuizCoordinator {
    registry: RwLock<RoomRegistry>,
    sessions: Mutex<SessionTable>,
    catalog: CatalogStore,
    loader: Arc<dyn QuestionLoader>,
    transport: Arc<dyn Transport>,
    timing: QuizTiming,
}

impl QuizCoordinator {
    pub fn new(
        loader: Arc<dyn QuestionLoader>,
        transport: Arc<dyn Transport>,
        timing: QuizTiming,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry: RwLock::new(RoomRegistry::new()),
            sessions: Mutex::new(SessionTable::new()),
            catalog: CatalogStore::new(),
            loader,
            transport,
            timing,
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn timing(&self) -> QuizTiming {
        self.timing
    }

    /// Registers the room and attaches the creator to it without counting
    /// them as a member. Re-creating an existing room re-announces its count.
    pub async fn create_room(&self, connection: &ConnectionId, room_id: &str) {
        let mut registry = self.registry.write().await;
        let count = registry.create_room(room_id);

        let already_bound = registry
            .binding(connection)
            .is_some_and(|binding| binding.room_id == room_id);

        let emptied = if already_bound {
            None
        } else {
            let emptied = self.release_binding(&mut registry, connection).await;
            registry.bind(
                connection,
                Binding {
                    room_id: room_id.to_string(),
                    counted: false,
                },
            );
            emptied
        };

        self.transport.attach(connection, room_id).await;
        self.transport
            .broadcast(
                room_id,
                &ServerMessage::UserJoined {
                    room_id: room_id.to_string(),
                    joined_users: count,
                },
            )
            .await;
        self.end_emptied(emptied).await;
        drop(registry);

        tracing::info!(connection_id = %connection, room_id = %room_id, "Client created room");
    }

    pub async fn join_room(&self, connection: &ConnectionId, room_id: &str) -> Result<()> {
        let mut registry = self.registry.write().await;
        if !registry.is_created(room_id) {
            return Err(QuizError::RoomNotFound(room_id.to_string()));
        }

        let already_member = registry
            .binding(connection)
            .is_some_and(|binding| binding.room_id == room_id && binding.counted);

        let (count, emptied) = if already_member {
            (registry.member_count(room_id).unwrap_or(0), None)
        } else {
            let emptied = self.release_binding(&mut registry, connection).await;
            let count = registry.join_room(room_id)?;
            registry.bind(
                connection,
                Binding {
                    room_id: room_id.to_string(),
                    counted: true,
                },
            );
            (count, emptied)
        };

        self.transport.attach(connection, room_id).await;
        self.transport
            .broadcast(
                room_id,
                &ServerMessage::UserJoined {
                    room_id: room_id.to_string(),
                    joined_users: count,
                },
            )
            .await;
        self.end_emptied(emptied).await;
        drop(registry);

        tracing::info!(
            connection_id = %connection,
            room_id = %room_id,
            joined_users = count,
            "Client joined room"
        );
        Ok(())
    }

    /// Resolves the departing connection's room from the registry's own
    /// bindings, never from anything the client said.
    pub async fn disconnect(&self, connection: &ConnectionId) {
        let mut registry = self.registry.write().await;
        let emptied = self.release_binding(&mut registry, connection).await;
        self.end_emptied(emptied).await;
        drop(registry);

        tracing::info!(connection_id = %connection, "Client disconnected");
    }

    /// Unbinds the connection from its current room, broadcasting the new
    /// count if members remain. Returns the room id if it emptied.
    async fn release_binding(
        &self,
        registry: &mut RoomRegistry,
        connection: &ConnectionId,
    ) -> Option<String> {
        let binding = registry.unbind(connection)?;
        self.transport.detach(connection, &binding.room_id).await;

        if !binding.counted {
            return None;
        }

        match registry.leave_room(&binding.room_id)? {
            Departure::Remaining(count) => {
                self.transport
                    .broadcast(
                        &binding.room_id,
                        &ServerMessage::UserLeft {
                            room_id: binding.room_id.clone(),
                            joined_users: count,
                        },
                    )
                    .await;
                tracing::info!(
                    connection_id = %connection,
                    room_id = %binding.room_id,
                    joined_users = count,
                    "Client left room"
                );
                None
            }
            Departure::Emptied => {
                let still_attached = self.transport.attached_count(&binding.room_id).await;
                tracing::info!(
                    connection_id = %connection,
                    room_id = %binding.room_id,
                    still_attached,
                    "Last player left room"
                );
                Some(binding.room_id)
            }
        }
    }

    /// Must run with the registry lock held.
    async fn end_emptied(&self, emptied: Option<String>) {
        let Some(room_id) = emptied else {
            return;
        };
        if self.sessions.lock().await.cancel(&room_id) {
            tracing::info!(room_id = %room_id, "Stopped quiz in empty room");
        }
    }

    /// Reloads the catalog and sends the questions, without answers, to the
    /// caller. No lock is held while the loader runs.
    pub async fn join_quiz(&self, connection: &ConnectionId) -> Result<()> {
        tracing::info!(connection_id = %connection, "Client joined quiz, loading questions");
        let catalog = self.reload_catalog().await?;

        self.transport
            .send_to(
                connection,
                &ServerMessage::QuizQuestions {
                    questions: catalog.questions().to_vec(),
                },
            )
            .await;
        Ok(())
    }

    async fn reload_catalog(&self) -> Result<Arc<Catalog>> {
        let (questions, keys) = self.loader.load().await?;
        let catalog = self.catalog.replace(Catalog::new(questions, keys)?).await;
        tracing::info!(questions = catalog.len(), "Question catalog loaded");
        Ok(catalog)
    }

    async fn current_or_loaded_catalog(&self) -> Result<Arc<Catalog>> {
        let catalog = self.catalog.snapshot().await;
        if !catalog.is_empty() {
            return Ok(catalog);
        }
        let catalog = self.reload_catalog().await?;
        if catalog.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        Ok(catalog)
    }

    /// Starts, or restarts, the room's quiz at question 0 with a fresh
    /// countdown. Any earlier countdown is cancelled before anything is
    /// broadcast.
    pub async fn start_quiz(self: &Arc<Self>, room_id: &str) -> Result<()> {
        if !self.registry.read().await.is_created(room_id) {
            return Err(QuizError::RoomNotFound(room_id.to_string()));
        }
        let catalog = self.current_or_loaded_catalog().await?;

        let mut sessions = self.sessions.lock().await;
        let Started { epoch, restarted } = sessions.start(room_id, catalog.len());
        if !restarted {
            self.transport
                .broadcast(
                    room_id,
                    &ServerMessage::QuizStarted {
                        room_id: room_id.to_string(),
                    },
                )
                .await;
        }

        let timer = tokio::spawn(Arc::clone(self).run_countdown(room_id.to_string(), epoch));
        sessions.attach_timer(room_id, epoch, timer);

        tracing::info!(room_id = %room_id, questions = catalog.len(), "Quiz started");
        Ok(())
    }

    /// The room's countdown task. Every broadcast happens under the session
    /// lock after checking the epoch, so a replaced countdown goes silent
    /// even if its abort has not landed yet.
    async fn run_countdown(self: Arc<Self>, room_id: String, epoch: u64) {
        loop {
            let mut ticker = tokio::time::interval(self.timing.tick);
            ticker.tick().await;

            for seconds_left in (0..self.timing.countdown_secs).rev() {
                ticker.tick().await;
                let sessions = self.sessions.lock().await;
                if !sessions.is_current(&room_id, epoch) {
                    return;
                }
                self.transport
                    .broadcast(&room_id, &ServerMessage::QuizTimerUpdate { seconds_left })
                    .await;
            }
            ticker.tick().await;

            let mut sessions = self.sessions.lock().await;
            match sessions.advance(&room_id, epoch) {
                Advance::Next(question_index) => {
                    self.transport
                        .broadcast(&room_id, &ServerMessage::NextQuestion { question_index })
                        .await;
                    tracing::debug!(room_id = %room_id, question_index, "Advanced to next question");
                }
                Advance::Ended => {
                    self.transport
                        .broadcast(&room_id, &ServerMessage::QuizEnded)
                        .await;
                    tracing::info!(room_id = %room_id, "Quiz ended");
                    return;
                }
                Advance::Stale => {
                    tracing::debug!(room_id = %room_id, epoch, "Stale countdown stopped");
                    return;
                }
            }
        }
    }

    /// Scores an answer and broadcasts the verdict to the whole room.
    pub async fn submit_answer(&self, submission: &Submission) -> Result<()> {
        let catalog = self.catalog.snapshot().await;
        let verdict = evaluator::evaluate(&catalog, submission)?;
        let room_id = verdict.room_id.as_str();

        tracing::info!(
            room_id = %room_id,
            question_id = %submission.question_id,
            correct = verdict.correct,
            "Answer submitted"
        );
        self.transport
            .broadcast(room_id, &ServerMessage::answer_accepted(verdict.correct))
            .await;
        Ok(())
    }

    pub async fn phase(&self, room_id: &str) -> QuizPhase {
        self.sessions.lock().await.phase(room_id)
    }

    pub async fn has_timer(&self, room_id: &str) -> bool {
        self.sessions.lock().await.has_timer(room_id)
    }

    pub async fn member_count(&self, room_id: &str) -> Option<usize> {
        self.registry.read().await.member_count(room_id)
    }

    pub async fn is_created(&self, room_id: &str) -> bool {
        self.registry.read().await.is_created(room_id)
    }
}
