use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::Question;
use super::connection::ConnectionId;
use super::coordinator::QuizCoordinator;
use super::evaluator::Submission;
use crate::error::QuizError;

/// Events sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    CreateRoom { room_id: String },

    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },

    JoinQuiz,

    #[serde(rename_all = "camelCase")]
    StartQuiz { room_id: String },

    SubmitAnswer(Submission),
}

/// Events sent to clients, either to one connection or to a whole room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "UserJoined", rename_all = "camelCase")]
    UserJoined { room_id: String, joined_users: usize },

    #[serde(rename = "UserLeft", rename_all = "camelCase")]
    UserLeft { room_id: String, joined_users: usize },

    #[serde(rename = "quizQuestions")]
    QuizQuestions { questions: Vec<Question> },

    #[serde(rename = "quizStarted", rename_all = "camelCase")]
    QuizStarted { room_id: String },

    #[serde(rename = "quizTimerUpdate", rename_all = "camelCase")]
    QuizTimerUpdate { seconds_left: u32 },

    #[serde(rename = "nextQuestion", rename_all = "camelCase")]
    NextQuestion { question_index: usize },

    #[serde(rename = "quizEnded")]
    QuizEnded,

    #[serde(rename = "answerResult")]
    AnswerResult {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        correct: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn answer_accepted(correct: bool) -> Self {
        ServerMessage::AnswerResult {
            success: true,
            correct: Some(correct),
            message: None,
        }
    }

    pub fn answer_rejected(err: &QuizError) -> Self {
        ServerMessage::AnswerResult {
            success: false,
            correct: None,
            message: Some(err.client_message().to_string()),
        }
    }

    pub fn error(err: &QuizError) -> Self {
        ServerMessage::Error {
            message: err.client_message().to_string(),
        }
    }
}

/// Per-connection dispatcher. Every failure ends here: it is logged and
/// turned into a message for the calling connection only.
pub struct QuizSignalingHandler {
    coordinator: Arc<QuizCoordinator>,
    connection_id: ConnectionId,
}

impl QuizSignalingHandler {
    pub fn new(coordinator: Arc<QuizCoordinator>, connection_id: ConnectionId) -> Self {
        Self {
            coordinator,
            connection_id,
        }
    }

    pub async fn handle_text(&self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    error = %e,
                    raw_message = %text,
                    "Failed to parse client message"
                );
                let err = QuizError::InvalidMessage(e.to_string());
                self.reply(ServerMessage::error(&err)).await;
            }
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        let coordinator = &self.coordinator;
        let connection = &self.connection_id;

        match message {
            ClientMessage::CreateRoom { room_id } => {
                coordinator.create_room(connection, &room_id).await;
            }
            ClientMessage::JoinRoom { room_id } => {
                if let Err(e) = coordinator.join_room(connection, &room_id).await {
                    self.fail("joinRoom", &e, ServerMessage::error(&e)).await;
                }
            }
            ClientMessage::JoinQuiz => {
                if let Err(e) = coordinator.join_quiz(connection).await {
                    self.fail("joinQuiz", &e, ServerMessage::error(&e)).await;
                }
            }
            ClientMessage::StartQuiz { room_id } => {
                if let Err(e) = coordinator.start_quiz(&room_id).await {
                    self.fail("startQuiz", &e, ServerMessage::error(&e)).await;
                }
            }
            ClientMessage::SubmitAnswer(submission) => {
                if let Err(e) = coordinator.submit_answer(&submission).await {
                    self.fail("submitAnswer", &e, ServerMessage::answer_rejected(&e))
                        .await;
                }
            }
        }
    }

    async fn fail(&self, event: &str, err: &QuizError, reply: ServerMessage) {
        tracing::warn!(
            connection_id = %self.connection_id,
            event,
            error = %err,
            "Client request failed"
        );
        self.reply(reply).await;
    }

    async fn reply(&self, message: ServerMessage) {
        self.coordinator
            .transport()
            .send_to(&self.connection_id, &message)
            .await;
    }

    /// Called once when the socket closes.
    pub async fn cleanup(&self) {
        self.coordinator.disconnect(&self.connection_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_message_wire_names() {
        let message: ClientMessage =
            serde_json::from_value(json!({"type": "createRoom", "roomId": "r1"})).unwrap();
        assert_eq!(message, ClientMessage::CreateRoom { room_id: "r1".to_string() });

        let message: ClientMessage = serde_json::from_value(json!({"type": "joinQuiz"})).unwrap();
        assert_eq!(message, ClientMessage::JoinQuiz);

        let message: ClientMessage = serde_json::from_value(json!({
            "type": "submitAnswer",
            "questionId": "q1",
            "selectedOption": "B",
            "roomId": "r1"
        }))
        .unwrap();
        assert!(matches!(message, ClientMessage::SubmitAnswer(s) if s.question_id == "q1"));
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let result = serde_json::from_value::<ClientMessage>(json!({"type": "dropTables"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_wire_format() {
        let value = serde_json::to_value(ServerMessage::UserJoined {
            room_id: "r1".to_string(),
            joined_users: 2,
        })
        .unwrap();
        assert_eq!(value, json!({"type": "UserJoined", "roomId": "r1", "joinedUsers": 2}));

        let value = serde_json::to_value(ServerMessage::QuizTimerUpdate { seconds_left: 5 }).unwrap();
        assert_eq!(value, json!({"type": "quizTimerUpdate", "secondsLeft": 5}));

        let value = serde_json::to_value(ServerMessage::QuizEnded).unwrap();
        assert_eq!(value, json!({"type": "quizEnded"}));
    }

    #[test]
    fn test_answer_results() {
        let value = serde_json::to_value(ServerMessage::answer_accepted(false)).unwrap();
        assert_eq!(value, json!({"type": "answerResult", "success": true, "correct": false}));

        let value =
            serde_json::to_value(ServerMessage::answer_rejected(&QuizError::RoomIdMissing)).unwrap();
        assert_eq!(
            value,
            json!({"type": "answerResult", "success": false, "message": "Room ID not provided"})
        );
    }
}
