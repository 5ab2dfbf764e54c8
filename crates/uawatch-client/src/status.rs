// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Outbound status, notice and error streams.
//!
//! The display layer listens on three independent broadcast streams:
//!
//! - **status**: numeric connection status plus text, emitted only on change
//! - **notices**: informational text ("connected", "receiving data")
//! - **errors**: non-fatal operational problems
//!
//! All text is rendered through [`Message`] in the configured [`Language`].

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::OpcUaError;

const CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// StatusCode
// =============================================================================

/// Connection status reported to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StatusCode {
    /// Server not reachable.
    Disconnected = 0,
    /// Server reachable and controller running.
    Healthy = 1,
    /// Server reachable but controller not running.
    ServerNotReady = 2,
}

impl StatusCode {
    /// Returns the numeric code.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Healthy => write!(f, "healthy"),
            Self::ServerNotReady => write!(f, "server_not_ready"),
        }
    }
}

// =============================================================================
// Events
// =============================================================================

/// A status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    /// Status code.
    pub code: StatusCode,
    /// Operator-facing text.
    pub message: String,
    /// `true` for the give-up event after retry exhaustion.
    pub terminal: bool,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// Informational text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Operator-facing text.
    pub message: String,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

/// A non-fatal operational problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Error category (`connection`, `subscription`, `controller`, ...).
    pub category: String,
    /// Structured error code, if the problem came from an [`OpcUaError`].
    pub code: Option<String>,
    /// Operator-facing text.
    pub message: String,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// Language / Message
// =============================================================================

/// Language of operator-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// German.
    De,
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "de" | "german" | "deutsch" => Ok(Self::De),
            other => Err(format!("unsupported language '{}'", other)),
        }
    }
}

/// Operator-facing message templates.
#[derive(Debug, Clone, Copy)]
pub enum Message<'a> {
    /// Status text for a status code.
    Status(StatusCode),
    /// First connect attempt failed, retrying.
    Retrying,
    /// Session established.
    Connected,
    /// One connect attempt failed.
    ConnectAttemptFailed {
        /// 1-based attempt number.
        attempt: u32,
        /// Error text.
        error: &'a str,
    },
    /// Retry budget exhausted.
    GaveUp,
    /// Operator should check the server and restart.
    RestartHint,
    /// Reachability lost on an open session.
    ConnectionLost,
    /// Controller is in configuration mode.
    ConfigMode,
    /// Every configured node is monitored.
    ReceivingData,
    /// Status node could not be resolved.
    StatusNodeFailed {
        /// Node text.
        node: &'a str,
        /// Error text.
        error: &'a str,
    },
    /// Monitored item could not be attached.
    SubscribeFailed {
        /// Node text.
        node: &'a str,
        /// Error text.
        error: &'a str,
    },
    /// Subscription could not be created.
    SubscriptionFailed {
        /// Error text.
        error: &'a str,
    },
    /// Teardown of the subscription reported an error.
    UnsubscribeFailed {
        /// Error text.
        error: &'a str,
    },
    /// Closing the session reported an error.
    DisconnectFailed {
        /// Error text.
        error: &'a str,
    },
    /// Notification payload could not be decoded.
    DecodeFailed {
        /// Error text.
        error: &'a str,
    },
    /// Unexpected failure contained at the iteration boundary.
    IterationFailed {
        /// Error text.
        error: &'a str,
    },
}

impl Message<'_> {
    /// Renders the message.
    pub fn render(&self, language: Language) -> String {
        match language {
            Language::En => self.render_en(),
            Language::De => self.render_de(),
        }
    }

    fn render_en(&self) -> String {
        match *self {
            Self::Status(StatusCode::Disconnected) => "Disconnected from OPC UA server".into(),
            Self::Status(StatusCode::Healthy) => "Connected, controller running".into(),
            Self::Status(StatusCode::ServerNotReady) => {
                "Server reachable, controller not running".into()
            }
            Self::Retrying => "Cannot connect to the OPC UA server. Retrying.".into(),
            Self::Connected => "Connected to OPC UA server".into(),
            Self::ConnectAttemptFailed { attempt, error } => format!(
                "Error while connecting to the OPC UA server (attempt {}): {}",
                attempt, error
            ),
            Self::GaveUp => {
                "Could not connect to the OPC UA server after several attempts. Giving up.".into()
            }
            Self::RestartHint => {
                "Please check the controller's OPC UA server and restart the application".into()
            }
            Self::ConnectionLost => {
                "Connection to the server was lost. Trying to reconnect.".into()
            }
            Self::ConfigMode => {
                "Controller is in config mode. No data received from the server.".into()
            }
            Self::ReceivingData => "Receiving data from server".into(),
            Self::StatusNodeFailed { node, error } => {
                format!("Error resolving status node {}: {}", node, error)
            }
            Self::SubscribeFailed { node, error } => {
                format!("Error subscribing to data changes for node {}: {}", node, error)
            }
            Self::SubscriptionFailed { error } => {
                format!("Error creating subscription: {}", error)
            }
            Self::UnsubscribeFailed { error } => {
                format!("Error removing subscription: {}", error)
            }
            Self::DisconnectFailed { error } => {
                format!("Error disconnecting from OPC UA server: {}", error)
            }
            Self::DecodeFailed { error } => format!("Could not decode notification: {}", error),
            Self::IterationFailed { error } => format!("Unexpected supervisor error: {}", error),
        }
    }

    fn render_de(&self) -> String {
        match *self {
            Self::Status(StatusCode::Disconnected) => "Verbindung zum OPC UA Server getrennt".into(),
            Self::Status(StatusCode::Healthy) => "Verbunden, Steuerung im Run-Modus".into(),
            Self::Status(StatusCode::ServerNotReady) => {
                "Server erreichbar, Steuerung nicht im Run-Modus".into()
            }
            Self::Retrying => {
                "Verbindung zum OPC UA Server nicht möglich. Erneuter Verbindungsversuch.".into()
            }
            Self::Connected => "Verbunden mit OPC UA Server".into(),
            Self::ConnectAttemptFailed { attempt, error } => format!(
                "Beim Versuch, eine Verbindung zum OPC UA Server herzustellen, ist ein Fehler aufgetreten {}: {}",
                attempt, error
            ),
            Self::GaveUp => "Die Verbindung zum OPC UA Server konnte nach mehreren Versuchen nicht hergestellt werden. Abbruch der Verbindungsversuche.".into(),
            Self::RestartHint => {
                "Bitte überprüfen Sie den OPC UA Server der SPS und starten Sie die GUI neu".into()
            }
            Self::ConnectionLost => "Die Verbindung zum Server wurde unterbrochen. Versuche, erneut eine Verbindung herzustellen.".into(),
            Self::ConfigMode => {
                "Twincat befindet sich im Config-Modus. Keine Daten vom Server empfangen.".into()
            }
            Self::ReceivingData => "Empfang von Daten vom Server".into(),
            Self::StatusNodeFailed { node, error } => {
                format!("Fehler beim Abrufen des Knotens {}: {}", node, error)
            }
            Self::SubscribeFailed { node, error } => format!(
                "Fehler beim Abonnieren von Datenänderungen für Knoten {}: {}",
                node, error
            ),
            Self::SubscriptionFailed { error } => {
                format!("Fehler beim Abonnieren von Datenänderungen für Knoten: {}", error)
            }
            Self::UnsubscribeFailed { error } => {
                format!("Fehler beim Abmelden vom Abonnement: {}", error)
            }
            Self::DisconnectFailed { error } => format!(
                "Fehler beim Trennen der Verbindung zum OPC UA Server: {}",
                error
            ),
            Self::DecodeFailed { error } => {
                format!("Benachrichtigung konnte nicht dekodiert werden: {}", error)
            }
            Self::IterationFailed { error } => {
                format!("Unerwarteter Fehler im Überwachungszyklus: {}", error)
            }
        }
    }
}

// =============================================================================
// StatusChannel
// =============================================================================

/// Fan-out of status, notice and error events to any number of listeners.
///
/// Sending never blocks. Listeners that fall behind lose the oldest events
/// (`RecvError::Lagged`).
#[derive(Debug)]
pub struct StatusChannel {
    language: Language,
    status_tx: broadcast::Sender<StatusEvent>,
    notice_tx: broadcast::Sender<Notice>,
    error_tx: broadcast::Sender<ErrorEvent>,
    latest: RwLock<Option<StatusEvent>>,
}

impl StatusChannel {
    /// Creates a channel rendering text in `language`.
    pub fn new(language: Language) -> Self {
        let (status_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (notice_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (error_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            language,
            status_tx,
            notice_tx,
            error_tx,
            latest: RwLock::new(None),
        }
    }

    /// Returns the text language.
    pub fn language(&self) -> Language {
        self.language
    }

    /// Subscribes to status events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    /// Subscribes to notices.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notice_tx.subscribe()
    }

    /// Subscribes to error events.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.error_tx.subscribe()
    }

    /// Returns the last emitted status event.
    pub fn latest_status(&self) -> Option<StatusEvent> {
        self.latest.read().clone()
    }

    /// Emits a status event with the standard text for `code`.
    pub fn emit_status(&self, code: StatusCode) -> StatusEvent {
        self.emit(code, Message::Status(code), false)
    }

    /// Emits the terminal give-up event.
    pub fn emit_terminal(&self) -> StatusEvent {
        self.emit(StatusCode::Disconnected, Message::GaveUp, true)
    }

    fn emit(&self, code: StatusCode, message: Message<'_>, terminal: bool) -> StatusEvent {
        let event = StatusEvent {
            code,
            message: message.render(self.language),
            terminal,
            timestamp: Utc::now(),
        };

        tracing::info!(
            status = code.code(),
            terminal = terminal,
            message = %event.message,
            "Status changed"
        );

        *self.latest.write() = Some(event.clone());
        let _ = self.status_tx.send(event.clone());
        event
    }

    /// Publishes a notice.
    pub fn notice(&self, message: Message<'_>) {
        let notice = Notice {
            message: message.render(self.language),
            timestamp: Utc::now(),
        };
        tracing::info!(message = %notice.message, "Notice");
        let _ = self.notice_tx.send(notice);
    }

    /// Publishes an error event derived from an [`OpcUaError`].
    pub fn report(&self, error: &OpcUaError, message: Message<'_>) {
        self.publish_error(
            error.category(),
            Some(error.error_code().to_string()),
            message,
        );
    }

    /// Publishes an error event that has no underlying [`OpcUaError`].
    pub fn report_text(&self, category: &str, message: Message<'_>) {
        self.publish_error(category, None, message);
    }

    fn publish_error(&self, category: &str, code: Option<String>, message: Message<'_>) {
        let event = ErrorEvent {
            category: category.to_string(),
            code,
            message: message.render(self.language),
            timestamp: Utc::now(),
        };
        let _ = self.error_tx.send(event);
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new(Language::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
