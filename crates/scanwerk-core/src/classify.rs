// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Error classification. Every failure is either the caller's fault or ours;
// the class drives the HTTP status code and the hint is plain English for
// whoever is standing at the scanner.

use serde::Serialize;
use tracing::{error, warn};

use crate::error::ScanwerkError;

/// Who is responsible for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultClass {
    /// Invalid caller input or a transient device state the caller can retry.
    ClientFault,
    /// Hardware, host or otherwise internal failure.
    ServerFault,
}

/// A failure tagged with its class and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub class: FaultClass,
    pub message: String,
    /// What the user should try, when there is something useful to say.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ClassifiedError {
    fn client(message: String) -> Self {
        Self {
            class: FaultClass::ClientFault,
            message,
            hint: None,
        }
    }

    fn server(message: String) -> Self {
        Self {
            class: FaultClass::ServerFault,
            message,
            hint: None,
        }
    }

    fn with_hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_owned());
        self
    }

    pub fn is_client_fault(&self) -> bool {
        self.class == FaultClass::ClientFault
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Classify an error and log it.
///
/// Unrecognised driver failures are server faults.
pub fn classify(err: &ScanwerkError) -> ClassifiedError {
    let message = err.to_string();

    let classified = match err {
        // -- Caller input --
        ScanwerkError::Coercion { .. } => ClassifiedError::client(message),
        ScanwerkError::UnknownOption(_) => ClassifiedError::client(message)
            .with_hint("Ask GET /config for the options this device supports."),
        ScanwerkError::DeviceNotFound(_) => ClassifiedError::client(message)
            .with_hint("Ask GET /list for the devices attached to this host."),
        ScanwerkError::InvalidParameters(_) => ClassifiedError::client(message),

        // -- Device state the caller can act on --
        ScanwerkError::DeviceBusy => ClassifiedError::client(message)
            .with_hint("Another scan is using the device. Try again in a moment."),
        ScanwerkError::Unsupported => ClassifiedError::client(message),
        ScanwerkError::Cancelled => ClassifiedError::client(message),

        // -- Hardware --
        ScanwerkError::Jammed => ClassifiedError::server(message)
            .with_hint("Gently pull the stuck paper out of the feeder, then scan again."),
        ScanwerkError::NoDocuments => ClassifiedError::server(message)
            .with_hint("Put the pages in the document feeder, then scan again."),
        ScanwerkError::CoverOpen => ClassifiedError::server(message)
            .with_hint("Close the scanner lid, then scan again."),
        ScanwerkError::DeviceIo(_) => ClassifiedError::server(message)
            .with_hint("Check the scanner's cable and power, then scan again."),
        ScanwerkError::NoMemory => ClassifiedError::server(message),
        ScanwerkError::AccessDenied => ClassifiedError::server(message)
            .with_hint("The server's user needs permission to use the scanner device."),

        // -- Host and everything unrecognised --
        ScanwerkError::Enumeration(_)
        | ScanwerkError::Driver(_)
        | ScanwerkError::BackendUnavailable
        | ScanwerkError::Encoding(_)
        | ScanwerkError::Storage(_)
        | ScanwerkError::Serialization(_)
        | ScanwerkError::Task(_) => ClassifiedError::server(message),
    };

    match classified.class {
        FaultClass::ClientFault => warn!(error = %classified.message, "request rejected"),
        FaultClass::ServerFault => error!(error = %classified.message, "request failed"),
    }

    classified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OptionKind;

    fn class_of(err: ScanwerkError) -> FaultClass {
        classify(&err).class
    }

    #[test]
    fn caller_errors_are_client_faults() {
        let client = [
            ScanwerkError::DeviceBusy,
            ScanwerkError::Unsupported,
            ScanwerkError::Cancelled,
            ScanwerkError::InvalidParameters("resolution".into()),
            ScanwerkError::DeviceNotFound("genesys".into()),
            ScanwerkError::UnknownOption("nonexistent".into()),
            ScanwerkError::Coercion {
                option: "resolution".into(),
                expected: OptionKind::Int,
                found: "string",
            },
        ];
        for err in client {
            assert_eq!(class_of(err), FaultClass::ClientFault);
        }
    }

    #[test]
    fn hardware_and_host_errors_are_server_faults() {
        let server = [
            ScanwerkError::Jammed,
            ScanwerkError::NoDocuments,
            ScanwerkError::CoverOpen,
            ScanwerkError::DeviceIo("usb reset".into()),
            ScanwerkError::NoMemory,
            ScanwerkError::AccessDenied,
            ScanwerkError::Enumeration("daemon gone".into()),
            ScanwerkError::Driver("status 42".into()),
        ];
        for err in server {
            assert_eq!(class_of(err), FaultClass::ServerFault);
        }
    }

    #[test]
    fn message_is_the_error_text() {
        let classified = classify(&ScanwerkError::UnknownOption("nonexistent".into()));
        assert_eq!(classified.message, "no such option nonexistent");
        assert!(classified.hint.is_some());
    }

    #[test]
    fn jam_carries_a_hint() {
        let classified = classify(&ScanwerkError::Jammed);
        assert!(classified.hint.as_deref().is_some_and(|h| h.contains("paper")));
    }

    #[test]
    fn io_errors_without_driver_context_are_server_faults() {
        let err = ScanwerkError::Storage(std::io::Error::other("disk full"));
        assert_eq!(class_of(err), FaultClass::ServerFault);
    }
}
