// Copyright (c) 2022-2023 The MobileCoin Foundation

//! Typed event maps
//!
//! An [EventMap] is an enum with one variant per event name, each carrying
//! a concrete payload type. Maps are declared with [event_map!], which
//! derives serde using adjacent tagging so a variant serializes to the
//! `event` / `data` pair carried by an [Envelope].

use core::fmt::Debug;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{Envelope, ErrorEvent, ProtoError, RemoteError};

/// Name of the error event that may arrive in place of any response
pub const ERROR_EVENT: &str = "error";

/// Mapping from event names to payload types for one channel direction
pub trait EventMap:
    Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static
{
    /// Event names declared by this map
    const EVENTS: &'static [&'static str];

    /// Event name for this instance
    fn event(&self) -> &'static str;

    /// Check whether an event name is declared by this map
    fn declares(name: &str) -> bool {
        Self::EVENTS.contains(&name)
    }

    /// Encode an event into an [Envelope]
    fn to_envelope(&self) -> Result<Envelope, ProtoError> {
        let event = self.event();

        let mut obj = match serde_json::to_value(self) {
            Ok(Value::Object(o)) => o,
            Ok(v) => {
                return Err(ProtoError::Encode {
                    event: event.to_string(),
                    reason: format!("expected object, found {v}"),
                })
            }
            Err(e) => {
                return Err(ProtoError::Encode {
                    event: event.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let data = obj.remove("data").unwrap_or(Value::Null);

        Ok(Envelope::new(event, data))
    }

    /// Decode and validate an [Envelope] against this map
    fn from_envelope(envelope: &Envelope) -> Result<Self, ProtoError> {
        if !Self::declares(&envelope.event) {
            return Err(ProtoError::UnknownEvent(envelope.event.clone()));
        }

        let mut obj = Map::new();
        obj.insert("event".into(), Value::String(envelope.event.clone()));
        if !envelope.data.is_null() {
            obj.insert("data".into(), envelope.data.clone());
        }

        serde_json::from_value(Value::Object(obj)).map_err(|e| ProtoError::Schema {
            event: envelope.event.clone(),
            reason: e.to_string(),
        })
    }

    /// Application error code carried by this event, if any.
    ///
    /// This covers both `{status: "error", code}` result responses and
    /// numeric codes on the [ERROR_EVENT].
    fn error_code(&self) -> Option<String> {
        let envelope = self.to_envelope().ok()?;

        if envelope.event == ERROR_EVENT {
            return envelope.data.get("code").map(|c| match c {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            });
        }

        match envelope.data.get("status") {
            Some(Value::String(s)) if s == "error" => envelope
                .data
                .get("code")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        }
    }

    /// Decode this event as an [ERROR_EVENT], if it is one
    fn remote_error(&self) -> Option<RemoteError> {
        if self.event() != ERROR_EVENT {
            return None;
        }

        let envelope = self.to_envelope().ok()?;
        let e: ErrorEvent = serde_json::from_value(envelope.data).ok()?;

        Some(RemoteError {
            code: e.code,
            message: e.message,
        })
    }
}

/// Declare an [EventMap] enum.
///
/// ```
/// use frame_signer_proto::{event_map, EventMap};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
/// pub struct Ping {
///     pub n: u32,
/// }
///
/// event_map! {
///     /// Events sent by the pinger
///     pub enum PingEvents {
///         "ping" => Ping(Ping),
///         "reset" => Reset,
///     }
/// }
///
/// assert_eq!(PingEvents::EVENTS, &["ping", "reset"]);
/// assert_eq!(PingEvents::Reset.event(), "reset");
/// ```
#[macro_export]
macro_rules! event_map {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $event:literal => $variant:ident $(($payload:ty))?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        #[serde(tag = "event", content = "data")]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $event)]
                $variant $(($payload))?,
            )*
        }

        impl $crate::EventMap for $name {
            const EVENTS: &'static [&'static str] = &[$($event),*];

            fn event(&self) -> &'static str {
                match self {
                    $(Self::$variant { .. } => $event,)*
                }
            }
        }
    };
}
