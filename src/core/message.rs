//! RPC message envelope shared by every codec.

use serde::{Deserialize, Serialize};

use crate::error::{ApplicationError, ChannelError, Result};

/// Role of a message in a call exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    /// Numeric id used by the JSON envelopes
    pub fn id(self) -> u8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(MessageType::Call),
            2 => Some(MessageType::Reply),
            3 => Some(MessageType::Exception),
            4 => Some(MessageType::Oneway),
            _ => None,
        }
    }
}

/// A single RPC message: method name, role, sequence id and opaque arguments or result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,
    pub kind: MessageType,
    pub seq_id: i32,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn call(name: impl Into<String>, seq_id: i32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: MessageType::Call,
            seq_id,
            payload: payload.into(),
        }
    }

    pub fn oneway(name: impl Into<String>, seq_id: i32, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: MessageType::Oneway,
            seq_id,
            payload: payload.into(),
        }
    }

    /// Build the reply to `request`
    pub fn reply(request: &Message, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: request.name.clone(),
            kind: MessageType::Reply,
            seq_id: request.seq_id,
            payload: payload.into(),
        }
    }

    /// Build an exception reply to `request`
    pub fn exception(request: &Message, error: &ApplicationError) -> Result<Self> {
        let payload =
            bincode::serialize(error).map_err(|e| ChannelError::Serialize(e.to_string()))?;
        Ok(Self {
            name: request.name.clone(),
            kind: MessageType::Exception,
            seq_id: request.seq_id,
            payload,
        })
    }

    /// Decode the application error carried by an `Exception` message
    pub fn application_error(&self) -> Result<ApplicationError> {
        bincode::deserialize(&self.payload).map_err(|e| ChannelError::Deserialize(e.to_string()))
    }
}
