//! Session handshake: parse the client's first frame and merge it with the
//! server-side defaults into a [`LiveSessionConfig`].

use serde_json::{Map, Value};

use super::error::RelayError;
use crate::core::live::LiveSessionConfig;

/// Instruction sent upstream for every session. Client-supplied instructions
/// are discarded.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are a helpful assistant for screen sharing sessions. Your role is to:
1) Analyze and describe the content being shared on screen
2) Answer questions about the shared content
3) Provide relevant information and context about what's being shown
4) Assist with technical issues related to screen sharing
5) Maintain a professional and helpful tone. Focus on being concise and clear in your responses.";

/// Modalities requested when the client names none.
pub const DEFAULT_RESPONSE_MODALITIES: [&str; 2] = ["AUDIO", "TEXT"];

/// The client's `setup` object, validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupRequest {
    pub generation_config: Option<Map<String, Value>>,
    pub response_modalities: Option<Vec<String>>,
    /// The client tried to set a system instruction
    pub had_system_instruction: bool,
}

/// Parse the handshake frame.
///
/// The frame must be a JSON object. A missing `setup` key is an empty
/// setup; a `setup` that is not an object is an error.
pub fn parse_handshake(raw: &str) -> Result<SetupRequest, RelayError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| RelayError::Handshake(format!("setup is not valid JSON: {e}")))?;

    let Value::Object(mut frame) = value else {
        return Err(RelayError::Handshake(
            "setup frame is not a JSON object".to_string(),
        ));
    };

    let mut setup = match frame.remove("setup") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(setup)) => setup,
        Some(_) => {
            return Err(RelayError::Handshake(
                "`setup` must be a JSON object".to_string(),
            ));
        }
    };

    let generation_config = match setup
        .remove("generation_config")
        .or_else(|| setup.remove("generationConfig"))
    {
        None | Some(Value::Null) => None,
        Some(Value::Object(config)) => Some(config),
        Some(_) => {
            return Err(RelayError::Handshake(
                "`generation_config` must be a JSON object".to_string(),
            ));
        }
    };

    let response_modalities = match setup
        .remove("response_modalities")
        .or_else(|| setup.remove("responseModalities"))
    {
        None | Some(Value::Null) => None,
        Some(value) => Some(modalities_from_value(value)?),
    };

    let had_system_instruction =
        setup.contains_key("system_instruction") || setup.contains_key("systemInstruction");

    Ok(SetupRequest {
        generation_config,
        response_modalities,
        had_system_instruction,
    })
}

fn modalities_from_value(value: Value) -> Result<Vec<String>, RelayError> {
    serde_json::from_value(value).map_err(|_| {
        RelayError::Handshake("`response_modalities` must be a list of strings".to_string())
    })
}

/// Merge a client request with server defaults.
///
/// `response_modalities` is taken from `generation_config` first, then from
/// the setup object, then the default. The system instruction always comes
/// from the server.
pub fn merge_setup(
    request: SetupRequest,
    model: &str,
    system_instruction: &str,
) -> Result<LiveSessionConfig, RelayError> {
    let mut generation_config = request.generation_config.unwrap_or_default();

    let from_generation_config = match generation_config.remove("response_modalities") {
        None | Some(Value::Null) => None,
        Some(value) => Some(modalities_from_value(value)?),
    };

    let response_modalities = from_generation_config
        .or(request.response_modalities)
        .unwrap_or_else(|| {
            DEFAULT_RESPONSE_MODALITIES
                .iter()
                .map(|m| m.to_string())
                .collect()
        });

    Ok(LiveSessionConfig {
        model: model.to_string(),
        generation_config,
        response_modalities,
        system_instruction: system_instruction.to_string(),
    })
}
