//! Glittr payload encoding
//!
//! A message travels in an unspendable output of the form
//! `OP_RETURN <"GLITTR"> <json>`, each segment a separate data push.
//! The JSON text is the wire contract. Relay size limits are left to the
//! caller: payloads are neither chunked nor compressed here.

use bitcoin::blockdata::opcodes;
use bitcoin::script::{Builder, Instruction, PushBytesBuf, Script, ScriptBuf};
use bitcoin::Transaction;
use log::debug;

use crate::error::{GlittrError, Result};
use crate::message::OpReturnMessage;

/// Protocol tag pushed right after `OP_RETURN`
pub const GLITTR_FLAG: &[u8] = b"GLITTR";

/// Serialize a message and wrap it in a Glittr data-carrying script
pub fn encode_message(message: &OpReturnMessage) -> Result<ScriptBuf> {
    let json = serde_json::to_vec(message)?;
    debug!("Encoding {} message ({} bytes)", message.kind(), json.len());
    encode_payload(&json)
}

/// Wrap already serialized payload bytes in a Glittr data-carrying script
pub fn encode_payload(payload: &[u8]) -> Result<ScriptBuf> {
    let data = PushBytesBuf::try_from(payload.to_vec())
        .map_err(|_| GlittrError::Payload(format!("payload of {} bytes cannot be pushed", payload.len())))?;
    let flag = PushBytesBuf::try_from(GLITTR_FLAG.to_vec())
        .map_err(|_| GlittrError::Payload("protocol flag cannot be pushed".to_string()))?;

    Ok(Builder::new()
        .push_opcode(opcodes::all::OP_RETURN)
        .push_slice(flag)
        .push_slice(data)
        .into_script())
}

/// Parse a Glittr script back into its message
pub fn decode_message(script: &Script) -> Result<OpReturnMessage> {
    let payload = decode_payload(script)?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Extract the raw payload bytes from a Glittr script
pub fn decode_payload(script: &Script) -> Result<Vec<u8>> {
    let mut instructions = script.instructions();

    if instructions.next() != Some(Ok(Instruction::Op(opcodes::all::OP_RETURN))) {
        return Err(GlittrError::Payload("script does not start with OP_RETURN".to_string()));
    }

    match instructions.next() {
        Some(Ok(Instruction::PushBytes(flag))) if flag.as_bytes() == GLITTR_FLAG => {}
        _ => return Err(GlittrError::Payload("missing GLITTR protocol flag".to_string())),
    }

    let payload = match instructions.next() {
        Some(Ok(Instruction::PushBytes(data))) => data.as_bytes().to_vec(),
        Some(Err(e)) => return Err(GlittrError::Payload(format!("malformed payload push: {}", e))),
        _ => return Err(GlittrError::Payload("missing payload push".to_string())),
    };

    if instructions.next().is_some() {
        return Err(GlittrError::Payload("unexpected data after payload".to_string()));
    }

    Ok(payload)
}

/// Find the first Glittr message carried by a transaction
pub fn extract_message(tx: &Transaction) -> Option<OpReturnMessage> {
    tx.output
        .iter()
        .filter(|output| output.script_pubkey.is_op_return())
        .find_map(|output| decode_message(&output.script_pubkey).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BlockTxTuple, MintContractCallParams, TxBuilder};
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, TxOut};

    fn mint_message() -> OpReturnMessage {
        TxBuilder::mint(MintContractCallParams {
            contract: BlockTxTuple(100, 2),
            pointer: 1,
            oracle_message: None,
        })
    }

    #[test]
    fn test_script_layout() {
        let script = encode_message(&mint_message()).unwrap();
        let json = serde_json::to_vec(&mint_message()).unwrap();

        let mut instructions = script.instructions();
        assert_eq!(
            instructions.next(),
            Some(Ok(Instruction::Op(opcodes::all::OP_RETURN)))
        );
        match instructions.next() {
            Some(Ok(Instruction::PushBytes(flag))) => assert_eq!(flag.as_bytes(), b"GLITTR"),
            other => panic!("unexpected instruction {:?}", other),
        }
        match instructions.next() {
            Some(Ok(Instruction::PushBytes(data))) => assert_eq!(data.as_bytes(), json.as_slice()),
            other => panic!("unexpected instruction {:?}", other),
        }
        assert!(instructions.next().is_none());
        assert!(script.is_op_return());
    }

    #[test]
    fn test_decode_round_trip() {
        let message = mint_message();
        let script = encode_message(&message).unwrap();
        assert_eq!(decode_message(&script).unwrap(), message);
    }

    #[test]
    fn test_large_payload_uses_pushdata() {
        let payload = vec![b'x'; 600];
        let script = encode_payload(&payload).unwrap();
        assert_eq!(decode_payload(&script).unwrap(), payload);
    }

    #[test]
    fn test_decode_rejects_foreign_scripts() {
        let other_flag = Builder::new()
            .push_opcode(opcodes::all::OP_RETURN)
            .push_slice(b"OTHER!")
            .push_slice(b"{}")
            .into_script();
        assert!(decode_message(&other_flag).is_err());

        let not_op_return = Builder::new().push_slice(b"GLITTR").into_script();
        assert!(decode_payload(&not_op_return).is_err());

        let bad_json = encode_payload(b"not json").unwrap();
        assert!(matches!(decode_message(&bad_json), Err(GlittrError::Serialization(_))));
    }

    #[test]
    fn test_extract_from_transaction() {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![
                TxOut {
                    value: Amount::from_sat(546),
                    script_pubkey: ScriptBuf::new(),
                },
                TxOut {
                    value: Amount::ZERO,
                    script_pubkey: encode_message(&mint_message()).unwrap(),
                },
            ],
        };
        assert_eq!(extract_message(&tx), Some(mint_message()));
    }
}
