//! Text wire format for packets
//!
//! A frame looks like `<type>[<attachments>-][<nsp>,][<id>][<json>]`, which is
//! the string encoding spoken by Socket.IO peers. Binary attachments are not
//! supported: binary events are always written with zero attachments and a
//! frame announcing attachments is rejected.

use serde_json::Value;

use crate::core::packet::{Packet, PacketType, NO_ACK_ID};
use crate::error::{Result, SocketIoError};

/// Encode a packet into a text frame
pub fn encode_packet(packet: &Packet) -> Result<String> {
    let mut frame = String::new();
    frame.push_str(&packet.packet_type.as_u8().to_string());

    if packet.packet_type == PacketType::BinaryEvent {
        frame.push_str("0-");
    }

    if !packet.nsp.is_empty() && packet.nsp != "/" {
        if !packet.nsp.starts_with('/') {
            return Err(SocketIoError::EncodeError(format!(
                "Namespace '{}' must start with '/'",
                packet.nsp
            )));
        }
        frame.push_str(&packet.nsp);
        frame.push(',');
    }

    if packet.id >= 0 {
        if !packet.packet_type.carries_id() {
            return Err(SocketIoError::EncodeError(format!(
                "{:?} packets cannot carry an ack id",
                packet.packet_type
            )));
        }
        frame.push_str(&packet.id.to_string());
    }

    // Event-like packets always carry their argument list, even when empty
    if packet.packet_type.carries_id() || !packet.data.is_empty() {
        let payload = serde_json::to_string(&packet.data)
            .map_err(|e| SocketIoError::EncodeError(format!("Invalid payload: {}", e)))?;
        frame.push_str(&payload);
    }

    Ok(frame)
}

/// Decode a text frame into a packet
pub fn decode_packet(frame: &str) -> Result<Packet> {
    let mut rest = frame;

    let type_char = rest
        .chars()
        .next()
        .ok_or_else(|| SocketIoError::DecodeError("Empty frame".to_string()))?;
    let type_value = type_char
        .to_digit(10)
        .ok_or_else(|| SocketIoError::DecodeError(format!("Invalid packet type '{}'", type_char)))?;
    let packet_type = PacketType::try_from(type_value as u8)?;
    rest = &rest[type_char.len_utf8()..];

    if packet_type == PacketType::BinaryEvent {
        let dash = rest.find('-').ok_or_else(|| {
            SocketIoError::DecodeError("Binary event without attachment count".to_string())
        })?;
        let attachments: usize = rest[..dash].parse().map_err(|_| {
            SocketIoError::DecodeError(format!("Invalid attachment count '{}'", &rest[..dash]))
        })?;
        if attachments > 0 {
            return Err(SocketIoError::DecodeError(
                "Binary attachments are not supported".to_string(),
            ));
        }
        rest = &rest[dash + 1..];
    }

    let mut nsp = String::new();
    if rest.starts_with('/') {
        let end = rest.find(',').unwrap_or(rest.len());
        nsp = rest[..end].to_string();
        rest = if end < rest.len() { &rest[end + 1..] } else { "" };
    }

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let id = if digits > 0 {
        if !packet_type.carries_id() {
            return Err(SocketIoError::DecodeError(format!(
                "{:?} packets cannot carry an ack id",
                packet_type
            )));
        }
        rest[..digits]
            .parse::<i64>()
            .map_err(|e| SocketIoError::DecodeError(format!("Invalid ack id: {}", e)))?
    } else {
        NO_ACK_ID
    };
    rest = &rest[digits..];

    let data = if rest.is_empty() {
        Vec::new()
    } else {
        match serde_json::from_str::<Value>(rest)
            .map_err(|e| SocketIoError::DecodeError(format!("Invalid payload: {}", e)))?
        {
            Value::Array(values) => values,
            other => vec![other],
        }
    };

    Ok(Packet {
        packet_type,
        id,
        nsp,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_connect_on_default_namespace() {
        assert_eq!(encode_packet(&Packet::connect("")).unwrap(), "0");
        assert_eq!(encode_packet(&Packet::connect("/")).unwrap(), "0");
        assert_eq!(encode_packet(&Packet::connect("/admin")).unwrap(), "0/admin,");
    }

    #[test]
    fn test_encode_event_and_ack() {
        let event = Packet::event_with_id(12, "/chat", vec![json!("message"), json!("hi")]);
        assert_eq!(encode_packet(&event).unwrap(), r#"2/chat,12["message","hi"]"#);

        let ack = Packet::ack(4, "", vec![]);
        assert_eq!(encode_packet(&ack).unwrap(), "34[]");
    }

    #[test]
    fn test_encode_rejects_id_on_connect() {
        let mut packet = Packet::connect("");
        packet.id = 3;
        assert!(matches!(
            encode_packet(&packet),
            Err(SocketIoError::EncodeError(_))
        ));
    }

    #[test]
    fn test_encode_rejects_namespace_without_slash() {
        assert!(matches!(
            encode_packet(&Packet::connect("chat")),
            Err(SocketIoError::EncodeError(_))
        ));
        assert!(matches!(
            encode_packet(&Packet::event("chat", vec![json!("message")])),
            Err(SocketIoError::EncodeError(_))
        ));
    }

    #[test]
    fn test_decode_event_with_namespace_and_id() {
        let packet = decode_packet(r#"2/chat,7["message",{"text":"hi"}]"#).unwrap();
        assert_eq!(packet.packet_type, PacketType::Event);
        assert_eq!(packet.nsp, "/chat");
        assert_eq!(packet.id, 7);
        assert_eq!(packet.data, vec![json!("message"), json!({"text": "hi"})]);
    }

    #[test]
    fn test_decode_connect_with_auth_object() {
        let packet = decode_packet(r#"0/admin,{"token":"abc"}"#).unwrap();
        assert_eq!(packet.packet_type, PacketType::Connect);
        assert_eq!(packet.nsp, "/admin");
        assert_eq!(packet.id, NO_ACK_ID);
        assert_eq!(packet.data, vec![json!({"token": "abc"})]);
    }

    #[test]
    fn test_decode_binary_event_without_attachments() {
        let packet = decode_packet(r#"50-["upload"]"#).unwrap();
        assert_eq!(packet.packet_type, PacketType::BinaryEvent);
        assert_eq!(packet.event_name(), Some("upload"));

        assert!(decode_packet(r#"51-["upload",{"_placeholder":true,"num":0}]"#).is_err());
    }

    #[test]
    fn test_decode_failures() {
        assert!(matches!(decode_packet(""), Err(SocketIoError::DecodeError(_))));
        assert!(matches!(
            decode_packet("4/admin,"),
            Err(SocketIoError::UnknownPacketType(4))
        ));
        assert!(matches!(decode_packet("x"), Err(SocketIoError::DecodeError(_))));
        assert!(matches!(decode_packet("15"), Err(SocketIoError::DecodeError(_))));
        assert!(matches!(
            decode_packet(r#"2["broken""#),
            Err(SocketIoError::DecodeError(_))
        ));
    }

    #[test]
    fn test_encoded_event_decodes_to_same_packet() {
        let packet = Packet::event_with_id(0, "/game", vec![json!("move"), json!([1, 2])]);
        let frame = encode_packet(&packet).unwrap();
        assert_eq!(decode_packet(&frame).unwrap(), packet);
    }
}
