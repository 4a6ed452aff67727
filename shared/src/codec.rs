//! Length-prefixed bincode framing over a reliable byte stream
//!
//! Each frame is a 4-byte big-endian payload length followed by the
//! bincode-encoded [`Packet`].

use crate::Packet;
use bincode::{deserialize, serialize};
use std::io::ErrorKind;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted on the wire
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds limit")]
    FrameTooLarge(usize),
}

/// Encodes a packet into a complete frame
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let payload = serialize(packet)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Writes one framed packet and flushes
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed packet.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
/// Not cancel-safe; run it in a dedicated reader task.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(deserialize(&payload)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthorityRequest, GamePhase, Team};

    #[tokio::test]
    async fn test_frames_are_read_in_order() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        write_packet(&mut a, &Packet::Connect { client_version: 1 })
            .await
            .unwrap();
        write_packet(
            &mut a,
            &Packet::Request {
                target: 2,
                request: AuthorityRequest::SetTeam(Team::Blue),
            },
        )
        .await
        .unwrap();
        drop(a);

        match read_packet(&mut b).await.unwrap() {
            Some(Packet::Connect { client_version }) => assert_eq!(client_version, 1),
            other => panic!("Unexpected packet: {:?}", other),
        }
        match read_packet(&mut b).await.unwrap() {
            Some(Packet::Request { target, request }) => {
                assert_eq!(target, 2);
                assert_eq!(request, AuthorityRequest::SetTeam(Team::Blue));
            }
            other => panic!("Unexpected packet: {:?}", other),
        }
        assert!(read_packet(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let bogus = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        tokio::io::AsyncWriteExt::write_all(&mut a, &bogus)
            .await
            .unwrap();

        match read_packet(&mut b).await {
            Err(CodecError::FrameTooLarge(len)) => assert_eq!(len, MAX_FRAME_LEN + 1),
            other => panic!("Expected oversized frame error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let frame = encode_frame(&Packet::LoadLevel {
            level: "arena".to_string(),
        })
        .unwrap();
        let (head, tail) = frame.split_at(3);
        let mut reader = tokio_test::io::Builder::new().read(head).read(tail).build();

        match read_packet(&mut reader).await.unwrap() {
            Some(Packet::LoadLevel { level }) => assert_eq!(level, "arena"),
            other => panic!("Unexpected packet: {:?}", other),
        }
        assert!(read_packet(&mut reader).await.unwrap().is_none());
    }

    #[test]
    fn test_encode_frame_prefix_matches_payload() {
        let frame = encode_frame(&Packet::PhaseChanged {
            phase: GamePhase::Starting,
        })
        .unwrap();
        let len = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
        assert_eq!(len, frame.len() - 4);
    }
}
