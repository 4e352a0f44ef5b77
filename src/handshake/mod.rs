//! Client side of the plain (unencrypted) RTMP handshake.
//!
//! The exchange is C0+C1 written without waiting for the server, then
//! S0+S1 read back, C2 echoed from S1, and finally S2 read and discarded.
//! Any short read or unexpected version byte aborts connection setup.

use crate::utils::{ByteBuffer, current_timestamp, generate_random_bytes};
use crate::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// RTMP version carried in C0/S0
pub const RTMP_VERSION: u8 = 3;

/// Handshake block size (C1/S1/C2/S2)
pub const HANDSHAKE_SIZE: usize = 1536;

const RANDOM_PAYLOAD_SIZE: usize = HANDSHAKE_SIZE - 8;

/// Client hello: version byte plus the C1 block
#[derive(Debug, Clone)]
pub struct C0C1 {
    pub version: u8,
    pub timestamp: u32,
    pub zero: u32,
    pub random_data: Vec<u8>,
}

impl C0C1 {
    /// Create C0+C1 for a new client connection
    pub fn create_client() -> Self {
        C0C1 {
            version: RTMP_VERSION,
            timestamp: current_timestamp(),
            zero: 0,
            random_data: generate_random_bytes(RANDOM_PAYLOAD_SIZE),
        }
    }

    /// Encode to bytes (1 + 1536)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(1 + HANDSHAKE_SIZE);
        buffer.write_u8(self.version)?;
        buffer.write_u32_be(self.timestamp)?;
        buffer.write_u32_be(self.zero)?;
        buffer.write_bytes(&self.random_data)?;
        Ok(buffer.to_vec())
    }
}

/// Server hello: S1 block, read after validating the S0 version byte
#[derive(Debug, Clone)]
pub struct S1 {
    pub timestamp: u32,
    pub zero: u32,
    pub random_data: Vec<u8>,
}

impl S1 {
    /// Parse an S1 block (1536 bytes)
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != HANDSHAKE_SIZE {
            return Err(Error::handshake(format!(
                "S1 block has {} bytes, expected {}",
                data.len(),
                HANDSHAKE_SIZE
            )));
        }
        let mut buffer = ByteBuffer::new(data.to_vec());
        let timestamp = buffer.read_u32_be()?;
        let zero = buffer.read_u32_be()?;
        let random_data = buffer.read_bytes(RANDOM_PAYLOAD_SIZE)?;
        Ok(S1 {
            timestamp,
            zero,
            random_data,
        })
    }
}

/// Client echo of S1, completing our half of the handshake
#[derive(Debug, Clone)]
pub struct C2 {
    pub timestamp: u32,
    pub timestamp2: u32,
    pub random_echo: Vec<u8>,
}

impl C2 {
    /// Create C2 echoing the server's S1
    pub fn create_from_s1(s1: &S1) -> Self {
        C2 {
            timestamp: s1.timestamp,
            timestamp2: current_timestamp(),
            random_echo: s1.random_data.clone(),
        }
    }

    /// Encode to bytes (1536)
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = ByteBuffer::with_capacity(HANDSHAKE_SIZE);
        buffer.write_u32_be(self.timestamp)?;
        buffer.write_u32_be(self.timestamp2)?;
        buffer.write_bytes(&self.random_echo)?;
        Ok(buffer.to_vec())
    }
}

/// Drive the full client handshake over the transport. Fails with a
/// handshake error on any short read, socket error or bad version byte;
/// there is no retry.
pub async fn perform_client_handshake<R, W>(reader: &mut R, writer: &mut W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    // C0 and C1 go out together, before any reply is awaited
    let c0c1 = C0C1::create_client();
    writer
        .write_all(&c0c1.encode()?)
        .await
        .map_err(|e| Error::handshake(format!("Failed to write C0+C1: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::handshake(format!("Failed to flush C0+C1: {}", e)))?;

    let mut s0 = [0u8; 1];
    reader
        .read_exact(&mut s0)
        .await
        .map_err(|e| Error::handshake(format!("Failed to read S0: {}", e)))?;
    if s0[0] != RTMP_VERSION {
        return Err(Error::handshake(format!(
            "Unsupported RTMP version from server: {}, expected {}",
            s0[0], RTMP_VERSION
        )));
    }

    let mut s1_buf = vec![0u8; HANDSHAKE_SIZE];
    reader
        .read_exact(&mut s1_buf)
        .await
        .map_err(|e| Error::handshake(format!("Failed to read S1: {}", e)))?;
    let s1 = S1::parse(&s1_buf)?;

    let c2 = C2::create_from_s1(&s1);
    writer
        .write_all(&c2.encode()?)
        .await
        .map_err(|e| Error::handshake(format!("Failed to write C2: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::handshake(format!("Failed to flush C2: {}", e)))?;

    // S2 is read to keep the stream aligned; its contents are not validated
    let mut s2_buf = vec![0u8; HANDSHAKE_SIZE];
    reader
        .read_exact(&mut s2_buf)
        .await
        .map_err(|e| Error::handshake(format!("Failed to read S2: {}", e)))?;

    log::debug!("Client handshake complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c0c1_shape() {
        let c0c1 = C0C1::create_client();
        assert_eq!(c0c1.version, RTMP_VERSION);
        assert_eq!(c0c1.zero, 0);
        assert_eq!(c0c1.random_data.len(), RANDOM_PAYLOAD_SIZE);

        let bytes = c0c1.encode().unwrap();
        assert_eq!(bytes.len(), 1 + HANDSHAKE_SIZE);
        assert_eq!(bytes[0], RTMP_VERSION);
    }

    #[test]
    fn test_s1_parse_and_c2_echo() {
        let mut s1_bytes = vec![0u8; HANDSHAKE_SIZE];
        s1_bytes[0..4].copy_from_slice(&42u32.to_be_bytes());
        for (i, byte) in s1_bytes.iter_mut().enumerate().skip(8) {
            *byte = (i % 251) as u8;
        }

        let s1 = S1::parse(&s1_bytes).unwrap();
        assert_eq!(s1.timestamp, 42);

        let c2 = C2::create_from_s1(&s1);
        assert_eq!(c2.timestamp, 42);
        assert_eq!(c2.random_echo, s1.random_data);

        let c2_bytes = c2.encode().unwrap();
        assert_eq!(c2_bytes.len(), HANDSHAKE_SIZE);
        assert_eq!(&c2_bytes[8..], &s1_bytes[8..]);
    }

    #[test]
    fn test_s1_wrong_size_is_error() {
        assert!(S1::parse(&[0u8; 100]).is_err());
    }

    #[tokio::test]
    async fn test_full_client_handshake() {
        let (client, server) = tokio::io::duplex(8192);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        let server_task = tokio::spawn(async move {
            let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
            server_read.read_exact(&mut c0c1).await.unwrap();
            assert_eq!(c0c1[0], RTMP_VERSION);

            // S0 + S1 + S2 (S2 echoes C1)
            server_write.write_all(&[RTMP_VERSION]).await.unwrap();
            let s1 = vec![7u8; HANDSHAKE_SIZE];
            server_write.write_all(&s1).await.unwrap();
            server_write.write_all(&c0c1[1..]).await.unwrap();
            server_write.flush().await.unwrap();

            let mut c2 = vec![0u8; HANDSHAKE_SIZE];
            server_read.read_exact(&mut c2).await.unwrap();
            // C2 echoes the S1 random payload
            assert_eq!(&c2[8..], &s1[8..]);
        });

        perform_client_handshake(&mut client_read, &mut client_write)
            .await
            .unwrap();
        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_server_version_is_error() {
        let (client, server) = tokio::io::duplex(8192);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        tokio::spawn(async move {
            let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
            server_read.read_exact(&mut c0c1).await.unwrap();
            server_write.write_all(&[6u8]).await.unwrap();
            server_write.flush().await.unwrap();
        });

        let result = perform_client_handshake(&mut client_read, &mut client_write).await;
        assert!(matches!(result, Err(Error::Handshake(_))));
    }

    #[tokio::test]
    async fn test_short_read_is_error() {
        let (client, server) = tokio::io::duplex(8192);
        let (mut client_read, mut client_write) = tokio::io::split(client);
        let (mut server_read, mut server_write) = tokio::io::split(server);

        tokio::spawn(async move {
            let mut c0c1 = vec![0u8; 1 + HANDSHAKE_SIZE];
            server_read.read_exact(&mut c0c1).await.unwrap();
            // Server hangs up after a truncated S1
            server_write.write_all(&[RTMP_VERSION]).await.unwrap();
            server_write.write_all(&[0u8; 100]).await.unwrap();
            server_write.flush().await.unwrap();
        });

        let result = perform_client_handshake(&mut client_read, &mut client_write).await;
        assert!(matches!(result, Err(Error::Handshake(_))));
    }
}
