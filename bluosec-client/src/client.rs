//! High-level requester API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bluosec_protocol::{
    lrc, Address, Code, DecodedFrame, Function, ProtocolError, RawRequest, Request, ResponseFrame,
    DECODED_FRAME_LEN,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Display-side client for one controller link.
pub struct Client<S = TcpStream> {
    conn: Connection<S>,
}

impl Client<TcpStream> {
    /// Connects to a link service.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ClientError> {
        Ok(Self {
            conn: Connection::connect(config).await?,
        })
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Wraps an existing connection.
    pub fn new(conn: Connection<S>) -> Self {
        Self { conn }
    }

    /// Returns the underlying connection.
    pub fn connection(&mut self) -> &mut Connection<S> {
        &mut self.conn
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    /// Sends a request and checks the response is its answer.
    async fn request(&mut self, request: Request) -> Result<ResponseFrame, ClientError> {
        let response = self.conn.request(&request.encode()).await?;
        check_response(request.address, response)
    }

    // =========================================================================
    // Telemetry
    // =========================================================================

    /// Requests basic telemetry.
    pub async fn basic_info(&mut self) -> Result<ResponseFrame, ClientError> {
        self.request(Request::read(Address::DynamicData, Function::BasicInfos))
            .await
    }

    /// Requests detailed telemetry.
    pub async fn detail_info(&mut self) -> Result<ResponseFrame, ClientError> {
        self.request(Request::read(Address::DynamicData, Function::DetailInfos))
            .await
    }

    /// Requests hall sensor telemetry.
    pub async fn hall_info(&mut self) -> Result<ResponseFrame, ClientError> {
        self.request(Request::read(Address::DynamicData, Function::HallInfos))
            .await
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Requests the configuration snapshot.
    pub async fn config_info(&mut self) -> Result<ResponseFrame, ClientError> {
        self.request(Request::read(Address::StaticData, Function::ConfigInfos))
            .await
    }

    /// Writes one configuration field.
    ///
    /// `value` travels as high and low byte; single-byte fields ignore the
    /// high byte. With `persist` the write goes to the EEPROM address.
    pub async fn write_config(
        &mut self,
        code: Code,
        value: u16,
        persist: bool,
    ) -> Result<ResponseFrame, ClientError> {
        self.request(Request::write(code, value, persist)).await
    }

    // =========================================================================
    // Raw access
    // =========================================================================

    /// Sends a request built from raw decoded bytes.
    ///
    /// Six bytes are signed with their LRC; seven are sent as given, bad
    /// checksum included. The response is returned unchecked.
    pub async fn raw(&mut self, bytes: &[u8]) -> Result<ResponseFrame, ClientError> {
        let raw = raw_request(bytes)?;
        self.conn.request(&raw).await
    }

    /// Closes the link.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.conn.close().await
    }
}

/// Builds a raw request from six unsigned or seven signed bytes.
pub fn raw_request(bytes: &[u8]) -> Result<RawRequest, ClientError> {
    let mut frame = [0u8; DECODED_FRAME_LEN];
    match bytes.len() {
        n if n == DECODED_FRAME_LEN - 1 => {
            frame[..n].copy_from_slice(bytes);
            frame[n] = lrc(bytes);
        }
        DECODED_FRAME_LEN => frame.copy_from_slice(bytes),
        n if n < DECODED_FRAME_LEN => {
            return Err(ProtocolError::FrameTooShort {
                size: n,
                min: DECODED_FRAME_LEN - 1,
            }
            .into())
        }
        n => {
            return Err(ProtocolError::FrameTooLarge {
                size: n,
                max: DECODED_FRAME_LEN,
            }
            .into())
        }
    }
    Ok(DecodedFrame::from_bytes(frame).encode())
}

/// Rejects error echoes, error pairs and answers for another address.
fn check_response(address: u8, response: ResponseFrame) -> Result<ResponseFrame, ClientError> {
    if response.is_error_echo() {
        return Err(ClientError::ChecksumRejected {
            calculated: response.lrc_check().unwrap_or_default(),
        });
    }
    if response.address != address {
        return Err(ClientError::UnexpectedResponse {
            expected: address,
            actual: response.address,
        });
    }
    if response.has_error_pair() {
        return Err(ClientError::Rejected {
            address: response.address,
            function: response.function,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluosec_protocol::{PayloadPair, Response};
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio_test::io::Builder;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new(SocketAddr::from(([127, 0, 0, 1], 7402)))
            .with_request_timeout(Duration::from_millis(200))
    }

    fn frame(address: u8, function: u8, pairs: &[PayloadPair]) -> Vec<u8> {
        let mut response = Response::new(address, function);
        response.extend(pairs).unwrap();
        response.encode().to_vec()
    }

    #[tokio::test]
    async fn test_write_config_ack() {
        let request = Request::write(Code::MaxBatCurrent, 300, true);
        let ack = frame(
            Address::Eeprom.as_u8(),
            0,
            &[
                PayloadPair::new(Code::MaxBatCurrentHighByte, 0x01),
                PayloadPair::new(Code::MaxBatCurrent, 0x2C),
                PayloadPair::new(Code::LrcCheck, request.to_decoded().checksum()),
            ],
        );
        let mock = Builder::new()
            .write(request.encode().as_bytes())
            .read(&ack)
            .build();

        let mut client = Client::new(Connection::new(mock, &config()));
        let response = client
            .write_config(Code::MaxBatCurrent, 300, true)
            .await
            .unwrap();
        assert_eq!(
            response.wide_value(Code::MaxBatCurrentHighByte, Code::MaxBatCurrent),
            Some(300)
        );
    }

    #[tokio::test]
    async fn test_error_pair_rejected() {
        let request = Request::read(Address::StaticData, Function::ConfigInfos);
        let answer = frame(
            Address::StaticData.as_u8(),
            Function::ConfigInfos.as_u8(),
            &[PayloadPair::error(), PayloadPair::new(Code::LrcCheck, 0)],
        );
        let mock = Builder::new()
            .write(request.encode().as_bytes())
            .read(&answer)
            .build();

        let mut client = Client::new(Connection::new(mock, &config()));
        let err = client.config_info().await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_error_echo_and_raw() {
        let bytes = [0x10, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let request = raw_request(&bytes).unwrap();
        let mut echo = Response::new(Address::Error.as_u8(), 0x01);
        for (i, &byte) in bytes.iter().enumerate() {
            echo.push(PayloadPair::raw(Code::error_echo(i as u8), byte))
                .unwrap();
        }
        echo.push(PayloadPair::new(Code::LrcCheck, lrc(&bytes[..6])))
            .unwrap();
        let echo = echo.encode().to_vec();

        let basic = Request::read(Address::DynamicData, Function::BasicInfos);
        let mock = Builder::new()
            .write(request.as_bytes())
            .read(&echo)
            .write(basic.encode().as_bytes())
            .read(&echo)
            .build();
        let mut client = Client::new(Connection::new(mock, &config()));

        let response = client.raw(&bytes).await.unwrap();
        assert!(response.is_error_echo());
        assert_eq!(response.lrc_check(), Some(lrc(&bytes[..6])));

        let err = client.basic_info().await;
        assert!(matches!(
            err,
            Err(ClientError::ChecksumRejected { calculated }) if calculated == lrc(&bytes[..6])
        ));
    }

    #[test]
    fn test_raw_request_signing() {
        let signed = raw_request(&[0x10, 0x02, 0, 0, 0, 0]).unwrap();
        let expected = Request::read(Address::DynamicData, Function::DetailInfos).encode();
        assert_eq!(signed, expected);

        assert!(raw_request(&[0x10]).is_err());
        assert!(raw_request(&[0; 8]).is_err());
    }

    #[test]
    fn test_check_response_address() {
        let response = ResponseFrame {
            address: Address::StaticData.as_u8(),
            function: 0x01,
            pairs: vec![],
            checksum: 0,
        };
        let err = check_response(Address::DynamicData.as_u8(), response).unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));
    }
}
