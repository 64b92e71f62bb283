use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

use tracing::debug;

use super::{GatewayStream, read_cr_line};
use crate::errors::TransportError;

/// Implémentation de [`GatewayStream`] sur un [`TcpStream`] bufferisé.
///
/// Le flux est fermé quand la valeur est détruite.
#[derive(Debug, Default)]
pub struct TcpGatewayStream {
    stream: Option<BufReader<TcpStream>>,
    peer: Option<SocketAddrV4>,
    /// Début de ligne lu avant un dépassement de délai
    partial: Vec<u8>,
}

impl TcpGatewayStream {
    pub fn new() -> Self {
        Self::default()
    }

    fn reader(&mut self) -> Result<&mut BufReader<TcpStream>, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl GatewayStream for TcpGatewayStream {
    fn connect(&mut self, addr: SocketAddrV4, timeout: Duration) -> Result<(), TransportError> {
        self.close();

        let stream = TcpStream::connect_timeout(&SocketAddr::V4(addr), timeout)?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;

        debug!("TCP connected to {}", addr);
        self.stream = Some(BufReader::new(stream));
        self.peer = Some(addr);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn peer(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let stream = self.reader()?.get_mut();
        stream.write_all(data)?;
        stream.flush()?;
        Ok(())
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let reader = self.reader()?;
        reader
            .get_ref()
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        if reader.fill_buf()?.is_empty() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn read_line(&mut self, idle: Duration) -> Result<Option<String>, TransportError> {
        let Some(reader) = self.stream.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        reader
            .get_ref()
            .set_read_timeout(Some(idle.max(Duration::from_millis(1))))?;
        Ok(read_cr_line(reader, &mut self.partial)?)
    }

    fn close(&mut self) {
        if let Some(reader) = self.stream.take() {
            let _ = reader.get_ref().shutdown(Shutdown::Both);
            debug!("TCP connection to {:?} closed", self.peer);
        }
        self.peer = None;
        self.partial.clear();
    }
}

impl Drop for TcpGatewayStream {
    fn drop(&mut self) {
        self.close();
    }
}
