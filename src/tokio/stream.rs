use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio::net::{TcpStream, UnixStream};

#[cfg(feature = "tls")]
use tokio_native_tls::TlsStream;

/// Any byte stream a connection can run over
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

pub enum Stream {
    Tcp(BufStream<TcpStream>),
    #[cfg(feature = "tls")]
    Tls(BufStream<TlsStream<TcpStream>>),
    Unix(BufStream<UnixStream>),
    Custom(BufStream<Box<dyn Transport>>),
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Tcp(_) => "Tcp",
            #[cfg(feature = "tls")]
            Self::Tls(_) => "Tls",
            Self::Unix(_) => "Unix",
            Self::Custom(_) => "Custom",
        };
        f.debug_tuple("Stream").field(&kind).finish()
    }
}

impl Stream {
    pub fn tcp(stream: TcpStream) -> Self {
        Self::Tcp(BufStream::new(stream))
    }

    pub fn unix(stream: UnixStream) -> Self {
        Self::Unix(BufStream::new(stream))
    }

    /// Wrap an already established transport, e.g. an in-memory pipe or a proxy tunnel
    pub fn custom<T: Transport + 'static>(stream: T) -> Self {
        Self::Custom(BufStream::new(Box::new(stream)))
    }

    /// Unix sockets never leave the host, so the password may be sent over them
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Unix(_))
    }

    #[cfg(feature = "tls")]
    pub async fn upgrade_to_tls(self, host: &str) -> std::io::Result<Self> {
        let tcp = match self {
            Self::Tcp(stream) => stream.into_inner(),
            Self::Tls(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "Already using TLS",
                ));
            }
            Self::Unix(_) | Self::Custom(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "TLS is only supported over TCP",
                ));
            }
        };

        let connector = native_tls::TlsConnector::new().map_err(std::io::Error::other)?;
        let connector = tokio_native_tls::TlsConnector::from(connector);
        let tls_stream = connector
            .connect(host, tcp)
            .await
            .map_err(std::io::Error::other)?;

        Ok(Self::Tls(BufStream::new(tls_stream)))
    }

    pub async fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.read_exact(buf).await.map(|_| ()),
            #[cfg(feature = "tls")]
            Self::Tls(stream) => stream.read_exact(buf).await.map(|_| ()),
            Self::Unix(stream) => stream.read_exact(buf).await.map(|_| ()),
            Self::Custom(stream) => stream.read_exact(buf).await.map(|_| ()),
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.write_all(buf).await,
            #[cfg(feature = "tls")]
            Self::Tls(stream) => stream.write_all(buf).await,
            Self::Unix(stream) => stream.write_all(buf).await,
            Self::Custom(stream) => stream.write_all(buf).await,
        }
    }

    pub async fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush().await,
            #[cfg(feature = "tls")]
            Self::Tls(stream) => stream.flush().await,
            Self::Unix(stream) => stream.flush().await,
            Self::Custom(stream) => stream.flush().await,
        }
    }

    pub async fn shutdown(&mut self) -> std::io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.shutdown().await,
            #[cfg(feature = "tls")]
            Self::Tls(stream) => stream.shutdown().await,
            Self::Unix(stream) => stream.shutdown().await,
            Self::Custom(stream) => stream.shutdown().await,
        }
    }
}
