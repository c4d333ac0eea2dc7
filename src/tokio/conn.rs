use tokio::net::{TcpStream, UnixStream};
use tracing::{debug, instrument, warn};
use zerocopy::{FromZeros, IntoBytes};

use crate::buffer::{BufferSet, PACKET_HEADER_LEN};
use crate::constant::{CapabilityFlags, MAX_PACKET_PAYLOAD, ServerStatusFlags};
use crate::error::{Error, Result};
use crate::handler::{RowCollector, StatementCollector};
use crate::opts::Opts;
use crate::prepared::Statement;
use crate::protocol::command::Action;
use crate::protocol::command::prepared::{
    Exec, Prepare, write_close_statement, write_execute, write_prepare,
};
use crate::protocol::command::query::Query;
use crate::protocol::command::text::write_query;
use crate::protocol::command::utility::{
    write_init_db, write_ping, write_quit, write_reset_connection,
};
use crate::protocol::connection::{Handshake, HandshakeConfig, HandshakeResult};
use crate::protocol::packet::{PacketHeader, SequenceId};
use crate::protocol::response::{ErrPayloadBytes, OkPayload, OkPayloadBytes};
use crate::protocol::r#trait::params::Params;
use crate::row::Row;

use super::stream::Stream;

/// Whether the connection can take the next command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnState {
    Idle,
    /// A command is in flight. Seen at the start of a command only if the previous
    /// command's future was dropped before it finished.
    Busy,
    Broken,
}

/// An authenticated connection
///
/// Commands take `&mut self`, so they never overlap. A command that is cancelled after its
/// request was sent leaves the connection unusable: the next command fails with
/// `Error::ConnectionBroken` instead of reading the stale response.
#[derive(Debug)]
pub struct Conn {
    stream: Stream,
    buffer_set: BufferSet,
    sequence: SequenceId,
    state: ConnState,
    server_version: String,
    connection_id: u32,
    capability_flags: CapabilityFlags,
    status_flags: ServerStatusFlags,
    affected_rows: u64,
    last_insert_id: u64,
    max_allowed_packet: usize,
}

impl Conn {
    /// Create a new MySQL connection from connection options (async)
    pub async fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;

        let stream = if let Some(socket_path) = &opts.socket {
            let stream = UnixStream::connect(socket_path).await?;
            Stream::unix(stream)
        } else {
            let stream = TcpStream::connect((opts.host.as_str(), opts.port)).await?;
            stream.set_nodelay(opts.tcp_nodelay)?;
            Stream::tcp(stream)
        };

        Self::new_with_stream(stream, &opts).await
    }

    /// Create a new MySQL connection with an existing stream (async)
    pub async fn new_with_stream(stream: Stream, opts: &Opts) -> Result<Self> {
        if opts.tls && !cfg!(feature = "tls") {
            return Err(Error::BadConfigError(
                "TLS requested but the tls feature is not enabled".to_string(),
            ));
        }

        let mut stream = stream;
        let mut buffer_set = BufferSet::new();
        let mut sequence = SequenceId::new();
        let max_allowed_packet = opts.max_allowed_packet;

        let mut handshake = Handshake::new(HandshakeConfig {
            username: opts.user.clone(),
            password: opts.password.clone(),
            database: opts.db.clone(),
            capabilities: opts.capabilities,
            tls: opts.tls,
            secure_transport: stream.is_unix(),
            allow_public_key_retrieval: opts.allow_public_key_retrieval,
            server_public_key: opts.server_public_key.clone(),
            max_packet_size: u32::try_from(max_allowed_packet).unwrap_or(u32::MAX),
        });

        let mut server = None;
        let capability_flags = loop {
            read_payload(
                &mut stream,
                &mut sequence,
                &mut buffer_set.read_buffer,
                max_allowed_packet,
            )
            .await?;

            match handshake.drive(&buffer_set.read_buffer)? {
                HandshakeResult::InitialHandshake { response, info } => {
                    server = Some(info);
                    buffer_set.new_write_buffer().extend_from_slice(&response);
                    write_payload(&mut stream, &mut buffer_set, &mut sequence).await?;
                }
                #[cfg(feature = "tls")]
                HandshakeResult::SslRequest { request, info } => {
                    server = Some(info);
                    buffer_set.new_write_buffer().extend_from_slice(&request);
                    write_payload(&mut stream, &mut buffer_set, &mut sequence).await?;

                    stream = stream.upgrade_to_tls(&opts.host).await?;
                    debug!("upgraded to TLS");

                    let HandshakeResult::Write(response) = handshake.drive_after_tls()? else {
                        return Err(Error::InvalidPacket);
                    };
                    buffer_set.new_write_buffer().extend_from_slice(&response);
                    write_payload(&mut stream, &mut buffer_set, &mut sequence).await?;
                }
                #[cfg(not(feature = "tls"))]
                HandshakeResult::SslRequest { .. } => {
                    return Err(Error::BadConfigError(
                        "TLS requested but the tls feature is not enabled".to_string(),
                    ));
                }
                HandshakeResult::Write(data) => {
                    buffer_set.new_write_buffer().extend_from_slice(&data);
                    write_payload(&mut stream, &mut buffer_set, &mut sequence).await?;
                }
                HandshakeResult::Read => {}
                HandshakeResult::Connected { capability_flags } => break capability_flags,
            }
        };

        let Some(server) = server else {
            return Err(Error::InvalidPacket);
        };
        debug!(
            connection_id = server.connection_id,
            server_version = %server.server_version,
            "connected"
        );

        let mut conn = Self {
            stream,
            buffer_set,
            sequence,
            state: ConnState::Idle,
            server_version: server.server_version,
            connection_id: server.connection_id,
            capability_flags,
            status_flags: server.status_flags,
            affected_rows: 0,
            last_insert_id: 0,
            max_allowed_packet,
        };

        if let Some(init_command) = &opts.init_command {
            conn.simple_query(init_command).await?;
        }

        Ok(conn)
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Get the connection ID assigned by the server
    pub fn connection_id(&self) -> u32 {
        self.connection_id
    }

    /// Get the negotiated capability flags
    pub fn capability_flags(&self) -> CapabilityFlags {
        self.capability_flags
    }

    /// Server status flags of the last OK/EOF packet
    pub fn status_flags(&self) -> ServerStatusFlags {
        self.status_flags
    }

    /// Rows affected by the last command that returned an OK packet
    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn last_insert_id(&self) -> u64 {
        self.last_insert_id
    }

    /// Whether the connection can no longer be used
    pub fn is_broken(&self) -> bool {
        self.state != ConnState::Idle
    }

    fn deprecate_eof(&self) -> bool {
        self.capability_flags
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF)
    }

    /// Mark the connection busy and start a new command
    fn begin(&mut self) -> Result<()> {
        match self.state {
            ConnState::Idle => {
                self.state = ConnState::Busy;
                self.sequence.reset();
                Ok(())
            }
            ConnState::Busy => {
                warn!("previous command did not finish, marking connection broken");
                self.state = ConnState::Broken;
                Err(Error::ConnectionBroken(
                    "a previous command was cancelled before it finished",
                ))
            }
            ConnState::Broken => Err(Error::ConnectionBroken("connection is broken")),
        }
    }

    /// Return to idle, or to broken if the command failed fatally
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        match &result {
            Err(e) if e.is_fatal() => {
                warn!(error = %e, "marking connection broken");
                self.state = ConnState::Broken;
            }
            _ => self.state = ConnState::Idle,
        }
        result
    }

    fn record(&mut self, collector: &RowCollector) {
        self.affected_rows = collector.affected_rows();
        self.last_insert_id = collector.last_insert_id();
        self.status_flags = collector.status_flags();
    }

    async fn send(&mut self) -> Result<()> {
        write_payload(&mut self.stream, &mut self.buffer_set, &mut self.sequence).await
    }

    async fn read(&mut self) -> Result<()> {
        read_payload(
            &mut self.stream,
            &mut self.sequence,
            &mut self.buffer_set.read_buffer,
            self.max_allowed_packet,
        )
        .await
    }

    /// Execute a text protocol SQL query and collect every row
    ///
    /// Multiple result sets (multi-statements, stored procedures) are concatenated.
    #[instrument(skip_all)]
    pub async fn simple_query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.begin()?;
        let result = self.run_simple_query(sql).await;
        self.finish(result)
    }

    async fn run_simple_query(&mut self, sql: &str) -> Result<Vec<Row>> {
        write_query(self.buffer_set.new_write_buffer(), sql);
        self.send().await?;

        let mut collector = RowCollector::new();
        let mut query = Query::new(&mut collector, self.deprecate_eof());
        while let Action::NeedPacket(buffer) = query.step(&mut self.buffer_set)? {
            read_payload(
                &mut self.stream,
                &mut self.sequence,
                buffer,
                self.max_allowed_packet,
            )
            .await?;
        }
        self.record(&collector);
        Ok(collector.into_rows())
    }

    /// Prepare a statement
    #[instrument(skip_all)]
    pub async fn prepare(&mut self, sql: &str) -> Result<Statement> {
        self.begin()?;
        let result = self.run_prepare(sql).await;
        self.finish(result)
    }

    async fn run_prepare(&mut self, sql: &str) -> Result<Statement> {
        write_prepare(self.buffer_set.new_write_buffer(), sql);
        self.send().await?;

        let mut collector = StatementCollector::new();
        let mut prepare = Prepare::new(&mut collector, self.deprecate_eof());
        while let Action::NeedPacket(buffer) = prepare.step(&mut self.buffer_set)? {
            read_payload(
                &mut self.stream,
                &mut self.sequence,
                buffer,
                self.max_allowed_packet,
            )
            .await?;
        }
        let statement = collector.into_statement();
        debug!(
            statement_id = statement.id(),
            num_params = statement.num_params(),
            "prepared statement"
        );
        Ok(statement)
    }

    /// Execute a prepared statement and collect every row
    ///
    /// Fails with `BadUsageError`, before anything is sent, when the number of parameters
    /// does not match the statement.
    #[instrument(skip_all, fields(statement_id = statement.id()))]
    pub async fn execute<P: Params>(&mut self, statement: &Statement, params: P) -> Result<Vec<Row>> {
        self.begin()?;
        let result = self.run_execute(statement, &params).await;
        self.finish(result)
    }

    async fn run_execute<P: Params + ?Sized>(
        &mut self,
        statement: &Statement,
        params: &P,
    ) -> Result<Vec<Row>> {
        write_execute(
            self.buffer_set.new_write_buffer(),
            statement.id(),
            statement.num_params(),
            params,
        )?;
        self.send().await?;

        let mut collector = RowCollector::new();
        let mut exec = Exec::new(&mut collector, self.deprecate_eof());
        while let Action::NeedPacket(buffer) = exec.step(&mut self.buffer_set)? {
            read_payload(
                &mut self.stream,
                &mut self.sequence,
                buffer,
                self.max_allowed_packet,
            )
            .await?;
        }
        self.record(&collector);
        Ok(collector.into_rows())
    }

    /// Release a prepared statement. The server sends no response.
    #[instrument(skip_all, fields(statement_id = statement.id()))]
    pub async fn close_statement(&mut self, statement: Statement) -> Result<()> {
        self.begin()?;
        write_close_statement(self.buffer_set.new_write_buffer(), statement.id());
        let result = self.send().await;
        self.finish(result)
    }

    /// Prepare, execute and close a statement
    ///
    /// The statement is closed even when the execution fails with a server error.
    pub async fn query<P: Params>(&mut self, sql: &str, params: P) -> Result<Vec<Row>> {
        let statement = self.prepare(sql).await?;
        let result = self.execute(&statement, params).await;
        if self.is_broken() {
            return result;
        }
        let closed = self.close_statement(statement).await;
        let rows = result?;
        closed?;
        Ok(rows)
    }

    /// Prepare a statement, run `f` with it, then close it
    ///
    /// ```rs
    /// let total = conn
    ///     .with_statement("SELECT ? + ?", async |conn, stmt| {
    ///         let rows = conn.execute(stmt, (1, 2)).await?;
    ///         Ok(rows[0].get(0).and_then(|v| v.as_i64()))
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_statement<F, R>(&mut self, sql: &str, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Conn, &Statement) -> Result<R>,
    {
        let statement = self.prepare(sql).await?;
        let result = f(self, &statement).await;
        if self.is_broken() {
            return result;
        }
        let closed = self.close_statement(statement).await;
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Check that the server is alive (COM_PING)
    #[instrument(skip_all)]
    pub async fn ping(&mut self) -> Result<()> {
        self.begin()?;
        write_ping(self.buffer_set.new_write_buffer());
        let result = self.run_ok_command().await;
        self.finish(result)
    }

    /// Reset the session state (COM_RESET_CONNECTION)
    ///
    /// Prepared statements of this connection are released by the server.
    #[instrument(skip_all)]
    pub async fn reset(&mut self) -> Result<()> {
        self.begin()?;
        write_reset_connection(self.buffer_set.new_write_buffer());
        let result = self.run_ok_command().await;
        self.finish(result)
    }

    /// Change the default database (COM_INIT_DB)
    #[instrument(skip_all)]
    pub async fn select_db(&mut self, db: &str) -> Result<()> {
        self.begin()?;
        write_init_db(self.buffer_set.new_write_buffer(), db);
        let result = self.run_ok_command().await;
        self.finish(result)
    }

    /// Send the command in the write buffer and read an OK or ERR response
    async fn run_ok_command(&mut self) -> Result<()> {
        self.send().await?;
        self.read().await?;
        let payload = &self.buffer_set.read_buffer[..];
        match payload.first() {
            Some(0x00) => {
                let ok = OkPayload::try_from(OkPayloadBytes(payload))?;
                self.affected_rows = ok.affected_rows;
                self.last_insert_id = ok.last_insert_id;
                self.status_flags = ok.status_flags;
                Ok(())
            }
            Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
            _ => Err(Error::InvalidPacket),
        }
    }

    /// Send COM_QUIT and shut the stream down
    ///
    /// A broken connection is shut down without COM_QUIT.
    pub async fn close(mut self) -> Result<()> {
        if self.state == ConnState::Idle {
            self.sequence.reset();
            write_quit(self.buffer_set.new_write_buffer());
            self.send().await?;
        }
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Read a complete MySQL payload, concatenating packets if they span multiple 16MB chunks
///
/// Every packet must carry the next sequence id.
#[instrument(skip_all)]
pub(crate) async fn read_payload(
    stream: &mut Stream,
    sequence: &mut SequenceId,
    buffer: &mut Vec<u8>,
    max_allowed_packet: usize,
) -> Result<()> {
    buffer.clear();
    let mut header = PacketHeader::new_zeroed();
    loop {
        stream.read_exact(header.as_mut_bytes()).await?;
        let length = header.length();
        sequence.check_incoming(header.sequence_id)?;

        let start = buffer.len();
        if start + length > max_allowed_packet {
            return Err(Error::PacketTooLarge {
                length: start + length,
                max: max_allowed_packet,
            });
        }
        buffer.resize(start + length, 0);
        stream.read_exact(&mut buffer[start..]).await?;

        if length < MAX_PACKET_PAYLOAD {
            return Ok(());
        }
    }
}

/// Write the payload in the write buffer, splitting it into 16MB packets if necessary
#[instrument(skip_all)]
pub(crate) async fn write_payload(
    stream: &mut Stream,
    buffer_set: &mut BufferSet,
    sequence: &mut SequenceId,
) -> Result<()> {
    let mut offset = 0;
    loop {
        let packet = buffer_set.frame_packet(offset, sequence);
        stream.write_all(packet).await?;
        if packet.len() < PACKET_HEADER_LEN + MAX_PACKET_PAYLOAD {
            break;
        }
        offset += MAX_PACKET_PAYLOAD;
    }
    stream.flush().await?;
    Ok(())
}
