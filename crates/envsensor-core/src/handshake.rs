//! Request → flag-poll → read protocol for one log page.
//!
//! The sensor exposes its log one page at a time:
//!
//! 1. write `(page, last_row)` to RequestPage,
//! 2. poll ResponseFlag until it reports ready (or failure),
//! 3. read ResponseData repeatedly; each read returns one row, newest first,
//!    and row 0 ends the page.
//!
//! [`PageRequestHandshake`] models this as an explicit state machine so each
//! transition can be driven and inspected independently of a real radio.
//! `Done` and `Failed` are terminal; a new page starts from a fresh
//! handshake in `Idle`.

use std::time::Duration;

use tracing::{debug, warn};

use envsensor_types::codec;
use envsensor_types::ring::ROWS_PER_PAGE;
use envsensor_types::uuid::{ERROR_STATUS, REQUEST_PAGE, RESPONSE_DATA, RESPONSE_FLAG};
use envsensor_types::{ErrorStatus, LogRow, RequestPage, ResponseFlag};

use crate::error::{Error, Result};
use crate::traits::Transport;

/// Polling and read bounds for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Flag reads before giving up on a page.
    pub poll_attempts: u32,
    /// Delay before each flag read.
    pub poll_interval: Duration,
    /// Reads tolerated beyond one per row before the page is declared
    /// unterminated.
    pub spare_reads: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 5,
            poll_interval: Duration::from_millis(100),
            spare_reads: 3,
        }
    }
}

/// Rows of one page, ascending by row index.
#[derive(Debug, Clone, PartialEq)]
pub struct PageData {
    pub page: u16,
    /// Device-clock start time of the page, from the ready flag.
    pub start_time: u32,
    pub rows: Vec<LogRow>,
}

impl PageData {
    /// Highest row index present.
    pub fn last_row(&self) -> Option<u8> {
        self.rows.last().map(|r| r.row)
    }
}

#[derive(Debug)]
pub enum HandshakeState {
    Idle,
    Requested,
    AwaitingFlag {
        attempt: u32,
    },
    Reading {
        start_time: u32,
        /// Rows so far, in arrival (descending) order.
        rows: Vec<LogRow>,
        reads: usize,
    },
    Done(PageData),
    Failed(Error),
}

impl HandshakeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, HandshakeState::Done(_) | HandshakeState::Failed(_))
    }

    fn name(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::Requested => "requested",
            HandshakeState::AwaitingFlag { .. } => "awaiting-flag",
            HandshakeState::Reading { .. } => "reading",
            HandshakeState::Done(_) => "done",
            HandshakeState::Failed(_) => "failed",
        }
    }
}

/// One page request against a connected channel.
pub struct PageRequestHandshake<'a, T: Transport + ?Sized> {
    transport: &'a T,
    request: RequestPage,
    interval: u16,
    config: &'a HandshakeConfig,
    state: HandshakeState,
}

impl<'a, T: Transport + ?Sized> PageRequestHandshake<'a, T> {
    /// `interval` is the device's measurement interval, used to stamp rows.
    pub fn new(
        transport: &'a T,
        request: RequestPage,
        interval: u16,
        config: &'a HandshakeConfig,
    ) -> Self {
        Self {
            transport,
            request,
            interval,
            config,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> &HandshakeState {
        &self.state
    }

    fn max_reads(&self) -> usize {
        usize::from(ROWS_PER_PAGE) + self.config.spare_reads
    }

    /// Perform exactly one transition. Does nothing once terminal.
    pub async fn step(&mut self) {
        let state = std::mem::replace(&mut self.state, HandshakeState::Idle);
        let next = match state {
            HandshakeState::Idle => self.send_request().await,
            HandshakeState::Requested => HandshakeState::AwaitingFlag { attempt: 0 },
            HandshakeState::AwaitingFlag { attempt } => self.poll_flag(attempt).await,
            HandshakeState::Reading {
                start_time,
                rows,
                reads,
            } => self.read_row(start_time, rows, reads).await,
            terminal @ (HandshakeState::Done(_) | HandshakeState::Failed(_)) => terminal,
        };
        debug!(page = self.request.page, state = next.name(), "handshake step");
        self.state = next;
    }

    /// Drive the handshake to a terminal state.
    pub async fn run(mut self) -> Result<PageData> {
        loop {
            match std::mem::replace(&mut self.state, HandshakeState::Idle) {
                HandshakeState::Done(page) => return Ok(page),
                HandshakeState::Failed(err) => return Err(err),
                pending => {
                    self.state = pending;
                    self.step().await;
                }
            }
        }
    }

    async fn send_request(&self) -> HandshakeState {
        let payload = self.request.to_bytes();
        debug!(
            page = self.request.page,
            last_row = self.request.last_row,
            ?payload,
            "writing RequestPage"
        );
        match self.transport.write(REQUEST_PAGE, &payload).await {
            Ok(()) => HandshakeState::Requested,
            Err(e) => HandshakeState::Failed(e),
        }
    }

    async fn poll_flag(&self, attempt: u32) -> HandshakeState {
        let page = self.request.page;
        if attempt >= self.config.poll_attempts {
            warn!(page, attempts = attempt, "response flag never became ready");
            return HandshakeState::Failed(Error::PollExhausted {
                page,
                attempts: attempt,
            });
        }

        tokio::time::sleep(self.config.poll_interval).await;
        let bytes = match self.transport.read(RESPONSE_FLAG).await {
            Ok(bytes) => bytes,
            Err(e) => return HandshakeState::Failed(e),
        };
        debug!(page, ?bytes, "read ResponseFlag");

        match codec::decode_flag(&bytes) {
            Ok(ResponseFlag::NotReady) => HandshakeState::AwaitingFlag {
                attempt: attempt + 1,
            },
            Ok(ResponseFlag::Ready { start_time }) => {
                debug!(page, start_time, "page ready");
                HandshakeState::Reading {
                    start_time,
                    rows: Vec::with_capacity(usize::from(ROWS_PER_PAGE)),
                    reads: 0,
                }
            }
            Ok(ResponseFlag::Failed(flag)) => {
                let status = self.read_error_status().await;
                warn!(page, flag, %status, "device rejected page request");
                HandshakeState::Failed(Error::DeviceError { page, flag, status })
            }
            Err(e) => HandshakeState::Failed(e.into()),
        }
    }

    async fn read_error_status(&self) -> ErrorStatus {
        let decoded = match self.transport.read(ERROR_STATUS).await {
            Ok(bytes) => codec::decode_error(&bytes).map_err(Error::from),
            Err(e) => Err(e),
        };
        decoded.unwrap_or_else(|e| {
            warn!("could not read ErrorStatus after failed request: {}", e);
            ErrorStatus::default()
        })
    }

    async fn read_row(
        &self,
        start_time: u32,
        mut rows: Vec<LogRow>,
        reads: usize,
    ) -> HandshakeState {
        let page = self.request.page;
        if reads >= self.max_reads() {
            return HandshakeState::Failed(Error::protocol(
                page,
                format!("no terminating row 0 within {reads} reads"),
            ));
        }

        let bytes = match self.transport.read(RESPONSE_DATA).await {
            Ok(bytes) => bytes,
            Err(e) => return HandshakeState::Failed(e),
        };
        debug!(page, ?bytes, "read ResponseData");

        let data = match codec::decode_response(&bytes) {
            Ok(data) => data,
            Err(e) => {
                warn!(page, "discarding page with malformed row: {}", e);
                return HandshakeState::Failed(e.into());
            }
        };

        if data.row > self.request.last_row {
            return HandshakeState::Failed(Error::protocol(
                page,
                format!("row {} beyond requested row {}", data.row, self.request.last_row),
            ));
        }
        match rows.last() {
            Some(prev) if prev.row == data.row => {
                debug!(page, row = data.row, "repeated row ignored");
            }
            Some(prev) if data.row > prev.row => {
                return HandshakeState::Failed(Error::protocol(
                    page,
                    format!("row {} after row {}", data.row, prev.row),
                ));
            }
            _ => match LogRow::from_response(page, start_time, self.interval, &data) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(page, row = data.row, "discarding page with unusable sample time: {}", e);
                    return HandshakeState::Failed(e.into());
                }
            },
        }

        if data.row == 0 {
            rows.reverse();
            return HandshakeState::Done(PageData {
                page,
                start_time,
                rows,
            });
        }
        HandshakeState::Reading {
            start_time,
            rows,
            reads: reads + 1,
        }
    }
}

/// Fetch one page: build the request, then run a handshake.
#[tracing::instrument(
    level = "debug",
    skip(transport, config),
    fields(device = %transport.address())
)]
pub async fn fetch_page<T: Transport + ?Sized>(
    transport: &T,
    page: u16,
    last_row: u8,
    interval: u16,
    config: &HandshakeConfig,
) -> Result<PageData> {
    let request = RequestPage::new(page, last_row)?;
    PageRequestHandshake::new(transport, request, interval, config)
        .run()
        .await
}
