use super::{
    builtin::{
        BAUD_RATE, LOCAL_STATION_ADDRESS, MESSAGE_CHANNEL_CAPACITY, PACKET_CHANNEL_CAPACITY,
        PEER_PORT_SUFFIX, PEER_STATION_ADDRESS, READ_CHUNK_BYTES_LEN, READ_EOF_INTERVAL,
        READ_ERROR_INTERVAL, READ_TIMEOUT, RECV_BUFFER_LIMIT, REOPEN_DELAY, RESERVED_CONTROL,
        SEND_MAX_ATTEMPTS, SEND_RETRY_INTERVAL,
    },
    event::{TerminalEvent, TerminalSink},
};
use crate::{
    csma::{CsmaCd, CsmaEvent, SharedRng},
    cyclic::FcsCheck,
    link::{self, builtin::FLAG_BYTE, Packet},
};
use anyhow::Result;
use std::{
    io,
    sync::{Arc, Mutex},
};
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, watch},
    time,
};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, StopBits};

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("serial port {0} does not exist")]
    PortNotFound(String),
    #[error("permission denied for port {0}")]
    PermissionDenied(String),
    #[error("port is not open")]
    PortNotOpen,
    #[error("maximum retry attempts ({0}) exceeded")]
    RetryLimitExceeded(usize),
}

#[derive(Debug, Clone)]
pub struct SerialTerminalConfig {
    pub port_name: String,
    pub data_bits: DataBits,
    /// Demonstration bit corruption on the transmit path.
    pub corruption_enabled: bool,
}

impl SerialTerminalConfig {
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            data_bits: DataBits::Eight,
            corruption_enabled: true,
        }
    }
}

type SharedSink = Arc<Mutex<Box<dyn TerminalSink>>>;

/// One endpoint of the link. Owns the serial pipe, the CSMA/CD controller and
/// the reader and dispatcher tasks that live for as long as the port is open.
pub struct SerialTerminal {
    config: SerialTerminalConfig,
    csma: CsmaCd,
    rng: SharedRng,
    sink: SharedSink,
    writer: Option<tokio::io::WriteHalf<tokio_serial::SerialStream>>,
    stop_tx: Option<watch::Sender<bool>>,
    message_tx: Option<mpsc::Sender<String>>,
    packet_tx: Option<mpsc::Sender<String>>,
}

impl SerialTerminal {
    /// `rng` is the process-wide engine; the terminal hands the same handle
    /// to its CSMA/CD controller so the medium emulation and the corruption
    /// injector draw from one stream.
    pub fn new(
        config: SerialTerminalConfig,
        rng: SharedRng,
        sink: impl TerminalSink + 'static,
    ) -> Self {
        let sink: Box<dyn TerminalSink> = Box::new(sink);
        Self {
            config,
            csma: CsmaCd::new(rng.clone()),
            rng,
            sink: Arc::new(Mutex::new(sink)),
            writer: None,
            stop_tx: None,
            message_tx: None,
            packet_tx: None,
        }
    }

    pub fn config(&self) -> &SerialTerminalConfig {
        &self.config
    }

    pub fn csma(&self) -> &CsmaCd {
        &self.csma
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Acquires the byte pipe and spawns the reader and dispatcher tasks.
    /// Opening an already open terminal is a no-op success.
    pub async fn open(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }

        let port = tokio_serial::new(self.config.port_name.as_str(), BAUD_RATE)
            .data_bits(self.config.data_bits)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(READ_TIMEOUT)
            .open_native_async()
            .map_err(|err| classify_open_error(&self.config.port_name, err))?;
        let (reader, writer) = tokio::io::split(port);

        let (stop_tx, stop_rx) = watch::channel(false);
        let (message_tx, message_rx) = mpsc::channel(MESSAGE_CHANNEL_CAPACITY);
        let (packet_tx, packet_rx) = mpsc::channel(PACKET_CHANNEL_CAPACITY);
        let (csma_tx, csma_rx) = mpsc::unbounded_channel();
        self.csma.set_event_sender(csma_tx);

        tokio::spawn(reader_daemon(reader, message_tx.clone(), stop_rx.clone()));
        tokio::spawn(dispatcher_daemon(
            self.sink.clone(),
            message_rx,
            packet_rx,
            csma_rx,
            stop_rx,
        ));

        self.writer = Some(writer);
        self.stop_tx = Some(stop_tx);
        self.message_tx = Some(message_tx);
        self.packet_tx = Some(packet_tx);

        log::info!("Port {} opened", self.config.port_name);
        self.deliver(TerminalEvent::Status(format!(
            "Port {} open",
            self.config.port_name
        )));
        Ok(())
    }

    /// Signals the tasks to stop and releases the pipe. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        if self.writer.is_none() && self.stop_tx.is_none() {
            return Ok(());
        }

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(true);
        }
        self.message_tx = None;
        self.packet_tx = None;
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
        }

        log::info!("Port {} closed", self.config.port_name);
        self.deliver(TerminalEvent::Status("Port closed".to_owned()));
        Ok(())
    }

    /// Applies a new character width. An open terminal is cycled through a
    /// close, a short pause and a reopen for the setting to take effect.
    pub async fn set_data_bits(&mut self, data_bits: DataBits) -> Result<()> {
        let previous = self.config.data_bits;
        self.config.data_bits = data_bits;

        if self.writer.is_some() && previous != data_bits {
            log::info!(
                "Data bits changed from {:?} to {:?}, reconnecting",
                previous,
                data_bits
            );
            self.close().await?;
            time::sleep(REOPEN_DELAY).await;
            self.open().await?;
        }
        Ok(())
    }

    /// Transmits one user message. The station address is derived from the
    /// port name; the control octet is reserved.
    pub async fn send_message(&mut self, message: &str) -> Result<()> {
        let address = if self.config.port_name.ends_with(PEER_PORT_SUFFIX) {
            PEER_STATION_ADDRESS
        } else {
            LOCAL_STATION_ADDRESS
        };
        self.send_packet(address, RESERVED_CONTROL, message.as_bytes())
            .await
    }

    /// Runs the CSMA/CD transmit procedure for a single packet. May block for
    /// up to `SEND_MAX_ATTEMPTS × (retry interval + backoff)`.
    pub async fn send_packet(&mut self, address: u8, control: u8, data: &[u8]) -> Result<()> {
        let message_tx = self.message_tx.clone().ok_or(TerminalError::PortNotOpen)?;
        let packet_tx = self.packet_tx.clone().ok_or(TerminalError::PortNotOpen)?;
        let writer = self.writer.as_mut().ok_or(TerminalError::PortNotOpen)?;

        transmit(
            writer,
            &self.csma,
            &self.rng,
            self.config.corruption_enabled,
            address,
            control,
            data,
            &message_tx,
            &packet_tx,
        )
        .await
    }

    fn deliver(&self, event: TerminalEvent) {
        self.sink.lock().unwrap().deliver(event);
    }
}

fn classify_open_error(port_name: &str, err: tokio_serial::Error) -> anyhow::Error {
    match err.kind() {
        tokio_serial::ErrorKind::NoDevice => TerminalError::PortNotFound(port_name.to_owned()).into(),
        tokio_serial::ErrorKind::Io(io::ErrorKind::NotFound) => {
            TerminalError::PortNotFound(port_name.to_owned()).into()
        }
        tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
            TerminalError::PermissionDenied(port_name.to_owned()).into()
        }
        _ => anyhow::Error::new(err).context(format!("failed to open port {}", port_name)),
    }
}

#[allow(clippy::too_many_arguments)]
async fn transmit<W>(
    writer: &mut W,
    csma: &CsmaCd,
    rng: &SharedRng,
    corruption_enabled: bool,
    address: u8,
    control: u8,
    data: &[u8],
    message_tx: &mpsc::Sender<String>,
    packet_tx: &mpsc::Sender<String>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    for attempt in 1..=SEND_MAX_ATTEMPTS {
        log::debug!("Attempt {}: listening to the channel", attempt);
        if !csma.listen() {
            log::debug!("Attempt {}: channel busy, waiting", attempt);
            time::sleep(SEND_RETRY_INTERVAL).await;
            continue;
        }

        if !csma.start_transmission() {
            log::debug!("Attempt {}: channel claimed before transmission", attempt);
            continue;
        }

        let original = Packet::new(address, control, data.to_vec());
        let mut corrupted = original.clone();
        if corruption_enabled {
            corrupted.corrupt(&mut rng.lock().unwrap());
        }

        let bytes = link::frame(&corrupted);
        let _ = packet_tx
            .send(link::transmission_info(&original, &corrupted))
            .await;

        if let Err(err) = writer.write_all(&bytes).await {
            csma.end_transmission();
            return Err(anyhow::Error::new(err).context("failed to write to the serial port"));
        }

        if csma.detect_collision() {
            csma.send_jam();
            csma.end_transmission();
            let backoff = csma.backoff_delay();
            log::debug!(
                "Attempt {}: collision detected, backing off for {:?}",
                attempt,
                backoff
            );
            time::sleep(backoff).await;
            continue;
        }

        csma.end_transmission();
        csma.reset_backoff();
        log::info!(
            "Packet sent: Address=0x{:02X}, Control=0x{:02X}, FCS=0x{:02X}",
            original.address,
            original.control,
            original.fcs
        );
        let _ = message_tx
            .send(format!("TX:{}", String::from_utf8_lossy(&original.data)))
            .await;
        return Ok(());
    }

    Err(TerminalError::RetryLimitExceeded(SEND_MAX_ATTEMPTS).into())
}

async fn reader_daemon<R>(
    mut reader: R,
    message_tx: mpsc::Sender<String>,
    stop_rx: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK_BYTES_LEN];
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        if *stop_rx.borrow() {
            log::debug!("Reader stopped");
            return;
        }

        // The timeout bounds the blocking read so the stop signal is observed
        // even on a silent line.
        let read = match time::timeout(READ_TIMEOUT, reader.read(&mut chunk)).await {
            Err(_) => continue,
            Ok(Ok(0)) => {
                time::sleep(READ_EOF_INTERVAL).await;
                continue;
            }
            Ok(Ok(read)) => read,
            Ok(Err(err)) => {
                log::error!("Error reading from the port: {}", err);
                time::sleep(READ_ERROR_INTERVAL).await;
                continue;
            }
        };

        buffer.extend_from_slice(&chunk[..read]);
        drain_frames(&mut buffer, &message_tx).await;
    }
}

/// Scans the accumulator for flag-delimited candidates and delivers every
/// parseable frame, advancing past spurious flags one byte at a time.
async fn drain_frames(buffer: &mut Vec<u8>, message_tx: &mpsc::Sender<String>) {
    loop {
        let Some(start) = buffer.iter().position(|&byte| byte == FLAG_BYTE) else {
            if buffer.len() > RECV_BUFFER_LIMIT {
                buffer.clear();
            }
            break;
        };
        let Some(end) = buffer[start + 1..]
            .iter()
            .position(|&byte| byte == FLAG_BYTE)
            .map(|index| start + 1 + index)
        else {
            break;
        };

        let Some(packet) = link::deframe(&buffer[start..=end]) else {
            // A false start-of-frame; drop one byte and keep scanning so a
            // later frame sharing the closing flag is not lost.
            buffer.drain(..start + 1);
            continue;
        };
        buffer.drain(..end + 1);

        match packet.detect_and_correct() {
            FcsCheck::NoError => {
                log::info!(
                    "Packet received: Address=0x{:02X}, Control=0x{:02X}, FCS=0x{:02X}",
                    packet.address,
                    packet.control,
                    packet.fcs
                );
                let _ = message_tx
                    .send(format!("RX:{}", String::from_utf8_lossy(&packet.data)))
                    .await;
            }
            FcsCheck::SingleCorrected(corrected) => {
                let corrected = corrected[2..].to_vec();
                log::info!(
                    "Single error corrected: Corrected={}, FCS=0x{:02X}",
                    String::from_utf8_lossy(&corrected),
                    packet.fcs
                );
                let _ = message_tx
                    .send(format!("RX:{}", String::from_utf8_lossy(&corrected)))
                    .await;
            }
            FcsCheck::DoubleOrMore => {
                log::warn!(
                    "Double error detected, frame dropped: Address=0x{:02X}, FCS=0x{:02X}",
                    packet.address,
                    packet.fcs
                );
            }
        }
    }
}

async fn dispatcher_daemon(
    sink: SharedSink,
    mut message_rx: mpsc::Receiver<String>,
    mut packet_rx: mpsc::Receiver<String>,
    mut csma_rx: mpsc::UnboundedReceiver<CsmaEvent>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            Some(message) = message_rx.recv() => TerminalEvent::Message(message),
            Some(info) = packet_rx.recv() => TerminalEvent::PacketInfo(info),
            Some(event) = csma_rx.recv() => match event {
                CsmaEvent::StateChanged(state) => TerminalEvent::ChannelState(state),
                CsmaEvent::Collision => TerminalEvent::Collision,
                CsmaEvent::ChannelBusy => TerminalEvent::ChannelBusy,
            },
            _ = stop_rx.changed() => {
                log::debug!("Dispatcher stopped");
                return;
            }
            else => return,
        };
        sink.lock().unwrap().deliver(event);
    }
}
