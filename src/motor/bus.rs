// CAN transport for the actuator bus
//
// The drive only needs to send and receive 8-byte frames. Hardware access goes
// through a USB-CAN adapter speaking the SLCAN (Lawicel) ASCII protocol:
//   transmit/receive standard frame: t<III><L><DD...>\r
//   adapter acknowledgement:         z\r or \r, error: \x07

use serialport::{self, SerialPort};
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::frame::{FRAME_LEN, Frame};

pub const DEFAULT_BAUDRATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Largest standard (11-bit) CAN identifier
const MAX_STANDARD_ID: u16 = 0x7FF;

/// SLCAN bell character, sent by adapters on command errors
const SLCAN_ERROR: u8 = 0x07;

/// Longest SLCAN line we accept: t + id(3) + dlc(1) + data(16) + timestamp(4) + \r
const MAX_LINE_LEN: usize = 26;

/// Unterminated input kept between reads
const MAX_RX_BUFFER: usize = 4 * MAX_LINE_LEN;

/// Error types for bus communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame {line:?}: {reason}")]
    InvalidFrame { line: String, reason: String },

    #[error("Unsupported bitrate {0} bit/s")]
    UnsupportedBitrate(u32),
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Frame-level transport used by the drive
pub trait CanBus {
    /// Transmit one frame
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Next received frame, if one is waiting. Never blocks.
    fn try_recv(&mut self) -> Result<Option<Frame>>;
}

impl<B: CanBus + ?Sized> CanBus for Box<B> {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        (**self).send(frame)
    }

    fn try_recv(&mut self) -> Result<Option<Frame>> {
        (**self).try_recv()
    }
}

/// SLCAN bitrate command for a bus speed
pub fn slcan_bitrate_code(bitrate: u32) -> Result<&'static str> {
    let code = match bitrate {
        10_000 => "S0",
        20_000 => "S1",
        50_000 => "S2",
        100_000 => "S3",
        125_000 => "S4",
        250_000 => "S5",
        500_000 => "S6",
        800_000 => "S7",
        1_000_000 => "S8",
        other => return Err(BusError::UnsupportedBitrate(other)),
    };
    Ok(code)
}

/// Encode a frame as an SLCAN transmit command
pub fn encode_slcan(frame: &Frame) -> String {
    let mut line = format!("t{:03X}{:X}", frame.id() & MAX_STANDARD_ID, FRAME_LEN);
    for byte in frame.to_bytes() {
        line.push_str(&format!("{:02X}", byte));
    }
    line.push('\r');
    line
}

/// Parse one SLCAN line (without the trailing `\r`)
///
/// Returns None for adapter acknowledgements and frame kinds the drive does
/// not use (extended and remote frames).
pub fn parse_slcan(line: &str) -> Result<Option<Frame>> {
    let invalid = |reason: &str| BusError::InvalidFrame {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    match line.as_bytes().first() {
        None | Some(b'z') | Some(b'Z') => return Ok(None),
        Some(b'T') | Some(b'r') | Some(b'R') => {
            debug!("Ignoring SLCAN frame {:?}", line);
            return Ok(None);
        }
        Some(b't') => {}
        Some(_) => return Err(invalid("unknown command")),
    }

    if line.len() < 5 || !line.is_ascii() {
        return Err(invalid("truncated header"));
    }
    let id = u16::from_str_radix(&line[1..4], 16).map_err(|_| invalid("bad identifier"))?;
    let dlc = usize::from_str_radix(&line[4..5], 16).map_err(|_| invalid("bad length"))?;
    if dlc > FRAME_LEN {
        return Err(invalid("length exceeds 8 bytes"));
    }

    // Anything after the data bytes is an optional adapter timestamp
    let data_end = 5 + dlc * 2;
    if line.len() < data_end {
        return Err(invalid("missing data bytes"));
    }
    let mut bytes = [0u8; FRAME_LEN];
    for (i, byte) in bytes.iter_mut().take(dlc).enumerate() {
        let start = 5 + i * 2;
        *byte = u8::from_str_radix(&line[start..start + 2], 16)
            .map_err(|_| invalid("bad data byte"))?;
    }

    let frame = Frame::from_bytes(id, &bytes[..dlc]).map_err(|e| invalid(&e.to_string()))?;
    Ok(Some(frame))
}

/// CAN bus behind a serial SLCAN adapter
pub struct SlcanBus {
    port: Box<dyn SerialPort>,
    rx_buffer: Vec<u8>,
    rx_frames: VecDeque<Frame>,
}

impl SlcanBus {
    /// Open the adapter and bring the CAN channel up at `bitrate`
    pub fn open(port_name: &str, bitrate: u32) -> Result<Self> {
        let bitrate_code = slcan_bitrate_code(bitrate)?;
        info!("Opening SLCAN adapter on {} ({} bit/s)", port_name, bitrate);

        let port = serialport::new(port_name, DEFAULT_BAUDRATE)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        let mut bus = Self {
            port,
            rx_buffer: Vec::new(),
            rx_frames: VecDeque::new(),
        };

        // Close first in case the channel was left open by a previous session
        bus.command("C")?;
        bus.command(bitrate_code)?;
        bus.command("O")?;
        Ok(bus)
    }

    fn command(&mut self, cmd: &str) -> Result<()> {
        debug!("SLCAN command: {}", cmd);
        self.port.write_all(cmd.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }

    /// Pull whatever the adapter has buffered and split it into frames
    fn fill(&mut self) -> Result<()> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 {
            return Ok(());
        }
        let mut chunk = vec![0u8; available];
        let n = self.port.read(&mut chunk)?;
        self.rx_buffer.extend_from_slice(&chunk[..n]);
        self.rx_frames.extend(drain_lines(&mut self.rx_buffer));
        Ok(())
    }
}

/// Split complete SLCAN lines off the front of `buffer` and parse them
///
/// Bell bytes are adapter error replies and may arrive between the bytes of
/// a received line; they are removed wherever they appear. An unterminated
/// tail stays in `buffer` for the next read, unless it has grown past
/// `MAX_RX_BUFFER`, in which case it is discarded.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Vec<Frame> {
    let bells = buffer.iter().filter(|&&b| b == SLCAN_ERROR).count();
    if bells > 0 {
        warn!("SLCAN adapter reported {} error(s)", bells);
        buffer.retain(|&b| b != SLCAN_ERROR);
    }

    let mut frames = Vec::new();
    while let Some(pos) = buffer.iter().position(|&b| b == b'\r') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..pos]);
        match parse_slcan(&text) {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => {}
            Err(e) => warn!("Dropping malformed SLCAN line: {}", e),
        }
    }

    if buffer.len() > MAX_RX_BUFFER {
        warn!(
            "Discarding {} unterminated bytes from SLCAN adapter",
            buffer.len()
        );
        buffer.clear();
    }
    frames
}

impl CanBus for SlcanBus {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let line = encode_slcan(frame);
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Frame>> {
        if self.rx_frames.is_empty() {
            self.fill()?;
        }
        Ok(self.rx_frames.pop_front())
    }
}

impl Drop for SlcanBus {
    fn drop(&mut self) {
        if let Err(e) = self.command("C") {
            warn!("Failed to close SLCAN channel: {}", e);
        }
    }
}

/// In-memory bus for running without hardware
///
/// Sent frames are recorded; feedback is replayed from a queue.
#[derive(Debug, Default)]
pub struct SimulatedBus {
    sent: Vec<Frame>,
    incoming: VecDeque<Frame>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame to be returned by `try_recv`
    pub fn queue_feedback(&mut self, frame: Frame) {
        self.incoming.push_back(frame);
    }

    pub fn sent(&self) -> &[Frame] {
        &self.sent
    }

    pub fn last_sent(&self) -> Option<&Frame> {
        self.sent.last()
    }
}

impl CanBus for SimulatedBus {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        debug!("Simulated send 0x{:03X}: {:?}", frame.id(), frame.data());
        self.sent.push(*frame);
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Frame>> {
        Ok(self.incoming.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_slcan() {
        let mut frame = Frame::new(0x200);
        frame.set(0, 0x13).unwrap();
        frame.set(1, 0x33).unwrap();
        frame.set(4, -20).unwrap();
        frame.set(5, -51).unwrap();
        assert_eq!(encode_slcan(&frame), "t200813330000ECCD0000\r");
    }

    #[test]
    fn test_parse_slcan_frame() {
        let frame = parse_slcan("t20181000FED420002300").unwrap().unwrap();
        assert_eq!(frame.id(), 0x201);
        assert_eq!(
            frame.to_bytes(),
            [0x10, 0x00, 0xFE, 0xD4, 0x20, 0x00, 0x23, 0x00]
        );
    }

    #[test]
    fn test_parse_slcan_with_timestamp() {
        // Trailing 4 hex digits are the adapter timestamp
        let frame = parse_slcan("t2038000102030405060712AB").unwrap().unwrap();
        assert_eq!(frame.id(), 0x203);
        assert_eq!(frame.to_bytes(), [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_parse_slcan_short_frame_is_padded() {
        let frame = parse_slcan("t2022ABCD").unwrap().unwrap();
        assert_eq!(frame.to_bytes(), [0xAB, 0xCD, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_slcan_acks_and_ignored() {
        assert!(parse_slcan("").unwrap().is_none());
        assert!(parse_slcan("z").unwrap().is_none());
        assert!(parse_slcan("T000002018AABBCCDDEEFF0011").unwrap().is_none());
    }

    #[test]
    fn test_parse_slcan_rejects_garbage() {
        assert!(parse_slcan("t20").is_err());
        assert!(parse_slcan("t2019").is_err());
        assert!(parse_slcan("t2018AABB").is_err());
        assert!(parse_slcan("tXYZ8").is_err());
        assert!(parse_slcan("?").is_err());
    }

    #[test]
    fn test_encode_parse_agree() {
        let mut frame = Frame::new(0x200);
        for i in 0..8 {
            frame.set(i, (i as i8) * -17).unwrap();
        }
        let line = encode_slcan(&frame);
        let parsed = parse_slcan(line.trim_end_matches('\r')).unwrap().unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_drain_lines_bell_inside_line() {
        let mut buffer = b"\x07t2022AB\x07CD\r".to_vec();
        let frames = drain_lines(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].to_bytes(), [0xAB, 0xCD, 0, 0, 0, 0, 0, 0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_lines_partial_line_across_reads() {
        let mut buffer = b"t2022AB".to_vec();
        assert!(drain_lines(&mut buffer).is_empty());
        assert_eq!(buffer, b"t2022AB");

        buffer.extend_from_slice(b"CD\rt20");
        let frames = drain_lines(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id(), 0x202);
        assert_eq!(buffer, b"t20", "next line's head is kept");
    }

    #[test]
    fn test_drain_lines_cr_only_acks() {
        let mut buffer = b"\r\rz\rt2012ABCD\r\r".to_vec();
        let frames = drain_lines(&mut buffer);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].id(), 0x201);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_lines_skips_malformed() {
        let mut buffer = b"?garbage\rt2022ABCD\r".to_vec();
        let frames = drain_lines(&mut buffer);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_drain_lines_caps_unterminated_input() {
        let mut buffer = vec![b'5'; 500];
        assert!(drain_lines(&mut buffer).is_empty());
        assert!(buffer.is_empty(), "noise without terminator is discarded");

        // A short unterminated tail is still kept
        let mut buffer = vec![b'5'; MAX_RX_BUFFER];
        drain_lines(&mut buffer);
        assert_eq!(buffer.len(), MAX_RX_BUFFER);
    }

    #[test]
    fn test_bitrate_codes() {
        assert_eq!(slcan_bitrate_code(1_000_000).unwrap(), "S8");
        assert_eq!(slcan_bitrate_code(500_000).unwrap(), "S6");
        assert!(matches!(
            slcan_bitrate_code(333_333),
            Err(BusError::UnsupportedBitrate(333_333))
        ));
    }

    #[test]
    fn test_simulated_bus() {
        let mut bus = SimulatedBus::new();
        assert!(bus.try_recv().unwrap().is_none());

        let frame = Frame::new(0x202);
        bus.queue_feedback(frame);
        assert_eq!(bus.try_recv().unwrap(), Some(frame));

        bus.send(&Frame::new(0x200)).unwrap();
        assert_eq!(bus.sent().len(), 1);
        assert_eq!(bus.last_sent().unwrap().id(), 0x200);
    }
}
