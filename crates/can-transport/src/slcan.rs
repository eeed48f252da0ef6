use crate::{
    BusEvent, BusInfo, CanBus, CanFrame, CanId, Result, Timestamp, TransportError,
};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;

/// SLCAN text protocol over serial (CANable-class USB dongles).
pub struct SlcanBus {
    _port_path: String,
    port: Box<dyn SerialPort>,
    acc: Vec<u8>,
}

impl SlcanBus {
    pub fn open_with(path: &str, bitrate: Option<SlcanBitrate>) -> Result<Self> {
        let mut port = serialport::new(path, 115_200)
            .timeout(Duration::from_millis(200))
            .open()
            .map_err(|e| TransportError::Io(e.to_string()))?;
        // Close any stale channel, set bitrate, open. FRC buses run 1M.
        let _ = Self::write_cmd(&mut *port, b"C\r");
        let code = bitrate.unwrap_or(SlcanBitrate::B1M).code();
        let _ = Self::write_cmd(&mut *port, &[b'S', code, b'\r']);
        let _ = Self::write_cmd(&mut *port, b"O\r");
        tracing::debug!(path, code = %char::from(code), "slcan channel opened");
        Ok(SlcanBus {
            _port_path: path.to_string(),
            port,
            acc: Vec::with_capacity(64),
        })
    }

    fn write_cmd(port: &mut dyn SerialPort, cmd: &[u8]) -> Result<()> {
        port.write_all(cmd)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }

    fn encode_frame(frame: &CanFrame) -> Result<Vec<u8>> {
        if frame.rtr {
            return Err(TransportError::Unsupported("RTR not implemented"));
        }
        if frame.len > 8 {
            return Err(TransportError::InvalidFrame("dlc > 8"));
        }
        let mut out = Vec::with_capacity(32);
        if frame.id.is_extended() {
            out.push(b'T');
            out.extend_from_slice(format!("{:08X}", frame.id.raw()).as_bytes());
        } else {
            out.push(b't');
            out.extend_from_slice(format!("{:03X}", frame.id.raw()).as_bytes());
        }
        out.push(b'0' + frame.len);
        for byte in frame.payload() {
            out.extend_from_slice(format!("{byte:02X}").as_bytes());
        }
        out.push(b'\r');
        Ok(out)
    }

    /// Parse one '\r'-terminated SLCAN line into a bus event.
    fn parse_line(line: &[u8]) -> Result<BusEvent> {
        let kind = *line.first().ok_or(TransportError::InvalidFrame("empty"))?;
        match kind {
            b't' | b'r' => {
                let raw = Self::hex_field(line, 1, 3)?;
                let id = CanId::standard(raw as u16)
                    .ok_or(TransportError::InvalidFrame("id range"))?;
                Self::parse_data_frame(line, 4, id, kind == b'r')
            }
            b'T' | b'R' => {
                let raw = Self::hex_field(line, 1, 8)?;
                let id =
                    CanId::extended(raw).ok_or(TransportError::InvalidFrame("id range"))?;
                Self::parse_data_frame(line, 9, id, kind == b'R')
            }
            // Adapter error/status report. No detail worth decoding; the
            // bridge just counts it.
            b'e' | b'E' => Ok(BusEvent::ErrorFrame {
                timestamp: Some(Timestamp::now()),
            }),
            _ => Err(TransportError::InvalidFrame("unknown header")),
        }
    }

    fn parse_data_frame(line: &[u8], dlc_at: usize, id: CanId, rtr: bool) -> Result<BusEvent> {
        let dlc_char = *line
            .get(dlc_at)
            .ok_or(TransportError::InvalidFrame("short"))?;
        if !dlc_char.is_ascii_digit() || dlc_char > b'8' {
            return Err(TransportError::InvalidFrame("dlc"));
        }
        let dlc = usize::from(dlc_char - b'0');
        let mut data = [0u8; 8];
        let mut at = dlc_at + 1;
        for slot in data.iter_mut().take(dlc) {
            *slot = Self::hex_field(line, at, 2)? as u8;
            at += 2;
        }
        Ok(BusEvent::Frame(CanFrame {
            id,
            len: dlc as u8,
            data,
            rtr,
            timestamp: Some(Timestamp::now()),
        }))
    }

    fn hex_field(line: &[u8], start: usize, width: usize) -> Result<u32> {
        let end = start + width;
        let raw = line
            .get(start..end)
            .ok_or(TransportError::InvalidFrame("short field"))?;
        let text =
            std::str::from_utf8(raw).map_err(|_| TransportError::InvalidFrame("utf8"))?;
        u32::from_str_radix(text, 16).map_err(|_| TransportError::InvalidFrame("hex"))
    }
}

impl CanBus for SlcanBus {
    fn open(path: &str) -> Result<Self> {
        Self::open_with(path, Some(SlcanBitrate::B1M))
    }

    fn list() -> Result<Vec<BusInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let description = match &p.port_type {
                SerialPortType::UsbPort(usb) => {
                    usb.product.clone().unwrap_or_else(|| "USB serial".into())
                }
                _ => String::new(),
            };
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "slcan-serial",
                _ => "serial",
            };
            out.push(BusInfo {
                name: p.port_name,
                driver: driver.to_string(),
                description,
            });
        }
        Ok(out)
    }

    fn recv(&mut self, timeout_ms: Option<u64>) -> Result<BusEvent> {
        if let Some(ms) = timeout_ms {
            self.port.set_timeout(Duration::from_millis(ms)).ok();
        }
        let mut buf = [0u8; 128];
        loop {
            // A complete line may already be buffered from an earlier read.
            if let Some(pos) = self.acc.iter().position(|&b| b == b'\r') {
                let line: Vec<u8> = self.acc.drain(..=pos).collect();
                let trim: Vec<u8> = line[..line.len().saturating_sub(1)]
                    .iter()
                    .copied()
                    .filter(|&b| b != 0x07)
                    .collect();
                if trim.is_empty() {
                    continue;
                }
                return Self::parse_line(&trim);
            }
            match self.port.read(&mut buf) {
                Ok(n) if n > 0 => self.acc.extend_from_slice(&buf[..n]),
                Ok(_) => continue,
                Err(e) => {
                    let msg = e.to_string();
                    if e.kind() == std::io::ErrorKind::TimedOut || msg.contains("timed out") {
                        return Err(TransportError::Timeout);
                    }
                    return Err(TransportError::Io(msg));
                }
            }
        }
    }

    fn send(&mut self, frame: &CanFrame) -> Result<()> {
        let line = Self::encode_frame(frame)?;
        self.port
            .write_all(&line)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        Ok(())
    }
}

/// Serial ports whose description contains `match_text`, case-insensitive.
/// Used to auto-detect the CAN dongle when no channel is configured.
pub fn find_matching_ports(match_text: &str) -> Result<Vec<BusInfo>> {
    let needle = match_text.to_lowercase();
    Ok(SlcanBus::list()?
        .into_iter()
        .filter(|info| info.description.to_lowercase().contains(&needle))
        .collect())
}

/// Supported SLCAN bitrates (mapped to Sx codes)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SlcanBitrate {
    B10k,  // S0
    B20k,  // S1
    B50k,  // S2
    B100k, // S3
    B125k, // S4
    B250k, // S5
    B500k, // S6
    B800k, // S7
    B1M,   // S8
}

impl SlcanBitrate {
    pub fn code(self) -> u8 {
        match self {
            SlcanBitrate::B10k => b'0',
            SlcanBitrate::B20k => b'1',
            SlcanBitrate::B50k => b'2',
            SlcanBitrate::B100k => b'3',
            SlcanBitrate::B125k => b'4',
            SlcanBitrate::B250k => b'5',
            SlcanBitrate::B500k => b'6',
            SlcanBitrate::B800k => b'7',
            SlcanBitrate::B1M => b'8',
        }
    }
}
